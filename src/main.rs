use std::{
    fs,
    io::{self, Read, Write},
    path::PathBuf,
};

use clap::{Args, Parser, Subcommand};
use sgl_tool_fence::{
    config::{ConfigError, FenceConfig, FenceConfigBuilder},
    observability::{init_logging, parse_level, LoggingConfig},
    tool_parser::{StreamPolicy, ToolCallParser, ToolCallStream},
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sgl-tool-fence")]
#[command(about = "Extract fenced tool calls from model output")]
#[command(long_about = r#"
Extract fenced tool calls from model output

Examples:
  # Final tool calls and residual text of a saved generation
  sgl-tool-fence parse response.txt

  # Replay a generation in 4-character fragments and print stream events
  cat response.txt | sgl-tool-fence stream --chunk-size 4
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    fence: FenceArgs,

    #[arg(long, default_value = "warn", env = "SGL_TOOL_FENCE_LOG_LEVEL", global = true)]
    log_level: String,

    #[arg(long, default_value_t = false, global = true)]
    log_json: bool,

    /// Also write logs to daily files in this directory
    #[arg(long, global = true)]
    log_dir: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a complete generation and print the result as one JSON line
    Parse {
        /// Input file, stdin when omitted
        input: Option<PathBuf>,
    },
    /// Replay a generation through the streaming detector and print events
    Stream {
        /// Input file, stdin when omitted
        input: Option<PathBuf>,

        /// Fragment size in characters, whole input when omitted
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Emit only the first call of a fence holding several
        #[arg(long, default_value_t = false)]
        first_call_only: bool,
    },
}

#[derive(Args, Debug)]
struct FenceArgs {
    /// JSON file with fence settings, applied before the flags below
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = false, global = true)]
    markdown_only: bool,

    #[arg(long, default_value_t = false, global = true)]
    no_bracket_calls: bool,

    #[arg(long, default_value_t = false, global = true)]
    no_parameters_alias: bool,
}

impl FenceArgs {
    fn to_config(&self) -> Result<FenceConfig, ConfigError> {
        let base = match &self.config {
            Some(path) => FenceConfig::from_json_file(path)?,
            None => FenceConfig::default(),
        };

        let mut builder = FenceConfigBuilder::from_config(base);
        if self.markdown_only {
            builder = builder.markdown_only();
        }
        if self.no_bracket_calls {
            builder = builder.bracket_calls(false);
        }
        if self.no_parameters_alias {
            builder = builder.parameters_alias(false);
        }
        builder.build()
    }
}

fn read_input(path: Option<&PathBuf>) -> io::Result<String> {
    match path {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input)?;
            Ok(input)
        }
    }
}

/// Split on char boundaries, `size` characters per fragment
fn chunk_chars(text: &str, size: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    for (count, (idx, _)) in text.char_indices().enumerate() {
        if count > 0 && count % size == 0 {
            chunks.push(&text[start..idx]);
            start = idx;
        }
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = parse_level(&cli.log_level)
        .ok_or_else(|| format!("Invalid log level: {}", cli.log_level))?;
    let _log_guard = init_logging(LoggingConfig {
        level,
        json_format: cli.log_json,
        log_dir: cli.log_dir.clone(),
        ..Default::default()
    });

    let config = cli.fence.to_config()?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Commands::Parse { input } => {
            let text = read_input(input.as_ref())?;
            let parser = ToolCallParser::from_config(&config)?;
            let parsed = parser.parse(&text);
            info!(calls = parsed.tool_calls.len(), "Parsed generation");
            writeln!(out, "{}", serde_json::to_string(&parsed)?)?;
        }
        Commands::Stream {
            input,
            chunk_size,
            first_call_only,
        } => {
            let text = read_input(input.as_ref())?;
            let policy = if *first_call_only {
                StreamPolicy::FirstCallOnly
            } else {
                StreamPolicy::AllCalls
            };
            let mut stream = ToolCallStream::from_config(&config)?.with_policy(policy);

            let chunks = match chunk_size {
                Some(0) => return Err("--chunk-size must be at least 1".into()),
                Some(size) => chunk_chars(&text, *size),
                None => vec![text.as_str()],
            };
            info!(chunks = chunks.len(), "Streaming generation");

            for chunk in chunks {
                for event in stream.push(chunk) {
                    writeln!(out, "{}", serde_json::to_string(&event)?)?;
                }
            }
            for event in stream.finish() {
                writeln!(out, "{}", serde_json::to_string(&event)?)?;
            }
        }
    }

    Ok(())
}
