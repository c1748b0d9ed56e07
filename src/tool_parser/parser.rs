use regex::{Captures, Regex};
use serde_json::{Map, Value};
use tracing::warn;

use crate::{
    config::FenceConfig,
    tool_parser::{
        errors::{ParserError, ParserResult},
        helpers::{generate_call_id, strip_matching_quotes},
        patterns::{FencePattern, MARKDOWN_END, MARKDOWN_STARTS, XML_END, XML_START},
        traits::ToolParser,
        types::{ParsedResponse, ParsedToolCall},
    },
};

const MARKDOWN_BRANCH: &str = r"(?i:```tool[_-]?call)(?P<md>.*?)```";
const XML_BRANCH: &str = r"<tool_call>(?P<xml>.*?)</tool_call>";
const BRACKET_BRANCH: &str = r"\[(?P<name>\w+)\((?P<args>.*?)\)\]";

/// Final-stage tool call parser
///
/// Handles complete fence bodies as well as whole non-streamed responses.
/// Recognized encodings:
/// ~~~text
/// ```tool_call\n{"name": "f", "arguments": {...}}\n```
/// <tool_call>{"name": "f", "arguments": {...}}</tool_call>
/// [f(key="value", other=1)]
/// ~~~
///
/// Markdown and XML bodies may hold one JSON object, a JSON array of objects,
/// or one object per line. Candidates that fail to decode are skipped.
pub struct ToolCallParser {
    /// Combined matcher over every enabled encoding
    extractor: Regex,
    /// Group names of custom literal patterns, in declaration order
    custom_groups: Vec<String>,
    /// Collapses newline runs in the residual text
    newline_runs: Regex,
    /// Accept `parameters` when `arguments` is absent
    parameters_alias: bool,
}

impl ToolCallParser {
    /// Parser for every built-in encoding
    pub fn new() -> Self {
        let pattern = format!("(?s){}|{}|{}", MARKDOWN_BRANCH, XML_BRANCH, BRACKET_BRANCH);
        let extractor = Regex::new(&pattern).expect("Valid regex pattern");

        Self {
            extractor,
            custom_groups: Vec::new(),
            newline_runs: Regex::new(r"\n{2,}").expect("Valid regex pattern"),
            parameters_alias: true,
        }
    }

    /// Parser matching the pattern set of a detector built from the same config
    pub fn from_config(config: &FenceConfig) -> ParserResult<Self> {
        let mut branches = Vec::new();
        let mut custom_groups = Vec::new();
        let mut markdown = false;
        let mut xml = false;

        for pattern in config.patterns.iter().map(FencePattern::from) {
            if MARKDOWN_STARTS.contains(&pattern.start.as_str()) && pattern.end == MARKDOWN_END {
                if !markdown {
                    branches.push(MARKDOWN_BRANCH.to_string());
                    markdown = true;
                }
            } else if pattern.start == XML_START && pattern.end == XML_END {
                if !xml {
                    branches.push(XML_BRANCH.to_string());
                    xml = true;
                }
            } else {
                if pattern.start.is_empty() || pattern.end.is_empty() {
                    return Err(ParserError::InvalidPattern(format!(
                        "empty marker in pattern starting with {:?}",
                        pattern.start
                    )));
                }
                let group = format!("c{}", custom_groups.len());
                branches.push(format!(
                    "{}(?P<{}>.*?){}",
                    regex::escape(&pattern.start),
                    group,
                    regex::escape(&pattern.end)
                ));
                custom_groups.push(group);
            }
        }

        if config.bracket_calls {
            branches.push(BRACKET_BRANCH.to_string());
        }

        if branches.is_empty() {
            return Err(ParserError::InvalidPattern(
                "no tool call encodings enabled".to_string(),
            ));
        }

        let extractor = Regex::new(&format!("(?s){}", branches.join("|")))?;

        Ok(Self {
            extractor,
            custom_groups,
            newline_runs: Regex::new(r"\n{2,}")?,
            parameters_alias: config.parameters_alias,
        })
    }

    pub fn with_parameters_alias(mut self, enabled: bool) -> Self {
        self.parameters_alias = enabled;
        self
    }

    /// Parse every tool call in `text`, removing the matched regions from the
    /// returned text content
    pub fn parse(&self, text: &str) -> ParsedResponse {
        let mut tool_calls = Vec::new();
        let mut remaining = String::with_capacity(text.len());
        let mut last_end = 0;

        for captures in self.extractor.captures_iter(text) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            remaining.push_str(&text[last_end..whole.start()]);
            last_end = whole.end();

            if let (Some(name), Some(args)) = (captures.name("name"), captures.name("args")) {
                tool_calls.push(ParsedToolCall {
                    tool_call_id: generate_call_id(),
                    tool_name: name.as_str().to_string(),
                    args: Value::Object(parse_bracket_args(args.as_str())),
                });
            } else if let Some(inner) = self.json_body(&captures) {
                self.parse_json_body(inner, &mut tool_calls);
            }
        }
        remaining.push_str(&text[last_end..]);

        let text_content = self
            .newline_runs
            .replace_all(&remaining, "\n")
            .trim()
            .to_string();

        ParsedResponse {
            tool_calls,
            text_content,
        }
    }

    /// Check if text contains a complete tool call region
    pub fn has_tool_markers(&self, text: &str) -> bool {
        self.extractor.is_match(text)
    }

    fn json_body<'t>(&self, captures: &Captures<'t>) -> Option<&'t str> {
        captures
            .name("md")
            .or_else(|| captures.name("xml"))
            .or_else(|| {
                self.custom_groups
                    .iter()
                    .find_map(|group| captures.name(group))
            })
            .map(|m| m.as_str())
    }

    fn parse_json_body(&self, inner: &str, out: &mut Vec<ParsedToolCall>) {
        let inner = inner.trim();
        if inner.is_empty() {
            return;
        }

        match serde_json::from_str::<Value>(inner) {
            Ok(Value::Array(items)) => {
                for item in items {
                    self.push_candidate(item, out);
                }
            }
            Ok(value) => self.push_candidate(value, out),
            Err(_) => {
                // One call per line
                for line in inner.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    match serde_json::from_str::<Value>(line) {
                        Ok(value) => self.push_candidate(value, out),
                        Err(e) => {
                            warn!("Skipping unparseable tool call line: {}", e);
                        }
                    }
                }
            }
        }
    }

    fn push_candidate(&self, value: Value, out: &mut Vec<ParsedToolCall>) {
        match self.decode_candidate(value) {
            Ok(call) => out.push(call),
            Err(e) => warn!("Skipping tool call candidate: {}", e),
        }
    }

    fn decode_candidate(&self, value: Value) -> ParserResult<ParsedToolCall> {
        let Value::Object(mut obj) = value else {
            return Err(ParserError::ParsingFailed(
                "tool call is not a JSON object".to_string(),
            ));
        };

        let tool_name = match obj.get("name") {
            Some(Value::String(name)) => name.clone(),
            _ => return Err(ParserError::MissingName),
        };

        let args = match obj.remove("arguments") {
            Some(args) => args,
            None if self.parameters_alias => obj
                .remove("parameters")
                .unwrap_or_else(|| Value::Object(Map::new())),
            None => Value::Object(Map::new()),
        };
        let args = match args {
            Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
            Value::Null => Value::Object(Map::new()),
            other => other,
        };

        let tool_call_id = match obj.get("id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => generate_call_id(),
        };

        Ok(ParsedToolCall {
            tool_call_id,
            tool_name,
            args,
        })
    }
}

impl Default for ToolCallParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolParser for ToolCallParser {
    fn parse_complete(&self, output: &str) -> ParsedResponse {
        self.parse(output)
    }

    fn has_tool_markers(&self, text: &str) -> bool {
        ToolCallParser::has_tool_markers(self, text)
    }
}

/// Parse `key=value, other="x"` into an object. Values stay strings with one
/// layer of matching quotes removed.
fn parse_bracket_args(args: &str) -> Map<String, Value> {
    let mut result = Map::new();

    for part in split_top_level(args) {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = strip_matching_quotes(value.trim());
        result.insert(key.to_string(), Value::String(value.to_string()));
    }

    result
}

/// Split on commas that are outside quotes and brackets
fn split_top_level(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escape_next = false;
    let mut start = 0;

    for (i, ch) in args.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        if let Some(q) = quote {
            if ch == '\\' {
                escape_next = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '"' | '\'' => quote = Some(ch),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&args[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if start < args.len() {
        parts.push(&args[start..]);
    }
    parts.retain(|p| !p.trim().is_empty());
    parts
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_split_top_level() {
        assert_eq!(
            split_top_level(r#"a="x, y", b=[1, 2], c={"k": 1}"#),
            vec![r#"a="x, y""#, " b=[1, 2]", r#" c={"k": 1}"#]
        );
        assert!(split_top_level("").is_empty());
        assert_eq!(split_top_level("a=1,"), vec!["a=1"]);
    }

    #[test]
    fn test_parse_bracket_args_keeps_strings() {
        let args = parse_bracket_args(r#"query="hello", limit=5, flag='yes', bare"#);
        assert_eq!(
            Value::Object(args),
            json!({"query": "hello", "limit": "5", "flag": "yes"})
        );
    }

    #[test]
    fn test_decode_candidate_parameters_alias() {
        let parser = ToolCallParser::new();
        let call = parser
            .decode_candidate(json!({"name": "f", "parameters": {"x": 1}}))
            .unwrap();
        assert_eq!(call.args, json!({"x": 1}));

        let parser = ToolCallParser::new().with_parameters_alias(false);
        let call = parser
            .decode_candidate(json!({"name": "f", "parameters": {"x": 1}}))
            .unwrap();
        assert_eq!(call.args, json!({}));
    }

    #[test]
    fn test_decode_candidate_string_arguments() {
        let parser = ToolCallParser::new();
        let call = parser
            .decode_candidate(json!({"name": "f", "arguments": "{\"x\": 1}"}))
            .unwrap();
        assert_eq!(call.args, json!({"x": 1}));

        let call = parser
            .decode_candidate(json!({"name": "f", "arguments": "not json"}))
            .unwrap();
        assert_eq!(call.args, json!("not json"));
    }

    #[test]
    fn test_decode_candidate_explicit_id() {
        let parser = ToolCallParser::new();
        let call = parser
            .decode_candidate(json!({"id": "abc", "name": "f"}))
            .unwrap();
        assert_eq!(call.tool_call_id, "abc");
        assert_eq!(call.args, json!({}));
    }

    #[test]
    fn test_decode_candidate_errors() {
        let parser = ToolCallParser::new();
        assert!(matches!(
            parser.decode_candidate(json!({"arguments": {}})),
            Err(ParserError::MissingName)
        ));
        assert!(matches!(
            parser.decode_candidate(json!({"name": 5})),
            Err(ParserError::MissingName)
        ));
        assert!(matches!(
            parser.decode_candidate(json!([1, 2])),
            Err(ParserError::ParsingFailed(_))
        ));
    }

    #[test]
    fn test_unparseable_lines_are_skipped() {
        let parser = ToolCallParser::new();
        let input = "<tool_call>\n{\"name\": \"a\"}\n{not json\n{\"name\": \"b\"}\n</tool_call>";
        let names: Vec<String> = parser
            .parse(input)
            .tool_calls
            .into_iter()
            .map(|c| c.tool_name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_from_config_custom_pattern() {
        let config = FenceConfig::builder()
            .with_pattern("<function_call>", "</function_call>", None, false)
            .build()
            .unwrap();
        let parser = ToolCallParser::from_config(&config).unwrap();
        let parsed = parser.parse(r#"a <function_call>{"name": "f"}</function_call> b"#);
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.tool_calls[0].tool_name, "f");
        assert_eq!(parsed.text_content, "a  b");
    }

    #[test]
    fn test_from_config_markdown_only() {
        let config = FenceConfig::builder().markdown_only().build().unwrap();
        let parser = ToolCallParser::from_config(&config).unwrap();
        let parsed = parser.parse(r#"<tool_call>{"name": "f"}</tool_call> [g(a=1)]"#);
        assert!(parsed.tool_calls.is_empty());
        assert_eq!(parsed.text_content, r#"<tool_call>{"name": "f"}</tool_call> [g(a=1)]"#);
    }
}
