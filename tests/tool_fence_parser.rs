//! Whole-response parsing and the one-shot helpers

use serde_json::json;
use sgl_tool_fence::{
    config::FenceConfig,
    tool_parser::{extract_arguments, ToolCallParser, ToolParser},
};

#[test]
fn test_empty_input() {
    let parser = ToolCallParser::new();
    let result = parser.parse("");
    assert!(result.tool_calls.is_empty());
    assert_eq!(result.text_content, "");
}

#[test]
fn test_nested_objects_in_arguments() {
    let parser = ToolCallParser::new();
    let input = r#"<tool_call>{"name": "process", "arguments": {"config": {"nested": {"value": [1, 2, 3]}}, "enabled": true}}</tool_call>"#;
    let result = parser.parse(input);

    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(
        result.tool_calls[0].args,
        json!({"config": {"nested": {"value": [1, 2, 3]}}, "enabled": true})
    );
}

#[test]
fn test_unicode_content() {
    let parser = ToolCallParser::new();
    let input = "Voilà 🌍\n```tool_call\n{\"name\": \"translate\", \"arguments\": {\"text\": \"こんにちは\"}}\n```";
    let result = parser.parse(input);

    assert_eq!(result.tool_calls[0].args, json!({"text": "こんにちは"}));
    assert_eq!(result.text_content, "Voilà 🌍");
}

#[test]
fn test_invalid_candidates_are_skipped() {
    let parser = ToolCallParser::new();
    let input = r#"<tool_call>[{"name": "ok"}, {"arguments": {}}, 42, {"name": 7}]</tool_call>"#;
    let result = parser.parse(input);

    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.tool_calls[0].tool_name, "ok");
}

#[test]
fn test_unterminated_fence_is_text() {
    let parser = ToolCallParser::new();
    let input = "start <tool_call>{\"name\": \"f\"}";
    let result = parser.parse(input);
    assert!(result.tool_calls.is_empty());
    assert_eq!(result.text_content, input);
}

#[test]
fn test_parse_complete_through_trait() {
    let parser: Box<dyn ToolParser> = Box::new(ToolCallParser::new());
    let result = parser.parse_complete(r#"[lookup(id="42")]"#);
    assert_eq!(result.tool_calls[0].args, json!({"id": "42"}));
    assert!(parser.has_tool_markers(r#"[lookup(id="42")]"#));
    assert!(!parser.has_tool_markers("[lookup"));
}

#[test]
fn test_parameters_alias_follows_config() {
    let input = r#"<tool_call>{"name": "f", "parameters": {"a": 1}}</tool_call>"#;

    let parser = ToolCallParser::new();
    assert_eq!(parser.parse(input).tool_calls[0].args, json!({"a": 1}));

    let config = FenceConfig::builder().parameters_alias(false).build().unwrap();
    let parser = ToolCallParser::from_config(&config).unwrap();
    assert_eq!(parser.parse(input).tool_calls[0].args, json!({}));
}

#[test]
fn test_bracket_calls_disabled() {
    let config = FenceConfig::builder().bracket_calls(false).build().unwrap();
    let parser = ToolCallParser::from_config(&config).unwrap();
    let result = parser.parse(r#"Try [search(q="x")]"#);
    assert!(result.tool_calls.is_empty());
    assert_eq!(result.text_content, r#"Try [search(q="x")]"#);
}

#[test]
fn test_extract_arguments_shapes() {
    assert_eq!(
        extract_arguments(r#"{"name": "f", "arguments": [1, {"b": "]"}]}"#),
        Some(r#"[1, {"b": "]"}]"#)
    );
    assert_eq!(
        extract_arguments(r#"{"name": "f", "arguments": "{\"a\": 1}"}"#),
        Some(r#""{\"a\": 1}""#)
    );
    assert_eq!(extract_arguments(r#"{"name": "f", "arguments": null}"#), Some("null"));
    assert_eq!(extract_arguments(r#"{"name": "f"}"#), None);
}
