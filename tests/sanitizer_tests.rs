//! Sanitizer behavior over realistic accumulated text, including the
//! chunk-by-chunk arrival pattern the assembler feeds it.

use fangchat::sanitize::{detect_leak, strip_leaks};
use serde_json::json;

#[test]
fn test_marker_split_across_chunks_is_caught_once_complete() {
    // The marker arrives in pieces; scanning the accumulated buffer after
    // each append catches it as soon as the last piece lands.
    let chunks = ["I'll search", " for that.</fun", "ction={\"query\""];
    let mut buffer = String::new();
    let mut first_hit = None;

    for chunk in chunks {
        buffer.push_str(chunk);
        if first_hit.is_none() {
            first_hit = detect_leak(&buffer);
        }
    }

    let hit = first_hit.expect("caught after the marker completed");
    assert_eq!(&buffer[..hit.truncate_at], "I'll search for that.");
    // No identifier directly before the marker, so no name is recovered.
    assert!(hit.name.is_none());
    assert!(hit.resume_at.is_none());
}

#[test]
fn test_clean_prose_with_html_and_code_never_matches() {
    let samples = [
        "Use <em>emphasis</em> and <strong>bold</strong>.",
        "In Rust: `fn function() -> impl Fn()` is fine.",
        "Compare a < b && b > c in the condition.",
        "The </closing> tag here is ordinary markup.",
        "JSON like {\"type\": \"user\"} is not a tool call.",
    ];
    for sample in samples {
        assert!(detect_leak(sample).is_none(), "false positive on: {sample}");
    }
}

#[test]
fn test_tagged_call_with_parameter_body() {
    let text = concat!(
        "Let me edit that file.\n",
        "<function=write_file>\n",
        "<parameter=path>\nnotes.txt\n</parameter>\n",
        "<parameter=content>\nhello\n</parameter>\n",
        "</function>"
    );
    let hit = detect_leak(text).expect("leak");
    assert_eq!(hit.name.as_deref(), Some("write_file"));
    assert_eq!(
        hit.partial_input,
        json!({"path": "notes.txt", "content": "hello"})
    );
    assert_eq!(strip_leaks(text), "Let me edit that file.");
}

#[test]
fn test_json_blob_call_with_arguments_key() {
    let text = r#"{"type": "function", "name": "lookup", "arguments": {"id": 7}}"#;
    let hit = detect_leak(text).expect("leak");
    assert_eq!(hit.name.as_deref(), Some("lookup"));
    assert_eq!(hit.partial_input, json!({"id": 7}));
    assert_eq!(strip_leaks(text), "");
}

#[test]
fn test_strip_removes_every_shape_in_one_document() {
    let text = concat!(
        "First part.\n",
        "<function=run>{\"cmd\": \"ls\"}</function>\n",
        "Middle part.<|eot_id|>\n",
        "search</function={\"q\": \"still streaming"
    );
    let cleaned = strip_leaks(text);
    assert!(cleaned.contains("First part."));
    assert!(cleaned.contains("Middle part."));
    assert!(cleaned.ends_with("search"));
    assert!(!cleaned.contains("function"));
    assert!(!cleaned.contains("<|eot_id|>"));
}

#[test]
fn test_nested_braces_inside_json_input_are_balanced() {
    let text = r#"go</function={"outer": {"inner": "}b{"}, "n": 1}tail"#;
    let hit = detect_leak(text).expect("leak");
    assert_eq!(
        hit.partial_input,
        json!({"outer": {"inner": "}b{"}, "n": 1})
    );
    let resume = hit.resume_at.expect("delimited");
    assert_eq!(&text[resume..], "tail");
}
