//! Detection and removal of tool-call pseudo-syntax leaked into plain text.
//!
//! Models without structured tool support sometimes emit their tool calls as
//! text, in a handful of known shapes:
//!
//! - `name</function={"arg":1}` (inline, name before the marker)
//! - `<function=name>{"arg":1}</function>` (tagged, JSON or `<parameter=>` body)
//! - `name{"type":"function",...}` (raw JSON blob)
//!
//! plus bare closing tags and special control tokens. Matching is anchored on
//! these exact markers; ordinary `</...>`-like text never matches.

use aho_corasick::{AhoCorasick, MatchKind};
use serde_json::json;
use std::sync::OnceLock;

const MARKER_INLINE: &str = "</function=";
const MARKER_CLOSE: &str = "</function>";
const MARKER_OPEN: &str = "<function=";
const MARKER_JSON: &str = "{\"type\":\"function\"";
const MARKER_JSON_SPACED: &str = "{\"type\": \"function\"";
const CONTROL_TOKENS: [&str; 3] = ["<|python_tag|>", "<|eom_id|>", "<|eot_id|>"];

const PAT_INLINE: usize = 0;
const PAT_CLOSE: usize = 1;
const PAT_OPEN: usize = 2;
const PAT_JSON: usize = 3;
const PAT_JSON_SPACED: usize = 4;

/// A leak found in accumulated text.
#[derive(Debug, Clone, PartialEq)]
pub struct LeakHit {
    /// Byte offset where visible text should be truncated.
    pub truncate_at: usize,
    /// Byte offset where ordinary text resumes, when the occurrence is fully
    /// delimited. `None` means the leak runs to the end of the scanned text.
    pub resume_at: Option<usize>,
    /// Tool name captured from the syntax, when one was present.
    pub name: Option<String>,
    /// Whatever input could be recovered from the partial syntax.
    pub partial_input: serde_json::Value,
}

fn matcher() -> &'static AhoCorasick {
    static MATCHER: OnceLock<AhoCorasick> = OnceLock::new();
    MATCHER.get_or_init(|| {
        let mut patterns = vec![
            MARKER_INLINE,
            MARKER_CLOSE,
            MARKER_OPEN,
            MARKER_JSON,
            MARKER_JSON_SPACED,
        ];
        patterns.extend(CONTROL_TOKENS);
        AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostFirst)
            .build(patterns)
            .expect("static leak patterns must compile")
    })
}

/// Scan text for the earliest leaked tool-call marker.
pub fn detect_leak(text: &str) -> Option<LeakHit> {
    let m = matcher().find(text)?;
    let p = m.start();

    let hit = match m.pattern().as_usize() {
        PAT_INLINE => {
            let name = trailing_identifier(&text[..p]);
            let after = &text[p + MARKER_INLINE.len()..];
            let (input, json_end) = parse_json_fragment(after);
            let resume_at = json_end.map(|end| {
                let mut idx = p + MARKER_INLINE.len() + end;
                if text[idx..].starts_with(MARKER_CLOSE) {
                    idx += MARKER_CLOSE.len();
                }
                idx
            });
            LeakHit {
                truncate_at: p,
                resume_at,
                name,
                partial_input: input,
            }
        }
        PAT_OPEN => parse_open_tag(text, p),
        PAT_JSON | PAT_JSON_SPACED => {
            let preceding_name = trailing_identifier(&text[..p]);
            let (value, end) = parse_json_fragment(&text[p..]);
            let name = value
                .get("name")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .or(preceding_name);
            let input = value
                .get("parameters")
                .or_else(|| value.get("arguments"))
                .cloned()
                .unwrap_or(value);
            LeakHit {
                truncate_at: p,
                resume_at: end.map(|e| p + e),
                name,
                partial_input: input,
            }
        }
        // Bare closing tag or a control token; nothing to synthesize.
        _ => LeakHit {
            truncate_at: p,
            resume_at: Some(m.end()),
            name: None,
            partial_input: json!({}),
        },
    };

    Some(hit)
}

/// Remove every leaked occurrence from complete text.
///
/// Finalization calls this over the full accumulated text, so fully-delimited
/// occurrences the incremental scan missed are still removed. Unterminated
/// occurrences are cut to the end of the text.
pub fn strip_leaks(text: &str) -> String {
    let mut out = String::new();
    let mut rest = text;
    while let Some(hit) = detect_leak(rest) {
        out.push_str(&rest[..hit.truncate_at]);
        rest = match hit.resume_at {
            Some(resume) => &rest[resume..],
            None => "",
        };
    }
    out.push_str(rest);
    out.trim().to_string()
}

fn parse_open_tag(text: &str, p: usize) -> LeakHit {
    let name_start = p + MARKER_OPEN.len();
    let Some(name_end) = text[name_start..].find('>').map(|rel| name_start + rel) else {
        // Tag is still streaming in; the name may be incomplete.
        let fragment = clean_name(&text[name_start..]);
        return LeakHit {
            truncate_at: p,
            resume_at: None,
            name: fragment,
            partial_input: json!({}),
        };
    };

    let name = clean_name(&text[name_start..name_end]);
    let body_start = name_end + 1;
    let (body, resume_at) = match text[body_start..].find(MARKER_CLOSE) {
        Some(rel) => (
            &text[body_start..body_start + rel],
            Some(body_start + rel + MARKER_CLOSE.len()),
        ),
        None => (&text[body_start..], None),
    };

    LeakHit {
        truncate_at: p,
        resume_at,
        name,
        partial_input: parse_tag_body(body),
    }
}

fn parse_tag_body(body: &str) -> serde_json::Value {
    if body.contains("<parameter=") {
        return parse_tag_parameters(body);
    }
    if body.trim().is_empty() {
        return json!({});
    }
    parse_json_fragment(body).0
}

fn parse_tag_parameters(body: &str) -> serde_json::Value {
    let mut input = serde_json::Map::new();
    let mut cursor = 0usize;

    while let Some(rel) = body[cursor..].find("<parameter=") {
        let key_start = cursor + rel + "<parameter=".len();
        let Some(key_end_rel) = body[key_start..].find('>') else {
            break;
        };
        let key_end = key_start + key_end_rel;
        let key = body[key_start..key_end]
            .trim()
            .trim_matches('"')
            .trim_matches('\'')
            .to_string();

        let value_start = key_end + 1;
        let (value_end, next_cursor) = match body[value_start..].find("</parameter>") {
            Some(close_rel) => (
                value_start + close_rel,
                value_start + close_rel + "</parameter>".len(),
            ),
            None => (body.len(), body.len()),
        };

        let value = body[value_start..value_end]
            .trim_matches('\n')
            .to_string();
        if !key.is_empty() {
            input.insert(key, serde_json::Value::String(value));
        }
        cursor = next_cursor;
    }

    serde_json::Value::Object(input)
}

/// Parse a JSON object at the start of the fragment. Returns the value and
/// the byte offset just past it, or a `{"partial": ...}` wrapper when the
/// object is truncated or malformed.
fn parse_json_fragment(s: &str) -> (serde_json::Value, Option<usize>) {
    let lead = s.len() - s.trim_start().len();
    let body = &s[lead..];

    if body.starts_with('{') {
        if let Some(end) = json_object_end(body) {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&body[..end]) {
                return (value, Some(lead + end));
            }
        }
        return (json!({ "partial": body }), None);
    }

    if body.is_empty() {
        (json!({}), Some(lead))
    } else {
        (json!({ "partial": body }), None)
    }
}

/// Offset just past the balanced object starting at `s[0] == '{'`, honoring
/// string literals and escapes.
fn json_object_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in s.bytes().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// The identifier immediately preceding a marker, if the text ends in one.
fn trailing_identifier(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut start = text.len();
    while start > 0 {
        let b = bytes[start - 1];
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'-' {
            start -= 1;
        } else {
            break;
        }
    }
    if start == text.len() {
        None
    } else {
        Some(text[start..].to_string())
    }
}

fn clean_name(raw: &str) -> Option<String> {
    let cleaned = raw.trim().trim_matches('"').trim_matches('\'').to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_marker_truncates_and_captures_input() {
        let hit = detect_leak("foo</function={\"x\":1}").expect("leak");
        assert_eq!(hit.truncate_at, 3);
        assert_eq!(hit.name.as_deref(), Some("foo"));
        assert_eq!(hit.partial_input, json!({"x": 1}));
        assert_eq!(hit.resume_at, Some(21));
    }

    #[test]
    fn test_inline_marker_with_truncated_json_captures_partial() {
        let hit = detect_leak("web_search</function={\"query\":\"ru").expect("leak");
        assert_eq!(hit.name.as_deref(), Some("web_search"));
        assert_eq!(hit.partial_input, json!({"partial": "{\"query\":\"ru"}));
        assert!(hit.resume_at.is_none());
    }

    #[test]
    fn test_open_tag_form_with_json_body() {
        let text = "before <function=read_file>{\"path\":\"a.txt\"}</function> after";
        let hit = detect_leak(text).expect("leak");
        assert_eq!(hit.truncate_at, 7);
        assert_eq!(hit.name.as_deref(), Some("read_file"));
        assert_eq!(hit.partial_input, json!({"path": "a.txt"}));
        assert_eq!(&text[hit.resume_at.expect("delimited")..], " after");
    }

    #[test]
    fn test_open_tag_form_with_parameter_body() {
        let text = "<function=edit_file>\n<parameter=path>\nsrc/main.rs\n</parameter>\n</function>";
        let hit = detect_leak(text).expect("leak");
        assert_eq!(hit.name.as_deref(), Some("edit_file"));
        assert_eq!(hit.partial_input, json!({"path": "src/main.rs"}));
    }

    #[test]
    fn test_json_blob_form_uses_embedded_name() {
        let text = "sure{\"type\":\"function\",\"name\":\"lookup\",\"parameters\":{\"q\":\"x\"}}";
        let hit = detect_leak(text).expect("leak");
        assert_eq!(hit.truncate_at, 4);
        assert_eq!(hit.name.as_deref(), Some("lookup"));
        assert_eq!(hit.partial_input, json!({"q": "x"}));
        assert_eq!(hit.resume_at, Some(text.len()));
    }

    #[test]
    fn test_control_tokens_are_leaks_without_names() {
        let hit = detect_leak("done<|eot_id|>").expect("leak");
        assert_eq!(hit.truncate_at, 4);
        assert!(hit.name.is_none());
        assert_eq!(hit.resume_at, Some(14));
    }

    #[test]
    fn test_ordinary_markup_is_not_a_leak() {
        assert!(detect_leak("this is <em>fine</em> text").is_none());
        assert!(detect_leak("a < b and b > c, also </closing>").is_none());
        assert!(detect_leak("code: fn function() {}").is_none());
    }

    #[test]
    fn test_strip_removes_fully_delimited_occurrence() {
        let text = "Here you go. <function=run>{\"cmd\":\"ls\"}</function> Done.";
        assert_eq!(strip_leaks(text), "Here you go.  Done.");
    }

    #[test]
    fn test_strip_cuts_unterminated_leak_to_end() {
        let text = "Answer below.\nsearch</function={\"q\":\"unfinished";
        assert_eq!(strip_leaks(text), "Answer below.\nsearch");
    }

    #[test]
    fn test_strip_handles_multiple_occurrences_and_bare_tags() {
        let text = "a</function> b <|python_tag|> c";
        assert_eq!(strip_leaks(text), "a b  c");
    }

    #[test]
    fn test_strip_leaves_clean_text_untouched() {
        assert_eq!(strip_leaks("  plain answer  "), "plain answer");
    }
}
