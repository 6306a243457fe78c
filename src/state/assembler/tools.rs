use crate::state::turn::{SidePayload, ToolInvocation, ToolState};

/// Tool names whose results are scanned for structured side data.
const IMAGE_PRODUCERS: [&str; 3] = ["generate_image", "create_image", "image_search"];
const AUDIO_PRODUCERS: [&str; 3] = ["text_to_speech", "generate_audio", "speak"];

/// Resolve an end/result event to its invocation.
///
/// The protocol carries no call ids, so matching is LIFO by name: the most
/// recently started still-running invocation with that name wins, never one
/// that already completed. If two same-named calls resolve out of order the
/// attribution can be wrong; that is a protocol limitation this function
/// deliberately does not try to outguess. A future protocol with explicit
/// ids only needs to replace this one function.
pub(super) fn match_running_invocation<'a>(
    tools: &'a mut [ToolInvocation],
    name: &str,
) -> Option<&'a mut ToolInvocation> {
    tools
        .iter_mut()
        .rev()
        .find(|invocation| invocation.name == name && invocation.state == ToolState::Running)
}

/// Pull structured data out of a tool result when the tool is a known
/// producer and the result parses as JSON. Anything malformed is silently
/// ignored; the raw result text is kept either way.
pub(super) fn extract_side_payload(name: &str, result: &str) -> Option<SidePayload> {
    let value: serde_json::Value = serde_json::from_str(result).ok()?;

    if IMAGE_PRODUCERS.contains(&name) {
        let urls: Vec<String> = value
            .get("images")?
            .as_array()?
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        if urls.is_empty() {
            return None;
        }
        return Some(SidePayload::Images { urls });
    }

    if AUDIO_PRODUCERS.contains(&name) {
        let path = value
            .get("audio_file")
            .or_else(|| value.get("saved_file"))?
            .as_str()?;
        return Some(SidePayload::AudioFile {
            path: path.to_string(),
        });
    }

    None
}
