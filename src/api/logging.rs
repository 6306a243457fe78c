use serde_json::Value;
use std::fs::OpenOptions;
use std::io::{IsTerminal, Write};

const DEFAULT_EVENT_LOG_PATH: &str = "/tmp/fangchat-events.log";
const DEBUG_EVENTS_ENV: &str = "FANGCHAT_DEBUG_EVENTS";
const EVENT_LOG_PATH_ENV: &str = "FANGCHAT_EVENT_LOG_PATH";

pub fn debug_events_enabled() -> bool {
    std::env::var(DEBUG_EVENTS_ENV)
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Trace one protocol payload (inbound event or outbound frame).
pub fn emit_event_trace(direction: &str, payload: &Value) {
    let formatted = serde_json::to_string(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    emit_log_message(&format!("FANGCHAT TRACE {direction} {formatted}\n"));
}

/// Watchdog expiries are self-healed, never surfaced as user errors; the log
/// is the only record they happened.
pub fn emit_watchdog_expiry(turn_id: u64) {
    emit_log_message(&format!(
        "FANGCHAT WARN watchdog_expired turn={turn_id}: open turn discarded without a terminal event\n"
    ));
}

pub fn emit_leak_detection(turn_id: u64, tool_name: Option<&str>) {
    emit_log_message(&format!(
        "FANGCHAT WARN leaked_tool_syntax turn={turn_id} tool={}\n",
        tool_name.unwrap_or("<none>")
    ));
}

pub fn emit_request_error(url: &str, error: &anyhow::Error) {
    emit_log_message(&format!("FANGCHAT ERROR request_failed url={url} error={error}\n"));
}

fn emit_log_message(message: &str) {
    if let Some(path) = resolve_log_path() {
        if append_log_file(&path, message).is_ok() {
            return;
        }
    }

    eprintln!("{message}");
}

fn resolve_log_path() -> Option<String> {
    std::env::var(EVENT_LOG_PATH_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            if std::io::stderr().is_terminal() {
                Some(DEFAULT_EVENT_LOG_PATH.to_string())
            } else {
                None
            }
        })
}

fn append_log_file(path: &str, message: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(message.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_events_enabled_accepts_true_variants() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var(DEBUG_EVENTS_ENV, "1");
        assert!(debug_events_enabled());
        std::env::set_var(DEBUG_EVENTS_ENV, "TRUE");
        assert!(debug_events_enabled());
        std::env::remove_var(DEBUG_EVENTS_ENV);
        assert!(!debug_events_enabled());
    }

    #[test]
    fn test_watchdog_expiry_appends_to_configured_log() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("events.log");
        std::env::set_var(EVENT_LOG_PATH_ENV, &path);

        emit_watchdog_expiry(7);

        let contents = std::fs::read_to_string(&path).expect("log file");
        assert!(contents.contains("watchdog_expired turn=7"));
        std::env::remove_var(EVENT_LOG_PATH_ENV);
    }
}
