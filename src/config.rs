use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::util::{is_local_endpoint_url, parse_bool_flag};

const DEFAULT_SERVER_URL: &str = "http://localhost:8889";
const DEFAULT_WATCHDOG_SECS: u64 = 120;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server_url: String,
    pub auth_token: Option<String>,
    pub agent_id: String,
    /// How long an open turn may go without a progress event before the
    /// watchdog discards it.
    pub watchdog_timeout: Duration,
    /// When true, thinking-phase details stream into the turn's reasoning
    /// accumulator instead of overwriting the placeholder.
    pub stream_reasoning: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        let server_url = std::env::var("FANGCHAT_SERVER_URL")
            .unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        let auth_token = std::env::var("FANGCHAT_AUTH_TOKEN").ok().and_then(|v| {
            if v.trim().is_empty() {
                None
            } else {
                Some(v)
            }
        });
        let agent_id =
            std::env::var("FANGCHAT_AGENT_ID").unwrap_or_else(|_| "default".to_string());
        let watchdog_secs = std::env::var("FANGCHAT_WATCHDOG_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_WATCHDOG_SECS);
        let stream_reasoning = std::env::var("FANGCHAT_STREAM_REASONING")
            .ok()
            .and_then(parse_bool_flag)
            .unwrap_or(false);

        Ok(Self {
            server_url,
            auth_token,
            agent_id,
            watchdog_timeout: Duration::from_secs(watchdog_secs),
            stream_reasoning,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            bail!(
                "Invalid FANGCHAT_SERVER_URL '{}': expected http:// or https:// URL",
                self.server_url
            );
        }

        if !self.is_local_endpoint() && self.auth_token.is_none() {
            bail!(
                "FANGCHAT_AUTH_TOKEN must be set for non-local servers (url: '{}')",
                self.server_url
            );
        }

        if self.agent_id.trim().is_empty() {
            bail!("FANGCHAT_AGENT_ID must not be empty");
        }

        if self.watchdog_timeout.is_zero() {
            bail!("FANGCHAT_WATCHDOG_SECS must be greater than zero");
        }

        Ok(())
    }

    pub fn is_local_endpoint(&self) -> bool {
        is_local_endpoint_url(&self.server_url)
    }
}
