use super::logging::{debug_events_enabled, emit_event_trace, emit_request_error};
use crate::config::Config;
use crate::queue::Submission;
use anyhow::{anyhow, Result};
use serde_json::{json, Value};

/// One-shot request/response client.
///
/// Covers everything outside the streaming protocol: the send fallback used
/// when the live connection is down, and the control calls the command
/// interpreter issues (reset, compact, stop, status, usage, budget, model).
#[derive(Clone)]
pub struct ControlClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
    agent_id: String,
}

impl ControlClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.server_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
            agent_id: config.agent_id.clone(),
        }
    }

    /// Fallback send path for one submission when the live connection is
    /// unavailable. Returns the complete response payload.
    pub async fn send_message(&self, submission: &Submission) -> Result<Value> {
        let url = self.agent_url("message");
        let payload = json!({
            "content": submission.text,
            "attachments": submission.attachment_refs,
            "images": submission.image_refs,
        });
        self.post(&url, Some(payload)).await
    }

    pub async fn reset_session(&self) -> Result<Value> {
        self.post(&self.agent_url("reset"), None).await
    }

    pub async fn compact_session(&self) -> Result<Value> {
        self.post(&self.agent_url("compact"), None).await
    }

    pub async fn stop_run(&self) -> Result<Value> {
        self.post(&self.agent_url("stop"), None).await
    }

    pub async fn status(&self) -> Result<Value> {
        self.get(&self.agent_url("status")).await
    }

    pub async fn usage(&self) -> Result<Value> {
        self.get(&format!("{}/api/usage", self.base_url)).await
    }

    pub async fn budget(&self) -> Result<Value> {
        self.get(&format!("{}/api/budget", self.base_url)).await
    }

    /// Query the active model, or switch it when a name is given.
    pub async fn model(&self, name: Option<&str>) -> Result<Value> {
        let url = format!("{}/api/model", self.base_url);
        match name {
            Some(name) => self.post(&url, Some(json!({ "model": name }))).await,
            None => self.get(&url).await,
        }
    }

    fn agent_url(&self, endpoint: &str) -> String {
        format!("{}/api/agents/{}/{endpoint}", self.base_url, self.agent_id)
    }

    async fn get(&self, url: &str) -> Result<Value> {
        let request = self.authorized(self.http.get(url));
        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|error| self.map_error(url, error))?;
        let value = response
            .json::<Value>()
            .await
            .map_err(|error| self.map_error(url, error))?;
        if debug_events_enabled() {
            emit_event_trace("one-shot", &value);
        }
        Ok(value)
    }

    async fn post(&self, url: &str, payload: Option<Value>) -> Result<Value> {
        let mut request = self.authorized(self.http.post(url));
        if let Some(payload) = &payload {
            if debug_events_enabled() {
                emit_event_trace("one-shot-request", payload);
            }
            request = request.json(payload);
        }
        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|error| self.map_error(url, error))?;
        let value = response
            .json::<Value>()
            .await
            .map_err(|error| self.map_error(url, error))?;
        if debug_events_enabled() {
            emit_event_trace("one-shot", &value);
        }
        Ok(value)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.header("authorization", format!("Bearer {token}")),
            None => request,
        }
    }

    fn map_error(&self, url: &str, error: reqwest::Error) -> anyhow::Error {
        let mapped = if error.is_connect() {
            anyhow!("Cannot reach server at {url}: {error}")
        } else if error.is_timeout() {
            anyhow!("Request to {url} timed out: {error}")
        } else if let Some(status) = error.status() {
            anyhow!("Server returned {status} for {url}")
        } else {
            anyhow!("Request to {url} failed: {error}")
        };
        emit_request_error(url, &mapped);
        mapped
    }
}
