use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Agent,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Thinking,
    Streaming,
    Finalized,
}

/// One reconstructed request/response cycle.
///
/// Ids are monotonic within an assembler. `visible_text` is append-only while
/// the turn is open and immutable once finalized; the transient `status` line
/// (placeholder / progress text) is presentation state and is dropped at
/// finalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: u64,
    pub role: Role,
    pub lifecycle: Lifecycle,
    pub visible_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_text: Option<String>,
    pub tools: Vec<ToolInvocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<TurnMeta>,
    pub text_detected_leak: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canvas: Option<CanvasPayload>,
}

impl Turn {
    pub fn new(id: u64, role: Role, lifecycle: Lifecycle) -> Self {
        Self {
            id,
            role,
            lifecycle,
            visible_text: String::new(),
            reasoning_text: None,
            tools: Vec::new(),
            meta: None,
            text_detected_leak: false,
            status: None,
            canvas: None,
        }
    }

    pub fn finalized(id: u64, role: Role, text: String) -> Self {
        let mut turn = Self::new(id, role, Lifecycle::Finalized);
        turn.visible_text = text;
        turn
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.lifecycle, Lifecycle::Finalized)
    }
}

/// One tool call and its lifecycle within a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub state: ToolState,
    pub input: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_payload: Option<SidePayload>,
    /// True when this invocation was synthesized from leaked text syntax
    /// rather than a real tool_start event.
    pub text_detected: bool,
}

impl ToolInvocation {
    pub fn running(id: String, name: String, input: serde_json::Value) -> Self {
        Self {
            id,
            name,
            state: ToolState::Running,
            input,
            result: None,
            side_payload: None,
            text_detected: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolState {
    Running,
    Completed,
    Errored,
}

/// Structured data recognized inside a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidePayload {
    Images { urls: Vec<String> },
    AudioFile { path: String },
}

/// Finalization metadata. Formatting is the caller's job; `summary()` renders
/// the compact one-line form used by transcripts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_model: Option<String>,
}

impl TurnMeta {
    pub fn is_empty(&self) -> bool {
        self.input_tokens.is_none()
            && self.output_tokens.is_none()
            && self.cost_usd.is_none()
            && self.iterations.is_none()
            && self.fallback_model.is_none()
    }

    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let (Some(input), Some(output)) = (self.input_tokens, self.output_tokens) {
            parts.push(format!("{input} in / {output} out tokens"));
        }
        if let Some(cost) = self.cost_usd {
            parts.push(format!("${cost:.4}"));
        }
        if let Some(iterations) = self.iterations {
            parts.push(format!("{iterations} iterations"));
        }
        if let Some(model) = &self.fallback_model {
            parts.push(format!("fallback: {model}"));
        }
        parts.join(" · ")
    }
}

/// Embeddable content delivered by a `canvas` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canvas_id: Option<String>,
    pub html: String,
}
