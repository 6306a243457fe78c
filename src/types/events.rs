use serde::{Deserialize, Serialize};

/// Inbound event envelope, discriminated by the `type` field.
///
/// Unrecognized types deserialize to `Unknown` so a newer gateway never
/// breaks the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected,
    /// Legacy typing-start signal still sent by older gateways.
    Thinking,
    Typing {
        state: TypingState,
        #[serde(default)]
        tool: Option<String>,
    },
    Phase {
        phase: String,
        #[serde(default)]
        detail: Option<String>,
    },
    TextDelta {
        content: String,
    },
    ToolStart {
        tool: String,
    },
    ToolEnd {
        tool: String,
        #[serde(default)]
        input: Option<serde_json::Value>,
    },
    ToolResult {
        tool: String,
        result: String,
        #[serde(default)]
        is_error: bool,
    },
    Response {
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        input_tokens: Option<u64>,
        #[serde(default)]
        output_tokens: Option<u64>,
        #[serde(default)]
        cost_usd: Option<f64>,
        #[serde(default)]
        iterations: Option<u32>,
        #[serde(default)]
        fallback_model: Option<String>,
        #[serde(default)]
        context_pressure: Option<ContextPressure>,
    },
    SilentComplete,
    Error {
        content: String,
    },
    CommandResult {
        #[serde(default)]
        command: Option<String>,
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        context_pressure: Option<ContextPressure>,
    },
    Canvas {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        canvas_id: Option<String>,
        html: String,
    },
    Pong,
    AgentsUpdated,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypingState {
    Start,
    Tool,
    Stop,
}

/// Server-reported fullness of the model's context window. Purely a mirror
/// of the most recent pushed value; the client computes nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextPressure {
    Low,
    Medium,
    High,
    Critical,
}

/// Outbound frames sent over the live connection.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Message {
        content: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        attachments: Vec<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        images: Vec<String>,
    },
    /// Out-of-band control frame; not a submission, not queued.
    Command { command: String, args: String },
}
