use super::state::{Assembler, AssemblerSignal};
use super::tools::{extract_side_payload, match_running_invocation};
use crate::api::logging;
use crate::sanitize;
use crate::state::turn::{
    CanvasPayload, Lifecycle, Role, ToolInvocation, ToolState, Turn, TurnMeta,
};
use crate::types::{ContextPressure, ServerEvent, TypingState};

/// Fixed result attached to leak-synthesized invocations that never resolved.
pub const LEAK_NOT_EXECUTED_RESULT: &str =
    "Tool call was emitted as plain text and not executed via the tool system.";

const PLACEHOLDER_PROCESSING: &str = "Processing…";

impl Assembler {
    /// Consume one event in arrival order. Any event type may arrive with no
    /// open turn; nothing here ever opens a second one.
    pub fn apply_event(&mut self, event: ServerEvent) -> Vec<AssemblerSignal> {
        match event {
            ServerEvent::Connected
            | ServerEvent::Pong
            | ServerEvent::AgentsUpdated
            | ServerEvent::Unknown => Vec::new(),
            ServerEvent::Thinking => self.on_typing_start(),
            ServerEvent::Typing { state, tool } => match state {
                TypingState::Start => self.on_typing_start(),
                TypingState::Tool => self.on_typing_tool(tool),
                TypingState::Stop => vec![AssemblerSignal::WatchdogDisarm],
            },
            ServerEvent::Phase { phase, detail } => self.on_phase(&phase, detail),
            ServerEvent::TextDelta { content } => self.on_text_delta(&content),
            ServerEvent::ToolStart { tool } => self.on_tool_start(tool),
            ServerEvent::ToolEnd { tool, input } => self.on_tool_end(&tool, input),
            ServerEvent::ToolResult {
                tool,
                result,
                is_error,
            } => self.on_tool_result(&tool, result, is_error),
            ServerEvent::Response {
                content,
                input_tokens,
                output_tokens,
                cost_usd,
                iterations,
                fallback_model,
                context_pressure,
            } => {
                let meta = TurnMeta {
                    input_tokens,
                    output_tokens,
                    cost_usd,
                    iterations,
                    fallback_model,
                };
                self.on_response(content, meta, context_pressure)
            }
            ServerEvent::SilentComplete => self.on_silent_complete(),
            ServerEvent::Error { content } => self.on_error(content),
            ServerEvent::CommandResult {
                command,
                content,
                context_pressure,
            } => self.on_command_result(command, content, context_pressure),
            ServerEvent::Canvas {
                title,
                canvas_id,
                html,
            } => self.on_canvas(title, canvas_id, html),
        }
    }

    /// Watchdog expiry: discard the open turn and unblock the queue without
    /// raising a protocol-visible terminal outcome.
    pub fn expire_open_turn(&mut self) -> Vec<AssemblerSignal> {
        let Some(turn) = self.open_turn.take() else {
            return Vec::new();
        };
        logging::emit_watchdog_expiry(turn.id);
        self.streamed_chars = 0;
        vec![
            AssemblerSignal::OpenTurnChanged,
            AssemblerSignal::WatchdogDisarm,
            AssemblerSignal::TurnComplete,
        ]
    }

    fn on_typing_start(&mut self) -> Vec<AssemblerSignal> {
        match self.open_turn.as_mut() {
            Some(turn) => turn.status = Some(PLACEHOLDER_PROCESSING.to_string()),
            None => {
                self.open_thinking_turn(PLACEHOLDER_PROCESSING);
            }
        }
        vec![AssemblerSignal::OpenTurnChanged, AssemblerSignal::WatchdogArm]
    }

    fn on_typing_tool(&mut self, tool: Option<String>) -> Vec<AssemblerSignal> {
        let status = match tool {
            Some(name) => format!("Using tool {name}…"),
            None => "Using a tool…".to_string(),
        };
        match self.open_turn.as_mut() {
            Some(turn) => turn.status = Some(status),
            None => {
                self.open_thinking_turn(&status);
            }
        }
        vec![AssemblerSignal::OpenTurnChanged, AssemblerSignal::WatchdogArm]
    }

    fn on_phase(&mut self, phase: &str, detail: Option<String>) -> Vec<AssemblerSignal> {
        if phase == "context_warning" {
            // Independent system turn; the open turn is left alone.
            let text =
                detail.unwrap_or_else(|| "Context window is nearly full.".to_string());
            let id = self.allocate_turn_id();
            let mut signals = vec![AssemblerSignal::TurnFinalized(Turn::finalized(
                id,
                Role::System,
                text,
            ))];
            if self.open_turn.is_some() {
                signals.push(AssemblerSignal::WatchdogArm);
            }
            return signals;
        }

        if phase == "thinking" && self.stream_reasoning {
            if let Some(detail) = detail.as_deref().filter(|d| !d.trim().is_empty()) {
                self.append_reasoning(detail);
                return vec![AssemblerSignal::OpenTurnChanged, AssemblerSignal::WatchdogArm];
            }
        }

        let status = detail.unwrap_or_else(|| format!("{phase}…"));
        match self.open_turn.as_mut() {
            Some(turn) => turn.status = Some(status),
            None => {
                self.open_thinking_turn(&status);
            }
        }
        vec![AssemblerSignal::OpenTurnChanged, AssemblerSignal::WatchdogArm]
    }

    fn on_text_delta(&mut self, content: &str) -> Vec<AssemblerSignal> {
        if self.open_turn.is_none() {
            self.open_thinking_turn(PLACEHOLDER_PROCESSING);
        }
        let leak_id = self.leak_sequence + 1;
        let turn = self.open_turn.as_mut().expect("open turn was just ensured");

        if turn.text_detected_leak {
            // Everything after a detected leak is part of the leaked call.
            return vec![AssemblerSignal::WatchdogArm];
        }

        if turn.lifecycle == Lifecycle::Thinking {
            turn.lifecycle = Lifecycle::Streaming;
            turn.status = None;
        }

        turn.visible_text.push_str(content);
        self.streamed_chars += content.len();

        if let Some(hit) = sanitize::detect_leak(&turn.visible_text) {
            turn.visible_text.truncate(hit.truncate_at);
            turn.text_detected_leak = true;
            logging::emit_leak_detection(turn.id, hit.name.as_deref());
            if let Some(name) = hit.name {
                // The call was never actually dispatched, so it stays running
                // until a real result or finalization resolves it.
                let mut invocation = ToolInvocation::running(
                    format!("text-detected-{leak_id}"),
                    name,
                    hit.partial_input,
                );
                invocation.text_detected = true;
                turn.tools.push(invocation);
                self.leak_sequence = leak_id;
            }
        }

        vec![AssemblerSignal::OpenTurnChanged, AssemblerSignal::WatchdogArm]
    }

    fn on_tool_start(&mut self, tool: String) -> Vec<AssemblerSignal> {
        if self.open_turn.is_none() {
            self.open_thinking_turn(PLACEHOLDER_PROCESSING);
        }
        let turn = self.open_turn.as_mut().expect("open turn was just ensured");
        let id = format!("tool-{}-{}", turn.id, turn.tools.len());
        turn.tools
            .push(ToolInvocation::running(id, tool, serde_json::json!({})));
        vec![AssemblerSignal::OpenTurnChanged, AssemblerSignal::WatchdogArm]
    }

    fn on_tool_end(
        &mut self,
        tool: &str,
        input: Option<serde_json::Value>,
    ) -> Vec<AssemblerSignal> {
        let Some(turn) = self.open_turn.as_mut() else {
            return Vec::new();
        };
        if let Some(invocation) = match_running_invocation(&mut turn.tools, tool) {
            if let Some(input) = input {
                invocation.input = input;
            }
        }
        vec![AssemblerSignal::OpenTurnChanged, AssemblerSignal::WatchdogArm]
    }

    fn on_tool_result(
        &mut self,
        tool: &str,
        result: String,
        is_error: bool,
    ) -> Vec<AssemblerSignal> {
        let Some(turn) = self.open_turn.as_mut() else {
            return Vec::new();
        };
        if let Some(invocation) = match_running_invocation(&mut turn.tools, tool) {
            invocation.state = if is_error {
                ToolState::Errored
            } else {
                ToolState::Completed
            };
            invocation.side_payload = extract_side_payload(tool, &result);
            invocation.result = Some(result);
        }
        vec![AssemblerSignal::OpenTurnChanged, AssemblerSignal::WatchdogArm]
    }

    fn on_response(
        &mut self,
        content: Option<String>,
        meta: TurnMeta,
        pressure: Option<ContextPressure>,
    ) -> Vec<AssemblerSignal> {
        let open = self.open_turn.take();
        let (id, streamed_text, mut tools, reasoning_text, had_leak) = match open {
            Some(turn) => (
                turn.id,
                turn.visible_text,
                turn.tools,
                turn.reasoning_text,
                turn.text_detected_leak,
            ),
            None => (self.allocate_turn_id(), String::new(), Vec::new(), None, false),
        };

        for invocation in &mut tools {
            if invocation.text_detected && invocation.state == ToolState::Running {
                invocation.state = ToolState::Errored;
                invocation.result = Some(LEAK_NOT_EXECUTED_RESULT.to_string());
            }
        }

        let source = content
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(streamed_text);
        let text = sanitize::strip_leaks(&source);

        let mut signals = vec![AssemblerSignal::OpenTurnChanged];
        if !text.is_empty() || !tools.is_empty() {
            let mut turn = Turn::finalized(id, Role::Agent, text);
            turn.tools = tools;
            turn.reasoning_text = reasoning_text;
            turn.text_detected_leak = had_leak;
            turn.meta = if meta.is_empty() { None } else { Some(meta) };
            signals.push(AssemblerSignal::TurnFinalized(turn));
        }
        signals.extend(self.terminal_signals(pressure));
        signals
    }

    fn on_silent_complete(&mut self) -> Vec<AssemblerSignal> {
        self.open_turn = None;
        let mut signals = vec![AssemblerSignal::OpenTurnChanged];
        signals.extend(self.terminal_signals(None));
        signals
    }

    fn on_error(&mut self, content: String) -> Vec<AssemblerSignal> {
        let id = match self.open_turn.take() {
            Some(turn) => turn.id,
            None => self.allocate_turn_id(),
        };
        let mut signals = vec![
            AssemblerSignal::OpenTurnChanged,
            AssemblerSignal::TurnFinalized(Turn::finalized(id, Role::System, content)),
        ];
        signals.extend(self.terminal_signals(None));
        signals
    }

    fn on_command_result(
        &mut self,
        command: Option<String>,
        content: Option<String>,
        pressure: Option<ContextPressure>,
    ) -> Vec<AssemblerSignal> {
        // Replies to out-of-band control frames; the open turn and the queue
        // are untouched.
        let mut signals = Vec::new();
        if let Some(content) = content.filter(|c| !c.trim().is_empty()) {
            let text = match command {
                Some(command) => format!("[{command}] {content}"),
                None => content,
            };
            let id = self.allocate_turn_id();
            signals.push(AssemblerSignal::TurnFinalized(Turn::finalized(
                id,
                Role::System,
                text,
            )));
        }
        if let Some(pressure) = pressure {
            self.context_pressure = Some(pressure);
            signals.push(AssemblerSignal::PressureChanged(pressure));
        }
        signals
    }

    fn on_canvas(
        &mut self,
        title: Option<String>,
        canvas_id: Option<String>,
        html: String,
    ) -> Vec<AssemblerSignal> {
        let id = self.allocate_turn_id();
        let mut turn = Turn::finalized(id, Role::Agent, String::new());
        turn.canvas = Some(CanvasPayload {
            title,
            canvas_id,
            html,
        });
        vec![AssemblerSignal::TurnFinalized(turn)]
    }

    fn terminal_signals(&mut self, pressure: Option<ContextPressure>) -> Vec<AssemblerSignal> {
        self.streamed_chars = 0;
        let mut signals = vec![
            AssemblerSignal::WatchdogDisarm,
            AssemblerSignal::TurnComplete,
        ];
        if let Some(pressure) = pressure {
            self.context_pressure = Some(pressure);
            signals.push(AssemblerSignal::PressureChanged(pressure));
        }
        signals
    }
}
