//! Top-level wiring: one engine per conversation.
//!
//! The engine owns the assembler, the submission queue, the stuck-turn
//! watchdog, the live session, and the one-shot control client, and routes
//! between them. The assembler stays synchronous and pure; everything that
//! needs a clock or a socket happens here.

use crate::api::ControlClient;
use crate::commands::{self, CommandAction, LocalCommand, OneShotCommand};
use crate::config::Config;
use crate::queue::{Submission, SubmissionQueue};
use crate::session::{ConnectionSession, ConnectionState, SessionTransport};
use crate::state::{Assembler, AssemblerSignal, Turn};
use crate::types::{ClientFrame, ContextPressure, ServerEvent};
use crate::watchdog::Watchdog;
use anyhow::{bail, Result};
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub struct ChatEngine {
    assembler: Assembler,
    queue: SubmissionQueue,
    session: ConnectionSession,
    control: ControlClient,
    watchdog: Watchdog,
    transcript: Vec<Turn>,
}

impl ChatEngine {
    pub fn new(config: &Config, transport: Arc<dyn SessionTransport>) -> Self {
        Self {
            assembler: Assembler::new(config.stream_reasoning),
            queue: SubmissionQueue::new(),
            session: ConnectionSession::new(transport),
            control: ControlClient::new(config),
            watchdog: Watchdog::new(config.watchdog_timeout),
            transcript: Vec::new(),
        }
    }

    pub fn connect(&mut self, target: &str) -> Result<()> {
        self.session.bind(target)
    }

    pub fn disconnect(&mut self) {
        self.session.unbind();
    }

    /// Route one line of user input: local command, one-shot call, control
    /// frame, or ordinary submission.
    pub async fn handle_input(&mut self, input: &str) -> Result<()> {
        match commands::interpret(input) {
            CommandAction::Local(LocalCommand::Help) => {
                self.push_system_turn(commands::help_text());
            }
            CommandAction::Local(LocalCommand::Clear) => {
                self.transcript.clear();
            }
            CommandAction::OneShot(command) => match self.run_one_shot(command).await {
                Ok(reply) => self.push_system_turn(&render_one_shot_reply(&reply)),
                Err(error) => self.push_system_turn(&format!("Command failed: {error}")),
            },
            CommandAction::Control { command, args } => {
                // Bypasses the queue; usable while a turn is in flight.
                let sent = self.session.send(&ClientFrame::Command {
                    command: command.clone(),
                    args,
                });
                if !sent {
                    self.run_control_fallback(&command).await;
                }
            }
            CommandAction::Passthrough => {
                self.submit(Submission::text(input.trim())).await?;
            }
        }
        Ok(())
    }

    /// Enqueue a user submission. The user turn lands in the transcript
    /// immediately; dispatch waits for its queue slot.
    pub async fn submit(&mut self, submission: Submission) -> Result<()> {
        let user_turn = self.assembler.new_user_turn(&submission.text);
        self.transcript.push(user_turn);
        if let Some(next) = self.queue.submit(submission) {
            self.dispatch(next).await?;
        }
        Ok(())
    }

    /// Consume one inbound server event and act on the resulting signals.
    pub async fn handle_event(&mut self, event: ServerEvent) -> Result<()> {
        let signals = self.assembler.apply_event(event);
        if let Some(next) = self.apply_signals(signals) {
            self.dispatch(next).await?;
        }
        Ok(())
    }

    /// Discard the open turn if the stuck-turn window has elapsed. The queue
    /// is unblocked so later submissions are not stranded behind a turn whose
    /// terminal event will never arrive.
    pub async fn poll_watchdog(&mut self, now: Instant) -> Result<()> {
        if !self.watchdog.expired(now) {
            return Ok(());
        }
        self.watchdog.disarm();
        let signals = self.assembler.expire_open_turn();
        if let Some(next) = self.apply_signals(signals) {
            self.dispatch(next).await?;
        }
        Ok(())
    }

    /// Drive the bound session to completion: inbound events plus the
    /// watchdog deadline, until cancellation or stream end.
    pub async fn run(&mut self) -> Result<()> {
        let Some(mut events) = self.session.take_events() else {
            bail!("no event stream; bind a target before running");
        };
        let cancel = self.session.cancel_token();

        loop {
            let deadline = self.watchdog.deadline();
            // select! evaluates disabled branches, so feed sleep_until a
            // placeholder deadline when the watchdog is idle.
            let sleep_deadline =
                deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep_until(sleep_deadline), if deadline.is_some() => {
                    self.poll_watchdog(Instant::now()).await?;
                }
                next = events.next() => match next {
                    Some(Ok(event)) => self.handle_event(event).await?,
                    Some(Err(error)) => {
                        self.session.mark_disconnected();
                        self.push_system_turn(&format!("Connection lost: {error}"));
                        break;
                    }
                    None => {
                        self.session.mark_disconnected();
                        break;
                    }
                },
            }
        }
        Ok(())
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn open_turn(&self) -> Option<&Turn> {
        self.assembler.open_turn()
    }

    pub fn context_pressure(&self) -> Option<ContextPressure> {
        self.assembler.context_pressure()
    }

    pub fn is_turn_in_flight(&self) -> bool {
        self.queue.is_in_flight()
    }

    pub fn queued_len(&self) -> usize {
        self.queue.queued_len()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn watchdog_deadline(&self) -> Option<Instant> {
        self.watchdog.deadline()
    }

    /// Send one submission, falling back to the one-shot request path when
    /// the live connection is down. The loop replaces async recursion: a
    /// fallback response resolves the turn inline, which may release the
    /// next queued submission.
    async fn dispatch(&mut self, submission: Submission) -> Result<()> {
        let mut next = Some(submission);
        while let Some(submission) = next.take() {
            let frame = ClientFrame::Message {
                content: submission.text.clone(),
                attachments: submission.attachment_refs.clone(),
                images: submission.image_refs.clone(),
            };
            if self.session.send(&frame) {
                break;
            }

            self.push_system_turn("Live connection unavailable; sent as a one-shot request.");
            let signals = match self.control.send_message(&submission).await {
                Ok(reply) => {
                    let content = reply
                        .get("content")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    // Reuses the normal finalization path so sanitization and
                    // metadata handling apply to fallback replies too.
                    self.assembler.apply_event(ServerEvent::Response {
                        content,
                        input_tokens: reply.get("input_tokens").and_then(Value::as_u64),
                        output_tokens: reply.get("output_tokens").and_then(Value::as_u64),
                        cost_usd: reply.get("cost_usd").and_then(Value::as_f64),
                        iterations: reply
                            .get("iterations")
                            .and_then(Value::as_u64)
                            .and_then(|v| u32::try_from(v).ok()),
                        fallback_model: None,
                        context_pressure: None,
                    })
                }
                Err(error) => {
                    self.push_system_turn(&format!("Failed to deliver message: {error}"));
                    self.assembler.apply_event(ServerEvent::SilentComplete)
                }
            };
            next = self.apply_signals(signals);
        }
        Ok(())
    }

    /// A control frame that could not ride the live connection. Stop has a
    /// one-shot equivalent; other control frames need the wire.
    async fn run_control_fallback(&mut self, command: &str) {
        if command == "stop" {
            match self.control.stop_run().await {
                Ok(reply) => self.push_system_turn(&render_one_shot_reply(&reply)),
                Err(error) => self.push_system_turn(&format!("Stop request failed: {error}")),
            }
            return;
        }
        self.push_system_turn(&format!("Not connected; '/{command}' was not sent."));
    }

    async fn run_one_shot(&self, command: OneShotCommand) -> Result<Value> {
        match command {
            OneShotCommand::Reset => self.control.reset_session().await,
            OneShotCommand::Compact => self.control.compact_session().await,
            OneShotCommand::Status => self.control.status().await,
            OneShotCommand::Usage => self.control.usage().await,
            OneShotCommand::Budget => self.control.budget().await,
            OneShotCommand::Model { name } => self.control.model(name.as_deref()).await,
        }
    }

    /// Fold assembler signals into engine state. Returns the next queued
    /// submission when a terminal signal freed the queue slot.
    fn apply_signals(&mut self, signals: Vec<AssemblerSignal>) -> Option<Submission> {
        let mut next = None;
        for signal in signals {
            match signal {
                AssemblerSignal::OpenTurnChanged => {}
                AssemblerSignal::TurnFinalized(turn) => self.transcript.push(turn),
                AssemblerSignal::TurnComplete => {
                    if let Some(submission) = self.queue.on_turn_complete() {
                        next = Some(submission);
                    }
                }
                AssemblerSignal::PressureChanged(_) => {
                    // Already mirrored in the assembler; hosts read it via
                    // context_pressure().
                }
                AssemblerSignal::WatchdogArm => self.watchdog.arm(Instant::now()),
                AssemblerSignal::WatchdogDisarm => self.watchdog.disarm(),
            }
        }
        next
    }

    fn push_system_turn(&mut self, text: &str) {
        let turn = self.assembler.new_system_turn(text);
        self.transcript.push(turn);
    }
}

/// Command replies carry either a human-readable `content` string or an
/// arbitrary JSON document worth showing verbatim.
fn render_one_shot_reply(reply: &Value) -> String {
    if let Some(content) = reply.get("content").and_then(Value::as_str) {
        if !content.trim().is_empty() {
            return content.to_string();
        }
    }
    serde_json::to_string_pretty(reply).unwrap_or_else(|_| reply.to_string())
}
