//! Client-side reconstruction engine for the agent webchat streaming protocol.
//!
//! The backend emits a flat stream of heterogeneous events (typing signals,
//! text fragments, tool lifecycle, terminal outcomes). This crate folds that
//! stream back into an ordered transcript of turns, serializes user
//! submissions against one-at-a-time backend processing, and neutralizes
//! tool-call syntax that some models leak into plain text.
//!
//! Rendering, transports, uploads, and auth live outside this crate; the
//! [`session::SessionTransport`] trait and [`api::ControlClient`] are the
//! seams they plug into.

pub mod api;
pub mod commands;
pub mod config;
pub mod engine;
pub mod queue;
pub mod sanitize;
pub mod session;
pub mod state;
pub mod types;
pub mod util;
pub mod watchdog;

#[cfg(test)]
pub mod test_support;
