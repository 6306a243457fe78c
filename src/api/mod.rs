pub mod client;
pub mod logging;

pub use client::ControlClient;
