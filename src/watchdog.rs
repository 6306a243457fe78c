use std::time::Duration;
use tokio::time::Instant;

/// Bounds how long an open turn may sit without a progress event.
///
/// Armed when a turn opens, re-armed on every progress event, disarmed on
/// typing-stop and on terminal events. Expiry is a local safety valve: the
/// open turn is discarded and the queue unblocked, but no protocol-visible
/// terminal outcome is raised.
#[derive(Debug)]
pub struct Watchdog {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl Watchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    /// Start or restart the countdown from `now`.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.timeout);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn expired(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if now >= deadline)
    }
}
