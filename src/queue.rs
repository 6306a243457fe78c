use std::collections::VecDeque;

/// A queued outbound user message awaiting dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub text: String,
    pub attachment_refs: Vec<String>,
    pub image_refs: Vec<String>,
}

impl Submission {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment_refs: Vec::new(),
            image_refs: Vec::new(),
        }
    }
}

/// Serializes user submissions against one-at-a-time backend processing.
///
/// The backend handles a single turn at a time, so while one is in flight
/// further submissions are parked in FIFO order and dispatched as each turn
/// resolves.
#[derive(Debug, Default)]
pub struct SubmissionQueue {
    in_flight: bool,
    pending: VecDeque<Submission>,
}

impl SubmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the submission to dispatch right now, or `None` if a turn is
    /// in flight and it was queued instead.
    pub fn submit(&mut self, submission: Submission) -> Option<Submission> {
        if self.in_flight {
            self.pending.push_back(submission);
            return None;
        }
        self.in_flight = true;
        Some(submission)
    }

    /// Called on every terminal signal. Returns the next queued submission to
    /// dispatch, keeping the in-flight flag set; clears it when idle.
    pub fn on_turn_complete(&mut self) -> Option<Submission> {
        match self.pending.pop_front() {
            Some(next) => Some(next),
            None => {
                self.in_flight = false;
                None
            }
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn queued_len(&self) -> usize {
        self.pending.len()
    }
}
