use crate::state::turn::{Role, Turn};
use crate::types::ContextPressure;

/// What the assembler wants the host to do after consuming an event.
#[derive(Debug)]
pub enum AssemblerSignal {
    /// The open turn mutated; hosts re-render from [`Assembler::open_turn`].
    OpenTurnChanged,
    /// A turn reached its final form and belongs in the transcript.
    TurnFinalized(Turn),
    /// A terminal outcome occurred; the submission queue may dispatch.
    TurnComplete,
    /// The server pushed a new context pressure level.
    PressureChanged(ContextPressure),
    /// Progress was observed; restart the stuck-turn countdown.
    WatchdogArm,
    WatchdogDisarm,
}

/// Folds the flat server event stream back into turns.
///
/// Holds an explicit reference to the single open turn rather than scanning
/// a message list for it; at most one turn is ever open per session.
pub struct Assembler {
    pub(super) next_turn_id: u64,
    pub(super) open_turn: Option<Turn>,
    pub(super) context_pressure: Option<ContextPressure>,
    pub(super) stream_reasoning: bool,
    /// Chars streamed into the current turn; reset on every terminal event.
    pub(super) streamed_chars: usize,
    pub(super) leak_sequence: u64,
}

impl Assembler {
    pub fn new(stream_reasoning: bool) -> Self {
        Self {
            next_turn_id: 0,
            open_turn: None,
            context_pressure: None,
            stream_reasoning,
            streamed_chars: 0,
            leak_sequence: 0,
        }
    }

    pub fn open_turn(&self) -> Option<&Turn> {
        self.open_turn.as_ref()
    }

    pub fn context_pressure(&self) -> Option<ContextPressure> {
        self.context_pressure
    }

    pub fn streamed_chars(&self) -> usize {
        self.streamed_chars
    }

    /// User turns skip the lifecycle: they are visible and final at submit
    /// time regardless of queue position.
    pub fn new_user_turn(&mut self, text: &str) -> Turn {
        let id = self.allocate_turn_id();
        Turn::finalized(id, Role::User, text.to_string())
    }

    /// Locally-produced system notices (command replies, fallback notes).
    pub fn new_system_turn(&mut self, text: &str) -> Turn {
        let id = self.allocate_turn_id();
        Turn::finalized(id, Role::System, text.to_string())
    }

    pub(super) fn allocate_turn_id(&mut self) -> u64 {
        self.next_turn_id += 1;
        self.next_turn_id
    }
}
