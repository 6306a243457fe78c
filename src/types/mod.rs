mod events;

pub use events::{ClientFrame, ContextPressure, ServerEvent, TypingState};
