mod assembler;
mod turn;

pub use assembler::{Assembler, AssemblerSignal, LEAK_NOT_EXECUTED_RESULT};
pub use turn::{
    CanvasPayload, Lifecycle, Role, SidePayload, ToolInvocation, ToolState, Turn, TurnMeta,
};
