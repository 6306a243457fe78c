mod core;
mod state;
mod streaming;
mod tools;


pub use self::core::LEAK_NOT_EXECUTED_RESULT;
pub use state::{Assembler, AssemblerSignal};
