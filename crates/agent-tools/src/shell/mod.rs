//! Shell Sessions
//!
//! Long-lived external processes the model can start, feed input to,
//! signal and read from across several tool calls.

mod manager;
mod tools;

pub use manager::{
    ExecutionMode, ExitInfo, ShellInstance, ShellListing, ShellManager, ShellOutput, ShellSnapshot,
    ShellStart, parse_signal,
};
pub use tools::{DEFAULT_START_TIMEOUT_MS, ShellInteractTool, ShellStartTool};
