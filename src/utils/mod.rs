// Utils module - process execution and operator prompts
pub mod exec;
pub mod prompt;

pub use prompt::{ConfirmationGate, Prompt, RunMode, StdinPrompt};
