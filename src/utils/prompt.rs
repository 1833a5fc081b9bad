//! Yes/no confirmation before expensive or destructive steps.
//!
//! Batch mode never touches the terminal, so CI runs cannot block on input.

use anyhow::Result;
use std::io::{self, BufRead, Write};
use tracing::debug;

/// Whether the operator is present to answer questions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Interactive,
    Batch,
}

impl RunMode {
    pub fn from_batch_flag(batch: bool) -> Self {
        if batch {
            RunMode::Batch
        } else {
            RunMode::Interactive
        }
    }
}

/// Source of yes/no answers
pub trait Prompt {
    fn ask_yes_no(&self, message: &str) -> Result<bool>;
}

/// Reads the answer from stdin, defaulting to "no"
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn ask_yes_no(&self, message: &str) -> Result<bool> {
        print!("{} [y/N] ", message);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().lock().read_line(&mut input)?;
        Ok(parse_answer(&input))
    }
}

/// Empty input is the default answer, which is always "no"
fn parse_answer(input: &str) -> bool {
    input.trim().to_lowercase().starts_with('y')
}

pub struct ConfirmationGate<P> {
    mode: RunMode,
    prompt: P,
}

impl<P: Prompt> ConfirmationGate<P> {
    pub fn new(mode: RunMode, prompt: P) -> Self {
        Self { mode, prompt }
    }

    /// Returns true when the step may go ahead. An unreadable answer counts as "no".
    pub fn confirm(&self, message: &str) -> bool {
        match self.mode {
            RunMode::Batch => true,
            RunMode::Interactive => match self.prompt.ask_yes_no(message) {
                Ok(answer) => answer,
                Err(e) => {
                    debug!(err = %e, "could not read confirmation, treating as no");
                    false
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct ScriptedPrompt {
        answer: Result<bool, String>,
        asked: RefCell<Vec<String>>,
    }

    impl ScriptedPrompt {
        fn answering(answer: bool) -> Self {
            Self {
                answer: Ok(answer),
                asked: RefCell::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                answer: Err("stdin closed".to_string()),
                asked: RefCell::new(Vec::new()),
            }
        }
    }

    impl Prompt for &ScriptedPrompt {
        fn ask_yes_no(&self, message: &str) -> Result<bool> {
            self.asked.borrow_mut().push(message.to_string());
            self.answer.clone().map_err(anyhow::Error::msg)
        }
    }

    #[test]
    fn test_batch_mode_never_prompts() {
        let prompt = ScriptedPrompt::answering(false);
        let gate = ConfirmationGate::new(RunMode::Batch, &prompt);
        assert!(gate.confirm("Continue?"));
        assert!(gate.confirm("Apply?"));
        assert!(prompt.asked.borrow().is_empty());
    }

    #[test]
    fn test_interactive_mode_uses_answer() {
        let yes = ScriptedPrompt::answering(true);
        assert!(ConfirmationGate::new(RunMode::Interactive, &yes).confirm("Continue?"));
        assert_eq!(yes.asked.borrow().as_slice(), ["Continue?"]);

        let no = ScriptedPrompt::answering(false);
        assert!(!ConfirmationGate::new(RunMode::Interactive, &no).confirm("Continue?"));
    }

    #[test]
    fn test_unreadable_answer_is_no() {
        let prompt = ScriptedPrompt::failing();
        assert!(!ConfirmationGate::new(RunMode::Interactive, &prompt).confirm("Continue?"));
    }

    #[test]
    fn test_parse_answer() {
        assert!(parse_answer("y\n"));
        assert!(parse_answer("Yes"));
        assert!(parse_answer("  YES  "));
        assert!(!parse_answer("\n"));
        assert!(!parse_answer(""));
        assert!(!parse_answer("n"));
        assert!(!parse_answer("maybe"));
    }

    #[test]
    fn test_run_mode_from_batch_flag() {
        assert_eq!(RunMode::from_batch_flag(true), RunMode::Batch);
        assert_eq!(RunMode::from_batch_flag(false), RunMode::Interactive);
    }
}
