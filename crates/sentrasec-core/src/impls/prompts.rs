//! Fixed-answer confirmation prompts (scripts, tests, `--yes` flags).

use crate::ports::ConfirmationPrompt;

#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysConfirm;

impl ConfirmationPrompt for AlwaysConfirm {
    fn confirm(&self, _message: &str) -> bool {
        true
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NeverConfirm;

impl ConfirmationPrompt for NeverConfirm {
    fn confirm(&self, _message: &str) -> bool {
        false
    }
}
