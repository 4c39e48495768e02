//! ConfirmationPrompt port - operator confirmation before destructive actions.

pub trait ConfirmationPrompt: Send + Sync {
    fn confirm(&self, message: &str) -> bool;
}
