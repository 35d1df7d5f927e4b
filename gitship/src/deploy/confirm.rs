//! Operator confirmation prompts

use dialoguer::Confirm;

use crate::errors::DeployError;

/// Asks the operator to confirm a risky action
pub trait Confirmer: Send + Sync {
    /// Whether prompts can be shown at all
    fn is_interactive(&self) -> bool;

    /// Ask a yes/no question, defaulting to no
    fn confirm(&self, prompt: &str) -> Result<bool, DeployError>;
}

/// Prompts on the terminal
#[derive(Debug, Default)]
pub struct TerminalConfirmer;

impl Confirmer for TerminalConfirmer {
    fn is_interactive(&self) -> bool {
        true
    }

    fn confirm(&self, prompt: &str) -> Result<bool, DeployError> {
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| DeployError::Internal(format!("confirmation prompt failed: {}", e)))
    }
}

/// Never prompts; every gate proceeds
#[derive(Debug, Default)]
pub struct NonInteractive;

impl Confirmer for NonInteractive {
    fn is_interactive(&self) -> bool {
        false
    }

    fn confirm(&self, _prompt: &str) -> Result<bool, DeployError> {
        Ok(true)
    }
}

/// Pick the confirmer for a run
pub fn confirmer_for(interactive: bool) -> Box<dyn Confirmer> {
    if interactive {
        Box::new(TerminalConfirmer)
    } else {
        Box::new(NonInteractive)
    }
}
