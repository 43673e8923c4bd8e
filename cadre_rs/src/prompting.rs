//! Interactive confirmation prompts.
//!
//! The prompt is behind a trait so embedders and tests can supply a
//! non-interactive answer. The default implementation refuses to prompt
//! when stdin is not a terminal.

use console::Term;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("No tty available.")]
pub struct NoTty;

pub trait Prompt: Send + Sync {
    /// Asks a yes/no question. `default` is used when the user just hits
    /// enter; with no default the question repeats.
    fn prompt_y_n(&self, message: &str, default: Option<bool>) -> Result<bool, NoTty>;
}

/// Terminal-backed prompt.
#[derive(Debug, Default)]
pub struct StdPrompt;

impl Prompt for StdPrompt {
    fn prompt_y_n(&self, message: &str, default: Option<bool>) -> Result<bool, NoTty> {
        if !console::user_attended() {
            return Err(NoTty);
        }
        let term = Term::stderr();
        let hint = match default {
            Some(true) => "(Y/n)",
            Some(false) => "(y/N)",
            None => "(y/n)",
        };
        loop {
            term.write_str(&format!("{} {}: ", message, hint))
                .map_err(|_| NoTty)?;
            let line = term.read_line().map_err(|_| NoTty)?;
            match line.trim().to_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                "" => {
                    if let Some(answer) = default {
                        return Ok(answer);
                    }
                }
                _ => {}
            }
        }
    }
}

/// Always answers the same way. Intended for tests and scripted runs.
#[derive(Debug)]
pub struct FixedPrompt {
    pub answer: bool,
}

impl Prompt for FixedPrompt {
    fn prompt_y_n(&self, _message: &str, _default: Option<bool>) -> Result<bool, NoTty> {
        Ok(self.answer)
    }
}
