//! Shell completion hook.
//!
//! When the completion environment variable is set, argv is taken from
//! `COMP_LINE` instead of the process arguments, letting a shell completion
//! script drive the parser.

use std::env;
use std::sync::Arc;

/// Input handed to an argument completer.
#[derive(Clone, Debug)]
pub struct CompletionContext {
    /// The partial token being completed.
    pub prefix: String,
    /// The command path the token belongs to.
    pub command: String,
}

/// Produces completion candidates for one argument.
pub type Completer = Arc<dyn Fn(&CompletionContext) -> Vec<String> + Send + Sync>;

#[derive(Clone, Debug)]
pub struct CliCompletion {
    env_name: String,
}

impl CliCompletion {
    pub fn new(cli_name: &str) -> Self {
        let mut env_name: String = cli_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        env_name.push_str("_COMPLETE");
        CliCompletion { env_name }
    }

    pub fn enabled(&self) -> bool {
        env::var_os(&self.env_name).is_some()
    }

    /// The argv to parse when running under completion, split out of
    /// `COMP_LINE` with the program name dropped.
    pub fn get_completion_args(&self) -> Option<Vec<String>> {
        if !self.enabled() {
            return None;
        }
        let line = env::var("COMP_LINE").ok()?;
        let args: Vec<String> = line
            .split_whitespace()
            .skip(1)
            .map(|t| t.to_string())
            .collect();
        Some(args)
    }
}
