//! Error taxonomy for the framework.
//!
//! Configuration errors are fatal at table-build/compile time. User errors
//! (bad input, failed validators, cancelled confirmations) exit cleanly with
//! a message and no stack trace. Parse errors carry the usage string and use
//! the conventional usage-error exit code.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    /// Bad registration: empty command table, malformed operation reference,
    /// conflicting argument settings. Raised during table build or parser
    /// compile, never at invoke time.
    #[error("{0}")]
    Config(String),

    /// User-fixable error. Reported as a plain message.
    #[error("{0}")]
    User(String),

    /// Parse/usage error. The message already includes the usage string.
    #[error("{0}")]
    Parse(String),

    /// The user declined a confirmation prompt.
    #[error("Operation cancelled.")]
    Cancelled,

    /// Process-level interrupt. Always exit code 1.
    #[error("interrupted")]
    Interrupted,

    /// Unexpected failure escaping a handler.
    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

impl CliError {
    pub fn config(message: impl Into<String>) -> Self {
        CliError::Config(message.into())
    }

    pub fn user(message: impl Into<String>) -> Self {
        CliError::User(message.into())
    }

    /// Map a handler error back into the taxonomy: handlers may surface a
    /// `CliError` through `anyhow`, which must keep its own exit semantics.
    pub fn from_handler(err: anyhow::Error) -> Self {
        match err.downcast::<CliError>() {
            Ok(cli_err) => cli_err,
            Err(other) => CliError::Handler(other),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Parse(_) => 2,
            _ => 1,
        }
    }

    /// True for errors that should never print a backtrace-style report.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, CliError::Handler(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::user("bad input").exit_code(), 1);
        assert_eq!(CliError::Cancelled.exit_code(), 1);
        assert_eq!(CliError::Interrupted.exit_code(), 1);
        assert_eq!(CliError::Parse("usage: x".into()).exit_code(), 2);
        assert_eq!(CliError::config("empty table").exit_code(), 1);
    }

    #[test]
    fn test_from_handler_preserves_cli_error() {
        let inner: anyhow::Error = CliError::user("nope").into();
        let back = CliError::from_handler(inner);
        assert!(matches!(back, CliError::User(_)));
        assert_eq!(back.exit_code(), 1);

        let generic = anyhow::anyhow!("boom");
        assert!(matches!(CliError::from_handler(generic), CliError::Handler(_)));
    }
}
