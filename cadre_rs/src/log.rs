//! Logging setup and the `--verbose` / `--debug` global flags.
//!
//! The flags are registered as global arguments so every command accepts
//! them; their dests carry a leading underscore so they never reach command
//! handlers. Because the subscriber must exist before the command table is
//! even built, verbosity is read with a raw scan of argv rather than from
//! the parsed namespace.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::arguments::{ArgAction, ArgType, CommandArgument};
use crate::events::{EventPayload, EventRegistry, EVENT_PARSER_GLOBAL_CREATE};

pub const VERBOSE_DEST: &str = "_verbose";
pub const DEBUG_DEST: &str = "_debug";

#[derive(Clone, Debug, Default)]
pub struct CliLogging;

impl CliLogging {
    pub fn register(events: &mut EventRegistry) {
        events.register(
            EVENT_PARSER_GLOBAL_CREATE,
            Arc::new(|payload: &mut EventPayload<'_>| {
                if let EventPayload::GlobalArguments(global) = payload {
                    if let Ok(arg) = CommandArgument::new(
                        VERBOSE_DEST,
                        ArgType::new()
                            .options(&["--verbose"])
                            .action(ArgAction::StoreTrue)
                            .default_value(false)
                            .help("Increase logging verbosity. Use --debug for full debug logs."),
                    ) {
                        global.add(arg);
                    }
                    if let Ok(arg) = CommandArgument::new(
                        DEBUG_DEST,
                        ArgType::new()
                            .options(&["--debug"])
                            .action(ArgAction::StoreTrue)
                            .default_value(false)
                            .help("Show debug logs."),
                    ) {
                        global.add(arg);
                    }
                }
            }),
        );
    }

    /// Initializes the subscriber once per process; later calls are no-ops.
    /// `RUST_LOG` wins over the flag-derived level.
    pub fn configure(&self, args: &[String]) {
        let level = if args.iter().any(|a| a == "--debug") {
            "debug"
        } else if args.iter().any(|a| a == "--verbose") {
            "info"
        } else {
            "warn"
        };
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .ok();
    }
}
