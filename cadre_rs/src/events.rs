//! Lifecycle events raised through the invocation pipeline.
//!
//! Handlers subscribe by event name and fire in registration order. The
//! payload carries mutable borrows of the pipeline state so handlers can
//! rewrite the command table, argument list, or result in place.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::commands::{CommandTable, LoadedArguments};
use crate::parser::{GlobalArgs, Namespace};

pub const EVENT_CLI_PRE_EXECUTE: &str = "Cli.PreExecute";
pub const EVENT_CLI_SUCCESSFUL_EXECUTE: &str = "Cli.SuccessfulExecute";
pub const EVENT_CLI_POST_EXECUTE: &str = "Cli.PostExecute";

pub const EVENT_INVOKER_PRE_CMD_TBL_CREATE: &str = "CommandInvoker.OnPreCommandTableCreate";
pub const EVENT_INVOKER_POST_CMD_TBL_CREATE: &str = "CommandInvoker.OnPostCommandTableCreate";
pub const EVENT_INVOKER_CMD_TBL_LOADED: &str = "CommandInvoker.OnCommandTableLoaded";
pub const EVENT_INVOKER_PRE_PARSE_ARGS: &str = "CommandInvoker.OnPreParseArgs";
pub const EVENT_INVOKER_POST_PARSE_ARGS: &str = "CommandInvoker.OnPostParseArgs";
pub const EVENT_INVOKER_TRANSFORM_RESULT: &str = "CommandInvoker.OnTransformResult";
pub const EVENT_INVOKER_FILTER_RESULT: &str = "CommandInvoker.OnFilterResult";

pub const EVENT_PARSER_GLOBAL_CREATE: &str = "CommandParser.OnGlobalArgumentsCreate";

pub const EVENT_CMDLOADER_LOAD_COMMAND_TABLE: &str = "CommandLoader.OnLoadCommandTable";
pub const EVENT_CMDLOADER_LOAD_ARGUMENTS: &str = "CommandLoader.OnLoadArguments";

pub const EVENT_COMMAND_CANCELLED: &str = "Command.OnCancelled";

/// What a given event exposes to its handlers.
pub enum EventPayload<'a> {
    /// Raw argv, before table creation or parsing.
    Args(&'a [String]),
    /// The command table, mutable after load.
    CommandTable(&'a mut CommandTable),
    /// Arguments loaded for one command.
    CommandArguments {
        command: &'a str,
        arguments: &'a mut LoadedArguments,
    },
    /// Global arguments under construction.
    GlobalArguments(&'a mut GlobalArgs),
    /// The parsed namespace, after a successful parse.
    ParsedArgs(&'a Namespace),
    /// A handler result flowing through transform/filter.
    Result(&'a mut Value),
    /// A confirmation prompt was declined.
    Cancelled(&'a str),
}

pub type EventHandler = Arc<dyn Fn(&mut EventPayload<'_>) + Send + Sync>;

/// Registry of event subscriptions, keyed by event name.
#[derive(Clone, Default)]
pub struct EventRegistry {
    handlers: IndexMap<String, Vec<EventHandler>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        EventRegistry::default()
    }

    pub fn register(&mut self, event_name: &str, handler: EventHandler) {
        self.handlers
            .entry(event_name.to_string())
            .or_default()
            .push(handler);
    }

    /// Removes a previously registered handler by pointer identity. A no-op
    /// when the handler was never registered for this event.
    pub fn unregister(&mut self, event_name: &str, handler: &EventHandler) {
        if let Some(handlers) = self.handlers.get_mut(event_name) {
            handlers.retain(|h| !Arc::ptr_eq(h, handler));
        }
    }

    /// Fires every handler for `event_name` in registration order.
    pub fn raise(&self, event_name: &str, payload: &mut EventPayload<'_>) {
        tracing::debug!(event = event_name, "raising event");
        if let Some(handlers) = self.handlers.get(event_name) {
            for handler in handlers {
                handler(payload);
            }
        }
    }
}
