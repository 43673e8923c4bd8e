//! One command execution, from raw argv to a result item.
//!
//! The invoker drives the fixed pipeline: build the command table, load the
//! matched command's arguments, compile the parser, parse, validate,
//! confirm, dispatch, shape the result. Events fire at each boundary so
//! extensions can observe or rewrite the state in flight.

use std::collections::HashSet;

use colored::Colorize;
use serde_json::Value;

use crate::arguments::ArgValidator;
use crate::cli::Cli;
use crate::commands::{
    CliCommand, CommandsLoader, Confirmation, Params, CONFIRM_YES_DEST,
};
use crate::errors::{CliError, CliResult};
use crate::events::{
    EventPayload, EVENT_COMMAND_CANCELLED, EVENT_INVOKER_CMD_TBL_LOADED,
    EVENT_INVOKER_FILTER_RESULT, EVENT_INVOKER_POST_CMD_TBL_CREATE,
    EVENT_INVOKER_POST_PARSE_ARGS, EVENT_INVOKER_PRE_CMD_TBL_CREATE,
    EVENT_INVOKER_PRE_PARSE_ARGS, EVENT_INVOKER_TRANSFORM_RESULT,
};
use crate::help::HelpPage;
use crate::output::{OutputFormat, OUTPUT_FORMAT_DEST};
use crate::parser::{CliCommandParser, GlobalArgs, Namespace, ParseOutcome, ParseResult};
use crate::util::{wrap_result, CommandResultItem};

const DEFAULT_CONFIRM_MESSAGE: &str = "Are you sure you want to perform this operation?";

/// Dest of the `--query` global argument. The expression itself is opaque
/// to the core; an embedder-provided result-filter event handler applies it.
pub const QUERY_DEST: &str = "_query";

/// What one invocation produced.
#[derive(Debug)]
pub enum Execution {
    Help(HelpPage),
    Result(Option<CommandResultItem>),
}

/// Typed facts about the in-flight invocation.
#[derive(Clone, Debug)]
pub struct InvocationData {
    pub command: String,
    pub output_format: OutputFormat,
    /// Set by embedders that post-filter results; suppresses the table
    /// transformer so the filtered shape is rendered as-is.
    pub query_active: bool,
}

impl Default for InvocationData {
    fn default() -> Self {
        InvocationData {
            command: String::new(),
            output_format: OutputFormat::Json,
            query_active: false,
        }
    }
}

pub struct CommandInvoker<'a> {
    cli: &'a Cli,
    pub commands_loader: CommandsLoader,
    pub data: InvocationData,
}

impl<'a> CommandInvoker<'a> {
    pub fn new(cli: &'a Cli) -> Self {
        CommandInvoker {
            cli,
            commands_loader: CommandsLoader::new(),
            data: InvocationData::default(),
        }
    }

    pub fn execute(&mut self, args: &[String]) -> CliResult<Execution> {
        let events = self.cli.events();
        let mut argv: Vec<String> = args.to_vec();
        if argv.first().map(String::as_str) == Some("help") {
            argv.remove(0);
            argv.push("--help".to_string());
        }

        events.raise(
            EVENT_INVOKER_PRE_CMD_TBL_CREATE,
            &mut EventPayload::Args(&argv),
        );
        let hook = std::sync::Arc::clone(self.cli.commands_hook());
        self.commands_loader
            .load_command_table(events, |loader| hook(loader))?;
        events.raise(
            EVENT_INVOKER_POST_CMD_TBL_CREATE,
            &mut EventPayload::CommandTable(&mut self.commands_loader.command_table),
        );

        // Only the matched command's arguments are loaded; the rest of the
        // table stays cheap descriptors.
        let command_name = self.rudimentary_get_command(&argv);
        if !command_name.is_empty() {
            if let Some(hook) = self.cli.arguments_hook() {
                hook(&mut self.commands_loader, &command_name)?;
            }
            self.commands_loader.load_arguments(&command_name, events)?;
        }
        events.raise(
            EVENT_INVOKER_CMD_TBL_LOADED,
            &mut EventPayload::CommandTable(&mut self.commands_loader.command_table),
        );

        let global = GlobalArgs::create(events);
        let parser = CliCommandParser::load_command_table(
            &self.commands_loader,
            &global,
            self.cli.name(),
            self.cli.version(),
        )?;

        events.raise(EVENT_INVOKER_PRE_PARSE_ARGS, &mut EventPayload::Args(&argv));
        let outcome = match parser.parse(&argv)? {
            ParseResult::Help(page) => return Ok(Execution::Help(page)),
            ParseResult::Matched(outcome) => outcome,
        };
        let ParseOutcome {
            mut namespace,
            command,
            argument_validators,
            prog,
        } = *outcome;
        events.raise(
            EVENT_INVOKER_POST_PARSE_ARGS,
            &mut EventPayload::ParsedArgs(&namespace),
        );

        self.data.command = namespace.command.clone();
        if let Some(Value::String(format)) = namespace.get(OUTPUT_FORMAT_DEST) {
            self.data.output_format = format.parse()?;
        }
        self.data.query_active = matches!(namespace.get(QUERY_DEST), Some(Value::String(_)));

        self.validate(&mut namespace, &command, &argument_validators, &prog)?;
        self.emit_status_warnings(&namespace);

        let params = filter_params(&namespace);
        self.confirm(&command, &namespace, &params)?;

        tracing::debug!(command = namespace.command.as_str(), "dispatching");
        let raw = (command.handler)(&params).map_err(CliError::from_handler)?;

        let mut value = wrap_result(&raw, false);
        events.raise(
            EVENT_INVOKER_TRANSFORM_RESULT,
            &mut EventPayload::Result(&mut value),
        );
        events.raise(
            EVENT_INVOKER_FILTER_RESULT,
            &mut EventPayload::Result(&mut value),
        );

        Ok(Execution::Result(Some(CommandResultItem {
            result: value,
            table_transformer: command.table_transformer.clone(),
            is_query_active: self.data.query_active,
        })))
    }

    /// Longest leading run of non-flag tokens that names a table entry.
    /// Used to decide which command to load arguments for, before the real
    /// parse happens.
    fn rudimentary_get_command(&self, argv: &[String]) -> String {
        let mut parts: Vec<String> = Vec::new();
        for token in argv {
            if token.starts_with('-') {
                break;
            }
            parts.push(token.to_lowercase());
        }
        while !parts.is_empty() {
            let candidate = parts.join(" ");
            if self.commands_loader.command_table.contains_key(&candidate) {
                return candidate;
            }
            parts.pop();
        }
        String::new()
    }

    /// A command-level validator replaces the per-argument ones entirely.
    /// Validator failures that are not already CLI errors are normalized to
    /// parse errors so they exit with the argparse convention.
    fn validate(
        &self,
        namespace: &mut Namespace,
        command: &CliCommand,
        argument_validators: &[ArgValidator],
        prog: &str,
    ) -> CliResult<()> {
        let result = match &command.validator {
            Some(validator) => validator(namespace),
            None => argument_validators
                .iter()
                .try_for_each(|validator| validator(namespace)),
        };
        result.map_err(|error| match error.downcast::<CliError>() {
            Ok(cli_error) => cli_error,
            Err(other) => CliError::Parse(format!("{}: error: {}", prog, other)),
        })
    }

    fn emit_status_warnings(&self, namespace: &Namespace) {
        let statuses = self.commands_loader.effective_statuses(&namespace.command);
        let mut messages: Vec<(String, colored::Color)> = Vec::new();
        if let Some(info) = &statuses.deprecate_info {
            messages.push((info.message(), info.color()));
        }
        if let Some(info) = &statuses.preview_info {
            messages.push((info.message(), info.color()));
        }
        if let Some(info) = &statuses.experimental_info {
            messages.push((info.message(), info.color()));
        }
        for info in &namespace.argument_deprecations {
            messages.push((info.message(), info.color()));
        }
        let mut seen: HashSet<String> = HashSet::new();
        for (message, color) in messages {
            if !seen.insert(message.clone()) {
                continue;
            }
            if self.cli.enable_color {
                eprintln!("{}", message.color(color));
            } else {
                eprintln!("{}", message);
            }
        }
    }

    fn confirm(
        &self,
        command: &CliCommand,
        namespace: &Namespace,
        params: &Params,
    ) -> CliResult<()> {
        if command.confirmation.is_none() {
            return Ok(());
        }
        if namespace.get_bool(CONFIRM_YES_DEST) {
            return Ok(());
        }
        if self
            .cli
            .config()
            .get_bool("core", "disable_confirm_prompt", false)
        {
            tracing::debug!("confirmation prompt disabled by config");
            return Ok(());
        }
        let confirmed = match &command.confirmation {
            Confirmation::None => true,
            Confirmation::Custom(predicate) => predicate(params),
            Confirmation::Prompt => self.prompt_y_n(DEFAULT_CONFIRM_MESSAGE),
            Confirmation::Message(message) => self.prompt_y_n(message),
        };
        if confirmed {
            Ok(())
        } else {
            self.cli.events().raise(
                EVENT_COMMAND_CANCELLED,
                &mut EventPayload::Cancelled(&command.name),
            );
            Err(CliError::Cancelled)
        }
    }

    /// With no tty the prompt fails safe: the answer is "no".
    fn prompt_y_n(&self, message: &str) -> bool {
        match self.cli.prompter().prompt_y_n(message, Some(false)) {
            Ok(answer) => answer,
            Err(_) => {
                tracing::warn!("unable to prompt for confirmation, assuming no; pass --yes to proceed");
                false
            }
        }
    }
}

/// Drops everything a handler must not see: underscore-prefixed dests and
/// the reserved bookkeeping keys.
pub fn filter_params(namespace: &Namespace) -> Params {
    namespace
        .values
        .iter()
        .filter(|(key, _)| {
            !key.starts_with('_') && key.as_str() != "func" && key.as_str() != "command"
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
