//! The CLI application object.
//!
//! Owns the ambient pieces (config, events, logging, output, prompting,
//! completion) and the hooks that populate a [`CommandsLoader`]. `invoke`
//! is the process entry point and maps every outcome to an exit code;
//! `execute` returns the structured result for embedding and tests.

use std::sync::Arc;

use colored::Colorize;

use crate::arguments::{ArgType, CommandArgument};
use crate::commands::CommandsLoader;
use crate::completion::CliCompletion;
use crate::config::CliConfig;
use crate::errors::{CliError, CliResult};
use crate::events::{
    EventHandler, EventPayload, EventRegistry, EVENT_CLI_POST_EXECUTE, EVENT_CLI_PRE_EXECUTE,
    EVENT_CLI_SUCCESSFUL_EXECUTE, EVENT_PARSER_GLOBAL_CREATE,
};
use crate::invocation::{CommandInvoker, Execution, InvocationData, QUERY_DEST};
use crate::log::CliLogging;
use crate::output::OutputProducer;
use crate::prompting::{Prompt, StdPrompt};

/// Populates the command table and handler registry.
pub type CommandsHook = Arc<dyn Fn(&mut CommandsLoader) -> CliResult<()> + Send + Sync>;

/// Registers argument overrides for the command about to run. Called with
/// the matched command path before its arguments are loaded.
pub type ArgumentsHook = Arc<dyn Fn(&mut CommandsLoader, &str) -> CliResult<()> + Send + Sync>;

pub struct Cli {
    name: String,
    version: String,
    config: CliConfig,
    events: EventRegistry,
    pub output: OutputProducer,
    pub logging: CliLogging,
    pub completion: CliCompletion,
    pub enable_color: bool,
    prompter: Arc<dyn Prompt>,
    commands_hook: CommandsHook,
    arguments_hook: Option<ArgumentsHook>,
}

/// Structured outcome of one `execute` call.
#[derive(Debug)]
pub struct Invocation {
    pub execution: Execution,
    pub data: InvocationData,
}

impl Cli {
    /// Builds a CLI around an explicit config. The environment variable
    /// prefix and completion hook are derived from `name`.
    pub fn new(name: &str, version: &str, config: CliConfig, commands_hook: CommandsHook) -> Cli {
        let mut events = EventRegistry::new();
        CliLogging::register(&mut events);
        OutputProducer::register(&mut events, &config.get_default("core", "output", "json"));
        register_query_argument(&mut events);
        let enable_color = !config.get_bool("core", "no_color", false);
        Cli {
            name: name.to_string(),
            version: version.to_string(),
            config,
            events,
            output: OutputProducer,
            logging: CliLogging,
            completion: CliCompletion::new(name),
            enable_color,
            prompter: Arc::new(StdPrompt),
            commands_hook,
            arguments_hook: None,
        }
    }

    /// Convenience constructor using the `~/.<name>` config directory.
    pub fn with_default_config(
        name: &str,
        version: &str,
        commands_hook: CommandsHook,
    ) -> CliResult<Cli> {
        let config = CliConfig::new(
            &name.to_uppercase().replace('-', "_"),
            &CliConfig::default_dir(name),
        )?;
        Ok(Cli::new(name, version, config, commands_hook))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn config(&self) -> &CliConfig {
        &self.config
    }

    pub fn events(&self) -> &EventRegistry {
        &self.events
    }

    pub fn register_event(&mut self, event_name: &str, handler: EventHandler) {
        self.events.register(event_name, handler);
    }

    pub fn set_arguments_hook(&mut self, hook: ArgumentsHook) {
        self.arguments_hook = Some(hook);
    }

    pub fn set_prompter(&mut self, prompter: Arc<dyn Prompt>) {
        self.prompter = prompter;
    }

    pub(crate) fn commands_hook(&self) -> &CommandsHook {
        &self.commands_hook
    }

    pub(crate) fn arguments_hook(&self) -> Option<&ArgumentsHook> {
        self.arguments_hook.as_ref()
    }

    pub(crate) fn prompter(&self) -> &dyn Prompt {
        self.prompter.as_ref()
    }

    /// Runs one invocation and returns the structured outcome. No printing
    /// happens here.
    pub fn execute(&self, args: &[String]) -> CliResult<Invocation> {
        let mut invoker = CommandInvoker::new(self);
        let execution = invoker.execute(args)?;
        Ok(Invocation {
            execution,
            data: invoker.data,
        })
    }

    /// Full entry point: configures logging, runs the invocation, prints
    /// the result or error, and returns the process exit code.
    pub fn invoke(&self, args: &[String]) -> i32 {
        self.logging.configure(args);
        self.events
            .raise(EVENT_CLI_PRE_EXECUTE, &mut EventPayload::Args(args));

        let argv = self
            .completion
            .get_completion_args()
            .unwrap_or_else(|| args.to_vec());

        let code = if matches!(argv.first().map(String::as_str), Some("--version" | "-V")) {
            println!("{} {}", self.name, self.version);
            0
        } else {
            match self.execute(&argv) {
                Ok(invocation) => {
                    self.events
                        .raise(EVENT_CLI_SUCCESSFUL_EXECUTE, &mut EventPayload::Args(&argv));
                    self.render(invocation)
                }
                Err(error) => self.report_error(&error),
            }
        };

        self.events
            .raise(EVENT_CLI_POST_EXECUTE, &mut EventPayload::Args(args));
        code
    }

    fn render(&self, invocation: Invocation) -> i32 {
        match invocation.execution {
            Execution::Help(page) => {
                print!("{}", page.render(self.enable_color));
                0
            }
            Execution::Result(Some(item)) => {
                match self.output.produce(&item, invocation.data.output_format) {
                    Ok(text) => {
                        print!("{}", text);
                        0
                    }
                    Err(error) => self.report_error(&error),
                }
            }
            Execution::Result(None) => 0,
        }
    }

    fn report_error(&self, error: &CliError) -> i32 {
        let message = match error {
            CliError::Cancelled => "Operation cancelled.".to_string(),
            CliError::Interrupted => String::new(),
            other => other.to_string(),
        };
        if !message.is_empty() {
            if self.enable_color {
                eprintln!("{}", message.red());
            } else {
                eprintln!("{}", message);
            }
        }
        error.exit_code()
    }
}

/// The `--query` flag is accepted on every command but never interpreted by
/// the core; embedders apply the expression from a result-filter handler.
fn register_query_argument(events: &mut EventRegistry) {
    events.register(
        EVENT_PARSER_GLOBAL_CREATE,
        Arc::new(|payload: &mut EventPayload<'_>| {
            if let EventPayload::GlobalArguments(global) = payload {
                if let Ok(arg) = CommandArgument::new(
                    QUERY_DEST,
                    ArgType::new()
                        .options(&["--query"])
                        .help("Query expression applied to the result."),
                ) {
                    global.add(arg);
                }
            }
        }),
    );
}
