//! Command descriptors, the command table, and the loader that builds it.
//!
//! Commands are registered declaratively through [`CommandSuperGroup`] /
//! [`CommandGroup`] blocks against a [`CommandsLoader`]. Handlers live in a
//! [`HandlerRegistry`] keyed by `module#dotted.path` operation strings, so a
//! command entry stays a cheap descriptor until its arguments are needed.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::arguments::{ArgAction, ArgType, ArgValidator, ArgumentRegistry, CommandArgument};
use crate::errors::{CliError, CliResult};
use crate::events::{
    EventPayload, EventRegistry, EVENT_CMDLOADER_LOAD_ARGUMENTS,
    EVENT_CMDLOADER_LOAD_COMMAND_TABLE,
};
use crate::status::{Deprecated, ExperimentalItem, PreviewItem};
use crate::util::TableTransformer;

/// Parsed argument values a handler receives, keyed by destination name.
pub type Params = IndexMap<String, Value>;

/// A command implementation. Receives the filtered parameter map and
/// produces a JSON-representable result.
pub type Handler = Arc<dyn Fn(&Params) -> anyhow::Result<Value> + Send + Sync>;

/// The fully loaded argument set of one command.
pub type LoadedArguments = IndexMap<String, CommandArgument>;

/// Produces a command's declared arguments on first use.
pub type ArgumentsLoader = Arc<dyn Fn() -> Vec<(String, CommandArgument)> + Send + Sync>;

/// Dest of the auto-registered `--yes` bypass flag.
pub const CONFIRM_YES_DEST: &str = "_confirm_yes";

/// Whether and how a command asks for confirmation before running.
#[derive(Clone, Default)]
pub enum Confirmation {
    #[default]
    None,
    /// Prompt with the default "Are you sure..." message.
    Prompt,
    /// Prompt with a custom message.
    Message(String),
    /// Custom predicate over the parsed parameters. Returning false
    /// cancels the command.
    Custom(Arc<dyn Fn(&Params) -> bool + Send + Sync>),
}

impl Confirmation {
    pub fn is_none(&self) -> bool {
        matches!(self, Confirmation::None)
    }
}

impl std::fmt::Debug for Confirmation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confirmation::None => write!(f, "Confirmation::None"),
            Confirmation::Prompt => write!(f, "Confirmation::Prompt"),
            Confirmation::Message(m) => write!(f, "Confirmation::Message({:?})", m),
            Confirmation::Custom(_) => write!(f, "Confirmation::Custom(..)"),
        }
    }
}

/// Behavior settings shared by group levels and individual commands.
/// A group's settings are cloned into each nested registration, so outer
/// defaults apply unless a more local level overrides them.
#[derive(Clone, Default)]
pub struct CommandSettings {
    pub description: Option<String>,
    pub confirmation: Confirmation,
    pub table_transformer: Option<TableTransformer>,
    pub validator: Option<ArgValidator>,
    pub deprecate_info: Option<Deprecated>,
    pub preview_info: Option<PreviewItem>,
    pub experimental_info: Option<ExperimentalItem>,
    pub hidden: bool,
}

impl CommandSettings {
    pub fn new() -> Self {
        CommandSettings::default()
    }

    pub fn description(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    pub fn confirmation(mut self, confirmation: Confirmation) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn table_transformer(mut self, transformer: TableTransformer) -> Self {
        self.table_transformer = Some(transformer);
        self
    }

    pub fn validator(mut self, validator: ArgValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn deprecated(mut self, info: Deprecated) -> Self {
        self.deprecate_info = Some(info);
        self
    }

    pub fn preview(mut self, info: PreviewItem) -> Self {
        self.preview_info = Some(info);
        self
    }

    pub fn experimental(mut self, info: ExperimentalItem) -> Self {
        self.experimental_info = Some(info);
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

/// One entry in the command table.
#[derive(Clone)]
pub struct CliCommand {
    pub name: String,
    pub description: Option<String>,
    pub handler: Handler,
    pub confirmation: Confirmation,
    pub table_transformer: Option<TableTransformer>,
    pub validator: Option<ArgValidator>,
    pub deprecate_info: Option<Deprecated>,
    pub preview_info: Option<PreviewItem>,
    pub experimental_info: Option<ExperimentalItem>,
    pub hidden: bool,
    arguments: LoadedArguments,
    arguments_loader: Option<ArgumentsLoader>,
    arguments_loaded: bool,
}

impl std::fmt::Debug for CliCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliCommand")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("arguments_loaded", &self.arguments_loaded)
            .field("hidden", &self.hidden)
            .finish()
    }
}

impl CliCommand {
    pub fn new(name: &str, handler: Handler) -> Self {
        CliCommand {
            name: name.to_string(),
            description: None,
            handler,
            confirmation: Confirmation::None,
            table_transformer: None,
            validator: None,
            deprecate_info: None,
            preview_info: None,
            experimental_info: None,
            hidden: false,
            arguments: IndexMap::new(),
            arguments_loader: None,
            arguments_loaded: false,
        }
    }

    pub fn with_arguments_loader(mut self, loader: ArgumentsLoader) -> Self {
        self.arguments_loader = Some(loader);
        self
    }

    /// Runs the arguments loader at most once. Later calls are no-ops.
    pub fn load_arguments(&mut self) {
        if self.arguments_loaded {
            return;
        }
        self.arguments_loaded = true;
        if let Some(loader) = self.arguments_loader.take() {
            for (dest, argument) in loader() {
                self.arguments.insert(dest, argument);
            }
        }
    }

    pub fn add_argument(&mut self, dest: &str, arg_type: ArgType) -> CliResult<()> {
        let argument = CommandArgument::new(dest, arg_type)?;
        self.arguments.insert(dest.to_string(), argument);
        Ok(())
    }

    /// Folds `arg_type` into an already-present argument, or binds a new one.
    pub fn update_argument(&mut self, dest: &str, arg_type: ArgType) -> CliResult<()> {
        match self.arguments.get_mut(dest) {
            Some(existing) => {
                existing.arg_type.update(&arg_type);
                Ok(())
            }
            None => self.add_argument(dest, arg_type),
        }
    }

    pub fn arguments(&self) -> &LoadedArguments {
        &self.arguments
    }

    pub fn arguments_mut(&mut self) -> &mut LoadedArguments {
        &mut self.arguments
    }
}

pub type CommandTable = IndexMap<String, CliCommand>;

/// Status markers attached to a command group path.
#[derive(Clone, Debug, Default)]
pub struct CommandGroupEntry {
    pub deprecate_info: Option<Deprecated>,
    pub preview_info: Option<PreviewItem>,
    pub experimental_info: Option<ExperimentalItem>,
}

pub type CommandGroupTable = IndexMap<String, CommandGroupEntry>;

// ============================================================================
// Handler registry
// ============================================================================

/// A registered operation: the handler plus its declared parameters.
#[derive(Clone)]
pub struct HandlerEntry {
    pub handler: Handler,
    pub arguments: Vec<(String, CommandArgument)>,
}

impl std::fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerEntry").finish_non_exhaustive()
    }
}

/// Maps `module#dotted.path` operation strings to handler entries.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    entries: IndexMap<String, HandlerEntry>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        HandlerRegistry::default()
    }

    /// Registers an operation. An invalid argument declaration (empty dest,
    /// required argument without a long-form option) is a configuration
    /// fault, reported here rather than dropped.
    pub fn register(
        &mut self,
        operation: &str,
        handler: Handler,
        arguments: ArgumentsBuilder,
    ) -> CliResult<()> {
        let arguments = arguments.build()?;
        self.entries
            .insert(operation.to_string(), HandlerEntry { handler, arguments });
        Ok(())
    }

    /// Resolves an operation string. A missing `#` separator or an unknown
    /// operation is a configuration fault, reported immediately rather than
    /// deferred to dispatch.
    pub fn resolve(&self, operation: &str) -> CliResult<&HandlerEntry> {
        if !operation.contains('#') {
            return Err(CliError::config(format!(
                "The operation '{}' is invalid.",
                operation
            )));
        }
        self.entries.get(operation).ok_or_else(|| {
            CliError::config(format!("The operation '{}' is invalid.", operation))
        })
    }
}

/// Declarative builder for an operation's parameter signature.
///
/// `param` declares a required value argument, `param_with_default` an
/// optional one, and `flag` a boolean switch whose action is chosen from
/// its default (false defaults store true, and vice versa). Destinations
/// starting with `_` are declared like any other but never reach the
/// handler's parameter map.
#[derive(Default)]
pub struct ArgumentsBuilder {
    arguments: Vec<(String, ArgType)>,
}

impl ArgumentsBuilder {
    pub fn new() -> Self {
        ArgumentsBuilder::default()
    }

    pub fn param(mut self, dest: &str) -> Self {
        self.arguments.push((dest.to_string(), ArgType::new().required(true)));
        self
    }

    pub fn param_with_default(mut self, dest: &str, default: impl Into<Value>) -> Self {
        self.arguments
            .push((dest.to_string(), ArgType::new().default_value(default)));
        self
    }

    pub fn flag(mut self, dest: &str, default: bool) -> Self {
        let action = if default {
            ArgAction::StoreFalse
        } else {
            ArgAction::StoreTrue
        };
        self.arguments.push((
            dest.to_string(),
            ArgType::new().action(action).default_value(default),
        ));
        self
    }

    pub fn arg(mut self, dest: &str, arg_type: ArgType) -> Self {
        self.arguments.push((dest.to_string(), arg_type));
        self
    }

    fn build(self) -> CliResult<Vec<(String, CommandArgument)>> {
        self.arguments
            .into_iter()
            .map(|(dest, arg_type)| {
                let argument = CommandArgument::new(&dest, arg_type)?;
                Ok((dest, argument))
            })
            .collect()
    }
}

// ============================================================================
// Commands loader
// ============================================================================

/// Builds and owns the command table, group table, and argument registries.
#[derive(Clone, Default)]
pub struct CommandsLoader {
    pub command_table: CommandTable,
    pub command_group_table: CommandGroupTable,
    pub argument_registry: ArgumentRegistry,
    extra_arguments: IndexMap<String, Vec<(String, ArgType)>>,
    pub handlers: HandlerRegistry,
}

impl CommandsLoader {
    pub fn new() -> Self {
        CommandsLoader::default()
    }

    /// Creates one command from an operation string plus its settings and
    /// inserts it into the table under `name` (the full space-separated
    /// path). Names are stored lowercase, matching the case-insensitive
    /// command-path parse.
    pub fn add_command(
        &mut self,
        name: &str,
        operation: &str,
        settings: CommandSettings,
    ) -> CliResult<()> {
        let name = name.to_lowercase();
        let entry = self.handlers.resolve(operation)?;
        let handler = Arc::clone(&entry.handler);
        let signature = entry.arguments.clone();
        let mut command = CliCommand::new(&name, handler)
            .with_arguments_loader(Arc::new(move || signature.clone()));
        command.description = settings.description;
        command.confirmation = settings.confirmation;
        command.table_transformer = settings.table_transformer;
        command.validator = settings.validator;
        command.deprecate_info = settings.deprecate_info;
        command.preview_info = settings.preview_info;
        command.experimental_info = settings.experimental_info;
        command.hidden = settings.hidden;
        self.command_table.insert(name, command);
        Ok(())
    }

    pub fn register_group(&mut self, name: &str, entry: CommandGroupEntry) {
        self.command_group_table.insert(name.to_lowercase(), entry);
    }

    /// Record an extra argument to add to one exact command, beyond its
    /// declared signature.
    pub fn register_extra_argument(&mut self, command: &str, dest: &str, arg_type: ArgType) {
        self.extra_arguments
            .entry(command.to_lowercase())
            .or_default()
            .push((dest.to_string(), arg_type));
    }

    /// Populates the command table through `populate` and announces the
    /// loaded table to subscribers.
    pub fn load_command_table<F>(&mut self, events: &EventRegistry, populate: F) -> CliResult<()>
    where
        F: FnOnce(&mut Self) -> CliResult<()>,
    {
        populate(self)?;
        events.raise(
            EVENT_CMDLOADER_LOAD_COMMAND_TABLE,
            &mut EventPayload::CommandTable(&mut self.command_table),
        );
        Ok(())
    }

    /// Loads and finalizes the arguments of one command: runs the lazy
    /// loader, folds in registry overrides per destination, appends extra
    /// registry arguments, and attaches the confirmation bypass flag.
    pub fn load_arguments(&mut self, command_name: &str, events: &EventRegistry) -> CliResult<()> {
        let Some(command) = self.command_table.get_mut(command_name) else {
            return Ok(());
        };
        command.load_arguments();
        let dests: Vec<String> = command.arguments().keys().cloned().collect();
        for dest in &dests {
            let resolved = self.argument_registry.get_cli_argument(command_name, dest);
            command.update_argument(dest, resolved)?;
        }
        if let Some(extras) = self.extra_arguments.get(command_name) {
            for (dest, arg_type) in extras.clone() {
                command.update_argument(&dest, arg_type)?;
            }
        }
        if !command.confirmation.is_none()
            && !command.arguments().contains_key(CONFIRM_YES_DEST)
        {
            command.add_argument(
                CONFIRM_YES_DEST,
                ArgType::new()
                    .options(&["--yes", "-y"])
                    .action(ArgAction::StoreTrue)
                    .default_value(false)
                    .help("Do not prompt for confirmation."),
            )?;
        }
        events.raise(
            EVENT_CMDLOADER_LOAD_ARGUMENTS,
            &mut EventPayload::CommandArguments {
                command: command_name,
                arguments: command.arguments_mut(),
            },
        );
        Ok(())
    }

    /// Effective status markers for one command: an explicit marker on the
    /// command wins; otherwise the nearest enclosing marked group applies,
    /// rewritten to point at this command.
    pub fn effective_statuses(&self, command_name: &str) -> CommandGroupEntry {
        let explicit = self
            .command_table
            .get(command_name)
            .map(|c| CommandGroupEntry {
                deprecate_info: c.deprecate_info.clone(),
                preview_info: c.preview_info.clone(),
                experimental_info: c.experimental_info.clone(),
            })
            .unwrap_or_default();
        let mut effective = explicit;
        let parts: Vec<&str> = command_name.split_whitespace().collect();
        // Longest prefix first, so the nearest group wins.
        for index in (1..parts.len()).rev() {
            let prefix = parts[0..index].join(" ");
            let Some(group) = self.command_group_table.get(&prefix) else {
                continue;
            };
            if effective.deprecate_info.is_none() {
                if let Some(info) = &group.deprecate_info {
                    effective.deprecate_info = Some(Deprecated::implicit("command", info));
                }
            }
            if effective.preview_info.is_none() {
                if let Some(info) = &group.preview_info {
                    effective.preview_info = Some(PreviewItem::implicit("command", info));
                }
            }
            if effective.experimental_info.is_none() {
                if let Some(info) = &group.experimental_info {
                    effective.experimental_info = Some(ExperimentalItem::implicit("command", info));
                }
            }
        }
        effective
    }

    /// Scoped view for registering argument overrides, mirroring the group
    /// builder pattern on the command side.
    pub fn arguments_context(&mut self, scope: &str) -> ArgumentsContext<'_> {
        ArgumentsContext {
            loader: self,
            scope: scope.to_lowercase(),
        }
    }
}

/// Registers argument overrides against one scope of the command tree.
pub struct ArgumentsContext<'a> {
    loader: &'a mut CommandsLoader,
    scope: String,
}

impl ArgumentsContext<'_> {
    pub fn argument(&mut self, dest: &str, arg_type: ArgType) -> &mut Self {
        self.loader
            .argument_registry
            .register_cli_argument(&self.scope, dest, arg_type);
        self
    }

    /// Hides an argument from help without removing it from the parse.
    pub fn ignore(&mut self, dest: &str) -> &mut Self {
        self.argument(dest, ArgType::new().hidden(true))
    }

    /// Adds a brand-new argument to the exact command at this scope.
    pub fn extra(&mut self, dest: &str, arg_type: ArgType) -> &mut Self {
        self.loader
            .register_extra_argument(&self.scope, dest, arg_type);
        self
    }

    /// Marks an argument of this scope deprecated.
    pub fn deprecate(&mut self, dest: &str, info: Deprecated) -> &mut Self {
        self.argument(dest, ArgType::new().deprecated(info))
    }
}

// ============================================================================
// Group builders
// ============================================================================

/// Top-level registration block. Carries base settings that every nested
/// group and command starts from.
pub struct CommandSuperGroup<'a> {
    loader: &'a mut CommandsLoader,
    settings: CommandSettings,
}

impl<'a> CommandSuperGroup<'a> {
    pub fn new(loader: &'a mut CommandsLoader) -> Self {
        CommandSuperGroup {
            loader,
            settings: CommandSettings::new(),
        }
    }

    pub fn with_settings(loader: &'a mut CommandsLoader, settings: CommandSettings) -> Self {
        CommandSuperGroup { loader, settings }
    }

    /// Opens a named group. Group-level settings are folded over this
    /// super group's settings for everything registered inside.
    pub fn group(
        &mut self,
        name: &str,
        configure: impl FnOnce(&mut CommandGroup<'_>) -> CliResult<()>,
    ) -> CliResult<&mut Self> {
        self.group_with(name, CommandSettings::new(), configure)
    }

    pub fn group_with(
        &mut self,
        name: &str,
        settings: CommandSettings,
        configure: impl FnOnce(&mut CommandGroup<'_>) -> CliResult<()>,
    ) -> CliResult<&mut Self> {
        let merged = merge_settings(&self.settings, settings);
        self.loader.register_group(
            name,
            CommandGroupEntry {
                deprecate_info: merged.deprecate_info.clone(),
                preview_info: merged.preview_info.clone(),
                experimental_info: merged.experimental_info.clone(),
            },
        );
        let mut group = CommandGroup {
            loader: self.loader,
            group_name: name.to_string(),
            settings: merged,
        };
        configure(&mut group)?;
        Ok(self)
    }
}

/// One level of the command tree during registration.
pub struct CommandGroup<'a> {
    loader: &'a mut CommandsLoader,
    group_name: String,
    settings: CommandSettings,
}

impl CommandGroup<'_> {
    pub fn command(&mut self, name: &str, operation: &str) -> CliResult<&mut Self> {
        self.command_with(name, operation, CommandSettings::new())
    }

    /// Registers a command with level-local settings folded over the
    /// group's. A local status marker replaces the group's, never stacks.
    pub fn command_with(
        &mut self,
        name: &str,
        operation: &str,
        settings: CommandSettings,
    ) -> CliResult<&mut Self> {
        let full_name = if self.group_name.is_empty() {
            name.to_string()
        } else {
            format!("{} {}", self.group_name, name)
        };
        let merged = merge_settings(&self.settings, settings);
        self.loader.add_command(&full_name, operation, merged)?;
        Ok(self)
    }

    /// Opens a nested group under this one.
    pub fn group(
        &mut self,
        name: &str,
        settings: CommandSettings,
        configure: impl FnOnce(&mut CommandGroup<'_>) -> CliResult<()>,
    ) -> CliResult<&mut Self> {
        let full_name = if self.group_name.is_empty() {
            name.to_string()
        } else {
            format!("{} {}", self.group_name, name)
        };
        let merged = merge_settings(&self.settings, settings);
        self.loader.register_group(
            &full_name,
            CommandGroupEntry {
                deprecate_info: merged.deprecate_info.clone(),
                preview_info: merged.preview_info.clone(),
                experimental_info: merged.experimental_info.clone(),
            },
        );
        let mut nested = CommandGroup {
            loader: self.loader,
            group_name: full_name,
            settings: merged,
        };
        configure(&mut nested)?;
        Ok(self)
    }
}

/// Local settings win per field; unset locals inherit the outer level.
/// Status markers deliberately do not flow down: a group's marker lives in
/// the group table and reaches nested commands through implicit resolution,
/// which uses the group-derived wording.
fn merge_settings(outer: &CommandSettings, local: CommandSettings) -> CommandSettings {
    CommandSettings {
        description: local.description.or_else(|| outer.description.clone()),
        confirmation: if local.confirmation.is_none() {
            outer.confirmation.clone()
        } else {
            local.confirmation
        },
        table_transformer: local
            .table_transformer
            .or_else(|| outer.table_transformer.clone()),
        validator: local.validator.or_else(|| outer.validator.clone()),
        deprecate_info: local.deprecate_info,
        preview_info: local.preview_info,
        experimental_info: local.experimental_info,
        hidden: local.hidden || outer.hidden,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop_handler() -> Handler {
        Arc::new(|_params| Ok(Value::Null))
    }

    fn loader_with_op(operation: &str, args: ArgumentsBuilder) -> CommandsLoader {
        let mut loader = CommandsLoader::new();
        loader
            .handlers
            .register(operation, noop_handler(), args)
            .unwrap();
        loader
    }

    #[test]
    fn test_invalid_operation_string() {
        let loader = CommandsLoader::new();
        let err = loader.handlers.resolve("no-separator").unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
        assert!(err.to_string().contains("'no-separator' is invalid"));

        let err = loader.handlers.resolve("mod#not.registered").unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_invalid_signature_rejected_at_registration() {
        let mut loader = CommandsLoader::new();
        let err = loader
            .handlers
            .register(
                "ops#thing.make",
                noop_handler(),
                ArgumentsBuilder::new()
                    .param("name")
                    .arg("v", ArgType::new().options(&["-v"]).required(true)),
            )
            .unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
        assert!(err.to_string().contains("long-form"));
        assert!(loader.handlers.resolve("ops#thing.make").is_err());

        let err = loader
            .handlers
            .register("ops#thing.rm", noop_handler(), ArgumentsBuilder::new().param(""))
            .unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_add_command_builds_table_entry() {
        let mut loader = loader_with_op(
            "ops#sample.run",
            ArgumentsBuilder::new().param("target").flag("force", false),
        );
        let mut sg = CommandSuperGroup::new(&mut loader);
        sg.group("sample", |g| {
            g.command("run", "ops#sample.run")?;
            Ok(())
        })
        .unwrap();
        assert!(loader.command_table.contains_key("sample run"));
        assert!(loader.command_group_table.contains_key("sample"));
    }

    #[test]
    fn test_arguments_load_once() {
        let mut loader = loader_with_op("ops#x.y", ArgumentsBuilder::new().param("a"));
        loader
            .add_command("x y", "ops#x.y", CommandSettings::new())
            .unwrap();
        let events = EventRegistry::new();
        loader.load_arguments("x y", &events).unwrap();
        loader.load_arguments("x y", &events).unwrap();
        let command = &loader.command_table["x y"];
        assert_eq!(command.arguments().len(), 1);
        assert!(command.arguments().contains_key("a"));
    }

    #[test]
    fn test_mixed_case_names_stored_lowercase() {
        let mut loader = loader_with_op("ops#net.create", ArgumentsBuilder::new().param("name"));
        loader
            .add_command("Net Create", "ops#net.create", CommandSettings::new())
            .unwrap();
        loader.register_group(
            "Net",
            CommandGroupEntry {
                preview_info: Some(PreviewItem::command_group("net")),
                ..Default::default()
            },
        );
        assert!(loader.command_table.contains_key("net create"));
        assert!(loader.command_group_table.contains_key("net"));
        // Lookups by the parsed (lowercased) path hit the same entries.
        let events = EventRegistry::new();
        loader.load_arguments("net create", &events).unwrap();
        assert!(loader.command_table["net create"].arguments().contains_key("name"));
        assert!(loader.effective_statuses("net create").preview_info.is_some());
    }

    #[test]
    fn test_loader_runs_only_for_requested_command() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut loader = loader_with_op("ops#other", ArgumentsBuilder::new());
        loader
            .add_command("other", "ops#other", CommandSettings::new())
            .unwrap();
        let lazy = CliCommand::new("lazy", noop_handler()).with_arguments_loader(Arc::new(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Vec::new()
            },
        ));
        loader.command_table.insert("lazy".to_string(), lazy);

        let events = EventRegistry::new();
        loader.load_arguments("other", &events).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        loader.load_arguments("lazy", &events).unwrap();
        loader.load_arguments("lazy", &events).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_registry_overrides_folded_at_load() {
        let mut loader = loader_with_op("ops#g.c", ArgumentsBuilder::new().param("name"));
        loader
            .add_command("g c", "ops#g.c", CommandSettings::new())
            .unwrap();
        loader
            .arguments_context("g")
            .argument("name", ArgType::new().help("overridden").options(&["--name", "-n"]));
        let events = EventRegistry::new();
        loader.load_arguments("g c", &events).unwrap();
        let arg = &loader.command_table["g c"].arguments()["name"];
        assert_eq!(arg.arg_type.help.value().map(String::as_str), Some("overridden"));
        assert_eq!(arg.options_list(), &["--name".to_string(), "-n".to_string()]);
        // The signature's required flag survives the override fold.
        assert_eq!(arg.arg_type.required.value(), Some(&true));
    }

    #[test]
    fn test_extra_arguments_added_at_load() {
        let mut loader = loader_with_op("ops#g.c", ArgumentsBuilder::new().param("name"));
        loader
            .add_command("g c", "ops#g.c", CommandSettings::new())
            .unwrap();
        loader
            .arguments_context("g c")
            .extra("_secret", ArgType::new().default_value(json!("hidden")));
        let events = EventRegistry::new();
        loader.load_arguments("g c", &events).unwrap();
        assert!(loader.command_table["g c"].arguments().contains_key("_secret"));
    }

    #[test]
    fn test_confirmation_adds_yes_flag() {
        let mut loader = loader_with_op("ops#g.rm", ArgumentsBuilder::new().param("name"));
        loader
            .add_command(
                "g rm",
                "ops#g.rm",
                CommandSettings::new().confirmation(Confirmation::Prompt),
            )
            .unwrap();
        let events = EventRegistry::new();
        loader.load_arguments("g rm", &events).unwrap();
        let yes = &loader.command_table["g rm"].arguments()[CONFIRM_YES_DEST];
        assert_eq!(yes.options_list(), &["--yes".to_string(), "-y".to_string()]);
        assert_eq!(yes.arg_type.action.value(), Some(&ArgAction::StoreTrue));
    }

    #[test]
    fn test_group_status_implicit_unless_explicit() {
        let mut loader = CommandsLoader::new();
        loader
            .handlers
            .register("ops#a", noop_handler(), ArgumentsBuilder::new())
            .unwrap();
        loader
            .handlers
            .register("ops#b", noop_handler(), ArgumentsBuilder::new())
            .unwrap();
        let mut sg = CommandSuperGroup::new(&mut loader);
        sg.group_with(
            "grp",
            CommandSettings::new().preview(PreviewItem::command_group("grp")),
            |g| {
                g.command("plain", "ops#a")?;
                g.command_with(
                    "marked",
                    "ops#b",
                    CommandSettings::new().preview(PreviewItem::command("grp marked")),
                )?;
                Ok(())
            },
        )
        .unwrap();
        // The plain command has no marker of its own but resolves to an
        // implicit one derived from the group.
        assert!(loader.command_table["grp plain"].preview_info.is_none());
        let implicit = loader.effective_statuses("grp plain").preview_info.unwrap();
        assert_eq!(implicit.info.target, "grp");
        assert!(implicit.message().contains("Command group 'grp'"));
        // An explicit marker wins over the group's.
        let explicit = loader.effective_statuses("grp marked").preview_info.unwrap();
        assert_eq!(explicit.info.target, "grp marked");
        assert!(explicit.message().starts_with("This command"));
    }

    #[test]
    fn test_flag_action_follows_default() {
        let args = ArgumentsBuilder::new().flag("on_by_default", true).flag("off", false);
        let built = args.build().unwrap();
        assert_eq!(
            built[0].1.arg_type.action.value(),
            Some(&ArgAction::StoreFalse)
        );
        assert_eq!(built[1].1.arg_type.action.value(), Some(&ArgAction::StoreTrue));
    }
}
