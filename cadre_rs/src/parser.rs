//! The command parser tree.
//!
//! The table of space-separated command paths is compiled into a tree with
//! one node per path segment. Intermediate nodes are groups, leaves carry a
//! command and its compiled arguments. Parsing walks the tree over argv,
//! then matches option tokens against the leaf's arguments plus the global
//! set. Nothing here prints or exits; help requests surface as a
//! [`ParseResult::Help`] value and faults as [`CliError::Parse`].

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use strsim::levenshtein;

use crate::arguments::{ArgAction, ArgValidator, Choices, CommandArgument, Nargs, ValueKind};
use crate::completion::Completer;
use crate::commands::{CliCommand, CommandGroupEntry, CommandsLoader};
use crate::errors::{CliError, CliResult};
use crate::events::{EventPayload, EventRegistry, EVENT_PARSER_GLOBAL_CREATE};
use crate::help::{HelpArgument, HelpEntry, HelpPage, HelpTag};
use crate::status::Deprecated;

/// Parsed argument values plus bookkeeping collected during the parse.
#[derive(Clone, Debug, Default)]
pub struct Namespace {
    pub values: IndexMap<String, Value>,
    /// The matched command path, space separated.
    pub command: String,
    /// Deprecations of arguments or option strings the user actually typed.
    pub argument_deprecations: Vec<Deprecated>,
}

impl Namespace {
    pub fn get(&self, dest: &str) -> Option<&Value> {
        self.values.get(dest)
    }

    pub fn get_bool(&self, dest: &str) -> bool {
        matches!(self.values.get(dest), Some(Value::Bool(true)))
    }

    pub fn set(&mut self, dest: &str, value: Value) {
        self.values.insert(dest.to_string(), value);
    }
}

/// Arguments recognized on every command, populated through the
/// global-create event before the table is compiled.
#[derive(Clone, Debug, Default)]
pub struct GlobalArgs {
    pub args: Vec<CommandArgument>,
}

impl GlobalArgs {
    pub fn add(&mut self, arg: CommandArgument) {
        self.args.push(arg);
    }

    pub fn create(events: &EventRegistry) -> GlobalArgs {
        let mut global = GlobalArgs::default();
        events.raise(
            EVENT_PARSER_GLOBAL_CREATE,
            &mut EventPayload::GlobalArguments(&mut global),
        );
        global
    }
}

/// The settings the parser actually understands, frozen out of a
/// [`CommandArgument`]. Anything else the descriptor carried (the `extra`
/// metadata) is dropped here.
#[derive(Clone)]
pub struct CompiledArg {
    pub dest: String,
    pub options: Vec<String>,
    pub required: bool,
    pub default: Option<Value>,
    pub choices: Option<Choices>,
    pub help: Option<String>,
    pub metavar: Option<String>,
    pub action: ArgAction,
    pub nargs: Option<Nargs>,
    pub kind: ValueKind,
    pub arg_group: Option<String>,
    pub hidden: bool,
    pub validator: Option<ArgValidator>,
    pub completer: Option<Completer>,
    pub deprecate_info: Option<Deprecated>,
    pub option_deprecations: Vec<Deprecated>,
}

impl CompiledArg {
    fn compile(argument: &CommandArgument, cli_version: &str) -> CompiledArg {
        let t = &argument.arg_type;
        let deprecate_info = t.deprecate_info.value().cloned();
        let hidden = t.hidden.value().copied().unwrap_or(false)
            || deprecate_info
                .as_ref()
                .map_or(false, |d| d.hidden(cli_version));
        CompiledArg {
            dest: argument.name().to_string(),
            options: argument.options_list().to_vec(),
            required: t.required.value().copied().unwrap_or(false),
            default: t.default.value().cloned(),
            choices: t.choices.value().cloned(),
            help: t.help.value().cloned(),
            metavar: t.metavar.value().cloned(),
            action: t.action.value().copied().unwrap_or_default(),
            nargs: t.nargs.value().copied(),
            kind: t.kind.value().copied().unwrap_or_default(),
            arg_group: t.arg_group.value().cloned(),
            hidden,
            validator: t.validator.value().cloned(),
            completer: t.completer.value().cloned(),
            deprecate_info,
            option_deprecations: t.option_deprecations.value().cloned().unwrap_or_default(),
        }
    }

    fn metavar(&self) -> String {
        match &self.metavar {
            Some(metavar) => metavar.clone(),
            None => self.dest.trim_start_matches('_').to_uppercase(),
        }
    }

    fn takes_value(&self) -> bool {
        !matches!(self.action, ArgAction::StoreTrue | ArgAction::StoreFalse)
    }
}

/// A successfully matched command with its parsed namespace.
pub struct ParseOutcome {
    pub namespace: Namespace,
    pub command: Arc<CliCommand>,
    /// Per-argument validators in declaration order. Ignored when the
    /// command carries its own validator.
    pub argument_validators: Vec<ArgValidator>,
    pub prog: String,
}

pub enum ParseResult {
    Matched(Box<ParseOutcome>),
    Help(HelpPage),
}

impl std::fmt::Debug for ParseResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseResult::Matched(outcome) => f
                .debug_tuple("Matched")
                .field(&outcome.prog)
                .finish(),
            ParseResult::Help(page) => f.debug_tuple("Help").field(page).finish(),
        }
    }
}

struct ParserNode {
    prog: String,
    command_path: String,
    description: Option<String>,
    children: IndexMap<String, ParserNode>,
    command: Option<Arc<CliCommand>>,
    args: Vec<CompiledArg>,
    tags: Vec<HelpTag>,
    notices: Vec<HelpTag>,
    hidden: bool,
}

impl ParserNode {
    fn new(prog: String, command_path: String) -> Self {
        ParserNode {
            prog,
            command_path,
            description: None,
            children: IndexMap::new(),
            command: None,
            args: Vec::new(),
            tags: Vec::new(),
            notices: Vec::new(),
            hidden: false,
        }
    }

    fn apply_statuses(&mut self, entry: &CommandGroupEntry, cli_version: &str) {
        self.tags.clear();
        self.notices.clear();
        if let Some(info) = &entry.deprecate_info {
            if info.show_in_help(cli_version) {
                self.tags.push(HelpTag {
                    text: info.tag(),
                    color: info.color(),
                });
                self.notices.push(HelpTag {
                    text: info.message(),
                    color: info.color(),
                });
            }
        }
        if let Some(info) = &entry.preview_info {
            self.tags.push(HelpTag {
                text: info.tag(),
                color: info.color(),
            });
            self.notices.push(HelpTag {
                text: info.message(),
                color: info.color(),
            });
        }
        if let Some(info) = &entry.experimental_info {
            self.tags.push(HelpTag {
                text: info.tag(),
                color: info.color(),
            });
            self.notices.push(HelpTag {
                text: info.message(),
                color: info.color(),
            });
        }
    }
}

/// The compiled parser for one command table.
pub struct CliCommandParser {
    cli_name: String,
    cli_version: String,
    root: ParserNode,
    global: Vec<CompiledArg>,
}

impl std::fmt::Debug for CliCommandParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliCommandParser")
            .field("cli_name", &self.cli_name)
            .field("cli_version", &self.cli_version)
            .finish_non_exhaustive()
    }
}

impl CliCommandParser {
    /// Compiles the loader's command table into a parser tree.
    ///
    /// Commands whose (explicit or group-inherited) deprecation has expired
    /// are left out entirely, so they are neither listed nor parseable.
    /// Path segments are lowercased; matching is case-insensitive on the
    /// command path but untouched for option strings.
    pub fn load_command_table(
        loader: &CommandsLoader,
        global: &GlobalArgs,
        cli_name: &str,
        cli_version: &str,
    ) -> CliResult<CliCommandParser> {
        if loader.command_table.is_empty() {
            return Err(CliError::config(
                "The command table is empty. At least one command is required.",
            ));
        }
        let mut root = ParserNode::new(cli_name.to_string(), String::new());
        for (name, command) in &loader.command_table {
            let statuses = loader.effective_statuses(name);
            if let Some(info) = &statuses.deprecate_info {
                if info.expired(cli_version) {
                    tracing::debug!(command = name.as_str(), "skipping expired command");
                    continue;
                }
            }
            let original_parts: Vec<&str> = name.split_whitespace().collect();
            let mut node = &mut root;
            for (index, part) in original_parts.iter().enumerate() {
                let segment = part.to_lowercase();
                let prog = format!("{} {}", node.prog, segment);
                let path = if node.command_path.is_empty() {
                    segment.clone()
                } else {
                    format!("{} {}", node.command_path, segment)
                };
                node = node
                    .children
                    .entry(segment)
                    .or_insert_with(|| ParserNode::new(prog, path));
                if index + 1 < original_parts.len() {
                    let group_path = original_parts[0..=index].join(" ");
                    if let Some(entry) = loader.command_group_table.get(&group_path) {
                        node.apply_statuses(entry, cli_version);
                        node.hidden = entry
                            .deprecate_info
                            .as_ref()
                            .map_or(false, |d| d.hidden(cli_version));
                    }
                }
            }
            node.description = command.description.clone();
            node.hidden = command.hidden
                || statuses
                    .deprecate_info
                    .as_ref()
                    .map_or(false, |d| d.hidden(cli_version));
            node.args = command
                .arguments()
                .values()
                .map(|a| CompiledArg::compile(a, cli_version))
                .collect();
            node.apply_statuses(&statuses, cli_version);
            node.command = Some(Arc::new(command.clone()));
        }
        Ok(CliCommandParser {
            cli_name: cli_name.to_string(),
            cli_version: cli_version.to_string(),
            root,
            global: global
                .args
                .iter()
                .map(|a| CompiledArg::compile(a, cli_version))
                .collect(),
        })
    }

    /// Parses argv against the tree.
    ///
    /// An empty argv yields the welcome page, and a leading `help` token is
    /// rewritten to a trailing `--help`. Leading non-flag tokens are
    /// lowercased before the walk.
    pub fn parse(&self, argv: &[String]) -> CliResult<ParseResult> {
        if argv.is_empty() {
            return Ok(ParseResult::Help(HelpPage::Welcome {
                cli_name: self.cli_name.clone(),
                version: self.cli_version.clone(),
            }));
        }
        let mut argv: Vec<String> = argv.to_vec();
        if argv[0] == "help" {
            argv.remove(0);
            argv.push("--help".to_string());
        }
        for token in argv.iter_mut() {
            if token.starts_with('-') {
                break;
            }
            *token = token.to_lowercase();
        }

        let mut node = &self.root;
        let mut index = 0;
        while index < argv.len() {
            let token = &argv[index];
            if token.starts_with('-') {
                break;
            }
            match node.children.get(token) {
                Some(child) => {
                    node = child;
                    index += 1;
                }
                None if node.command.is_some() => break,
                None => return Err(self.unknown_choice_error(node, token)),
            }
        }

        match &node.command {
            Some(command) => self.parse_leaf(node, Arc::clone(command), &argv[index..]),
            None => match argv.get(index).map(String::as_str) {
                Some("--help") | Some("-h") => Ok(ParseResult::Help(self.group_help(node))),
                Some(token) => Err(self.unknown_choice_error(node, token)),
                None => Err(self.error(node, "too few arguments")),
            },
        }
    }

    fn parse_leaf(
        &self,
        node: &ParserNode,
        command: Arc<CliCommand>,
        tokens: &[String],
    ) -> CliResult<ParseResult> {
        let mut namespace = Namespace {
            command: node.command_path.clone(),
            ..Namespace::default()
        };
        let mut supplied: HashSet<String> = HashSet::new();
        let mut index = 0;
        while index < tokens.len() {
            let token = &tokens[index];
            if token == "--help" || token == "-h" {
                return Ok(ParseResult::Help(self.command_help(node)));
            }
            if !token.starts_with('-') || token == "-" {
                return Err(self.error(node, &format!("unrecognized arguments: {}", token)));
            }
            let (option, inline) = match token.split_once('=') {
                Some((option, value)) => (option, Some(value.to_string())),
                None => (token.as_str(), None),
            };
            let Some(arg) = self.find_arg(node, option) else {
                return Err(self.error(node, &format!("unrecognized arguments: {}", token)));
            };
            index += 1;
            if let Some(info) = &arg.deprecate_info {
                namespace.argument_deprecations.push(info.clone());
            }
            for deprecation in &arg.option_deprecations {
                if deprecation.info.target == option {
                    namespace.argument_deprecations.push(deprecation.clone());
                }
            }
            supplied.insert(arg.dest.clone());
            match arg.action {
                ArgAction::StoreTrue | ArgAction::StoreFalse => {
                    if inline.is_some() {
                        return Err(self.error(
                            node,
                            &format!("argument {}: ignored explicit argument", option),
                        ));
                    }
                    namespace.set(
                        &arg.dest,
                        Value::Bool(matches!(arg.action, ArgAction::StoreTrue)),
                    );
                }
                ArgAction::Append => {
                    let raw = match inline {
                        Some(value) => value,
                        None => self.take_value(node, tokens, &mut index, option)?,
                    };
                    let value = self.convert(node, arg, option, &raw)?;
                    match namespace.values.get_mut(&arg.dest) {
                        Some(Value::Array(items)) => items.push(value),
                        _ => namespace.set(&arg.dest, Value::Array(vec![value])),
                    }
                }
                ArgAction::Store => {
                    let value = self.consume_store(node, arg, option, inline, tokens, &mut index)?;
                    namespace.set(&arg.dest, value);
                }
            }
        }

        // Defaults for everything the user did not supply.
        for arg in node.args.iter().chain(self.global.iter()) {
            if namespace.values.contains_key(&arg.dest) {
                continue;
            }
            let value = arg.default.clone().unwrap_or(match arg.action {
                ArgAction::StoreTrue => Value::Bool(false),
                ArgAction::StoreFalse => Value::Bool(true),
                _ => Value::Null,
            });
            namespace.set(&arg.dest, value);
        }

        let missing: Vec<String> = node
            .args
            .iter()
            .chain(self.global.iter())
            .filter(|a| a.required && !supplied.contains(&a.dest))
            .filter_map(|a| a.options.first().cloned())
            .collect();
        if !missing.is_empty() {
            return Err(self.error(
                node,
                &format!(
                    "the following arguments are required: {}",
                    missing.join(", ")
                ),
            ));
        }

        let argument_validators = node
            .args
            .iter()
            .filter_map(|a| a.validator.clone())
            .collect();
        Ok(ParseResult::Matched(Box::new(ParseOutcome {
            namespace,
            command,
            argument_validators,
            prog: node.prog.clone(),
        })))
    }

    fn find_arg<'a>(&'a self, node: &'a ParserNode, option: &str) -> Option<&'a CompiledArg> {
        node.args
            .iter()
            .chain(self.global.iter())
            .find(|a| a.options.iter().any(|o| o == option))
    }

    /// Takes the next token as an option value. Flag-shaped tokens are not
    /// consumed as values.
    fn take_value(
        &self,
        node: &ParserNode,
        tokens: &[String],
        index: &mut usize,
        option: &str,
    ) -> CliResult<String> {
        match tokens.get(*index) {
            Some(token) if !token.starts_with('-') || token == "-" => {
                *index += 1;
                Ok(token.clone())
            }
            _ => Err(self.error(node, &format!("argument {}: expected one argument", option))),
        }
    }

    fn consume_store(
        &self,
        node: &ParserNode,
        arg: &CompiledArg,
        option: &str,
        inline: Option<String>,
        tokens: &[String],
        index: &mut usize,
    ) -> CliResult<Value> {
        let mut raw: Vec<String> = Vec::new();
        if let Some(value) = inline {
            raw.push(value);
        }
        match arg.nargs {
            None => {
                if raw.is_empty() {
                    raw.push(self.take_value(node, tokens, index, option)?);
                }
                let value = self.convert(node, arg, option, &raw[0])?;
                Ok(value)
            }
            Some(Nargs::Exact(count)) => {
                while raw.len() < count {
                    match tokens.get(*index) {
                        Some(token) if !token.starts_with('-') || token == "-" => {
                            raw.push(token.clone());
                            *index += 1;
                        }
                        _ => {
                            return Err(self.error(
                                node,
                                &format!("argument {}: expected {} arguments", option, count),
                            ))
                        }
                    }
                }
                if count == 1 {
                    self.convert(node, arg, option, &raw[0])
                } else {
                    let values: CliResult<Vec<Value>> = raw
                        .iter()
                        .map(|r| self.convert(node, arg, option, r))
                        .collect();
                    Ok(Value::Array(values?))
                }
            }
            Some(Nargs::ZeroOrMore) | Some(Nargs::OneOrMore) => {
                while let Some(token) = tokens.get(*index) {
                    if token.starts_with('-') && token != "-" {
                        break;
                    }
                    raw.push(token.clone());
                    *index += 1;
                }
                if raw.is_empty() && matches!(arg.nargs, Some(Nargs::OneOrMore)) {
                    return Err(self.error(
                        node,
                        &format!("argument {}: expected at least one argument", option),
                    ));
                }
                let values: CliResult<Vec<Value>> = raw
                    .iter()
                    .map(|r| self.convert(node, arg, option, r))
                    .collect();
                Ok(Value::Array(values?))
            }
        }
    }

    /// Choice canonicalization happens before the typed conversion, so
    /// case-insensitive choices surface with their declared casing.
    fn convert(
        &self,
        node: &ParserNode,
        arg: &CompiledArg,
        option: &str,
        raw: &str,
    ) -> CliResult<Value> {
        let canonical = match &arg.choices {
            Some(choices) => match choices.matches(raw) {
                Some(canonical) => canonical,
                None => {
                    return Err(self.error(
                        node,
                        &format!(
                            "argument {}: invalid choice: '{}' (choose from {})",
                            option,
                            raw,
                            choices.values.join(", ")
                        ),
                    ))
                }
            },
            None => raw.to_string(),
        };
        arg.kind
            .parse(&canonical)
            .map_err(|message| self.error(node, &format!("argument {}: {}", option, message)))
    }

    // ------------------------------------------------------------------
    // Errors and help
    // ------------------------------------------------------------------

    fn error(&self, node: &ParserNode, message: &str) -> CliError {
        CliError::Parse(format!(
            "usage: {}\n{}: error: {}",
            self.usage(node),
            node.prog,
            message
        ))
    }

    fn unknown_choice_error(&self, node: &ParserNode, token: &str) -> CliError {
        let mut message = format!("'{}' is not in the '{}' command group.", token, node.prog);
        if let Some(suggestion) = self.suggest(node, token) {
            message.push_str(&format!(" Did you mean '{}'?", suggestion));
        }
        message.push_str(&format!(" See '{} --help'.", node.prog));
        CliError::Parse(message)
    }

    /// Nearest visible child within a small edit distance, if any.
    fn suggest(&self, node: &ParserNode, token: &str) -> Option<String> {
        let mut best: Option<(&str, usize)> = None;
        for (name, child) in &node.children {
            if child.hidden {
                continue;
            }
            let distance = levenshtein(token, name);
            if distance <= 2 && best.map_or(true, |(_, d)| distance < d) {
                best = Some((name, distance));
            }
        }
        best.map(|(name, _)| name.to_string())
    }

    fn usage(&self, node: &ParserNode) -> String {
        let mut usage = format!("{} [-h]", node.prog);
        for arg in &node.args {
            if arg.hidden {
                continue;
            }
            let mut piece = arg.options.first().cloned().unwrap_or_default();
            if arg.takes_value() {
                piece.push(' ');
                piece.push_str(&arg.metavar());
            }
            if arg.required {
                usage.push_str(&format!(" {}", piece));
            } else {
                usage.push_str(&format!(" [{}]", piece));
            }
        }
        usage
    }

    fn group_help(&self, node: &ParserNode) -> HelpPage {
        let entries = node
            .children
            .iter()
            .filter(|(_, child)| !child.hidden)
            .map(|(name, child)| HelpEntry {
                name: name.clone(),
                description: child.description.clone(),
                tags: child.tags.clone(),
                is_group: child.command.is_none(),
            })
            .collect();
        HelpPage::Group {
            prog: node.prog.clone(),
            description: node.description.clone(),
            notices: node.notices.clone(),
            entries,
        }
    }

    fn command_help(&self, node: &ParserNode) -> HelpPage {
        let mut arguments: Vec<HelpArgument> = node
            .args
            .iter()
            .filter(|a| !a.hidden)
            .map(|a| help_argument(a, None))
            .collect();
        arguments.extend(
            self.global
                .iter()
                .filter(|a| !a.hidden)
                .map(|a| help_argument(a, Some("Global Arguments"))),
        );
        HelpPage::Command {
            prog: node.prog.clone(),
            description: node.description.clone(),
            notices: node.notices.clone(),
            arguments,
        }
    }
}

fn help_argument(arg: &CompiledArg, group_override: Option<&str>) -> HelpArgument {
    let mut tags = Vec::new();
    if let Some(info) = &arg.deprecate_info {
        tags.push(HelpTag {
            text: info.tag(),
            color: info.color(),
        });
    }
    HelpArgument {
        options: arg.options.clone(),
        help: arg.help.clone(),
        required: arg.required,
        choices: arg.choices.as_ref().map(|c| c.values.clone()),
        default: arg.default.clone(),
        arg_group: group_override
            .map(str::to_string)
            .or_else(|| arg.arg_group.clone()),
        tags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arguments::ArgType;
    use crate::commands::{ArgumentsBuilder, CommandSettings, Handler};
    use crate::status::{Deprecated, Hide};
    use serde_json::json;

    fn noop_handler() -> Handler {
        Arc::new(|_params| Ok(Value::Null))
    }

    fn loader() -> CommandsLoader {
        let mut loader = CommandsLoader::new();
        loader.handlers.register(
            "ops#net.list",
            noop_handler(),
            ArgumentsBuilder::new().flag("all", false),
        ).unwrap();
        loader.handlers.register(
            "ops#net.create",
            noop_handler(),
            ArgumentsBuilder::new()
                .param("name")
                .arg(
                    "size",
                    ArgType::new().kind(ValueKind::Int).default_value(json!(1)),
                )
                .arg(
                    "tier",
                    ArgType::new().choices_case_insensitive(&["Basic", "Standard"]),
                ),
        ).unwrap();
        loader
            .add_command("net list", "ops#net.list", CommandSettings::new())
            .unwrap();
        loader
            .add_command("net create", "ops#net.create", CommandSettings::new())
            .unwrap();
        let events = EventRegistry::new();
        loader.load_arguments("net list", &events).unwrap();
        loader.load_arguments("net create", &events).unwrap();
        loader
    }

    fn parser_for(loader: &CommandsLoader) -> CliCommandParser {
        CliCommandParser::load_command_table(loader, &GlobalArgs::default(), "cli", "1.0.0")
            .unwrap()
    }

    fn argv(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    fn matched(result: ParseResult) -> ParseOutcome {
        match result {
            ParseResult::Matched(outcome) => *outcome,
            ParseResult::Help(_) => panic!("expected a matched command"),
        }
    }

    #[test]
    fn test_empty_table_is_config_error() {
        let loader = CommandsLoader::new();
        let err =
            CliCommandParser::load_command_table(&loader, &GlobalArgs::default(), "cli", "1.0.0")
                .unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_empty_argv_is_welcome() {
        let loader = loader();
        let parser = parser_for(&loader);
        match parser.parse(&[]).unwrap() {
            ParseResult::Help(HelpPage::Welcome { cli_name, .. }) => assert_eq!(cli_name, "cli"),
            _ => panic!("expected the welcome page"),
        }
    }

    #[test]
    fn test_leading_help_token_rewritten() {
        let loader = loader();
        let parser = parser_for(&loader);
        match parser.parse(&argv(&["help", "net"])).unwrap() {
            ParseResult::Help(HelpPage::Group { prog, .. }) => assert_eq!(prog, "cli net"),
            _ => panic!("expected group help"),
        }
    }

    #[test]
    fn test_command_path_is_case_insensitive() {
        let loader = loader();
        let parser = parser_for(&loader);
        let outcome = matched(parser.parse(&argv(&["NET", "List"])).unwrap());
        assert_eq!(outcome.namespace.command, "net list");
    }

    #[test]
    fn test_option_strings_stay_case_sensitive() {
        let loader = loader();
        let parser = parser_for(&loader);
        let err = parser.parse(&argv(&["net", "list", "--ALL"])).unwrap_err();
        assert!(err.to_string().contains("unrecognized arguments: --ALL"));
    }

    #[test]
    fn test_flags_values_and_defaults() {
        let loader = loader();
        let parser = parser_for(&loader);
        let outcome = matched(parser.parse(&argv(&["net", "list", "--all"])).unwrap());
        assert_eq!(outcome.namespace.get("all"), Some(&Value::Bool(true)));

        let outcome = matched(parser.parse(&argv(&["net", "list"])).unwrap());
        assert_eq!(outcome.namespace.get("all"), Some(&Value::Bool(false)));

        let outcome = matched(
            parser
                .parse(&argv(&["net", "create", "--name", "n1", "--size", "5"]))
                .unwrap(),
        );
        assert_eq!(outcome.namespace.get("name"), Some(&json!("n1")));
        assert_eq!(outcome.namespace.get("size"), Some(&json!(5)));
        assert_eq!(outcome.namespace.get("tier"), Some(&Value::Null));
    }

    #[test]
    fn test_inline_equals_value() {
        let loader = loader();
        let parser = parser_for(&loader);
        let outcome = matched(parser.parse(&argv(&["net", "create", "--name=n2"])).unwrap());
        assert_eq!(outcome.namespace.get("name"), Some(&json!("n2")));
    }

    #[test]
    fn test_choice_canonical_casing_restored() {
        let loader = loader();
        let parser = parser_for(&loader);
        let outcome = matched(
            parser
                .parse(&argv(&["net", "create", "--name", "n", "--tier", "BASIC"]))
                .unwrap(),
        );
        assert_eq!(outcome.namespace.get("tier"), Some(&json!("Basic")));

        let err = parser
            .parse(&argv(&["net", "create", "--name", "n", "--tier", "gold"]))
            .unwrap_err();
        assert!(err.to_string().contains("invalid choice: 'gold'"));
    }

    #[test]
    fn test_typed_conversion_failure_is_parse_error() {
        let loader = loader();
        let parser = parser_for(&loader);
        let err = parser
            .parse(&argv(&["net", "create", "--name", "n", "--size", "big"]))
            .unwrap_err();
        assert!(matches!(err, CliError::Parse(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_missing_required_argument() {
        let loader = loader();
        let parser = parser_for(&loader);
        let err = parser.parse(&argv(&["net", "create"])).unwrap_err();
        assert!(err
            .to_string()
            .contains("the following arguments are required: --name"));
    }

    #[test]
    fn test_unknown_choice_suggests_sibling() {
        let loader = loader();
        let parser = parser_for(&loader);
        let err = parser.parse(&argv(&["net", "lst"])).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'lst' is not in the 'cli net' command group."));
        assert!(message.contains("Did you mean 'list'?"));
    }

    #[test]
    fn test_group_without_subcommand_is_error() {
        let loader = loader();
        let parser = parser_for(&loader);
        let err = parser.parse(&argv(&["net"])).unwrap_err();
        assert!(err.to_string().contains("too few arguments"));
    }

    #[test]
    fn test_expired_command_unreachable() {
        let mut loader = loader();
        loader.handlers.register(
            "ops#net.old",
            noop_handler(),
            ArgumentsBuilder::new(),
        ).unwrap();
        loader
            .add_command(
                "net old",
                "ops#net.old",
                CommandSettings::new().deprecated(
                    Deprecated::command("net old").expiration("0.9.0"),
                ),
            )
            .unwrap();
        let parser = parser_for(&loader);
        let err = parser.parse(&argv(&["net", "old"])).unwrap_err();
        assert!(err.to_string().contains("'old' is not in the 'cli net' command group."));
        // And it is not listed on the group page either.
        match parser.parse(&argv(&["net", "--help"])).unwrap() {
            ParseResult::Help(HelpPage::Group { entries, .. }) => {
                assert!(entries.iter().all(|e| e.name != "old"));
            }
            _ => panic!("expected group help"),
        }
    }

    #[test]
    fn test_hidden_deprecated_still_parses() {
        let mut loader = loader();
        loader
            .handlers
            .register("ops#net.legacy", noop_handler(), ArgumentsBuilder::new()).unwrap();
        loader
            .add_command(
                "net legacy",
                "ops#net.legacy",
                CommandSettings::new()
                    .deprecated(Deprecated::command("net legacy").hide(Hide::Always)),
            )
            .unwrap();
        let parser = parser_for(&loader);
        let outcome = matched(parser.parse(&argv(&["net", "legacy"])).unwrap());
        assert_eq!(outcome.namespace.command, "net legacy");
        match parser.parse(&argv(&["net", "--help"])).unwrap() {
            ParseResult::Help(HelpPage::Group { entries, .. }) => {
                assert!(entries.iter().all(|e| e.name != "legacy"));
            }
            _ => panic!("expected group help"),
        }
    }

    #[test]
    fn test_hidden_deprecated_group_unlisted() {
        let mut loader = loader();
        loader
            .handlers
            .register("ops#legacy.run", noop_handler(), ArgumentsBuilder::new())
            .unwrap();
        loader
            .add_command("legacy run", "ops#legacy.run", CommandSettings::new())
            .unwrap();
        loader.register_group(
            "legacy",
            CommandGroupEntry {
                deprecate_info: Some(Deprecated::command_group("legacy").hide(Hide::Always)),
                ..Default::default()
            },
        );
        let parser = parser_for(&loader);
        match parser.parse(&argv(&["--help"])).unwrap() {
            ParseResult::Help(HelpPage::Group { entries, .. }) => {
                assert!(entries.iter().any(|e| e.name == "net"));
                assert!(entries.iter().all(|e| e.name != "legacy"));
            }
            _ => panic!("expected group help"),
        }
        // The group stays addressable when typed out.
        let outcome = matched(parser.parse(&argv(&["legacy", "run"])).unwrap());
        assert_eq!(outcome.namespace.command, "legacy run");
    }

    #[test]
    fn test_deprecated_argument_recorded_on_use() {
        let mut loader = loader();
        loader
            .arguments_context("net create")
            .argument(
                "size",
                ArgType::new().deprecated(Deprecated::argument("--size")),
            );
        let events = EventRegistry::new();
        loader.load_arguments("net create", &events).unwrap();
        let parser = parser_for(&loader);

        let outcome = matched(
            parser
                .parse(&argv(&["net", "create", "--name", "n", "--size", "2"]))
                .unwrap(),
        );
        assert_eq!(outcome.namespace.argument_deprecations.len(), 1);

        // Unused deprecated arguments stay quiet.
        let outcome = matched(parser.parse(&argv(&["net", "create", "--name", "n"])).unwrap());
        assert!(outcome.namespace.argument_deprecations.is_empty());
    }

    #[test]
    fn test_global_arguments_available_everywhere() {
        let loader = loader();
        let mut global = GlobalArgs::default();
        global.add(
            CommandArgument::new(
                "_verbose",
                ArgType::new()
                    .options(&["--verbose"])
                    .action(ArgAction::StoreTrue)
                    .default_value(false),
            )
            .unwrap(),
        );
        let parser =
            CliCommandParser::load_command_table(&loader, &global, "cli", "1.0.0").unwrap();
        let outcome = matched(parser.parse(&argv(&["net", "list", "--verbose"])).unwrap());
        assert_eq!(outcome.namespace.get("_verbose"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_nargs_collects_lists() {
        let mut loader = CommandsLoader::new();
        loader.handlers.register(
            "ops#tag",
            noop_handler(),
            ArgumentsBuilder::new().arg("tags", ArgType::new().nargs(Nargs::OneOrMore)),
        ).unwrap();
        loader
            .add_command("tag", "ops#tag", CommandSettings::new())
            .unwrap();
        let events = EventRegistry::new();
        loader.load_arguments("tag", &events).unwrap();
        let parser = parser_for(&loader);

        let outcome = matched(parser.parse(&argv(&["tag", "--tags", "a", "b"])).unwrap());
        assert_eq!(outcome.namespace.get("tags"), Some(&json!(["a", "b"])));

        let err = parser.parse(&argv(&["tag", "--tags"])).unwrap_err();
        assert!(err.to_string().contains("expected at least one argument"));
    }
}
