//! Mergeable argument descriptors and the scope-keyed override registry.
//!
//! An [`ArgType`] is a bag of per-argument settings where every slot is a
//! three-state [`Setting`]: unset, explicitly removed, or set to a value.
//! Merging is right-biased per slot, so layered overrides compose the way
//! the registry needs: later (more specific) scopes win, and `Remove`
//! deletes a slot a less specific scope had set.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::completion::Completer;
use crate::errors::{CliError, CliResult};
use crate::parser::Namespace;
use crate::status::Deprecated;

/// A validator attached to one argument or one command. Validators may
/// rewrite the parsed namespace; returning an error aborts the invocation.
pub type ArgValidator = Arc<dyn Fn(&mut Namespace) -> anyhow::Result<()> + Send + Sync>;

/// One settings slot: unset, marked for deletion on merge, or set.
#[derive(Clone, Debug, PartialEq)]
pub enum Setting<T> {
    Unset,
    /// Deletes a previously-set value when merged over it.
    Remove,
    Value(T),
}

// Manual impl: the derive would demand `T: Default` even though `Unset`
// carries no value.
impl<T> Default for Setting<T> {
    fn default() -> Self {
        Setting::Unset
    }
}

impl<T: Clone> Setting<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Setting::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Setting::Unset)
    }

    /// Right-biased merge: anything other than `Unset` on the right wins.
    pub fn merge_from(&mut self, other: &Setting<T>) {
        if !other.is_unset() {
            *self = other.clone();
        }
    }
}

/// How a matched option consumes tokens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ArgAction {
    /// Consume one value (or several, under an explicit nargs).
    #[default]
    Store,
    /// Flag: no value, stores `true` when present (default `false`).
    StoreTrue,
    /// Flag: no value, stores `false` when present (default `true`).
    StoreFalse,
    /// Consume one value per occurrence, collecting into a list.
    Append,
}

/// Value count for `Store` arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Nargs {
    Exact(usize),
    ZeroOrMore,
    OneOrMore,
}

/// Typed conversion applied to each consumed token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ValueKind {
    #[default]
    Str,
    Int,
    Float,
    Bool,
}

impl ValueKind {
    pub fn parse(&self, token: &str) -> Result<Value, String> {
        match self {
            ValueKind::Str => Ok(Value::String(token.to_string())),
            ValueKind::Int => token
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("invalid int value: '{}'", token)),
            ValueKind::Float => token
                .parse::<f64>()
                .map(Value::from)
                .map_err(|_| format!("invalid float value: '{}'", token)),
            ValueKind::Bool => match token.to_lowercase().as_str() {
                "1" | "yes" | "true" | "on" => Ok(Value::Bool(true)),
                "0" | "no" | "false" | "off" => Ok(Value::Bool(false)),
                _ => Err(format!("invalid bool value: '{}'", token)),
            },
        }
    }
}

/// A fixed choice list for an argument value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Choices {
    pub values: Vec<String>,
    pub case_sensitive: bool,
}

impl Choices {
    pub fn new(values: &[&str]) -> Self {
        Choices {
            values: values.iter().map(|v| v.to_string()).collect(),
            case_sensitive: true,
        }
    }

    /// Choices matched case-insensitively; the canonical casing is restored
    /// in the parsed value.
    pub fn case_insensitive(values: &[&str]) -> Self {
        Choices {
            values: values.iter().map(|v| v.to_string()).collect(),
            case_sensitive: false,
        }
    }

    /// Returns the canonical form of `candidate` if it is a valid choice.
    pub fn matches(&self, candidate: &str) -> Option<String> {
        if self.case_sensitive {
            self.values.iter().find(|v| *v == candidate).cloned()
        } else {
            self.values
                .iter()
                .find(|v| v.eq_ignore_ascii_case(candidate))
                .cloned()
        }
    }
}

/// A mergeable descriptor of one argument's settings, independent of the
/// command it attaches to.
#[derive(Clone, Default)]
pub struct ArgType {
    pub options_list: Setting<Vec<String>>,
    pub required: Setting<bool>,
    pub default: Setting<Value>,
    pub choices: Setting<Choices>,
    pub help: Setting<String>,
    pub metavar: Setting<String>,
    pub action: Setting<ArgAction>,
    pub nargs: Setting<Nargs>,
    pub kind: Setting<ValueKind>,
    pub arg_group: Setting<String>,
    pub hidden: Setting<bool>,
    pub validator: Setting<ArgValidator>,
    pub completer: Setting<Completer>,
    pub deprecate_info: Setting<Deprecated>,
    /// Deprecations for individual option strings of this argument.
    pub option_deprecations: Setting<Vec<Deprecated>>,
    /// Arbitrary caller metadata. Not interpreted by the framework; the
    /// parser compiler silently drops it at the compile boundary.
    pub extra: IndexMap<String, Setting<Value>>,
}

impl std::fmt::Debug for ArgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgType")
            .field("options_list", &self.options_list)
            .field("required", &self.required)
            .field("default", &self.default)
            .field("choices", &self.choices)
            .field("help", &self.help)
            .field("action", &self.action)
            .field("arg_group", &self.arg_group)
            .finish()
    }
}

impl ArgType {
    pub fn new() -> Self {
        ArgType::default()
    }

    /// Start from an existing type and layer further settings on top, the
    /// `overrides=` chaining pattern. (The base is cloned, never mutated.)
    pub fn with_overrides(base: &ArgType) -> Self {
        base.clone()
    }

    /// A single option string, normalized into a one-element list.
    pub fn option(self, option: &str) -> Self {
        self.options(&[option])
    }

    pub fn options(mut self, options: &[&str]) -> Self {
        self.options_list = Setting::Value(options.iter().map(|o| o.to_string()).collect());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Setting::Value(required);
        self
    }

    pub fn clear_required(mut self) -> Self {
        self.required = Setting::Remove;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Setting::Value(value.into());
        self
    }

    pub fn clear_default(mut self) -> Self {
        self.default = Setting::Remove;
        self
    }

    pub fn choices(mut self, values: &[&str]) -> Self {
        self.choices = Setting::Value(Choices::new(values));
        self
    }

    pub fn choices_case_insensitive(mut self, values: &[&str]) -> Self {
        self.choices = Setting::Value(Choices::case_insensitive(values));
        self
    }

    pub fn help(mut self, text: &str) -> Self {
        self.help = Setting::Value(text.to_string());
        self
    }

    pub fn clear_help(mut self) -> Self {
        self.help = Setting::Remove;
        self
    }

    pub fn metavar(mut self, metavar: &str) -> Self {
        self.metavar = Setting::Value(metavar.to_string());
        self
    }

    pub fn action(mut self, action: ArgAction) -> Self {
        self.action = Setting::Value(action);
        self
    }

    pub fn nargs(mut self, nargs: Nargs) -> Self {
        self.nargs = Setting::Value(nargs);
        self
    }

    pub fn kind(mut self, kind: ValueKind) -> Self {
        self.kind = Setting::Value(kind);
        self
    }

    pub fn arg_group(mut self, group: &str) -> Self {
        self.arg_group = Setting::Value(group.to_string());
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = Setting::Value(hidden);
        self
    }

    pub fn validator(mut self, validator: ArgValidator) -> Self {
        self.validator = Setting::Value(validator);
        self
    }

    pub fn completer(mut self, completer: Completer) -> Self {
        self.completer = Setting::Value(completer);
        self
    }

    pub fn deprecated(mut self, info: Deprecated) -> Self {
        self.deprecate_info = Setting::Value(info);
        self
    }

    pub fn deprecated_options(mut self, deprecations: Vec<Deprecated>) -> Self {
        self.option_deprecations = Setting::Value(deprecations);
        self
    }

    pub fn extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), Setting::Value(value.into()));
        self
    }

    pub fn extra_remove(mut self, key: &str) -> Self {
        self.extra.insert(key.to_string(), Setting::Remove);
        self
    }

    /// Right-biased merge of every slot from `other` into self. Calling
    /// with an all-unset other is a no-op, so repeated updates are
    /// idempotent.
    pub fn update(&mut self, other: &ArgType) {
        self.options_list.merge_from(&other.options_list);
        self.required.merge_from(&other.required);
        self.default.merge_from(&other.default);
        self.choices.merge_from(&other.choices);
        self.help.merge_from(&other.help);
        self.metavar.merge_from(&other.metavar);
        self.action.merge_from(&other.action);
        self.nargs.merge_from(&other.nargs);
        self.kind.merge_from(&other.kind);
        self.arg_group.merge_from(&other.arg_group);
        self.hidden.merge_from(&other.hidden);
        self.validator.merge_from(&other.validator);
        self.completer.merge_from(&other.completer);
        self.deprecate_info.merge_from(&other.deprecate_info);
        self.option_deprecations.merge_from(&other.option_deprecations);
        for (key, setting) in &other.extra {
            if !setting.is_unset() {
                self.extra.insert(key.clone(), setting.clone());
            }
        }
    }
}

/// An [`ArgType`] bound to a destination parameter name for one command.
#[derive(Clone)]
pub struct CommandArgument {
    dest: String,
    pub arg_type: ArgType,
}

impl std::fmt::Debug for CommandArgument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandArgument")
            .field("dest", &self.dest)
            .field("arg_type", &self.arg_type)
            .finish()
    }
}

impl CommandArgument {
    /// Binds `arg_type` to `dest`, running the early fault detection for
    /// inconsistent configurations. With no explicit `options_list`, one is
    /// synthesized as `--<dest-with-dashes>`.
    pub fn new(dest: &str, arg_type: ArgType) -> CliResult<Self> {
        if dest.trim().is_empty() {
            return Err(CliError::config("Missing dest"));
        }
        let mut arg_type = arg_type;
        match &arg_type.options_list {
            Setting::Value(options) => {
                let has_long_form = options.iter().any(|o| o.starts_with("--"));
                if arg_type.required.value() == Some(&true) && !has_long_form {
                    return Err(CliError::config(format!(
                        "Argument '{}': a required argument needs a long-form option in its options_list",
                        dest
                    )));
                }
            }
            _ => {
                arg_type.options_list =
                    Setting::Value(vec![format!("--{}", dest.replace('_', "-"))]);
            }
        }
        Ok(CommandArgument {
            dest: dest.to_string(),
            arg_type,
        })
    }

    pub fn name(&self) -> &str {
        &self.dest
    }

    pub fn options_list(&self) -> &[String] {
        self.arg_type
            .options_list
            .value()
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// A plain mapping view of the set, non-removed settings, excluding the
    /// reserved named ones (`options_list`, `validator`, `completer`,
    /// `arg_group`, `deprecate_info`).
    pub fn options(&self) -> IndexMap<String, Value> {
        let mut out = IndexMap::new();
        out.insert("dest".to_string(), Value::String(self.dest.clone()));
        if let Some(required) = self.arg_type.required.value() {
            out.insert("required".to_string(), Value::Bool(*required));
        }
        if let Some(default) = self.arg_type.default.value() {
            out.insert("default".to_string(), default.clone());
        }
        if let Some(choices) = self.arg_type.choices.value() {
            out.insert(
                "choices".to_string(),
                Value::Array(
                    choices
                        .values
                        .iter()
                        .map(|v| Value::String(v.clone()))
                        .collect(),
                ),
            );
        }
        if let Some(help) = self.arg_type.help.value() {
            out.insert("help".to_string(), Value::String(help.clone()));
        }
        if let Some(metavar) = self.arg_type.metavar.value() {
            out.insert("metavar".to_string(), Value::String(metavar.clone()));
        }
        if let Some(action) = self.arg_type.action.value() {
            let label = match action {
                ArgAction::Store => "store",
                ArgAction::StoreTrue => "store_true",
                ArgAction::StoreFalse => "store_false",
                ArgAction::Append => "append",
            };
            out.insert("action".to_string(), Value::String(label.to_string()));
        }
        for (key, setting) in &self.arg_type.extra {
            if let Setting::Value(value) = setting {
                out.insert(key.clone(), value.clone());
            }
        }
        out
    }
}

/// Scope-keyed registry of argument overrides. Scopes are command-path
/// prefix strings; `""` applies globally.
#[derive(Clone, Default)]
pub struct ArgumentRegistry {
    arguments: IndexMap<String, IndexMap<String, ArgType>>,
}

impl ArgumentRegistry {
    pub fn new() -> Self {
        ArgumentRegistry::default()
    }

    /// Store an override at `scope` for destination `dest`. A repeated
    /// registration at the same exact scope+dest overwrites the prior one.
    pub fn register_cli_argument(&mut self, scope: &str, dest: &str, arg_type: ArgType) {
        self.arguments
            .entry(scope.to_string())
            .or_default()
            .insert(dest.to_string(), arg_type);
    }

    /// Resolve the effective settings for `name` on `command` by folding
    /// every matching scope from the empty prefix to the full path, in
    /// increasing-specificity order.
    pub fn get_cli_argument(&self, command: &str, name: &str) -> ArgType {
        let parts: Vec<&str> = command.split_whitespace().collect();
        let mut result = ArgType::new();
        for index in 0..=parts.len() {
            let probe = parts[0..index].join(" ");
            if let Some(override_type) = self.arguments.get(&probe).and_then(|m| m.get(name)) {
                result.update(override_type);
            }
        }
        result
    }
}
