//! End-to-end invocation scenarios against an in-process CLI.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tempfile::TempDir;

use cadre::arguments::{ArgType, ValueKind};
use cadre::cli::{Cli, CommandsHook};
use cadre::commands::{
    ArgumentsBuilder, CommandSettings, CommandSuperGroup, CommandsLoader, Confirmation,
};
use cadre::config::CliConfig;
use cadre::errors::CliError;
use cadre::events::{EventPayload, EVENT_INVOKER_POST_PARSE_ARGS, EVENT_INVOKER_TRANSFORM_RESULT};
use cadre::invocation::Execution;
use cadre::output::OutputFormat;
use cadre::prompting::{FixedPrompt, NoTty, Prompt};
use cadre::status::Deprecated;

/// Captures the parameter map the handler actually received.
type Captured = Arc<Mutex<Option<cadre::commands::Params>>>;

fn commands_hook(captured: Captured) -> CommandsHook {
    Arc::new(move |loader: &mut CommandsLoader| {
        let captured_create = Arc::clone(&captured);
        loader.handlers.register(
            "ops#net.create",
            Arc::new(move |params| {
                *captured_create.lock().unwrap() = Some(params.clone());
                Ok(json!({
                    "name": params["name"],
                    "size": params["size"],
                    "_internal": "dropped",
                }))
            }),
            ArgumentsBuilder::new()
                .param("name")
                .arg(
                    "size",
                    ArgType::new().kind(ValueKind::Int).default_value(json!(1)),
                ),
        )?;
        let captured_delete = Arc::clone(&captured);
        loader.handlers.register(
            "ops#net.delete",
            Arc::new(move |params| {
                *captured_delete.lock().unwrap() = Some(params.clone());
                Ok(Value::Null)
            }),
            ArgumentsBuilder::new().param("name"),
        )?;
        let mut sg = CommandSuperGroup::new(loader);
        sg.group("net", |g| {
            g.command("create", "ops#net.create")?;
            g.command_with(
                "delete",
                "ops#net.delete",
                CommandSettings::new().confirmation(Confirmation::Prompt),
            )?;
            Ok(())
        })?;
        Ok(())
    })
}

fn test_cli(prompt_answer: bool) -> (Cli, Captured, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = CliConfig::new("CADRETEST", dir.path()).unwrap();
    let captured: Captured = Arc::new(Mutex::new(None));
    let mut cli = Cli::new("cadre", "1.0.0", config, commands_hook(Arc::clone(&captured)));
    cli.set_prompter(Arc::new(FixedPrompt {
        answer: prompt_answer,
    }));
    (cli, captured, dir)
}

fn argv(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

fn result_value(execution: Execution) -> Value {
    match execution {
        Execution::Result(Some(item)) => item.result,
        _ => panic!("expected a command result"),
    }
}

#[test]
fn test_command_round_trip() {
    let (cli, _, _dir) = test_cli(true);
    let invocation = cli
        .execute(&argv(&["net", "create", "--name", "vnet1", "--size", "3"]))
        .unwrap();
    assert_eq!(invocation.data.command, "net create");
    assert_eq!(invocation.data.output_format, OutputFormat::Json);
    // Underscore-prefixed keys are stripped from the wrapped result.
    assert_eq!(
        result_value(invocation.execution),
        json!({"name": "vnet1", "size": 3})
    );
}

#[test]
fn test_command_path_case_insensitive_end_to_end() {
    let (cli, _, _dir) = test_cli(true);
    let invocation = cli
        .execute(&argv(&["Net", "CREATE", "--name", "MixedCase"]))
        .unwrap();
    assert_eq!(invocation.data.command, "net create");
    // Option values keep their casing.
    assert_eq!(
        result_value(invocation.execution)["name"],
        json!("MixedCase")
    );
}

#[test]
fn test_handler_receives_filtered_params() {
    let (cli, captured, _dir) = test_cli(true);
    cli.execute(&argv(&["net", "delete", "--name", "vnet1", "--yes"]))
        .unwrap();
    let params = captured.lock().unwrap().clone().unwrap();
    assert_eq!(params.get("name"), Some(&json!("vnet1")));
    assert!(params.keys().all(|k| !k.starts_with('_')));
    assert!(!params.contains_key("command"));
}

#[test]
fn test_confirmation_declined_cancels() {
    let (cli, captured, _dir) = test_cli(false);
    let err = cli
        .execute(&argv(&["net", "delete", "--name", "vnet1"]))
        .unwrap_err();
    assert!(matches!(err, CliError::Cancelled));
    assert_eq!(err.exit_code(), 1);
    assert!(captured.lock().unwrap().is_none());
}

#[test]
fn test_confirmation_accepted_runs() {
    let (cli, captured, _dir) = test_cli(true);
    cli.execute(&argv(&["net", "delete", "--name", "vnet1"]))
        .unwrap();
    assert!(captured.lock().unwrap().is_some());
}

/// A prompter that fails the test if it is ever consulted.
struct PanicPrompt;

impl Prompt for PanicPrompt {
    fn prompt_y_n(&self, _message: &str, _default: Option<bool>) -> Result<bool, NoTty> {
        panic!("prompt should have been bypassed");
    }
}

#[test]
fn test_yes_flag_bypasses_prompt() {
    let (mut cli, captured, _dir) = test_cli(false);
    cli.set_prompter(Arc::new(PanicPrompt));
    cli.execute(&argv(&["net", "delete", "--name", "vnet1", "-y"]))
        .unwrap();
    assert!(captured.lock().unwrap().is_some());
}

#[test]
fn test_config_disables_confirm_prompt() {
    let dir = TempDir::new().unwrap();
    let mut config = CliConfig::new("CADRETEST", dir.path()).unwrap();
    config
        .set_value("core", "disable_confirm_prompt", "true")
        .unwrap();
    let captured: Captured = Arc::new(Mutex::new(None));
    let mut cli = Cli::new("cadre", "1.0.0", config, commands_hook(Arc::clone(&captured)));
    cli.set_prompter(Arc::new(PanicPrompt));
    cli.execute(&argv(&["net", "delete", "--name", "vnet1"]))
        .unwrap();
    assert!(captured.lock().unwrap().is_some());
}

#[test]
fn test_output_format_flag_reaches_invocation_data() {
    let (cli, _, _dir) = test_cli(true);
    let invocation = cli
        .execute(&argv(&["net", "create", "--name", "n", "-o", "table"]))
        .unwrap();
    assert_eq!(invocation.data.output_format, OutputFormat::Table);
}

#[test]
fn test_parse_error_has_usage_exit_code() {
    let (cli, _, _dir) = test_cli(true);
    let err = cli.execute(&argv(&["net", "create"])).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("--name"));
}

#[test]
fn test_unknown_command_suggests() {
    let (cli, _, _dir) = test_cli(true);
    let err = cli.execute(&argv(&["net", "creat"])).unwrap_err();
    assert!(err.to_string().contains("Did you mean 'create'?"));
}

#[test]
fn test_help_pages() {
    let (cli, _, _dir) = test_cli(true);
    match cli.execute(&[]).unwrap().execution {
        Execution::Help(page) => assert!(page.render(false).contains("cadre")),
        _ => panic!("expected the welcome page"),
    }
    match cli.execute(&argv(&["net", "--help"])).unwrap().execution {
        Execution::Help(page) => {
            let text = page.render(false);
            assert!(text.contains("create"));
            assert!(text.contains("delete"));
        }
        _ => panic!("expected group help"),
    }
    match cli
        .execute(&argv(&["net", "create", "--help"]))
        .unwrap()
        .execution
    {
        Execution::Help(page) => {
            let text = page.render(false);
            assert!(text.contains("--name"));
            assert!(text.contains("Global Arguments"));
            assert!(text.contains("--output"));
        }
        _ => panic!("expected command help"),
    }
}

#[test]
fn test_events_observe_and_transform() {
    let (mut cli, _, _dir) = test_cli(true);
    let seen_command: Arc<Mutex<String>> = Arc::new(Mutex::new(String::new()));
    let seen = Arc::clone(&seen_command);
    cli.register_event(
        EVENT_INVOKER_POST_PARSE_ARGS,
        Arc::new(move |payload| {
            if let EventPayload::ParsedArgs(namespace) = payload {
                *seen.lock().unwrap() = namespace.command.clone();
            }
        }),
    );
    cli.register_event(
        EVENT_INVOKER_TRANSFORM_RESULT,
        Arc::new(|payload| {
            if let EventPayload::Result(value) = payload {
                if let Value::Object(map) = value {
                    map.insert("transformed".to_string(), json!(true));
                }
            }
        }),
    );
    let invocation = cli
        .execute(&argv(&["net", "create", "--name", "n"]))
        .unwrap();
    assert_eq!(*seen_command.lock().unwrap(), "net create");
    assert_eq!(result_value(invocation.execution)["transformed"], json!(true));
}

#[test]
fn test_expired_command_not_invocable() {
    let dir = TempDir::new().unwrap();
    let config = CliConfig::new("CADRETEST", dir.path()).unwrap();
    let hook: CommandsHook = Arc::new(|loader: &mut CommandsLoader| {
        loader.handlers.register(
            "ops#old",
            Arc::new(|_params| Ok(Value::Null)),
            ArgumentsBuilder::new(),
        )?;
        loader.add_command(
            "old",
            "ops#old",
            CommandSettings::new()
                .deprecated(Deprecated::command("old").expiration("0.5.0")),
        )?;
        loader.handlers.register(
            "ops#current",
            Arc::new(|_params| Ok(Value::Null)),
            ArgumentsBuilder::new(),
        )?;
        loader.add_command("current", "ops#current", CommandSettings::new())?;
        Ok(())
    });
    let cli = Cli::new("cadre", "1.0.0", config, hook);
    let err = cli.execute(&argv(&["old"])).unwrap_err();
    assert!(matches!(err, CliError::Parse(_)));
    cli.execute(&argv(&["current"])).unwrap();
}

#[test]
fn test_arguments_hook_applies_overrides() {
    let (mut cli, _, _dir) = test_cli(true);
    cli.set_arguments_hook(Arc::new(|loader: &mut CommandsLoader, command: &str| {
        if command.starts_with("net") {
            loader
                .arguments_context("net")
                .argument("name", ArgType::new().options(&["--name", "-n"]));
        }
        Ok(())
    }));
    let invocation = cli.execute(&argv(&["net", "create", "-n", "short"])).unwrap();
    assert_eq!(result_value(invocation.execution)["name"], json!("short"));
}

#[test]
fn test_handler_error_propagates() {
    let dir = TempDir::new().unwrap();
    let config = CliConfig::new("CADRETEST", dir.path()).unwrap();
    let hook: CommandsHook = Arc::new(|loader: &mut CommandsLoader| {
        loader.handlers.register(
            "ops#boom",
            Arc::new(|_params| Err(anyhow::anyhow!("backend unavailable"))),
            ArgumentsBuilder::new(),
        )?;
        loader.add_command("boom", "ops#boom", CommandSettings::new())?;
        Ok(())
    });
    let cli = Cli::new("cadre", "1.0.0", config, hook);
    let err = cli.execute(&argv(&["boom"])).unwrap_err();
    assert!(matches!(err, CliError::Handler(_)));
    assert_eq!(err.exit_code(), 1);
    assert!(err.to_string().contains("backend unavailable"));
}
