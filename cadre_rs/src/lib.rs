//! A framework for hierarchical "noun verb" command-line applications.
//!
//! Commands live in a flat table keyed by space-separated paths and are
//! compiled into a parser tree at invocation time. Argument settings merge
//! through a scope-keyed registry, handlers resolve through operation
//! strings, and a small event system lets embedders hook every stage of
//! the pipeline.
//!
//! The usual shape of an application:
//!
//! ```no_run
//! use std::sync::Arc;
//! use cadre::arguments::ArgType;
//! use cadre::cli::Cli;
//! use cadre::commands::{ArgumentsBuilder, CommandSuperGroup, CommandsLoader};
//! use cadre::config::CliConfig;
//! use serde_json::json;
//!
//! let config = CliConfig::new("MYCLI", &CliConfig::default_dir("mycli")).unwrap();
//! let cli = Cli::new("mycli", "1.0.0", config, Arc::new(|loader: &mut CommandsLoader| {
//!     loader.handlers.register(
//!         "ops#thing.show",
//!         Arc::new(|params| Ok(json!({ "name": params["name"] }))),
//!         ArgumentsBuilder::new().param("name"),
//!     )?;
//!     let mut sg = CommandSuperGroup::new(loader);
//!     sg.group("thing", |g| {
//!         g.command("show", "ops#thing.show")?;
//!         Ok(())
//!     })?;
//!     Ok(())
//! }));
//! let args: Vec<String> = std::env::args().skip(1).collect();
//! std::process::exit(cli.invoke(&args));
//! ```

pub mod arguments;
pub mod cli;
pub mod commands;
pub mod completion;
pub mod config;
pub mod errors;
pub mod events;
pub mod help;
pub mod invocation;
pub mod log;
pub mod output;
pub mod parser;
pub mod prompting;
pub mod status;
pub mod util;

pub use cli::{ArgumentsHook, Cli, CommandsHook, Invocation};
pub use errors::{CliError, CliResult};
pub use invocation::{Execution, InvocationData};
