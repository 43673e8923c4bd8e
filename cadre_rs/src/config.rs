//! Layered CLI configuration.
//!
//! Values resolve environment-first: `<PREFIX>_<SECTION>_<OPTION>` beats
//! a local overlay file, which beats the global file. The global file lives
//! at `<config_dir>/config.toml` with one table per section and is the only
//! layer [`CliConfig::set_value`] writes to.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{CliError, CliResult};

const CONFIG_FILE_NAME: &str = "config.toml";

const TRUE_STATES: &[&str] = &["1", "yes", "true", "on"];
const FALSE_STATES: &[&str] = &["0", "no", "false", "off"];

#[derive(Clone, Debug)]
pub struct CliConfig {
    env_var_prefix: String,
    config_path: PathBuf,
    data: toml::Table,
    overlay: toml::Table,
}

fn read_table(path: &Path) -> CliResult<toml::Table> {
    if !path.is_file() {
        return Ok(toml::Table::new());
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        CliError::config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    raw.parse::<toml::Table>().map_err(|e| {
        CliError::config(format!(
            "Failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })
}

impl CliConfig {
    /// Loads the config file under `config_dir` if one exists. A missing
    /// file is an empty config, not an error.
    pub fn new(env_var_prefix: &str, config_dir: &Path) -> CliResult<Self> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);
        Ok(CliConfig {
            env_var_prefix: env_var_prefix.to_uppercase(),
            data: read_table(&config_path)?,
            config_path,
            overlay: toml::Table::new(),
        })
    }

    /// Layers `<dir>/config.toml` over the global file. Used for
    /// per-project configuration in the working directory.
    pub fn load_local_overlay(&mut self, dir: &Path) -> CliResult<()> {
        self.overlay = read_table(&dir.join(CONFIG_FILE_NAME))?;
        Ok(())
    }

    /// The config directory for a CLI: `<PREFIX>_CONFIG_DIR` when set,
    /// otherwise `~/.<name>`.
    pub fn default_dir(cli_name: &str) -> PathBuf {
        let env_name = format!(
            "{}_CONFIG_DIR",
            cli_name.to_uppercase().replace('-', "_")
        );
        if let Some(dir) = env::var_os(env_name) {
            return PathBuf::from(dir);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(format!(".{}", cli_name))
    }

    fn env_var_name(&self, section: &str, option: &str) -> String {
        format!(
            "{}_{}_{}",
            self.env_var_prefix,
            section.to_uppercase(),
            option.to_uppercase()
        )
    }

    pub fn has_option(&self, section: &str, option: &str) -> bool {
        self.get(section, option).is_some()
    }

    pub fn get(&self, section: &str, option: &str) -> Option<String> {
        if let Ok(value) = env::var(self.env_var_name(section, option)) {
            return Some(value);
        }
        let found = self
            .overlay
            .get(section)
            .and_then(|table| table.get(option))
            .or_else(|| self.data.get(section)?.get(option))?;
        match found {
            toml::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn get_default(&self, section: &str, option: &str, default: &str) -> String {
        self.get(section, option)
            .unwrap_or_else(|| default.to_string())
    }

    /// Booleans accept the usual spellings in either case. Anything else
    /// falls back to `default` with a warning.
    pub fn get_bool(&self, section: &str, option: &str, default: bool) -> bool {
        match self.get(section, option) {
            Some(raw) => {
                let lowered = raw.to_lowercase();
                if TRUE_STATES.contains(&lowered.as_str()) {
                    true
                } else if FALSE_STATES.contains(&lowered.as_str()) {
                    false
                } else {
                    tracing::warn!(section, option, value = raw.as_str(), "not a boolean value");
                    default
                }
            }
            None => default,
        }
    }

    pub fn get_int(&self, section: &str, option: &str, default: i64) -> i64 {
        self.get(section, option)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(default)
    }

    pub fn get_float(&self, section: &str, option: &str, default: f64) -> f64 {
        self.get(section, option)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(default)
    }

    /// Deserializes a whole section into a typed struct. Environment
    /// overrides do not apply here; this reads the file layer only.
    pub fn get_section<T: serde::de::DeserializeOwned>(&self, section: &str) -> Option<T> {
        self.data.get(section)?.clone().try_into().ok()
    }

    /// Sets one option and rewrites the config file.
    pub fn set_value(&mut self, section: &str, option: &str, value: &str) -> CliResult<()> {
        let table = self
            .data
            .entry(section.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        match table {
            toml::Value::Table(entries) => {
                entries.insert(option.to_string(), toml::Value::String(value.to_string()));
            }
            _ => {
                return Err(CliError::config(format!(
                    "Config section '{}' is not a table",
                    section
                )))
            }
        }
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CliError::config(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        let rendered = toml::to_string_pretty(&self.data)
            .map_err(|e| CliError::config(format!("Failed to serialize config: {}", e)))?;
        fs::write(&self.config_path, rendered).map_err(|e| {
            CliError::config(format!(
                "Failed to write config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;
        Ok(())
    }
}
