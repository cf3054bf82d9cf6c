// Configuration loaded from the rc file (~/.callq/rc)

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Country prefix stripped from phone numbers when none is configured
pub const DEFAULT_COUNTRY_PREFIX: &str = "370";

/// Default cap on the due-callbacks listing
pub const DEFAULT_CALLBACKS_LIMIT: usize = 20;

/// Settings read from `key=value` lines in the rc file.
///
/// Recognized keys:
/// - `data.location` - database path, relative to the rc directory when not absolute
/// - `agent` - default acting agent name
/// - `phone.country_prefix` - prefix removed during phone normalization
/// - `callbacks.limit` - how many due callbacks to list
///
/// Unknown keys are ignored so newer rc files keep working with older binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_location: Option<PathBuf>,
    pub agent: Option<String>,
    pub country_prefix: String,
    pub callbacks_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_location: None,
            agent: None,
            country_prefix: DEFAULT_COUNTRY_PREFIX.to_string(),
            callbacks_limit: DEFAULT_CALLBACKS_LIMIT,
        }
    }
}

impl Config {
    /// Directory holding the rc file and the default database
    pub fn home_dir() -> Result<PathBuf> {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
            .context("Could not determine home directory")?;
        Ok(home.join(".callq"))
    }

    /// Path of the rc file
    pub fn rc_path() -> Result<PathBuf> {
        Ok(Self::home_dir()?.join("rc"))
    }

    /// Load the rc file if present, otherwise defaults
    pub fn load() -> Result<Self> {
        let path = Self::rc_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content, path.parent())
    }

    /// Parse rc content. `base` resolves a relative `data.location`.
    pub fn parse(content: &str, base: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        for (line_no, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                anyhow::bail!("Invalid config line {}: '{}' (expected key=value)", line_no + 1, line);
            };
            let value = value.trim();

            match key.trim() {
                "data.location" => {
                    let path = PathBuf::from(value);
                    config.data_location = Some(match base {
                        Some(dir) if path.is_relative() => dir.join(path),
                        _ => path,
                    });
                }
                "agent" if !value.is_empty() => config.agent = Some(value.to_string()),
                "phone.country_prefix" => {
                    if !value.chars().all(|c| c.is_ascii_digit()) {
                        anyhow::bail!("phone.country_prefix must be digits, got '{}'", value);
                    }
                    config.country_prefix = value.to_string();
                }
                "callbacks.limit" => {
                    config.callbacks_limit = value
                        .parse()
                        .with_context(|| format!("callbacks.limit must be a number, got '{}'", value))?;
                }
                other => log::debug!("ignoring unknown config key '{}'", other),
            }
        }

        Ok(config)
    }

    /// Database path: configured location or `~/.callq/leads.db`
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.data_location {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::home_dir()?.join("leads.db")),
        }
    }
}
