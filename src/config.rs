//! Configuration Management
//!
//! Handles persistent configuration storage for fedi.

use anyhow::{Context, Result};
use fedi_rest::entity::Application;
use fedi_rest::Entity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const HOST_ENV: &str = "FEDI_HOST";
pub const TOKEN_ENV: &str = "FEDI_TOKEN";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Instance to talk to, e.g. `mastodon.social`
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    /// Exported record of the registered application
    #[serde(default)]
    pub application: Option<Value>,
    #[serde(default = "enabled")]
    pub use_cache: bool,
}

fn enabled() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: None,
            access_token: None,
            application: None,
            use_cache: true,
        }
    }
}

/// First of flag, environment, saved value
fn pick(flag: Option<&str>, env: Option<String>, saved: Option<&String>) -> Option<String> {
    flag.map(str::to_string)
        .or(env.filter(|v| !v.is_empty()))
        .or_else(|| saved.cloned())
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("fedi").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;

        Ok(())
    }

    /// Get effective host (CLI > FEDI_HOST > config)
    pub fn effective_host(&self, flag: Option<&str>) -> Option<String> {
        pick(flag, std::env::var(HOST_ENV).ok(), self.host.as_ref())
    }

    /// Get effective token (CLI > FEDI_TOKEN > config)
    pub fn effective_token(&self, flag: Option<&str>) -> Option<String> {
        pick(flag, std::env::var(TOKEN_ENV).ok(), self.access_token.as_ref())
    }

    /// The saved application, if one was registered
    pub fn application(&self) -> Result<Option<Application>> {
        self.application
            .clone()
            .map(Application::from_record)
            .transpose()
            .context("Saved application record is invalid; run `fedi register` again")
    }

    /// Remember a registered application (and its instance) and save
    pub fn set_application(&mut self, app: &Application) -> Result<()> {
        self.application = Some(app.export()?);
        self.host = Some(app.host.clone());
        self.save()
    }

    /// Set access token and save
    pub fn set_token(&mut self, token: &str) -> Result<()> {
        self.access_token = Some(token.to_string());
        self.save()
    }
}
