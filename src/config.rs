//! # Configuration Module
//!
//! Settings file handling and data directory setup for RadioFree.
//!
//! ## Settings File
//!
//! A single JSON document, by default at `<config_dir>/radiofree/settings.json`:
//! - Linux: `~/.config/radiofree/settings.json`
//! - macOS: `~/Library/Application Support/radiofree/settings.json`
//! - Windows: `%APPDATA%\radiofree\settings.json`
//!
//! Every section and field is optional. Whatever the file leaves out falls
//! back to the built-in default when [`Settings`] is constructed, so a file
//! containing only `{"dj": {"host_name": "Sid"}}` is valid.
//!
//! ```json
//! {
//!   "dj": { "host_name": "Buzz Navarro", "intro_count": 3, "chatter_level": "normal" },
//!   "model": { "api_base": "https://api.openai.com/v1", "model": "gpt-4o-mini" },
//!   "player": { "poll_interval_ms": 2000, "commentary_every": 3 },
//!   "prompts": { "song_insights": "Tell me about {song_name} by {artist_name}" }
//! }
//! ```
//!
//! ## Data Storage
//!
//! Play history lives in the platform data directory, `<data_dir>/radiofree/history.db`.

use crate::error::{DjError, DjResult};
use crate::prompts::PromptTemplates;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Chatter level that suppresses every intro.
pub const SILENT_CHATTER: &str = "silent";

/// Environment variable consulted when `model.api_key` is not set.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Persona and intro throttling for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DjSettings {
    /// Cosmetic label only.
    pub host_name: String,
    /// Maximum number of intros surfaced before they are suppressed.
    pub intro_count: u32,
    /// `"silent"` suppresses all intros; other values are labels.
    pub chatter_level: String,
}

impl Default for DjSettings {
    fn default() -> Self {
        Self {
            host_name: "Buzz Navarro".to_string(),
            intro_count: 3,
            chatter_level: "normal".to_string(),
        }
    }
}

impl DjSettings {
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.chatter_level.eq_ignore_ascii_case(SILENT_CHATTER)
    }
}

/// Chat-completions endpoint used by [`ChatClient`](crate::model::ChatClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Base URL; `/chat/completions` is appended.
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub system_prompt: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            system_prompt: Some(
                "You are an enthusiastic radio DJ with encyclopedic music knowledge. \
                 Follow the requested output format exactly."
                    .to_string(),
            ),
            timeout_secs: 60,
        }
    }
}

impl ModelSettings {
    /// Configured key, or the `OPENAI_API_KEY` environment variable.
    ///
    /// Local OpenAI-compatible servers usually need no key, so `None` is not
    /// an error here.
    #[must_use]
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|key| !key.trim().is_empty()))
    }
}

/// Polling loop settings for `radiofree run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    pub poll_interval_ms: u64,
    /// Emit DJ commentary every N track changes while auto-DJ is on; 0 disables.
    pub commentary_every: u32,
    /// Passed to `mpc` as `--host` when set.
    pub mpc_host: Option<String>,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            commentary_every: 3,
            mpc_host: None,
        }
    }
}

/// Complete settings document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub dj: DjSettings,
    pub model: ModelSettings,
    pub player: PlayerSettings,
    /// Template overrides by name, merged over the built-in defaults.
    pub prompts: HashMap<String, String>,
}

impl Settings {
    /// Parse a settings document, filling gaps with defaults.
    ///
    /// # Errors
    ///
    /// [`DjError::Config`] when `json` is not a valid settings document.
    pub fn from_json(json: &str) -> DjResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load settings from `path`; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// [`DjError::Config`] when the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> DjResult<Self> {
        if !path.exists() {
            log::debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .map_err(|e| DjError::Config(format!("Cannot read {}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    /// Prompt table: built-in defaults with this file's overrides applied.
    #[must_use]
    pub fn templates(&self) -> PromptTemplates {
        PromptTemplates::with_overrides(&self.prompts)
    }

    /// Write the default settings document to `path`.
    ///
    /// Refuses to overwrite an existing file unless `force` is set.
    pub fn write_default(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            anyhow::bail!(
                "Settings file already exists at {}. Use --force to overwrite it.",
                path.display()
            );
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory at {}", parent.display())
            })?;
        }
        let json = serde_json::to_string_pretty(&Self::default())
            .context("Failed to serialize default settings")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;
        Ok(())
    }
}

/// Returns the platform-appropriate RadioFree data directory, creating it if needed.
///
/// # Errors
///
/// Returns an error if the system data directory cannot be determined or the
/// `radiofree` subdirectory cannot be created.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        )
    })?;

    let radiofree_dir = data_dir.join("radiofree");
    fs::create_dir_all(&radiofree_dir).with_context(|| {
        format!(
            "Failed to create RadioFree data directory at {}. Please check file permissions.",
            radiofree_dir.display()
        )
    })?;

    Ok(radiofree_dir)
}

/// Path of the SQLite play history database.
pub fn get_history_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("history.db"))
}

/// Settings file location: `explicit` if given, else the platform default.
pub fn settings_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let config_dir = dirs::config_dir().ok_or_else(|| {
        anyhow::anyhow!("Could not determine system config directory. Pass --config explicitly.")
    })?;
    Ok(config_dir.join("radiofree").join("settings.json"))
}
