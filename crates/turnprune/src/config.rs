//! Persisted settings and the stores that hold them.
//!
//! [`Settings`] is the key-value blob the popup edits and the engine reads
//! at startup and on every `applySettings` command. Missing fields fall back
//! to defaults, so a partial blob behaves like `{ ...DEFAULTS, ...saved }`.
//!
//! Persistence is best-effort. A [`SettingsStore`] that fails to load or save
//! leaves the engine running in memory; the failure is logged, never raised.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage key of the settings blob.
pub const SETTINGS_KEY: &str = "chat_pruner_settings";

/// Storage key of the indicator position.
pub const PILL_POSITION_KEY: &str = "pill_position";

/// Smallest allowed `storageCap`.
pub const MIN_STORAGE_CAP: usize = 50;

/// How hidden turns are treated by the popup's archive features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Storage,
    Hidden,
}

/// Color theme for the popup and indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Auto,
    Light,
    Dark,
}

impl Theme {
    /// Resolve to dark/light given the host's color-scheme preference.
    pub fn is_dark(self, host_prefers_dark: bool) -> bool {
        match self {
            Self::Auto => host_prefers_dark,
            Self::Light => false,
            Self::Dark => true,
        }
    }
}

/// Page-structure selectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectorConfig {
    /// Preferred selector for message elements; tried before the built-in
    /// fallbacks.
    pub message: String,
    /// Selector for the rendered content inside a message.
    pub content: String,
    /// Attribute naming the author role of a message.
    pub role_attr: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            message: "li[data-message-author-role], [data-testid*='conversation-turn']".into(),
            content: ".markdown-content, .content".into(),
            role_attr: "data-message-author-role".into(),
        }
    }
}

/// User settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Number of most-recent exchanges kept visible. Default: `5`.
    pub keep_n: usize,
    /// Archive mode. Default: `storage`.
    pub mode: Mode,
    /// Maximum archived turns. Default: `200`, floor `50`.
    pub storage_cap: usize,
    /// Emit engine diagnostics at debug level. Default: `false`.
    pub debug_logs: bool,
    /// Collapse long turns automatically. Default: `false`.
    pub auto_collapse: bool,
    /// Show the on-page indicator badge. Default: `true`.
    pub pill_enabled: bool,
    /// Color theme. Default: `auto`.
    pub theme: Theme,
    /// Page-structure selectors.
    pub selectors: SelectorConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            keep_n: 5,
            mode: Mode::Storage,
            storage_cap: 200,
            debug_logs: false,
            auto_collapse: false,
            pill_enabled: true,
            theme: Theme::Auto,
            selectors: SelectorConfig::default(),
        }
    }
}

impl Settings {
    /// Clamp fields to their legal ranges.
    pub fn normalized(mut self) -> Self {
        self.keep_n = self.keep_n.max(1);
        self.storage_cap = self.storage_cap.max(MIN_STORAGE_CAP);
        self
    }

    /// Apply a named preset, keeping every other field.
    pub fn with_preset(mut self, preset: Preset) -> Self {
        let (keep_n, mode) = preset.values();
        self.keep_n = keep_n;
        self.mode = mode;
        self
    }

    /// Apply `preset` to a stored blob, keeping its other fields.
    pub fn apply_preset(
        value: serde_json::Value,
        preset: Preset,
    ) -> Result<serde_json::Value, StoreError> {
        let settings = Self::from_value(value)?.with_preset(preset);
        Ok(serde_json::to_value(settings)?)
    }

    /// Parse a stored blob, merging over defaults.
    pub fn from_value(value: serde_json::Value) -> Result<Self, StoreError> {
        let settings: Self = serde_json::from_value(value)?;
        Ok(settings.normalized())
    }
}

/// Named settings profiles offered by the popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Performance,
    Research,
    Full,
}

impl Preset {
    fn values(self) -> (usize, Mode) {
        match self {
            Self::Performance => (5, Mode::Hidden),
            Self::Research => (50, Mode::Storage),
            Self::Full => (999_999, Mode::Storage),
        }
    }
}

/// Saved indicator position, in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PillPosition {
    pub x: f64,
    pub y: f64,
}

// ── Stores ──────────────────────────────────────────────────────────

/// Errors raised by a [`SettingsStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("settings I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings blob is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("settings store unavailable: {0}")]
    Unavailable(String),
}

/// Key-value persistence for settings blobs.
pub trait SettingsStore: Send {
    /// Read the blob stored under `key`.
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;
    /// Replace the blob stored under `key`.
    fn save(&mut self, key: &str, value: serde_json::Value) -> Result<(), StoreError>;
}

/// Volatile store, with a switch that makes it behave like an invalidated
/// extension context.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, serde_json::Value>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a blob.
    pub fn with_entry(mut self, key: &str, value: serde_json::Value) -> Self {
        self.entries.insert(key.to_string(), value);
        self
    }

    /// Make every subsequent call fail.
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    /// Peek at a stored blob.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.entries.get(key)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable {
            Err(StoreError::Unavailable("extension context invalidated".into()))
        } else {
            Ok(())
        }
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        self.check()?;
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        self.check()?;
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// Store backed by a single JSON object on disk, one member per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<serde_json::Map<String, serde_json::Value>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(serde_json::Map::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(serde_json::Map::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl SettingsStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.read_all()?.remove(key))
    }

    fn save(&mut self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        let mut all = self.read_all()?;
        all.insert(key.to_string(), value);
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&serde_json::Value::Object(all))?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}
