//! Persisted settings and partial updates
//!
//! The stored document uses camelCase keys. Documents written by older
//! releases (`hidePromoted`, `blacklistedCompanies`, `hideMode: "hide"`)
//! are still accepted on read. Each stored key is read on its own: a null
//! or malformed value falls back to that key's default and leaves the
//! other keys intact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use jobfilter_core_types::{Ruleset, VisibilityMode};
use parking_lot::Mutex;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, warn};

use crate::errors::SettingsError;

fn default_true() -> bool {
    true
}

fn parse_mode<'de, D>(raw: &str) -> Result<VisibilityMode, D::Error>
where
    D: Deserializer<'de>,
{
    raw.parse().map_err(D::Error::custom)
}

/// Only an explicit `false` turns the promoted filter off.
fn lenient_enabled<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(!matches!(Value::deserialize(deserializer)?, Value::Bool(false)))
}

/// Non-list values read as an empty list; non-string entries are dropped.
fn lenient_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(entries) => Ok(entries
            .into_iter()
            .filter_map(|entry| match entry {
                Value::String(name) => Some(name),
                _ => None,
            })
            .collect()),
        Value::Null => Ok(Vec::new()),
        other => {
            warn!(target: "jobfilter.settings", value = %other, "blocked companies ignored");
            Ok(Vec::new())
        }
    }
}

fn lenient_mode<'de, D>(deserializer: D) -> Result<VisibilityMode, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(raw) => Ok(raw.parse().unwrap_or_else(|err| {
            warn!(target: "jobfilter.settings", %err, "stored visibility mode ignored");
            VisibilityMode::default()
        })),
        Value::Null => Ok(VisibilityMode::default()),
        other => {
            warn!(target: "jobfilter.settings", value = %other, "stored visibility mode ignored");
            Ok(VisibilityMode::default())
        }
    }
}

fn deserialize_optional_mode<'de, D>(deserializer: D) -> Result<Option<VisibilityMode>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|raw| parse_mode::<D>(&raw))
        .transpose()
}

/// Full settings document as persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSettings {
    #[serde(
        default = "default_true",
        alias = "hidePromoted",
        deserialize_with = "lenient_enabled"
    )]
    pub promoted_filter_enabled: bool,
    #[serde(
        default,
        alias = "blacklistedCompanies",
        deserialize_with = "lenient_names"
    )]
    pub blocked_company_names: Vec<String>,
    #[serde(default, alias = "hideMode", deserialize_with = "lenient_mode")]
    pub visibility_mode: VisibilityMode,
}

impl Default for StoredSettings {
    fn default() -> Self {
        Self::from(&Ruleset::default())
    }
}

impl From<&Ruleset> for StoredSettings {
    fn from(ruleset: &Ruleset) -> Self {
        Self {
            promoted_filter_enabled: ruleset.promoted_filter_enabled,
            blocked_company_names: ruleset.blocked_company_names.clone(),
            visibility_mode: ruleset.visibility_mode,
        }
    }
}

impl StoredSettings {
    /// Blank and duplicate company entries are dropped.
    pub fn into_ruleset(self) -> Ruleset {
        let mut ruleset = Ruleset {
            promoted_filter_enabled: self.promoted_filter_enabled,
            blocked_company_names: Vec::with_capacity(self.blocked_company_names.len()),
            visibility_mode: self.visibility_mode,
        };
        for name in &self.blocked_company_names {
            ruleset.add_blocked_company(name);
        }
        ruleset
    }
}

/// Settings payload of an `updateSettings` message. Absent keys keep
/// their current value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, alias = "hidePromoted", skip_serializing_if = "Option::is_none")]
    pub promoted_filter_enabled: Option<bool>,
    #[serde(
        default,
        alias = "blacklistedCompanies",
        skip_serializing_if = "Option::is_none"
    )]
    pub blocked_company_names: Option<Vec<String>>,
    #[serde(
        default,
        alias = "hideMode",
        deserialize_with = "deserialize_optional_mode",
        skip_serializing_if = "Option::is_none"
    )]
    pub visibility_mode: Option<VisibilityMode>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.promoted_filter_enabled.is_none()
            && self.blocked_company_names.is_none()
            && self.visibility_mode.is_none()
    }

    /// New ruleset with this patch laid over `current`.
    pub fn apply(&self, current: &Ruleset) -> Ruleset {
        let mut next = current.clone();
        if let Some(enabled) = self.promoted_filter_enabled {
            next.promoted_filter_enabled = enabled;
        }
        if let Some(names) = &self.blocked_company_names {
            next.blocked_company_names.clear();
            for name in names {
                next.add_blocked_company(name);
            }
        }
        if let Some(mode) = self.visibility_mode {
            next.visibility_mode = mode;
        }
        next
    }
}

/// Key-value store holding the settings document.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    async fn load(&self) -> Result<Option<StoredSettings>, SettingsError>;
    async fn save(&self, settings: &StoredSettings) -> Result<(), SettingsError>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    inner: Mutex<Option<StoredSettings>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: StoredSettings) -> Self {
        Self {
            inner: Mutex::new(Some(settings)),
        }
    }

    pub fn snapshot(&self) -> Option<StoredSettings> {
        self.inner.lock().clone()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> Result<Option<StoredSettings>, SettingsError> {
        Ok(self.snapshot())
    }

    async fn save(&self, settings: &StoredSettings) -> Result<(), SettingsError> {
        *self.inner.lock() = Some(settings.clone());
        Ok(())
    }
}

/// One pretty-printed JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileSettingsStore {
    path: PathBuf,
}

impl JsonFileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/jobfilter/settings.json`, when a config dir exists.
    pub fn default_location() -> Option<Self> {
        let mut path = dirs::config_dir()?;
        path.push("jobfilter");
        path.push("settings.json");
        Some(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for JsonFileSettingsStore {
    async fn load(&self) -> Result<Option<StoredSettings>, SettingsError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(target: "jobfilter.settings", path = %self.path.display(), "no settings file");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn save(&self, settings: &StoredSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let serialized = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, serialized).await?;
        debug!(target: "jobfilter.settings", path = %self.path.display(), "settings saved");
        Ok(())
    }
}
