//! Configuration loading
//!
//! One YAML document with `timing`, `scope`, `locator` and `logging`
//! sections. Every field has a default, so a partial file (or none at
//! all) is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use job_locator::LocatorProfile;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

/// Overrides the URL scope fragment.
pub const ENV_URL_SCOPE: &str = "JOBFILTER_URL_SCOPE";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub timing: TimingConfig,
    pub scope: ScopeConfig,
    pub locator: LocatorProfile,
    pub logging: LoggingConfig,
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        self.timing.validate()?;
        if self.scope.url_fragment.trim().is_empty() {
            bail!("scope.url_fragment must not be empty");
        }
        self.locator
            .validate()
            .context("invalid locator profile")?;
        Ok(())
    }

    /// Applies environment overrides on top of file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(fragment) = std::env::var(ENV_URL_SCOPE) {
            let fragment = fragment.trim();
            if !fragment.is_empty() {
                self.scope.url_fragment = fragment.to_string();
            }
        }
    }
}

/// Scroll geometry and every delay used by the scan and watcher.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Cursor advance per discovery iteration, px.
    pub scroll_step_px: f64,
    /// First cursor position; slightly below zero-offset to nudge lazy rendering.
    pub initial_cursor_px: f64,
    pub settle_ms: u64,
    pub final_settle_ms: u64,
    /// Consecutive unchanged counts required before the loop may stop.
    pub stable_iterations: u32,
    /// Hard cap on discovery iterations.
    pub max_iterations: u32,
    pub light_rescan_delay_ms: u64,
    pub page_change_debounce_ms: u64,
    pub page_change_scan_delay_ms: u64,
    pub startup_light_pass_ms: u64,
    pub startup_full_scan_ms: u64,
    pub indicator_reset_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            scroll_step_px: 500.0,
            initial_cursor_px: 100.0,
            settle_ms: 600,
            final_settle_ms: 1000,
            stable_iterations: 3,
            max_iterations: 50,
            light_rescan_delay_ms: 200,
            page_change_debounce_ms: 800,
            page_change_scan_delay_ms: 1500,
            startup_light_pass_ms: 1000,
            startup_full_scan_ms: 3000,
            indicator_reset_ms: 3000,
        }
    }
}

impl TimingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.scroll_step_px.is_finite() && self.scroll_step_px > 0.0) {
            bail!("timing.scroll_step_px must be a positive number");
        }
        if !(self.initial_cursor_px.is_finite() && self.initial_cursor_px >= 0.0) {
            bail!("timing.initial_cursor_px must be non-negative");
        }
        if self.max_iterations == 0 {
            bail!("timing.max_iterations must be at least 1");
        }
        Ok(())
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn final_settle(&self) -> Duration {
        Duration::from_millis(self.final_settle_ms)
    }

    pub fn light_rescan_delay(&self) -> Duration {
        Duration::from_millis(self.light_rescan_delay_ms)
    }

    pub fn page_change_debounce(&self) -> Duration {
        Duration::from_millis(self.page_change_debounce_ms)
    }

    pub fn page_change_scan_delay(&self) -> Duration {
        Duration::from_millis(self.page_change_scan_delay_ms)
    }

    pub fn startup_light_pass(&self) -> Duration {
        Duration::from_millis(self.startup_light_pass_ms)
    }

    pub fn startup_full_scan(&self) -> Duration {
        Duration::from_millis(self.startup_full_scan_ms)
    }

    pub fn indicator_reset(&self) -> Duration {
        Duration::from_millis(self.indicator_reset_ms)
    }
}

/// Pages the filter is active on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    pub url_fragment: String,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            url_fragment: "/jobs/".into(),
        }
    }
}

impl ScopeConfig {
    pub fn contains(&self, url: &str) -> bool {
        url.contains(self.url_fragment.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` wins when set.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

/// Configuration together with the path it was (or would have been) read from.
#[derive(Clone, Debug)]
pub struct LoadedConfig {
    pub config: FilterConfig,
    pub path: PathBuf,
}

/// Loads configuration.
///
/// Priority: explicit path > ./config/jobfilter.yaml > <config dir>/jobfilter/config.yaml.
/// A missing file yields defaults; an unreadable or invalid one is an error.
pub async fn load_config(config_path: Option<&Path>) -> Result<LoadedConfig> {
    let config_path = match config_path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };

    let mut config = if fs::try_exists(&config_path).await.unwrap_or(false) {
        let content = fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: FilterConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing {}", config_path.display()))?;
        info!(target: "jobfilter.config", path = %config_path.display(), "loaded configuration");
        config
    } else {
        warn!(
            target: "jobfilter.config",
            path = %config_path.display(),
            "config file not found, using defaults"
        );
        FilterConfig::default()
    };

    config.apply_env_overrides();
    config.validate()?;

    Ok(LoadedConfig {
        config,
        path: config_path,
    })
}

fn default_config_path() -> Result<PathBuf> {
    let local_config = PathBuf::from("config/jobfilter.yaml");
    if local_config.exists() {
        return Ok(local_config);
    }
    let mut path = dirs::config_dir().context("failed to get config directory")?;
    path.push("jobfilter");
    path.push("config.yaml");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_timings() {
        let timing = TimingConfig::default();
        assert_eq!(timing.settle(), Duration::from_millis(600));
        assert_eq!(timing.final_settle(), Duration::from_millis(1000));
        assert_eq!(timing.page_change_debounce(), Duration::from_millis(800));
        assert_eq!(timing.stable_iterations, 3);
        assert_eq!(timing.max_iterations, 50);
        assert!(FilterConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let raw = "timing:\n  settle_ms: 50\nscope:\n  url_fragment: /careers/\n";
        let config: FilterConfig = serde_yaml::from_str(raw).unwrap();
        assert_eq!(config.timing.settle_ms, 50);
        assert_eq!(config.timing.max_iterations, 50);
        assert!(config.scope.contains("https://example.test/careers/123"));
        assert_eq!(config.locator, LocatorProfile::default());
    }

    #[test]
    fn zero_step_is_rejected() {
        let mut config = FilterConfig::default();
        config.timing.scroll_step_px = 0.0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn explicit_missing_path_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let loaded = load_config(Some(&path)).await.unwrap();
        assert_eq!(loaded.path, path);
        assert_eq!(loaded.config.timing, TimingConfig::default());
    }

    #[tokio::test]
    async fn reads_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobfilter.yaml");
        std::fs::write(&path, "timing:\n  max_iterations: 7\nlogging:\n  json: true\n").unwrap();
        let loaded = load_config(Some(&path)).await.unwrap();
        assert_eq!(loaded.config.timing.max_iterations, 7);
        assert!(loaded.config.logging.json);
    }

    #[tokio::test]
    async fn malformed_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "timing: [not, a, map]\n").unwrap();
        assert!(load_config(Some(&path)).await.is_err());
    }
}
