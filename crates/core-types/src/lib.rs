//! Shared primitives for the job listing filter.
//!
//! Everything here is plain data: the active [`Ruleset`], the per-item
//! [`ItemState`] tag, classification [`Decision`]s and the outcome of a
//! full discovery run. No DOM access happens in this crate.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error taxonomy shared by the filter crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// The scrollable list could not be resolved.
    #[error("container not found")]
    ContainerNotFound,

    /// Settings could not be read or written.
    #[error("settings storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The counterpart UI surface is not listening.
    #[error("message delivery failed: {0}")]
    MessageDelivery(String),

    /// A full scan is already running.
    #[error("scan already in progress")]
    ScanInProgress,

    #[error("internal error: {0}")]
    Internal(String),
}

impl FilterError {
    /// Short machine-readable reason used in structured scan results.
    pub fn reason(&self) -> &'static str {
        match self {
            FilterError::ContainerNotFound => "container-not-found",
            FilterError::StorageUnavailable(_) => "storage-unavailable",
            FilterError::MessageDelivery(_) => "message-delivery-failure",
            FilterError::ScanInProgress => "scan-in-progress",
            FilterError::Internal(_) => "internal-error",
        }
    }
}

/// Opaque handle to a live page element.
///
/// Identity is the element itself; handles are only meaningful for the
/// page that issued them and become stale once the host replaces the node.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeRef(pub u64);

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Visual treatment applied to hidden items.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum VisibilityMode {
    /// Take the item out of layout entirely.
    #[default]
    Remove,
    /// Keep the item in place, faded and desaturated.
    Dim,
}

impl VisibilityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisibilityMode::Remove => "remove",
            VisibilityMode::Dim => "dim",
        }
    }
}

impl fmt::Display for VisibilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A visibility mode name that is neither `remove`, `hide` nor `dim`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown visibility mode '{0}'")]
pub struct UnknownVisibilityMode(pub String);

impl FromStr for VisibilityMode {
    type Err = UnknownVisibilityMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            // "hide" is the name older settings documents used for removal
            "remove" | "hide" => Ok(VisibilityMode::Remove),
            "dim" => Ok(VisibilityMode::Dim),
            other => Err(UnknownVisibilityMode(other.to_string())),
        }
    }
}

/// Active filtering configuration. Replaced wholesale on settings change.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "camelCase"))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Ruleset {
    pub promoted_filter_enabled: bool,
    pub blocked_company_names: Vec<String>,
    pub visibility_mode: VisibilityMode,
}

impl Default for Ruleset {
    fn default() -> Self {
        Self {
            promoted_filter_enabled: true,
            blocked_company_names: Vec::new(),
            visibility_mode: VisibilityMode::Remove,
        }
    }
}

impl Ruleset {
    /// Lower-cased, trimmed form used for every company comparison.
    pub fn normalize_company(name: &str) -> String {
        name.trim().to_lowercase()
    }

    /// Appends a blocked company. Blank names and exact duplicates are
    /// ignored; returns whether the list changed.
    pub fn add_blocked_company(&mut self, name: &str) -> bool {
        let trimmed = name.trim();
        if trimmed.is_empty() || self.blocked_company_names.iter().any(|n| n == trimmed) {
            return false;
        }
        self.blocked_company_names.push(trimmed.to_string());
        true
    }

    /// Removes every entry equal to the trimmed `name`; returns whether the
    /// list changed.
    pub fn remove_blocked_company(&mut self, name: &str) -> bool {
        let trimmed = name.trim();
        let before = self.blocked_company_names.len();
        self.blocked_company_names.retain(|n| n != trimmed);
        before != self.blocked_company_names.len()
    }

    /// Blocked names in normalized form, blank entries dropped.
    pub fn normalized_blocked_names(&self) -> Vec<String> {
        self.blocked_company_names
            .iter()
            .map(|name| Self::normalize_company(name))
            .filter(|name| !name.is_empty())
            .collect()
    }
}

/// Outcome of classifying a single item.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Decision {
    Keep,
    Hide,
}

impl Decision {
    pub fn is_hide(&self) -> bool {
        matches!(self, Decision::Hide)
    }
}

/// Processing tag carried by each item element.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum ItemState {
    #[default]
    Unprocessed,
    ProcessedVisible,
    ProcessedHidden(VisibilityMode),
}

impl ItemState {
    /// Attribute value stored on the element; `None` means untagged.
    pub fn marker(&self) -> Option<&'static str> {
        match self {
            ItemState::Unprocessed => None,
            ItemState::ProcessedVisible => Some("visible"),
            ItemState::ProcessedHidden(VisibilityMode::Remove) => Some("hidden-remove"),
            ItemState::ProcessedHidden(VisibilityMode::Dim) => Some("hidden-dim"),
        }
    }

    /// Inverse of [`ItemState::marker`]. Unknown values read as unprocessed
    /// so that a foreign tag never blocks classification.
    pub fn from_marker(marker: Option<&str>) -> Self {
        match marker {
            Some("visible") => ItemState::ProcessedVisible,
            Some("hidden-remove") => ItemState::ProcessedHidden(VisibilityMode::Remove),
            Some("hidden-dim") => ItemState::ProcessedHidden(VisibilityMode::Dim),
            _ => ItemState::Unprocessed,
        }
    }

    pub fn is_processed(&self) -> bool {
        !matches!(self, ItemState::Unprocessed)
    }

    pub fn is_hidden(&self) -> bool {
        matches!(self, ItemState::ProcessedHidden(_))
    }
}

/// Aggregate counts of a successful full scan.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "camelCase"))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ScanReport {
    pub total_items: usize,
    pub hidden_items: usize,
    pub iterations: u32,
}

/// Structured result of one discovery run. Failures never escape as errors.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ScanOutcome {
    Completed(ScanReport),
    Failed { reason: String },
}

impl ScanOutcome {
    pub fn failed(err: &FilterError) -> Self {
        ScanOutcome::Failed {
            reason: err.reason().to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ScanOutcome::Completed(_))
    }

    pub fn report(&self) -> Option<&ScanReport> {
        match self {
            ScanOutcome::Completed(report) => Some(report),
            ScanOutcome::Failed { .. } => None,
        }
    }
}
