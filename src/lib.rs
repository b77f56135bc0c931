//! JobFilter library
//!
//! Discovers the items of a lazily rendered job list, classifies each one
//! against the active ruleset and reversibly hides or dims it while the
//! host page keeps mutating.

pub mod config;
pub mod controller;
pub mod discovery;
pub mod errors;
pub mod messages;
pub mod pass;
pub mod settings;
pub mod status;
pub mod telemetry;
pub mod visibility;
pub mod watcher;

// Re-export commonly used types for external use
pub use config::{load_config, FilterConfig, LoadedConfig, LoggingConfig, ScopeConfig, TimingConfig};
pub use controller::{ControllerDeps, FilterController};
pub use discovery::{DiscoveryLoop, ProgressObserver, ScanProgress};
pub use errors::{FilterResult, SettingsError};
pub use messages::{FilterEvent, OutboundMessage, Request, Response, ScanResponse, ScanTrigger, SettingsResponse};
pub use settings::{JsonFileSettingsStore, MemorySettingsStore, SettingsPatch, SettingsStore, StoredSettings};
pub use status::{IndicatorState, PageCounterSink, StatusSink};
pub use visibility::VisibilityStateMachine;
pub use watcher::{ChangeHandler, ChangeWatcher};

pub use jobfilter_core_types::{
    Decision, FilterError, ItemState, NodeRef, Ruleset, ScanOutcome, ScanReport, VisibilityMode,
};
