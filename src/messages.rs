//! Message surface shared with the control panel
//!
//! Requests and outbound messages are tagged by `action`; responses are
//! bare objects whose shape depends on the request.

use std::fmt;

use jobfilter_core_types::{ScanOutcome, ScanReport};
use serde::{Deserialize, Serialize};

use crate::discovery::ScanProgress;
use crate::settings::SettingsPatch;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    UpdateSettings {
        #[serde(default)]
        settings: SettingsPatch,
    },
    ScanAllJobs,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Settings(SettingsResponse),
    Scan(ScanResponse),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub success: bool,
    pub hidden_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ScanResponse {
    pub fn completed(report: &ScanReport) -> Self {
        Self {
            success: true,
            total_items: Some(report.total_items),
            hidden_items: Some(report.hidden_items),
            iterations: Some(report.iterations),
            reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            total_items: None,
            hidden_items: None,
            iterations: None,
            reason: Some(reason.into()),
        }
    }
}

impl From<&ScanOutcome> for ScanResponse {
    fn from(outcome: &ScanOutcome) -> Self {
        match outcome {
            ScanOutcome::Completed(report) => Self::completed(report),
            ScanOutcome::Failed { reason } => Self::failed(reason.clone()),
        }
    }
}

/// Messages pushed to the control panel without a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum OutboundMessage {
    #[serde(rename_all = "camelCase")]
    ScanProgress { total_items: usize, iteration: u32 },
}

impl From<ScanProgress> for OutboundMessage {
    fn from(progress: ScanProgress) -> Self {
        OutboundMessage::ScanProgress {
            total_items: progress.total_items,
            iteration: progress.iteration,
        }
    }
}

/// What started a full scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScanTrigger {
    Startup,
    PageChange,
    Manual,
}

impl ScanTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanTrigger::Startup => "startup",
            ScanTrigger::PageChange => "page-change",
            ScanTrigger::Manual => "manual",
        }
    }
}

impl fmt::Display for ScanTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Controller activity, for embedders and tests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterEvent {
    RulesetReplaced { hidden_count: usize },
    LightRescan { examined: usize, newly_hidden: usize },
    ScanStarted { trigger: ScanTrigger },
    ScanProgress { trigger: ScanTrigger, progress: ScanProgress },
    ScanFinished { trigger: ScanTrigger, outcome: ScanOutcome },
    /// A scan was requested while another one was running.
    ScanSkipped { trigger: ScanTrigger },
    PageChangeHandled { source: &'static str },
}
