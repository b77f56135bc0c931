//! Logging setup and structured scan events

use once_cell::sync::OnceCell;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

static INIT: OnceCell<()> = OnceCell::new();

/// Installs the global subscriber once; later calls are no-ops.
pub fn init_tracing(config: &LoggingConfig) {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));
        let registry = tracing_subscriber::registry().with(filter);
        let result = if config.json {
            registry.with(fmt::layer().json().with_target(true)).try_init()
        } else {
            registry.with(fmt::layer().with_target(true)).try_init()
        };
        // Another subscriber may already be installed by the embedder.
        let _ = result;
    });
}

pub fn emit_scan_started(trigger: &str) {
    info!(target: "jobfilter.discovery", trigger, "scan.started");
}

pub fn emit_scan_completed(
    trigger: &str,
    total_items: usize,
    hidden_items: usize,
    iterations: u32,
    duration: Duration,
) {
    info!(
        target: "jobfilter.discovery",
        trigger,
        total_items,
        hidden_items,
        iterations,
        elapsed_ms = duration.as_millis() as u64,
        "scan.completed"
    );
}

pub fn emit_scan_failed(trigger: &str, reason: &str) {
    warn!(target: "jobfilter.discovery", trigger, reason, "scan.failed");
}

pub fn emit_scan_skipped(trigger: &str) {
    debug!(target: "jobfilter.discovery", trigger, "scan.skipped.in_progress");
}

pub fn emit_light_rescan(examined: usize, newly_hidden: usize, hidden_total: usize) {
    debug!(
        target: "jobfilter.visibility",
        examined,
        newly_hidden,
        hidden_total,
        "light_rescan.completed"
    );
}

pub fn emit_page_change(source: &str, url: &str) {
    info!(target: "jobfilter.watcher", source, url, "page_change.handled");
}

pub fn emit_ruleset_replaced(blocked: usize, promoted: bool, mode: &str) {
    info!(
        target: "jobfilter.settings",
        blocked,
        promoted,
        mode,
        "ruleset.replaced"
    );
}
