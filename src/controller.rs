//! Filter controller
//!
//! Owns the mutable filter state (ruleset, hidden counter, scanning flag)
//! and wires the locator, classifier, visibility state machine, discovery
//! loop and change watcher together. Each page gets its own controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use async_trait::async_trait;
use job_classifier::ClassificationEngine;
use job_locator::Locator;
use jobfilter_core_types::{FilterError, Ruleset, ScanOutcome};
use jobfilter_event_bus::{publish_best_effort, EventBus, InMemoryBus};
use jobfilter_scheduler::{TimerQueue, TimerToken};
use page_port::{DomChangeSource, MemoryPage, PagePort};
use parking_lot::RwLock;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use crate::config::FilterConfig;
use crate::discovery::{DiscoveryLoop, ProgressObserver, ScanProgress};
use crate::errors::FilterResult;
use crate::messages::{
    FilterEvent, OutboundMessage, Request, Response, ScanResponse, ScanTrigger, SettingsResponse,
};
use crate::pass::{ClassificationPass, PassScope, PassSummary};
use crate::settings::{MemorySettingsStore, SettingsPatch, SettingsStore, StoredSettings};
use crate::status::{IndicatorState, PageCounterSink, StatusSink};
use crate::telemetry;
use crate::visibility::VisibilityStateMachine;
use crate::watcher::{ChangeHandler, ChangeWatcher};

pub const STARTUP_LIGHT_PASS: TimerToken = TimerToken::new("startup-light-pass");
pub const AUTO_SCAN: TimerToken = TimerToken::new("auto-scan");
pub const INDICATOR_RESET: TimerToken = TimerToken::new("indicator-reset");

const EVENT_CAPACITY: usize = 256;

/// External collaborators of a controller.
pub struct ControllerDeps {
    pub page: Arc<dyn PagePort>,
    pub changes: Arc<dyn DomChangeSource>,
    pub settings: Arc<dyn SettingsStore>,
    pub status: Arc<dyn StatusSink>,
    pub outbound: Arc<dyn EventBus<OutboundMessage>>,
}

impl ControllerDeps {
    /// In-memory settings, DOM counter and a private outbound bus.
    pub fn for_memory_page(page: Arc<MemoryPage>, config: &FilterConfig) -> Self {
        let status = PageCounterSink::new(page.clone(), config.locator.counter_anchor.clone());
        Self {
            page: page.clone(),
            changes: page,
            settings: Arc::new(MemorySettingsStore::new()),
            status: Arc::new(status),
            outbound: InMemoryBus::<OutboundMessage>::new(EVENT_CAPACITY),
        }
    }
}

/// Held for the duration of a full scan.
struct ScanGuard<'a>(&'a AtomicBool);

impl<'a> ScanGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct FilterController {
    config: FilterConfig,
    page: Arc<dyn PagePort>,
    changes: Arc<dyn DomChangeSource>,
    locator: Arc<Locator>,
    classifier: Arc<ClassificationEngine>,
    visibility: Arc<VisibilityStateMachine>,
    discovery: DiscoveryLoop,
    ruleset: RwLock<Arc<Ruleset>>,
    scanning: AtomicBool,
    timers: Arc<TimerQueue>,
    watcher: AsyncMutex<ChangeWatcher>,
    settings: Arc<dyn SettingsStore>,
    status: Arc<dyn StatusSink>,
    outbound: Arc<dyn EventBus<OutboundMessage>>,
    events: Arc<InMemoryBus<FilterEvent>>,
}

impl FilterController {
    pub fn new(config: FilterConfig, deps: ControllerDeps) -> Arc<Self> {
        let locator = Arc::new(Locator::from_profile(&config.locator));
        let classifier = Arc::new(ClassificationEngine::from_profile(&config.locator));
        let visibility = Arc::new(VisibilityStateMachine::new(deps.page.clone()));
        let discovery = DiscoveryLoop::new(
            deps.page.clone(),
            locator.clone(),
            classifier.clone(),
            visibility.clone(),
            config.timing.clone(),
        );
        let timers = TimerQueue::new();
        let watcher = ChangeWatcher::new(
            deps.page.clone(),
            timers.clone(),
            config.locator.pagination_selectors.clone(),
            &config.timing,
        );

        Arc::new(Self {
            page: deps.page,
            changes: deps.changes,
            locator,
            classifier,
            visibility,
            discovery,
            ruleset: RwLock::new(Arc::new(Ruleset::default())),
            scanning: AtomicBool::new(false),
            timers,
            watcher: AsyncMutex::new(watcher),
            settings: deps.settings,
            status: deps.status,
            outbound: deps.outbound,
            events: InMemoryBus::new(EVENT_CAPACITY),
            config,
        })
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Snapshot of the active ruleset.
    pub fn ruleset(&self) -> Arc<Ruleset> {
        self.ruleset.read().clone()
    }

    pub fn hidden_count(&self) -> usize {
        self.visibility.hidden_count()
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FilterEvent> {
        self.events.subscribe()
    }

    /// Loads settings, starts watching the page and schedules the startup
    /// light pass and full scan.
    pub async fn start(self: &Arc<Self>) {
        self.load_settings().await;

        let handler: Arc<dyn ChangeHandler> = Arc::new(ControllerHandle(Arc::downgrade(self)));
        self.watcher
            .lock()
            .await
            .start(self.changes.subscribe(), handler);

        let this = Arc::downgrade(self);
        self.timers.schedule_after(
            STARTUP_LIGHT_PASS,
            self.config.timing.startup_light_pass(),
            async move {
                if let Some(this) = this.upgrade() {
                    this.light_rescan().await;
                }
            },
        );
        self.schedule_auto_scan(ScanTrigger::Startup, self.config.timing.startup_full_scan());
        info!(target: "jobfilter.controller", "filter started");
    }

    /// Stops watching and drops every pending timer. A scan already
    /// running finishes on its own.
    pub async fn stop(&self) {
        self.watcher.lock().await.stop().await;
        self.timers.cancel_all();
        info!(target: "jobfilter.controller", "filter stopped");
    }

    /// Replaces the ruleset from the settings store. Storage failures fall
    /// back to defaults.
    pub async fn load_settings(&self) {
        let ruleset = match self.settings.load().await {
            Ok(Some(stored)) => stored.into_ruleset(),
            Ok(None) => Ruleset::default(),
            Err(err) => {
                let err = FilterError::from(err);
                warn!(target: "jobfilter.settings", %err, "settings unavailable, using defaults");
                Ruleset::default()
            }
        };
        debug!(
            target: "jobfilter.settings",
            promoted = ruleset.promoted_filter_enabled,
            blocked = ruleset.blocked_company_names.len(),
            mode = %ruleset.visibility_mode,
            "settings loaded"
        );
        *self.ruleset.write() = Arc::new(ruleset);
    }

    /// Applies a partial settings update: replaces the ruleset, reverts
    /// every hidden item, persists, then rescans what is on screen.
    /// Returns the hidden count afterwards.
    pub async fn update_settings(&self, patch: SettingsPatch) -> usize {
        let next = {
            let mut guard = self.ruleset.write();
            let next = Arc::new(patch.apply(&guard));
            *guard = next.clone();
            next
        };
        telemetry::emit_ruleset_replaced(
            next.blocked_company_names.len(),
            next.promoted_filter_enabled,
            next.visibility_mode.as_str(),
        );

        if let Err(err) = self.visibility.revert_all().await {
            warn!(target: "jobfilter.visibility", %err, "revert after ruleset change failed");
        }
        self.visibility.reset_counter();

        if let Err(err) = self.settings.save(&StoredSettings::from(&*next)).await {
            let err = FilterError::from(err);
            warn!(target: "jobfilter.settings", %err, "settings not persisted");
        }

        self.light_rescan().await;
        let hidden_count = self.visibility.hidden_count();
        publish_best_effort(
            &*self.events,
            FilterEvent::RulesetReplaced { hidden_count },
        )
        .await;
        hidden_count
    }

    /// Classifies items that carry no processing marker yet.
    pub async fn light_rescan(&self) -> PassSummary {
        let ruleset = self.ruleset();
        let items = self.locator.find_items(self.page.as_ref()).await;
        let summary = ClassificationPass::new(self.page.as_ref(), &self.classifier, &self.visibility)
            .run(&items, &ruleset, PassScope::UnprocessedOnly)
            .await;
        let hidden_total = self.refresh_counter().await;
        telemetry::emit_light_rescan(summary.examined, summary.newly_hidden, hidden_total);
        if summary.examined > 0 {
            publish_best_effort(
                &*self.events,
                FilterEvent::LightRescan {
                    examined: summary.examined,
                    newly_hidden: summary.newly_hidden,
                },
            )
            .await;
        }
        summary
    }

    /// Runs one full scan unless one is already active.
    pub async fn scan_all(&self, trigger: ScanTrigger) -> FilterResult<ScanOutcome> {
        let Some(_guard) = ScanGuard::try_acquire(&self.scanning) else {
            telemetry::emit_scan_skipped(trigger.as_str());
            publish_best_effort(&*self.events, FilterEvent::ScanSkipped { trigger }).await;
            return Err(FilterError::ScanInProgress);
        };

        let started = Instant::now();
        telemetry::emit_scan_started(trigger.as_str());
        publish_best_effort(&*self.events, FilterEvent::ScanStarted { trigger }).await;
        self.status.set_indicator(IndicatorState::Scanning, None).await;

        let relay = ScanRelay {
            controller: self,
            trigger,
            outbound: trigger == ScanTrigger::Manual,
        };
        let ruleset = self.ruleset();
        let outcome = self.discovery.run_with_progress(&ruleset, &relay).await;
        self.refresh_counter().await;

        match &outcome {
            ScanOutcome::Completed(report) => {
                telemetry::emit_scan_completed(
                    trigger.as_str(),
                    report.total_items,
                    report.hidden_items,
                    report.iterations,
                    started.elapsed(),
                );
                self.status
                    .set_indicator(
                        IndicatorState::Complete,
                        Some(format!("{} hidden", report.hidden_items)),
                    )
                    .await;
            }
            ScanOutcome::Failed { reason } => {
                telemetry::emit_scan_failed(trigger.as_str(), reason);
                self.status
                    .set_indicator(IndicatorState::Error, Some(reason.clone()))
                    .await;
            }
        }
        let status = Arc::clone(&self.status);
        self.timers.schedule_after(
            INDICATOR_RESET,
            self.config.timing.indicator_reset(),
            async move {
                status.set_indicator(IndicatorState::Normal, None).await;
            },
        );

        publish_best_effort(
            &*self.events,
            FilterEvent::ScanFinished {
                trigger,
                outcome: outcome.clone(),
            },
        )
        .await;
        Ok(outcome)
    }

    /// Timer-driven full scan; dropped when one is already running.
    pub async fn auto_scan(&self, trigger: ScanTrigger) {
        if let Err(err) = self.scan_all(trigger).await {
            debug!(target: "jobfilter.discovery", %trigger, %err, "automatic scan dropped");
        }
    }

    /// Debounced pagination handling: on an in-scope page with no scan
    /// running, forget the old count and scan the new list shortly.
    pub async fn handle_page_change(self: &Arc<Self>, source: &'static str) {
        let url = match self.page.current_url().await {
            Ok(url) => url,
            Err(err) => {
                warn!(target: "jobfilter.watcher", %err, "page url unavailable");
                return;
            }
        };
        if !self.config.scope.contains(&url) {
            debug!(target: "jobfilter.watcher", %url, "page change outside scope");
            return;
        }
        if self.is_scanning() {
            telemetry::emit_scan_skipped(ScanTrigger::PageChange.as_str());
            publish_best_effort(
                &*self.events,
                FilterEvent::ScanSkipped {
                    trigger: ScanTrigger::PageChange,
                },
            )
            .await;
            return;
        }

        telemetry::emit_page_change(source, &url);
        self.visibility.reset_counter();
        self.status.render_counter(0).await;
        self.status
            .set_indicator(IndicatorState::Scanning, Some("Page changed".into()))
            .await;
        publish_best_effort(&*self.events, FilterEvent::PageChangeHandled { source }).await;
        self.schedule_auto_scan(
            ScanTrigger::PageChange,
            self.config.timing.page_change_scan_delay(),
        );
    }

    /// Routes one control-panel request.
    pub async fn handle_message(&self, request: Request) -> Response {
        debug!(target: "jobfilter.messages", ?request, "message received");
        match request {
            Request::UpdateSettings { settings } => {
                let hidden_count = self.update_settings(settings).await;
                Response::Settings(SettingsResponse {
                    success: true,
                    hidden_count,
                })
            }
            Request::ScanAllJobs => {
                let response = match self.scan_all(ScanTrigger::Manual).await {
                    Ok(outcome) => ScanResponse::from(&outcome),
                    Err(err) => ScanResponse::failed(err.reason()),
                };
                Response::Scan(response)
            }
        }
    }

    fn schedule_auto_scan(self: &Arc<Self>, trigger: ScanTrigger, delay: std::time::Duration) {
        let this = Arc::downgrade(self);
        self.timers.schedule_after(AUTO_SCAN, delay, async move {
            if let Some(this) = this.upgrade() {
                this.auto_scan(trigger).await;
            }
        });
    }

    /// Recounts hidden items from the page and renders the result.
    async fn refresh_counter(&self) -> usize {
        let hidden = match self.visibility.recount().await {
            Ok(hidden) => hidden,
            Err(err) => {
                warn!(target: "jobfilter.visibility", %err, "recount failed");
                self.visibility.hidden_count()
            }
        };
        self.status.render_counter(hidden).await;
        hidden
    }
}

/// Fans one progress tick out to events, indicator and outbound messages.
struct ScanRelay<'a> {
    controller: &'a FilterController,
    trigger: ScanTrigger,
    outbound: bool,
}

#[async_trait]
impl<'a> ProgressObserver for ScanRelay<'a> {
    async fn on_progress(&self, progress: ScanProgress) {
        let controller = self.controller;
        publish_best_effort(
            &*controller.events,
            FilterEvent::ScanProgress {
                trigger: self.trigger,
                progress,
            },
        )
        .await;
        controller
            .status
            .set_indicator(
                IndicatorState::Scanning,
                Some(format!("{} jobs", progress.total_items)),
            )
            .await;
        if self.outbound {
            // Nobody listening is the normal case with the panel closed.
            if let Err(err) = controller.outbound.publish(progress.into()).await {
                debug!(target: "jobfilter.messages", %err, "progress not delivered");
            }
        }
    }
}

/// Watcher callbacks; does not keep the controller alive.
struct ControllerHandle(Weak<FilterController>);

#[async_trait]
impl ChangeHandler for ControllerHandle {
    async fn light_rescan(&self) {
        if let Some(controller) = self.0.upgrade() {
            controller.light_rescan().await;
        }
    }

    async fn page_changed(&self, source: &'static str) {
        if let Some(controller) = self.0.upgrade() {
            controller.handle_page_change(source).await;
        }
    }
}
