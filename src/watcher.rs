//! DOM change detection with debounced triggers
//!
//! Two triggers feed the shared timer queue:
//! - any mutation schedules a light rescan after a short delay
//! - a click inside a pagination control schedules page-change handling
//!
//! Both are keyed by token, so a burst collapses into its last trigger.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jobfilter_core_types::NodeRef;
use jobfilter_scheduler::{TimerQueue, TimerToken};
use page_port::{PageEvent, PagePort};
use tokio::select;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::TimingConfig;

pub const LIGHT_RESCAN: TimerToken = TimerToken::new("light-rescan");
pub const PAGE_CHANGE: TimerToken = TimerToken::new("page-change");

/// Receives the debounced triggers.
#[async_trait]
pub trait ChangeHandler: Send + Sync {
    async fn light_rescan(&self);
    /// `source` names the pagination control that was clicked.
    async fn page_changed(&self, source: &'static str);
}

pub struct ChangeWatcher {
    page: Arc<dyn PagePort>,
    timers: Arc<TimerQueue>,
    pagination: Arc<Vec<String>>,
    light_delay: Duration,
    page_debounce: Duration,
    task: Option<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl ChangeWatcher {
    pub fn new(
        page: Arc<dyn PagePort>,
        timers: Arc<TimerQueue>,
        pagination_selectors: Vec<String>,
        timing: &TimingConfig,
    ) -> Self {
        Self {
            page,
            timers,
            pagination: Arc::new(pagination_selectors),
            light_delay: timing.light_rescan_delay(),
            page_debounce: timing.page_change_debounce(),
            task: None,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Starts consuming `events`. A running watch loop is replaced.
    pub fn start(&mut self, events: broadcast::Receiver<PageEvent>, handler: Arc<dyn ChangeHandler>) {
        if let Some(handle) = self.task.take() {
            handle.abort();
        }
        if self.shutdown.is_cancelled() {
            self.shutdown = CancellationToken::new();
        }

        let page = Arc::clone(&self.page);
        let timers = Arc::clone(&self.timers);
        let pagination = Arc::clone(&self.pagination);
        let light_delay = self.light_delay;
        let page_debounce = self.page_debounce;
        let shutdown = self.shutdown.clone();
        let mut rx = events;

        self.task = Some(tokio::spawn(async move {
            debug!(target: "jobfilter.watcher", "change watcher started");
            loop {
                select! {
                    _ = shutdown.cancelled() => {
                        debug!(target: "jobfilter.watcher", "change watcher shutting down");
                        break;
                    }
                    event = rx.recv() => {
                        match event {
                            Ok(PageEvent::Mutation { .. }) => {
                                Self::schedule_light(&timers, &handler, light_delay);
                            }
                            Ok(PageEvent::Click { target }) => {
                                let Some(source) =
                                    Self::pagination_hit(page.as_ref(), &pagination, target).await
                                else {
                                    continue;
                                };
                                let handler = Arc::clone(&handler);
                                trace!(target: "jobfilter.watcher", %target, source, "pagination click");
                                timers.schedule_after(PAGE_CHANGE, page_debounce, async move {
                                    handler.page_changed(source).await;
                                });
                            }
                            Ok(PageEvent::Navigated { url }) => {
                                trace!(target: "jobfilter.watcher", %url, "navigation observed");
                            }
                            Err(RecvError::Lagged(skipped)) => {
                                // Missed events may have been mutations.
                                warn!(target: "jobfilter.watcher", skipped, "change watcher lagged");
                                Self::schedule_light(&timers, &handler, light_delay);
                            }
                            Err(RecvError::Closed) => {
                                warn!(target: "jobfilter.watcher", "page event channel closed");
                                break;
                            }
                        }
                    }
                }
            }
            debug!(target: "jobfilter.watcher", "change watcher exited");
        }));
    }

    pub async fn stop(&mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.task.take() {
            let _ = handle.await;
        }
        self.timers.cancel(&LIGHT_RESCAN);
        self.timers.cancel(&PAGE_CHANGE);
    }

    fn schedule_light(timers: &Arc<TimerQueue>, handler: &Arc<dyn ChangeHandler>, delay: Duration) {
        let handler = Arc::clone(handler);
        timers.schedule_after(LIGHT_RESCAN, delay, async move {
            handler.light_rescan().await;
        });
    }

    /// Selector of the first pagination control enclosing `target`.
    async fn pagination_hit(
        page: &dyn PagePort,
        selectors: &Arc<Vec<String>>,
        target: NodeRef,
    ) -> Option<&'static str> {
        for (index, selector) in selectors.iter().enumerate() {
            match page.closest(target, selector).await {
                Ok(Some(_)) => return Some(pagination_source(index, selectors.len())),
                Ok(None) => {}
                Err(err) => {
                    trace!(target: "jobfilter.watcher", %target, %err, "pagination probe failed");
                }
            }
        }
        None
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.task.take() {
            handle.abort();
        }
    }
}

fn pagination_source(index: usize, total: usize) -> &'static str {
    if index + 1 == total && total > 1 {
        return "pagination-region";
    }
    match index {
        0 => "page-number",
        1 => "next-button",
        2 => "previous-button",
        _ => "pagination-control",
    }
}
