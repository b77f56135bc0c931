//! Incremental scroll-driven discovery
//!
//! The list only renders items near its viewport, so a single jump to
//! the bottom under-discovers. The loop advances the scroll cursor in
//! fixed steps, waits for content to settle after each step and stops
//! once the cursor has passed the scroll extent and the item count has
//! held still for a few iterations (or the iteration cap is hit).

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use job_classifier::ClassificationEngine;
use job_locator::Locator;
use jobfilter_core_types::{FilterError, NodeRef, Ruleset, ScanOutcome, ScanReport};
use page_port::{PagePort, PortError, ScrollMetrics};
use tracing::{debug, warn};

use crate::config::TimingConfig;
use crate::pass::{ClassificationPass, PassScope};
use crate::visibility::VisibilityStateMachine;

/// Item count observed after one iteration's settle delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanProgress {
    pub total_items: usize,
    /// Zero-based iteration index.
    pub iteration: u32,
}

/// Receives a progress tick on every iteration, changed count or not.
#[async_trait]
pub trait ProgressObserver: Send + Sync {
    async fn on_progress(&self, progress: ScanProgress);
}

#[async_trait]
impl<F> ProgressObserver for F
where
    F: Fn(ScanProgress) + Send + Sync,
{
    async fn on_progress(&self, progress: ScanProgress) {
        self(progress)
    }
}

/// Bookkeeping for one run; never outlives it.
#[derive(Debug)]
struct ScanSession {
    scroll_cursor: f64,
    stable_iterations: u32,
    iterations: u32,
    discovered: usize,
}

impl ScanSession {
    fn new(initial_cursor: f64) -> Self {
        Self {
            scroll_cursor: initial_cursor,
            stable_iterations: 0,
            iterations: 0,
            discovered: 0,
        }
    }

    fn observe(&mut self, count: usize) {
        if self.discovered == count {
            self.stable_iterations += 1;
        } else {
            self.stable_iterations = 0;
            self.discovered = count;
        }
    }
}

pub struct DiscoveryLoop {
    page: Arc<dyn PagePort>,
    locator: Arc<Locator>,
    classifier: Arc<ClassificationEngine>,
    visibility: Arc<VisibilityStateMachine>,
    timing: TimingConfig,
}

impl DiscoveryLoop {
    pub fn new(
        page: Arc<dyn PagePort>,
        locator: Arc<Locator>,
        classifier: Arc<ClassificationEngine>,
        visibility: Arc<VisibilityStateMachine>,
        timing: TimingConfig,
    ) -> Self {
        Self {
            page,
            locator,
            classifier,
            visibility,
            timing,
        }
    }

    pub async fn run(&self, ruleset: &Ruleset) -> ScanOutcome {
        self.run_with_progress(ruleset, &|_: ScanProgress| {}).await
    }

    /// Runs one full scan. Failures come back as [`ScanOutcome::Failed`].
    pub async fn run_with_progress(
        &self,
        ruleset: &Ruleset,
        observer: &dyn ProgressObserver,
    ) -> ScanOutcome {
        let started = Instant::now();
        let page = self.page.as_ref();

        match self.visibility.clear_visible_marks().await {
            Ok(cleared) => debug!(target: "jobfilter.discovery", cleared, "cleared visible markers"),
            Err(err) => warn!(target: "jobfilter.discovery", %err, "clearing markers failed"),
        }

        let mut container = match self.locator.find_container(page).await {
            Ok(found) => {
                debug!(
                    target: "jobfilter.discovery",
                    node = %found.node,
                    strategy = found.strategy,
                    "scan container resolved"
                );
                found.node
            }
            Err(err) => {
                warn!(target: "jobfilter.discovery", %err, "no scan container");
                return ScanOutcome::failed(&FilterError::from(err));
            }
        };

        let mut session = ScanSession::new(self.timing.initial_cursor_px);
        loop {
            if session.iterations >= self.timing.max_iterations {
                warn!(
                    target: "jobfilter.discovery",
                    iterations = session.iterations,
                    items = session.discovered,
                    "iteration cap reached"
                );
                break;
            }

            if let Err(err) = self.scroll_to(&mut container, session.scroll_cursor).await {
                return ScanOutcome::failed(&err);
            }
            tokio::time::sleep(self.timing.settle()).await;

            let count = self.locator.find_items(page).await.len();
            session.observe(count);
            observer
                .on_progress(ScanProgress {
                    total_items: count,
                    iteration: session.iterations,
                })
                .await;
            session.iterations += 1;
            session.scroll_cursor += self.timing.scroll_step_px;

            let extent = match self.metrics(&mut container).await {
                Ok(metrics) => metrics.scroll_height,
                Err(err) => return ScanOutcome::failed(&err),
            };
            if session.scroll_cursor >= extent
                && session.stable_iterations >= self.timing.stable_iterations
            {
                debug!(
                    target: "jobfilter.discovery",
                    iterations = session.iterations,
                    items = count,
                    "item count stable at end of list"
                );
                break;
            }
        }

        // Trailing content the stepped loop may have missed.
        let bottom = match self.metrics(&mut container).await {
            Ok(metrics) => metrics.scroll_height,
            Err(err) => return ScanOutcome::failed(&err),
        };
        if let Err(err) = self.scroll_to(&mut container, bottom).await {
            return ScanOutcome::failed(&err);
        }
        tokio::time::sleep(self.timing.final_settle()).await;

        let items = self.locator.find_items(page).await;
        let summary = ClassificationPass::new(page, &self.classifier, &self.visibility)
            .run(&items, ruleset, PassScope::All)
            .await;
        if let Err(err) = self.visibility.recount().await {
            warn!(target: "jobfilter.discovery", %err, "recount after scan failed");
        }

        let report = ScanReport {
            total_items: items.len(),
            hidden_items: summary.hidden,
            iterations: session.iterations,
        };
        debug!(
            target: "jobfilter.discovery",
            total = report.total_items,
            hidden = report.hidden_items,
            iterations = report.iterations,
            skipped = summary.skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "discovery finished"
        );
        ScanOutcome::Completed(report)
    }

    async fn scroll_to(&self, container: &mut NodeRef, top: f64) -> Result<(), FilterError> {
        match self.page.set_scroll_top(*container, top).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.reresolve(container, err).await?;
                self.page
                    .set_scroll_top(*container, top)
                    .await
                    .map_err(|_| FilterError::ContainerNotFound)
            }
        }
    }

    async fn metrics(&self, container: &mut NodeRef) -> Result<ScrollMetrics, FilterError> {
        match self.page.scroll_metrics(*container).await {
            Ok(metrics) => Ok(metrics),
            Err(err) => {
                self.reresolve(container, err).await?;
                self.page
                    .scroll_metrics(*container)
                    .await
                    .map_err(|_| FilterError::ContainerNotFound)
            }
        }
    }

    /// The host replaced the list underneath us; look it up again.
    async fn reresolve(&self, container: &mut NodeRef, cause: PortError) -> Result<(), FilterError> {
        if !cause.is_detached() {
            return Err(cause.into());
        }
        let found = self
            .locator
            .find_container(self.page.as_ref())
            .await
            .map_err(FilterError::from)?;
        debug!(
            target: "jobfilter.discovery",
            old = %container,
            new = %found.node,
            "scan container replaced"
        );
        *container = found.node;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use job_locator::LocatorProfile;
    use page_port::{ElementSpec, MemoryPage};
    use parking_lot::Mutex;

    fn scaffold(page: &MemoryPage) -> NodeRef {
        let wrapper = page
            .append(page.body(), ElementSpec::new("div").class("scaffold-layout__list"))
            .unwrap();
        page.append(wrapper, ElementSpec::new("header")).unwrap();
        page.append(wrapper, ElementSpec::new("div").class("jobs-list"))
            .unwrap()
    }

    fn add_item(page: &MemoryPage, container: NodeRef, company: &str) {
        let li = page
            .append(
                container,
                ElementSpec::new("li")
                    .class("scaffold-layout__list-item")
                    .attr("data-occludable-job-id", "1"),
            )
            .unwrap();
        let subtitle = page
            .append(li, ElementSpec::new("div").class("artdeco-entity-lockup__subtitle"))
            .unwrap();
        page.append(subtitle, ElementSpec::new("span").text(company)).unwrap();
        let rendered = page.child_count(container).unwrap() as f64;
        page.set_scroll_extent(container, rendered * 100.0, 400.0).unwrap();
    }

    fn discovery(page: &Arc<MemoryPage>) -> (DiscoveryLoop, Arc<VisibilityStateMachine>) {
        let profile = LocatorProfile::default();
        let visibility = Arc::new(VisibilityStateMachine::new(page.clone()));
        let looped = DiscoveryLoop::new(
            page.clone(),
            Arc::new(Locator::from_profile(&profile)),
            Arc::new(ClassificationEngine::from_profile(&profile)),
            visibility.clone(),
            TimingConfig::default(),
        );
        (looped, visibility)
    }

    fn acme_rules() -> Ruleset {
        Ruleset {
            blocked_company_names: vec!["acme".into()],
            ..Ruleset::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn static_list_terminates_after_stability() {
        let page = MemoryPage::new("https://example.test/jobs/");
        let container = scaffold(&page);
        for company in ["Acme", "Globex", "Initech"] {
            add_item(&page, container, company);
        }
        let (looped, visibility) = discovery(&page);

        let ticks = Mutex::new(Vec::new());
        let outcome = looped
            .run_with_progress(&acme_rules(), &|p: ScanProgress| ticks.lock().push(p))
            .await;

        let report = *outcome.report().unwrap();
        assert_eq!(report.total_items, 3);
        assert_eq!(report.hidden_items, 1);
        // First observation plus three unchanged ones.
        assert_eq!(report.iterations, 4);
        assert_eq!(visibility.hidden_count(), 1);

        let ticks = ticks.lock();
        assert_eq!(ticks.len(), 4);
        assert!(ticks.iter().enumerate().all(|(i, p)| p.iteration == i as u32 && p.total_items == 3));
    }

    #[tokio::test(start_paused = true)]
    async fn lazy_list_is_fully_discovered() {
        let page = MemoryPage::new("https://example.test/jobs/");
        let container = scaffold(&page);
        for _ in 0..5 {
            add_item(&page, container, "Globex");
        }
        let remaining = Arc::new(Mutex::new(20usize));
        let budget = remaining.clone();
        page.on_scroll(container, move |page, node, top| {
            let metrics_bottom = page.child_count(node).unwrap_or(0) as f64 * 100.0;
            if top + 400.0 >= metrics_bottom - 100.0 {
                let mut left = budget.lock();
                for _ in 0..(*left).min(5) {
                    add_item(page, node, "Acme Labs");
                    *left -= 1;
                }
            }
        });
        let (looped, _) = discovery(&page);

        let outcome = looped.run(&acme_rules()).await;
        let report = *outcome.report().unwrap();
        assert_eq!(*remaining.lock(), 0);
        assert_eq!(report.total_items, 25);
        assert_eq!(report.hidden_items, 20);
        assert!(report.iterations < 50);
    }

    #[tokio::test(start_paused = true)]
    async fn endless_source_stops_at_cap() {
        let page = MemoryPage::new("https://example.test/jobs/");
        let container = scaffold(&page);
        add_item(&page, container, "Globex");
        page.on_scroll(container, |page, node, _| add_item(page, node, "Globex"));
        let (looped, _) = discovery(&page);

        let ticks = Mutex::new(0u32);
        let outcome = looped
            .run_with_progress(&Ruleset::default(), &|_: ScanProgress| *ticks.lock() += 1)
            .await;
        let report = *outcome.report().unwrap();
        assert_eq!(report.iterations, 50);
        assert_eq!(*ticks.lock(), 50);
        // 1 seed + 50 stepped scrolls + the final scroll to bottom.
        assert_eq!(report.total_items, 52);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_container_fails_fast() {
        let page = MemoryPage::new("https://example.test/jobs/");
        let (looped, _) = discovery(&page);
        let outcome = looped.run(&Ruleset::default()).await;
        assert_eq!(
            outcome,
            ScanOutcome::Failed {
                reason: "container-not-found".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rerun_reclassifies_visible_items_but_keeps_hidden_ones() {
        let page = MemoryPage::new("https://example.test/jobs/");
        let container = scaffold(&page);
        add_item(&page, container, "Acme");
        add_item(&page, container, "Globex");
        let (looped, visibility) = discovery(&page);

        looped.run(&acme_rules()).await;
        assert_eq!(visibility.hidden_count(), 1);

        let both = Ruleset {
            blocked_company_names: vec!["acme".into(), "globex".into()],
            ..Ruleset::default()
        };
        let report = *looped.run(&both).await.report().unwrap();
        assert_eq!(report.hidden_items, 2);
        assert_eq!(visibility.hidden_count(), 2);

        // Same ruleset again: nothing double-counted.
        let report = *looped.run(&both).await.report().unwrap();
        assert_eq!(report.hidden_items, 2);
        assert_eq!(visibility.hidden_count(), 2);
    }
}
