//! Classification pass over a set of items

use jobfilter_core_types::{NodeRef, Ruleset};
use job_classifier::ClassificationEngine;
use page_port::PagePort;
use tracing::{debug, warn};

use crate::visibility::{Transition, VisibilityStateMachine};

/// Which items a pass evaluates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassScope {
    /// Light rescan: only items without a processing marker.
    UnprocessedOnly,
    /// Final pass of a full scan: every item is offered to the state machine.
    All,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Items classified in this pass.
    pub examined: usize,
    pub newly_hidden: usize,
    /// Items of the set that are hidden after the pass.
    pub hidden: usize,
    /// Items skipped because the page failed underneath us.
    pub skipped: usize,
}

pub struct ClassificationPass<'a> {
    page: &'a dyn PagePort,
    classifier: &'a ClassificationEngine,
    visibility: &'a VisibilityStateMachine,
}

impl<'a> ClassificationPass<'a> {
    pub fn new(
        page: &'a dyn PagePort,
        classifier: &'a ClassificationEngine,
        visibility: &'a VisibilityStateMachine,
    ) -> Self {
        Self {
            page,
            classifier,
            visibility,
        }
    }

    /// Classifies and applies visibility to `items` under one ruleset
    /// snapshot. A failure on one item never aborts the pass.
    pub async fn run(&self, items: &[NodeRef], ruleset: &Ruleset, scope: PassScope) -> PassSummary {
        let mut summary = PassSummary::default();
        for &item in items {
            let state = match self.visibility.state_of(item).await {
                Ok(state) => state,
                Err(err) => {
                    debug!(target: "jobfilter.visibility", %item, %err, "item unreadable, skipping");
                    summary.skipped += 1;
                    continue;
                }
            };
            if scope == PassScope::UnprocessedOnly && state.is_processed() {
                if state.is_hidden() {
                    summary.hidden += 1;
                }
                continue;
            }

            let decision = match self.classifier.classify(self.page, item, ruleset).await {
                Ok(decision) => decision,
                Err(err) => {
                    if !err.is_detached() {
                        warn!(target: "jobfilter.visibility", %item, %err, "classification failed");
                    }
                    summary.skipped += 1;
                    continue;
                }
            };
            summary.examined += 1;

            match self
                .visibility
                .apply(item, decision, ruleset.visibility_mode)
                .await
            {
                Ok(Transition::Hidden(_)) => {
                    summary.newly_hidden += 1;
                    summary.hidden += 1;
                }
                Ok(Transition::Unchanged(previous)) if previous.is_hidden() => summary.hidden += 1,
                Ok(_) => {}
                Err(err) => {
                    debug!(target: "jobfilter.visibility", %item, %err, "apply failed, skipping");
                    summary.skipped += 1;
                }
            }
        }
        summary
    }
}
