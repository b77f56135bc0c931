//! Per-item processing state and reversible visual treatment
//!
//! State lives on the element itself as a `data-` attribute, so an item
//! the host page replaces simply comes back unprocessed. Before a hide
//! treatment is applied the prior inline values of every touched
//! property are stashed on the element, which makes `revert` exact.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use jobfilter_core_types::{Decision, ItemState, NodeRef, VisibilityMode};
use page_port::{PagePort, PortError};
use tracing::{debug, trace, warn};

/// Processing marker attribute.
pub const STATE_ATTR: &str = "data-jobfilter-state";
/// Prior inline style values, JSON object of property -> value|null.
pub const RESTORE_ATTR: &str = "data-jobfilter-restore";

const HIDDEN_SELECTOR: &str = r#"[data-jobfilter-state^="hidden"]"#;
const VISIBLE_SELECTOR: &str = r#"[data-jobfilter-state="visible"]"#;
const MARKED_SELECTOR: &str = "[data-jobfilter-state]";

fn treatment(mode: VisibilityMode) -> &'static [(&'static str, &'static str)] {
    match mode {
        VisibilityMode::Remove => &[("display", "none")],
        VisibilityMode::Dim => &[("opacity", "0.3"), ("filter", "grayscale(70%)")],
    }
}

/// What [`VisibilityStateMachine::apply`] did to an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Already processed in this epoch.
    Unchanged(ItemState),
    MarkedVisible,
    Hidden(VisibilityMode),
}

pub struct VisibilityStateMachine {
    page: Arc<dyn PagePort>,
    hidden: AtomicUsize,
}

impl VisibilityStateMachine {
    pub fn new(page: Arc<dyn PagePort>) -> Self {
        Self {
            page,
            hidden: AtomicUsize::new(0),
        }
    }

    pub async fn state_of(&self, item: NodeRef) -> Result<ItemState, PortError> {
        let marker = self.page.attribute(item, STATE_ATTR).await?;
        Ok(ItemState::from_marker(marker.as_deref()))
    }

    /// Processes an unprocessed item exactly once per epoch.
    pub async fn apply(
        &self,
        item: NodeRef,
        decision: Decision,
        mode: VisibilityMode,
    ) -> Result<Transition, PortError> {
        let state = self.state_of(item).await?;
        if state.is_processed() {
            return Ok(Transition::Unchanged(state));
        }

        match decision {
            Decision::Keep => {
                self.mark(item, ItemState::ProcessedVisible).await?;
                Ok(Transition::MarkedVisible)
            }
            Decision::Hide => {
                let styles = treatment(mode);
                let mut prior = BTreeMap::new();
                for (property, _) in styles {
                    prior.insert(
                        (*property).to_string(),
                        self.page.inline_style(item, property).await?,
                    );
                }
                let encoded = serde_json::to_string(&prior)
                    .map_err(|err| PortError::internal(err.to_string()))?;
                self.page.set_attribute(item, RESTORE_ATTR, &encoded).await?;
                for (property, value) in styles {
                    self.page.set_inline_style(item, property, Some(value)).await?;
                }
                self.mark(item, ItemState::ProcessedHidden(mode)).await?;
                let total = self.hidden.fetch_add(1, Ordering::AcqRel) + 1;
                trace!(target: "jobfilter.visibility", %item, %mode, total, "item hidden");
                Ok(Transition::Hidden(mode))
            }
        }
    }

    /// Undoes a hide treatment; returns false when the item was not hidden.
    pub async fn revert(&self, item: NodeRef) -> Result<bool, PortError> {
        let ItemState::ProcessedHidden(mode) = self.state_of(item).await? else {
            return Ok(false);
        };

        let stored = self.page.attribute(item, RESTORE_ATTR).await?;
        let prior: BTreeMap<String, Option<String>> = match stored
            .as_deref()
            .map(serde_json::from_str::<BTreeMap<String, Option<String>>>)
        {
            Some(Ok(prior)) => prior,
            other => {
                // Restore data lost or mangled: clear the treatment outright.
                warn!(
                    target: "jobfilter.visibility",
                    %item,
                    present = other.is_some(),
                    "restore data unusable, clearing treatment"
                );
                treatment(mode)
                    .iter()
                    .map(|(property, _)| ((*property).to_string(), None))
                    .collect()
            }
        };

        for (property, value) in &prior {
            self.page
                .set_inline_style(item, property, value.as_deref())
                .await?;
        }
        self.page.remove_attribute(item, RESTORE_ATTR).await?;
        self.page.remove_attribute(item, STATE_ATTR).await?;
        let _ = self
            .hidden
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)));
        trace!(target: "jobfilter.visibility", %item, %mode, "item restored");
        Ok(true)
    }

    /// Reverts every hidden item and unmarks visible ones, returning the
    /// number of items restored. Items that vanish meanwhile are skipped.
    pub async fn revert_all(&self) -> Result<usize, PortError> {
        let mut restored = 0;
        for item in self.page.query_all(None, MARKED_SELECTOR).await? {
            let outcome = match self.state_of(item).await {
                Ok(state) if state.is_hidden() => self.revert(item).await,
                Ok(_) => self.page.remove_attribute(item, STATE_ATTR).await.map(|_| false),
                Err(err) => Err(err),
            };
            match outcome {
                Ok(true) => restored += 1,
                Ok(false) => {}
                Err(err) if err.is_detached() => {
                    trace!(target: "jobfilter.visibility", %item, "item detached during revert");
                }
                Err(err) => return Err(err),
            }
        }
        self.hidden.store(0, Ordering::Release);
        debug!(target: "jobfilter.visibility", restored, "reverted all items");
        Ok(restored)
    }

    /// Drops `ProcessedVisible` markers so those items are classified
    /// again. Hidden items keep their treatment.
    pub async fn clear_visible_marks(&self) -> Result<usize, PortError> {
        let mut cleared = 0;
        for item in self.page.query_all(None, VISIBLE_SELECTOR).await? {
            match self.page.remove_attribute(item, STATE_ATTR).await {
                Ok(()) => cleared += 1,
                Err(err) if err.is_detached() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(cleared)
    }

    /// Recomputes the hidden count from the page and stores it.
    pub async fn recount(&self) -> Result<usize, PortError> {
        let count = self.page.query_all(None, HIDDEN_SELECTOR).await?.len();
        self.hidden.store(count, Ordering::Release);
        Ok(count)
    }

    pub fn hidden_count(&self) -> usize {
        self.hidden.load(Ordering::Acquire)
    }

    /// Forgets the count; the list it described is gone.
    pub fn reset_counter(&self) {
        self.hidden.store(0, Ordering::Release);
    }

    async fn mark(&self, item: NodeRef, state: ItemState) -> Result<(), PortError> {
        match state.marker() {
            Some(marker) => self.page.set_attribute(item, STATE_ATTR, marker).await,
            None => self.page.remove_attribute(item, STATE_ATTR).await,
        }
    }
}
