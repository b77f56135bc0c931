//! Locator with fallback chain orchestration

use std::sync::Arc;

use jobfilter_core_types::NodeRef;
use page_port::PagePort;
use tracing::{debug, warn};

use crate::{errors::LocatorError, strategies::*, types::*};

/// Resolves the listing container and items against the live page
pub struct Locator {
    container_chain: Vec<Arc<dyn ContainerStrategy>>,
    item_chain: Vec<Arc<dyn ItemStrategy>>,
}

impl Locator {
    /// Create a locator from explicit strategy chains
    pub fn new(
        container_chain: Vec<Arc<dyn ContainerStrategy>>,
        item_chain: Vec<Arc<dyn ItemStrategy>>,
    ) -> Self {
        Self {
            container_chain,
            item_chain,
        }
    }

    /// Build the standard chains from a selector profile
    pub fn from_profile(profile: &LocatorProfile) -> Self {
        let container_chain: Vec<Arc<dyn ContainerStrategy>> = vec![
            Arc::new(HeaderSiblingStrategy::new(
                profile.list_wrapper.clone(),
                profile.header.clone(),
            )),
            Arc::new(ScrollableChildStrategy::new(
                profile.list_wrapper.clone(),
                profile.header.clone(),
                profile.item_selectors.clone(),
            )),
            Arc::new(DirectSelectorStrategy::new(
                profile.container_fallbacks.clone(),
            )),
        ];
        let item_chain = profile
            .item_selectors
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| Arc::new(SelectorItemStrategy::new(s.clone())) as Arc<dyn ItemStrategy>)
            .collect();
        Self::new(container_chain, item_chain)
    }

    /// Resolve the scrollable container, trying each strategy in order
    pub async fn find_container(&self, page: &dyn PagePort) -> Result<ContainerMatch, LocatorError> {
        for strategy in &self.container_chain {
            match strategy.locate(page).await {
                Ok(Some(node)) => {
                    debug!(
                        target: "jobfilter.locator",
                        strategy = strategy.name(),
                        %node,
                        "container resolved"
                    );
                    return Ok(ContainerMatch {
                        node,
                        strategy: strategy.name(),
                    });
                }
                Ok(None) => {
                    debug!(target: "jobfilter.locator", strategy = strategy.name(), "no container match");
                }
                Err(err) => {
                    warn!(target: "jobfilter.locator", strategy = strategy.name(), %err, "container strategy failed");
                }
            }
        }

        Err(LocatorError::ContainerNotFound {
            tried: self.container_chain.iter().map(|s| s.name()).collect(),
        })
    }

    /// Current items from the first strategy with a non-empty result.
    /// Results of different strategies are never merged.
    pub async fn find_items(&self, page: &dyn PagePort) -> Vec<NodeRef> {
        for strategy in &self.item_chain {
            match strategy.collect(page).await {
                Ok(items) if !items.is_empty() => return items,
                Ok(_) => {}
                Err(err) => {
                    warn!(target: "jobfilter.locator", strategy = strategy.name(), %err, "item strategy failed");
                }
            }
        }
        Vec::new()
    }
}
