//! Resolution strategies
//!
//! Container strategies in fallback order:
//! 1. Header sibling - element right after the wrapper's header
//! 2. Scrollable child - first non-header wrapper child that scrolls or holds items
//! 3. Direct selectors - last-resort selectors
//!
//! Item strategies are plain selectors; text probes read label text inside an item.

use async_trait::async_trait;
use jobfilter_core_types::NodeRef;
use page_port::PagePort;
use tracing::debug;

use crate::errors::LocatorError;

/// Strategy for resolving the scrollable container
#[async_trait]
pub trait ContainerStrategy: Send + Sync {
    /// Stable strategy name, used in logs and not-found reports
    fn name(&self) -> &'static str;

    /// Attempt to resolve the container; `Ok(None)` means "no match here"
    async fn locate(&self, page: &dyn PagePort) -> Result<Option<NodeRef>, LocatorError>;
}

/// Strategy for collecting the current listing items
#[async_trait]
pub trait ItemStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// All matching items in document order
    async fn collect(&self, page: &dyn PagePort) -> Result<Vec<NodeRef>, LocatorError>;
}

/// Wrapper > header + container: take the header's next sibling
pub struct HeaderSiblingStrategy {
    wrapper: String,
    header: String,
}

impl HeaderSiblingStrategy {
    pub fn new(wrapper: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            wrapper: wrapper.into(),
            header: header.into(),
        }
    }
}

#[async_trait]
impl ContainerStrategy for HeaderSiblingStrategy {
    fn name(&self) -> &'static str {
        "header-sibling"
    }

    async fn locate(&self, page: &dyn PagePort) -> Result<Option<NodeRef>, LocatorError> {
        let Some(wrapper) = page.query_first(None, &self.wrapper).await? else {
            return Ok(None);
        };
        let Some(header) = page.query_first(Some(wrapper), &self.header).await? else {
            debug!(wrapper = %wrapper, "list wrapper has no header");
            return Ok(None);
        };
        Ok(page.next_sibling(header).await?)
    }
}

/// First wrapper child that is not the header and looks like the list
pub struct ScrollableChildStrategy {
    wrapper: String,
    header: String,
    item_probes: Vec<String>,
}

impl ScrollableChildStrategy {
    pub fn new(
        wrapper: impl Into<String>,
        header: impl Into<String>,
        item_probes: Vec<String>,
    ) -> Self {
        Self {
            wrapper: wrapper.into(),
            header: header.into(),
            item_probes,
        }
    }

    async fn looks_like_list(&self, page: &dyn PagePort, child: NodeRef) -> Result<bool, LocatorError> {
        if page.scroll_metrics(child).await?.is_scrollable() {
            return Ok(true);
        }
        for property in ["overflow", "overflow-y"] {
            if page.inline_style(child, property).await?.as_deref() == Some("auto") {
                return Ok(true);
            }
        }
        if page.class_name(child).await?.contains("scroll") {
            return Ok(true);
        }
        for probe in self.item_probes.iter().filter(|s| !s.trim().is_empty()) {
            if page.query_first(Some(child), probe).await?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[async_trait]
impl ContainerStrategy for ScrollableChildStrategy {
    fn name(&self) -> &'static str {
        "scrollable-child"
    }

    async fn locate(&self, page: &dyn PagePort) -> Result<Option<NodeRef>, LocatorError> {
        let Some(wrapper) = page.query_first(None, &self.wrapper).await? else {
            return Ok(None);
        };
        for child in page.children(wrapper).await? {
            if page.closest(child, &self.header).await? == Some(child) {
                continue;
            }
            if self.looks_like_list(page, child).await? {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }
}

/// Last-resort selectors, first hit wins
pub struct DirectSelectorStrategy {
    selectors: Vec<String>,
}

impl DirectSelectorStrategy {
    pub fn new(selectors: Vec<String>) -> Self {
        Self { selectors }
    }
}

#[async_trait]
impl ContainerStrategy for DirectSelectorStrategy {
    fn name(&self) -> &'static str {
        "direct-selector"
    }

    async fn locate(&self, page: &dyn PagePort) -> Result<Option<NodeRef>, LocatorError> {
        for selector in self.selectors.iter().filter(|s| !s.trim().is_empty()) {
            if let Some(node) = page.query_first(None, selector).await? {
                debug!(selector = %selector, "container resolved by direct selector");
                return Ok(Some(node));
            }
        }
        Ok(None)
    }
}

/// Items matching one selector
pub struct SelectorItemStrategy {
    selector: String,
}

impl SelectorItemStrategy {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }
}

#[async_trait]
impl ItemStrategy for SelectorItemStrategy {
    fn name(&self) -> &str {
        &self.selector
    }

    async fn collect(&self, page: &dyn PagePort) -> Result<Vec<NodeRef>, LocatorError> {
        Ok(page.query_all(None, &self.selector).await?)
    }
}

/// Reads text found by a selector inside one item
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextProbe {
    selector: String,
}

impl TextProbe {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Trimmed text of every match, in document order
    pub async fn texts(&self, page: &dyn PagePort, item: NodeRef) -> Result<Vec<String>, LocatorError> {
        let mut out = Vec::new();
        for node in page.query_all(Some(item), &self.selector).await? {
            out.push(page.text_content(node).await?.trim().to_string());
        }
        Ok(out)
    }

    /// Trimmed text of the first match only
    pub async fn first_text(
        &self,
        page: &dyn PagePort,
        item: NodeRef,
    ) -> Result<Option<String>, LocatorError> {
        match page.query_first(Some(item), &self.selector).await? {
            Some(node) => Ok(Some(page.text_content(node).await?.trim().to_string())),
            None => Ok(None),
        }
    }
}
