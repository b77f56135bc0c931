use async_trait::async_trait;
use jobfilter_core_types::NodeRef;

use crate::errors::PortError;

/// Scroll geometry of one element, in CSS pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn is_scrollable(&self) -> bool {
        self.scroll_height > self.client_height
    }

    pub fn max_scroll_top(&self) -> f64 {
        (self.scroll_height - self.client_height).max(0.0)
    }
}

/// Read/write access to the host page's DOM.
///
/// Every call re-reads live state; implementations must not cache node
/// sets because the host may replace whole subtrees at any time.
#[async_trait]
pub trait PagePort: Send + Sync {
    async fn current_url(&self) -> Result<String, PortError>;

    /// All elements matching `selector` in document order, searched under
    /// `scope` (exclusive) or the whole document when `scope` is `None`.
    async fn query_all(
        &self,
        scope: Option<NodeRef>,
        selector: &str,
    ) -> Result<Vec<NodeRef>, PortError>;

    async fn query_first(
        &self,
        scope: Option<NodeRef>,
        selector: &str,
    ) -> Result<Option<NodeRef>, PortError> {
        Ok(self.query_all(scope, selector).await?.into_iter().next())
    }

    async fn children(&self, node: NodeRef) -> Result<Vec<NodeRef>, PortError>;
    async fn next_sibling(&self, node: NodeRef) -> Result<Option<NodeRef>, PortError>;

    /// Lower-case tag name.
    async fn tag_name(&self, node: NodeRef) -> Result<String, PortError>;
    async fn class_name(&self, node: NodeRef) -> Result<String, PortError>;

    /// Concatenated text of the node and all its descendants.
    async fn text_content(&self, node: NodeRef) -> Result<String, PortError>;

    /// Nearest inclusive ancestor matching `selector`.
    async fn closest(&self, node: NodeRef, selector: &str)
        -> Result<Option<NodeRef>, PortError>;

    async fn scroll_metrics(&self, node: NodeRef) -> Result<ScrollMetrics, PortError>;
    async fn set_scroll_top(&self, node: NodeRef, value: f64) -> Result<(), PortError>;

    async fn attribute(&self, node: NodeRef, name: &str) -> Result<Option<String>, PortError>;
    async fn set_attribute(&self, node: NodeRef, name: &str, value: &str)
        -> Result<(), PortError>;
    async fn remove_attribute(&self, node: NodeRef, name: &str) -> Result<(), PortError>;

    /// Inline style property, `None` when not set inline.
    async fn inline_style(&self, node: NodeRef, property: &str)
        -> Result<Option<String>, PortError>;
    /// Sets an inline style property; `None` removes it.
    async fn set_inline_style(
        &self,
        node: NodeRef,
        property: &str,
        value: Option<&str>,
    ) -> Result<(), PortError>;

    /// Appends a new `<tag class=..>text</tag>` under `parent`.
    async fn append_element(
        &self,
        parent: NodeRef,
        tag: &str,
        class: &str,
        text: &str,
    ) -> Result<NodeRef, PortError>;
    async fn remove_node(&self, node: NodeRef) -> Result<(), PortError>;
}
