//! Hidden-count display and scan indicator

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use jobfilter_core_types::NodeRef;
use page_port::PagePort;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

/// Class of the counter element rendered into the page.
pub const COUNTER_CLASS: &str = "linkedin-filter-counter";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorState {
    #[default]
    Normal,
    Scanning,
    Complete,
    Error,
}

impl fmt::Display for IndicatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IndicatorState::Normal => "normal",
            IndicatorState::Scanning => "scanning",
            IndicatorState::Complete => "complete",
            IndicatorState::Error => "error",
        };
        f.write_str(label)
    }
}

/// Where the hidden count and scan status are shown.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn render_counter(&self, hidden: usize);
    async fn set_indicator(&self, state: IndicatorState, label: Option<String>);
}

#[derive(Clone, Copy, Debug)]
struct RenderedCounter {
    hidden: usize,
    node: Option<NodeRef>,
}

/// Renders `"{n} jobs hidden"` under the results header.
///
/// Rendering is skipped while the shown value is current, so the counter
/// node's own insertion does not keep re-triggering mutation rescans.
pub struct PageCounterSink {
    page: Arc<dyn PagePort>,
    anchor: String,
    rendered: Mutex<Option<RenderedCounter>>,
    indicator: Mutex<(IndicatorState, Option<String>)>,
}

impl PageCounterSink {
    pub fn new(page: Arc<dyn PagePort>, anchor: impl Into<String>) -> Self {
        Self {
            page,
            anchor: anchor.into(),
            rendered: Mutex::new(None),
            indicator: Mutex::new((IndicatorState::Normal, None)),
        }
    }

    pub fn indicator(&self) -> (IndicatorState, Option<String>) {
        self.indicator.lock().clone()
    }

    async fn is_current(&self, hidden: usize) -> bool {
        let previous = *self.rendered.lock();
        match previous {
            Some(RenderedCounter { hidden: shown, node }) if shown == hidden => match node {
                None => true,
                Some(node) => self.page.tag_name(node).await.is_ok(),
            },
            _ => false,
        }
    }
}

#[async_trait]
impl StatusSink for PageCounterSink {
    async fn render_counter(&self, hidden: usize) {
        if self.is_current(hidden).await {
            return;
        }

        let selector = format!(".{COUNTER_CLASS}");
        if let Ok(stale) = self.page.query_all(None, &selector).await {
            for node in stale {
                let _ = self.page.remove_node(node).await;
            }
        }

        if hidden == 0 {
            *self.rendered.lock() = Some(RenderedCounter { hidden, node: None });
            return;
        }

        let anchor = match self.page.query_first(None, &self.anchor).await {
            Ok(Some(anchor)) => anchor,
            Ok(None) | Err(_) => {
                trace!(target: "jobfilter.status", anchor = %self.anchor, "counter anchor absent");
                *self.rendered.lock() = None;
                return;
            }
        };
        let text = format!("{hidden} jobs hidden");
        match self
            .page
            .append_element(anchor, "div", COUNTER_CLASS, &text)
            .await
        {
            Ok(node) => {
                *self.rendered.lock() = Some(RenderedCounter {
                    hidden,
                    node: Some(node),
                });
            }
            Err(err) => {
                debug!(target: "jobfilter.status", %err, "counter render failed");
                *self.rendered.lock() = None;
            }
        }
    }

    async fn set_indicator(&self, state: IndicatorState, label: Option<String>) {
        debug!(
            target: "jobfilter.status",
            %state,
            label = label.as_deref().unwrap_or(""),
            "indicator"
        );
        *self.indicator.lock() = (state, label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_port::{DomChangeSource, ElementSpec, MemoryPage};

    const ANCHOR: &str = ".jobs-search-results-list__header";

    fn page_with_anchor() -> (Arc<MemoryPage>, NodeRef) {
        let page = MemoryPage::new("https://example.test/jobs/");
        let anchor = page
            .append(
                page.body(),
                ElementSpec::new("div").class("jobs-search-results-list__header"),
            )
            .unwrap();
        (page, anchor)
    }

    async fn counter_texts(page: &MemoryPage) -> Vec<String> {
        let mut texts = Vec::new();
        for node in page.query_all(None, ".linkedin-filter-counter").await.unwrap() {
            texts.push(page.text_content(node).await.unwrap());
        }
        texts
    }

    #[tokio::test]
    async fn renders_only_when_something_is_hidden() {
        let (page, anchor) = page_with_anchor();
        let sink = PageCounterSink::new(page.clone(), ANCHOR);

        sink.render_counter(3).await;
        assert_eq!(counter_texts(&page).await, vec!["3 jobs hidden"]);
        assert_eq!(page.child_count(anchor).unwrap(), 1);

        sink.render_counter(5).await;
        assert_eq!(counter_texts(&page).await, vec!["5 jobs hidden"]);

        sink.render_counter(0).await;
        assert!(counter_texts(&page).await.is_empty());
    }

    #[tokio::test]
    async fn unchanged_value_does_not_touch_the_page() {
        let (page, _) = page_with_anchor();
        let sink = PageCounterSink::new(page.clone(), ANCHOR);
        sink.render_counter(2).await;

        let mut events = page.subscribe();
        sink.render_counter(2).await;
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn rerenders_when_host_dropped_the_node() {
        let (page, anchor) = page_with_anchor();
        let sink = PageCounterSink::new(page.clone(), ANCHOR);
        sink.render_counter(2).await;
        page.clear_children(anchor).unwrap();

        sink.render_counter(2).await;
        assert_eq!(counter_texts(&page).await, vec!["2 jobs hidden"]);
    }

    #[tokio::test]
    async fn missing_anchor_is_silent() {
        let page = MemoryPage::new("https://example.test/jobs/");
        let sink = PageCounterSink::new(page.clone(), ANCHOR);
        sink.render_counter(4).await;
        assert!(counter_texts(&page).await.is_empty());
    }

    #[tokio::test]
    async fn indicator_keeps_last_state() {
        let page = MemoryPage::new("https://example.test/jobs/");
        let sink = PageCounterSink::new(page, ANCHOR);
        assert_eq!(sink.indicator(), (IndicatorState::Normal, None));
        sink.set_indicator(IndicatorState::Scanning, Some("12 jobs".into()))
            .await;
        assert_eq!(
            sink.indicator(),
            (IndicatorState::Scanning, Some("12 jobs".to_string()))
        );
    }
}
