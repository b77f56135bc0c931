use jobfilter_core_types::NodeRef;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Change notifications raised by a live page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageEvent {
    /// Child-list change somewhere under the body.
    Mutation { target: Option<NodeRef> },
    /// A click landed on `target`.
    Click { target: NodeRef },
    /// The document URL changed without a reload.
    Navigated { url: String },
}

/// Subscription seam for page changes. Tests drive it with synthetic events.
pub trait DomChangeSource: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<PageEvent>;
}
