use jobfilter_core_types::{FilterError, NodeRef};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("node detached: {0}")]
    NodeDetached(NodeRef),
    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },
    #[error("internal error: {0}")]
    Internal(String),
}

impl PortError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn invalid_selector(selector: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }

    /// The element went away underneath us; callers usually skip it.
    pub fn is_detached(&self) -> bool {
        matches!(self, PortError::NodeDetached(_))
    }
}

impl From<PortError> for FilterError {
    fn from(err: PortError) -> Self {
        FilterError::Internal(err.to_string())
    }
}
