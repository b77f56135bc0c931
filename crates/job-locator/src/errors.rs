//! Error types for locator system

use jobfilter_core_types::FilterError;
use page_port::PortError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocatorError {
    /// No container strategy produced a match
    #[error("container not found (tried: {})", .tried.join(", "))]
    ContainerNotFound { tried: Vec<&'static str> },

    /// Profile cannot drive any strategy
    #[error("invalid locator profile: {0}")]
    InvalidProfile(String),

    /// Page access failed
    #[error(transparent)]
    Port(#[from] PortError),
}

impl LocatorError {
    /// Element vanished mid-resolution; retrying on fresh state may succeed.
    pub fn is_detached(&self) -> bool {
        matches!(self, LocatorError::Port(err) if err.is_detached())
    }
}

impl From<LocatorError> for FilterError {
    fn from(err: LocatorError) -> Self {
        match err {
            LocatorError::ContainerNotFound { .. } => FilterError::ContainerNotFound,
            other => FilterError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_miss_maps_to_stable_reason() {
        let err: FilterError = LocatorError::ContainerNotFound {
            tried: vec!["header-sibling"],
        }
        .into();
        assert_eq!(err.reason(), "container-not-found");

        let err: FilterError = LocatorError::InvalidProfile("empty".into()).into();
        assert_eq!(err.reason(), "internal-error");
    }
}
