//! Core types for locator system

use jobfilter_core_types::NodeRef;
use serde::{Deserialize, Serialize};

use crate::errors::LocatorError;

/// Selector profile for one host page layout.
///
/// Selector strings are the part most likely to break when the host
/// redesigns; they are data, not code, and are loaded from configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorProfile {
    /// Wrapper holding a header and the scrollable list.
    pub list_wrapper: String,
    /// Header-like child inside the wrapper.
    pub header: String,
    /// Last-resort container selectors, tried in order.
    pub container_fallbacks: Vec<String>,
    /// Item selectors, tried in order; results are never merged.
    pub item_selectors: Vec<String>,
    /// Where a promoted label may sit inside an item.
    pub promoted_label_selectors: Vec<String>,
    /// Exact (trimmed, case-sensitive) label text marking a promoted item.
    pub promoted_marker: String,
    /// Where the company name may sit inside an item.
    pub company_selectors: Vec<String>,
    /// Pagination controls; the last entry is the catch-all region.
    pub pagination_selectors: Vec<String>,
    /// Element the hidden counter is rendered into.
    pub counter_anchor: String,
}

impl Default for LocatorProfile {
    fn default() -> Self {
        Self {
            list_wrapper: ".scaffold-layout__list".into(),
            header: "header".into(),
            container_fallbacks: vec![
                ".jobs-search-results-list".into(),
                "ul.GjoAkyOazLcNFWlLoIqzErpRGHIYJlShlaJI".into(),
                r#"[class*="jobs-search-results"]"#.into(),
            ],
            item_selectors: vec![
                "li.scaffold-layout__list-item[data-occludable-job-id]".into(),
                "li[data-occludable-job-id]".into(),
            ],
            promoted_label_selectors: vec![
                r#"ul.job-card-list__footer-wrapper span[dir="ltr"]"#.into(),
                ".job-card-container__footer-item span".into(),
                "li.job-card-container__footer-item span".into(),
            ],
            promoted_marker: "Promoted".into(),
            company_selectors: vec![
                ".artdeco-entity-lockup__subtitle span".into(),
                ".job-card-container__primary-description".into(),
                ".artdeco-entity-lockup__subtitle".into(),
            ],
            pagination_selectors: vec![
                ".jobs-search-pagination__indicator-button".into(),
                ".jobs-search-pagination__button--next".into(),
                ".jobs-search-pagination__button--previous".into(),
                ".jobs-search-pagination".into(),
            ],
            counter_anchor: ".jobs-search-results-list__header".into(),
        }
    }
}

impl LocatorProfile {
    /// Rejects profiles that could never find anything.
    pub fn validate(&self) -> Result<(), LocatorError> {
        if self.item_selectors.iter().all(|s| s.trim().is_empty()) {
            return Err(LocatorError::InvalidProfile(
                "at least one item selector is required".into(),
            ));
        }
        if self.promoted_marker.trim().is_empty() {
            return Err(LocatorError::InvalidProfile(
                "promoted marker must not be blank".into(),
            ));
        }
        Ok(())
    }
}

/// Resolved container and the strategy that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContainerMatch {
    pub node: NodeRef,
    pub strategy: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_is_valid() {
        LocatorProfile::default().validate().unwrap();
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let profile: LocatorProfile =
            serde_yaml::from_str("promoted_marker: Sponsored\nitem_selectors: [\"li.card\"]\n")
                .unwrap();
        assert_eq!(profile.promoted_marker, "Sponsored");
        assert_eq!(profile.item_selectors, vec!["li.card"]);
        assert_eq!(profile.header, "header");
    }

    #[test]
    fn blank_item_selectors_are_rejected() {
        let profile = LocatorProfile {
            item_selectors: vec!["  ".into()],
            ..LocatorProfile::default()
        };
        assert!(matches!(
            profile.validate(),
            Err(LocatorError::InvalidProfile(_))
        ));
    }
}
