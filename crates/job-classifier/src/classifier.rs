//! Keep/hide classification of listing items
//!
//! Read-only against the page: repeated calls on an unchanged item give the
//! same answer and leave no trace.

use job_locator::{LocatorError, LocatorProfile, TextProbe};
use jobfilter_core_types::{Decision, NodeRef, Ruleset};
use page_port::PagePort;
use tracing::trace;

/// Why an item was hidden.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HideReason {
    Promoted,
    BlockedCompany { company: String, matched: String },
}

/// Decision plus the rule that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub decision: Decision,
    pub reason: Option<HideReason>,
}

impl Verdict {
    fn keep() -> Self {
        Self {
            decision: Decision::Keep,
            reason: None,
        }
    }

    fn hide(reason: HideReason) -> Self {
        Self {
            decision: Decision::Hide,
            reason: Some(reason),
        }
    }
}

/// Classifies items against a ruleset using ordered text probes.
#[derive(Clone, Debug)]
pub struct ClassificationEngine {
    promoted_probes: Vec<TextProbe>,
    promoted_marker: String,
    company_probes: Vec<TextProbe>,
}

impl ClassificationEngine {
    pub fn new(
        promoted_probes: Vec<TextProbe>,
        promoted_marker: impl Into<String>,
        company_probes: Vec<TextProbe>,
    ) -> Self {
        Self {
            promoted_probes,
            promoted_marker: promoted_marker.into().trim().to_string(),
            company_probes,
        }
    }

    pub fn from_profile(profile: &LocatorProfile) -> Self {
        let probes = |selectors: &[String]| {
            selectors
                .iter()
                .filter(|s| !s.trim().is_empty())
                .map(|s| TextProbe::new(s.clone()))
                .collect::<Vec<_>>()
        };
        Self::new(
            probes(&profile.promoted_label_selectors),
            profile.promoted_marker.clone(),
            probes(&profile.company_selectors),
        )
    }

    /// True when any label equals the promoted marker exactly after trimming.
    /// A label that merely contains the marker does not count.
    pub async fn is_promoted(&self, page: &dyn PagePort, item: NodeRef) -> Result<bool, LocatorError> {
        for probe in &self.promoted_probes {
            for text in probe.texts(page, item).await? {
                if text == self.promoted_marker {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// First non-empty company name, normalized.
    pub async fn company_name(
        &self,
        page: &dyn PagePort,
        item: NodeRef,
    ) -> Result<Option<String>, LocatorError> {
        for probe in &self.company_probes {
            if let Some(text) = probe.first_text(page, item).await? {
                let company = Ruleset::normalize_company(&text);
                if !company.is_empty() {
                    return Ok(Some(company));
                }
            }
        }
        Ok(None)
    }

    /// Returns `(company, matched_blocked_name)` when the item's company text
    /// contains any blocked name. Substring semantics: blocking "acme" also
    /// blocks "acmeson".
    pub async fn blocked_company(
        &self,
        page: &dyn PagePort,
        item: NodeRef,
        blocked: &[String],
    ) -> Result<Option<(String, String)>, LocatorError> {
        if blocked.is_empty() {
            return Ok(None);
        }
        for probe in &self.company_probes {
            let Some(text) = probe.first_text(page, item).await? else {
                continue;
            };
            let company = Ruleset::normalize_company(&text);
            if company.is_empty() {
                continue;
            }
            if let Some(hit) = blocked.iter().find(|name| company.contains(name.as_str())) {
                return Ok(Some((company, hit.clone())));
            }
        }
        Ok(None)
    }

    pub async fn explain(
        &self,
        page: &dyn PagePort,
        item: NodeRef,
        ruleset: &Ruleset,
    ) -> Result<Verdict, LocatorError> {
        if ruleset.promoted_filter_enabled && self.is_promoted(page, item).await? {
            trace!(target: "jobfilter.classify", %item, "promoted");
            return Ok(Verdict::hide(HideReason::Promoted));
        }
        let blocked = ruleset.normalized_blocked_names();
        if let Some((company, matched)) = self.blocked_company(page, item, &blocked).await? {
            trace!(target: "jobfilter.classify", %item, %company, %matched, "blocked company");
            return Ok(Verdict::hide(HideReason::BlockedCompany { company, matched }));
        }
        Ok(Verdict::keep())
    }

    pub async fn classify(
        &self,
        page: &dyn PagePort,
        item: NodeRef,
        ruleset: &Ruleset,
    ) -> Result<Decision, LocatorError> {
        Ok(self.explain(page, item, ruleset).await?.decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobfilter_core_types::VisibilityMode;
    use page_port::{ElementSpec, MemoryPage};
    use std::sync::Arc;

    fn card(page: &MemoryPage, company: &str, footer: &str) -> NodeRef {
        let li = page
            .append(page.body(), ElementSpec::new("li").attr("data-occludable-job-id", "1"))
            .unwrap();
        let subtitle = page
            .append(li, ElementSpec::new("div").class("artdeco-entity-lockup__subtitle"))
            .unwrap();
        page.append(subtitle, ElementSpec::new("span").text(company)).unwrap();
        let footer_list = page
            .append(li, ElementSpec::new("ul").class("job-card-list__footer-wrapper"))
            .unwrap();
        let footer_item = page.append(footer_list, ElementSpec::new("li")).unwrap();
        page.append(footer_item, ElementSpec::new("span").attr("dir", "ltr").text(footer))
            .unwrap();
        li
    }

    fn engine() -> ClassificationEngine {
        ClassificationEngine::from_profile(&LocatorProfile::default())
    }

    fn rules(promoted: bool, blocked: &[&str]) -> Ruleset {
        Ruleset {
            promoted_filter_enabled: promoted,
            blocked_company_names: blocked.iter().map(|s| s.to_string()).collect(),
            visibility_mode: VisibilityMode::Remove,
        }
    }

    fn page() -> Arc<MemoryPage> {
        MemoryPage::new("https://example.test/jobs/search")
    }

    #[tokio::test]
    async fn promoted_label_must_match_exactly() {
        let page = page();
        let promoted = card(&page, "Initech", "  Promoted ");
        let recruiter = card(&page, "Initech", "Promoted by recruiter");
        let engine = engine();
        let rules = rules(true, &[]);

        assert_eq!(engine.classify(&*page, promoted, &rules).await.unwrap(), Decision::Hide);
        assert_eq!(engine.classify(&*page, recruiter, &rules).await.unwrap(), Decision::Keep);
    }

    #[tokio::test]
    async fn promoted_label_is_case_sensitive() {
        let page = page();
        let item = card(&page, "Initech", "promoted");
        assert!(!engine().is_promoted(&*page, item).await.unwrap());
    }

    #[tokio::test]
    async fn promoted_filter_can_be_disabled() {
        let page = page();
        let item = card(&page, "Initech", "Promoted");
        let decision = engine().classify(&*page, item, &rules(false, &[])).await.unwrap();
        assert_eq!(decision, Decision::Keep);
    }

    #[tokio::test]
    async fn blocked_company_is_case_insensitive_substring() {
        let page = page();
        let acme = card(&page, "ACME Corp", "Easy Apply");
        let acmeson = card(&page, "Acmeson Inc", "Easy Apply");
        let globex = card(&page, "Globex", "Easy Apply");
        let engine = engine();
        let rules = rules(true, &["acme"]);

        assert_eq!(engine.classify(&*page, acme, &rules).await.unwrap(), Decision::Hide);
        assert_eq!(engine.classify(&*page, acmeson, &rules).await.unwrap(), Decision::Hide);
        assert_eq!(engine.classify(&*page, globex, &rules).await.unwrap(), Decision::Keep);

        let verdict = engine.explain(&*page, acme, &rules).await.unwrap();
        assert_eq!(
            verdict.reason,
            Some(HideReason::BlockedCompany {
                company: "acme corp".into(),
                matched: "acme".into()
            })
        );
    }

    #[tokio::test]
    async fn blank_blocked_names_match_nothing() {
        let page = page();
        let item = card(&page, "Globex", "Easy Apply");
        let decision = engine().classify(&*page, item, &rules(true, &["  "])).await.unwrap();
        assert_eq!(decision, Decision::Keep);
    }

    #[tokio::test]
    async fn classification_is_repeatable_and_read_only() {
        let page = page();
        let item = card(&page, "ACME Corp", "Promoted");
        let before = page.attributes(item).unwrap();
        let engine = engine();
        let rules = rules(true, &["acme"]);
        for _ in 0..3 {
            assert_eq!(engine.classify(&*page, item, &rules).await.unwrap(), Decision::Hide);
        }
        assert_eq!(page.attributes(item).unwrap(), before);
        assert!(page.inline_styles(item).unwrap().is_empty());
    }

    #[tokio::test]
    async fn company_name_skips_empty_probes() {
        let page = page();
        let item = card(&page, "   ", "Easy Apply");
        page.append(
            item,
            ElementSpec::new("div")
                .class("job-card-container__primary-description")
                .text(" Umbrella "),
        )
        .unwrap();
        assert_eq!(
            engine().company_name(&*page, item).await.unwrap(),
            Some("umbrella".to_string())
        );
    }
}
