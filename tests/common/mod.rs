#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use jobfilter::{
    ControllerDeps, FilterConfig, FilterController, MemorySettingsStore, OutboundMessage,
    PageCounterSink, SettingsStore,
};
use jobfilter_event_bus::InMemoryBus;
use page_port::{ElementSpec, MemoryPage, NodeRef, PagePort};
use parking_lot::Mutex;

pub const SEARCH_URL: &str = "https://www.example.test/jobs/search/?keywords=rust";
const ROW_HEIGHT: f64 = 100.0;
const VIEWPORT: f64 = 400.0;

#[derive(Clone, Copy, Debug)]
pub struct Listing {
    pub company: &'static str,
    pub footer: &'static str,
}

pub const fn listing(company: &'static str, footer: &'static str) -> Listing {
    Listing { company, footer }
}

/// A search results page: list wrapper with header and scrollable list,
/// plus the pagination bar.
pub struct Board {
    pub page: Arc<MemoryPage>,
    pub header: NodeRef,
    pub container: NodeRef,
    pub next_button: NodeRef,
    pub page_two: NodeRef,
    pub unrelated: NodeRef,
}

impl Board {
    pub fn new(url: &str) -> Self {
        let page = MemoryPage::new(url);
        let wrapper = page
            .append(page.body(), ElementSpec::new("div").class("scaffold-layout__list"))
            .unwrap();
        let header = page
            .append(
                wrapper,
                ElementSpec::new("header").class("jobs-search-results-list__header"),
            )
            .unwrap();
        let container = page
            .append(wrapper, ElementSpec::new("ul").class("scaffold-layout__list-container"))
            .unwrap();
        let pagination = page
            .append(page.body(), ElementSpec::new("div").class("jobs-search-pagination"))
            .unwrap();
        let numbers = page.append(pagination, ElementSpec::new("ul")).unwrap();
        let number = page
            .append(
                numbers,
                ElementSpec::new("button").class("jobs-search-pagination__indicator-button"),
            )
            .unwrap();
        let page_two = page.append(number, ElementSpec::new("span").text("2")).unwrap();
        let next_button = page
            .append(
                pagination,
                ElementSpec::new("button")
                    .class("jobs-search-pagination__button")
                    .class("jobs-search-pagination__button--next"),
            )
            .unwrap();
        let unrelated = page
            .append(page.body(), ElementSpec::new("button").class("global-nav__me"))
            .unwrap();
        Self {
            page,
            header,
            container,
            next_button,
            page_two,
            unrelated,
        }
    }

    pub fn with_listings(url: &str, listings: &[Listing]) -> Self {
        let board = Self::new(url);
        for item in listings {
            board.push(item);
        }
        board
    }

    pub fn push(&self, item: &Listing) -> NodeRef {
        append_listing(&self.page, self.container, item)
    }

    /// Renders `pending` in batches as the list is scrolled near its bottom.
    pub fn load_lazily(&self, pending: Vec<Listing>, batch: usize) {
        let queue = Arc::new(Mutex::new(VecDeque::from(pending)));
        self.page.on_scroll(self.container, move |page, node, top| {
            let rendered = page.child_count(node).unwrap_or(0) as f64 * ROW_HEIGHT;
            if top + VIEWPORT < rendered - ROW_HEIGHT {
                return;
            }
            let mut queue = queue.lock();
            for _ in 0..batch {
                let Some(item) = queue.pop_front() else {
                    break;
                };
                append_listing(page, node, &item);
            }
        });
    }

    /// Renders one more listing on every scroll write, forever.
    pub fn load_endlessly(&self) {
        self.page.on_scroll(self.container, |page, node, _| {
            append_listing(page, node, &listing("Globex", "Easy Apply"));
        });
    }

    /// Host-side pagination: the list content is swapped for `listings`.
    pub fn replace_listings(&self, listings: &[Listing]) {
        self.page.clear_children(self.container).unwrap();
        for item in listings {
            self.push(item);
        }
    }

    pub async fn items(&self) -> Vec<NodeRef> {
        self.page.children(self.container).await.unwrap()
    }

    pub async fn counter_text(&self) -> Option<String> {
        let node = self
            .page
            .query_first(None, ".linkedin-filter-counter")
            .await
            .unwrap()?;
        Some(self.page.text_content(node).await.unwrap())
    }
}

pub fn append_listing(page: &MemoryPage, container: NodeRef, item: &Listing) -> NodeRef {
    let id = page.child_count(container).unwrap() + 1;
    let li = page
        .append(
            container,
            ElementSpec::new("li")
                .class("scaffold-layout__list-item")
                .attr("data-occludable-job-id", &id.to_string()),
        )
        .unwrap();
    let card = page
        .append(li, ElementSpec::new("div").class("job-card-container"))
        .unwrap();
    let subtitle = page
        .append(card, ElementSpec::new("div").class("artdeco-entity-lockup__subtitle"))
        .unwrap();
    page.append(subtitle, ElementSpec::new("span").text(item.company))
        .unwrap();
    let footer = page
        .append(card, ElementSpec::new("ul").class("job-card-list__footer-wrapper"))
        .unwrap();
    let footer_item = page
        .append(footer, ElementSpec::new("li").class("job-card-container__footer-item"))
        .unwrap();
    page.append(
        footer_item,
        ElementSpec::new("span").attr("dir", "ltr").text(item.footer),
    )
    .unwrap();

    let rows = page.child_count(container).unwrap() as f64;
    page.set_scroll_extent(container, rows * ROW_HEIGHT, VIEWPORT)
        .unwrap();
    li
}

/// Controller plus the collaborators tests want to inspect.
pub struct Harness {
    pub controller: Arc<FilterController>,
    pub status: Arc<PageCounterSink>,
    pub outbound: Arc<InMemoryBus<OutboundMessage>>,
}

pub fn harness(board: &Board) -> Harness {
    harness_with_store(board, Arc::new(MemorySettingsStore::new()))
}

pub fn harness_with_store(board: &Board, settings: Arc<dyn SettingsStore>) -> Harness {
    let config = FilterConfig::default();
    let status = Arc::new(PageCounterSink::new(
        board.page.clone(),
        config.locator.counter_anchor.clone(),
    ));
    let outbound = InMemoryBus::<OutboundMessage>::new(256);
    let deps = ControllerDeps {
        page: board.page.clone(),
        changes: board.page.clone(),
        settings,
        status: status.clone(),
        outbound: outbound.clone(),
    };
    Harness {
        controller: FilterController::new(config, deps),
        status,
        outbound,
    }
}

pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

pub const THIRTY: [Listing; 30] = [
    listing("Acme Corp", "Easy Apply"),
    listing("Globex", "Promoted"),
    listing("Initech", "Viewed"),
    listing("Umbrella", "Easy Apply"),
    listing("Acmeson Inc", "Actively recruiting"),
    listing("Hooli", "Promoted by recruiter"),
    listing("Stark Industries", "Promoted"),
    listing("Wayne Enterprises", "Easy Apply"),
    listing("Soylent", "Viewed"),
    listing("ACME Labs", "Promoted"),
    listing("Vandelay", "Easy Apply"),
    listing("Cyberdyne", "Viewed"),
    listing("Tyrell", "Promoted"),
    listing("Oscorp", "Easy Apply"),
    listing("Wonka", "Viewed"),
    listing("Gringotts", "Easy Apply"),
    listing("Monsters Inc", "Promoted"),
    listing("Dunder Mifflin", "Viewed"),
    listing("Pied Piper", "Easy Apply"),
    listing("Aperture", "Viewed"),
    listing("Black Mesa", "Easy Apply"),
    listing("Massive Dynamic", "Promoted"),
    listing("Nakatomi", "Viewed"),
    listing("Prestige Worldwide", "Easy Apply"),
    listing("Sterling Cooper", "Viewed"),
    listing("Krusty Krab", "Easy Apply"),
    listing("Los Pollos", "Promoted"),
    listing("Bluth Company", "Viewed"),
    listing("Rekall", "Easy Apply"),
    listing("Weyland", "Viewed"),
];

/// Promoted entries of [`THIRTY`] (exact footer "Promoted").
pub const THIRTY_PROMOTED: usize = 7;
/// Entries of [`THIRTY`] whose company contains "acme".
pub const THIRTY_ACME: usize = 3;
/// Entries that are both promoted and acme.
pub const THIRTY_PROMOTED_ACME: usize = 1;
/// Hidden by the promoted filter plus an "acme" block.
pub const THIRTY_HIDDEN_WITH_ACME: usize = THIRTY_PROMOTED + THIRTY_ACME - THIRTY_PROMOTED_ACME;
