mod common;

use common::*;
use jobfilter::{FilterEvent, IndicatorState, Request, ScanOutcome, ScanTrigger};
use tokio::sync::broadcast::{self, error::TryRecvError};

fn drain(rx: &mut broadcast::Receiver<FilterEvent>) -> Vec<FilterEvent> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => out.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => return out,
        }
    }
}

fn page_changes(events: &[FilterEvent]) -> Vec<&'static str> {
    events
        .iter()
        .filter_map(|event| match event {
            FilterEvent::PageChangeHandled { source } => Some(*source),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn pagination_burst_rescans_the_new_page_once() {
    let board = Board::with_listings(SEARCH_URL, &THIRTY[..10]);
    let h = harness(&board);
    h.controller.start().await;
    advance(30_000).await;
    assert_eq!(board.counter_text().await.as_deref(), Some("3 jobs hidden"));

    let mut events = h.controller.subscribe();
    board.replace_listings(&THIRTY[10..20]);
    for _ in 0..3 {
        board.page.click(board.next_button);
        advance(200).await;
    }
    assert!(page_changes(&drain(&mut events)).is_empty());

    advance(700).await;
    let seen = drain(&mut events);
    assert_eq!(page_changes(&seen), vec!["next-button"]);
    assert_eq!(
        h.status.indicator(),
        (IndicatorState::Scanning, Some("Page changed".to_string()))
    );
    assert_eq!(board.counter_text().await, None);

    advance(15_000).await;
    let seen = drain(&mut events);
    let finished: Vec<_> = seen
        .iter()
        .filter_map(|event| match event {
            FilterEvent::ScanFinished { trigger, outcome } => Some((*trigger, outcome.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(finished.len(), 1);
    let (ScanTrigger::PageChange, ScanOutcome::Completed(report)) = &finished[0] else {
        panic!("unexpected scan result: {finished:?}");
    };
    assert_eq!(report.total_items, 10);
    assert_eq!(report.hidden_items, 2);
    assert_eq!(board.counter_text().await.as_deref(), Some("2 jobs hidden"));
    assert!(page_changes(&seen).is_empty());

    h.controller.stop().await;
}

#[tokio::test(start_paused = true)]
async fn clicks_inside_page_number_resolve_to_the_control() {
    let board = Board::with_listings(SEARCH_URL, &THIRTY[..6]);
    let h = harness(&board);
    h.controller.start().await;
    advance(30_000).await;

    let mut events = h.controller.subscribe();
    board.page.click(board.page_two);
    board.page.click(board.unrelated);
    advance(1_000).await;
    assert_eq!(page_changes(&drain(&mut events)), vec!["page-number"]);

    h.controller.stop().await;
}

#[tokio::test(start_paused = true)]
async fn page_change_outside_job_pages_is_ignored() {
    let board = Board::with_listings(SEARCH_URL, &THIRTY[..10]);
    let h = harness(&board);
    h.controller.start().await;
    advance(30_000).await;
    let hidden = h.controller.hidden_count();

    board.page.set_url("https://www.example.test/feed/");
    let mut events = h.controller.subscribe();
    board.page.click(board.next_button);
    advance(10_000).await;

    let seen = drain(&mut events);
    assert!(page_changes(&seen).is_empty());
    assert!(!seen
        .iter()
        .any(|event| matches!(event, FilterEvent::ScanStarted { .. })));
    assert_eq!(h.controller.hidden_count(), hidden);
    assert_eq!(h.status.indicator().0, IndicatorState::Normal);

    h.controller.stop().await;
}

#[tokio::test(start_paused = true)]
async fn page_change_during_scan_is_skipped() {
    let board = Board::with_listings(SEARCH_URL, &THIRTY[..5]);
    board.load_lazily(THIRTY[5..].to_vec(), 1);
    let h = harness(&board);
    h.controller.start().await;

    advance(3_100).await;
    assert!(h.controller.is_scanning());

    let mut events = h.controller.subscribe();
    board.page.click(board.next_button);
    advance(900).await;
    assert!(h.controller.is_scanning());

    let seen = drain(&mut events);
    assert!(page_changes(&seen).is_empty());
    assert!(seen.contains(&FilterEvent::ScanSkipped {
        trigger: ScanTrigger::PageChange
    }));

    h.controller.stop().await;
}

#[tokio::test(start_paused = true)]
async fn manual_request_during_automatic_scan_is_rejected() {
    let board = Board::with_listings(SEARCH_URL, &THIRTY[..5]);
    board.load_lazily(THIRTY[5..].to_vec(), 1);
    let h = harness(&board);
    h.controller.start().await;
    advance(3_100).await;
    assert!(h.controller.is_scanning());

    let response = h.controller.handle_message(Request::ScanAllJobs).await;
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        serde_json::json!({"success": false, "reason": "scan-in-progress"})
    );

    advance(120_000).await;
    assert!(!h.controller.is_scanning());
    assert_eq!(board.items().await.len(), 30);

    h.controller.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stopped_controller_ignores_the_page() {
    let board = Board::with_listings(SEARCH_URL, &THIRTY[..10]);
    let h = harness(&board);
    let mut events = h.controller.subscribe();
    h.controller.start().await;
    h.controller.stop().await;

    board.push(&listing("Globex", "Promoted"));
    board.page.click(board.next_button);
    advance(30_000).await;

    assert!(drain(&mut events).is_empty());
    assert_eq!(h.controller.hidden_count(), 0);
    assert_eq!(board.counter_text().await, None);
}
