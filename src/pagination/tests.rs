//! Tests for pagination module

use super::*;
use crate::error::{Error, Result};
use crate::types::{pages_for, PageRequest, PageResult};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use test_case::test_case;

// ============================================================================
// Fixtures
// ============================================================================

/// In-memory paged repository that records every fetch
#[derive(Clone)]
struct Repo {
    items: Arc<Vec<u32>>,
    fetches: Arc<Mutex<Vec<u64>>>,
}

impl Repo {
    fn new(count: u32) -> Self {
        Self {
            items: Arc::new((0..count).collect()),
            fetches: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn fetch_page(&self, request: PageRequest) -> Result<PageResult<u32>> {
        self.fetches.lock().unwrap().push(request.index);
        let len = self.items.len() as u64;
        let from = request.offset().min(len) as usize;
        let to = request.offset().saturating_add(request.size).min(len) as usize;
        Ok(PageResult::new(self.items[from..to].to_vec())
            .with_total_pages(pages_for(len, request.size))
            .with_is_last(to as u64 >= len))
    }

    fn fetcher(&self) -> impl Fn(PageRequest) -> Result<PageResult<u32>> + Send + Sync + 'static {
        let repo = self.clone();
        move |request| repo.fetch_page(request)
    }

    fn fetches_of(&self, page: u64) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|p| **p == page)
            .count()
    }

    fn total_fetches(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }

    fn source(&self) -> Vec<u32> {
        self.items.to_vec()
    }
}

type Cursor = PageCursor<PageResult<u32>, u32>;
type Child = ChildRange<PageResult<u32>, u32>;

fn cursor(repo: &Repo, page_size: u64, bound: BoundPolicy<PageResult<u32>>) -> Cursor {
    PageCursor::for_results(page_size, repo.fetcher(), bound)
        .build()
        .unwrap()
}

fn bound_of(kind: &str, count: u64, page_size: u64) -> BoundPolicy<PageResult<u32>> {
    match kind {
        "items" => BoundPolicy::ExactItemCount(count),
        "pages" => BoundPolicy::ExactPageCount(pages_for(count, page_size)),
        "lazy" => BoundPolicy::lazy_item_count(move || Ok(count)),
        "discover" => BoundPolicy::discover_from_results(),
        other => panic!("unknown bound kind {other}"),
    }
}

fn drain(cursor: &Cursor) -> Vec<u32> {
    let mut out = Vec::new();
    while cursor.advance_one(&mut |item| out.push(item)).unwrap() {}
    out
}

fn drain_child(child: &Child) -> Vec<u32> {
    let mut out = Vec::new();
    assert!(!child.advance_one(&mut |item| out.push(item)).unwrap());
    out
}

fn split_all<P, T>(cursor: &PageCursor<P, T>) -> Vec<ChildRange<P, T>> {
    let mut children = Vec::new();
    while let Some(child) = cursor.split().unwrap() {
        children.push(child);
    }
    children
}

// ============================================================================
// Split Tests
// ============================================================================

#[test]
fn test_split_returns_child_with_current_page_and_moves_on() {
    let repo = Repo::new(100);
    let cursor = PageCursor::for_results(10, repo.fetcher(), BoundPolicy::ExactItemCount(100))
        .start_page(3)
        .build()
        .unwrap();

    let child = cursor.split().unwrap().expect("child");

    assert_eq!(child.page_index(), 3);
    assert_eq!(child.page_size(), 10);
    assert_eq!(cursor.page_index(), 4);
    assert_eq!(repo.total_fetches(), 0);
}

#[test_case(0, 100, 0 ; "empty bound")]
#[test_case(50, 100, 0 ; "bound below page size")]
#[test_case(100, 100, 0 ; "bound equals page size")]
#[test_case(250, 100, 2 ; "partial last page")]
#[test_case(1000, 100, 9 ; "exact multiple")]
#[test_case(1001, 100, 10 ; "one item over")]
fn test_split_termination(bound: u64, page_size: u64, expected_splits: usize) {
    let repo = Repo::new(bound as u32);
    let cursor = cursor(&repo, page_size, BoundPolicy::ExactItemCount(bound));

    let children = split_all(&cursor);

    assert_eq!(children.len(), expected_splits);
    assert_eq!(cursor.page_index(), expected_splits as u64);
    assert!(cursor.split().unwrap().is_none());
}

#[test]
fn test_each_split_claims_exactly_one_page() {
    let repo = Repo::new(1000);
    let cursor = cursor(&repo, 100, BoundPolicy::ExactItemCount(1000));

    for expected in 0..9 {
        let before = cursor.page_index();
        let child = cursor.split().unwrap().expect("child");
        assert_eq!(child.page_index(), expected);
        assert_eq!(cursor.page_index(), before + 1);

        let items = drain_child(&child);
        assert!(items.len() as u64 <= 100);
        assert_eq!(items, (expected as u32 * 100..(expected as u32 + 1) * 100).collect::<Vec<_>>());
    }
}

#[test]
fn test_children_never_split() {
    let repo = Repo::new(300);
    let cursor = cursor(&repo, 100, BoundPolicy::ExactItemCount(300));
    let child = cursor.split().unwrap().expect("child");

    assert!(child.split().is_none());
    assert_eq!(child.estimate_size(), 100);
}

#[test]
fn test_child_is_single_pass() {
    let repo = Repo::new(300);
    let cursor = cursor(&repo, 100, BoundPolicy::ExactItemCount(300));
    let child = cursor.split().unwrap().expect("child");

    assert_eq!(drain_child(&child).len(), 100);
    assert!(child.is_consumed());
    assert!(drain_child(&child).is_empty());
    assert_eq!(repo.fetches_of(0), 1);
}

// ============================================================================
// Sequential Traversal Tests
// ============================================================================

#[test_case(100, 1000 ; "count above page size")]
#[test_case(100, 100 ; "count equals page size")]
#[test_case(100, 99 ; "count one below page size")]
#[test_case(100, 10 ; "count below page size")]
#[test_case(100, 0 ; "empty source")]
#[test_case(7, 100 ; "odd page size")]
#[test_case(1, 5 ; "single item pages")]
fn test_sequential_traversal_yields_source_in_order(page_size: u64, count: u32) {
    for kind in ["items", "pages", "lazy", "discover"] {
        let repo = Repo::new(count);
        let cursor = cursor(&repo, page_size, bound_of(kind, u64::from(count), page_size));

        assert_eq!(drain(&cursor), repo.source(), "bound kind {kind}");
        assert!(cursor.is_finished());
    }
}

#[test]
fn test_exact_bound_stops_without_trailing_fetch() {
    let repo = Repo::new(1000);
    let cursor = cursor(&repo, 100, BoundPolicy::ExactItemCount(1000));

    assert_eq!(drain(&cursor).len(), 1000);
    assert_eq!(repo.total_fetches(), 10);
}

#[test]
fn test_finished_cursor_does_not_fetch_again() {
    let repo = Repo::new(10);
    let cursor = cursor(&repo, 100, BoundPolicy::ExactItemCount(10));

    assert_eq!(drain(&cursor).len(), 10);
    assert!(!cursor.advance_one(&mut |_| panic!("no items expected")).unwrap());
    assert!(cursor.split().unwrap().is_none());
    assert_eq!(repo.total_fetches(), 1);
}

#[test]
fn test_start_page_skips_earlier_pages() {
    let repo = Repo::new(50);
    let cursor = PageCursor::for_results(10, repo.fetcher(), BoundPolicy::ExactItemCount(50))
        .start_page(2)
        .build()
        .unwrap();

    assert_eq!(drain(&cursor), (20..50).collect::<Vec<_>>());
}

// ============================================================================
// Decomposition Tests
// ============================================================================

#[test_case(100, 1000 ; "count above page size")]
#[test_case(100, 100 ; "count equals page size")]
#[test_case(100, 99 ; "count one below page size")]
#[test_case(100, 10 ; "count below page size")]
#[test_case(100, 0 ; "empty source")]
#[test_case(7, 100 ; "odd page size")]
fn test_full_decomposition_covers_source_once(page_size: u64, count: u32) {
    for kind in ["items", "pages", "lazy", "discover"] {
        let repo = Repo::new(count);
        let cursor = cursor(&repo, page_size, bound_of(kind, u64::from(count), page_size));

        let children = split_all(&cursor);
        let mut results = drain(&cursor);
        for child in children.iter().rev() {
            results.extend(drain_child(child));
        }

        results.sort_unstable();
        assert_eq!(results, repo.source(), "bound kind {kind}");
    }
}

#[test]
fn test_thousand_items_decompose_into_ten_units() {
    let repo = Repo::new(1000);
    let cursor = cursor(&repo, 100, BoundPolicy::ExactItemCount(1000));

    let children = split_all(&cursor);
    assert_eq!(children.len(), 9);
    assert_eq!(
        children.iter().map(Child::page_index).collect::<Vec<_>>(),
        (0..9).collect::<Vec<_>>()
    );
    assert_eq!(cursor.page_index(), 9);

    let mut results: Vec<u32> = children.iter().flat_map(drain_child).collect();
    results.extend(drain(&cursor));
    assert_eq!(results, repo.source());
    assert_eq!(repo.total_fetches(), 10);
}

#[test]
fn test_concurrent_split_and_advance_share_no_page() {
    let repo = Repo::new(5000);
    let cursor = cursor(&repo, 50, BoundPolicy::ExactItemCount(5000));
    let collected = Mutex::new(Vec::new());

    std::thread::scope(|scope| {
        scope.spawn(|| {
            while let Some(child) = cursor.split().unwrap() {
                let items = drain_child(&child);
                collected.lock().unwrap().extend(items);
            }
        });
        scope.spawn(|| {
            let mut items = Vec::new();
            while cursor.advance_one(&mut |item| items.push(item)).unwrap() {}
            collected.lock().unwrap().extend(items);
        });
    });

    let mut results = collected.into_inner().unwrap();
    results.sort_unstable();
    assert_eq!(results, repo.source());
    assert_eq!(repo.total_fetches(), 100);
}

// ============================================================================
// Discovery Tests
// ============================================================================

#[test]
fn test_prefetch_fetches_first_page_once() {
    let repo = Repo::new(1000);
    let cursor = cursor(&repo, 100, BoundPolicy::discover_from_results());

    let child = cursor.split().unwrap().expect("child");
    assert_eq!(cursor.estimate_size().unwrap(), 1000);
    assert!(child.is_prefetched());

    assert_eq!(drain_child(&child), (0..100).collect::<Vec<_>>());
    assert_eq!(repo.fetches_of(0), 1);
    assert!(cursor.prefetch_cache().unwrap().is_consumed());
}

#[test]
fn test_estimate_before_split_triggers_single_prefetch() {
    let repo = Repo::new(250);
    let cursor = cursor(&repo, 100, BoundPolicy::discover_from_results());

    assert_eq!(cursor.estimate_size().unwrap(), 300);
    assert_eq!(cursor.estimate_size().unwrap(), 300);
    assert_eq!(cursor.discovered_total_pages(), Some(3));
    assert_eq!(repo.total_fetches(), 1);

    assert_eq!(drain(&cursor), repo.source());
    assert_eq!(repo.fetches_of(0), 1);
}

#[test]
fn test_single_page_discovery_completes_without_second_fetch() {
    let repo = Repo::new(42);
    let cursor = cursor(&repo, 100, BoundPolicy::discover_from_results());

    assert!(cursor.split().unwrap().is_none());

    let mut items = Vec::new();
    let more = cursor.advance_one(&mut |item| items.push(item)).unwrap();

    assert!(!more);
    assert_eq!(items, repo.source());
    assert_eq!(*repo.fetches.lock().unwrap(), vec![0]);
}

#[test_case(100, 100, &[0] ; "single full page")]
#[test_case(300, 100, &[0, 1, 2] ; "full last page")]
#[test_case(250, 100, &[0, 1, 2] ; "short last page")]
#[test_case(42, 100, &[0] ; "single short page")]
fn test_sequential_discovery_uses_first_fetched_page(
    count: u32,
    page_size: u64,
    fetches: &[u64],
) {
    let repo = Repo::new(count);
    let cursor = cursor(&repo, page_size, BoundPolicy::discover_from_results());

    assert_eq!(drain(&cursor), repo.source());
    assert_eq!(*repo.fetches.lock().unwrap(), fetches.to_vec());
    assert_eq!(
        cursor.discovered_total_pages(),
        Some(pages_for(u64::from(count), page_size))
    );
    assert!(cursor.prefetch_cache().unwrap().is_consumed());
}

#[test]
fn test_sequential_discovery_then_split_reuses_learned_total() {
    let repo = Repo::new(400);
    let cursor = cursor(&repo, 100, BoundPolicy::discover_from_results());

    let mut first = Vec::new();
    assert!(cursor.advance_one(&mut |item| first.push(item)).unwrap());
    assert_eq!(cursor.estimate_size().unwrap(), 400);

    let children = split_all(&cursor);
    assert_eq!(
        children.iter().map(Child::page_index).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert_eq!(repo.total_fetches(), 1);
}

#[test]
fn test_sequential_discovery_with_start_page() {
    let repo = Repo::new(300);
    let cursor = PageCursor::for_results(100, repo.fetcher(), BoundPolicy::discover_from_results())
        .start_page(1)
        .build()
        .unwrap();

    assert_eq!(drain(&cursor), (100..300).collect::<Vec<_>>());
    assert_eq!(*repo.fetches.lock().unwrap(), vec![1, 2]);
    assert_eq!(cursor.prefetch_cache().unwrap().page_index(), 1);
}

#[test]
fn test_empty_source_discovery() {
    let repo = Repo::new(0);
    let cursor = cursor(&repo, 100, BoundPolicy::discover_from_results());

    assert!(cursor.split().unwrap().is_none());
    assert!(cursor.discovered_total_pages().unwrap() >= 1);

    let mut count = 0;
    let more = cursor.advance_one(&mut |_| count += 1).unwrap();
    assert!(!more);
    assert_eq!(count, 0);
    assert_eq!(repo.total_fetches(), 1);
}

#[test]
fn test_concurrent_first_callers_prefetch_once() {
    let repo = Repo::new(1000);
    let cursor = cursor(&repo, 100, BoundPolicy::discover_from_results());

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| cursor.estimate_size().unwrap());
        }
    });

    assert_eq!(repo.fetches_of(0), 1);
}

#[test]
fn test_discover_without_extractor_fails_before_fetching() {
    let repo = Repo::new(10);
    let err = PageCursor::for_results(10, repo.fetcher(), BoundPolicy::Discover(None))
        .build()
        .unwrap_err();

    assert!(matches!(err, Error::MissingTotalPagesExtractor));
    assert!(err.is_config());
    assert_eq!(repo.total_fetches(), 0);
}

#[test]
fn test_zero_page_size_is_rejected() {
    let repo = Repo::new(10);
    let err = PageCursor::for_results(0, repo.fetcher(), BoundPolicy::ExactItemCount(10))
        .build()
        .unwrap_err();

    assert!(matches!(err, Error::InvalidPageSize));
}

// ============================================================================
// Bound Policy Tests
// ============================================================================

#[test]
fn test_estimate_size_per_bound_policy() {
    let repo = Repo::new(95);

    assert_eq!(
        cursor(&repo, 10, BoundPolicy::ExactItemCount(95))
            .estimate_size()
            .unwrap(),
        95
    );
    assert_eq!(
        cursor(&repo, 10, BoundPolicy::ExactPageCount(10))
            .estimate_size()
            .unwrap(),
        100
    );
    assert_eq!(
        cursor(&repo, 10, BoundPolicy::lazy_item_count(|| Ok(95)))
            .estimate_size()
            .unwrap(),
        95
    );
    assert_eq!(
        cursor(&repo, 10, BoundPolicy::discover_from_results())
            .estimate_size()
            .unwrap(),
        100
    );
}

#[test]
fn test_lazy_count_is_evaluated_once_on_first_need() {
    let repo = Repo::new(30);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let cursor = cursor(
        &repo,
        10,
        BoundPolicy::lazy_item_count(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(30)
        }),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let children = split_all(&cursor);
    assert_eq!(children.len(), 2);
    assert_eq!(drain(&cursor), (20..30).collect::<Vec<_>>());
    assert_eq!(cursor.estimate_size().unwrap(), 30);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_bound_policy_debug_and_kind() {
    let policy: BoundPolicy<PageResult<u32>> = BoundPolicy::discover_from_results();
    assert_eq!(policy.kind(), "discover");
    assert_eq!(format!("{policy:?}"), "Discover { has_extractor: true }");
    assert_eq!(
        format!("{:?}", BoundPolicy::<PageResult<u32>>::ExactItemCount(5)),
        "ExactItemCount(5)"
    );
}

// ============================================================================
// Last Page Signal Tests
// ============================================================================

#[test]
fn test_short_page_signal_fetches_trailing_empty_page_without_bound() {
    let repo = Repo::new(200);
    let inner = repo.fetcher();
    // No total pages reported, so only the short page ends the walk
    let fetcher = move |request: PageRequest| -> Result<PageResult<u32>> {
        Ok(PageResult::new(inner(request)?.items))
    };
    let cursor = PageCursor::for_results(100, fetcher, BoundPolicy::ExactItemCount(u64::MAX))
        .build()
        .unwrap();

    assert_eq!(drain(&cursor), repo.source());
    assert_eq!(*repo.fetches.lock().unwrap(), vec![0, 1, 2]);
}

#[test]
fn test_discovered_total_stops_on_full_last_page() {
    let repo = Repo::new(200);
    let cursor = cursor(&repo, 100, BoundPolicy::discover_from_results());

    assert_eq!(drain(&cursor), repo.source());
    assert_eq!(*repo.fetches.lock().unwrap(), vec![0, 1]);
}

#[test]
fn test_backend_flag_signal_stops_on_full_last_page() {
    let repo = Repo::new(200);
    let cursor = PageCursor::for_results(100, repo.fetcher(), BoundPolicy::discover_from_results())
        .last_page_signal(LastPageSignal::flag_from_results())
        .build()
        .unwrap();

    assert_eq!(drain(&cursor), repo.source());
    assert_eq!(repo.total_fetches(), 2);
}

#[test]
fn test_backend_flag_signal_ignores_short_pages() {
    let fetcher = |request: PageRequest| -> Result<PageResult<u32>> {
        // Backend returns fewer rows than requested but more pages remain
        let items = vec![request.index as u32];
        Ok(PageResult::new(items).with_is_last(request.index == 2))
    };
    let cursor = PageCursor::for_results(10, fetcher, BoundPolicy::ExactPageCount(100))
        .last_page_signal(LastPageSignal::flag_from_results())
        .build()
        .unwrap();

    assert_eq!(drain(&cursor), vec![0, 1, 2]);
}

#[test]
fn test_backend_flag_missing_is_extraction_error() {
    let fetcher = |_: PageRequest| -> Result<PageResult<u32>> { Ok(PageResult::new(vec![1])) };
    let cursor = PageCursor::for_results(10, fetcher, BoundPolicy::ExactItemCount(10))
        .last_page_signal(LastPageSignal::flag_from_results())
        .build()
        .unwrap();

    let err = cursor.advance_one(&mut |_| {}).unwrap_err();
    assert!(matches!(err, Error::Extraction { .. }));
}

// ============================================================================
// Error Propagation Tests
// ============================================================================

#[test]
fn test_fetch_error_keeps_delivered_items_and_finishes_cursor() {
    let repo = Repo::new(100);
    let inner = repo.fetcher();
    let fetcher = move |request: PageRequest| -> Result<PageResult<u32>> {
        if request.index == 2 {
            return Err(Error::fetch(request.index, "connection reset"));
        }
        inner(request)
    };
    let cursor = PageCursor::for_results(10, fetcher, BoundPolicy::ExactItemCount(100))
        .build()
        .unwrap();

    let mut delivered = Vec::new();
    let mut outcome = Ok(true);
    while let Ok(true) = outcome {
        outcome = cursor.advance_one(&mut |item| delivered.push(item));
    }

    let err = outcome.unwrap_err();
    assert!(matches!(err, Error::Fetch { page: 2, .. }));
    assert_eq!(delivered, (0..20).collect::<Vec<_>>());
    assert!(cursor.is_finished());
    assert!(!cursor.advance_one(&mut |_| {}).unwrap());
}

#[test]
fn test_discovery_fetch_error_surfaces_from_split() {
    let fetcher = |request: PageRequest| -> Result<PageResult<u32>> {
        Err(Error::fetch(request.index, "unavailable"))
    };
    let cursor = PageCursor::for_results(10, fetcher, BoundPolicy::discover_from_results())
        .build()
        .unwrap();

    assert!(cursor.split().unwrap_err().is_fetch());
    assert!(cursor.estimate_size().is_err());
}

#[test]
fn test_missing_total_pages_is_extraction_error() {
    let fetcher = |_: PageRequest| -> Result<PageResult<u32>> { Ok(PageResult::new(vec![1, 2])) };
    let cursor = PageCursor::for_results(10, fetcher, BoundPolicy::discover_from_results())
        .build()
        .unwrap();

    assert!(matches!(
        cursor.estimate_size().unwrap_err(),
        Error::Extraction { .. }
    ));
}

#[test]
fn test_custom_page_type_with_closure_extractors() {
    // Backend page shaped as (rows, total rows)
    let fetcher = |request: PageRequest| -> Result<(Vec<String>, u64)> {
        let rows = (request.offset()..(request.offset() + request.size).min(25))
            .map(|i| format!("row-{i}"))
            .collect();
        Ok((rows, 25))
    };
    let items = |page: (Vec<String>, u64)| -> Result<Vec<String>> { Ok(page.0) };
    let total_pages = |page: &(Vec<String>, u64)| -> Result<u64> { Ok(pages_for(page.1, 10)) };

    let cursor = PageCursor::new(10, fetcher, items, BoundPolicy::discover(total_pages)).unwrap();

    let children = split_all(&cursor);
    assert_eq!(children.len(), 2);
    let mut out: Vec<String> = children
        .iter()
        .flat_map(|child| {
            let mut rows = Vec::new();
            child.advance_one(&mut |row| rows.push(row)).unwrap();
            rows
        })
        .collect();
    while cursor.advance_one(&mut |row| out.push(row)).unwrap() {}

    assert_eq!(out.len(), 25);
    assert_eq!(out.first().map(String::as_str), Some("row-0"));
    assert_eq!(out.last().map(String::as_str), Some("row-24"));
}
