//! Tests for the windowed fetch controller.

use super::*;
use crate::source::MemorySource;
use std::collections::BTreeMap;

fn request(search: Option<&str>) -> PageRequest {
    PageRequest {
        page: 1,
        page_size: 1000,
        search: search.map(str::to_string),
        filters: BTreeMap::new(),
    }
}

fn fetch_config(max_retries: u32) -> FetchConfig {
    FetchConfig {
        max_retries,
        ..FetchConfig::default()
    }
}

fn controller(source: &Arc<MemorySource<u32>>, max_retries: u32) -> FetchController<u32> {
    let source: Arc<dyn PageSource<u32>> = source.clone();
    FetchController::new(source, &fetch_config(max_retries), CancellationToken::new())
}

#[tokio::test(start_paused = true)]
async fn test_first_fetch_applies_window() {
    // Arrange
    let source = Arc::new(MemorySource::new((1..=30).collect::<Vec<u32>>()));
    let mut fetch = controller(&source, 0);

    // Act
    let generation = fetch.issue(request(None));
    assert!(fetch.is_loading());
    let outcome = fetch.completed().await;

    // Assert
    assert_eq!(generation, 1);
    assert_eq!(
        outcome,
        FetchOutcome::Applied {
            generation: 1,
            records: 30,
            population: 30
        }
    );
    assert!(!fetch.is_loading());
    assert!(!fetch.has_outstanding());
    let window = fetch.window().unwrap();
    assert_eq!(window.generation, 1);
    assert!(!window.is_sample());
}

#[tokio::test(start_paused = true)]
async fn test_out_of_order_responses_keep_latest() {
    // Arrange: generation 1 is slow, generation 2 is fast
    let source = Arc::new(
        MemorySource::new(vec![1u32, 2, 3, 4])
            .with_search(|n: &u32, text| text.parse::<u32>().is_ok_and(|min| *n >= min))
            .with_latency(|req| match req.search.as_deref() {
                Some("1") => Duration::from_millis(300),
                _ => Duration::from_millis(100),
            }),
    );
    let mut fetch = controller(&source, 0);

    // Act
    let first = fetch.issue(request(Some("1")));
    let second = fetch.issue(request(Some("3")));
    let outcome_a = fetch.completed().await;
    let outcome_b = fetch.completed().await;

    // Assert
    assert_eq!((first, second), (1, 2));
    assert!(matches!(outcome_a, FetchOutcome::Applied { generation: 2, .. }));
    assert_eq!(outcome_b, FetchOutcome::Stale { generation: 1 });
    let window = fetch.window().unwrap();
    assert_eq!(window.generation, 2);
    assert_eq!(window.records, vec![3, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_failure_keeps_previous_window() {
    let source = Arc::new(MemorySource::new(vec![10u32, 20]));
    let mut fetch = controller(&source, 0);
    fetch.issue(request(None));
    fetch.completed().await;

    source.fail_next(Error::Transport("connection reset".to_string()));
    fetch.issue(request(Some("x")));
    let outcome = fetch.completed().await;

    assert!(matches!(outcome, FetchOutcome::Failed { generation: 2, .. }));
    assert!(fetch.error().unwrap().contains("connection reset"));
    assert_eq!(fetch.window().unwrap().records, vec![10, 20]);
    assert_eq!(fetch.window().unwrap().generation, 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_reissues_last_request() {
    // Arrange
    let source = Arc::new(MemorySource::new(vec![1u32]));
    source.fail_next(Error::Authentication("expired".to_string()));
    let mut fetch = controller(&source, 0);
    fetch.issue(request(Some("ana")));
    fetch.completed().await;
    assert!(fetch.error().is_some());

    // Act
    let generation = fetch.retry();
    let outcome = fetch.completed().await;

    // Assert
    assert_eq!(generation, Some(2));
    assert!(matches!(outcome, FetchOutcome::Applied { generation: 2, .. }));
    assert!(fetch.error().is_none());
    let requests = source.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], requests[1]);
}

#[tokio::test(start_paused = true)]
async fn test_retry_without_request_is_none() {
    let source = Arc::new(MemorySource::new(vec![1u32]));
    let mut fetch = controller(&source, 0);
    assert_eq!(fetch.retry(), None);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_retried_within_generation() {
    let source = Arc::new(MemorySource::new(vec![1u32, 2]));
    source.fail_next(Error::Transport("503 service unavailable".to_string()));
    let mut fetch = controller(&source, 2);

    fetch.issue(request(None));
    let outcome = fetch.completed().await;

    assert!(matches!(outcome, FetchOutcome::Applied { generation: 1, .. }));
    assert_eq!(source.calls(), 2);
    assert_eq!(fetch.latest_generation(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_failure_surfaces_immediately() {
    let source = Arc::new(MemorySource::new(vec![1u32]));
    source.fail_next(Error::Decode("not json".to_string()));
    let mut fetch = controller(&source, 2);

    fetch.issue(request(None));
    let outcome = fetch.completed().await;

    assert!(matches!(outcome, FetchOutcome::Failed { .. }));
    assert_eq!(source.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_source_times_out() {
    let source =
        Arc::new(MemorySource::new(vec![1u32]).with_latency(|_| Duration::from_secs(60)));
    let mut fetch = controller(&source, 0);

    fetch.issue(request(None));
    let outcome = fetch.completed().await;

    match outcome {
        FetchOutcome::Failed { message, .. } => assert!(message.contains("timed out")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(fetch.window().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_dispose_discards_in_flight() {
    // Arrange
    let source =
        Arc::new(MemorySource::new(vec![1u32]).with_latency(|_| Duration::from_millis(200)));
    let mut fetch = controller(&source, 0);
    fetch.issue(request(None));

    // Act
    fetch.dispose();
    tokio::time::sleep(Duration::from_secs(1)).await;

    // Assert
    assert!(fetch.try_completed().is_none());
    assert!(fetch.window().is_none());
    assert!(!fetch.is_loading());
    assert!(!fetch.has_outstanding());
    assert_eq!(fetch.issue(request(None)), 1);
    assert_eq!(fetch.retry(), None);
}

#[tokio::test(start_paused = true)]
async fn test_population_larger_than_window() {
    let source = Arc::new(MemorySource::new((0..50).collect::<Vec<u32>>()));
    let config = FetchConfig {
        window_size: 20,
        max_retries: 0,
        ..FetchConfig::default()
    };
    let dyn_source: Arc<dyn PageSource<u32>> = source.clone();
    let mut fetch = FetchController::new(dyn_source, &config, CancellationToken::new());

    let mut req = request(None);
    req.page_size = fetch.window_size();
    fetch.issue(req);
    fetch.completed().await;

    let window = fetch.window().unwrap();
    assert_eq!(window.records.len(), 20);
    assert_eq!(window.population, 50);
    assert!(window.is_sample());
}
