mod common;

use std::sync::Arc;
use std::time::Duration;

use atlas_core::{EntryKey, Page};
use atlas_provisioner::{AccessListEngine, Clock, ConvergenceOutcome, ConvergenceState, ProvisionerError};

use common::{cidr_entry, not_found, permanent, test_config, transient, ManualClock, MockAccessListApi, SEC};

fn engine(api: &Arc<MockAccessListApi>, clock: &Arc<ManualClock>) -> AccessListEngine {
    AccessListEngine::new(api.clone(), test_config()).with_clock(clock.clone())
}

fn seed_networks(api: &MockAccessListApi, count: u8) {
    for n in 0..count {
        api.seed(cidr_entry("proj1", &format!("10.{n}.0.0/16")));
    }
}

#[tokio::test]
async fn walks_pages_until_match() {
    let api = MockAccessListApi::with_page_size(2);
    seed_networks(&api, 5);
    let clock = ManualClock::new();
    let deadline = clock.now() + 60 * SEC;

    let outcome = engine(&api, &clock)
        .scan("proj1", &EntryKey::new("10.4.0.0/16"), deadline)
        .await;

    let ConvergenceOutcome::Converged { value, attempts } = outcome else {
        panic!("expected convergence");
    };
    assert_eq!(attempts, 1);
    assert_eq!(value.and_then(|e| e.cidr_block).as_deref(), Some("10.4.0.0/16"));
    assert_eq!(api.calls(), vec!["list proj1 1", "list proj1 2", "list proj1 3"]);
}

#[tokio::test]
async fn reports_absent_only_after_last_page() {
    let api = MockAccessListApi::with_page_size(2);
    seed_networks(&api, 4);
    let clock = ManualClock::new();
    let deadline = clock.now() + 60 * SEC;

    let outcome = engine(&api, &clock)
        .scan("proj1", &EntryKey::new("192.0.2.5"), deadline)
        .await;

    assert!(matches!(outcome, ConvergenceOutcome::Converged { value: None, .. }));
    assert_eq!(api.count("list"), 2);
}

#[tokio::test]
async fn restarts_from_first_page_after_transient_failure() {
    let api = MockAccessListApi::new();
    api.list_script.set([
        Ok(Page::new(vec![cidr_entry("proj1", "10.0.0.0/16")], 1, false)),
        Err(transient()),
        Ok(Page::new(vec![cidr_entry("proj1", "10.0.0.0/16")], 1, false)),
        Ok(Page::new(vec![cidr_entry("proj1", "10.9.0.0/16")], 2, true)),
    ]);
    let clock = ManualClock::new();
    let deadline = clock.now() + 60 * SEC;

    let outcome = engine(&api, &clock)
        .scan("proj1", &EntryKey::new("10.9.0.0/16"), deadline)
        .await;

    assert!(matches!(outcome, ConvergenceOutcome::Converged { value: Some(_), attempts: 2 }));
    assert_eq!(
        api.calls(),
        vec!["list proj1 1", "list proj1 2", "list proj1 1", "list proj1 2"]
    );
    assert_eq!(clock.elapsed(), SEC);
}

#[tokio::test]
async fn never_reports_absent_from_a_partial_walk() {
    let api = MockAccessListApi::new();
    api.list_script.set([
        Ok(Page::new(vec![cidr_entry("proj1", "10.0.0.0/16")], 1, false)),
        Err(transient()),
    ]);
    let clock = ManualClock::new();
    let deadline = clock.now() + 3 * SEC;

    let outcome = engine(&api, &clock)
        .scan("proj1", &EntryKey::new("10.9.0.0/16"), deadline)
        .await;

    assert_eq!(outcome.state(), ConvergenceState::DeadlineExceeded);
    assert_eq!(clock.elapsed(), 3 * SEC);
}

#[tokio::test]
async fn scan_is_bounded_by_its_own_timeout() {
    let api = MockAccessListApi::new();
    api.list_script.set([Err(transient())]);
    let clock = ManualClock::new();
    let deadline = clock.now() + 60 * SEC;

    let outcome = engine(&api, &clock)
        .scan("proj1", &EntryKey::new("10.0.0.0/16"), deadline)
        .await;

    assert_eq!(outcome.state(), ConvergenceState::DeadlineExceeded);
    assert_eq!(clock.elapsed(), test_config().scan.timeout);
}

#[tokio::test]
async fn permanent_listing_error_aborts() {
    let api = MockAccessListApi::new();
    api.list_script.set([
        Ok(Page::new(vec![cidr_entry("proj1", "10.0.0.0/16")], 1, false)),
        Err(permanent()),
    ]);
    let clock = ManualClock::new();
    let deadline = clock.now() + 60 * SEC;

    let outcome = engine(&api, &clock)
        .scan("proj1", &EntryKey::new("10.9.0.0/16"), deadline)
        .await;

    let ConvergenceOutcome::Failed { error, attempts } = outcome else {
        panic!("expected failure");
    };
    assert_eq!(attempts, 1);
    assert!(matches!(error, ProvisionerError::ReadFailed(_)));
    assert!(error.to_string().contains("listing project proj1 page 2"));
    assert_eq!(api.count("list"), 2);
}

#[tokio::test]
async fn page_number_overflow_fails_the_scan() {
    let api = MockAccessListApi::new();
    api.list_script.set([Ok(Page::new(Vec::new(), u32::MAX, false))]);
    let clock = ManualClock::new();
    let deadline = clock.now() + 60 * SEC;

    let outcome = engine(&api, &clock)
        .scan("proj1", &EntryKey::new("10.0.0.0/16"), deadline)
        .await;

    let ConvergenceOutcome::Failed { error, attempts } = outcome else {
        panic!("expected failure");
    };
    assert_eq!(attempts, 1);
    assert!(matches!(error, ProvisionerError::ReadFailed(_)));
    assert_eq!(api.count("list"), 1);
}

#[tokio::test]
async fn not_found_listing_is_permanent() {
    let api = MockAccessListApi::new();
    api.list_script.set([Err(not_found())]);
    let clock = ManualClock::new();
    let deadline = clock.now() + 60 * SEC;

    let outcome = engine(&api, &clock)
        .scan("proj1", &EntryKey::new("10.0.0.0/16"), deadline)
        .await;

    assert_eq!(outcome.state(), ConvergenceState::Failed);
    assert_eq!(api.count("list"), 1);
}

#[tokio::test]
async fn pauses_between_pages() {
    let api = MockAccessListApi::with_page_size(1);
    seed_networks(&api, 3);
    let clock = ManualClock::new();
    let mut config = test_config();
    config.page_delay = Duration::from_millis(500);
    let engine = AccessListEngine::new(api.clone(), config).with_clock(clock.clone());
    let deadline = clock.now() + 60 * SEC;

    let outcome = engine
        .scan("proj1", &EntryKey::new("10.2.0.0/16"), deadline)
        .await;

    assert!(outcome.is_converged());
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_millis(500), Duration::from_millis(500)]
    );
}
