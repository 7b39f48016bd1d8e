//! Integration tests for barriers driven by the local runtime.
//!
//! Timeouts spawn local tasks, so these run under `#[intercal_async::test]`.

#![cfg(not(target_arch = "wasm32"))]

use intercal_async::time::{self, Duration};
use intercal_core::barrier::{self, Barrier, BarrierFailure, BarrierPhase, NOT_SET};
use intercal_core::config::BarrierConfig;
use intercal_core::tree::Intercal;
use intercal_core::{Error, Event, Once, WatchedAction};
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn once() -> Once {
    Once::new()
}

fn event() -> Event {
    Event::new()
}

fn counter() -> (Rc<Cell<u32>>, impl Fn() + Clone + 'static) {
    let calls = Rc::new(Cell::new(0));
    let inner = calls.clone();
    (calls, move || inner.set(inner.get() + 1))
}

#[intercal_async::test]
async fn test_timeout_when_action_never_completes() {
    let config = BarrierConfig::builder()
        .item_count(1)
        .timeout(Duration::from_millis(1))
        .build()
        .unwrap();
    let barrier = Barrier::new(config).unwrap();

    let (timeouts, on_timeout) = counter();
    let failure = Rc::new(RefCell::new(None));
    let sink = failure.clone();
    barrier
        .on_timeout(on_timeout)
        .on_done(|| panic!("timed out barrier must not resolve"))
        .on_fail(move |err| *sink.borrow_mut() = Some(err.clone()));

    let never = once();
    barrier.add(never.clone()).unwrap();
    assert!(barrier.is_locked());

    let result = barrier.wait().await;
    assert_eq!(result, Err(BarrierFailure::Timeout));
    assert_eq!(result.unwrap_err().cause(), "timeout");
    assert_eq!(timeouts.get(), 1);
    assert_eq!(*failure.borrow(), Some(BarrierFailure::Timeout));

    let status = barrier.status();
    assert!(status.timed_out);
    assert!(!status.finished);
    assert_eq!(status.remaining, 1);
    assert_eq!(status.remaining_time, NOT_SET);
    assert!(status.end_time >= status.start_time);
    assert!(barrier.timed_out());
    assert_eq!(barrier.phase(), BarrierPhase::TimedOut);

    // The action finally completes: progress moves, the outcome does not.
    never.resolve(vec![]);
    assert_eq!(barrier.outcome(), Some(Err(BarrierFailure::Timeout)));
    assert_eq!(barrier.status().completed, 1);
    assert!(barrier.status().finished);
    assert_eq!(timeouts.get(), 1);
}

#[intercal_async::test]
async fn test_timeout_listener_added_late_still_notified() {
    let barrier = barrier::all(vec![once().into()], Some(Duration::from_millis(1))).unwrap();
    let _ = barrier.wait().await;

    let (timeouts, on_timeout) = counter();
    barrier.on_timeout(on_timeout);
    assert_eq!(timeouts.get(), 1);
}

#[intercal_async::test]
async fn test_sub_millisecond_timeout_still_fires() {
    let barrier = barrier::all(vec![once().into()], Some(Duration::from_micros(500))).unwrap();
    assert_eq!(barrier.config().timeout_ms, 1);

    time::sleep(Duration::from_millis(30)).await;
    assert!(barrier.timed_out());
    assert_eq!(barrier.outcome(), Some(Err(BarrierFailure::Timeout)));
}

#[intercal_async::test]
async fn test_huge_timeout_reports_remaining_time() {
    let action = once();
    let barrier = barrier::all(vec![action.clone().into()], Some(Duration::MAX)).unwrap();

    let status = barrier.status();
    assert!(status.remaining_time > 0);
    assert!(!barrier.timed_out());

    action.resolve(vec![]);
    assert_eq!(barrier.wait().await, Ok(()));
}

#[test]
#[should_panic(expected = "spawn_local")]
fn test_timeout_outside_local_set_panics() {
    let _ = barrier::all(vec![once().into()], Some(Duration::from_millis(10)));
}

#[test]
fn test_no_timeout_needs_no_local_set() {
    let action = once();
    let barrier = barrier::all(vec![action.clone().into()], None).unwrap();
    action.resolve(vec![]);
    assert_eq!(barrier.outcome(), Some(Ok(())));
}

#[intercal_async::test]
async fn test_settling_cancels_timeout() {
    let action = once();
    let barrier = barrier::all(vec![action.clone().into()], Some(Duration::from_millis(20))).unwrap();

    let (timeouts, on_timeout) = counter();
    barrier.on_timeout(on_timeout);

    action.resolve(vec![]);
    assert_eq!(barrier.wait().await, Ok(()));

    time::sleep(Duration::from_millis(60)).await;
    assert_eq!(timeouts.get(), 0);
    assert!(!barrier.status().timed_out);
    assert_eq!(barrier.phase(), BarrierPhase::Resolved);
}

#[intercal_async::test]
async fn test_remaining_time_counts_down_while_running() {
    let action = once();
    let barrier =
        barrier::all(vec![action.clone().into()], Some(Duration::from_secs(10))).unwrap();

    time::sleep(Duration::from_millis(5)).await;
    let status = barrier.status();
    assert!(status.remaining_time > 0);
    assert!(status.remaining_time < 10_000);
    assert!(status.elapsed_time >= 1);

    action.resolve(vec![]);
    let status = barrier.status();
    assert_eq!(status.remaining_time, NOT_SET);
    assert_eq!(status.elapsed_time, status.total_time);
}

#[intercal_async::test]
async fn test_all_resolves_once_with_repeatable_source() {
    let loaded = once();
    let clicked = event();
    let barrier = barrier::all(vec![loaded.clone().into(), clicked.clone().into()], None).unwrap();

    let (resolutions, on_done) = counter();
    barrier.on_done(on_done);

    clicked.fire(vec![json!(1)]);
    clicked.fire(vec![json!(2)]);
    assert_eq!(clicked.listener_count(), 0);
    assert_eq!(resolutions.get(), 0);

    loaded.resolve(vec![]);
    assert_eq!(barrier.wait().await, Ok(()));
    assert_eq!(resolutions.get(), 1);

    clicked.fire(vec![json!(3)]);
    assert_eq!(resolutions.get(), 1);
}

#[intercal_async::test]
async fn test_any_resolves_on_first_success() {
    let slow = once();
    let fast = event();
    let barrier = barrier::any_one(vec![slow.clone().into(), fast.clone().into()], None).unwrap();

    fast.fire(vec![]);
    assert_eq!(barrier.wait().await, Ok(()));

    slow.reject(vec![json!("too late")]);
    assert_eq!(barrier.outcome(), Some(Ok(())));
    assert!(barrier.failed_args().is_empty());
}

#[intercal_async::test]
async fn test_wait_reports_aggregated_failures() {
    let a = once();
    let b = once();
    let barrier = barrier::all(vec![a.clone().into(), b.clone().into()], None).unwrap();

    a.reject(vec![json!(404), json!("missing")]);
    b.resolve(vec![]);

    let err = barrier.wait().await.unwrap_err();
    assert_eq!(err.cause(), "actions");
    assert_eq!(err.failed_args(), &[vec![json!(404), json!("missing")]]);
    assert!(!barrier.timed_out());
}

#[test]
fn test_construction_errors() {
    let err = Barrier::new(BarrierConfig {
        item_count: 1,
        wait_completed_count: Some(2),
        timeout_ms: 0,
    })
    .unwrap_err();
    assert_eq!(err.kind(), "ConfigError");

    let err = barrier::any(vec![once().into()], 2, None).unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    let barrier = Barrier::new(BarrierConfig::builder().item_count(3).build().unwrap()).unwrap();
    barrier.add(once()).unwrap();
    assert_eq!(
        barrier.lock().unwrap_err(),
        Error::PrematureLock {
            expected: 3,
            added: 1
        }
    );
}

#[intercal_async::test]
async fn test_tree_signals_feed_a_barrier() {
    let ic = Intercal::new(&json!({
        "once": {"page": "ready fonts"},
        "on": {"user": "login"}
    }))
    .unwrap();

    let mut actions = ic.once_node("page").unwrap().actions();
    actions.push(WatchedAction::try_from(ic.on_node("user.login").unwrap()).unwrap());
    let barrier = barrier::all(actions, Some(Duration::from_secs(5))).unwrap();
    assert_eq!(barrier.status().total, 3);

    let group = WatchedAction::try_from(ic.on_node("user").unwrap()).unwrap_err();
    assert_eq!(group.kind(), "MalformedActionError");

    ic.once("page.ready").unwrap().resolve(vec![]);
    ic.once("page.fonts").unwrap().resolve(vec![]);
    ic.on("user.login").unwrap().fire(vec![json!("alice")]);

    assert_eq!(barrier.wait().await, Ok(()));
    assert!(barrier.status().finished);
}
