//! Background checker scheduling, driven with a paused clock.

mod common;

use auth_reconciler::{AuthEvent, SessionState};
use common::{user, Harness, Reply, ScriptedSource};
use std::time::Duration;

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn load_repairs_divergent_cache() {
    let h = Harness::new(ScriptedSource::new(Reply::Session(user("u1"))));
    h.cache.set_user(&user("u1")).unwrap();

    let checker = h.handle.start_checker();
    settle().await;

    assert_eq!(h.in_memory(), Some(user("u1")));
    assert_eq!(h.reconciler.state(), SessionState::Consistent);
    assert_eq!(h.source.get_calls(), 1);

    checker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn delayed_check_catches_redirect_without_event() {
    let source = ScriptedSource::new(Reply::NoSession);
    let h = Harness::new(source);
    h.reconciler.mark_transition_start();

    let checker = h.handle.start_checker();
    settle().await;
    // Nothing local, so load does not repair
    assert_eq!(h.source.get_calls(), 0);

    h.source.set_default(Reply::Session(user("u1")));
    tokio::time::sleep(Duration::from_secs(3)).await;
    settle().await;

    assert_eq!(h.source.get_calls(), 1);
    assert_eq!(h.in_memory(), Some(user("u1")));
    let marker = h.markers.marker().unwrap().unwrap();
    assert!(!marker.is_pending());

    checker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn push_events_apply_immediately() {
    let h = Harness::new(ScriptedSource::new(Reply::NoSession));
    let checker = h.handle.start_checker();
    settle().await;

    h.source.emit(AuthEvent::signed_in(user("u2")));
    settle().await;
    assert_eq!(h.in_memory(), Some(user("u2")));
    assert_eq!(h.cached_user(), Some(user("u2")));

    h.source.emit(AuthEvent::signed_out());
    settle().await;
    assert_eq!(h.in_memory(), None);
    assert_eq!(h.cached_user(), None);

    checker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn poll_detects_presence_mismatch() {
    let h = Harness::new(ScriptedSource::new(Reply::Session(user("u1"))));
    let checker = h.handle.start_checker();

    // Pass the delayed check, then break agreement behind the reconciler's back
    tokio::time::sleep(Duration::from_secs(4)).await;
    h.source.emit(AuthEvent::signed_in(user("u1")));
    settle().await;
    h.cache.clear_user().unwrap();
    let calls_before = h.source.get_calls();

    tokio::time::sleep(Duration::from_secs(7)).await;
    settle().await;

    assert_eq!(h.source.get_calls(), calls_before + 1);
    assert_eq!(h.cached_user(), Some(user("u1")));
    assert_eq!(h.reconciler.state(), SessionState::Consistent);

    checker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn retry_budget_stops_automatic_repairs() {
    let h = Harness::new(ScriptedSource::new(Reply::Offline));
    h.cache.set_user(&user("u1")).unwrap();

    let checker = h.handle.start_checker();
    // load, delayed check at 3s, first poll at 10s
    tokio::time::sleep(Duration::from_secs(11)).await;

    assert_eq!(h.reconciler.state(), SessionState::Unrecoverable);
    assert_eq!(h.source.get_calls(), 3);
    assert_eq!(h.in_memory(), None);
    assert_eq!(h.cached_user(), Some(user("u1")));
    assert!(h.handle.recovery_prompt().is_some());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.source.get_calls(), 3);

    checker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn guest_checker_never_contacts_source() {
    let h = Harness::new(ScriptedSource::new(Reply::Session(user("u1"))));
    h.handle.continue_as_guest();

    let checker = h.handle.start_checker();
    h.source.emit(AuthEvent::token_refreshed(user("u1")));
    tokio::time::sleep(Duration::from_secs(45)).await;

    assert_eq!(h.source.network_calls(), 0);
    assert!(h.reconciler.is_guest());
    assert_eq!(h.reconciler.state(), SessionState::Consistent);

    checker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn poll_defers_during_transition() {
    let h = Harness::new(ScriptedSource::new(Reply::Session(user("u1"))));
    h.cache.set_user(&user("u1")).unwrap();
    h.reconciler.mark_transition_start();
    // Make the first load repair fail so the poll has something to do
    h.source.push_get(Reply::Offline);
    h.source.push_refresh(Reply::Offline);
    h.source.push_get(Reply::Offline);
    h.source.push_refresh(Reply::Offline);

    let checker = h.handle.start_checker();
    tokio::time::sleep(Duration::from_secs(11)).await;

    // load and the delayed check ran; the 10s poll is deferred while the
    // redirect is in flight (wall-clock marker age is still ~0)
    assert_eq!(h.source.get_calls(), 2);
    assert_eq!(h.reconciler.state(), SessionState::Divergent);

    checker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_checker() {
    let h = Harness::new(ScriptedSource::new(Reply::Offline));
    let checker = h.handle.start_checker();
    settle().await;

    checker.shutdown().await;
    h.cache.set_user(&user("u1")).unwrap();
    h.source.emit(AuthEvent::signed_in(user("u2")));
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(h.in_memory(), None);
}

#[tokio::test(start_paused = true)]
async fn dropping_handle_stops_checker() {
    let h = Harness::new(ScriptedSource::new(Reply::Offline));
    drop(h.handle.start_checker());
    settle().await;

    h.cache.set_user(&user("u1")).unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.source.get_calls(), 0);
}
