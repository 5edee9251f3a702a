//! Session coordinator integration tests
//!
//! Timer-dependent tests run on a paused clock.

use std::sync::Arc;
use std::time::Duration;

use kiwi_voice::config::WakeWordConfig;
use kiwi_voice::session::{
    Activity, DetectorSubscription, EndReason, SessionCoordinator, SubscriptionState,
};
use kiwi_voice::voice::{Announcer, Delivery, DetectionEvent, KeywordSpotter};
use tokio::sync::mpsc;
use tokio::time::Instant;

mod common;
use common::{Harness, test_session_config};

const TIMEOUT_MS: u64 = 30_000;

fn cycle(middle: &[&str]) -> Vec<String> {
    std::iter::once("unsubscribe")
        .chain(middle.iter().copied())
        .chain(std::iter::once("subscribe"))
        .map(ToString::to_string)
        .collect()
}

#[tokio::test(start_paused = true)]
async fn fresh_start_greets_activates_and_arms_timer() {
    let h = Harness::new();
    let (handle, _events, _task) = h.spawn(test_session_config(TIMEOUT_MS)).await;

    let snapshot = handle.start().await.unwrap();

    assert!(snapshot.active);
    assert_eq!(snapshot.sessions_started, 1);
    assert_eq!(snapshot.subscription, SubscriptionState::Listening);
    let remaining = snapshot.idle_remaining().expect("timer armed");
    assert!(remaining <= Duration::from_millis(TIMEOUT_MS));
    assert!(remaining > Duration::from_millis(TIMEOUT_MS - 1_000));
    assert_eq!(h.log.entries(), cycle(&["speak:hello", "play"]));
}

#[tokio::test]
async fn start_twice_greets_once() {
    let h = Harness::new();
    let (handle, _events, _task) = h.spawn(test_session_config(TIMEOUT_MS)).await;

    handle.start().await.unwrap();
    let snapshot = handle.start().await.unwrap();

    assert!(snapshot.active);
    assert_eq!(snapshot.sessions_started, 1);
    assert_eq!(h.log.count("speak:hello"), 1);
}

#[tokio::test]
async fn wake_while_active_pauses_and_resumes_without_greeting() {
    let h = Harness::new();
    let (handle, _events, _task) = h.spawn(test_session_config(TIMEOUT_MS)).await;
    handle.start().await.unwrap();
    h.log.clear();

    let snapshot = handle.detect(DetectionEvent::Wake).await.unwrap();

    assert!(snapshot.active);
    assert_eq!(snapshot.subscription, SubscriptionState::Listening);
    assert_eq!(h.log.entries(), cycle(&[]));
}

#[tokio::test]
async fn stop_while_active_ends_with_goodbye() {
    let h = Harness::new();
    let (handle, _events, _task) = h.spawn(test_session_config(TIMEOUT_MS)).await;
    handle.start().await.unwrap();
    h.log.clear();

    let snapshot = handle.detect(DetectionEvent::Stop).await.unwrap();

    assert!(!snapshot.active);
    assert!(snapshot.idle_deadline.is_none());
    assert_eq!(snapshot.subscription, SubscriptionState::Listening);
    assert_eq!(snapshot.last_end_reason, Some(EndReason::Explicit));
    assert_eq!(h.log.entries(), cycle(&["speak:goodbye", "play"]));
}

#[tokio::test]
async fn end_twice_says_goodbye_once() {
    let h = Harness::new();
    let (handle, _events, _task) = h.spawn(test_session_config(TIMEOUT_MS)).await;
    handle.start().await.unwrap();

    handle.end().await.unwrap();
    let snapshot = handle.end().await.unwrap();

    assert!(!snapshot.active);
    assert_eq!(snapshot.sessions_ended, 1);
    assert_eq!(h.log.count("speak:goodbye"), 1);
}

#[tokio::test]
async fn stop_while_inactive_only_cycles_detector() {
    let h = Harness::new();
    let (handle, _events, _task) = h.spawn(test_session_config(TIMEOUT_MS)).await;

    let snapshot = handle.detect(DetectionEvent::Stop).await.unwrap();

    assert!(!snapshot.active);
    assert_eq!(snapshot.sessions_ended, 0);
    assert_eq!(snapshot.last_end_reason, None);
    assert_eq!(h.log.entries(), cycle(&[]));
}

#[tokio::test]
async fn failed_goodbye_still_deactivates_and_resumes() {
    let h = Harness::new();
    h.speech.fail_on("goodbye");
    let (handle, _events, _task) = h.spawn(test_session_config(TIMEOUT_MS)).await;
    handle.start().await.unwrap();
    h.log.clear();

    let snapshot = handle.detect(DetectionEvent::Stop).await.unwrap();

    assert!(!snapshot.active);
    assert!(!snapshot.detector_fault);
    assert_eq!(snapshot.subscription, SubscriptionState::Listening);
    assert_eq!(h.log.entries(), cycle(&["speak:goodbye"]));
}

#[tokio::test]
async fn failed_greeting_still_activates() {
    let h = Harness::new();
    h.speech.fail_on("hello");
    let (handle, _events, _task) = h.spawn(test_session_config(TIMEOUT_MS)).await;

    let snapshot = handle.detect(DetectionEvent::Wake).await.unwrap();

    assert!(snapshot.active);
    assert!(snapshot.idle_deadline.is_some());
    assert_eq!(snapshot.sessions_started, 1);
    assert_eq!(snapshot.subscription, SubscriptionState::Listening);
    assert_eq!(h.log.entries(), cycle(&["speak:hello"]));

    // The session ends normally, with its goodbye
    h.log.clear();
    let snapshot = handle.detect(DetectionEvent::Stop).await.unwrap();
    assert!(!snapshot.active);
    assert_eq!(h.log.entries(), cycle(&["speak:goodbye", "play"]));
}

#[tokio::test(start_paused = true)]
async fn hung_speech_does_not_wedge_the_coordinator() {
    let h = Harness::new();
    h.speech.set_delay(Duration::from_secs(600));
    let (handle, _events, _task) = h.spawn(test_session_config(TIMEOUT_MS)).await;

    let queued = handle.clone();
    let end = tokio::spawn(async move { queued.end().await });

    let started = tokio::time::timeout(Duration::from_secs(120), handle.start())
        .await
        .expect("start never completed")
        .unwrap();
    assert!(started.active);
    assert_eq!(started.subscription, SubscriptionState::Listening);

    let ended = tokio::time::timeout(Duration::from_secs(120), end)
        .await
        .expect("queued end never completed")
        .unwrap()
        .unwrap();
    assert_eq!(ended.subscription, SubscriptionState::Listening);
    assert_eq!(h.log.count("play"), 0);
}

#[tokio::test]
async fn unavailable_output_skips_audio_but_activates() {
    let h = Harness::new();
    h.output.set_available(false);
    let (handle, _events, _task) = h.spawn(test_session_config(TIMEOUT_MS)).await;

    let snapshot = handle.start().await.unwrap();

    assert!(snapshot.active);
    assert!(snapshot.idle_deadline.is_some());
    assert_eq!(h.log.entries(), cycle(&[]));
}

#[tokio::test(start_paused = true)]
async fn idle_timeout_ends_session_once() {
    let h = Harness::new();
    let (handle, _events, _task) = h.spawn(test_session_config(TIMEOUT_MS)).await;
    handle.start().await.unwrap();
    h.log.clear();
    let started = Instant::now();

    let mut state = handle.watch();
    tokio::time::timeout(Duration::from_secs(60), state.wait_for(|s| !s.active))
        .await
        .expect("idle timer never fired")
        .unwrap();
    assert!(started.elapsed() >= Duration::from_millis(TIMEOUT_MS));

    // Nothing else fires later
    tokio::time::sleep(Duration::from_secs(120)).await;
    let snapshot = handle.activity(Activity::UserSpeech).await.unwrap();

    assert!(!snapshot.active);
    assert_eq!(snapshot.sessions_ended, 1);
    assert_eq!(snapshot.last_end_reason, Some(EndReason::Idle));
    assert_eq!(snapshot.subscription, SubscriptionState::Listening);
    assert_eq!(h.log.entries(), cycle(&["speak:goodbye", "play"]));
}

#[tokio::test(start_paused = true)]
async fn activity_postpones_idle_expiry() {
    let h = Harness::new();
    let (handle, _events, _task) = h.spawn(test_session_config(TIMEOUT_MS)).await;
    handle.start().await.unwrap();

    tokio::time::sleep(Duration::from_secs(20)).await;
    handle.activity(Activity::AssistantResponse).await.unwrap();
    let reset_at = Instant::now();

    // Past the original deadline
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert!(handle.snapshot().active);

    let mut state = handle.watch();
    tokio::time::timeout(Duration::from_secs(60), state.wait_for(|s| !s.active))
        .await
        .expect("idle timer never fired")
        .unwrap();

    assert!(reset_at.elapsed() >= Duration::from_millis(TIMEOUT_MS));
    assert_eq!(handle.snapshot().sessions_ended, 1);
}

#[tokio::test]
async fn activity_while_inactive_is_ignored() {
    let h = Harness::new();
    let (handle, _events, _task) = h.spawn(test_session_config(TIMEOUT_MS)).await;

    let snapshot = handle.activity(Activity::UserSpeech).await.unwrap();

    assert!(!snapshot.active);
    assert!(snapshot.idle_deadline.is_none());
    assert!(h.log.entries().is_empty());
}

#[tokio::test]
async fn failed_resume_ends_session_and_records_fault() {
    let h = Harness::new();
    let (handle, _events, _task) = h.spawn(test_session_config(TIMEOUT_MS)).await;
    handle.start().await.unwrap();
    h.engine.fail_subscribe(true);

    let snapshot = handle.detect(DetectionEvent::Wake).await.unwrap();

    assert!(snapshot.detector_fault);
    assert!(!snapshot.active);
    assert_eq!(snapshot.last_end_reason, Some(EndReason::Error));
    assert_eq!(snapshot.subscription, SubscriptionState::Paused);
}

#[tokio::test(start_paused = true)]
async fn stop_during_greeting_is_queued() {
    let h = Harness::new();
    h.speech.set_delay(Duration::from_secs(1));
    let (handle, _events, _task) = h.spawn(test_session_config(TIMEOUT_MS)).await;

    let (started, ended) = tokio::join!(handle.start(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.end().await
    });

    assert!(started.unwrap().active);
    let ended = ended.unwrap();
    assert!(!ended.active);
    assert_eq!(ended.sessions_ended, 1);

    let mut expected = cycle(&["speak:hello", "play"]);
    expected.extend(cycle(&["speak:goodbye", "play"]));
    assert_eq!(h.log.entries(), expected);
}

#[tokio::test]
async fn detections_from_channel_start_a_session() {
    let h = Harness::new();
    let (handle, events, _task) = h.spawn(test_session_config(TIMEOUT_MS)).await;

    events.send(DetectionEvent::Wake).await.unwrap();

    let mut state = handle.watch();
    state.wait_for(|s| s.active).await.unwrap();
    assert_eq!(h.log.count("speak:hello"), 1);
}

#[tokio::test(start_paused = true)]
async fn detections_during_greeting_are_not_delivered() {
    let h = Harness::new();
    h.speech.set_delay(Duration::from_secs(1));

    let (tx, detections) = mpsc::channel(8);
    let spotter = Arc::new(KeywordSpotter::new(&WakeWordConfig::default(), tx).unwrap());
    let feed = spotter.feed();
    let subscription = DetectorSubscription::attach(spotter.clone()).await.unwrap();
    let announcer = Announcer::new(h.speech.clone(), h.output.clone());
    let (handle, _task) =
        SessionCoordinator::new(test_session_config(TIMEOUT_MS), announcer, subscription)
            .spawn(detections);

    assert_eq!(
        feed.detect_label("hey_kiwi").unwrap(),
        Delivery::Delivered(DetectionEvent::Wake)
    );

    let mut state = handle.watch();
    state
        .wait_for(|s| s.subscription == SubscriptionState::Paused)
        .await
        .unwrap();
    assert_eq!(
        feed.detect_label("kiwi_stop").unwrap(),
        Delivery::Paused(DetectionEvent::Stop)
    );

    state
        .wait_for(|s| s.active && s.subscription == SubscriptionState::Listening)
        .await
        .unwrap();
    assert!(spotter.is_subscribed());
    assert_eq!(
        feed.detect_label("kiwi_stop").unwrap(),
        Delivery::Delivered(DetectionEvent::Stop)
    );
    state.wait_for(|s| !s.active).await.unwrap();
}

#[tokio::test]
async fn shutdown_closes_open_session_silently() {
    let h = Harness::new();
    let (handle, _events, task) = h.spawn(test_session_config(TIMEOUT_MS)).await;
    handle.start().await.unwrap();
    h.log.clear();

    let snapshot = handle.shutdown().await.unwrap();
    assert!(!snapshot.active);
    assert!(snapshot.idle_deadline.is_none());
    assert_eq!(snapshot.sessions_ended, 1);
    assert_eq!(snapshot.last_end_reason, Some(EndReason::Shutdown));
    task.await.unwrap();

    assert_eq!(handle.snapshot(), snapshot);
    assert!(h.log.entries().is_empty());
    assert!(handle.start().await.is_err());
}

#[tokio::test]
async fn dropping_all_handles_stops_coordinator() {
    let h = Harness::new();
    let (handle, _events, task) = h.spawn(test_session_config(TIMEOUT_MS)).await;

    drop(handle);
    task.await.unwrap();
}
