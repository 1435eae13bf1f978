//! Tests for the live session actor.

use avatar_core::model::conversation::{InboundEvent, SourceKind};
use avatar_core::sequencer::LiveSession;

#[tokio::test]
async fn session_serializes_both_sources() {
    let (session, handle) = LiveSession::spawn(16);

    session.submit_typed("user-1", "hello").await.unwrap();
    assert!(session.submit_transcribed("user-1", 2, "two").await.unwrap());
    assert!(!session.submit_transcribed("user-1", 0, "zero").await.unwrap());
    assert!(!session.submit_transcribed("user-1", 2, "two again").await.unwrap());
    session.submit_typed("user-1", "bye").await.unwrap();
    assert!(session.submit_transcribed("user-1", 3, "three").await.unwrap());

    session.end().await.unwrap();
    let log = handle.await.unwrap();

    let texts: Vec<_> = log.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(texts, ["hello", "two", "bye", "three"]);
}

#[tokio::test]
async fn subscribers_see_only_accepted_entries() {
    let (session, handle) = LiveSession::spawn(16);
    let mut rx = session.subscribe();

    session
        .send(InboundEvent::Transcribed {
            index: 1,
            text: "one".to_string(),
            participant: "user-1".to_string(),
        })
        .await
        .unwrap();
    session
        .send(InboundEvent::Transcribed {
            index: 1,
            text: "one (retransmit)".to_string(),
            participant: "user-1".to_string(),
        })
        .await
        .unwrap();
    session.submit_typed("user-1", "typed").await.unwrap();
    session.end().await.unwrap();
    handle.await.unwrap();

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first.text, "one");
    assert_eq!(second.source_kind, SourceKind::Typed);
    drop(session);
    assert!(rx.recv().await.is_err());
}

#[tokio::test]
async fn ended_session_rejects_submissions() {
    let (session, handle) = LiveSession::spawn(4);
    session.end().await.unwrap();
    handle.await.unwrap();

    assert!(session.submit_typed("user-1", "late").await.is_err());
    assert!(session.submit_transcribed("user-1", 0, "late").await.is_err());
}

#[tokio::test]
async fn new_session_starts_from_a_fresh_mark() {
    let (first, handle) = LiveSession::spawn(4);
    assert!(first.submit_transcribed("user-1", 9, "old").await.unwrap());
    first.end().await.unwrap();
    handle.await.unwrap();

    let (second, handle) = LiveSession::spawn(4);
    assert!(second.submit_transcribed("user-1", 0, "hi").await.unwrap());
    second.end().await.unwrap();
    assert_eq!(handle.await.unwrap().len(), 1);
    assert_ne!(first.id(), second.id());
}

#[tokio::test]
async fn concurrent_senders_apply_each_fragment_once() {
    let (session, handle) = LiveSession::spawn(64);

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let session = session.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..20 {
                session
                    .submit_transcribed("user-1", i, format!("f{i}"))
                    .await
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    session.end().await.unwrap();
    let log = handle.await.unwrap();

    let indices: Vec<i64> = log.iter().filter_map(|e| e.sequence_index).collect();
    assert!(indices.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(indices.last(), Some(&19));
}

#[tokio::test]
async fn submissions_after_end_fail_before_the_task_is_joined() {
    let (session, handle) = LiveSession::spawn(4);
    session.submit_typed("user-1", "kept").await.unwrap();
    session.end().await.unwrap();

    assert!(session.submit_typed("user-1", "late").await.is_err());
    assert!(session.submit_transcribed("user-1", 5, "late").await.is_err());
    assert!(session.end().await.is_err());

    let texts: Vec<_> = handle
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.text)
        .collect();
    assert_eq!(texts, ["kept"]);
}

#[tokio::test]
async fn zero_capacity_is_usable() {
    let (session, handle) = LiveSession::spawn(0);
    session.submit_typed("user-1", "hi").await.unwrap();
    assert!(session.submit_transcribed("user-1", 0, "zero").await.unwrap());
    session.end().await.unwrap();
    assert_eq!(handle.await.unwrap().len(), 2);
}
