//! Tests for the in-memory store and queue transport.

use std::sync::Arc;
use std::time::Duration;
use supervisor_rs::error::Error;
use supervisor_rs::queue::{MemoryTransport, QueueTransport};
use supervisor_rs::store::{KvStore, MAX_TTL, MemoryStore};

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[tokio::test]
async fn set_then_get_overwrites() {
    let store = MemoryStore::new();
    assert_eq!(store.get("k").await.unwrap(), None);

    store.set("k", "one").await.unwrap();
    store.set("k", "two").await.unwrap();

    assert_eq!(store.get("k").await.unwrap().as_deref(), Some("two"));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn expired_entries_are_invisible_and_purgeable() {
    let store = MemoryStore::new();
    store.set_with_ttl("gone", "x", Duration::ZERO).await.unwrap();
    store
        .set_with_ttl("kept", "y", Duration::from_secs(3600))
        .await
        .unwrap();
    store.set("forever", "z").await.unwrap();

    assert_eq!(store.get("gone").await.unwrap(), None);
    assert_eq!(store.get("kept").await.unwrap().as_deref(), Some("y"));
    assert_eq!(store.purge_expired().await.unwrap(), 1);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn oversized_ttl_never_expires() {
    let store = MemoryStore::new();
    store
        .set_with_ttl("k", "v", Duration::from_secs(u64::MAX))
        .await
        .unwrap();
    store.set_with_ttl("edge", "v", MAX_TTL).await.unwrap();

    assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    assert_eq!(store.get("edge").await.unwrap().as_deref(), Some("v"));
    assert_eq!(store.purge_expired().await.unwrap(), 0);
}

#[tokio::test]
async fn plain_set_clears_a_previous_ttl() {
    let store = MemoryStore::new();
    store.set_with_ttl("k", "old", Duration::ZERO).await.unwrap();
    store.set("k", "new").await.unwrap();
    assert_eq!(store.get("k").await.unwrap().as_deref(), Some("new"));
}

#[tokio::test]
async fn rotate_persists_the_cursor() {
    let store = MemoryStore::new();
    assert_eq!(store.rotate("cursor", 2).await.unwrap(), 1);
    assert_eq!(store.rotate("cursor", 2).await.unwrap(), 2);
    assert_eq!(store.rotate("cursor", 2).await.unwrap(), 1);
    assert_eq!(store.get("cursor").await.unwrap().as_deref(), Some("1"));
}

#[tokio::test]
async fn rotate_rejects_zero_modulus() {
    let store = MemoryStore::new();
    assert!(matches!(
        store.rotate("cursor", 0).await,
        Err(Error::Config(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_rotations_never_repeat_within_a_cycle() {
    let store = Arc::new(MemoryStore::new());
    let handles: Vec<_> = (0..50)
        .map(|_| {
            let s = store.clone();
            tokio::spawn(async move { s.rotate("cursor", 50).await.unwrap() })
        })
        .collect();

    let mut seen = Vec::new();
    for h in handles {
        seen.push(h.await.unwrap());
    }
    seen.sort_unstable();
    assert_eq!(seen, (1..=50).collect::<Vec<_>>());
}

// ---------------------------------------------------------------------------
// MemoryTransport
// ---------------------------------------------------------------------------

#[tokio::test]
async fn messages_are_received_in_order_and_acked() {
    let transport = MemoryTransport::default();
    transport.declare("q").await.unwrap();
    transport.publish("q", b"first").await.unwrap();
    transport.publish("q", b"second").await.unwrap();

    let a = transport.receive("q").await.unwrap().unwrap();
    let b = transport.receive("q").await.unwrap().unwrap();
    assert_eq!(a.body, b"first");
    assert_eq!(b.body, b"second");
    assert_eq!(a.read_count, 1);
    assert!(transport.receive("q").await.unwrap().is_none());

    transport.ack("q", a.tag).await.unwrap();
    transport.ack("q", b.tag).await.unwrap();
    assert_eq!(transport.depth("q"), 0);
}

#[tokio::test]
async fn unacked_messages_are_redelivered_after_visibility_timeout() {
    let transport = MemoryTransport::new(Duration::ZERO);
    transport.publish("q", b"task").await.unwrap();

    let first = transport.receive("q").await.unwrap().unwrap();
    let second = transport.receive("q").await.unwrap().unwrap();

    assert_eq!(first.tag, second.tag);
    assert_eq!(second.read_count, 2);
    assert_eq!(transport.depth("q"), 1);
}

#[tokio::test]
async fn in_flight_messages_stay_hidden() {
    let transport = MemoryTransport::new(Duration::from_secs(3600));
    transport.publish("q", b"task").await.unwrap();

    let delivery = transport.receive("q").await.unwrap().unwrap();
    assert!(transport.receive("q").await.unwrap().is_none());
    assert_eq!(transport.depth("q"), 1);
    assert!(transport.peek("q").is_empty());

    transport.ack("q", delivery.tag).await.unwrap();
    assert_eq!(transport.depth("q"), 0);
}

#[tokio::test]
async fn acking_an_unknown_message_fails() {
    let transport = MemoryTransport::default();
    transport.declare("q").await.unwrap();
    assert!(matches!(transport.ack("q", 42).await, Err(Error::Queue(_))));
}

#[tokio::test]
async fn receiving_from_an_unknown_channel_is_empty() {
    let transport = MemoryTransport::default();
    assert!(transport.receive("nowhere").await.unwrap().is_none());
}
