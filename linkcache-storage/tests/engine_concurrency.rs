//! Concurrency behavior of the resolution engine against the in-memory cache.

use std::sync::Arc;
use std::time::Duration;

use linkcache_core::{ItemScope, LinkResolverConfig};
use linkcache_storage::{InMemoryScopedCache, LinkResolutionEngine, ScopedCache};
use linkcache_test_utils::{fixtures, CallGate, MockLinkProvider};

type Engine = LinkResolutionEngine<InMemoryScopedCache<String>, MockLinkProvider>;

fn engine(provider: MockLinkProvider) -> Engine {
    LinkResolutionEngine::new(
        Arc::new(InMemoryScopedCache::new()),
        Arc::new(provider),
        LinkResolverConfig::default(),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_misses_share_one_backend_call() {
    let engine = engine(fixtures::article_provider().with_delay(Duration::from_millis(50)));

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .resolve(&fixtures::article_reference(), None)
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut urls = Vec::new();
    for task in tasks {
        urls.push(task.await.unwrap());
    }

    assert!(urls.iter().all(|url| url == "/news/my-story.html"));
    assert_eq!(engine.provider().call_count(), 1);
    let metrics = engine.metrics();
    assert_eq!(metrics.backend_calls, 1);
    assert_eq!(metrics.cache_hits, 31);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_keys_do_not_serialize() {
    let gate = CallGate::new();
    let provider = MockLinkProvider::new()
        .with_link("tcm:1-100", "/a")
        .with_link("tcm:1-101", "/b")
        .with_gate(Arc::clone(&gate));
    let engine = engine(provider);

    let first = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.resolve_uri("tcm:1-100").await })
    };
    gate.wait_started().await;

    // The first call is parked at the gate while holding its entry's refresh
    // lock; a different key must still reach the backend.
    let second = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.resolve_uri("tcm:1-101").await })
    };
    gate.wait_started().await;
    assert_eq!(engine.provider().call_count(), 2);

    gate.release(2);
    assert_eq!(first.await.unwrap().unwrap(), "/a");
    assert_eq!(second.await.unwrap().unwrap(), "/b");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_invalidation_during_resolution_leaves_entry_expired() {
    let gate = CallGate::new();
    let engine = engine(fixtures::article_provider().with_gate(Arc::clone(&gate)));

    let in_flight = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .resolve(&fixtures::article_reference(), None)
                .await
                .unwrap()
        })
    };
    gate.wait_started().await;

    // The entry is already tagged with its scope, so the publish reaches it.
    assert_eq!(
        engine.cache().scope_of("CL-tcm:1-100"),
        Some(ItemScope::new(1, 100))
    );
    engine.provider().set_link(fixtures::ARTICLE_URI, "/news/v2.html");
    engine.cache().invalidate_by_scope(ItemScope::new(1, 100));

    gate.release(1);
    // The in-flight caller still gets the value it computed.
    assert_eq!(in_flight.await.unwrap(), "/news/my-story.html");
    assert!(engine.cache().peek("CL-tcm:1-100").unwrap().is_expired());

    // The next resolution sees the republished link.
    gate.release(1);
    assert_eq!(
        engine
            .resolve(&fixtures::article_reference(), None)
            .await
            .unwrap(),
        "/news/v2.html"
    );
    assert!(!engine.cache().peek("CL-tcm:1-100").unwrap().is_expired());
    assert_eq!(engine.provider().call_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_waiters_retry_after_backend_failure() {
    let provider = fixtures::article_provider().with_delay(Duration::from_millis(20));
    provider.fail_next(1);
    let engine = engine(provider);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.resolve_uri(fixtures::ARTICLE_URI).await })
        })
        .collect();

    let mut failures = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(url) => assert_eq!(url, "/news/my-story.html"),
            Err(e) => {
                assert!(e.is_retryable());
                failures += 1;
            }
        }
    }

    // One caller saw the failure; the next lock holder recomputed once.
    assert_eq!(failures, 1);
    assert_eq!(engine.provider().call_count(), 2);
}

#[tokio::test]
async fn test_resolution_is_idempotent_without_invalidation() {
    let engine = engine(fixtures::article_provider());
    let page = fixtures::home_page();

    let first = engine
        .resolve(&fixtures::article_reference(), Some(&page))
        .await
        .unwrap();
    for _ in 0..5 {
        let again = engine
            .resolve(&fixtures::article_reference(), Some(&page))
            .await
            .unwrap();
        assert_eq!(again, first);
    }
    assert_eq!(first, "/home/my-story.html");
    assert_eq!(engine.provider().call_count(), 1);
    assert_eq!(engine.cache().stats().stores, 1);
}
