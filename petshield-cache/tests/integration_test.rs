//! Integration tests for petshield-cache

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use petshield_cache::*;
use petshield_policy::ContentType;
use petshield_xss::SanitizedResult;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn result(content: &str) -> SanitizedResult {
    SanitizedResult::new(content, content, Vec::new(), Vec::new(), Duration::ZERO)
}

fn node(bus: &LocalBus, id: &str) -> Arc<ResultCache> {
    let config = ResultCacheConfig::new().with_instance_id(id);
    Arc::new(ResultCache::new(config).unwrap().with_bus(Arc::new(bus.clone())))
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_clear_propagates_between_instances() {
    let bus = LocalBus::default();
    let a = node(&bus, "node-a");
    let b = node(&bus, "node-b");
    a.start().await;
    b.start().await;

    let options = CacheOptions::new();
    a.set("Rex", &options, ContentType::Comments, result("Rex"));
    b.set("Rex", &options, ContentType::Comments, result("Rex"));

    a.clear().await;
    settle().await;

    assert!(a.is_empty());
    assert!(b.is_empty());

    a.stop();
    b.stop();
}

#[tokio::test]
async fn test_content_type_invalidation_propagates() {
    let bus = LocalBus::default();
    let a = node(&bus, "node-a");
    let b = node(&bus, "node-b");
    a.start().await;
    b.start().await;

    let options = CacheOptions::new();
    b.set("x", &options, ContentType::Comments, result("x"));
    b.set("x", &options, ContentType::SocialSharing, result("x"));

    a.invalidate_by_content_type(ContentType::Comments).await;
    settle().await;

    assert!(b.get("x", &options, ContentType::Comments).is_none());
    assert!(b.get("x", &options, ContentType::SocialSharing).is_some());
}

#[tokio::test]
async fn test_version_bump_converges() {
    let bus = LocalBus::default();
    let a = node(&bus, "node-a");
    let b = node(&bus, "node-b");
    a.start().await;
    b.start().await;

    let options = CacheOptions::new();
    b.set("x", &options, ContentType::Default, result("x"));

    assert_eq!(a.bump_version().await, 2);
    settle().await;

    assert_eq!(b.version(), 2);
    assert!(b.get("x", &options, ContentType::Default).is_none());
}

struct FailingBus {
    publishes: AtomicUsize,
}

#[async_trait]
impl InvalidationBus for FailingBus {
    async fn publish(&self, _event: &InvalidationEvent) -> CacheResult<()> {
        self.publishes.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Config("bus offline".into()))
    }

    async fn subscribe(&self) -> CacheResult<BoxStream<'static, InvalidationEvent>> {
        Ok(Box::pin(stream::empty()))
    }
}

#[tokio::test]
async fn test_publish_failure_is_not_surfaced() {
    let bus = Arc::new(FailingBus {
        publishes: AtomicUsize::new(0),
    });
    let cache = ResultCache::new(ResultCacheConfig::new())
        .unwrap()
        .with_bus(bus.clone());

    cache.set("x", &CacheOptions::new(), ContentType::Default, result("x"));
    assert_eq!(cache.clear().await, 1);
    assert_eq!(cache.bump_version().await, 2);
    assert_eq!(bus.publishes.load(Ordering::SeqCst), 2);
}

#[test]
fn test_invalid_config_rejected() {
    let err = ResultCache::new(ResultCacheConfig::new().with_max_size(0)).err().unwrap();
    assert!(err.to_string().contains("max_size"));
}
