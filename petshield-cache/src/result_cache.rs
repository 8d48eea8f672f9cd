//! Bounded, versioned cache of sanitization results.

use crate::bus::{InvalidationAction, InvalidationBus, InvalidationEvent};
use crate::config::ResultCacheConfig;
use crate::error::CacheResult;
use crate::key::{CacheKey, CacheOptions, options_hash};
use crate::stats::{CacheStats, Counters};
use futures::StreamExt;
use parking_lot::Mutex;
use petshield_policy::ContentType;
use petshield_xss::SanitizedResult;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// A cached result and its access metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub result: SanitizedResult,
    pub content_type: ContentType,
    pub options_hash: String,
    pub created_at: Instant,
    pub last_accessed_at: Instant,
    pub access_count: u64,
    /// Monotonic access order; breaks ties between equal timestamps
    access_seq: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant, ttl: std::time::Duration) -> bool {
        now.saturating_duration_since(self.created_at) > ttl
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    next_seq: u64,
}

impl CacheState {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Remove the least recently accessed entry.
    fn evict_lru(&mut self) -> Option<String> {
        let key = self
            .entries
            .iter()
            .min_by_key(|(_, e)| (e.last_accessed_at, e.access_seq))
            .map(|(k, _)| k.clone())?;
        self.entries.remove(&key);
        Some(key)
    }
}

/// Cache of [`SanitizedResult`]s keyed by content, options, content type and
/// configuration version.
///
/// The cache is advisory: lookups and writes never fail, any internal fault
/// is treated as a miss. One mutex guards the entry map; background tasks
/// take the same lock in bounded batches.
pub struct ResultCache {
    config: ResultCacheConfig,
    state: Mutex<CacheState>,
    version: AtomicU64,
    counters: Counters,
    bus: Option<Arc<dyn InvalidationBus>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ResultCache {
    /// Create a cache without an invalidation bus.
    pub fn new(config: ResultCacheConfig) -> CacheResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: Mutex::new(CacheState::default()),
            version: AtomicU64::new(1),
            counters: Counters::default(),
            bus: None,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Attach an invalidation bus.
    pub fn with_bus(mut self, bus: Arc<dyn InvalidationBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn config(&self) -> &ResultCacheConfig {
        &self.config
    }

    pub fn instance_id(&self) -> &str {
        &self.config.instance_id
    }

    /// Current configuration version.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.len(), self.version())
    }

    fn key_for(
        content: &str,
        options: &CacheOptions,
        content_type: ContentType,
        version: u64,
    ) -> CacheResult<(String, String)> {
        let hash = options_hash(options)?;
        let key = CacheKey::new(content_type, content, hash.clone(), version).to_string();
        Ok((key, hash))
    }

    /// Look up a result. Expired entries are removed and count as a miss.
    pub fn get(
        &self,
        content: &str,
        options: &CacheOptions,
        content_type: ContentType,
    ) -> Option<SanitizedResult> {
        let key = match Self::key_for(content, options, content_type, self.version()) {
            Ok((key, _)) => key,
            Err(e) => {
                debug!(error = %e, "Cache key derivation failed, treating as miss");
                self.counters.miss();
                return None;
            }
        };

        let now = Instant::now();
        let mut state = self.state.lock();

        match state
            .entries
            .get(&key)
            .map(|e| e.is_expired(now, self.config.ttl))
        {
            None => {
                drop(state);
                self.counters.miss();
                trace!(content_type = %content_type, "Cache miss");
                return None;
            }
            Some(true) => {
                state.entries.remove(&key);
                drop(state);
                self.counters.miss();
                self.counters.expired(1);
                trace!(content_type = %content_type, "Cache entry expired");
                return None;
            }
            Some(false) => {}
        }

        let seq = state.next_seq();
        let entry = state.entries.get_mut(&key)?;
        entry.last_accessed_at = now;
        entry.access_count += 1;
        entry.access_seq = seq;
        let result = entry.result.clone();
        drop(state);

        self.counters.hit();
        trace!(content_type = %content_type, "Cache hit");
        Some(result)
    }

    /// Store a result, evicting the least recently accessed entry when full.
    pub fn set(
        &self,
        content: &str,
        options: &CacheOptions,
        content_type: ContentType,
        result: SanitizedResult,
    ) {
        self.set_at_version(content, options, content_type, result, self.version());
    }

    /// Store a result under the version observed before it was computed.
    ///
    /// If the version was bumped in the meantime the result could never be
    /// served, so it is dropped without touching the map.
    pub fn set_at_version(
        &self,
        content: &str,
        options: &CacheOptions,
        content_type: ContentType,
        result: SanitizedResult,
        version: u64,
    ) {
        let current = self.version();
        if version < current {
            trace!(
                content_type = %content_type,
                observed = version,
                current = current,
                "Skipping cache write for stale version"
            );
            return;
        }

        let (key, options_hash) = match Self::key_for(content, options, content_type, version) {
            Ok(pair) => pair,
            Err(e) => {
                debug!(error = %e, "Cache key derivation failed, skipping write");
                return;
            }
        };

        let now = Instant::now();
        let mut state = self.state.lock();

        let mut evicted = None;
        if !state.entries.contains_key(&key) && state.entries.len() >= self.config.max_size {
            evicted = state.evict_lru();
        }

        let seq = state.next_seq();
        state.entries.insert(
            key,
            CacheEntry {
                result,
                content_type,
                options_hash,
                created_at: now,
                last_accessed_at: now,
                access_count: 0,
                access_seq: seq,
            },
        );
        drop(state);

        if let Some(evicted) = evicted {
            self.counters.evicted();
            debug!(key = %evicted, "Evicted least recently used entry");
        }
    }

    /// Remove every entry of one content type and tell other instances.
    pub async fn invalidate_by_content_type(&self, content_type: ContentType) -> usize {
        let removed = self.remove_content_type(content_type);
        info!(
            content_type = %content_type,
            removed = removed,
            "Invalidated cache entries by content type"
        );
        self.publish(InvalidationEvent::content_type(
            self.instance_id(),
            content_type,
        ))
        .await;
        removed
    }

    /// Remove every entry and tell other instances.
    pub async fn clear(&self) -> usize {
        let removed = self.remove_all();
        info!(removed = removed, "Cleared result cache");
        self.publish(InvalidationEvent::clear(self.instance_id())).await;
        removed
    }

    /// Increment the configuration version and tell other instances.
    ///
    /// Entries stored under older versions become unreachable and are
    /// reclaimed by expiry.
    pub async fn bump_version(&self) -> u64 {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        info!(version = version, "Bumped cache configuration version");
        self.publish(InvalidationEvent::bump_version(self.instance_id(), version))
            .await;
        version
    }

    /// Apply an event received from the bus.
    ///
    /// Events that originated here are ignored. Returns whether the event
    /// was applied.
    pub fn apply_remote(&self, event: &InvalidationEvent) -> bool {
        if event.origin_instance_id == self.config.instance_id {
            return false;
        }

        match event.action {
            InvalidationAction::Clear => {
                let removed = self.remove_all();
                info!(
                    origin = %event.origin_instance_id,
                    removed = removed,
                    "Applied remote cache clear"
                );
            }
            InvalidationAction::InvalidateByContentType => {
                let Some(content_type) = event.params.content_type else {
                    warn!(origin = %event.origin_instance_id, "Invalidation event without content type");
                    return false;
                };
                let removed = self.remove_content_type(content_type);
                info!(
                    origin = %event.origin_instance_id,
                    content_type = %content_type,
                    removed = removed,
                    "Applied remote content type invalidation"
                );
            }
            InvalidationAction::BumpVersion => {
                let remote = event.params.version.unwrap_or(0);
                let previous = self
                    .version
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |local| {
                        Some((local + 1).max(remote))
                    })
                    .unwrap_or_else(|v| v);
                info!(
                    origin = %event.origin_instance_id,
                    remote_version = remote,
                    version = (previous + 1).max(remote),
                    "Applied remote version bump"
                );
            }
        }
        true
    }

    /// Remove every expired entry, locking at most `cleanup_batch_size`
    /// entries at a time.
    pub async fn sweep_expired(&self) -> usize {
        let keys: Vec<String> = self.state.lock().entries.keys().cloned().collect();
        let ttl = self.config.ttl;
        let mut removed = 0;

        for batch in keys.chunks(self.config.cleanup_batch_size) {
            {
                let now = Instant::now();
                let mut state = self.state.lock();
                for key in batch {
                    if state
                        .entries
                        .get(key)
                        .is_some_and(|e| e.is_expired(now, ttl))
                    {
                        state.entries.remove(key);
                        removed += 1;
                    }
                }
            }
            tokio::task::yield_now().await;
        }

        if removed > 0 {
            self.counters.expired(removed as u64);
            debug!(removed = removed, "Swept expired cache entries");
        }
        removed
    }

    /// Spawn the expiry sweep and, when a bus is attached, the invalidation
    /// subscriber. Calling it again while running does nothing.
    ///
    /// A subscription failure leaves this instance relying on TTL expiry
    /// for remote changes.
    pub async fn start(self: &Arc<Self>) {
        if self.is_running() {
            return;
        }

        let mut tasks = Vec::new();

        let weak = Arc::downgrade(self);
        tasks.push(tokio::spawn(sweep_loop(weak, self.config.cleanup_interval)));

        if let Some(bus) = &self.bus {
            match bus.subscribe().await {
                Ok(stream) => {
                    let weak = Arc::downgrade(self);
                    tasks.push(tokio::spawn(async move {
                        let mut stream = stream;
                        while let Some(event) = stream.next().await {
                            let Some(cache) = weak.upgrade() else { break };
                            cache.apply_remote(&event);
                        }
                        debug!("Invalidation subscriber stopped");
                    }));
                }
                Err(e) => {
                    warn!(error = %e, "Failed to subscribe to invalidation bus");
                }
            }
        }

        info!(instance_id = %self.config.instance_id, "Result cache started");
        self.tasks.lock().extend(tasks);
    }

    /// Abort the background tasks.
    pub fn stop(&self) {
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        if tasks.is_empty() {
            return;
        }
        for task in tasks {
            task.abort();
        }
        info!(instance_id = %self.config.instance_id, "Result cache stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.lock().is_empty()
    }

    fn remove_content_type(&self, content_type: ContentType) -> usize {
        let mut state = self.state.lock();
        let before = state.entries.len();
        state.entries.retain(|_, e| e.content_type != content_type);
        before - state.entries.len()
    }

    fn remove_all(&self) -> usize {
        let mut state = self.state.lock();
        let removed = state.entries.len();
        state.entries.clear();
        removed
    }

    async fn publish(&self, event: InvalidationEvent) {
        let Some(bus) = &self.bus else { return };
        if let Err(e) = bus.publish(&event).await {
            warn!(
                error = %e,
                action = event.action.as_str(),
                "Failed to publish cache invalidation"
            );
        }
    }
}

impl Drop for ResultCache {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

async fn sweep_loop(cache: Weak<ResultCache>, period: std::time::Duration) {
    let mut ticker = tokio::time::interval(period);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(cache) = cache.upgrade() else { break };
        cache.sweep_expired().await;
    }
}
