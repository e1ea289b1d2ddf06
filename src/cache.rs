//! Gauge Metadata Cache
//!
//! Serves the gauge list from memory while it is younger than the TTL.
//! Refreshes try each source in order (local snapshot, then the Curve API)
//! and keep the previous payload when all of them fail.
//!
//! Hits only take the read lock. One caller at a time refreshes, under
//! `refresh_lock`. While a refresh is running, callers that can be served
//! the previous payload get it immediately; the rest wait for that refresh
//! and take its result instead of fetching again.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::metadata::{GaugeMetadata, MetadataSource, SourceTag};

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Arc<GaugeMetadata>,
    fetched_at: Instant,
    source: SourceTag,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.source != SourceTag::Stale && self.fetched_at.elapsed() < ttl
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub age_secs: Option<u64>,
    pub source: Option<SourceTag>,
    pub ttl_secs: u64,
    pub has_data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshResult {
    pub success: bool,
    pub source: Option<SourceTag>,
    pub elapsed_ms: u64,
}

pub struct MetadataCache {
    sources: Vec<Arc<dyn MetadataSource>>,
    ttl: Duration,
    entry: RwLock<Option<CacheEntry>>,
    refresh_lock: Mutex<()>,
    /// Completed refresh attempts, successful or not.
    attempts: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MetadataCache {
    /// `sources` are tried in order on every refresh.
    pub fn new(sources: Vec<Arc<dyn MetadataSource>>, ttl: Duration) -> Self {
        Self {
            sources,
            ttl,
            entry: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            attempts: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Fresh payload if there is one.
    async fn fresh(&self) -> Option<Arc<GaugeMetadata>> {
        let entry = self.entry.read().await;
        entry
            .as_ref()
            .filter(|e| e.is_fresh(self.ttl))
            .map(|e| e.payload.clone())
    }

    /// Payload regardless of age.
    async fn current(&self) -> Option<Arc<GaugeMetadata>> {
        self.entry.read().await.as_ref().map(|e| e.payload.clone())
    }

    fn record(&self, payload: &Option<Arc<GaugeMetadata>>) {
        let counter = if payload.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Current gauge list; `None` only if no source has ever succeeded.
    pub async fn get(&self) -> Option<Arc<GaugeMetadata>> {
        let seen = self.attempts.load(Ordering::Acquire);

        if let Some(payload) = self.fresh().await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!("Gauge metadata cache hit");
            return Some(payload);
        }

        let _guard = match self.refresh_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                // Refresh in flight: serve the previous payload rather than queue
                if let Some(payload) = self.current().await {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!("Refresh in progress, serving previous gauge metadata");
                    return Some(payload);
                }
                self.refresh_lock.lock().await
            }
        };

        // Someone else refreshed (or failed to) while we waited
        if self.attempts.load(Ordering::Acquire) != seen {
            let payload = self.current().await;
            self.record(&payload);
            return payload;
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.refresh_locked().await;
        self.current().await
    }

    /// Refresh regardless of age.
    pub async fn force_refresh(&self) -> RefreshResult {
        let start = std::time::Instant::now();
        let _guard = self.refresh_lock.lock().await;
        let source = self.refresh_locked().await;

        RefreshResult {
            success: source.is_some(),
            source,
            elapsed_ms: start.elapsed().as_millis() as u64,
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let entry = self.entry.read().await;
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            age_secs: entry.as_ref().map(|e| e.fetched_at.elapsed().as_secs()),
            source: entry.as_ref().map(|e| e.source),
            ttl_secs: self.ttl.as_secs(),
            has_data: entry.is_some(),
        }
    }

    /// Drop the payload and reset the counters.
    pub async fn clear(&self) {
        let _guard = self.refresh_lock.lock().await;
        *self.entry.write().await = None;
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        info!("Gauge metadata cache cleared");
    }

    /// Walk the sources; caller holds `refresh_lock`.
    async fn refresh_locked(&self) -> Option<SourceTag> {
        let source = self.try_sources().await;
        self.attempts.fetch_add(1, Ordering::Release);
        source
    }

    async fn try_sources(&self) -> Option<SourceTag> {
        for source in &self.sources {
            match source.fetch().await {
                Ok(metadata) => {
                    info!(
                        "Gauge metadata refreshed from {} ({} gauges)",
                        source.tag(),
                        metadata.gauge_count()
                    );
                    *self.entry.write().await = Some(CacheEntry {
                        payload: Arc::new(metadata),
                        fetched_at: Instant::now(),
                        source: source.tag(),
                    });
                    return Some(source.tag());
                }
                Err(e) => warn!("Gauge metadata source {} failed: {}", source.tag(), e),
            }
        }

        // Keep the last good payload and its timestamp; the next call retries
        let mut entry = self.entry.write().await;
        match entry.as_mut() {
            Some(stale) => {
                warn!("All gauge metadata sources failed, serving stale data");
                stale.source = SourceTag::Stale;
            }
            None => debug!("All gauge metadata sources failed and nothing is cached"),
        }
        None
    }
}

// ============================================
// TESTS
// ============================================
