//! scheduler.rs - Periodic and on-demand refresh of the repository
//!
//! All providers are polled concurrently and joined before one merge, so a
//! refresh takes as long as the slowest source rather than the sum.

use futures_util::future::join_all;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

use crate::error::ProviderError;
use crate::live_feed::LiveFeedClient;
use crate::models::Platform;
use crate::providers::{fallback, MarketProvider, ProviderBatch};
use crate::repository::{MarketRepository, MergeOutcome};

/// Summary of one refresh pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    /// Records delivered per platform this pass
    pub fetched: Vec<(Platform, usize)>,
    pub outcome: MergeOutcome,
    pub seeded_fallback: bool,
    pub feed_started: bool,
}

impl RefreshReport {
    pub fn total_fetched(&self) -> usize {
        self.fetched.iter().map(|(_, n)| n).sum()
    }
}

pub struct IngestionScheduler {
    providers: Vec<Arc<dyn MarketProvider>>,
    repository: Arc<MarketRepository>,
    live_feed: Option<Arc<LiveFeedClient>>,
    request_timeout: Duration,
    refresh_lock: Mutex<()>,
    refresh_count: AtomicU64,
}

impl IngestionScheduler {
    pub fn new(
        providers: Vec<Arc<dyn MarketProvider>>,
        repository: Arc<MarketRepository>,
        request_timeout: Duration,
    ) -> Self {
        IngestionScheduler {
            providers,
            repository,
            live_feed: None,
            request_timeout,
            refresh_lock: Mutex::new(()),
            refresh_count: AtomicU64::new(0),
        }
    }

    /// Start this live feed once the repository holds data
    pub fn with_live_feed(mut self, live_feed: Arc<LiveFeedClient>) -> Self {
        self.live_feed = Some(live_feed);
        self
    }

    /// Completed refresh passes
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::SeqCst)
    }

    /// Unconditional refresh
    pub async fn refresh(&self) -> RefreshReport {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Refresh only when the cache is stale. Concurrent callers wait for the
    /// in-flight refresh instead of starting their own.
    pub async fn refresh_if_stale(&self) -> Option<RefreshReport> {
        if !self.repository.is_stale() {
            return None;
        }

        let _guard = self.refresh_lock.lock().await;
        if !self.repository.is_stale() {
            debug!("Refresh completed by another caller");
            return None;
        }
        Some(self.refresh_locked().await)
    }

    async fn refresh_locked(&self) -> RefreshReport {
        let fetches = self.providers.iter().map(|p| self.fetch_one(p.as_ref()));
        let batches: Vec<ProviderBatch> = join_all(fetches).await;

        let fetched: Vec<(Platform, usize)> =
            batches.iter().map(|b| (b.platform, b.len())).collect();

        let outcome = self.repository.merge(batches);

        let mut seeded_fallback = false;
        if matches!(outcome, MergeOutcome::Retained { .. }) && !self.repository.is_populated() {
            error!("All sources failed on cold start, serving fallback dataset");
            seeded_fallback = self.repository.seed_fallback(fallback::fallback_batches());
        }

        let feed_started = self.maybe_start_feed();
        self.refresh_count.fetch_add(1, Ordering::SeqCst);

        RefreshReport {
            fetched,
            outcome,
            seeded_fallback,
            feed_started,
        }
    }

    /// One provider fetch, bounded by the request timeout. Any failure is
    /// logged and becomes an empty batch.
    async fn fetch_one(&self, provider: &dyn MarketProvider) -> ProviderBatch {
        let platform = provider.platform();

        let error = match tokio::time::timeout(self.request_timeout, provider.fetch_markets()).await
        {
            Ok(Ok(batch)) => return batch,
            Ok(Err(e)) => e,
            Err(_) => ProviderError::Timeout {
                platform,
                timeout: self.request_timeout,
            },
        };

        warn!("{}; using cached data for {}", error, platform);
        ProviderBatch::empty(platform)
    }

    fn maybe_start_feed(&self) -> bool {
        match &self.live_feed {
            Some(feed) if self.repository.is_populated() => feed.start(),
            _ => false,
        }
    }

    /// Refresh every `interval` until `shutdown` flips to true
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!("🔄 Starting refresh loop (interval: {}s)...", interval.as_secs());

        let mut ticker = tokio::time::interval(interval);
        let mut scan_count: u64 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            scan_count += 1;
            let report = self.refresh().await;
            info!(
                "📡 Refresh #{}: {} records fetched, {} cached",
                scan_count,
                report.total_fetched(),
                self.repository.len()
            );

            if scan_count % 10 == 0 {
                info!("📈 Stats: {} refreshes completed", scan_count);
            }
        }

        info!("Refresh loop stopped after {} passes", scan_count);
    }
}
