//! aggregator.rs - Public facade over the repository, scheduler and detector

use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::AggregatorConfig;
use crate::live_feed::{ConnectionState, LiveFeedClient};
use crate::matcher::MarketMatcher;
use crate::models::{Market, SpreadOpportunity};
use crate::providers::{KalshiProvider, MarketProvider, PolymarketProvider};
use crate::repository::MarketRepository;
use crate::scheduler::{IngestionScheduler, RefreshReport};
use crate::spread::SpreadDetector;

pub struct MarketAggregator {
    repository: Arc<MarketRepository>,
    scheduler: Arc<IngestionScheduler>,
    detector: SpreadDetector,
    live_feed: Option<Arc<LiveFeedClient>>,
    poll_interval: Duration,
    shutdown_tx: watch::Sender<bool>,
}

impl MarketAggregator {
    /// Wire the production Polymarket and Kalshi adapters
    pub fn from_config(config: &AggregatorConfig) -> Self {
        let providers: Vec<Arc<dyn MarketProvider>> = vec![
            Arc::new(PolymarketProvider::new(
                &config.polymarket_api_url,
                config.page_limit,
                config.request_timeout,
            )),
            Arc::new(KalshiProvider::new(
                &config.kalshi_api_url,
                config.page_limit,
                config.request_timeout,
            )),
        ];
        Self::new(config, providers)
    }

    /// Build over arbitrary providers (tests, offline runs)
    pub fn new(config: &AggregatorConfig, providers: Vec<Arc<dyn MarketProvider>>) -> Self {
        let repository = Arc::new(MarketRepository::new(config.cache_ttl));

        let live_feed = if config.feed_enabled {
            Some(Arc::new(LiveFeedClient::new(
                config.feed.clone(),
                repository.clone(),
            )))
        } else {
            None
        };

        let mut scheduler =
            IngestionScheduler::new(providers, repository.clone(), config.request_timeout);
        if let Some(feed) = &live_feed {
            scheduler = scheduler.with_live_feed(feed.clone());
        }

        let detector = SpreadDetector::new(
            MarketMatcher::new(config.matcher),
            config.spread.clone(),
        );
        let (shutdown_tx, _) = watch::channel(false);

        MarketAggregator {
            repository,
            scheduler: Arc::new(scheduler),
            detector,
            live_feed,
            poll_interval: config.poll_interval,
            shutdown_tx,
        }
    }

    /// All cached markets, refreshed first if stale. Highest volume first.
    pub async fn get_all_markets(&self) -> Vec<Market> {
        self.scheduler.refresh_if_stale().await;

        let mut markets = self.repository.get_all();
        markets.sort_by(|a, b| b.volume.cmp(&a.volume).then_with(|| a.id.cmp(&b.id)));
        markets
    }

    pub async fn get_market_by_id(&self, id: &str) -> Option<Market> {
        self.scheduler.refresh_if_stale().await;
        self.repository.get_by_id(id)
    }

    /// Ranked spreads over the current snapshot
    pub async fn detect_spread_opportunities(&self) -> Vec<SpreadOpportunity> {
        self.scheduler.refresh_if_stale().await;
        let snapshot = self.repository.snapshot();
        self.detector.detect(&snapshot)
    }

    /// Force a refresh regardless of cache age
    pub async fn refresh(&self) -> RefreshReport {
        self.scheduler.refresh().await
    }

    /// Spawn the background poll loop. Its first pass runs immediately.
    pub fn start(&self) -> JoinHandle<()> {
        let scheduler = self.scheduler.clone();
        let interval = self.poll_interval;
        let shutdown = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            scheduler.run(interval, shutdown).await;
        })
    }

    /// Stop the poll loop and the live feed
    pub fn shutdown(&self) {
        info!("Shutting down aggregator");
        self.shutdown_tx.send_replace(true);
        if let Some(feed) = &self.live_feed {
            feed.shutdown();
        }
    }

    pub fn repository(&self) -> Arc<MarketRepository> {
        self.repository.clone()
    }

    pub fn live_feed(&self) -> Option<Arc<LiveFeedClient>> {
        self.live_feed.clone()
    }

    /// None when the feed is disabled
    pub fn live_feed_state(&self) -> Option<ConnectionState> {
        self.live_feed.as_ref().map(|f| f.state())
    }
}
