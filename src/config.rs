//! config.rs - Runtime configuration for the aggregator
//!
//! Every value has a default; `from_env` overrides them from `AGGREGATOR_*`
//! environment variables.

use anyhow::{anyhow, Result};
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_POLYMARKET_API_URL: &str = "https://gamma-api.polymarket.com";
pub const DEFAULT_KALSHI_API_URL: &str = "https://api.elections.kalshi.com/trade-api/v2";
pub const DEFAULT_FEED_URL: &str = "wss://ws-live-data.polymarket.com";

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    // Providers
    pub polymarket_api_url: String,
    pub kalshi_api_url: String,
    pub page_limit: usize,
    pub request_timeout: Duration,

    // Cache
    pub cache_ttl: Duration,
    pub poll_interval: Duration,

    // Live feed
    pub feed_enabled: bool,
    pub feed: FeedConfig,

    // Matching and spreads
    pub matcher: MatcherConfig,
    pub spread: SpreadConfig,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: String,
    pub reconnect_base_delay: Duration,
    pub max_reconnect_attempts: u32,
    pub heartbeat_interval: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct MatcherConfig {
    /// Minimum similarity for a candidate to be considered at all
    pub candidate_threshold: f64,
    /// Minimum similarity for the best candidate to be accepted
    pub accept_threshold: f64,
}

#[derive(Debug, Clone)]
pub struct SpreadConfig {
    /// Cross-source spreads below this many percentage points are noise
    pub min_spread_percent: Decimal,
    /// Book deviation (percentage points) above which a market is reported
    pub internal_threshold_percent: Decimal,
    pub max_results: usize,
    /// Include the curated reference set when fewer live spreads than this were found
    pub reference_fill_below: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            reconnect_base_delay: Duration::from_secs(5),
            max_reconnect_attempts: 5,
            heartbeat_interval: Duration::from_secs(10),
        }
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            candidate_threshold: 0.3,
            accept_threshold: 0.4,
        }
    }
}

impl Default for SpreadConfig {
    fn default() -> Self {
        Self {
            min_spread_percent: Decimal::from(2),
            internal_threshold_percent: Decimal::from(5),
            max_results: 20,
            reference_fill_below: 3,
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            polymarket_api_url: DEFAULT_POLYMARKET_API_URL.to_string(),
            kalshi_api_url: DEFAULT_KALSHI_API_URL.to_string(),
            page_limit: 200,
            request_timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(60),
            poll_interval: Duration::from_secs(60),
            feed_enabled: true,
            feed: FeedConfig::default(),
            matcher: MatcherConfig::default(),
            spread: SpreadConfig::default(),
        }
    }
}

impl AggregatorConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let matcher = MatcherConfig {
            candidate_threshold: parse_f64(
                "AGGREGATOR_MATCH_CANDIDATE_THRESHOLD",
                defaults.matcher.candidate_threshold,
            )?,
            accept_threshold: parse_f64(
                "AGGREGATOR_MATCH_ACCEPT_THRESHOLD",
                defaults.matcher.accept_threshold,
            )?,
        };

        if !(0.0..=1.0).contains(&matcher.candidate_threshold)
            || !(0.0..=1.0).contains(&matcher.accept_threshold)
        {
            return Err(anyhow!("Match thresholds must be between 0 and 1"));
        }
        if matcher.accept_threshold < matcher.candidate_threshold {
            return Err(anyhow!(
                "AGGREGATOR_MATCH_ACCEPT_THRESHOLD must be >= AGGREGATOR_MATCH_CANDIDATE_THRESHOLD"
            ));
        }

        let spread = SpreadConfig {
            min_spread_percent: parse_decimal(
                "AGGREGATOR_MIN_SPREAD_PCT",
                defaults.spread.min_spread_percent,
            )?,
            internal_threshold_percent: parse_decimal(
                "AGGREGATOR_INTERNAL_SPREAD_PCT",
                defaults.spread.internal_threshold_percent,
            )?,
            max_results: parse_u64("AGGREGATOR_MAX_SPREADS", defaults.spread.max_results as u64)?
                as usize,
            reference_fill_below: parse_u64(
                "AGGREGATOR_REFERENCE_FILL_BELOW",
                defaults.spread.reference_fill_below as u64,
            )? as usize,
        };

        if spread.max_results == 0 {
            return Err(anyhow!("AGGREGATOR_MAX_SPREADS must be > 0"));
        }

        let feed = FeedConfig {
            url: env::var("AGGREGATOR_FEED_URL").unwrap_or(defaults.feed.url),
            reconnect_base_delay: Duration::from_millis(parse_u64(
                "AGGREGATOR_FEED_RECONNECT_DELAY_MS",
                defaults.feed.reconnect_base_delay.as_millis() as u64,
            )?),
            max_reconnect_attempts: parse_u64(
                "AGGREGATOR_FEED_MAX_RECONNECTS",
                defaults.feed.max_reconnect_attempts as u64,
            )? as u32,
            heartbeat_interval: Duration::from_secs(parse_u64(
                "AGGREGATOR_FEED_HEARTBEAT_SECS",
                defaults.feed.heartbeat_interval.as_secs(),
            )?),
        };

        if feed.heartbeat_interval.is_zero() {
            return Err(anyhow!("AGGREGATOR_FEED_HEARTBEAT_SECS must be > 0"));
        }

        let poll_interval = Duration::from_secs(parse_u64(
            "AGGREGATOR_POLL_INTERVAL_SECS",
            defaults.poll_interval.as_secs(),
        )?);
        if poll_interval.is_zero() {
            return Err(anyhow!("AGGREGATOR_POLL_INTERVAL_SECS must be > 0"));
        }

        let cache_ttl = Duration::from_secs(parse_u64(
            "AGGREGATOR_CACHE_TTL_SECS",
            defaults.cache_ttl.as_secs(),
        )?);
        if cache_ttl.is_zero() {
            return Err(anyhow!("AGGREGATOR_CACHE_TTL_SECS must be > 0"));
        }

        Ok(Self {
            polymarket_api_url: env::var("AGGREGATOR_POLYMARKET_API_URL")
                .unwrap_or(defaults.polymarket_api_url),
            kalshi_api_url: env::var("AGGREGATOR_KALSHI_API_URL")
                .unwrap_or(defaults.kalshi_api_url),
            page_limit: parse_u64("AGGREGATOR_PAGE_LIMIT", defaults.page_limit as u64)? as usize,
            request_timeout: Duration::from_secs(parse_u64(
                "AGGREGATOR_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            cache_ttl,
            poll_interval,
            feed_enabled: parse_bool("AGGREGATOR_FEED_ENABLED", defaults.feed_enabled)?,
            feed,
            matcher,
            spread,
        })
    }
}

fn parse_f64(key: &str, default: f64) -> Result<f64> {
    match env::var(key) {
        Ok(v) => v
            .parse::<f64>()
            .map_err(|e| anyhow!("Invalid {}: {} ({})", key, v, e)),
        Err(_) => Ok(default),
    }
}

fn parse_u64(key: &str, default: u64) -> Result<u64> {
    match env::var(key) {
        Ok(v) => v
            .parse::<u64>()
            .map_err(|e| anyhow!("Invalid {}: {} ({})", key, v, e)),
        Err(_) => Ok(default),
    }
}

fn parse_decimal(key: &str, default: Decimal) -> Result<Decimal> {
    match env::var(key) {
        Ok(v) => Decimal::from_str(&v).map_err(|e| anyhow!("Invalid {}: {} ({})", key, v, e)),
        Err(_) => Ok(default),
    }
}

fn parse_bool(key: &str, default: bool) -> Result<bool> {
    match env::var(key) {
        Ok(v) => match v.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(anyhow!("Invalid {}: {}", key, v)),
        },
        Err(_) => Ok(default),
    }
}
