//! providers - Adapters normalizing each venue's listings into `Market`s
//!
//! Each adapter filters to active listings, clamps prices, classifies the
//! category and builds the slug index later used to route live-feed patches.

use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::ProviderError;
use crate::models::{Market, Platform};

pub mod fallback;
pub mod kalshi;
pub mod polymarket;

pub use kalshi::KalshiProvider;
pub use polymarket::PolymarketProvider;

/// Trait defining the interface for a market listing source
#[async_trait]
pub trait MarketProvider: Send + Sync {
    /// Venue this provider reads from
    fn platform(&self) -> Platform;

    /// Fetch all active listings.
    ///
    /// An `Err` means "no records from this source this cycle"; callers log it
    /// and carry on with what they have.
    async fn fetch_markets(&self) -> Result<ProviderBatch, ProviderError>;
}

/// Normalized output of one provider fetch
#[derive(Debug, Clone)]
pub struct ProviderBatch {
    pub platform: Platform,
    pub markets: Vec<Market>,
    /// Venue-native slug or token id -> canonical market id
    pub slug_index: HashMap<String, String>,
}

impl ProviderBatch {
    pub fn empty(platform: Platform) -> Self {
        ProviderBatch {
            platform,
            markets: Vec::new(),
            slug_index: HashMap::new(),
        }
    }

    /// Add a market and index its slug
    pub fn push(&mut self, market: Market) {
        if !market.slug.is_empty() {
            self.slug_index.insert(market.slug.clone(), market.id.clone());
        }
        self.markets.push(market);
    }

    /// Route an extra venue identifier (e.g. an outcome token id) to a market
    pub fn alias(&mut self, key: &str, market_id: &str) {
        if !key.is_empty() {
            self.slug_index.insert(key.to_string(), market_id.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}

// ============================================================================
// Wire parsing helpers shared by the adapters
// ============================================================================

/// Read a decimal from a JSON number or numeric string
pub(crate) fn decimal_from_value(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Read a non-negative whole volume from a JSON number or numeric string
pub(crate) fn volume_from_value(value: &Value) -> u64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| v.floor() as u64)
        .unwrap_or(0)
}

/// Venues encode lists either as JSON arrays or as JSON strings holding an array
pub(crate) fn string_list(value: &Value) -> Vec<String> {
    let items = match value {
        Value::Array(arr) => arr.clone(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(arr)) => arr,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect()
}

/// Date part of an ISO timestamp ("2026-11-03T12:00:00Z" -> "2026-11-03")
pub(crate) fn iso_date(raw: Option<&str>) -> String {
    match raw {
        Some(s) if s.len() >= 10 && s.is_char_boundary(10) => s[..10].to_string(),
        Some(s) => s.to_string(),
        None => String::new(),
    }
}

/// A quoted probability, or `None` when it lies outside `[0, 1]`. Values at
/// the edges are kept and clamped later; anything beyond is corrupt data.
pub(crate) fn unit_price(price: Decimal) -> Option<Decimal> {
    (Decimal::ZERO..=Decimal::ONE).contains(&price).then_some(price)
}

/// Mid of a bid/ask pair when both sides are quoted
pub(crate) fn mid(bid: Option<Decimal>, ask: Option<Decimal>) -> Option<Decimal> {
    match (bid, ask) {
        (Some(b), Some(a)) if b > Decimal::ZERO && a > Decimal::ZERO => {
            Some((b + a) / Decimal::TWO)
        }
        _ => None,
    }
}

// ============================================================================
// MockProvider - For testing purposes
// ============================================================================

/// How a `MockProvider` answers `fetch_markets`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    Serve,
    Fail,
    /// Never answers within any sane timeout
    Hang,
}

/// In-memory provider for tests and offline development
#[derive(Debug)]
pub struct MockProvider {
    platform: Platform,
    markets: Mutex<Vec<Market>>,
    aliases: Vec<(String, String)>,
    behavior: Mutex<MockBehavior>,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(platform: Platform, markets: Vec<Market>) -> Self {
        MockProvider {
            platform,
            markets: Mutex::new(markets),
            aliases: Vec::new(),
            behavior: Mutex::new(MockBehavior::Serve),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(platform: Platform) -> Self {
        let provider = Self::new(platform, Vec::new());
        provider.set_behavior(MockBehavior::Fail);
        provider
    }

    pub fn hanging(platform: Platform) -> Self {
        let provider = Self::new(platform, Vec::new());
        provider.set_behavior(MockBehavior::Hang);
        provider
    }

    /// Route an additional slug to a market id
    pub fn with_alias(mut self, slug: &str, market_id: &str) -> Self {
        self.aliases.push((slug.to_string(), market_id.to_string()));
        self
    }

    pub fn set_markets(&self, markets: Vec<Market>) {
        *self.markets.lock() = markets;
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Number of fetches served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketProvider for MockProvider {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn fetch_markets(&self) -> Result<ProviderBatch, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.behavior.lock();

        match behavior {
            MockBehavior::Serve => {
                let mut batch = ProviderBatch::empty(self.platform);
                for market in self.markets.lock().iter().cloned() {
                    batch.push(market);
                }
                for (slug, id) in &self.aliases {
                    batch.alias(slug, id);
                }
                debug!("MockProvider {} served {} markets", self.platform, batch.len());
                Ok(batch)
            }
            MockBehavior::Fail => Err(ProviderError::Unavailable {
                platform: self.platform,
                message: "mock failure".to_string(),
            }),
            MockBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(ProviderBatch::empty(self.platform))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_decimal_from_value() {
        assert_eq!(decimal_from_value(&json!("0.42")), Some(dec!(0.42)));
        assert_eq!(decimal_from_value(&json!(0.35)), Some(dec!(0.35)));
        assert_eq!(decimal_from_value(&json!("abc")), None);
        assert_eq!(decimal_from_value(&json!(null)), None);
    }

    #[test]
    fn test_volume_from_value() {
        assert_eq!(volume_from_value(&json!("12345.67")), 12345);
        assert_eq!(volume_from_value(&json!(900)), 900);
        assert_eq!(volume_from_value(&json!(-4)), 0);
        assert_eq!(volume_from_value(&json!(null)), 0);
    }

    #[test]
    fn test_string_list_accepts_both_encodings() {
        assert_eq!(string_list(&json!(["0.4", "0.6"])), vec!["0.4", "0.6"]);
        assert_eq!(string_list(&json!("[\"0.4\", \"0.6\"]")), vec!["0.4", "0.6"]);
        assert!(string_list(&json!("not a list")).is_empty());
    }

    #[test]
    fn test_iso_date_and_mid() {
        assert_eq!(iso_date(Some("2026-11-03T12:00:00Z")), "2026-11-03");
        assert_eq!(iso_date(None), "");
        assert_eq!(mid(Some(dec!(0.40)), Some(dec!(0.44))), Some(dec!(0.42)));
        assert_eq!(mid(Some(dec!(0)), Some(dec!(0.44))), None);
    }

    #[test]
    fn test_unit_price() {
        assert_eq!(unit_price(dec!(0)), Some(dec!(0)));
        assert_eq!(unit_price(dec!(1)), Some(dec!(1)));
        assert_eq!(unit_price(dec!(0.42)), Some(dec!(0.42)));
        assert_eq!(unit_price(dec!(1.7)), None);
        assert_eq!(unit_price(dec!(-0.7)), None);
    }

    #[tokio::test]
    async fn test_mock_provider_serves_and_indexes() {
        let market = Market::new(
            Platform::Polymarket, "btc-150k", "btc-150k", "Will BTC hit $150k?", "",
            Category::Crypto, dec!(0.42), None, 1000, "",
        );
        let provider = MockProvider::new(Platform::Polymarket, vec![market])
            .with_alias("token-123", "polymarket:btc-150k");

        let batch = provider.fetch_markets().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.slug_index.get("btc-150k").map(String::as_str), Some("polymarket:btc-150k"));
        assert_eq!(batch.slug_index.get("token-123").map(String::as_str), Some("polymarket:btc-150k"));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_provider_failure() {
        let provider = MockProvider::failing(Platform::Kalshi);
        assert!(provider.fetch_markets().await.is_err());
    }
}
