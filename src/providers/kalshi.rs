//! kalshi.rs - Kalshi trade-api adapter (source B)
//!
//! Kalshi quotes in cents. YES is the mid of `yes_bid`/`yes_ask` (falling back
//! to `last_price`); NO is the mid of `no_bid`/`no_ask` when both are quoted.

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::{decimal_from_value, iso_date, mid, unit_price, volume_from_value};
use super::{MarketProvider, ProviderBatch};
use crate::category;
use crate::error::ProviderError;
use crate::models::{Market, Platform};

#[derive(Debug, Deserialize)]
struct KalshiMarketsResponse {
    #[serde(default)]
    markets: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct KalshiMarket {
    ticker: String,
    title: Option<String>,
    subtitle: Option<String>,
    rules_primary: Option<String>,
    status: Option<String>,
    yes_bid: Option<Value>,
    yes_ask: Option<Value>,
    no_bid: Option<Value>,
    no_ask: Option<Value>,
    last_price: Option<Value>,
    volume: Option<Value>,
    close_time: Option<String>,
}

/// Listing adapter for the Kalshi trade API
#[derive(Debug, Clone)]
pub struct KalshiProvider {
    client: Client,
    base_url: String,
    limit: usize,
}

impl KalshiProvider {
    pub fn new(base_url: &str, limit: usize, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        KalshiProvider {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            limit,
        }
    }

    fn normalize(raw: Vec<Value>) -> ProviderBatch {
        let mut batch = ProviderBatch::empty(Platform::Kalshi);
        let mut skipped = 0usize;

        for value in raw {
            let converted = serde_json::from_value::<KalshiMarket>(value)
                .ok()
                .and_then(|record| Self::convert(&record));

            match converted {
                Some(market) => batch.push(market),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            debug!("Skipped {} Kalshi records", skipped);
        }
        batch
    }

    fn convert(record: &KalshiMarket) -> Option<Market> {
        let status = record.status.as_deref().unwrap_or("active");
        if !matches!(status, "active" | "open") || record.ticker.is_empty() {
            return None;
        }

        let title = record.title.as_deref().filter(|t| !t.is_empty())?;
        let description = record
            .rules_primary
            .as_deref()
            .or(record.subtitle.as_deref())
            .unwrap_or_default();

        let yes_price = mid(cents(&record.yes_bid), cents(&record.yes_ask))
            .or_else(|| cents(&record.last_price).filter(|p| *p > Decimal::ZERO))?;
        let yes_price = unit_price(yes_price)?;
        let no_price = match mid(cents(&record.no_bid), cents(&record.no_ask)) {
            Some(no) => Some(unit_price(no)?),
            None => None,
        };

        Some(Market::new(
            Platform::Kalshi,
            &record.ticker,
            &record.ticker,
            title,
            description,
            category::classify(title, description),
            yes_price,
            no_price,
            record.volume.as_ref().map(volume_from_value).unwrap_or(0),
            &iso_date(record.close_time.as_deref()),
        ))
    }
}

/// Cents field -> probability price
fn cents(value: &Option<Value>) -> Option<Decimal> {
    value
        .as_ref()
        .and_then(decimal_from_value)
        .map(|c| c / Decimal::ONE_HUNDRED)
}

#[async_trait]
impl MarketProvider for KalshiProvider {
    fn platform(&self) -> Platform {
        Platform::Kalshi
    }

    async fn fetch_markets(&self) -> Result<ProviderBatch, ProviderError> {
        let url = format!("{}/markets", self.base_url);
        let params = [("status", "open".to_string()), ("limit", self.limit.to_string())];

        debug!("Fetching from: {}", url);

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                platform: Platform::Kalshi,
                source,
            })?;

        if !response.status().is_success() {
            warn!("Kalshi returned status {}", response.status());
            return Err(ProviderError::Status {
                platform: Platform::Kalshi,
                status: response.status().as_u16(),
            });
        }

        let data: KalshiMarketsResponse =
            response.json().await.map_err(|e| ProviderError::Decode {
                platform: Platform::Kalshi,
                message: e.to_string(),
            })?;

        let fetched = data.markets.len();
        let batch = Self::normalize(data.markets);
        info!("Kalshi: {} of {} listings usable", batch.len(), fetched);
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_normalize_mid_of_cents() {
        let raw = vec![json!({
            "ticker": "KXBTC-26DEC31-150K",
            "title": "Bitcoin to exceed $150,000",
            "status": "active",
            "yes_bid": 34,
            "yes_ask": 36,
            "no_bid": 64,
            "no_ask": 66,
            "volume": 48210,
            "close_time": "2026-12-31T23:59:00Z"
        })];

        let batch = KalshiProvider::normalize(raw);
        assert_eq!(batch.len(), 1);

        let m = &batch.markets[0];
        assert_eq!(m.id, "kalshi:KXBTC-26DEC31-150K");
        assert_eq!(m.yes_price, dec!(0.35));
        assert_eq!(m.no_price, dec!(0.65));
        assert_eq!(m.volume, 48210);
        assert_eq!(m.category, Category::Crypto);
        assert_eq!(m.resolution_date, "2026-12-31");
        assert_eq!(
            batch.slug_index.get("KXBTC-26DEC31-150K").map(String::as_str),
            Some("kalshi:KXBTC-26DEC31-150K")
        );
    }

    #[test]
    fn test_independent_no_book_is_kept() {
        let raw = vec![json!({
            "ticker": "KXFED",
            "title": "Fed cuts rates",
            "status": "open",
            "yes_bid": 58, "yes_ask": 62,
            "no_bid": 48, "no_ask": 52
        })];

        let m = &KalshiProvider::normalize(raw).markets[0];
        assert_eq!(m.yes_price, dec!(0.60));
        assert_eq!(m.no_price, dec!(0.50));
        assert_eq!(m.book_inconsistency(), dec!(10));
    }

    #[test]
    fn test_last_price_fallback() {
        let raw = vec![json!({
            "ticker": "KXTHIN",
            "title": "Thin market",
            "status": "active",
            "yes_bid": 0, "yes_ask": 0,
            "last_price": 12
        })];

        let m = &KalshiProvider::normalize(raw).markets[0];
        assert_eq!(m.yes_price, dec!(0.12));
        assert_eq!(m.no_price, dec!(0.88));
    }

    #[test]
    fn test_skips_out_of_range_quotes() {
        let raw = vec![
            json!({"ticker": "CORRUPT", "title": "Corrupt", "status": "active", "yes_bid": 140, "yes_ask": 160}),
            json!({"ticker": "BADNO", "title": "Bad no side", "status": "active",
                   "yes_bid": 40, "yes_ask": 42, "no_bid": 120, "no_ask": 130}),
            json!({"ticker": "BADLAST", "title": "Bad last", "status": "active", "last_price": 250}),
            json!({"ticker": "EDGE", "title": "Edge", "status": "active", "yes_bid": 99, "yes_ask": 100}),
        ];

        let batch = KalshiProvider::normalize(raw);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.markets[0].id, "kalshi:EDGE");
        assert_eq!(batch.markets[0].yes_price, dec!(0.99));
    }

    #[test]
    fn test_skips_settled_and_priceless() {
        let raw = vec![
            json!({"ticker": "A", "title": "Settled", "status": "settled", "yes_bid": 50, "yes_ask": 52}),
            json!({"ticker": "B", "title": "Closed", "status": "closed", "yes_bid": 50, "yes_ask": 52}),
            json!({"ticker": "C", "title": "No quotes", "status": "active"}),
            json!({"title": "No ticker", "status": "active", "yes_bid": 50, "yes_ask": 52}),
            json!({"ticker": "D", "title": "Live", "status": "active", "yes_bid": 50, "yes_ask": 52}),
        ];

        let batch = KalshiProvider::normalize(raw);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.markets[0].id, "kalshi:D");
    }
}
