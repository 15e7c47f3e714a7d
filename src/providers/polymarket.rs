//! polymarket.rs - Gamma REST adapter (source A)
//!
//! Gamma serves prices as `outcomePrices`, a JSON-encoded string array such as
//! `"[\"0.42\", \"0.58\"]"`. The first entry is the YES price.

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::{decimal_from_value, iso_date, mid, string_list, unit_price, volume_from_value};
use super::{MarketProvider, ProviderBatch};
use crate::category;
use crate::error::ProviderError;
use crate::models::{Market, Platform};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GammaMarket {
    id: Option<Value>,
    slug: Option<String>,
    question: Option<String>,
    description: Option<String>,
    outcome_prices: Option<Value>,
    clob_token_ids: Option<Value>,
    best_bid: Option<Value>,
    best_ask: Option<Value>,
    volume_num: Option<Value>,
    volume: Option<Value>,
    end_date: Option<String>,
    active: Option<bool>,
    closed: Option<bool>,
}

/// Listing adapter for the Polymarket Gamma API
#[derive(Debug, Clone)]
pub struct PolymarketProvider {
    client: Client,
    base_url: String,
    limit: usize,
}

impl PolymarketProvider {
    pub fn new(base_url: &str, limit: usize, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        PolymarketProvider {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            limit,
        }
    }

    /// Normalize raw Gamma records. Records that are closed, inactive or
    /// missing a slug, question or price are skipped.
    fn normalize(raw: Vec<Value>) -> ProviderBatch {
        let mut batch = ProviderBatch::empty(Platform::Polymarket);
        let mut skipped = 0usize;

        for value in raw {
            let record: GammaMarket = match serde_json::from_value(value) {
                Ok(r) => r,
                Err(e) => {
                    debug!("Skipped malformed Gamma record: {}", e);
                    skipped += 1;
                    continue;
                }
            };

            match Self::convert(&record) {
                Some(market) => {
                    let id = market.id.clone();
                    if let Some(tokens) = &record.clob_token_ids {
                        for token in string_list(tokens) {
                            batch.alias(&token, &id);
                        }
                    }
                    batch.push(market);
                }
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            debug!("Skipped {} Gamma records", skipped);
        }
        batch
    }

    fn convert(record: &GammaMarket) -> Option<Market> {
        if record.closed.unwrap_or(false) || !record.active.unwrap_or(true) {
            return None;
        }

        let slug = record
            .slug
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| record.id.as_ref().map(value_to_id))?;
        let title = record.question.as_deref().filter(|q| !q.is_empty())?;
        let description = record.description.as_deref().unwrap_or_default();

        let prices: Vec<_> = record
            .outcome_prices
            .as_ref()
            .map(string_list)
            .unwrap_or_default()
            .into_iter()
            .map(|p| decimal_from_value(&Value::String(p)))
            .collect();

        let yes_price = prices.first().copied().flatten().or_else(|| {
            mid(
                record.best_bid.as_ref().and_then(decimal_from_value),
                record.best_ask.as_ref().and_then(decimal_from_value),
            )
        })?;
        let yes_price = unit_price(yes_price)?;
        let no_price = match prices.get(1).copied().flatten() {
            Some(no) => Some(unit_price(no)?),
            None => None,
        };

        let volume = record
            .volume_num
            .as_ref()
            .or(record.volume.as_ref())
            .map(volume_from_value)
            .unwrap_or(0);

        Some(Market::new(
            Platform::Polymarket,
            &slug,
            &slug,
            title,
            description,
            category::classify(title, description),
            yes_price,
            no_price,
            volume,
            &iso_date(record.end_date.as_deref()),
        ))
    }
}

fn value_to_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl MarketProvider for PolymarketProvider {
    fn platform(&self) -> Platform {
        Platform::Polymarket
    }

    async fn fetch_markets(&self) -> Result<ProviderBatch, ProviderError> {
        let url = format!("{}/markets", self.base_url);
        let params = [
            ("active", "true".to_string()),
            ("closed", "false".to_string()),
            ("limit", self.limit.to_string()),
            ("order", "volume".to_string()),
            ("ascending", "false".to_string()),
        ];

        debug!("Fetching from: {}", url);

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                platform: Platform::Polymarket,
                source,
            })?;

        if !response.status().is_success() {
            warn!("Gamma returned status {}", response.status());
            return Err(ProviderError::Status {
                platform: Platform::Polymarket,
                status: response.status().as_u16(),
            });
        }

        let raw: Vec<Value> = response.json().await.map_err(|e| ProviderError::Decode {
            platform: Platform::Polymarket,
            message: e.to_string(),
        })?;

        let fetched = raw.len();
        let batch = Self::normalize(raw);
        info!("Polymarket: {} of {} listings usable", batch.len(), fetched);
        Ok(batch)
    }
}
