//! models.rs - Core data structures for the market aggregator
//!
//! Defines the canonical Market record, the platform/category tags and the
//! derived MatchedPair and SpreadOpportunity values.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest price any ingested record may carry
pub const MIN_PRICE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Highest price any ingested record may carry
pub const MAX_PRICE: Decimal = Decimal::from_parts(99, 0, 0, false, 2);

/// Clamp a probability price into `[0.01, 0.99]`
pub fn clamp_price(price: Decimal) -> Decimal {
    price.max(MIN_PRICE).min(MAX_PRICE)
}

/// Complementary price, clamped
pub fn complement(price: Decimal) -> Decimal {
    clamp_price(Decimal::ONE - price)
}

/// Venue a market was ingested from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Source A: Gamma REST listings plus the real-time activity feed
    Polymarket,
    /// Source B: trade-api REST listings
    Kalshi,
}

impl Platform {
    /// Prefix used to namespace canonical ids
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Platform::Polymarket => "polymarket",
            Platform::Kalshi => "kalshi",
        }
    }

    /// Build a canonical id from a venue-native identifier
    pub fn market_id(&self, native_id: &str) -> String {
        format!("{}:{}", self.id_prefix(), native_id)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Polymarket => write!(f, "Polymarket"),
            Platform::Kalshi => write!(f, "Kalshi"),
        }
    }
}

/// Market category, assigned once at ingestion by `category::classify`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Crypto,
    Politics,
    Sports,
    Economy,
    Tech,
    Trending,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Crypto => "crypto",
            Category::Politics => "politics",
            Category::Sports => "sports",
            Category::Economy => "economy",
            Category::Tech => "tech",
            Category::Trending => "trending",
        };
        write!(f, "{}", name)
    }
}

/// Canonical market record shared by every component
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub platform: Platform,
    pub category: Category,
    pub yes_price: Decimal,
    pub no_price: Decimal,
    pub volume: u64,
    pub resolution_date: String,
    pub updated_at: DateTime<Utc>,
}

impl Market {
    /// Build a market, clamping both prices
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        platform: Platform,
        native_id: &str,
        slug: &str,
        title: &str,
        description: &str,
        category: Category,
        yes_price: Decimal,
        no_price: Option<Decimal>,
        volume: u64,
        resolution_date: &str,
    ) -> Self {
        let yes_price = clamp_price(yes_price);
        let no_price = no_price.map(clamp_price).unwrap_or_else(|| complement(yes_price));

        Market {
            id: platform.market_id(native_id),
            slug: slug.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            platform,
            category,
            yes_price,
            no_price,
            volume,
            resolution_date: resolution_date.to_string(),
            updated_at: Utc::now(),
        }
    }

    /// Deviation of the book from `yes + no = 1`, in percentage points
    pub fn book_inconsistency(&self) -> Decimal {
        (self.yes_price - (Decimal::ONE - self.no_price)).abs() * Decimal::ONE_HUNDRED
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} @ yes {} / no {}",
            self.title, self.platform, self.yes_price, self.no_price
        )
    }
}

/// Two markets judged to describe the same event, one per platform
#[derive(Debug, Clone)]
pub struct MatchedPair {
    pub market_a: Market,
    pub market_b: Market,
    pub similarity: f64,
}

/// Which side of a cross-source spread quotes the higher yes price
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SpreadDirection {
    #[serde(rename = "polymarket_higher")]
    PolymarketHigher,
    #[serde(rename = "kalshi_higher")]
    KalshiHigher,
}

impl SpreadDirection {
    /// Ties resolve to the Polymarket side
    pub fn between(price_a: Decimal, price_b: Decimal) -> Self {
        if price_b > price_a {
            SpreadDirection::KalshiHigher
        } else {
            SpreadDirection::PolymarketHigher
        }
    }
}

/// Qualitative trust attached to a detected spread
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Tier for a cross-source match of the given title similarity
    pub fn from_similarity(similarity: f64) -> Self {
        if similarity > 0.7 {
            Confidence::High
        } else if similarity > 0.5 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

/// Where a spread opportunity came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpreadKind {
    CrossSource,
    Reference,
    Internal,
}

/// A detected price discrepancy, regenerated on every detection pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadOpportunity {
    pub id: String,
    pub title: String,
    /// Polymarket-side yes price
    pub price_a: Option<Decimal>,
    /// Kalshi-side yes price
    pub price_b: Option<Decimal>,
    pub spread_percent: Decimal,
    pub spread_direction: Option<SpreadDirection>,
    pub combined_volume: u64,
    pub category: Category,
    pub confidence: Confidence,
    pub kind: SpreadKind,
    pub market_ids: Vec<String>,
    pub detected_at: DateTime<Utc>,
}

impl SpreadOpportunity {
    /// Build a cross-source opportunity from a matched pair
    pub fn from_pair(pair: &MatchedPair) -> Self {
        let price_a = pair.market_a.yes_price;
        let price_b = pair.market_b.yes_price;

        SpreadOpportunity {
            id: format!("{}|{}", pair.market_a.id, pair.market_b.id),
            title: pair.market_a.title.clone(),
            price_a: Some(price_a),
            price_b: Some(price_b),
            spread_percent: (price_a - price_b).abs() * Decimal::ONE_HUNDRED,
            spread_direction: Some(SpreadDirection::between(price_a, price_b)),
            combined_volume: pair.market_a.volume.saturating_add(pair.market_b.volume),
            category: pair.market_a.category,
            confidence: Confidence::from_similarity(pair.similarity),
            kind: SpreadKind::CrossSource,
            market_ids: vec![pair.market_a.id.clone(), pair.market_b.id.clone()],
            detected_at: Utc::now(),
        }
    }

    /// Build a self-referential opportunity for a market whose book does not add up
    pub fn from_inconsistent_book(market: &Market) -> Self {
        let (price_a, price_b) = match market.platform {
            Platform::Polymarket => (Some(market.yes_price), None),
            Platform::Kalshi => (None, Some(market.yes_price)),
        };

        SpreadOpportunity {
            id: format!("internal:{}", market.id),
            title: market.title.clone(),
            price_a,
            price_b,
            spread_percent: market.book_inconsistency(),
            spread_direction: None,
            combined_volume: market.volume,
            category: market.category,
            confidence: Confidence::Medium,
            kind: SpreadKind::Internal,
            market_ids: vec![market.id.clone()],
            detected_at: Utc::now(),
        }
    }
}

impl fmt::Display for SpreadOpportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | spread {:.2}% ({:?}, {:?})",
            self.title, self.spread_percent, self.kind, self.confidence
        )
    }
}
