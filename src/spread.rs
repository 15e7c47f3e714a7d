//! spread.rs - Spread detection and ranking
//!
//! Three sources feed one ranked list:
//! - cross-source pairs from the matcher
//! - a curated reference set, shown while live pairs are sparse
//! - single-market books whose YES and NO prices do not add up

use chrono::Utc;
use log::{debug, info};
use rust_decimal::Decimal;

use crate::config::SpreadConfig;
use crate::matcher::MarketMatcher;
use crate::models::{
    Category, Confidence, MatchedPair, SpreadDirection, SpreadKind, SpreadOpportunity,
};
use crate::repository::MarketSnapshot;

/// (id, title, polymarket yes, kalshi yes, combined volume, category, confidence), prices in cents
const REFERENCE_SET: &[(&str, &str, i64, i64, u64, Category, Confidence)] = &[
    (
        "reference:fed-december-cut",
        "Fed cuts rates at the December meeting",
        64, 57, 2_010_000, Category::Economy, Confidence::High,
    ),
    (
        "reference:btc-150k-2026",
        "Bitcoin above $150,000 by end of 2026",
        38, 33, 2_860_000, Category::Crypto, Confidence::Medium,
    ),
    (
        "reference:chiefs-super-bowl",
        "Chiefs win the Super Bowl",
        18, 21, 4_060_000, Category::Sports, Confidence::Low,
    ),
];

/// Curated opportunities, confidence exactly as authored
pub fn reference_opportunities() -> Vec<SpreadOpportunity> {
    let detected_at = Utc::now();

    REFERENCE_SET
        .iter()
        .map(|(id, title, a, b, volume, category, confidence)| {
            let price_a = Decimal::new(*a, 2);
            let price_b = Decimal::new(*b, 2);
            SpreadOpportunity {
                id: id.to_string(),
                title: title.to_string(),
                price_a: Some(price_a),
                price_b: Some(price_b),
                spread_percent: (price_a - price_b).abs() * Decimal::ONE_HUNDRED,
                spread_direction: Some(SpreadDirection::between(price_a, price_b)),
                combined_volume: *volume,
                category: *category,
                confidence: *confidence,
                kind: SpreadKind::Reference,
                market_ids: Vec::new(),
                detected_at,
            }
        })
        .collect()
}

/// Detects and ranks spreads over a snapshot
#[derive(Debug, Clone, Default)]
pub struct SpreadDetector {
    matcher: MarketMatcher,
    config: SpreadConfig,
}

impl SpreadDetector {
    pub fn new(matcher: MarketMatcher, config: SpreadConfig) -> Self {
        SpreadDetector { matcher, config }
    }

    /// Ranked opportunities, highest spread first, at most `max_results`
    pub fn detect(&self, snapshot: &MarketSnapshot) -> Vec<SpreadOpportunity> {
        let pairs = self.matcher.match_markets(snapshot);
        let cross = self.cross_source(&pairs);
        debug!("{} matched pairs, {} above noise floor", pairs.len(), cross.len());

        let mut opportunities = Vec::with_capacity(cross.len());
        let sparse = cross.len() < self.config.reference_fill_below;
        opportunities.extend(cross);

        if sparse {
            opportunities.extend(reference_opportunities());
        }
        opportunities.extend(self.internal(snapshot));

        rank(&mut opportunities, self.config.max_results);
        info!("Detected {} spread opportunities", opportunities.len());
        opportunities
    }

    /// Spreads between matched pairs, noise removed
    pub fn cross_source(&self, pairs: &[MatchedPair]) -> Vec<SpreadOpportunity> {
        pairs
            .iter()
            .map(SpreadOpportunity::from_pair)
            .filter(|o| o.spread_percent >= self.config.min_spread_percent)
            .collect()
    }

    /// Markets whose own book is inconsistent by more than the threshold
    pub fn internal(&self, snapshot: &MarketSnapshot) -> Vec<SpreadOpportunity> {
        let mut found: Vec<SpreadOpportunity> = snapshot
            .markets()
            .filter(|m| m.book_inconsistency() > self.config.internal_threshold_percent)
            .map(SpreadOpportunity::from_inconsistent_book)
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }
}

/// Sort by spread descending (stable) and truncate
pub fn rank(opportunities: &mut Vec<SpreadOpportunity>, limit: usize) {
    opportunities.sort_by(|a, b| b.spread_percent.cmp(&a.spread_percent));
    opportunities.truncate(limit);
}
