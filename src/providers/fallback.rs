//! fallback.rs - Static dataset served when no source has ever answered

use rust_decimal::Decimal;

use super::ProviderBatch;
use crate::category;
use crate::models::{Market, Platform};

/// (platform, native id, title, yes price in cents, volume, resolution date)
const FALLBACK_MARKETS: &[(Platform, &str, &str, i64, u64, &str)] = &[
    (Platform::Polymarket, "bitcoin-above-150k-2026", "Will Bitcoin hit $150k in 2026?", 38, 2_450_000, "2026-12-31"),
    (Platform::Polymarket, "fed-rate-cut-december", "Fed rate cut in December?", 64, 1_120_000, "2026-12-10"),
    (Platform::Polymarket, "openai-gpt6-release-2026", "OpenAI releases GPT-6 in 2026?", 27, 540_000, "2026-12-31"),
    (Platform::Polymarket, "super-bowl-chiefs", "Chiefs win the Super Bowl?", 18, 3_300_000, "2027-02-07"),
    (Platform::Kalshi, "KXBTCMAX-26-150K", "Bitcoin above $150,000 in 2026", 33, 410_000, "2026-12-31"),
    (Platform::Kalshi, "KXFEDDECISION-26DEC", "Fed rate cut at December meeting", 61, 890_000, "2026-12-10"),
    (Platform::Kalshi, "KXRECESSION-26", "US recession in 2026?", 22, 300_000, "2026-12-31"),
    (Platform::Kalshi, "KXSB-27-KC", "Chiefs win Super Bowl", 16, 760_000, "2027-02-07"),
];

/// Fallback markets grouped into one batch per platform
pub fn fallback_batches() -> Vec<ProviderBatch> {
    let mut polymarket = ProviderBatch::empty(Platform::Polymarket);
    let mut kalshi = ProviderBatch::empty(Platform::Kalshi);

    for (platform, native_id, title, cents, volume, date) in FALLBACK_MARKETS {
        let market = Market::new(
            *platform,
            native_id,
            native_id,
            title,
            "",
            category::classify(title, ""),
            Decimal::new(*cents, 2),
            None,
            *volume,
            date,
        );

        match platform {
            Platform::Polymarket => polymarket.push(market),
            Platform::Kalshi => kalshi.push(market),
        }
    }

    vec![polymarket, kalshi]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MAX_PRICE, MIN_PRICE};

    #[test]
    fn test_fallback_is_non_empty_on_both_platforms() {
        let batches = fallback_batches();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| !b.is_empty()));
    }

    #[test]
    fn test_fallback_prices_within_bounds() {
        for batch in fallback_batches() {
            for m in &batch.markets {
                assert!(m.yes_price >= MIN_PRICE && m.yes_price <= MAX_PRICE);
                assert!(m.no_price >= MIN_PRICE && m.no_price <= MAX_PRICE);
                assert!(m.id.starts_with(m.platform.id_prefix()));
            }
        }
    }
}
