//! matcher.rs - Pairs equivalent markets across Polymarket and Kalshi
//!
//! Similarity is the Jaccard index over canonical title tokens. Matching is
//! greedy in Polymarket id order: each Polymarket market takes its best
//! unclaimed Kalshi candidate. This is order dependent, not a global optimum.

use std::collections::HashSet;

use crate::config::MatcherConfig;
use crate::models::{Market, MatchedPair, Platform};
use crate::repository::MarketSnapshot;

/// Words carrying no identity on their own
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "will", "to", "be", "by", "in", "on", "of", "at", "for", "is", "it",
    "and", "or", "before", "after", "this", "that", "than", "with",
];

/// Ticker and shorthand aliases folded onto one spelling
const ALIASES: &[(&str, &str)] = &[
    ("btc", "bitcoin"),
    ("eth", "ethereum"),
    ("sol", "solana"),
    ("doge", "dogecoin"),
    ("us", "usa"),
    ("fomc", "fed"),
    ("gop", "republican"),
    ("dem", "democrat"),
    ("dems", "democrat"),
];

/// Lowercase, strip non-alphanumerics, collapse whitespace
pub fn normalize_title(title: &str) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical token set used for similarity
pub fn title_tokens(title: &str) -> HashSet<String> {
    normalize_title(title)
        .split(' ')
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(w))
        .map(canonical_token)
        .collect()
}

/// Jaccard index of two token sets; 0 when both are empty
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Title similarity of two markets
pub fn similarity(a: &str, b: &str) -> f64 {
    jaccard(&title_tokens(a), &title_tokens(b))
}

fn canonical_token(word: &str) -> String {
    if let Some((_, canonical)) = ALIASES.iter().find(|(alias, _)| *alias == word) {
        return canonical.to_string();
    }
    expand_numeric_shorthand(word).unwrap_or_else(|| word.to_string())
}

/// "150k" -> "150000", "2m" -> "2000000", "1b" -> "1000000000"
fn expand_numeric_shorthand(word: &str) -> Option<String> {
    let suffix = word.chars().last()?;
    let digits = &word[..word.len() - suffix.len_utf8()];
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let zeros = match suffix {
        'k' => 3,
        'm' => 6,
        'b' => 9,
        _ => return None,
    };
    Some(format!("{}{}", digits, "0".repeat(zeros)))
}

/// Greedy cross-platform matcher
#[derive(Debug, Clone, Default)]
pub struct MarketMatcher {
    config: MatcherConfig,
}

impl MarketMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        MarketMatcher { config }
    }

    /// Pair Polymarket markets with Kalshi markets. Each market appears in at
    /// most one pair.
    pub fn match_markets(&self, snapshot: &MarketSnapshot) -> Vec<MatchedPair> {
        let side_a = snapshot.by_platform(Platform::Polymarket);
        let side_b = snapshot.by_platform(Platform::Kalshi);
        self.match_sides(&side_a, &side_b)
    }

    pub fn match_sides(&self, side_a: &[&Market], side_b: &[&Market]) -> Vec<MatchedPair> {
        let tokens_b: Vec<HashSet<String>> = side_b.iter().map(|m| title_tokens(&m.title)).collect();
        let mut claimed = vec![false; side_b.len()];
        let mut pairs = Vec::new();

        for market_a in side_a {
            let tokens_a = title_tokens(&market_a.title);

            let best = tokens_b
                .iter()
                .enumerate()
                .filter(|(j, _)| !claimed[*j])
                .map(|(j, tokens)| (j, jaccard(&tokens_a, tokens)))
                .filter(|(_, score)| *score >= self.config.candidate_threshold)
                .fold(None::<(usize, f64)>, |best, (j, score)| match best {
                    // Strictly greater keeps the first candidate on ties
                    Some((_, top)) if top >= score => best,
                    _ => Some((j, score)),
                });

            if let Some((j, score)) = best {
                if score >= self.config.accept_threshold {
                    claimed[j] = true;
                    pairs.push(MatchedPair {
                        market_a: (*market_a).clone(),
                        market_b: side_b[j].clone(),
                        similarity: score,
                    });
                }
            }
        }

        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use rust_decimal_macros::dec;

    fn market(platform: Platform, id: &str, title: &str) -> Market {
        Market::new(platform, id, id, title, "", Category::Trending, dec!(0.5), None, 0, "")
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Will BTC  hit $150k?! "), "will btc hit 150k");
        assert_eq!(normalize_title("Bitcoin to exceed $150,000"), "bitcoin to exceed 150000");
        assert_eq!(normalize_title("Fed: cut/hold?"), "fed cuthold");
    }

    #[test]
    fn test_title_tokens_canonicalize() {
        let tokens = title_tokens("Will BTC hit $150k?");
        let expected: HashSet<String> =
            ["bitcoin", "hit", "150000"].iter().map(|s| s.to_string()).collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn test_jaccard() {
        let a: HashSet<String> = ["x", "y"].iter().map(|s| s.to_string()).collect();
        let b: HashSet<String> = ["y", "z"].iter().map(|s| s.to_string()).collect();
        assert!((jaccard(&a, &b) - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(jaccard(&HashSet::new(), &HashSet::new()), 0.0);
    }

    #[test]
    fn test_headline_pair_matches() {
        let score = similarity("Will BTC hit $150k?", "Bitcoin to exceed $150,000");
        assert!(score > 0.4, "similarity was {}", score);
    }

    #[test]
    fn test_below_accept_threshold_is_rejected() {
        let a = market(Platform::Polymarket, "a", "Bitcoin price July");
        let b = market(Platform::Kalshi, "b", "Bitcoin price record high August");

        // Considered as a candidate, but not good enough to confirm
        let score = similarity(&a.title, &b.title);
        assert!((0.3..0.4).contains(&score), "similarity was {}", score);

        let pairs = MarketMatcher::default().match_sides(&[&a], &[&b]);
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_matching_is_injective() {
        let a1 = market(Platform::Polymarket, "a1", "Chiefs win the Super Bowl");
        let a2 = market(Platform::Polymarket, "a2", "Chiefs win Super Bowl LXI");
        let a3 = market(Platform::Polymarket, "a3", "Fed rate cut in December");
        let b1 = market(Platform::Kalshi, "b1", "Chiefs win Super Bowl");
        let b2 = market(Platform::Kalshi, "b2", "Fed rate cut December");

        let pairs = MarketMatcher::default().match_sides(&[&a1, &a2, &a3], &[&b1, &b2]);

        let a_ids: HashSet<&str> = pairs.iter().map(|p| p.market_a.id.as_str()).collect();
        let b_ids: HashSet<&str> = pairs.iter().map(|p| p.market_b.id.as_str()).collect();
        assert_eq!(a_ids.len(), pairs.len());
        assert_eq!(b_ids.len(), pairs.len());

        // a1 comes first and claims b1; a2 finds nothing left that fits
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].market_a.id, "polymarket:a1");
        assert_eq!(pairs[0].market_b.id, "kalshi:b1");
        assert_eq!(pairs[1].market_b.id, "kalshi:b2");
    }

    #[test]
    fn test_best_candidate_wins() {
        let a = market(Platform::Polymarket, "a", "Fed rate cut in December");
        let weak = market(Platform::Kalshi, "weak", "Fed rate hike in March");
        let strong = market(Platform::Kalshi, "strong", "Fed rate cut December");

        let pairs = MarketMatcher::default().match_sides(&[&a], &[&weak, &strong]);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].market_b.id, "kalshi:strong");
        assert_eq!(pairs[0].similarity, 1.0);
    }
}
