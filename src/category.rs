//! category.rs - Keyword classifier assigning a Category at ingestion time

use crate::models::Category;

/// Ordered rule set. The first rule with a matching keyword wins, so the
/// order here decides ties such as "bitcoin ETF approval vote".
const RULES: &[(Category, &[&str])] = &[
    (
        Category::Crypto,
        &[
            "bitcoin", "btc", "ethereum", "eth", "crypto", "solana", "dogecoin", "xrp",
            "stablecoin", "blockchain", "token", "defi", "nft",
        ],
    ),
    (
        Category::Politics,
        &[
            "election", "president", "trump", "biden", "senate", "congress", "governor",
            "democrat", "republican", "parliament", "prime minister", "vote", "nominee",
            "impeach", "cabinet",
        ],
    ),
    (
        Category::Sports,
        &[
            "nfl", "nba", "mlb", "nhl", "super bowl", "world cup", "championship", "playoff",
            "finals", "premier league", "champions league", "olympic", "ufc", "tennis",
            "match", "game",
        ],
    ),
    (
        Category::Economy,
        &[
            "fed", "interest rate", "inflation", "cpi", "gdp", "recession", "unemployment",
            "jobs report", "rate cut", "rate hike", "treasury", "s&p", "nasdaq", "dow",
            "stock", "tariff",
        ],
    ),
    (
        Category::Tech,
        &[
            "ai", "openai", "gpt", "apple", "google", "microsoft", "nvidia", "tesla",
            "spacex", "iphone", "launch", "chip", "software", "meta",
        ],
    ),
];

/// Keywords this short only match a whole word (or its plural)
const SHORT_KEYWORD_LEN: usize = 4;

/// Classify a market by its title and description (case-insensitive)
pub fn classify(title: &str, description: &str) -> Category {
    let text = word_text(&format!("{} {}", title, description));

    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| has_keyword(&text, kw)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Trending)
}

/// Lowercased words separated and surrounded by single spaces
fn word_text(raw: &str) -> String {
    let cleaned: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '&' { c } else { ' ' })
        .collect();

    format!(" {} ", cleaned.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Short keywords need a whole word; longer ones match at the start of a word
fn has_keyword(text: &str, keyword: &str) -> bool {
    if keyword.len() <= SHORT_KEYWORD_LEN {
        text.contains(&format!(" {} ", keyword)) || text.contains(&format!(" {}s ", keyword))
    } else {
        text.contains(&format!(" {}", keyword))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_categories() {
        assert_eq!(classify("Will BTC hit $150k?", ""), Category::Crypto);
        assert_eq!(classify("Who wins the 2028 presidential election?", ""), Category::Politics);
        assert_eq!(classify("Chiefs win the Super Bowl", ""), Category::Sports);
        assert_eq!(classify("Fed cuts interest rates in March", ""), Category::Economy);
        assert_eq!(classify("OpenAI releases GPT-6", ""), Category::Tech);
        assert_eq!(classify("Will it snow in Paris on Christmas?", ""), Category::Trending);
    }

    #[test]
    fn test_rule_order_is_significant() {
        // Matches both crypto and politics keywords; crypto is checked first
        assert_eq!(
            classify("Senate vote on bitcoin reserve bill", ""),
            Category::Crypto
        );
        // Politics beats economy
        assert_eq!(classify("Trump tariff on Canada", ""), Category::Politics);
    }

    #[test]
    fn test_description_is_considered() {
        assert_eq!(
            classify("Above 5000 by June?", "Resolves on the S&P 500 close"),
            Category::Economy
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        let first = classify("Ethereum ETF approved", "SEC decision");
        for _ in 0..10 {
            assert_eq!(classify("Ethereum ETF approved", "SEC decision"), first);
        }
    }

    #[test]
    fn test_short_keywords_need_word_boundaries() {
        assert_eq!(classify("Window cleaners strike in Thailand", ""), Category::Trending);
        assert_eq!(classify("Federer returns for one more season", ""), Category::Trending);
        assert_eq!(classify("Beth wins the metal detecting prize", ""), Category::Trending);
        assert_eq!(classify("Dow closes above 50k", ""), Category::Economy);
        assert_eq!(classify("ETH flips BTC", ""), Category::Crypto);
        assert_eq!(classify("Will the Feds cut?", ""), Category::Economy);
    }
}
