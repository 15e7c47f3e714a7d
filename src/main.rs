//! main.rs - Entry point for the prediction market aggregator
//!
//! - Polls Polymarket and Kalshi and keeps a merged cache
//! - Streams Polymarket trades into the cache
//! - Prints the ranked spread table every poll interval

use log::{debug, info, warn};
use market_aggregator::{AggregatorConfig, MarketAggregator, SpreadOpportunity, NAME, VERSION};
use std::collections::HashMap;

/// Widest title shown in the spread table
const TITLE_WIDTH: usize = 40;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // tokio-tungstenite needs a process-wide rustls provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    // Print startup banner
    println!();
    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║     📊 Prediction Market Aggregator v{}               ║", VERSION);
    println!("║     Polymarket + Kalshi spread scanner                   ║");
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();

    info!("Starting {} v{}", NAME, VERSION);

    let config = AggregatorConfig::from_env()?;
    info!("✓ Configuration loaded");
    info!("  - Polymarket API: {}", config.polymarket_api_url);
    info!("  - Kalshi API: {}", config.kalshi_api_url);
    if config.feed_enabled {
        info!("  - Live feed: {}", config.feed.url);
    } else {
        info!("  - Live feed: disabled");
    }
    info!("  - Cache TTL: {}s, poll interval: {}s", config.cache_ttl.as_secs(), config.poll_interval.as_secs());
    println!();

    let aggregator = MarketAggregator::from_config(&config);

    info!("📊 Fetching initial market data...");
    let report = aggregator.refresh().await;
    if report.seeded_fallback {
        warn!("No source answered, serving fallback markets");
    } else {
        info!("✓ Initial fetch: {} markets", report.total_fetched());
    }

    let poller = aggregator.start();

    let mut interval = tokio::time::interval(config.poll_interval);
    let mut scan_count: u64 = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received");
                break;
            }
        }

        scan_count += 1;
        debug!("─────────────────────────────────────────────────────────────");

        let markets = aggregator.get_all_markets().await;
        let opportunities = aggregator.detect_spread_opportunities().await;
        info!(
            "📡 Scan #{}: {} markets cached, feed {}",
            scan_count,
            markets.len(),
            aggregator
                .live_feed_state()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "disabled".to_string())
        );

        display_category_counts(&markets);
        display_opportunities(&opportunities);
    }

    aggregator.shutdown();
    let _ = poller.await;
    info!("Goodbye");
    Ok(())
}

fn display_category_counts(markets: &[market_aggregator::Market]) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for market in markets {
        *counts.entry(market.category.to_string()).or_default() += 1;
    }

    let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
    counts.sort();
    let summary: Vec<String> = counts.iter().map(|(c, n)| format!("{}={}", c, n)).collect();
    info!("   Categories: {}", summary.join(", "));
}

/// Print the ranked spread table
fn display_opportunities(opportunities: &[SpreadOpportunity]) {
    if opportunities.is_empty() {
        warn!("No spread opportunities found");
        return;
    }

    println!();
    println!("┌──────────────────────────────────────────┬─────────┬─────────┬──────────┬────────┐");
    println!("│ Market                                   │ Poly    │ Kalshi  │ Spread   │ Conf   │");
    println!("├──────────────────────────────────────────┼─────────┼─────────┼──────────┼────────┤");

    for opp in opportunities {
        println!(
            "│ {:40} │ {:>7} │ {:>7} │ {:>7.2}% │ {:6} │",
            truncate(&opp.title, TITLE_WIDTH),
            price_cell(opp.price_a),
            price_cell(opp.price_b),
            opp.spread_percent,
            format!("{:?}", opp.confidence),
        );
    }

    println!("└──────────────────────────────────────────┴─────────┴─────────┴──────────┴────────┘");
    println!();
    info!("🎯 {} opportunities ranked", opportunities.len());
}

fn price_cell(price: Option<rust_decimal::Decimal>) -> String {
    match price {
        Some(p) => format!("{:.2}", p),
        None => "-".to_string(),
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let cut: String = text.chars().take(width - 1).collect();
    format!("{}…", cut)
}
