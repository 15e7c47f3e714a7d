//! End-to-end behavior of the aggregator over mock providers and a local
//! WebSocket trade server.

use futures_util::{SinkExt, StreamExt};
use market_aggregator::config::FeedConfig;
use market_aggregator::providers::MockBehavior;
use market_aggregator::{
    AggregatorConfig, Category, ConnectionState, Market, MarketAggregator, MarketProvider,
    MockProvider, Platform, SpreadDirection, SpreadKind,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

const BTC_SLUG: &str = "will-btc-hit-150k";
const BTC_ID: &str = "polymarket:will-btc-hit-150k";

fn polymarket_btc(yes: Decimal) -> Market {
    Market::new(
        Platform::Polymarket, BTC_SLUG, BTC_SLUG, "Will BTC hit $150k?", "",
        Category::Crypto, yes, None, 1_000_000, "2026-12-31",
    )
}

fn kalshi_btc(yes: Decimal) -> Market {
    Market::new(
        Platform::Kalshi, "KXBTC-150K", "KXBTC-150K", "Bitcoin to exceed $150,000", "",
        Category::Crypto, yes, None, 400_000, "2026-12-31",
    )
}

fn config(feed_url: Option<&str>) -> AggregatorConfig {
    AggregatorConfig {
        request_timeout: Duration::from_millis(200),
        feed_enabled: feed_url.is_some(),
        feed: FeedConfig {
            url: feed_url.unwrap_or("ws://127.0.0.1:1").to_string(),
            reconnect_base_delay: Duration::from_millis(1),
            max_reconnect_attempts: 5,
            heartbeat_interval: Duration::from_secs(30),
        },
        ..AggregatorConfig::default()
    }
}

fn trade_frame(slug: &str, outcome: &str, price: f64) -> String {
    serde_json::json!({
        "topic": "activity",
        "type": "trades",
        "payload": { "slug": slug, "outcome": outcome, "price": price, "size": 10.0, "side": "BUY" }
    })
    .to_string()
}

async fn wait_for<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_headline_spread_between_sources() {
    let providers: Vec<Arc<dyn MarketProvider>> = vec![
        Arc::new(MockProvider::new(Platform::Polymarket, vec![polymarket_btc(dec!(0.42))])),
        Arc::new(MockProvider::new(Platform::Kalshi, vec![kalshi_btc(dec!(0.35))])),
    ];
    let aggregator = MarketAggregator::new(&config(None), providers);

    let opportunities = aggregator.detect_spread_opportunities().await;
    assert!(opportunities.len() <= 20);

    let cross: Vec<_> = opportunities
        .iter()
        .filter(|o| o.kind == SpreadKind::CrossSource)
        .collect();
    assert_eq!(cross.len(), 1);
    assert_eq!(cross[0].spread_percent, dec!(7.0));
    assert_eq!(cross[0].spread_direction, Some(SpreadDirection::PolymarketHigher));

    for pair in opportunities.windows(2) {
        assert!(pair[0].spread_percent >= pair[1].spread_percent);
    }
}

#[tokio::test]
async fn test_cold_start_with_both_sources_down_serves_fallback() {
    let providers: Vec<Arc<dyn MarketProvider>> = vec![
        Arc::new(MockProvider::hanging(Platform::Polymarket)),
        Arc::new(MockProvider::hanging(Platform::Kalshi)),
    ];
    let aggregator = MarketAggregator::new(&config(None), providers);

    let markets = aggregator.get_all_markets().await;
    assert!(!markets.is_empty());
    assert!(markets.iter().any(|m| m.platform == Platform::Polymarket));
    assert!(markets.iter().any(|m| m.platform == Platform::Kalshi));
}

#[tokio::test]
async fn test_live_data_never_pairs_with_fallback_quotes() {
    let polymarket = Arc::new(MockProvider::failing(Platform::Polymarket));
    let kalshi = Arc::new(MockProvider::failing(Platform::Kalshi));
    let providers: Vec<Arc<dyn MarketProvider>> = vec![polymarket.clone(), kalshi.clone()];
    let aggregator = MarketAggregator::new(&config(None), providers);

    assert!(aggregator.refresh().await.seeded_fallback);
    let repository = aggregator.repository();
    assert!(repository.get_by_id("kalshi:KXBTCMAX-26-150K").is_some());

    // Polymarket recovers with a listing resembling a fallback Kalshi row;
    // Kalshi stays down
    polymarket.set_markets(vec![Market::new(
        Platform::Polymarket, "real-btc", "real-btc", "Will Bitcoin hit $150k in 2026?", "",
        Category::Crypto, dec!(0.55), None, 10_000, "2026-12-31",
    )]);
    polymarket.set_behavior(MockBehavior::Serve);
    aggregator.refresh().await;

    assert!(!repository.is_serving_fallback());
    assert!(repository.get_by_id("kalshi:KXBTCMAX-26-150K").is_none());
    assert!(repository.get_all().iter().all(|m| m.platform == Platform::Polymarket));

    let opportunities = aggregator.detect_spread_opportunities().await;
    assert!(opportunities.iter().all(|o| o.kind != SpreadKind::CrossSource));
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_data() {
    let polymarket = Arc::new(MockProvider::new(Platform::Polymarket, vec![polymarket_btc(dec!(0.42))]));
    let kalshi = Arc::new(MockProvider::new(Platform::Kalshi, vec![kalshi_btc(dec!(0.35))]));
    let providers: Vec<Arc<dyn MarketProvider>> = vec![polymarket.clone(), kalshi.clone()];
    let aggregator = MarketAggregator::new(&config(None), providers);

    aggregator.refresh().await;
    polymarket.set_behavior(MockBehavior::Fail);
    kalshi.set_behavior(MockBehavior::Hang);
    let report = aggregator.refresh().await;

    assert!(!report.seeded_fallback);
    assert_eq!(aggregator.repository().len(), 2);
    assert!(aggregator.get_market_by_id(BTC_ID).await.is_some());
}

#[tokio::test]
async fn test_live_trade_patches_repository() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let subscription = match ws.next().await {
            Some(Ok(Message::Text(text))) => text,
            other => panic!("expected subscription, got {:?}", other),
        };

        ws.send(Message::Text(trade_frame("unknown-market", "Yes", 0.9))).await.unwrap();
        ws.send(Message::Text(trade_frame(BTC_SLUG, "No", 0.52))).await.unwrap();

        // Hold the connection open until the client closes it
        while let Some(Ok(frame)) = ws.next().await {
            if frame.is_close() {
                break;
            }
        }
        subscription
    });

    let providers: Vec<Arc<dyn MarketProvider>> = vec![
        Arc::new(MockProvider::new(Platform::Polymarket, vec![polymarket_btc(dec!(0.42))])),
        Arc::new(MockProvider::new(Platform::Kalshi, vec![kalshi_btc(dec!(0.35))])),
    ];
    let aggregator = MarketAggregator::new(&config(Some(&url)), providers);

    let report = aggregator.refresh().await;
    assert!(report.feed_started);

    let repository = aggregator.repository();
    let patched = wait_for(|| {
        repository
            .get_by_id(BTC_ID)
            .map(|m| m.yes_price == dec!(0.48))
            .unwrap_or(false)
    })
    .await;
    assert!(patched);

    let market = repository.get_by_id(BTC_ID).unwrap();
    assert_eq!(market.no_price, dec!(0.52));
    assert_eq!(market.title, "Will BTC hit $150k?");
    assert_eq!(aggregator.live_feed_state(), Some(ConnectionState::Connected));

    let feed = aggregator.live_feed().unwrap();
    assert_eq!(feed.stats().messages_dropped, 1);
    assert_eq!(feed.stats().patches_applied, 1);

    aggregator.shutdown();
    let subscription = tokio::time::timeout(Duration::from_secs(2), server)
        .await
        .unwrap()
        .unwrap();
    let subscription: serde_json::Value = serde_json::from_str(&subscription).unwrap();
    assert_eq!(subscription["action"], "subscribe");
    assert_eq!(subscription["subscriptions"][0]["topic"], "activity");
    assert_eq!(subscription["subscriptions"][0]["type"], "trades");

    assert!(wait_for(|| feed.state() == ConnectionState::Shutdown).await);
}

#[tokio::test]
async fn test_polling_continues_after_feed_gives_up() {
    let polymarket = Arc::new(MockProvider::new(Platform::Polymarket, vec![polymarket_btc(dec!(0.42))]));
    let providers: Vec<Arc<dyn MarketProvider>> = vec![polymarket.clone()];

    let mut cfg = config(Some("ws://127.0.0.1:1"));
    cfg.cache_ttl = Duration::from_millis(20);
    let aggregator = MarketAggregator::new(&cfg, providers);

    aggregator.refresh().await;
    assert!(wait_for(|| aggregator.live_feed_state() == Some(ConnectionState::Abandoned)).await);

    polymarket.set_markets(vec![polymarket_btc(dec!(0.61))]);
    tokio::time::sleep(Duration::from_millis(40)).await;

    let market = aggregator.get_market_by_id(BTC_ID).await.unwrap();
    assert_eq!(market.yes_price, dec!(0.61));
    assert_eq!(aggregator.live_feed_state(), Some(ConnectionState::Abandoned));
}
