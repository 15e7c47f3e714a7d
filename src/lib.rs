//! Prediction Market Aggregator
//!
//! Merges Polymarket and Kalshi listings into one cache, keeps Polymarket
//! prices fresh from its live trade stream, pairs equivalent markets across
//! venues and ranks the price spreads between them.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  MarketAggregator                    │
//! │  - get_all_markets()                                 │
//! │  - get_market_by_id(id)                              │
//! │  - detect_spread_opportunities()                     │
//! └──────────┬──────────────────────────────┬───────────┘
//!            │                              │
//!            ▼                              ▼
//! ┌─────────────────────┐        ┌─────────────────────┐
//! │ IngestionScheduler  │        │   SpreadDetector    │
//! │ (poll + TTL refresh)│        │  (MarketMatcher)    │
//! └──────────┬──────────┘        └──────────┬──────────┘
//!            │                              │
//!     ┌──────┴───────┐                      │
//!     ▼              ▼                      ▼
//! ┌──────────┐ ┌──────────┐   ┌─────────────────────────┐
//! │Polymarket│ │  Kalshi  │──▶│    MarketRepository     │
//! │ Provider │ │ Provider │   │  (snapshot + slug idx)  │
//! └──────────┘ └──────────┘   └────────────▲────────────┘
//!                                          │ patch
//!                             ┌────────────┴────────────┐
//!                             │     LiveFeedClient      │
//!                             │  (Polymarket trades)    │
//!                             └─────────────────────────┘
//! ```

pub mod aggregator;
pub mod category;
pub mod config;
pub mod error;
pub mod live_feed;
pub mod matcher;
pub mod models;
pub mod providers;
pub mod repository;
pub mod scheduler;
pub mod spread;

// Re-export commonly used types
pub use aggregator::MarketAggregator;
pub use config::AggregatorConfig;
pub use error::{FeedError, ProviderError};
pub use live_feed::{ConnectionState, LiveFeedClient};
pub use models::{
    Category,
    Confidence,
    Market,
    MatchedPair,
    Platform,
    SpreadDirection,
    SpreadKind,
    SpreadOpportunity,
};
pub use providers::{KalshiProvider, MarketProvider, MockProvider, PolymarketProvider};
pub use repository::MarketRepository;

/// Version of the aggregator
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the package
pub const NAME: &str = env!("CARGO_PKG_NAME");
