//! repository.rs - Merged, canonical market cache
//!
//! The repository owns the only mutable shared state in the crate. Readers get
//! an immutable `Arc<MarketSnapshot>`; writers replace it wholesale (`merge`)
//! or patch a single price in place (`patch`).

use log::{debug, info, warn};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::{clamp_price, complement, Market, Platform};
use crate::providers::ProviderBatch;

/// Default time-to-live for cached data
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Point-in-time view of every cached market plus the slug routing index
#[derive(Debug, Clone, Default)]
pub struct MarketSnapshot {
    markets: HashMap<String, Market>,
    slug_index: HashMap<String, String>,
}

impl MarketSnapshot {
    pub fn get(&self, id: &str) -> Option<&Market> {
        self.markets.get(id)
    }

    pub fn markets(&self) -> impl Iterator<Item = &Market> {
        self.markets.values()
    }

    /// Markets of one platform, sorted by id
    pub fn by_platform(&self, platform: Platform) -> Vec<&Market> {
        let mut markets: Vec<&Market> = self
            .markets
            .values()
            .filter(|m| m.platform == platform)
            .collect();
        markets.sort_by(|a, b| a.id.cmp(&b.id));
        markets
    }

    pub fn resolve_slug(&self, slug: &str) -> Option<&str> {
        self.slug_index.get(slug).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}

/// Result of a merge pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// New snapshot installed with this many markets
    Replaced { total: usize },
    /// Every batch was empty; the previous snapshot was kept
    Retained { total: usize },
}

#[derive(Debug)]
struct RepositoryState {
    snapshot: Arc<MarketSnapshot>,
    last_refresh: Option<Instant>,
    populated: bool,
    /// Snapshot holds only the static fallback dataset
    serving_fallback: bool,
}

/// Thread-safe market cache shared by the scheduler, live feed and readers
#[derive(Debug)]
pub struct MarketRepository {
    state: RwLock<RepositoryState>,
    ttl: Duration,
}

impl MarketRepository {
    pub fn new(ttl: Duration) -> Self {
        MarketRepository {
            state: RwLock::new(RepositoryState {
                snapshot: Arc::new(MarketSnapshot::default()),
                last_refresh: None,
                populated: false,
                serving_fallback: false,
            }),
            ttl,
        }
    }

    /// Current snapshot. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Arc<MarketSnapshot> {
        self.state.read().snapshot.clone()
    }

    pub fn get_all(&self) -> Vec<Market> {
        self.snapshot().markets().cloned().collect()
    }

    pub fn get_by_id(&self, id: &str) -> Option<Market> {
        self.state.read().snapshot.get(id).cloned()
    }

    pub fn resolve_slug(&self, slug: &str) -> Option<String> {
        self.state.read().snapshot.resolve_slug(slug).map(str::to_string)
    }

    pub fn len(&self) -> usize {
        self.state.read().snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once any merge or fallback seed has installed records
    pub fn is_populated(&self) -> bool {
        let state = self.state.read();
        state.populated && !state.snapshot.is_empty()
    }

    /// True while the cache holds fallback records and no live data yet
    pub fn is_serving_fallback(&self) -> bool {
        self.state.read().serving_fallback
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Time since the last completed refresh pass, if any
    pub fn age(&self) -> Option<Duration> {
        self.state.read().last_refresh.map(|t| t.elapsed())
    }

    pub fn is_stale(&self) -> bool {
        match self.age() {
            Some(age) => age > self.ttl,
            None => true,
        }
    }

    /// Merge one refresh pass.
    ///
    /// A platform that delivered records has its previous records replaced by
    /// this batch; a platform that delivered nothing keeps what it had. If no
    /// platform delivered anything the snapshot is left untouched. The first
    /// merge with live data discards the whole fallback dataset, silent
    /// platforms included. The new snapshot is swapped in under a single
    /// write lock.
    pub fn merge(&self, batches: Vec<ProviderBatch>) -> MergeOutcome {
        let reported: HashSet<Platform> = batches
            .iter()
            .filter(|b| !b.markets.is_empty())
            .map(|b| b.platform)
            .collect();

        // Excludes other writers while still letting readers through
        let state = self.state.upgradable_read();

        if reported.is_empty() {
            let total = state.snapshot.len();
            let mut state = RwLockUpgradableReadGuard::upgrade(state);
            state.last_refresh = Some(Instant::now());
            warn!("Refresh produced no records from any source, keeping {} cached markets", total);
            return MergeOutcome::Retained { total };
        }

        let carry_over = !state.serving_fallback;
        let current = &state.snapshot;
        let mut markets: HashMap<String, Market> = current
            .markets
            .iter()
            .filter(|(_, m)| carry_over && !reported.contains(&m.platform))
            .map(|(id, m)| (id.clone(), m.clone()))
            .collect();
        let mut slug_index: HashMap<String, String> = current
            .slug_index
            .iter()
            .filter(|(_, id)| markets.contains_key(*id))
            .map(|(slug, id)| (slug.clone(), id.clone()))
            .collect();

        for batch in batches.into_iter().filter(|b| !b.markets.is_empty()) {
            debug!("Merging {} markets from {}", batch.markets.len(), batch.platform);
            for market in batch.markets {
                markets.insert(market.id.clone(), market);
            }
            slug_index.extend(batch.slug_index);
        }

        let total = markets.len();
        let next = Arc::new(MarketSnapshot { markets, slug_index });

        let mut state = RwLockUpgradableReadGuard::upgrade(state);
        if state.serving_fallback {
            info!("Live data arrived, dropping fallback markets");
            state.serving_fallback = false;
        }
        state.snapshot = next;
        state.last_refresh = Some(Instant::now());
        state.populated = true;

        info!("Repository merged: {} markets cached", total);
        MergeOutcome::Replaced { total }
    }

    /// Install the static fallback dataset. Only applies to a repository that
    /// has never been populated; returns whether it was applied.
    pub fn seed_fallback(&self, batches: Vec<ProviderBatch>) -> bool {
        let mut state = self.state.write();
        if state.populated {
            return false;
        }

        let mut snapshot = MarketSnapshot::default();
        for batch in batches {
            for market in batch.markets {
                snapshot.markets.insert(market.id.clone(), market);
            }
            snapshot.slug_index.extend(batch.slug_index);
        }

        warn!("Seeding repository with {} fallback markets", snapshot.len());
        state.snapshot = Arc::new(snapshot);
        state.populated = true;
        state.serving_fallback = true;
        true
    }

    /// Update the yes price of a known market. The no price is re-derived and
    /// identity fields are untouched. Unknown ids are ignored.
    pub fn patch(&self, id: &str, yes_price: Decimal) -> bool {
        let mut state = self.state.write();
        if !state.snapshot.markets.contains_key(id) {
            return false;
        }

        // Copy-on-write: readers holding the old Arc keep their view
        let snapshot = Arc::make_mut(&mut state.snapshot);
        match snapshot.markets.get_mut(id) {
            Some(market) => {
                market.yes_price = clamp_price(yes_price);
                market.no_price = complement(market.yes_price);
                market.updated_at = chrono::Utc::now();
                true
            }
            None => false,
        }
    }

    /// Patch through the slug index
    pub fn patch_by_slug(&self, slug: &str, yes_price: Decimal) -> bool {
        match self.resolve_slug(slug) {
            Some(id) => self.patch(&id, yes_price),
            None => false,
        }
    }
}

impl Default for MarketRepository {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
