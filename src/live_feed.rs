//! live_feed.rs - Push connection patching prices into the repository
//!
//! State machine:
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnected -> Reconnecting -> Connecting ...
//!                                                 |
//!                                                 +-> Abandoned (attempt cap reached)
//! any state -> Shutdown (explicit)
//! ```
//! Reconnects back off linearly (`base_delay * attempt`). Once the attempt cap
//! is exceeded the client stays `Abandoned` and the system runs on polled data.

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::providers::decimal_from_value;
use crate::repository::MarketRepository;

/// Upper bound on the connection handshake
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type FeedStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection state of the live feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Reconnect cap exceeded; no further attempts this process lifetime
    Abandoned,
    /// Stopped on request
    Shutdown,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Counters exposed for status reporting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub connection_attempts: u64,
    pub messages_received: u64,
    pub patches_applied: u64,
    pub messages_dropped: u64,
    /// Consecutive failed connections since the last successful one
    pub reconnect_attempt: u32,
}

#[derive(Debug, Serialize)]
struct SubscribeMessage {
    action: &'static str,
    subscriptions: Vec<Subscription>,
}

#[derive(Debug, Serialize)]
struct Subscription {
    topic: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
}

impl SubscribeMessage {
    fn trades() -> Self {
        SubscribeMessage {
            action: "subscribe",
            subscriptions: vec![Subscription {
                topic: "activity",
                kind: "trades",
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeedMessage {
    topic: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    payload: Option<TradePayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TradePayload {
    #[serde(alias = "marketSlug")]
    slug: Option<String>,
    /// Outcome token id, routed through the same index as slugs
    asset: Option<String>,
    #[serde(alias = "outcomeLabel")]
    outcome: Option<String>,
    price: Option<Value>,
}

/// A trade reduced to what the repository needs
#[derive(Debug, Clone, PartialEq)]
pub struct TradeUpdate {
    pub slug: Option<String>,
    pub asset: Option<String>,
    pub outcome: String,
    pub price: Decimal,
}

impl TradeUpdate {
    /// YES price implied by this trade
    pub fn yes_price(&self) -> Decimal {
        if self.outcome.eq_ignore_ascii_case("no") {
            Decimal::ONE - self.price
        } else {
            self.price
        }
    }
}

/// Parse a feed frame into a trade. Non-trade topics, malformed frames and
/// prices outside (0, 1) yield `None`.
pub fn parse_trade(text: &str) -> Option<TradeUpdate> {
    let message: FeedMessage = serde_json::from_str(text).ok()?;

    if message.topic.as_deref() != Some("activity") {
        return None;
    }
    if !matches!(message.kind.as_deref(), Some("trades") | Some("orders_matched")) {
        return None;
    }

    let payload = message.payload?;
    let price = payload.price.as_ref().and_then(decimal_from_value)?;
    if price <= Decimal::ZERO || price >= Decimal::ONE {
        return None;
    }
    if payload.slug.is_none() && payload.asset.is_none() {
        return None;
    }
    // A bare outcome token id may be the NO token; without a label the side is unknown
    if payload.outcome.is_none() && payload.asset.is_some() {
        return None;
    }

    Some(TradeUpdate {
        slug: payload.slug,
        asset: payload.asset,
        outcome: payload.outcome.unwrap_or_else(|| "Yes".to_string()),
        price,
    })
}

/// Live trade feed client. At most one physical connection at a time.
pub struct LiveFeedClient {
    config: FeedConfig,
    repository: Arc<MarketRepository>,
    state: Mutex<ConnectionState>,
    stats: Mutex<FeedStats>,
    running: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

impl LiveFeedClient {
    pub fn new(config: FeedConfig, repository: Arc<MarketRepository>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        LiveFeedClient {
            config,
            repository,
            state: Mutex::new(ConnectionState::Disconnected),
            stats: Mutex::new(FeedStats::default()),
            running: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn stats(&self) -> FeedStats {
        self.stats.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.lock();
        if *state != next {
            debug!("Live feed: {} -> {}", *state, next);
            *state = next;
        }
    }

    /// Spawn the connection loop. No-op (returns false) when the repository is
    /// still empty, the loop is already running, or the client has given up or
    /// been shut down.
    pub fn start(self: &Arc<Self>) -> bool {
        if !self.repository.is_populated() {
            debug!("Live feed not started: repository is empty");
            return false;
        }
        if matches!(self.state(), ConnectionState::Abandoned | ConnectionState::Shutdown) {
            return false;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }

        let client = Arc::clone(self);
        tokio::spawn(async move {
            client.run_loop().await;
        });
        true
    }

    /// Run the connection loop on the current task until shutdown or abandon
    pub async fn run(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.run_loop().await;
    }

    /// Stop the loop and close any open connection
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        if !self.is_running() {
            self.set_state(ConnectionState::Shutdown);
        }
        info!("Live feed shutdown requested");
    }

    async fn run_loop(&self) {
        let mut shutdown = self.shutdown_tx.subscribe();
        let mut attempt: u32 = 0;

        info!("Live feed starting: {}", self.config.url);

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.session(&mut shutdown, &mut attempt).await {
                Ok(()) => break,
                Err(e) => warn!("Live feed disconnected: {}", e),
            }

            self.set_state(ConnectionState::Disconnected);
            if *shutdown.borrow() {
                break;
            }

            attempt += 1;
            self.stats.lock().reconnect_attempt = attempt;

            if attempt > self.config.max_reconnect_attempts {
                warn!(
                    "Live feed giving up after {} reconnect attempts, continuing on polled data",
                    self.config.max_reconnect_attempts
                );
                self.set_state(ConnectionState::Abandoned);
                self.running.store(false, Ordering::SeqCst);
                return;
            }

            let delay = self.config.reconnect_base_delay * attempt;
            info!(
                "Live feed reconnecting in {}ms (attempt {}/{})",
                delay.as_millis(),
                attempt,
                self.config.max_reconnect_attempts
            );
            self.set_state(ConnectionState::Reconnecting);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.set_state(ConnectionState::Shutdown);
        self.running.store(false, Ordering::SeqCst);
        info!("Live feed stopped");
    }

    /// One connection lifetime. `Ok` only on requested shutdown.
    async fn session(
        &self,
        shutdown: &mut watch::Receiver<bool>,
        attempt: &mut u32,
    ) -> Result<(), FeedError> {
        self.set_state(ConnectionState::Connecting);
        self.stats.lock().connection_attempts += 1;

        let mut ws = tokio::select! {
            connected = self.connect() => connected?,
            _ = shutdown.changed() => return Ok(()),
        };

        self.set_state(ConnectionState::Connected);
        *attempt = 0;
        self.stats.lock().reconnect_attempt = 0;

        let subscribe = serde_json::to_string(&SubscribeMessage::trades())?;
        ws.send(Message::Text(subscribe))
            .await
            .map_err(|e| FeedError::Send(e.to_string()))?;
        info!("Live feed connected and subscribed to trade activity");

        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                frame = ws.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        self.apply_message(&text);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        ws.send(Message::Pong(data))
                            .await
                            .map_err(|e| FeedError::Send(e.to_string()))?;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!("Live feed close frame: {:?}", frame);
                        return Err(FeedError::Closed);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(FeedError::Receive(e.to_string())),
                    None => return Err(FeedError::Closed),
                },
                _ = heartbeat.tick() => {
                    ws.send(Message::Ping(Vec::new()))
                        .await
                        .map_err(|e| FeedError::Send(e.to_string()))?;
                }
                _ = shutdown.changed() => {
                    let _ = ws.close(None).await;
                    return Ok(());
                }
            }
        }
    }

    async fn connect(&self) -> Result<FeedStream, FeedError> {
        let handshake = connect_async(self.config.url.as_str());

        match tokio::time::timeout(CONNECT_TIMEOUT, handshake).await {
            Ok(Ok((ws, _response))) => Ok(ws),
            Ok(Err(e)) => Err(FeedError::Connect(e.to_string())),
            Err(_) => Err(FeedError::Connect(format!(
                "handshake timed out after {:?}",
                CONNECT_TIMEOUT
            ))),
        }
    }

    /// Route one feed frame into the repository. Returns whether a market was
    /// patched; anything unroutable is dropped.
    pub fn apply_message(&self, text: &str) -> bool {
        let patched = parse_trade(text)
            .and_then(|trade| {
                let id = trade
                    .slug
                    .as_deref()
                    .and_then(|slug| self.repository.resolve_slug(slug))
                    .or_else(|| {
                        trade
                            .asset
                            .as_deref()
                            .and_then(|asset| self.repository.resolve_slug(asset))
                    })?;
                Some(self.repository.patch(&id, trade.yes_price()))
            })
            .unwrap_or(false);

        let mut stats = self.stats.lock();
        stats.messages_received += 1;
        if patched {
            stats.patches_applied += 1;
        } else {
            stats.messages_dropped += 1;
        }
        patched
    }
}
