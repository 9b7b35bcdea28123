//! Bulk cross-venue scanner over a whole collection.
//!
//! One task per collection entry assembles that symbol's opportunity;
//! the shared rate-limited set coordinates cooperative back-off between
//! tasks so a throttling venue is not hammered from several
//! opportunities at once.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use futures_util::stream::{FuturesUnordered, StreamExt};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::catalog::Collection;
use crate::error::VenueError;
use crate::exchange::{ExchangeClient, ExchangeId, Symbol};
use crate::scanner::CrossExchangeOpportunity;

/// Cooperative sleep after a venue rate limits, before its retry.
pub const RATE_LIMIT_COOLDOWN: Duration = Duration::from_millis(200);

/// Poll interval of the pre-dispatch gate while any of an
/// opportunity's venues is rate limited.
pub const RATE_LIMIT_GATE_POLL: Duration = Duration::from_millis(100);

/// Default stagger between opportunity dispatches.
pub const DEFAULT_OPPORTUNITY_INTERVAL: Duration = Duration::from_millis(50);

struct Shared {
    clients: HashMap<ExchangeId, Arc<dyn ExchangeClient>>,
    collection: RwLock<Collection>,
    rate_limited: DashSet<ExchangeId>,
}

/// Scans every multi-venue collection entry for price disparities.
pub struct BulkScanner {
    shared: Arc<Shared>,
    opportunity_interval: Duration,
}

impl BulkScanner {
    #[must_use]
    pub fn new(clients: Vec<Arc<dyn ExchangeClient>>, collection: Collection) -> Self {
        let clients = clients
            .into_iter()
            .map(|client| (client.id(), client))
            .collect();
        Self {
            shared: Arc::new(Shared {
                clients,
                collection: RwLock::new(collection),
                rate_limited: DashSet::new(),
            }),
            opportunity_interval: DEFAULT_OPPORTUNITY_INTERVAL,
        }
    }

    /// Override the dispatch stagger interval.
    #[must_use]
    pub fn opportunity_interval(mut self, interval: Duration) -> Self {
        self.opportunity_interval = interval;
        self
    }

    /// Dispatch every opportunity and return the result stream.
    ///
    /// Dispatch `i` is delayed by `i * opportunity_interval` to avoid a
    /// head-of-line burst against shared venues.
    #[must_use]
    pub fn into_stream(self) -> OpportunityStream {
        let mut symbols: Vec<Symbol> = self
            .shared
            .collection
            .read()
            .markets()
            .keys()
            .cloned()
            .collect();
        symbols.sort();

        info!(opportunities = symbols.len(), "Dispatching bulk scan");
        let pending: FuturesUnordered<OpportunityFuture> = symbols
            .into_iter()
            .enumerate()
            .map(|(index, symbol)| {
                let shared = Arc::clone(&self.shared);
                let interval = self.opportunity_interval;
                Box::pin(find_opportunity(shared, symbol, index as u32, interval))
                    as OpportunityFuture
            })
            .collect();

        OpportunityStream {
            shared: self.shared,
            pending,
            closed: false,
        }
    }
}

type OpportunityFuture = Pin<Box<dyn Future<Output = CrossExchangeOpportunity> + Send>>;

/// Lazy stream of assembled opportunities, in completion order.
///
/// Dropping the stream cancels every in-flight fetch. Venue clients
/// are closed exactly once: automatically when the stream drains, or
/// through [`finish`](OpportunityStream::finish) when the consumer
/// stops early.
pub struct OpportunityStream {
    shared: Arc<Shared>,
    pending: FuturesUnordered<OpportunityFuture>,
    closed: bool,
}

impl OpportunityStream {
    /// The next assembled opportunity, or `None` once the scan is
    /// complete (at which point all clients have been closed).
    pub async fn next(&mut self) -> Option<CrossExchangeOpportunity> {
        match self.pending.next().await {
            Some(opportunity) => Some(opportunity),
            None => {
                self.close_clients().await;
                None
            }
        }
    }

    /// Abandon any remaining opportunities and release every client.
    pub async fn finish(mut self) {
        self.pending.clear();
        self.close_clients().await;
    }

    /// Snapshot of the (possibly reduced) collection.
    #[must_use]
    pub fn collection(&self) -> Collection {
        self.shared.collection.read().clone()
    }

    /// Opportunities not yet yielded.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    async fn close_clients(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut closing: FuturesUnordered<_> = self
            .shared
            .clients
            .values()
            .map(|client| {
                let client = Arc::clone(client);
                async move { (client.id(), client.close().await) }
            })
            .collect();
        while let Some((exchange, result)) = closing.next().await {
            if let Err(error) = result {
                warn!(exchange = %exchange, %error, "Close failed");
            }
        }
        info!("Bulk scan released all venue clients");
    }
}

/// Assemble the opportunity for one symbol.
///
/// The best-quote fold runs entirely in this task; concurrent tasks
/// only share the collection (behind its lock) and the rate-limited
/// set.
async fn find_opportunity(
    shared: Arc<Shared>,
    symbol: Symbol,
    index: u32,
    interval: Duration,
) -> CrossExchangeOpportunity {
    tokio::time::sleep(interval * index).await;

    let mut opportunity = CrossExchangeOpportunity::new(symbol.clone());
    // Venues dropped for this opportunity only: a second rate limit or
    // a vanished market. Transient failures stay retryable across
    // attempts.
    let mut dropped: HashSet<ExchangeId> = HashSet::new();
    let mut rate_limit_strikes: HashMap<ExchangeId, u32> = HashMap::new();

    'attempt: loop {
        // Gate: wait while any venue of this opportunity is cooling
        // down, re-resolving against the live collection each poll.
        let venues = loop {
            let Some(current) = shared.collection.read().exchanges_for(&symbol) else {
                debug!(market = %symbol, "Entry vanished, returning what was accumulated");
                return opportunity;
            };
            let current: Vec<ExchangeId> = current
                .into_iter()
                .filter(|venue| !dropped.contains(venue))
                .collect();
            if current.is_empty() {
                return opportunity;
            }
            if current
                .iter()
                .any(|venue| shared.rate_limited.contains(venue))
            {
                tokio::time::sleep(RATE_LIMIT_GATE_POLL).await;
                continue;
            }
            break current;
        };

        opportunity = CrossExchangeOpportunity::new(symbol.clone());
        let mut fetching: FuturesUnordered<_> = venues
            .iter()
            .filter_map(|venue| {
                let Some(client) = shared.clients.get(venue) else {
                    warn!(exchange = %venue, market = %symbol, "No client for venue");
                    return None;
                };
                let client = Arc::clone(client);
                let venue = venue.clone();
                let symbol = symbol.clone();
                Some(async move { (venue, client.fetch_order_book(&symbol).await) })
            })
            .collect();

        while let Some((venue, result)) = fetching.next().await {
            match result {
                Ok(book) => {
                    if book.bids.is_empty() || book.asks.is_empty() {
                        debug!(exchange = %venue, market = %symbol, "Empty book discarded");
                        continue;
                    }
                    opportunity.observe(&venue, &book);
                }
                Err(error @ (VenueError::RateLimited { .. } | VenueError::Transient { .. })) => {
                    let strikes = rate_limit_strikes.entry(venue.clone()).or_insert(0);
                    *strikes += 1;
                    if *strikes >= 2 {
                        warn!(exchange = %venue, market = %symbol, %error, "Rate limited twice, venue dropped");
                        dropped.insert(venue);
                        continue;
                    }
                    warn!(exchange = %venue, market = %symbol, %error, "Rate limited, backing off");
                    shared.rate_limited.insert(venue.clone());
                    tokio::time::sleep(RATE_LIMIT_COOLDOWN).await;
                    // Another task may have already cleared it.
                    shared.rate_limited.remove(&venue);
                    continue 'attempt;
                }
                Err(error @ VenueError::UnknownMarket { .. }) => {
                    warn!(exchange = %venue, market = %symbol, %error, "Venue removed from entry");
                    shared.collection.write().remove_exchange(&symbol, &venue);
                    dropped.insert(venue);
                }
                Err(error) => {
                    warn!(exchange = %venue, market = %symbol, %error, "Venue discarded for this attempt");
                }
            }
        }

        debug!(market = %symbol, valuable = opportunity.is_valuable(), "Opportunity assembled");
        return opportunity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::MockExchange;

    fn symbol(raw: &str) -> Symbol {
        Symbol::parse(raw).unwrap()
    }

    fn collection_of(entries: &[(&str, &[&str])]) -> Collection {
        let mut collection = Collection::new();
        for (market, venues) in entries {
            for venue in *venues {
                collection.insert(symbol(market), ExchangeId::from(*venue));
            }
        }
        collection
    }

    fn fast_scanner(clients: Vec<Arc<dyn ExchangeClient>>, collection: Collection) -> BulkScanner {
        BulkScanner::new(clients, collection).opportunity_interval(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn scans_every_entry_and_closes_once() {
        let a = Arc::new(
            MockExchange::builder("a")
                .book_levels("BTC/USD", (100.0, 1.0), (101.0, 1.0))
                .book_levels("ETH/USD", (10.0, 1.0), (10.5, 1.0))
                .build(),
        );
        let b = Arc::new(
            MockExchange::builder("b")
                .book_levels("BTC/USD", (102.0, 1.0), (102.5, 1.0))
                .book_levels("ETH/USD", (9.0, 1.0), (9.5, 1.0))
                .build(),
        );
        let collection = collection_of(&[("BTC/USD", &["a", "b"]), ("ETH/USD", &["a", "b"])]);

        let mut stream = fast_scanner(vec![a.clone() as _, b.clone() as _], collection).into_stream();
        let mut seen = Vec::new();
        while let Some(opportunity) = stream.next().await {
            seen.push(opportunity);
        }

        assert_eq!(seen.len(), 2);
        let btc = seen.iter().find(|o| o.symbol == symbol("BTC/USD")).unwrap();
        assert_eq!(btc.highest_bid.as_ref().unwrap().exchange, ExchangeId::from("b"));
        assert_eq!(btc.lowest_ask.as_ref().unwrap().exchange, ExchangeId::from("a"));
        assert!(btc.is_valuable());

        let eth = seen.iter().find(|o| o.symbol == symbol("ETH/USD")).unwrap();
        assert_eq!(eth.lowest_ask.as_ref().unwrap().exchange, ExchangeId::from("b"));

        assert_eq!(a.close_count(), 1);
        assert_eq!(b.close_count(), 1);
    }

    #[tokio::test]
    async fn rate_limited_venue_is_retried_after_cooldown() {
        let v1 = Arc::new(
            MockExchange::builder("v1")
                .book_levels("BTC/USD", (100.0, 1.0), (101.0, 1.0))
                .build(),
        );
        let v2 = Arc::new(
            MockExchange::builder("v2")
                .book_levels("BTC/USD", (102.0, 1.0), (102.5, 1.0))
                .books_rate_limited_times(1)
                .build(),
        );
        let v3 = Arc::new(
            MockExchange::builder("v3")
                .book_levels("BTC/USD", (99.0, 1.0), (100.5, 1.0))
                .build(),
        );
        let collection = collection_of(&[("BTC/USD", &["v1", "v2", "v3"])]);

        let mut stream = fast_scanner(
            vec![v1.clone() as _, v2.clone() as _, v3.clone() as _],
            collection,
        )
        .into_stream();

        let opportunity = stream.next().await.unwrap();
        assert!(stream.next().await.is_none());

        // V2 was retried after the back-off and won the bid.
        assert!(v2.order_book_count() >= 2);
        assert_eq!(
            opportunity.highest_bid.as_ref().unwrap().exchange,
            ExchangeId::from("v2")
        );
        // V1 and V3 top-of-book made it in as well.
        assert_eq!(
            opportunity.lowest_ask.as_ref().unwrap().exchange,
            ExchangeId::from("v3")
        );
    }

    #[tokio::test]
    async fn persistently_rate_limited_venue_is_dropped() {
        let v1 = Arc::new(
            MockExchange::builder("v1")
                .book_levels("BTC/USD", (100.0, 1.0), (101.0, 1.0))
                .build(),
        );
        let v2 = Arc::new(
            MockExchange::builder("v2")
                .book_levels("BTC/USD", (102.0, 1.0), (102.5, 1.0))
                .books_rate_limited_times(10)
                .build(),
        );
        let collection = collection_of(&[("BTC/USD", &["v1", "v2"])]);

        let mut stream =
            fast_scanner(vec![v1.clone() as _, v2.clone() as _], collection).into_stream();
        let opportunity = stream.next().await.unwrap();

        // V2 got its one retry and was then dropped.
        assert_eq!(v2.order_book_count(), 2);
        assert_eq!(
            opportunity.highest_bid.as_ref().unwrap().exchange,
            ExchangeId::from("v1")
        );
    }

    #[tokio::test]
    async fn unknown_market_removes_venue_from_collection() {
        // V1 does not list X/Y at all: every fetch is UnknownMarket.
        let v1 = Arc::new(MockExchange::builder("v1").build());
        let v2 = Arc::new(
            MockExchange::builder("v2")
                .book_levels("X/Y", (5.0, 1.0), (5.5, 1.0))
                .build(),
        );
        let v3 = Arc::new(
            MockExchange::builder("v3")
                .book_levels("X/Y", (5.2, 1.0), (5.6, 1.0))
                .build(),
        );
        let collection = collection_of(&[("X/Y", &["v1", "v2", "v3"])]);

        let mut stream = fast_scanner(
            vec![v1.clone() as _, v2.clone() as _, v3.clone() as _],
            collection,
        )
        .into_stream();

        let opportunity = stream.next().await.unwrap();
        assert_eq!(
            opportunity.highest_bid.as_ref().unwrap().exchange,
            ExchangeId::from("v3")
        );

        let reduced = stream.collection();
        assert_eq!(
            reduced.exchanges_for(&symbol("X/Y")),
            Some(vec![ExchangeId::from("v2"), ExchangeId::from("v3")])
        );
    }

    #[tokio::test]
    async fn two_venue_entry_degrades_to_single_venue_best_pair() {
        let v1 = Arc::new(MockExchange::builder("v1").build());
        let v2 = Arc::new(
            MockExchange::builder("v2")
                .book_levels("X/Y", (5.0, 1.0), (5.5, 1.0))
                .build(),
        );
        let collection = collection_of(&[("X/Y", &["v1", "v2"])]);

        let mut stream =
            fast_scanner(vec![v1.clone() as _, v2.clone() as _], collection).into_stream();
        let opportunity = stream.next().await.unwrap();

        // The entry is gone, but V2's quotes were still reported.
        assert_eq!(
            opportunity.highest_bid.as_ref().unwrap().exchange,
            ExchangeId::from("v2")
        );
        assert_eq!(
            opportunity.lowest_ask.as_ref().unwrap().exchange,
            ExchangeId::from("v2")
        );
        assert!(!opportunity.is_valuable());
        assert!(stream.collection().exchanges_for(&symbol("X/Y")).is_none());
    }

    #[tokio::test]
    async fn early_finish_closes_clients_exactly_once() {
        let a = Arc::new(
            MockExchange::builder("a")
                .book_levels("BTC/USD", (100.0, 1.0), (101.0, 1.0))
                .build(),
        );
        let b = Arc::new(
            MockExchange::builder("b")
                .book_levels("BTC/USD", (102.0, 1.0), (102.5, 1.0))
                .build(),
        );
        let collection = collection_of(&[("BTC/USD", &["a", "b"])]);

        let stream = fast_scanner(vec![a.clone() as _, b.clone() as _], collection).into_stream();
        stream.finish().await;

        assert_eq!(a.close_count(), 1);
        assert_eq!(b.close_count(), 1);
    }
}
