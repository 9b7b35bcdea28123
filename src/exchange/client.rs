//! The venue client interface consumed by the core.
//!
//! Implementations live outside this crate (HTTP, WebSocket, fixtures);
//! everything here is expressed against the trait so scans can mix real
//! venues with testkit mocks.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::VenueError;
use crate::exchange::{ExchangeId, ExchangeProperties, Market, OrderBook, Symbol, Ticker};

/// A connected venue.
///
/// Methods take `&self`: clients are shared across concurrent fetch
/// tasks, so any mutable session state lives behind the implementation's
/// own locks.
///
/// # Contract
///
/// - [`load_markets`](ExchangeClient::load_markets) must have completed
///   successfully before [`symbols`](ExchangeClient::symbols),
///   [`currencies`](ExchangeClient::currencies) or
///   [`market`](ExchangeClient::market) return anything useful.
/// - [`close`](ExchangeClient::close) is idempotent; the owner of a scan
///   calls it exactly once per client on every exit path.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Stable venue identifier.
    fn id(&self) -> ExchangeId;

    /// Static venue properties (countries, capability flags, ...).
    fn properties(&self) -> ExchangeProperties;

    /// Symbols listed by the venue, in venue order, verbatim as the
    /// venue spells them. Malformed entries (no `/`) are the core's
    /// problem to skip, not the client's to hide.
    fn symbols(&self) -> Vec<String>;

    /// Currencies appearing in the venue's well-formed markets.
    fn currencies(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for raw in self.symbols() {
            let Some(symbol) = Symbol::parse(&raw) else {
                continue;
            };
            for currency in [symbol.base(), symbol.quote()] {
                if !seen.iter().any(|c| c == currency) {
                    seen.push(currency.to_string());
                }
            }
        }
        seen
    }

    /// Metadata for one market, if listed.
    fn market(&self, symbol: &Symbol) -> Option<Market>;

    /// Whether the venue supports fetching all tickers in one call.
    fn has_bulk_tickers(&self) -> bool {
        self.properties().has.get("fetchTickers").copied().unwrap_or(false)
    }

    /// Load (or refresh) the market list and fee metadata.
    async fn load_markets(&self) -> Result<(), VenueError>;

    /// Fetch the top-of-book ticker for one market.
    async fn fetch_ticker(&self, symbol: &Symbol) -> Result<Ticker, VenueError>;

    /// Fetch all tickers at once, when the venue supports it. Keys are
    /// venue-spelled symbol strings.
    async fn fetch_tickers(&self) -> Result<HashMap<String, Ticker>, VenueError>;

    /// Fetch an order book snapshot for one market.
    async fn fetch_order_book(&self, symbol: &Symbol) -> Result<OrderBook, VenueError>;

    /// Release the transport. Idempotent.
    async fn close(&self) -> Result<(), VenueError>;
}
