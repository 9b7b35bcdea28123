//! Scriptable mock venue client.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::VenueError;
use crate::exchange::{
    ExchangeClient, ExchangeId, ExchangeProperties, Market, OrderBook, PriceLevel, Symbol, Ticker,
};

/// A fully in-memory [`ExchangeClient`] with scriptable failures and
/// call counters.
///
/// Built through [`MockExchange::builder`]. Counters make the §-level
/// resource contracts testable: `close_count` must end at exactly one
/// per scan.
pub struct MockExchange {
    id: ExchangeId,
    properties: ExchangeProperties,
    taker_fee: Option<f64>,
    tickers: HashMap<String, Ticker>,
    books: HashMap<String, OrderBook>,

    tickers_fail_transient: bool,
    load_markets_auth_refused: bool,
    load_markets_failures_left: Mutex<u32>,
    book_failures_left: Mutex<u32>,

    load_markets_calls: AtomicUsize,
    ticker_calls: AtomicUsize,
    order_book_calls: AtomicUsize,
    close_calls: AtomicUsize,
}

impl MockExchange {
    #[must_use]
    pub fn builder(id: &str) -> MockExchangeBuilder {
        MockExchangeBuilder {
            id: ExchangeId::from(id),
            name: id.to_string(),
            countries: Vec::new(),
            has: HashMap::from([("fetchTickers".to_string(), true)]),
            taker_fee: None,
            tickers: HashMap::new(),
            books: HashMap::new(),
            tickers_fail_transient: false,
            load_markets_auth_refused: false,
            load_markets_failures: 0,
            book_failures: 0,
        }
    }

    #[must_use]
    pub fn close_count(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn load_markets_count(&self) -> usize {
        self.load_markets_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn ticker_count(&self) -> usize {
        self.ticker_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn order_book_count(&self) -> usize {
        self.order_book_calls.load(Ordering::SeqCst)
    }

    fn listed(&self, symbol: &str) -> bool {
        self.tickers.contains_key(symbol) || self.books.contains_key(symbol)
    }
}

#[async_trait]
impl ExchangeClient for MockExchange {
    fn id(&self) -> ExchangeId {
        self.id.clone()
    }

    fn properties(&self) -> ExchangeProperties {
        self.properties.clone()
    }

    fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .tickers
            .keys()
            .chain(self.books.keys())
            .cloned()
            .collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }

    fn market(&self, symbol: &Symbol) -> Option<Market> {
        self.listed(&symbol.to_string()).then(|| Market {
            symbol: symbol.clone(),
            taker_fee: self.taker_fee,
        })
    }

    async fn load_markets(&self) -> Result<(), VenueError> {
        self.load_markets_calls.fetch_add(1, Ordering::SeqCst);
        if self.load_markets_auth_refused {
            return Err(VenueError::AuthRefused {
                exchange: self.id.clone(),
            });
        }
        let mut left = self.load_markets_failures_left.lock();
        if *left > 0 {
            *left -= 1;
            return Err(VenueError::RateLimited {
                exchange: self.id.clone(),
            });
        }
        Ok(())
    }

    async fn fetch_ticker(&self, symbol: &Symbol) -> Result<Ticker, VenueError> {
        self.ticker_calls.fetch_add(1, Ordering::SeqCst);
        self.tickers
            .get(&symbol.to_string())
            .copied()
            .ok_or_else(|| VenueError::UnknownMarket {
                exchange: self.id.clone(),
                symbol: symbol.clone(),
            })
    }

    async fn fetch_tickers(&self) -> Result<HashMap<String, Ticker>, VenueError> {
        if self.tickers_fail_transient {
            return Err(VenueError::Transient {
                exchange: self.id.clone(),
                reason: "scripted failure".to_string(),
            });
        }
        Ok(self.tickers.clone())
    }

    async fn fetch_order_book(&self, symbol: &Symbol) -> Result<OrderBook, VenueError> {
        self.order_book_calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut left = self.book_failures_left.lock();
            if *left > 0 {
                *left -= 1;
                return Err(VenueError::RateLimited {
                    exchange: self.id.clone(),
                });
            }
        }
        self.books
            .get(&symbol.to_string())
            .cloned()
            .ok_or_else(|| VenueError::UnknownMarket {
                exchange: self.id.clone(),
                symbol: symbol.clone(),
            })
    }

    async fn close(&self) -> Result<(), VenueError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Builder for [`MockExchange`].
pub struct MockExchangeBuilder {
    id: ExchangeId,
    name: String,
    countries: Vec<String>,
    has: HashMap<String, bool>,
    taker_fee: Option<f64>,
    tickers: HashMap<String, Ticker>,
    books: HashMap<String, OrderBook>,
    tickers_fail_transient: bool,
    load_markets_auth_refused: bool,
    load_markets_failures: u32,
    book_failures: u32,
}

impl MockExchangeBuilder {
    /// Declare the venue's countries.
    #[must_use]
    pub fn countries(mut self, countries: &[&str]) -> Self {
        self.countries = countries.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Set one capability flag.
    #[must_use]
    pub fn capability(mut self, name: &str, supported: bool) -> Self {
        self.has.insert(name.to_string(), supported);
        self
    }

    /// Taker fee applied to every market.
    #[must_use]
    pub fn taker_fee(mut self, fee: f64) -> Self {
        self.taker_fee = Some(fee);
        self
    }

    /// List a market with the given ticker.
    #[must_use]
    pub fn ticker(mut self, symbol: &str, ticker: Ticker) -> Self {
        self.tickers.insert(symbol.to_string(), ticker);
        self
    }

    /// List a market under a venue-spelled (possibly malformed) name.
    #[must_use]
    pub fn raw_ticker(self, symbol: &str, ticker: Ticker) -> Self {
        self.ticker(symbol, ticker)
    }

    /// List a market with a one-level order book.
    #[must_use]
    pub fn book_levels(mut self, symbol: &str, bid: (f64, f64), ask: (f64, f64)) -> Self {
        self.books.insert(
            symbol.to_string(),
            OrderBook {
                bids: vec![PriceLevel {
                    price: bid.0,
                    volume: bid.1,
                }],
                asks: vec![PriceLevel {
                    price: ask.0,
                    volume: ask.1,
                }],
            },
        );
        self
    }

    /// List a market whose book is empty on both sides.
    #[must_use]
    pub fn empty_book(mut self, symbol: &str) -> Self {
        self.books.insert(symbol.to_string(), OrderBook::default());
        self
    }

    /// Every `fetch_tickers` call fails with a transient error.
    #[must_use]
    pub fn tickers_fail_transient(mut self) -> Self {
        self.tickers_fail_transient = true;
        self
    }

    /// Every `load_markets` call is refused.
    #[must_use]
    pub fn load_markets_fail_auth(mut self) -> Self {
        self.load_markets_auth_refused = true;
        self
    }

    /// The first `n` `load_markets` calls are rate limited.
    #[must_use]
    pub fn load_markets_rate_limited_times(mut self, n: u32) -> Self {
        self.load_markets_failures = n;
        self
    }

    /// The first `n` `fetch_order_book` calls are rate limited.
    #[must_use]
    pub fn books_rate_limited_times(mut self, n: u32) -> Self {
        self.book_failures = n;
        self
    }

    #[must_use]
    pub fn build(self) -> MockExchange {
        MockExchange {
            id: self.id,
            properties: ExchangeProperties {
                name: self.name,
                countries: self.countries,
                has: self.has,
            },
            taker_fee: self.taker_fee,
            tickers: self.tickers,
            books: self.books,
            tickers_fail_transient: self.tickers_fail_transient,
            load_markets_auth_refused: self.load_markets_auth_refused,
            load_markets_failures_left: Mutex::new(self.load_markets_failures),
            book_failures_left: Mutex::new(self.book_failures),
            load_markets_calls: AtomicUsize::new(0),
            ticker_calls: AtomicUsize::new(0),
            order_book_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
        }
    }
}
