//! Venue client interface, market-data types and the concurrent
//! fetch fan-out.

mod client;
mod fetch;
mod types;

pub use client::ExchangeClient;
pub use fetch::{fetch_all_tickers, fetch_order_books, TickerBatch};
pub use types::{
    property_kind, ExchangeId, ExchangeProperties, Market, OrderBook, PriceLevel, PropertyKind,
    PropertyValue, Symbol, Ticker,
};
