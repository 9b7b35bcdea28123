//! Domain types for venues and their market data.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a trading venue (e.g. `"kraken"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeId(String);

impl ExchangeId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ExchangeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ExchangeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A market symbol `base/quote`, e.g. `BTC/USD`.
///
/// Case is preserved verbatim. Construction only succeeds for strings
/// with exactly one `/` separating two non-empty halves; anything else
/// (e.g. BitFlyer's `FX_BTC_JPY`) is rejected so callers can skip the
/// market without failing the scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    base: String,
    quote: String,
}

impl Symbol {
    #[must_use]
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// Parse a `base/quote` string, returning `None` when malformed.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split('/');
        let base = parts.next()?;
        let quote = parts.next()?;
        if parts.next().is_some() || base.is_empty() || quote.is_empty() {
            return None;
        }
        Some(Self::new(base, quote))
    }

    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    #[must_use]
    pub fn quote(&self) -> &str {
        &self.quote
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl Serialize for Symbol {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Symbol::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("malformed symbol: {raw}")))
    }
}

/// Top-of-book quote for one market.
///
/// Venues report missing sides as `None` or zero; [`Ticker::usable`]
/// treats both the same way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    #[serde(default)]
    pub bid_volume: Option<f64>,
    #[serde(default)]
    pub ask_volume: Option<f64>,
}

impl Ticker {
    /// Whether this ticker can be turned into graph edges.
    ///
    /// Requires positive bid and ask; with `depth` also positive bid
    /// and ask volumes.
    #[must_use]
    pub fn usable(&self, depth: bool) -> bool {
        let positive = |v: Option<f64>| v.is_some_and(|x| x > 0.0);
        let priced = positive(self.bid) && positive(self.ask);
        if depth {
            priced && positive(self.bid_volume) && positive(self.ask_volume)
        } else {
            priced
        }
    }
}

/// One price level of an order book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub volume: f64,
}

/// An order book snapshot, best levels first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

impl OrderBook {
    #[must_use]
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.first().copied()
    }

    #[must_use]
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.first().copied()
    }
}

/// Metadata for one market listed on a venue.
#[derive(Debug, Clone, PartialEq)]
pub struct Market {
    pub symbol: Symbol,
    /// Flat taker fee as a fraction (0.001 == 0.1%). `None` when the
    /// venue does not expose fees through its metadata.
    pub taker_fee: Option<f64>,
}

/// Static properties of a venue used by catalog filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeProperties {
    pub name: String,
    pub countries: Vec<String>,
    /// Capability flags, e.g. `"fetchOrderBook" -> true`.
    pub has: HashMap<String, bool>,
}

/// A property value as seen by catalog filters.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Scalar(String),
    List(Vec<String>),
    Map(HashMap<String, bool>),
}

/// The shape a named property is declared to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Scalar,
    List,
    Map,
}

/// The known venue property names and their shapes.
///
/// `symbols` and `currencies` are derived from loaded markets; the rest
/// come from [`ExchangeProperties`]. Filters referencing anything else
/// are a configuration error.
#[must_use]
pub fn property_kind(name: &str) -> Option<PropertyKind> {
    match name {
        "id" | "name" => Some(PropertyKind::Scalar),
        "countries" | "currencies" | "symbols" => Some(PropertyKind::List),
        "has" => Some(PropertyKind::Map),
        _ => None,
    }
}
