use thiserror::Error;

use crate::exchange::{ExchangeId, Symbol};

/// Classified failures surfaced by a venue client.
///
/// Every error a client can raise maps onto one of these kinds; the
/// scanners and builders decide retry/drop policy from the kind alone,
/// never from venue-specific detail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VenueError {
    /// Network timeout or a 5xx-style hiccup; the market or venue is
    /// dropped for this scan and may succeed on the next one.
    #[error("transient failure on {exchange}: {reason}")]
    Transient { exchange: ExchangeId, reason: String },

    /// The venue asked us to slow down.
    #[error("{exchange} rate limited the request")]
    RateLimited { exchange: ExchangeId },

    /// The venue is down for everyone, not just us.
    #[error("{exchange} is not available")]
    NotAvailable { exchange: ExchangeId },

    /// The venue no longer lists the requested market.
    #[error("{exchange} does not list {symbol}")]
    UnknownMarket { exchange: ExchangeId, symbol: Symbol },

    /// Credentials rejected; the venue is unusable for the whole scan.
    #[error("{exchange} refused authentication")]
    AuthRefused { exchange: ExchangeId },

    /// The venue answered with something we cannot parse.
    #[error("malformed response from {exchange}: {reason}")]
    Malformed { exchange: ExchangeId, reason: String },
}

impl VenueError {
    /// Whether retrying the same call later could plausibly succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            VenueError::Transient { .. } | VenueError::RateLimited { .. } | VenueError::NotAvailable { .. }
        )
    }

    /// The venue the failure originated from.
    #[must_use]
    pub fn exchange(&self) -> &ExchangeId {
        match self {
            VenueError::Transient { exchange, .. }
            | VenueError::RateLimited { exchange }
            | VenueError::NotAvailable { exchange }
            | VenueError::UnknownMarket { exchange, .. }
            | VenueError::AuthRefused { exchange }
            | VenueError::Malformed { exchange, .. } => exchange,
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0} is not present in the collection or the singleton map")]
    UnknownSymbol(Symbol),

    #[error("source node {0} is not in the graph")]
    UnknownSource(String),

    #[error("Venue error: {0}")]
    Venue(#[from] VenueError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
