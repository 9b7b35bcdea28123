//! Gyre - Cross-market cryptocurrency arbitrage detection.
//!
//! Models the trading universe as a weighted directed graph of
//! currencies and runs a Bellman–Ford negative-cycle search over it:
//! a cycle whose log-space weights sum below zero is a sequence of
//! trades that grows its holdings. A cross-venue scanner covers the
//! complementary case of one symbol priced differently on different
//! venues.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── exchange/   # Venue client trait, market-data types, fetch fan-out
//! ├── catalog/    # Symbol -> venues collection, filters, persistence
//! ├── graph/      # Rate edges, digraph/multigraph, graph builders
//! ├── finder/     # Negative-cycle search (plain, depth, multigraph)
//! ├── scanner/    # Cross-venue opportunity scanning
//! ├── config.rs   # TOML configuration + logging setup
//! └── error.rs    # Error taxonomy
//! ```
//!
//! Venue connectivity (HTTP, authentication) lives outside this crate:
//! everything is driven through the
//! [`ExchangeClient`](exchange::ExchangeClient) trait.
//!
//! # Features
//!
//! - `testkit` - Expose the mock venue client and graph fixtures to
//!   integration tests.

pub mod catalog;
pub mod config;
pub mod error;
pub mod exchange;
pub mod finder;
pub mod graph;
pub mod scanner;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use error::{Error, Result, VenueError};
