//! The symbol-to-venues collection.

use std::collections::HashMap;

use tracing::debug;

use crate::exchange::{ExchangeId, Symbol};

/// Maps every known symbol to the venues trading it.
///
/// Symbols live in exactly one of two disjoint maps: `markets` for
/// symbols listed on two or more venues, `singletons` for symbols
/// listed on exactly one. [`Collection::insert`] maintains the split;
/// a singleton is promoted the moment a second distinct venue appears.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    markets: HashMap<Symbol, Vec<ExchangeId>>,
    singletons: HashMap<Symbol, ExchangeId>,
}

impl Collection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a collection from its persisted halves.
    #[must_use]
    pub fn from_parts(
        markets: HashMap<Symbol, Vec<ExchangeId>>,
        singletons: HashMap<Symbol, ExchangeId>,
    ) -> Self {
        Self { markets, singletons }
    }

    /// Record that `exchange` lists `symbol`.
    pub fn insert(&mut self, symbol: Symbol, exchange: ExchangeId) {
        if let Some(venues) = self.markets.get_mut(&symbol) {
            if !venues.contains(&exchange) {
                venues.push(exchange);
            }
            return;
        }
        match self.singletons.get(&symbol) {
            Some(existing) if *existing == exchange => {}
            Some(existing) => {
                let promoted = vec![existing.clone(), exchange];
                self.singletons.remove(&symbol);
                self.markets.insert(symbol, promoted);
            }
            None => {
                self.singletons.insert(symbol, exchange);
            }
        }
    }

    /// Venues trading `symbol`: the full list for multi-venue symbols,
    /// a one-element list for singletons, `None` for unknown symbols.
    #[must_use]
    pub fn exchanges_for(&self, symbol: &Symbol) -> Option<Vec<ExchangeId>> {
        if let Some(venues) = self.markets.get(symbol) {
            return Some(venues.clone());
        }
        self.singletons
            .get(symbol)
            .map(|venue| vec![venue.clone()])
    }

    /// Drop `exchange` from `symbol`'s multi-venue entry.
    ///
    /// When only two venues remain the whole entry is removed, since a
    /// one-venue entry can never produce a cross-venue opportunity.
    /// Unknown symbols or venues are a no-op: concurrent opportunity
    /// tasks may race on the same removal.
    pub fn remove_exchange(&mut self, symbol: &Symbol, exchange: &ExchangeId) -> bool {
        let Some(venues) = self.markets.get_mut(symbol) else {
            debug!(market = %symbol, exchange = %exchange, "Removal on unknown symbol ignored");
            return false;
        };
        if !venues.contains(exchange) {
            debug!(market = %symbol, exchange = %exchange, "Removal of absent venue ignored");
            return false;
        }
        if venues.len() > 2 {
            venues.retain(|venue| venue != exchange);
        } else {
            self.markets.remove(symbol);
        }
        true
    }

    /// Multi-venue entries.
    #[must_use]
    pub fn markets(&self) -> &HashMap<Symbol, Vec<ExchangeId>> {
        &self.markets
    }

    /// Single-venue entries.
    #[must_use]
    pub fn singletons(&self) -> &HashMap<Symbol, ExchangeId> {
        &self.singletons
    }

    /// Whether the two maps share no key. Holds by construction; mostly
    /// of interest to tests and persisted-state validation.
    #[must_use]
    pub fn maps_are_disjoint(&self) -> bool {
        self.markets
            .keys()
            .all(|symbol| !self.singletons.contains_key(symbol))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markets.is_empty() && self.singletons.is_empty()
    }
}
