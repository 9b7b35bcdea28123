//! Collection builders: concurrent market discovery across venues.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use crate::catalog::{Collection, CollectionStore, FilterOp, PropertyFilter};
use crate::error::{Error, Result, VenueError};
use crate::exchange::{ExchangeClient, ExchangeId, PropertyValue, Symbol};

/// Builds collections by loading every venue's market list.
///
/// A build is a complete scan over its clients: each client's markets
/// are loaded once and its transport is closed once, on success and on
/// failure alike.
pub struct CollectionBuilder {
    clients: Vec<Arc<dyn ExchangeClient>>,
    strict_errors: bool,
}

impl CollectionBuilder {
    #[must_use]
    pub fn new(clients: Vec<Arc<dyn ExchangeClient>>) -> Self {
        Self {
            clients,
            strict_errors: false,
        }
    }

    /// Surface venue failures instead of silently dropping the venue.
    #[must_use]
    pub fn strict_errors(mut self, strict: bool) -> Self {
        self.strict_errors = strict;
        self
    }

    /// Load every venue's markets concurrently, returning the clients
    /// that succeeded. Every client is closed exactly once.
    async fn load_all(&self) -> Result<Vec<Arc<dyn ExchangeClient>>> {
        let mut loading: FuturesUnordered<_> = self
            .clients
            .iter()
            .map(|client| {
                let client = Arc::clone(client);
                async move {
                    let result = client.load_markets().await;
                    if let Err(error) = client.close().await {
                        warn!(exchange = %client.id(), %error, "Close failed");
                    }
                    (client, result)
                }
            })
            .collect();

        let mut loaded = Vec::with_capacity(self.clients.len());
        let mut first_failure: Option<VenueError> = None;
        while let Some((client, result)) = loading.next().await {
            match result {
                Ok(()) => loaded.push(client),
                Err(error) => {
                    warn!(exchange = %client.id(), %error, "Market load failed, venue dropped");
                    first_failure.get_or_insert(error);
                }
            }
        }

        if self.strict_errors {
            if let Some(error) = first_failure {
                return Err(error.into());
            }
        }
        Ok(loaded)
    }

    /// Build the collection over every venue.
    ///
    /// With `store` the result is persisted to the two JSON files.
    pub async fn build_all(&self, store: Option<&CollectionStore>) -> Result<Collection> {
        self.build_filtered(&[], store).await
    }

    /// Build the collection over venues passing every filter.
    pub async fn build_specific(
        &self,
        filters: &[PropertyFilter],
        store: Option<&CollectionStore>,
    ) -> Result<Collection> {
        self.build_filtered(filters, store).await
    }

    async fn build_filtered(
        &self,
        filters: &[PropertyFilter],
        store: Option<&CollectionStore>,
    ) -> Result<Collection> {
        info!(venues = self.clients.len(), filters = filters.len(), "Building collection");
        let loaded = self.load_all().await?;

        let mut collection = Collection::new();
        for client in &loaded {
            if !filters.iter().all(|filter| filter.matches(client.as_ref())) {
                debug!(exchange = %client.id(), "Venue rejected by filters");
                continue;
            }
            let exchange = client.id();
            for raw in client.symbols() {
                let Some(symbol) = Symbol::parse(&raw) else {
                    debug!(exchange = %exchange, market = raw, "Malformed symbol skipped");
                    continue;
                };
                collection.insert(symbol, exchange.clone());
            }
        }

        info!(
            markets = collection.markets().len(),
            singletons = collection.singletons().len(),
            "Built collection"
        );
        if let Some(store) = store {
            store.write(&collection)?;
        }
        Ok(collection)
    }

    /// Build a symbol-scoped map: only markets that are explicitly
    /// requested, touch an inclusive currency, or pair two exclusive
    /// currencies (either orientation).
    ///
    /// The result may contain single-venue entries and is therefore a
    /// plain map, not a [`Collection`].
    pub async fn build_for_symbols(
        &self,
        symbols: &[Symbol],
        inclusive_currencies: &[String],
        exclusive_currencies: &[String],
    ) -> Result<HashMap<Symbol, Vec<ExchangeId>>> {
        let loaded = self.load_all().await?;

        let mut map: HashMap<Symbol, Vec<ExchangeId>> = HashMap::new();
        let mut add = |map: &mut HashMap<Symbol, Vec<ExchangeId>>, symbol: Symbol, venue: ExchangeId| {
            let venues = map.entry(symbol).or_default();
            if !venues.contains(&venue) {
                venues.push(venue);
            }
        };

        for client in &loaded {
            let exchange = client.id();
            let listed = client.symbols();
            let currencies = client.currencies();

            for (i, first) in exclusive_currencies.iter().enumerate() {
                if !currencies.contains(first) {
                    continue;
                }
                for second in &exclusive_currencies[i + 1..] {
                    if !currencies.contains(second) {
                        continue;
                    }
                    for candidate in [
                        Symbol::new(first.clone(), second.clone()),
                        Symbol::new(second.clone(), first.clone()),
                    ] {
                        if listed.contains(&candidate.to_string()) {
                            add(&mut map, candidate, exchange.clone());
                            break;
                        }
                    }
                }
            }

            for raw in &listed {
                let Some(symbol) = Symbol::parse(raw) else {
                    continue;
                };
                let touches_inclusive = inclusive_currencies
                    .iter()
                    .any(|currency| currency == symbol.base() || currency == symbol.quote());
                if touches_inclusive || symbols.contains(&symbol) {
                    add(&mut map, symbol, exchange.clone());
                }
            }
        }
        Ok(map)
    }

    /// Venues trading `symbol`, from the persisted collection when
    /// available, otherwise from a live single-symbol build.
    ///
    /// Signals [`Error::UnknownSymbol`] when the symbol is nowhere.
    pub async fn exchanges_for(
        &self,
        symbol: &Symbol,
        store: &CollectionStore,
    ) -> Result<Vec<ExchangeId>> {
        if let Some(collection) = store.load()? {
            return collection
                .exchanges_for(symbol)
                .ok_or_else(|| Error::UnknownSymbol(symbol.clone()));
        }

        debug!(market = %symbol, "No persisted collection, building live");
        let filter = PropertyFilter::new(
            "symbols",
            FilterOp::SubsetOf,
            PropertyValue::List(vec![symbol.to_string()]),
            false,
        )?;
        let collection = self.build_specific(&[filter], None).await?;
        collection
            .exchanges_for(symbol)
            .ok_or_else(|| Error::UnknownSymbol(symbol.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::Ticker;
    use crate::testkit::MockExchange;

    fn symbol(raw: &str) -> Symbol {
        Symbol::parse(raw).unwrap()
    }

    fn venue(id: &str, markets: &[&str]) -> Arc<MockExchange> {
        let mut builder = MockExchange::builder(id);
        for market in markets {
            builder = builder.ticker(market, Ticker::default());
        }
        Arc::new(builder.build())
    }

    fn as_clients(venues: &[Arc<MockExchange>]) -> Vec<Arc<dyn ExchangeClient>> {
        venues
            .iter()
            .map(|venue| Arc::clone(venue) as Arc<dyn ExchangeClient>)
            .collect()
    }

    #[tokio::test]
    async fn build_all_splits_markets_and_singletons() {
        let a = venue("a", &["A/B", "A/C", "B/C"]);
        let b = venue("b", &["A/B", "D/C"]);
        let builder = CollectionBuilder::new(as_clients(&[a.clone(), b.clone()]));

        let collection = builder.build_all(None).await.unwrap();

        assert_eq!(
            collection.exchanges_for(&symbol("A/B")).unwrap().len(),
            2
        );
        assert_eq!(
            collection.exchanges_for(&symbol("D/C")),
            Some(vec![ExchangeId::from("b")])
        );
        assert!(collection.maps_are_disjoint());
        assert_eq!(a.close_count(), 1);
        assert_eq!(b.close_count(), 1);
    }

    #[tokio::test]
    async fn failing_venue_is_dropped_unless_strict() {
        let good = venue("good", &["A/B"]);
        let bad = Arc::new(
            MockExchange::builder("bad")
                .load_markets_fail_auth()
                .build(),
        );
        let clients: Vec<Arc<dyn ExchangeClient>> =
            vec![good.clone() as _, bad.clone() as _];

        let collection = CollectionBuilder::new(clients.clone())
            .build_all(None)
            .await
            .unwrap();
        assert_eq!(
            collection.exchanges_for(&symbol("A/B")),
            Some(vec![ExchangeId::from("good")])
        );
        assert_eq!(bad.close_count(), 1);

        let error = CollectionBuilder::new(clients)
            .strict_errors(true)
            .build_all(None)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Venue(VenueError::AuthRefused { .. })));
        assert_eq!(bad.close_count(), 2);
    }

    #[tokio::test]
    async fn build_specific_filters_venues() {
        let us = Arc::new(
            MockExchange::builder("us-venue")
                .countries(&["US"])
                .ticker("A/B", Ticker::default())
                .build(),
        );
        let jp = Arc::new(
            MockExchange::builder("jp-venue")
                .countries(&["JP"])
                .ticker("A/B", Ticker::default())
                .build(),
        );
        let builder =
            CollectionBuilder::new(vec![us.clone() as _, jp.clone() as _]);

        let filter = PropertyFilter::countries("US", false).unwrap();
        let collection = builder.build_specific(&[filter], None).await.unwrap();

        assert_eq!(
            collection.exchanges_for(&symbol("A/B")),
            Some(vec![ExchangeId::from("us-venue")])
        );
    }

    #[tokio::test]
    async fn build_for_symbols_selects_requested_and_currency_scoped() {
        let a = venue("a", &["A/B", "A/C", "B/C", "E/C"]);
        let b = venue("b", &["A/B", "D/C", "B/C", "E/A", "A/X"]);
        let builder = CollectionBuilder::new(as_clients(&[a, b]));

        let map = builder
            .build_for_symbols(
                &[symbol("D/C")],
                &["D".to_string()],
                &["B".to_string(), "X".to_string(), "C".to_string()],
            )
            .await
            .unwrap();

        let mut keys: Vec<String> = map.keys().map(|s| s.to_string()).collect();
        keys.sort();
        assert_eq!(keys, vec!["B/C", "D/C"]);
        assert_eq!(map[&symbol("B/C")].len(), 2);
        assert_eq!(map[&symbol("D/C")], vec![ExchangeId::from("b")]);
    }

    #[tokio::test]
    async fn exchanges_for_prefers_persisted_collection() {
        let dir = tempfile::tempdir().unwrap();
        let store = CollectionStore::new(dir.path());

        let mut persisted = Collection::new();
        persisted.insert(symbol("A/B"), ExchangeId::from("x"));
        persisted.insert(symbol("A/B"), ExchangeId::from("y"));
        store.write(&persisted).unwrap();

        // Live clients disagree with the store; the store wins.
        let builder = CollectionBuilder::new(as_clients(&[venue("z", &["A/B"])]));
        let venues = builder.exchanges_for(&symbol("A/B"), &store).await.unwrap();
        assert_eq!(venues, vec![ExchangeId::from("x"), ExchangeId::from("y")]);
    }

    #[tokio::test]
    async fn exchanges_for_falls_back_to_live_build() {
        let dir = tempfile::tempdir().unwrap();
        let store = CollectionStore::new(dir.path());

        let builder = CollectionBuilder::new(as_clients(&[venue("z", &["A/B"])]));
        let venues = builder.exchanges_for(&symbol("A/B"), &store).await.unwrap();
        assert_eq!(venues, vec![ExchangeId::from("z")]);
    }

    #[tokio::test]
    async fn unknown_symbol_is_signaled() {
        let dir = tempfile::tempdir().unwrap();
        let store = CollectionStore::new(dir.path());

        let builder = CollectionBuilder::new(as_clients(&[venue("z", &["A/B"])]));
        let error = builder
            .exchanges_for(&symbol("NO/PE"), &store)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::UnknownSymbol(_)));
    }
}
