//! Single-symbol cross-venue opportunity finder.

use std::sync::Arc;

use futures_util::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, warn};

use crate::exchange::ExchangeClient;
use crate::exchange::Symbol;
use crate::scanner::CrossExchangeOpportunity;

/// Finds the largest price disparity for one symbol by asking every
/// venue for its top-of-book.
///
/// One-shot: each client is closed right after its fetch, success or
/// failure, and the finder is consumed by
/// [`find_min_max`](OpportunityFinder::find_min_max).
pub struct OpportunityFinder {
    symbol: Symbol,
    clients: Vec<Arc<dyn ExchangeClient>>,
}

impl OpportunityFinder {
    #[must_use]
    pub fn new(symbol: Symbol, clients: Vec<Arc<dyn ExchangeClient>>) -> Self {
        Self { symbol, clients }
    }

    /// Fan out the fetches and fold the best bid/ask as results land.
    ///
    /// The fold runs in this task alone, so the `(highest_bid,
    /// lowest_ask)` pair is never written concurrently. A venue with an
    /// empty book or a failed fetch simply contributes nothing.
    pub async fn find_min_max(self) -> CrossExchangeOpportunity {
        let symbol = self.symbol;
        let mut fetching: FuturesUnordered<_> = self
            .clients
            .iter()
            .map(|client| {
                let client = Arc::clone(client);
                let symbol = symbol.clone();
                async move {
                    let result = client.fetch_order_book(&symbol).await;
                    if let Err(error) = client.close().await {
                        warn!(exchange = %client.id(), %error, "Close failed");
                    }
                    (client.id(), result)
                }
            })
            .collect();

        let mut opportunity = CrossExchangeOpportunity::new(symbol.clone());
        while let Some((exchange, result)) = fetching.next().await {
            match result {
                Ok(book) => {
                    if book.bids.is_empty() && book.asks.is_empty() {
                        debug!(exchange = %exchange, market = %symbol, "Empty book discarded");
                        continue;
                    }
                    opportunity.observe(&exchange, &book);
                }
                Err(error) => {
                    warn!(exchange = %exchange, market = %symbol, %error, "Venue discarded");
                }
            }
        }
        opportunity
    }
}
