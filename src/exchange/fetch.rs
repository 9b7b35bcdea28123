//! Concurrent market-data fan-out.
//!
//! Every outbound call runs as its own future inside a
//! [`FuturesUnordered`], so one slow venue never blocks the others and
//! dropping the fan-out cancels whatever is still in flight. Results
//! are handed back as they complete, tagged with their origin, and a
//! failed venue isolates to its own entry instead of failing the batch.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::stream::{FuturesUnordered, StreamExt};
use tracing::warn;

use crate::error::VenueError;
use crate::exchange::{ExchangeClient, ExchangeId, OrderBook, Symbol, Ticker};

/// Outcome of one venue's bulk ticker fetch, keyed by venue-spelled
/// symbol strings.
pub type TickerBatch = (ExchangeId, Result<HashMap<String, Ticker>, VenueError>);

/// Fetch all tickers from every venue, yielding per-venue outcomes in
/// completion order.
pub async fn fetch_all_tickers(clients: &[Arc<dyn ExchangeClient>]) -> Vec<TickerBatch> {
    let mut pending: FuturesUnordered<_> = clients
        .iter()
        .map(|client| {
            let client = Arc::clone(client);
            async move {
                let result = client.fetch_tickers().await;
                (client.id(), result)
            }
        })
        .collect();

    let mut batches = Vec::with_capacity(clients.len());
    while let Some((id, result)) = pending.next().await {
        if let Err(error) = &result {
            warn!(exchange = %id, %error, "Ticker fetch failed, venue isolated");
        }
        batches.push((id, result));
    }
    batches
}

/// Fetch order books for `symbols` from one venue, yielding per-symbol
/// outcomes in completion order. Permanent failures remove only the
/// affected market from the batch.
pub async fn fetch_order_books(
    client: &Arc<dyn ExchangeClient>,
    symbols: &[Symbol],
) -> Vec<(Symbol, Result<OrderBook, VenueError>)> {
    let mut pending: FuturesUnordered<_> = symbols
        .iter()
        .cloned()
        .map(|symbol| {
            let client = Arc::clone(client);
            async move {
                let result = client.fetch_order_book(&symbol).await;
                (symbol, result)
            }
        })
        .collect();

    let mut books = Vec::with_capacity(symbols.len());
    while let Some((symbol, result)) = pending.next().await {
        if let Err(error) = &result {
            warn!(exchange = %client.id(), market = %symbol, %error, "Order book fetch failed");
        }
        books.push((symbol, result));
    }
    books
}
