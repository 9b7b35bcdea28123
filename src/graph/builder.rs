//! Builders that turn venue tickers into rate graphs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use crate::error::{Result, VenueError};
use crate::exchange::{ExchangeClient, ExchangeId, Symbol, Ticker};
use crate::graph::{RateEdge, RateGraph, RateMultiGraph, TradeType};

/// How many times market metadata loading is retried when the venue
/// rate limits or reports itself unavailable.
pub const MAX_FEE_LOAD_ATTEMPTS: u32 = 20;

/// Pause between fee-load retries. This is the only blocking retry
/// loop in the core.
pub const FEE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Applied when a venue does not expose a taker rate for a market.
pub const DEFAULT_TAKER_FEE: f64 = 0.002;

/// Knobs for graph construction.
#[derive(Debug, Clone, Copy)]
pub struct GraphOptions {
    /// Price edges net of the market's taker fee. Requires market
    /// metadata, which the builder loads (with retries) when absent.
    pub fees: bool,
    /// Attach `-ln(volume)` depths; markets without both volumes are
    /// skipped.
    pub depth: bool,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            fees: true,
            depth: false,
        }
    }
}

/// Build the two directed edges for one market, or `None` when the
/// ticker is unusable for the requested mode.
fn market_edges(
    symbol: &Symbol,
    ticker: &Ticker,
    exchange: &ExchangeId,
    fee: f64,
    depth: bool,
) -> Option<(RateEdge, RateEdge)> {
    if !ticker.usable(depth) {
        return None;
    }
    let (Some(bid), Some(ask)) = (ticker.bid, ticker.ask) else {
        return None;
    };

    let fee_scalar = 1.0 - fee;
    let sell = RateEdge {
        weight: -(fee_scalar * bid).ln(),
        depth: if depth {
            ticker.bid_volume.map(|v| -v.ln())
        } else {
            None
        },
        market: symbol.clone(),
        exchange: exchange.clone(),
        trade: TradeType::Sell,
        fee,
        no_fee_rate: bid,
        volume: if depth { ticker.bid_volume } else { None },
    };
    // Depth of the buy edge is denominated in the quote currency, the
    // source node of that edge.
    let buy = RateEdge {
        weight: -(fee_scalar / ask).ln(),
        depth: if depth {
            ticker.ask_volume.map(|v| -(v * ask).ln())
        } else {
            None
        },
        market: symbol.clone(),
        exchange: exchange.clone(),
        trade: TradeType::Buy,
        fee,
        no_fee_rate: 1.0 / ask,
        volume: if depth { ticker.ask_volume } else { None },
    };
    Some((sell, buy))
}

/// The taker fee for one market, with the original fallback when the
/// venue's metadata has no rate.
fn taker_fee(client: &dyn ExchangeClient, symbol: &Symbol) -> f64 {
    match client.market(symbol).and_then(|market| market.taker_fee) {
        Some(fee) => fee,
        None => {
            warn!(
                exchange = %client.id(),
                market = %symbol,
                fallback = DEFAULT_TAKER_FEE,
                "No taker fee in market metadata, using fallback"
            );
            DEFAULT_TAKER_FEE
        }
    }
}

/// Load market metadata, retrying rate limits and outages.
async fn load_markets_with_retry(client: &dyn ExchangeClient) -> Result<()> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match client.load_markets().await {
            Ok(()) => {
                debug!(exchange = %client.id(), attempt, "Loaded market metadata");
                return Ok(());
            }
            Err(error) if error.is_transient() && attempt < MAX_FEE_LOAD_ATTEMPTS => {
                warn!(exchange = %client.id(), attempt, %error, "Retrying market metadata load");
                tokio::time::sleep(FEE_RETRY_DELAY).await;
            }
            Err(error) => {
                warn!(exchange = %client.id(), attempt, %error, "Giving up on market metadata");
                return Err(error.into());
            }
        }
    }
}

/// Fetch one ticker per listed market, concurrently. Markets whose
/// fetch fails are left out, matching the bulk path where a venue
/// simply omits a market it cannot quote.
async fn fetch_tickers_individually(client: &Arc<dyn ExchangeClient>) -> HashMap<String, Ticker> {
    let mut fetching: FuturesUnordered<_> = client
        .symbols()
        .into_iter()
        .filter_map(|raw| {
            let symbol = Symbol::parse(&raw)?;
            let client = Arc::clone(client);
            Some(async move { (raw, client.fetch_ticker(&symbol).await) })
        })
        .collect();

    let mut tickers = HashMap::new();
    while let Some((raw, result)) = fetching.next().await {
        match result {
            Ok(ticker) => {
                tickers.insert(raw, ticker);
            }
            Err(error) => {
                warn!(exchange = %client.id(), market = raw, %error, "Ticker fetch failed, market skipped");
            }
        }
    }
    tickers
}

/// Build a single-venue rate graph from the venue's tickers.
///
/// When `tickers` is `None` they are fetched from the venue: in one
/// bulk call when the venue supports it, otherwise one call per listed
/// market. The client is closed on every exit path, exactly once.
pub async fn load_exchange_graph(
    client: &Arc<dyn ExchangeClient>,
    options: GraphOptions,
    tickers: Option<HashMap<String, Ticker>>,
) -> Result<RateGraph> {
    let result = build_single(client, options, tickers).await;
    debug!(exchange = %client.id(), "Closing connection");
    if let Err(error) = client.close().await {
        warn!(exchange = %client.id(), %error, "Close failed");
    }
    result
}

async fn build_single(
    client: &Arc<dyn ExchangeClient>,
    options: GraphOptions,
    tickers: Option<HashMap<String, Ticker>>,
) -> Result<RateGraph> {
    let exchange = client.id();

    let mut markets_loaded = false;
    let tickers = match tickers {
        Some(tickers) => tickers,
        None if client.has_bulk_tickers() => {
            info!(exchange = %exchange, "Fetching tickers");
            client.fetch_tickers().await?
        }
        None => {
            // The market list drives the per-symbol fan-out, so it has
            // to be loaded up front.
            load_markets_with_retry(client.as_ref()).await?;
            markets_loaded = true;
            info!(exchange = %exchange, "Fetching tickers per market");
            fetch_tickers_individually(client).await
        }
    };
    info!(exchange = %exchange, markets = tickers.len(), "Loading exchange graph");

    if options.fees && !markets_loaded {
        load_markets_with_retry(client.as_ref()).await?;
    }

    let mut graph = RateGraph::for_exchange(exchange.clone());
    for (raw, ticker) in &tickers {
        let Some(symbol) = Symbol::parse(raw) else {
            warn!(exchange = %exchange, market = raw, "Malformed symbol, market skipped");
            continue;
        };
        let fee = if options.fees {
            taker_fee(client.as_ref(), &symbol)
        } else {
            0.0
        };
        let Some((sell, buy)) = market_edges(&symbol, ticker, &exchange, fee, options.depth) else {
            warn!(exchange = %exchange, market = %symbol, "Unusable ticker, market skipped");
            continue;
        };
        graph.upsert_edge(symbol.base(), symbol.quote(), sell);
        graph.upsert_edge(symbol.quote(), symbol.base(), buy);
    }

    info!(
        exchange = %exchange,
        currencies = graph.node_count(),
        edges = graph.edge_count(),
        "Loaded exchange graph"
    );
    Ok(graph)
}

/// Build a cross-venue multigraph: one pair of directed edges per
/// market per venue, each labeled with its venue.
///
/// A venue whose metadata or tickers cannot be fetched is dropped with
/// a warning; partial failure never aborts the build. Every client is
/// closed exactly once before returning.
pub async fn build_multi_exchange_graph(
    clients: &[Arc<dyn ExchangeClient>],
    options: GraphOptions,
) -> RateMultiGraph {
    let graph = build_multi(clients, options).await;

    let mut closing: FuturesUnordered<_> = clients
        .iter()
        .map(|client| {
            let client = Arc::clone(client);
            async move { (client.id(), client.close().await) }
        })
        .collect();
    while let Some((id, result)) = closing.next().await {
        if let Err(error) = result {
            warn!(exchange = %id, %error, "Close failed");
        }
    }

    graph
}

async fn build_multi(clients: &[Arc<dyn ExchangeClient>], options: GraphOptions) -> RateMultiGraph {
    let mut usable: Vec<Arc<dyn ExchangeClient>> = Vec::with_capacity(clients.len());
    if options.fees {
        let mut loading: FuturesUnordered<_> = clients
            .iter()
            .map(|client| {
                let client = Arc::clone(client);
                async move {
                    let result = load_markets_with_retry(client.as_ref()).await;
                    (client, result)
                }
            })
            .collect();
        while let Some((client, result)) = loading.next().await {
            match result {
                Ok(()) => usable.push(client),
                Err(error) => {
                    warn!(exchange = %client.id(), %error, "Venue dropped from multigraph");
                }
            }
        }
    } else {
        usable.extend(clients.iter().cloned());
    }

    let mut fetching: FuturesUnordered<_> = usable
        .iter()
        .map(|client| {
            let client = Arc::clone(client);
            async move {
                let batch = client.fetch_tickers().await;
                (client, batch)
            }
        })
        .collect();

    let mut graph = RateMultiGraph::new();
    while let Some((client, batch)) = fetching.next().await {
        let exchange = client.id();
        let tickers = match batch {
            Ok(tickers) => tickers,
            Err(error) => {
                warn!(exchange = %exchange, %error, "Ticker fetch failed, venue contributes no edges");
                continue;
            }
        };
        for (raw, ticker) in &tickers {
            let Some(symbol) = Symbol::parse(raw) else {
                debug!(exchange = %exchange, market = raw, "Malformed symbol, market skipped");
                continue;
            };
            let fee = if options.fees {
                taker_fee(client.as_ref(), &symbol)
            } else {
                0.0
            };
            let Some((sell, buy)) = market_edges(&symbol, ticker, &exchange, fee, options.depth)
            else {
                debug!(exchange = %exchange, market = %symbol, "Unusable ticker, market skipped");
                continue;
            };
            graph.add_edge(symbol.base(), symbol.quote(), sell);
            graph.add_edge(symbol.quote(), symbol.base(), buy);
        }
    }
    graph
}
