//! Whole-pipeline flows: catalog -> graphs -> finders -> reports.

use std::sync::Arc;

use gyre::catalog::CollectionBuilder;
use gyre::exchange::{ExchangeClient, Symbol, Ticker};
use gyre::finder::{profit_ratio_with_depth, trade_plan, DepthCycleFinder, MultiCycleFinder};
use gyre::graph::{build_multi_exchange_graph, load_exchange_graph, GraphOptions};
use gyre::scanner::BulkScanner;
use gyre::testkit::MockExchange;

fn ticker(bid: f64, ask: f64, bid_volume: f64, ask_volume: f64) -> Ticker {
    Ticker {
        bid: Some(bid),
        ask: Some(ask),
        bid_volume: Some(bid_volume),
        ask_volume: Some(ask_volume),
    }
}

/// A venue whose BTC/USD, ETH/BTC and ETH/USD quotes compose into a
/// triangular opportunity: buy ETH with USD, sell ETH for BTC, sell
/// BTC for USD.
fn triangular_venue() -> Arc<MockExchange> {
    Arc::new(
        MockExchange::builder("triangle")
            .taker_fee(0.001)
            .ticker("BTC/USD", ticker(6000.0, 6005.0, 2.0, 2.0))
            .ticker("ETH/BTC", ticker(0.09, 0.091, 40.0, 40.0))
            .ticker("ETH/USD", ticker(490.0, 495.0, 25.0, 25.0))
            .build(),
    )
}

#[tokio::test]
async fn intra_venue_scan_finds_and_prices_the_triangle() {
    let client: Arc<dyn ExchangeClient> = triangular_venue();
    let options = GraphOptions {
        fees: true,
        depth: true,
    };
    let graph = load_exchange_graph(&client, options, None).await.unwrap();

    let finder = DepthCycleFinder::new(&graph, "USD").unwrap();
    let found: Vec<_> = finder.cycles(true).collect();
    assert_eq!(found.len(), 1);

    let (cycle, volume) = &found[0];
    assert_eq!(cycle.first(), cycle.last());
    assert!(*volume > 0.0);

    // USD -> ETH at 1/495, ETH -> BTC at 0.09, BTC -> USD at 6000,
    // less three 0.1% fees.
    let gross = (1.0 / 495.0) * 0.09 * 6000.0;
    let expected = gross * 0.999_f64.powi(3);
    assert!(expected > 1.0);

    let (ratio, ledger) = profit_ratio_with_depth(&graph, cycle, *volume, true).unwrap();
    assert!((ratio - expected).abs() < 1e-9);
    assert_eq!(ledger.len(), 3);

    let plan = trade_plan(&graph, cycle, *volume, true).unwrap();
    assert!(plan.contains("on triangle"));
    assert_eq!(plan.lines().count(), 4);
}

#[tokio::test]
async fn cross_venue_multigraph_finds_the_better_priced_venue() {
    // Same market, one venue strictly better on both sides.
    let sharp = Arc::new(
        MockExchange::builder("sharp")
            .ticker("BTC/USD", ticker(6010.0, 6012.0, 1.0, 1.0))
            .build(),
    );
    let wide = Arc::new(
        MockExchange::builder("wide")
            .ticker("BTC/USD", ticker(5990.0, 6000.0, 1.0, 1.0))
            .build(),
    );
    let clients: Vec<Arc<dyn ExchangeClient>> = vec![sharp.clone() as _, wide.clone() as _];

    let options = GraphOptions {
        fees: false,
        depth: false,
    };
    let multi = build_multi_exchange_graph(&clients, options).await;
    let finder = MultiCycleFinder::new(&multi, "USD").unwrap();

    // Sell BTC on sharp (6010), buy it back on wide (6000).
    let reduced = finder.reduced_graph();
    assert_eq!(reduced.edge("BTC", "USD").unwrap().exchange.as_str(), "sharp");
    assert_eq!(reduced.edge("USD", "BTC").unwrap().exchange.as_str(), "wide");

    let cycles: Vec<_> = finder.cycles(true).collect();
    assert_eq!(cycles.len(), 1);

    assert_eq!(sharp.close_count(), 1);
    assert_eq!(wide.close_count(), 1);
}

#[tokio::test]
async fn catalog_feeds_the_bulk_scanner() {
    let a = Arc::new(
        MockExchange::builder("a")
            .ticker("BTC/USD", ticker(6000.0, 6001.0, 1.0, 1.0))
            .ticker("ONLY/A", ticker(1.0, 1.1, 1.0, 1.0))
            .book_levels("BTC/USD", (6000.0, 1.0), (6001.0, 1.0))
            .build(),
    );
    let b = Arc::new(
        MockExchange::builder("b")
            .ticker("BTC/USD", ticker(6004.0, 6005.0, 1.0, 1.0))
            .book_levels("BTC/USD", (6004.0, 1.0), (6005.0, 1.0))
            .build(),
    );
    let clients: Vec<Arc<dyn ExchangeClient>> = vec![a.clone() as _, b.clone() as _];

    let collection = CollectionBuilder::new(clients.clone())
        .build_all(None)
        .await
        .unwrap();
    // ONLY/A is a singleton: the bulk scanner must ignore it.
    assert_eq!(collection.singletons().len(), 1);

    let mut stream = BulkScanner::new(clients, collection).into_stream();
    let mut opportunities = Vec::new();
    while let Some(opportunity) = stream.next().await {
        opportunities.push(opportunity);
    }

    assert_eq!(opportunities.len(), 1);
    let opportunity = &opportunities[0];
    assert_eq!(opportunity.symbol, Symbol::parse("BTC/USD").unwrap());
    // Bid on b (6004) exceeds ask on a (6001).
    assert!(opportunity.is_valuable());

    // Catalog build closed once, scan closed once more.
    assert_eq!(a.close_count(), 2);
    assert_eq!(b.close_count(), 2);
}
