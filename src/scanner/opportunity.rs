//! Cross-venue opportunity records.

use chrono::{DateTime, Utc};

use crate::exchange::{ExchangeId, OrderBook, Symbol};

/// Best quote observed on one venue.
#[derive(Debug, Clone, PartialEq)]
pub struct BestQuote {
    pub exchange: ExchangeId,
    pub price: f64,
    pub volume: f64,
}

/// Price disparity for one symbol across venues: the highest bid and
/// the lowest ask seen, with the venues supplying them.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossExchangeOpportunity {
    pub symbol: Symbol,
    pub highest_bid: Option<BestQuote>,
    pub lowest_ask: Option<BestQuote>,
    pub timestamp: DateTime<Utc>,
}

impl CrossExchangeOpportunity {
    #[must_use]
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            highest_bid: None,
            lowest_ask: None,
            timestamp: Utc::now(),
        }
    }

    /// Fold one venue's top-of-book into the running bests.
    ///
    /// Empty sides contribute nothing; callers discard fully empty
    /// books before getting here, but a one-sided book still updates
    /// its present side.
    pub fn observe(&mut self, exchange: &ExchangeId, book: &OrderBook) {
        if let Some(bid) = book.best_bid() {
            let improved = self
                .highest_bid
                .as_ref()
                .map_or(true, |best| bid.price > best.price);
            if improved {
                self.highest_bid = Some(BestQuote {
                    exchange: exchange.clone(),
                    price: bid.price,
                    volume: bid.volume,
                });
            }
        }
        if let Some(ask) = book.best_ask() {
            let improved = self
                .lowest_ask
                .as_ref()
                .map_or(true, |best| ask.price < best.price);
            if improved {
                self.lowest_ask = Some(BestQuote {
                    exchange: exchange.clone(),
                    price: ask.price,
                    volume: ask.volume,
                });
            }
        }
    }

    /// Whether selling at the highest bid and buying at the lowest ask
    /// nets a gain.
    #[must_use]
    pub fn is_valuable(&self) -> bool {
        match (&self.highest_bid, &self.lowest_ask) {
            (Some(bid), Some(ask)) => bid.price > ask.price,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::PriceLevel;

    fn book(bid: f64, ask: f64) -> OrderBook {
        OrderBook {
            bids: vec![PriceLevel { price: bid, volume: 1.0 }],
            asks: vec![PriceLevel { price: ask, volume: 2.0 }],
        }
    }

    fn symbol() -> Symbol {
        Symbol::parse("BTC/USD").unwrap()
    }

    #[test]
    fn observe_keeps_best_of_each_side() {
        let mut opportunity = CrossExchangeOpportunity::new(symbol());
        opportunity.observe(&ExchangeId::from("a"), &book(100.0, 101.0));
        opportunity.observe(&ExchangeId::from("b"), &book(102.0, 100.5));
        opportunity.observe(&ExchangeId::from("c"), &book(99.0, 103.0));

        let bid = opportunity.highest_bid.as_ref().unwrap();
        let ask = opportunity.lowest_ask.as_ref().unwrap();
        assert_eq!(bid.exchange, ExchangeId::from("b"));
        assert_eq!(bid.price, 102.0);
        assert_eq!(ask.exchange, ExchangeId::from("b"));
        assert_eq!(ask.price, 100.5);
    }

    #[test]
    fn valuable_only_when_bid_exceeds_ask() {
        let mut opportunity = CrossExchangeOpportunity::new(symbol());
        assert!(!opportunity.is_valuable());

        opportunity.observe(&ExchangeId::from("a"), &book(100.0, 101.0));
        assert!(!opportunity.is_valuable());

        opportunity.observe(&ExchangeId::from("b"), &book(102.0, 101.5));
        assert!(opportunity.is_valuable());
    }

    #[test]
    fn one_sided_books_update_their_side_only() {
        let mut opportunity = CrossExchangeOpportunity::new(symbol());
        let bids_only = OrderBook {
            bids: vec![PriceLevel { price: 100.0, volume: 1.0 }],
            asks: vec![],
        };
        opportunity.observe(&ExchangeId::from("a"), &bids_only);

        assert!(opportunity.highest_bid.is_some());
        assert!(opportunity.lowest_ask.is_none());
        assert!(!opportunity.is_valuable());
    }
}
