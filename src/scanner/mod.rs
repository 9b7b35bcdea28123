//! Cross-venue opportunity scanning.

mod bulk;
mod opportunity;
mod single;

pub use bulk::{
    BulkScanner, OpportunityStream, DEFAULT_OPPORTUNITY_INTERVAL, RATE_LIMIT_COOLDOWN,
    RATE_LIMIT_GATE_POLL,
};
pub use opportunity::{BestQuote, CrossExchangeOpportunity};
pub use single::OpportunityFinder;
