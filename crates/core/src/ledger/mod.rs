//! Ledger aggregation.
//!
//! - [`AccountRegistry`] - get-or-create account cache
//! - [`IdempotencyGuard`] - suppresses call entries already covered by events
//! - [`LedgerAggregator`] - folds intents into running totals and entries

mod accounts;
mod aggregator;
mod guard;

#[cfg(test)]
pub(crate) mod testing;

pub use accounts::*;
pub use aggregator::*;
pub use guard::*;
