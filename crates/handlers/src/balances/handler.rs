//! Handler for the Balances pallet.
//!
//! Every supported event or call becomes a balance transaction entry. These
//! entries carry counterpart and reserve details but never move the staking
//! totals of an account.
//!
//! # Supported Events
//!
//! - `Transfer`, `ReserveRepatriated`: movement between two accounts
//! - `Endowed`, `DustLost`, `Deposit`, `Withdraw`, `Slashed`: single account
//! - `Reserved`, `Unreserved`: free/reserved moves
//! - `BalanceSet`: root-set free and reserved balance
//!
//! # Supported Calls
//!
//! - `transfer`, `transfer_keep_alive`, `force_transfer`, `transfer_all`:
//!   kept only when no `Transfer` event covers the extrinsic, which in
//!   practice means the call failed

use async_trait::async_trait;
use tracing::trace;

use tally_core::error::DomainResult;
use tally_core::ports::{LedgerIntent, PalletHandler, RawEvent, RawExtrinsic};
use tally_core::schema::{NormalizedEvent, SchemaVariant};

use super::schemas;

/// Events first, then calls.
const RECORDS: &[&str] = &[
    "balances.Transfer",
    "balances.Endowed",
    "balances.DustLost",
    "balances.BalanceSet",
    "balances.Reserved",
    "balances.Unreserved",
    "balances.ReserveRepatriated",
    "balances.Deposit",
    "balances.Withdraw",
    "balances.Slashed",
    "balances.transfer",
    "balances.transfer_keep_alive",
    "balances.force_transfer",
    "balances.transfer_all",
];

/// Handler for the Balances pallet.
#[derive(Debug, Default)]
pub struct BalancesHandler;

impl BalancesHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PalletHandler for BalancesHandler {
    fn pallet_name(&self) -> &'static str {
        "balances"
    }

    fn record_names(&self) -> &'static [&'static str] {
        RECORDS
    }

    fn schemas(&self) -> Vec<SchemaVariant> {
        schemas::variants()
    }

    async fn handle_event(
        &self,
        event: &RawEvent,
        data: NormalizedEvent,
    ) -> DomainResult<Option<LedgerIntent>> {
        if !RECORDS.contains(&event.name.as_str()) {
            trace!(event = %event.name, "Ignoring balances event");
            return Ok(None);
        }
        Ok(Some(LedgerIntent::Balance(data)))
    }

    async fn handle_extrinsic(
        &self,
        extrinsic: &RawExtrinsic,
        data: NormalizedEvent,
    ) -> DomainResult<Option<LedgerIntent>> {
        if !RECORDS.contains(&extrinsic.name.as_str()) {
            trace!(call = %extrinsic.name, "Ignoring balances call");
            return Ok(None);
        }
        Ok(Some(LedgerIntent::Balance(data)))
    }

    fn priority(&self) -> i32 {
        10
    }
}
