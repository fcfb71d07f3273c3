//! Handler for the Crowdloan pallet.
//!
//! `Contributed` has no layout in the built-in table: its hash differs per
//! relay chain, so it is bound through the schema file, e.g.
//!
//! ```json
//! [{ "name": "crowdloan.Contributed", "version": "V9110", "hash": "<hash>",
//!    "layout": { "positional": ["account", "para_id", "amount"] } }]
//! ```
//!
//! Until it is bound, a block holding a contribution fails with an unknown
//! schema. `Created` and the `create` call only describe the fund and are
//! not part of the ledger.

use async_trait::async_trait;
use tracing::trace;

use tally_core::error::DomainResult;
use tally_core::ports::{LedgerIntent, PalletHandler, RawEvent};
use tally_core::schema::NormalizedEvent;

/// Handler for the Crowdloan pallet.
#[derive(Debug, Default)]
pub struct CrowdloanHandler;

impl CrowdloanHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PalletHandler for CrowdloanHandler {
    fn pallet_name(&self) -> &'static str {
        "crowdloan"
    }

    fn record_names(&self) -> &'static [&'static str] {
        &["crowdloan.Contributed"]
    }

    async fn handle_event(
        &self,
        event: &RawEvent,
        data: NormalizedEvent,
    ) -> DomainResult<Option<LedgerIntent>> {
        match event.name.as_str() {
            "crowdloan.Contributed" => Ok(Some(LedgerIntent::Contribution(data))),
            other => {
                trace!(event = other, "Ignoring crowdloan event");
                Ok(None)
            }
        }
    }
}
