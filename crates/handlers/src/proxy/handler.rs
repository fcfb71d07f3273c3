//! Handler for the Proxy pallet.
//!
//! `proxy.proxy` produces no entry of its own. It dispatches the call held
//! in its `call` argument as the `real` account, and that call is indexed
//! as if the extrinsic had made it directly: same index, hash and outcome,
//! with `real` as the signer. The archive carries the wrapped call as a
//! nested record:
//!
//! ```json
//! { "name": "proxy.proxy",
//!   "args": { "real": "0x…", "forceProxyType": null,
//!             "call": { "name": "balances.transfer", "content_hash": "fc85…",
//!                       "args": { "dest": "0x…", "value": "1000" } } } }
//! ```

use async_trait::async_trait;
use tracing::trace;

use tally_core::error::{DomainError, DomainResult};
use tally_core::ports::{LedgerIntent, NestedCall, PalletHandler, RawEvent, RawExtrinsic};
use tally_core::schema::NormalizedEvent;
use tally_core::schema::parse::parse_account;

/// Handler for the Proxy pallet.
#[derive(Debug, Default)]
pub struct ProxyHandler;

impl ProxyHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PalletHandler for ProxyHandler {
    fn pallet_name(&self) -> &'static str {
        "proxy"
    }

    async fn handle_event(
        &self,
        event: &RawEvent,
        _data: NormalizedEvent,
    ) -> DomainResult<Option<LedgerIntent>> {
        trace!(event = %event.name, "Ignoring proxy event");
        Ok(None)
    }

    fn unwrap_call(&self, extrinsic: &RawExtrinsic) -> DomainResult<Option<RawExtrinsic>> {
        if extrinsic.name != "proxy.proxy" {
            return Ok(None);
        }

        let call = extrinsic
            .args
            .get("call")
            .cloned()
            .ok_or_else(|| DomainError::MissingField {
                name: extrinsic.name.clone(),
                field: "call".to_string(),
            })?;
        let call: NestedCall = serde_json::from_value(call).map_err(|e| {
            DomainError::DecodingError(format!("{}: invalid wrapped call: {e}", extrinsic.name))
        })?;

        let mut inner = extrinsic.dispatching(call);
        if let Some(real) = extrinsic.args.get("real").and_then(parse_account) {
            inner.signer = Some(real);
        }
        Ok(Some(inner))
    }
}
