//! Pallet handlers for the tally indexer.
//!
//! Each pallet module ships its handler and, where the chain publishes
//! them, the historical payload layouts of the events and calls it reads.
//!
//! # Usage
//!
//! ```ignore
//! let handlers = tally_handlers::polkadot_handlers();
//! let schemas = tally_handlers::schema_registry(&handlers, Some(Path::new("schemas.json")))?;
//! ```

pub mod balances;
pub mod crowdloan;
pub mod proxy;
pub mod staking;

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use tally_core::error::DomainResult;
use tally_core::ports::HandlerRegistry;
use tally_core::schema::SchemaRegistry;

pub use balances::BalancesHandler;
pub use crowdloan::CrowdloanHandler;
pub use proxy::ProxyHandler;
pub use staking::StakingHandler;

/// Handlers for every pallet the ledger follows on a Polkadot relay chain.
pub fn polkadot_handlers() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(StakingHandler::new()));
    registry.register(Arc::new(BalancesHandler::new()));
    registry.register(Arc::new(CrowdloanHandler::new()));
    registry.register(Arc::new(ProxyHandler::new()));
    registry
}

/// Names the handlers read that no schema in `schemas` describes.
///
/// A block holding one of them fails with an unknown schema.
pub fn unbound_records(handlers: &HandlerRegistry, schemas: &SchemaRegistry) -> Vec<&'static str> {
    handlers
        .record_names()
        .into_iter()
        .filter(|name| !schemas.is_tracked(name))
        .collect()
}

/// Build the schema registry from the handlers' built-in tables, then
/// the optional schema file on top.
///
/// A file entry that repeats a built-in variant is accepted; one that
/// redefines a known hash with another layout is an error.
pub fn schema_registry(
    handlers: &HandlerRegistry,
    schema_file: Option<&Path>,
) -> DomainResult<SchemaRegistry> {
    let mut registry = SchemaRegistry::new();
    registry.extend(handlers.schemas())?;
    let builtin = registry.len();

    let extra = match schema_file {
        Some(path) => registry.load_file(path)?,
        None => 0,
    };

    info!(builtin, extra, "📐 Schema registry ready");
    for name in unbound_records(handlers, &registry) {
        warn!(record = name, "⚠️ Handled record has no schema, blocks holding it will fail");
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::schema::SchemaMode;

    #[test]
    fn test_all_pallets_registered() {
        let handlers = polkadot_handlers();
        for pallet in ["staking", "balances", "crowdloan", "proxy"] {
            assert!(handlers.has_handler(pallet), "missing {pallet}");
        }
        assert!(handlers.for_record("staking.Bonded").is_some());
        assert!(handlers.for_record("system.ExtrinsicSuccess").is_none());
    }

    // Test critique: les tables intégrées ne doivent pas se contredire
    #[test]
    fn test_builtin_tables_load() {
        let registry = schema_registry(&polkadot_handlers(), None).unwrap();
        assert!(registry.is_tracked("staking.Rewarded"));
        assert!(registry.is_tracked("balances.transfer_all"));
        assert!(!registry.is_tracked("crowdloan.Contributed"));

        let bonded = registry
            .select(
                "staking.Bonded",
                Some("0x47FACB114CAD5E5D0612AB12CD27899AED054423F61B0EE4027C8D49284108A0"),
                SchemaMode::Historical,
            )
            .unwrap();
        assert_eq!(bonded.version, "V0");
    }

    #[test]
    fn test_schema_file_extends_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schemas.json");
        std::fs::write(
            &path,
            r#"[{"name": "staking.payout_stakers", "version": "V9050", "hash": "c0ffee",
                 "layout": {"named": {"validatorStash": "validator", "era": "era"}}}]"#,
        )
        .unwrap();

        let registry = schema_registry(&polkadot_handlers(), Some(&path)).unwrap();
        assert!(registry.is_tracked("staking.payout_stakers"));
        assert_eq!(registry.latest("staking.payout_stakers").unwrap().version, "V9050");
    }

    // Test critique: tout nom lu par un handler sans schéma doit être signalé
    #[test]
    fn test_unbound_records_listed() {
        let handlers = polkadot_handlers();
        let registry = schema_registry(&handlers, None).unwrap();
        let mut unbound = unbound_records(&handlers, &registry);
        unbound.sort_unstable();
        assert_eq!(unbound, ["crowdloan.Contributed", "staking.payout_stakers"]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schemas.json");
        std::fs::write(
            &path,
            r#"[{"name": "staking.payout_stakers", "version": "V9050", "hash": "c0ffee",
                 "layout": {"named": {"validatorStash": "validator", "era": "era"}}},
                {"name": "crowdloan.Contributed", "version": "V9110", "hash": "beef",
                 "layout": {"positional": ["account", "para_id", "amount"]}}]"#,
        )
        .unwrap();
        let registry = schema_registry(&handlers, Some(&path)).unwrap();
        assert!(unbound_records(&handlers, &registry).is_empty());
    }
}
