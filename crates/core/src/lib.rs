//! Core domain layer for the tally ledger indexer.
//!
//! This crate contains the domain models, port traits (interfaces), the
//! versioned schema decoder and the ledger aggregation engine. It follows
//! hexagonal architecture principles - this is the innermost layer with
//! no dependencies on infrastructure.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       tally (binary)                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  tally-archive   │   tally-handlers    │   tally-storage    │
//! │  (block source)  │ (pallets, schemas)  │ (Postgres, memory) │
//! ├──────────────────┴─────────────────────┴────────────────────┤
//! │                     tally-core  ← YOU ARE HERE              │
//! │          (models, ports, schema, ledger, services)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`models`] - Domain models (Account, LedgerEntry, Chain, ...)
//! - [`ports`] - Interface traits for adapters to implement
//! - [`schema`] - Schema registry and payload normalization
//! - [`ledger`] - Account registry, idempotency guard and aggregator
//! - [`services`] - Block orchestration (IndexerService)
//! - [`error`] - Domain error types
//! - [`metrics`] - Prometheus metrics definitions
//!
//! # Record pipeline
//!
//! Every event or call of a block goes through the same steps, in
//! emission order:
//!
//! 1. [`schema::SchemaRegistry::select`] picks the layout matching the
//!    record's content hash
//! 2. [`schema::normalize`] maps the payload onto a
//!    [`schema::NormalizedEvent`]
//! 3. The pallet's [`ports::PalletHandler`] turns it into a
//!    [`ports::LedgerIntent`]
//! 4. [`ledger::LedgerAggregator::apply`] checks the idempotency guard
//!    and folds the intent into the owning account's running totals
//!
//! A block's entries, touched accounts and cursor are then persisted in
//! one transaction through [`ports::Repositories`].

pub mod error;
pub mod ledger;
pub mod metrics;
pub mod models;
pub mod ports;
pub mod schema;
pub mod services;
