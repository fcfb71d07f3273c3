//! Storage layer for the tally ledger.
//!
//! This crate provides implementations of the repository traits defined in
//! `tally-core`:
//!
//! - [`postgres::PgRepositories`] - PostgreSQL, one transaction per block
//! - [`memory::MemoryStore`] - process memory, for dry runs and tests
//!
//! # Usage
//!
//! ```ignore
//! use tally_storage::{Database, DatabaseConfig, PgRepositories};
//!
//! // Connect to the database
//! let config = DatabaseConfig::for_indexer(&database_url);
//! let db = Database::connect(&config).await?;
//!
//! // Run migrations
//! db.migrate().await?;
//!
//! // Create repositories
//! let repositories = Arc::new(PgRepositories::new(Arc::new(db)));
//! ```

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{Database, DatabaseConfig, PgRepositories};
