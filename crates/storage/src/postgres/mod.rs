//! PostgreSQL storage adapter.
//!
//! This module implements the repository traits defined in `tally-core`
//! using PostgreSQL as the backing store.
//!
//! # Architecture
//!
//! - [`Database`] - Connection pool and migrations
//! - [`PgRepositories`] - Composite repository implementing `Repositories` trait
//! - Individual repos: `PgAccountRepository`, `PgEntryRepository`, `PgCursorRepository`
//!
//! # Usage
//!
//! ```ignore
//! let config = DatabaseConfig::for_indexer(&database_url);
//! let db = Database::connect(&config).await?;
//! db.migrate().await?;
//!
//! let repositories = PgRepositories::new(Arc::new(db));
//! ```

mod account_repo;
mod cursor_repo;
mod database;
mod entry_repo;
mod helpers;

pub use account_repo::PgAccountRepository;
pub use cursor_repo::PgCursorRepository;
pub use database::{Database, DatabaseConfig};
pub use entry_repo::PgEntryRepository;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use tally_core::error::StorageResult;
use tally_core::models::Chain;
use tally_core::ports::{
    AccountRepository, CursorRepository, EntryRepository, LedgerBatch, Repositories,
};

use helpers::{query_err, tx_err};

// =============================================================================
// Composite Repository
// =============================================================================

/// Aggregated PostgreSQL repositories implementing the `Repositories` trait.
///
/// This provides a single entry point for all storage operations and
/// implements atomic transactions that span multiple tables.
pub struct PgRepositories {
    db: Arc<Database>,
    accounts: PgAccountRepository,
    entries: PgEntryRepository,
    cursor: PgCursorRepository,
}

impl PgRepositories {
    /// Create a new repository aggregate from a database connection.
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            accounts: PgAccountRepository::new(&db),
            entries: PgEntryRepository::new(&db),
            cursor: PgCursorRepository::new(&db),
            db,
        }
    }
}

#[async_trait]
impl Repositories for PgRepositories {
    fn accounts(&self) -> &dyn AccountRepository {
        &self.accounts
    }

    fn entries(&self) -> &dyn EntryRepository {
        &self.entries
    }

    fn cursor(&self) -> &dyn CursorRepository {
        &self.cursor
    }

    async fn upsert_chain(&self, chain: &Chain) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO chains (name, address_prefix)
            VALUES ($1, $2)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(&chain.name)
        .bind(i32::from(chain.address_prefix))
        .execute(self.db.pool())
        .await
        .map_err(query_err)?;

        Ok(())
    }

    #[instrument(skip_all, fields(block = batch.block.number))]
    async fn persist_block_atomic(&self, batch: LedgerBatch<'_>) -> StorageResult<()> {
        let mut tx = self.db.pool().begin().await.map_err(tx_err)?;

        // Accounts first: entries reference them
        for account in batch.accounts {
            account_repo::upsert_account(&mut *tx, account).await?;
        }

        let mut written = 0usize;
        for entry in batch.entries {
            if entry_repo::insert_entry(&mut *tx, entry).await? {
                written += 1;
            }
        }

        if let Some(cursor) = batch.cursor {
            sqlx::query(cursor_repo::UPSERT_CURSOR)
                .bind(&cursor.chain_id)
                .bind(cursor.last_indexed_block as i64)
                .bind(&cursor.last_indexed_hash.0[..])
                .bind(cursor.updated_at)
                .execute(&mut *tx)
                .await
                .map_err(query_err)?;
        }

        tx.commit().await.map_err(tx_err)?;

        debug!(
            accounts = batch.accounts.len(),
            entries = written,
            "Block persisted"
        );

        Ok(())
    }

    #[instrument(skip(self))]
    async fn purge(&self, chain_id: &str) -> StorageResult<u64> {
        let mut tx = self.db.pool().begin().await.map_err(tx_err)?;

        let deleted = sqlx::query("DELETE FROM ledger_entries WHERE chain = $1")
            .bind(chain_id)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?
            .rows_affected();

        // Accounts are not chain-scoped; drop those no entry refers to anymore
        sqlx::query(
            r#"
            DELETE FROM accounts a
            WHERE NOT EXISTS (SELECT 1 FROM ledger_entries e WHERE e.account = a.id)
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        sqlx::query("DELETE FROM indexer_cursor WHERE chain_id = $1")
            .bind(chain_id)
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        tx.commit().await.map_err(tx_err)?;

        debug!(deleted, "Ledger purged");
        Ok(deleted)
    }
}
