//! Port traits for data repositories.
//!
//! These traits define the storage interface used by the domain layer.
//! Implementations live in the infrastructure layer (e.g., `tally-storage`).

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::models::{Account, Block, Chain, IndexerCursor, LedgerEntry};

// =============================================================================
// Repository Traits
// =============================================================================

/// Repository for account aggregates.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Get account by id.
    async fn get_account(&self, id: &str) -> StorageResult<Option<Account>>;

    /// Number of stored accounts.
    async fn count_accounts(&self) -> StorageResult<u64>;
}

/// Repository for ledger entries.
#[async_trait]
pub trait EntryRepository: Send + Sync {
    /// Whether an entry with this id was already recorded.
    async fn entry_exists(&self, id: &str) -> StorageResult<bool>;

    /// List entries owned by an account, in application order.
    async fn list_entries_for_account(&self, account: &str) -> StorageResult<Vec<LedgerEntry>>;

    /// Number of stored entries.
    async fn count_entries(&self) -> StorageResult<u64>;
}

/// Repository for indexer cursor state.
#[async_trait]
pub trait CursorRepository: Send + Sync {
    /// Get current cursor for a chain.
    async fn get_cursor(&self, chain_id: &str) -> StorageResult<Option<IndexerCursor>>;

    /// Get any existing cursor (for chain mismatch detection).
    async fn get_any_cursor(&self) -> StorageResult<Option<IndexerCursor>>;

    /// Update cursor (upsert).
    async fn set_cursor(&self, cursor: &IndexerCursor) -> StorageResult<()>;
}

// =============================================================================
// Composite Repository
// =============================================================================

/// Everything a block changed, persisted as one unit.
#[derive(Debug)]
pub struct LedgerBatch<'a> {
    pub block: &'a Block,
    /// Accounts touched by the block, with their updated totals.
    pub accounts: &'a [Account],
    /// New entries, in application order.
    pub entries: &'a [LedgerEntry],
    /// `None` when replaying a block at or below the stored cursor.
    pub cursor: Option<&'a IndexerCursor>,
}

/// Combined repository access for the ledger.
///
/// This trait provides access to all individual repositories and
/// atomic operations that span multiple tables.
#[async_trait]
pub trait Repositories: Send + Sync {
    /// Access the account repository.
    fn accounts(&self) -> &dyn AccountRepository;

    /// Access the entry repository.
    fn entries(&self) -> &dyn EntryRepository;

    /// Access the cursor repository.
    fn cursor(&self) -> &dyn CursorRepository;

    /// Insert the chain reference row if absent.
    async fn upsert_chain(&self, chain: &Chain) -> StorageResult<()>;

    /// Persist a block's ledger effects atomically in a single transaction.
    ///
    /// Entries are insert-if-absent, accounts are upserted with their new
    /// totals, and the cursor (when given) is advanced. If any operation
    /// fails, everything is rolled back.
    async fn persist_block_atomic(&self, batch: LedgerBatch<'_>) -> StorageResult<()>;

    /// Delete all ledger data, accounts and the cursor of a chain.
    ///
    /// Returns the number of deleted entries.
    async fn purge(&self, chain_id: &str) -> StorageResult<u64>;
}
