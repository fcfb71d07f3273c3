//! In-memory storage for dry runs and tests.
//!
//! Implements the same contract as the PostgreSQL adapter: a block batch is
//! applied under one write lock, entries are insert-if-absent and the
//! cursor never moves backwards. Nothing survives the process.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use tally_core::error::StorageResult;
use tally_core::models::{Account, Chain, IndexerCursor, LedgerEntry};
use tally_core::ports::{
    AccountRepository, CursorRepository, EntryRepository, LedgerBatch, Repositories,
};

#[derive(Debug, Default)]
struct MemoryState {
    chains: HashMap<String, Chain>,
    accounts: HashMap<String, Account>,
    /// Application order.
    entries: Vec<LedgerEntry>,
    entry_ids: HashSet<String>,
    cursors: HashMap<String, IndexerCursor>,
}

impl MemoryState {
    fn set_cursor(&mut self, cursor: &IndexerCursor) {
        let stale = self
            .cursors
            .get(&cursor.chain_id)
            .is_some_and(|c| c.last_indexed_block > cursor.last_indexed_block);
        if !stale {
            self.cursors.insert(cursor.chain_id.clone(), cursor.clone());
        }
    }
}

/// Repositories backed by process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chains registered so far.
    pub async fn chains(&self) -> Vec<Chain> {
        self.state.read().await.chains.values().cloned().collect()
    }

    /// Every stored entry, in application order.
    pub async fn all_entries(&self) -> Vec<LedgerEntry> {
        self.state.read().await.entries.clone()
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn get_account(&self, id: &str) -> StorageResult<Option<Account>> {
        Ok(self.state.read().await.accounts.get(id).cloned())
    }

    async fn count_accounts(&self) -> StorageResult<u64> {
        Ok(self.state.read().await.accounts.len() as u64)
    }
}

#[async_trait]
impl EntryRepository for MemoryStore {
    async fn entry_exists(&self, id: &str) -> StorageResult<bool> {
        Ok(self.state.read().await.entry_ids.contains(id))
    }

    async fn list_entries_for_account(&self, account: &str) -> StorageResult<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.account == account)
            .cloned()
            .collect())
    }

    async fn count_entries(&self) -> StorageResult<u64> {
        Ok(self.state.read().await.entries.len() as u64)
    }
}

#[async_trait]
impl CursorRepository for MemoryStore {
    async fn get_cursor(&self, chain_id: &str) -> StorageResult<Option<IndexerCursor>> {
        Ok(self.state.read().await.cursors.get(chain_id).cloned())
    }

    async fn get_any_cursor(&self) -> StorageResult<Option<IndexerCursor>> {
        Ok(self.state.read().await.cursors.values().next().cloned())
    }

    async fn set_cursor(&self, cursor: &IndexerCursor) -> StorageResult<()> {
        self.state.write().await.set_cursor(cursor);
        Ok(())
    }
}

#[async_trait]
impl Repositories for MemoryStore {
    fn accounts(&self) -> &dyn AccountRepository {
        self
    }

    fn entries(&self) -> &dyn EntryRepository {
        self
    }

    fn cursor(&self) -> &dyn CursorRepository {
        self
    }

    async fn upsert_chain(&self, chain: &Chain) -> StorageResult<()> {
        self.state
            .write()
            .await
            .chains
            .entry(chain.name.clone())
            .or_insert_with(|| chain.clone());
        Ok(())
    }

    async fn persist_block_atomic(&self, batch: LedgerBatch<'_>) -> StorageResult<()> {
        let mut state = self.state.write().await;

        for account in batch.accounts {
            state.accounts.insert(account.id.clone(), account.clone());
        }
        for entry in batch.entries {
            if state.entry_ids.insert(entry.id.clone()) {
                state.entries.push(entry.clone());
            }
        }
        if let Some(cursor) = batch.cursor {
            state.set_cursor(cursor);
        }

        debug!(block = batch.block.number, entries = batch.entries.len(), "Block stored in memory");
        Ok(())
    }

    async fn purge(&self, chain_id: &str) -> StorageResult<u64> {
        let mut state = self.state.write().await;
        let before = state.entries.len();
        state.entries.retain(|e| e.chain != chain_id);
        let deleted = (before - state.entries.len()) as u64;

        let MemoryState {
            accounts,
            entries,
            entry_ids,
            cursors,
            ..
        } = &mut *state;
        *entry_ids = entries.iter().map(|e| e.id.clone()).collect();
        accounts.retain(|id, _| entries.iter().any(|e| &e.account == id));
        cursors.remove(chain_id);

        Ok(deleted)
    }
}
