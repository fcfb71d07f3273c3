//! Hand-written port mocks for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{ChainResult, StorageError, StorageResult};
use crate::models::{Account, AccountId, Chain, IndexerCursor, LedgerEntry, StakingInfo};
use crate::ports::{
    AccountRepository, CursorRepository, EntryRepository, LedgerBatch, Repositories,
    StakingLookup,
};

#[derive(Default)]
pub struct MockState {
    pub chains: Vec<Chain>,
    pub accounts: HashMap<String, Account>,
    pub entries: Vec<LedgerEntry>,
    pub cursor: Option<IndexerCursor>,
    pub persisted_blocks: Vec<u64>,
}

#[derive(Default)]
pub struct MockRepositories {
    pub state: Mutex<MockState>,
    pub fail_persist: AtomicBool,
}

impl MockRepositories {
    pub async fn insert_account(&self, account: Account) {
        self.state
            .lock()
            .await
            .accounts
            .insert(account.id.clone(), account);
    }

    pub async fn account(&self, id: &str) -> Option<Account> {
        self.state.lock().await.accounts.get(id).cloned()
    }

    pub async fn stored_entries(&self) -> Vec<LedgerEntry> {
        self.state.lock().await.entries.clone()
    }

    pub fn fail_next_persist(&self) {
        self.fail_persist.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccountRepository for MockRepositories {
    async fn get_account(&self, id: &str) -> StorageResult<Option<Account>> {
        Ok(self.state.lock().await.accounts.get(id).cloned())
    }

    async fn count_accounts(&self) -> StorageResult<u64> {
        Ok(self.state.lock().await.accounts.len() as u64)
    }
}

#[async_trait]
impl EntryRepository for MockRepositories {
    async fn entry_exists(&self, id: &str) -> StorageResult<bool> {
        Ok(self.state.lock().await.entries.iter().any(|e| e.id == id))
    }

    async fn list_entries_for_account(&self, account: &str) -> StorageResult<Vec<LedgerEntry>> {
        Ok(self
            .state
            .lock()
            .await
            .entries
            .iter()
            .filter(|e| e.account == account)
            .cloned()
            .collect())
    }

    async fn count_entries(&self) -> StorageResult<u64> {
        Ok(self.state.lock().await.entries.len() as u64)
    }
}

#[async_trait]
impl CursorRepository for MockRepositories {
    async fn get_cursor(&self, chain_id: &str) -> StorageResult<Option<IndexerCursor>> {
        Ok(self
            .state
            .lock()
            .await
            .cursor
            .clone()
            .filter(|c| c.chain_id == chain_id))
    }

    async fn get_any_cursor(&self) -> StorageResult<Option<IndexerCursor>> {
        Ok(self.state.lock().await.cursor.clone())
    }

    async fn set_cursor(&self, cursor: &IndexerCursor) -> StorageResult<()> {
        self.state.lock().await.cursor = Some(cursor.clone());
        Ok(())
    }
}

#[async_trait]
impl Repositories for MockRepositories {
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
        let mut state = self.state.lock().await;
        if !state.chains.iter().any(|c| c.name == chain.name) {
            state.chains.push(chain.clone());
        }
        Ok(())
    }

    async fn persist_block_atomic(&self, batch: LedgerBatch<'_>) -> StorageResult<()> {
        if self.fail_persist.swap(false, Ordering::SeqCst) {
            return Err(StorageError::TransactionError("injected failure".into()));
        }

        let mut state = self.state.lock().await;
        for entry in batch.entries {
            if !state.entries.iter().any(|e| e.id == entry.id) {
                state.entries.push(entry.clone());
            }
        }
        for account in batch.accounts {
            state.accounts.insert(account.id.clone(), account.clone());
        }
        if let Some(cursor) = batch.cursor {
            state.cursor = Some(cursor.clone());
        }
        state.persisted_blocks.push(batch.block.number);
        Ok(())
    }

    async fn purge(&self, _chain_id: &str) -> StorageResult<u64> {
        let mut state = self.state.lock().await;
        let deleted = state.entries.len() as u64;
        state.entries.clear();
        state.accounts.clear();
        state.cursor = None;
        Ok(deleted)
    }
}

/// Staking lookup backed by fixed maps.
#[derive(Default)]
pub struct MockLookup {
    pub infos: HashMap<AccountId, StakingInfo>,
    pub era: Option<u32>,
}

impl MockLookup {
    pub fn with_info(mut self, stash: AccountId, info: StakingInfo) -> Self {
        self.infos.insert(stash, info);
        self
    }

    pub fn with_era(mut self, era: u32) -> Self {
        self.era = Some(era);
        self
    }
}

#[async_trait]
impl StakingLookup for MockLookup {
    async fn staking_info(&self, stash: &AccountId, _at: u64) -> ChainResult<Option<StakingInfo>> {
        Ok(self.infos.get(stash).cloned())
    }

    async fn current_era(&self, _at: u64) -> ChainResult<Option<u32>> {
        Ok(self.era)
    }
}
