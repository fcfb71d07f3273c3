//! Port trait for staking state lookups.
//!
//! The ledger needs a stash's controller and reward destination the first
//! time it touches the account, and the active era when recording slashes.
//! Both come from chain storage, which the core does not own.

use async_trait::async_trait;

use crate::error::ChainResult;
use crate::models::{AccountId, StakingInfo};

#[async_trait]
pub trait StakingLookup: Send + Sync {
    /// Controller and payee configuration of `stash` at block `at`.
    ///
    /// `None` if the account was not bonded.
    async fn staking_info(&self, stash: &AccountId, at: u64) -> ChainResult<Option<StakingInfo>>;

    /// Active era at block `at`.
    async fn current_era(&self, at: u64) -> ChainResult<Option<u32>>;
}
