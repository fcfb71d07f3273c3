//! Incremental ledger aggregation.
//!
//! The aggregator folds ledger intents, in arrival order, into per-account
//! running totals and buffers the resulting entries for the current block.
//! Nothing is written until the indexer persists the block's effects.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, instrument, trace, warn};

use super::accounts::AccountRegistry;
use super::guard::IdempotencyGuard;
use crate::error::{DomainError, DomainResult};
use crate::metrics::{record_clamp, record_dropped, record_duplicate, record_entry, record_suppressed};
use crate::models::{Account, AccountId, Block, Chain, EntryKind, LedgerEntry};
use crate::ports::{
    BlockRecord, BondDirection, LedgerIntent, RawBlock, RawExtrinsic, Repositories, StakingLookup,
};
use crate::schema::{NormalizedEvent, SchemaMode};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration consumed by the ledger core.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Chain reference attached to every entry.
    pub chain: Chain,
    /// Namespace of entry ids: `{id_prefix}-{raw id}`.
    pub id_prefix: String,
    pub schema_mode: SchemaMode,
}

// =============================================================================
// Record context
// =============================================================================

/// Whether a record is an event or a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOrigin {
    Event,
    Call,
}

/// Where a record sits in its block.
#[derive(Debug, Clone)]
pub struct RecordContext<'a> {
    /// Block-scoped id (`{block}-{index}` or `{block}-x{index}`).
    pub raw_id: String,
    pub name: &'a str,
    pub origin: RecordOrigin,
    pub extrinsic_index: Option<u32>,
    /// Triggering extrinsic, if the record has one.
    pub extrinsic: Option<&'a RawExtrinsic>,
}

impl<'a> RecordContext<'a> {
    pub fn from_record(block: &'a RawBlock, record: BlockRecord<'a>) -> Self {
        match record {
            BlockRecord::Event(event) => Self {
                raw_id: record.raw_id(block.number),
                name: &event.name,
                origin: RecordOrigin::Event,
                extrinsic_index: event.extrinsic_index,
                extrinsic: event.extrinsic_index.and_then(|idx| block.extrinsic(idx)),
            },
            BlockRecord::Call(ext) => Self {
                raw_id: record.raw_id(block.number),
                name: &ext.name,
                origin: RecordOrigin::Call,
                extrinsic_index: Some(ext.index),
                extrinsic: Some(ext),
            },
        }
    }

    /// Outcome of the triggering extrinsic. Records without one succeeded.
    pub fn success(&self) -> bool {
        self.extrinsic.is_none_or(|ext| ext.success)
    }

    pub fn signer(&self) -> Option<&'a AccountId> {
        self.extrinsic.and_then(|ext| ext.signer.as_ref())
    }
}

/// What [`LedgerAggregator::apply`] did with an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Recorded,
    /// The entry id was already recorded; nothing was folded.
    Duplicate,
    /// An event of the same extrinsic already covers this call.
    Suppressed,
    /// No account identity was available.
    Dropped,
    /// Number of reward entries annotated.
    Annotated(usize),
}

/// Everything a block changed, ready for persistence.
#[derive(Debug)]
pub struct BlockEffects {
    pub block: Block,
    pub accounts: Vec<Account>,
    pub entries: Vec<LedgerEntry>,
}

// =============================================================================
// Folding rules
// =============================================================================

struct Folded {
    amount: Option<u128>,
    kind: EntryKind,
    clamped: bool,
}

/// `total - amount`, clamped at zero. The flag reports a clamp.
fn clamp_sub(total: u128, amount: u128) -> (u128, bool) {
    match total.checked_sub(amount) {
        Some(rest) => (rest, false),
        None => (0, true),
    }
}

/// Name recorded on an entry. Bond entries derived from a call carry the
/// matching staking event name.
fn entry_name(intent: &LedgerIntent, ctx: &RecordContext<'_>) -> String {
    let direction = match intent {
        LedgerIntent::Bond { direction, .. } if ctx.origin == RecordOrigin::Call => *direction,
        _ => return ctx.name.to_string(),
    };
    match direction {
        BondDirection::Increase => "staking.Bonded".to_string(),
        BondDirection::Decrease => "staking.Unbonded".to_string(),
        BondDirection::Neutral => ctx.name.to_string(),
    }
}

fn require_amount(data: &NormalizedEvent, name: &str) -> DomainResult<u128> {
    data.amount.ok_or_else(|| DomainError::MissingField {
        name: name.to_string(),
        field: "amount".to_string(),
    })
}

/// Apply one intent to `account` and build the entry's variant part.
fn fold(
    account: &mut Account,
    intent: &LedgerIntent,
    success: bool,
    slash_era: Option<u32>,
    name: &str,
) -> DomainResult<Folded> {
    match intent {
        LedgerIntent::Reward(data) => {
            let amount = require_amount(data, name)?;
            account.total_reward = account.total_reward.saturating_add(amount);
            if account.is_staked_payee() {
                account.total_bond = account.total_bond.saturating_add(amount);
            }
            Ok(Folded {
                amount: Some(amount),
                kind: EntryKind::Reward {
                    total: account.total_reward,
                    era: data.era,
                    validator: data.validator.as_ref().map(AccountId::to_hex),
                },
                clamped: false,
            })
        }
        LedgerIntent::Slash(data) => {
            let amount = require_amount(data, name)?;
            account.total_slash = account.total_slash.saturating_add(amount);
            let (bond, clamped) = clamp_sub(account.total_bond, amount);
            account.total_bond = bond;
            Ok(Folded {
                amount: Some(amount),
                kind: EntryKind::Slash {
                    total: account.total_slash,
                    era: slash_era,
                },
                clamped,
            })
        }
        LedgerIntent::Bond { data, direction } => {
            let amount = require_amount(data, name)?;
            let mut clamped = false;
            if success {
                match direction {
                    BondDirection::Increase => {
                        account.total_bond = account.total_bond.saturating_add(amount);
                    }
                    BondDirection::Decrease => {
                        let (bond, hit) = clamp_sub(account.total_bond, amount);
                        account.total_bond = bond;
                        clamped = hit;
                    }
                    BondDirection::Neutral => {}
                }
            }
            Ok(Folded {
                amount: Some(amount),
                kind: EntryKind::Bond {
                    total: account.total_bond,
                    success,
                },
                clamped,
            })
        }
        LedgerIntent::Contribution(data) => {
            let para_id = data.para_id.ok_or_else(|| DomainError::MissingField {
                name: name.to_string(),
                field: "para_id".to_string(),
            })?;
            Ok(Folded {
                amount: data.amount,
                kind: EntryKind::Contribution { para_id, success },
                clamped: false,
            })
        }
        LedgerIntent::Balance(data) => Ok(Folded {
            amount: data.amount,
            kind: EntryKind::BalanceTransaction {
                from: data.from.as_ref().map(AccountId::to_hex),
                to: data.to.as_ref().map(AccountId::to_hex),
                status: data.status.clone(),
                free: data.free,
                reserved: data.reserved,
                success,
            },
            clamped: false,
        }),
        LedgerIntent::AnnotateRewards { .. } => Err(DomainError::ValidationError(format!(
            "{name}: annotations do not produce entries"
        ))),
    }
}

// =============================================================================
// LedgerAggregator
// =============================================================================

/// Stateful fold of ledger intents into accounts and entries.
///
/// One aggregator processes one chain, one block at a time:
/// [`begin_block`](Self::begin_block), any number of
/// [`apply`](Self::apply), then [`finish_block`](Self::finish_block) or
/// [`rollback`](Self::rollback).
pub struct LedgerAggregator {
    config: LedgerConfig,
    accounts: AccountRegistry,
    guard: IdempotencyGuard,
    lookup: Arc<dyn StakingLookup>,
    repositories: Arc<dyn Repositories>,
    block: Option<Block>,
    pending: Vec<LedgerEntry>,
    pending_ids: HashSet<String>,
}

impl LedgerAggregator {
    pub fn new(
        config: LedgerConfig,
        repositories: Arc<dyn Repositories>,
        lookup: Arc<dyn StakingLookup>,
    ) -> Self {
        Self {
            config,
            accounts: AccountRegistry::new(repositories.clone()),
            guard: IdempotencyGuard::new(),
            lookup,
            repositories,
            block: None,
            pending: Vec::new(),
            pending_ids: HashSet::new(),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Start a block. Discards anything left from an unfinished one.
    pub fn begin_block(&mut self, raw: &RawBlock) {
        if !self.pending.is_empty() {
            warn!(pending = self.pending.len(), "⚠️  Discarding unfinished block");
        }
        self.pending.clear();
        self.pending_ids.clear();
        self.guard.observe_block(raw);
        self.block = Some(raw.header());
    }

    /// Globally unique entry id for a record.
    pub fn entry_id(&self, ctx: &RecordContext<'_>) -> String {
        format!("{}-{}", self.config.id_prefix, ctx.raw_id)
    }

    /// Fold one intent into the ledger.
    #[instrument(skip_all, fields(entry = %ctx.raw_id, kind = intent.kind()))]
    pub async fn apply(
        &mut self,
        intent: LedgerIntent,
        ctx: &RecordContext<'_>,
    ) -> DomainResult<ApplyOutcome> {
        let block = self
            .block
            .clone()
            .ok_or_else(|| DomainError::ValidationError("no block in progress".into()))?;

        if let LedgerIntent::AnnotateRewards { era, validator } = &intent {
            let annotated = self.annotate_rewards(ctx.extrinsic_index, *era, validator.as_ref());
            trace!(annotated, "Rewards annotated");
            return Ok(ApplyOutcome::Annotated(annotated));
        }

        if ctx.origin == RecordOrigin::Call
            && let Some(index) = ctx.extrinsic_index
            && self.guard.is_handled(index, intent.covering_events())
        {
            trace!(extrinsic = index, "Call already covered by an event");
            record_suppressed(intent.kind());
            return Ok(ApplyOutcome::Suppressed);
        }

        let id = self.entry_id(ctx);
        if self.pending_ids.contains(&id) || self.repositories.entries().entry_exists(&id).await? {
            debug!(entry = %id, "Entry already recorded, skipping");
            record_duplicate(intent.kind());
            return Ok(ApplyOutcome::Duplicate);
        }

        let Some(owner) = self.resolve_owner(&intent, ctx) else {
            let err = DomainError::MissingAccountIdentity { entry_id: id };
            warn!(error = %err, "⚠️  Dropping entry");
            record_dropped("missing_account");
            return Ok(ApplyOutcome::Dropped);
        };

        if intent.touches_stake() {
            self.ensure_staking_info(&owner, block.number).await?;
        }

        let slash_era = match &intent {
            LedgerIntent::Slash(data) if data.era.is_none() => {
                self.lookup.current_era(block.number).await?
            }
            LedgerIntent::Slash(data) => data.era,
            _ => None,
        };

        let success = ctx.success();
        let account = self.accounts.get_or_create(&owner).await?;
        let folded = fold(account, &intent, success, slash_era, ctx.name)?;

        if folded.clamped {
            warn!(
                account = %owner,
                entry = %id,
                amount = ?folded.amount,
                "⚠️  Bonded total clamped at zero"
            );
            record_clamp(intent.kind());
        }

        let kind_label = folded.kind.label();
        self.pending.push(LedgerEntry {
            id: id.clone(),
            chain: self.config.chain.name.clone(),
            block_number: block.number,
            block_hash: block.hash.clone(),
            timestamp: block.timestamp,
            extrinsic_index: ctx.extrinsic_index,
            extrinsic_hash: ctx.extrinsic.and_then(|ext| ext.hash.clone()),
            name: entry_name(&intent, ctx),
            account: owner,
            amount: folded.amount,
            kind: folded.kind,
        });
        self.pending_ids.insert(id);
        record_entry(kind_label);

        Ok(ApplyOutcome::Recorded)
    }

    /// Account owning an entry: payload account, then sender for balance
    /// records, then the extrinsic signer.
    fn resolve_owner(&self, intent: &LedgerIntent, ctx: &RecordContext<'_>) -> Option<String> {
        let data = intent.data()?;
        let from = match intent {
            LedgerIntent::Balance(_) => data.from.as_ref(),
            _ => None,
        };
        data.account
            .as_ref()
            .or(from)
            .or_else(|| ctx.signer())
            .map(AccountId::to_hex)
    }

    /// Populate staking info on first touch. Left unset if the stash is
    /// not bonded, so a later touch queries again.
    async fn ensure_staking_info(&mut self, owner: &str, at: u64) -> DomainResult<()> {
        if self.accounts.get_or_create(owner).await?.staking_info.is_some() {
            return Ok(());
        }

        let Ok(stash) = AccountId::from_hex(owner) else {
            return Ok(());
        };

        if let Some(info) = self.lookup.staking_info(&stash, at).await? {
            trace!(account = owner, payee = ?info.payee, "Staking info populated");
            self.accounts.get_or_create(owner).await?.staking_info = Some(info);
        }
        Ok(())
    }

    fn annotate_rewards(
        &mut self,
        extrinsic_index: Option<u32>,
        era: Option<u32>,
        validator: Option<&AccountId>,
    ) -> usize {
        let Some(index) = extrinsic_index else {
            return 0;
        };

        let mut annotated = 0;
        for entry in &mut self.pending {
            if entry.extrinsic_index != Some(index) {
                continue;
            }
            if let EntryKind::Reward {
                era: entry_era,
                validator: entry_validator,
                ..
            } = &mut entry.kind
            {
                let mut changed = false;
                if entry_era.is_none() && era.is_some() {
                    *entry_era = era;
                    changed = true;
                }
                if entry_validator.is_none()
                    && let Some(validator) = validator
                {
                    *entry_validator = Some(validator.to_hex());
                    changed = true;
                }
                if changed {
                    annotated += 1;
                }
            }
        }
        annotated
    }

    /// Entries buffered for the current block.
    pub fn pending(&self) -> &[LedgerEntry] {
        &self.pending
    }

    /// Cached view of an account.
    pub fn account(&self, id: &str) -> Option<&Account> {
        self.accounts.get(id)
    }

    /// Accounts currently held in memory.
    pub fn cached_accounts(&self) -> usize {
        self.accounts.cached()
    }

    /// Hand over the block's effects for persistence.
    ///
    /// The touched accounts leave the cache with them; the next block
    /// reads them back from the repository.
    pub fn finish_block(&mut self) -> DomainResult<BlockEffects> {
        let block = self
            .block
            .take()
            .ok_or_else(|| DomainError::ValidationError("no block in progress".into()))?;
        self.pending_ids.clear();
        Ok(BlockEffects {
            block,
            accounts: self.accounts.take_dirty(),
            entries: std::mem::take(&mut self.pending),
        })
    }

    /// Forget a block whose effects will not be persisted.
    ///
    /// The account cache is dropped as well: it may hold totals that
    /// include the discarded entries.
    pub fn rollback(&mut self) {
        self.block = None;
        self.pending.clear();
        self.pending_ids.clear();
        self.accounts.reset();
    }
}
