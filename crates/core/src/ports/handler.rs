//! Port trait for pallet-specific handlers.
//!
//! This is the main extensibility point of the ledger. Each pallet whose
//! events or calls feed the ledger implements this trait and turns
//! normalized payloads into [`LedgerIntent`]s.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{DomainError, DomainResult};
use crate::models::AccountId;
use crate::ports::block_source::{RawEvent, RawExtrinsic};
use crate::schema::{NormalizedEvent, SchemaVariant};

/// Wrapping calls unwrapped before giving up on an extrinsic.
const MAX_CALL_DEPTH: usize = 8;

/// Effect of a bond-type record on the bonded total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondDirection {
    Increase,
    Decrease,
    /// Recorded without moving the bonded total.
    Neutral,
}

/// What a handler asks the aggregator to do with a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerIntent {
    Reward(NormalizedEvent),
    Slash(NormalizedEvent),
    Bond {
        data: NormalizedEvent,
        direction: BondDirection,
    },
    Contribution(NormalizedEvent),
    Balance(NormalizedEvent),
    /// Fill era and validator on rewards of the same extrinsic.
    AnnotateRewards {
        era: Option<u32>,
        validator: Option<AccountId>,
    },
}

impl LedgerIntent {
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerIntent::Reward(_) => "reward",
            LedgerIntent::Slash(_) => "slash",
            LedgerIntent::Bond { .. } => "bond",
            LedgerIntent::Contribution(_) => "contribution",
            LedgerIntent::Balance(_) => "balance_transaction",
            LedgerIntent::AnnotateRewards { .. } => "annotation",
        }
    }

    /// Whether the owning account needs its staking configuration.
    pub fn touches_stake(&self) -> bool {
        matches!(
            self,
            LedgerIntent::Reward(_) | LedgerIntent::Slash(_) | LedgerIntent::Bond { .. }
        )
    }

    /// Events that already account for this effect when emitted by the
    /// same extrinsic. A call-derived intent is dropped if one is present.
    pub fn covering_events(&self) -> &'static [&'static str] {
        match self {
            LedgerIntent::Bond { .. } => &["staking.Bonded", "staking.Unbonded"],
            LedgerIntent::Balance(_) => &["balances.Transfer"],
            _ => &[],
        }
    }

    pub fn data(&self) -> Option<&NormalizedEvent> {
        match self {
            LedgerIntent::Reward(data)
            | LedgerIntent::Slash(data)
            | LedgerIntent::Contribution(data)
            | LedgerIntent::Balance(data)
            | LedgerIntent::Bond { data, .. } => Some(data),
            LedgerIntent::AnnotateRewards { .. } => None,
        }
    }
}

/// Trait for pallet-specific handlers.
///
/// The handler is called for every tracked record whose name starts with
/// `pallet_name()`. The payload has already been resolved against the
/// schema registry and normalized.
#[async_trait]
pub trait PalletHandler: Send + Sync {
    /// Pallet prefix this handler processes (e.g., "staking", "balances").
    fn pallet_name(&self) -> &'static str;

    /// Record names this handler turns into ledger intents.
    ///
    /// A listed name must resolve against the schema registry: a record
    /// with no registered variant fails instead of being skipped.
    fn record_names(&self) -> &'static [&'static str] {
        &[]
    }

    /// Built-in schema variants for the records this handler understands.
    fn schemas(&self) -> Vec<SchemaVariant> {
        Vec::new()
    }

    /// The call dispatched by `extrinsic`, when this pallet wraps calls
    /// (e.g. `proxy.proxy`). The result replaces the extrinsic for schema
    /// resolution and dispatch.
    fn unwrap_call(&self, _extrinsic: &RawExtrinsic) -> DomainResult<Option<RawExtrinsic>> {
        Ok(None)
    }

    /// Process an event from this pallet.
    async fn handle_event(
        &self,
        event: &RawEvent,
        data: NormalizedEvent,
    ) -> DomainResult<Option<LedgerIntent>>;

    /// Process an extrinsic call from this pallet (optional).
    async fn handle_extrinsic(
        &self,
        _extrinsic: &RawExtrinsic,
        _data: NormalizedEvent,
    ) -> DomainResult<Option<LedgerIntent>> {
        Ok(None)
    }

    /// Priority for handler execution (higher = earlier).
    fn priority(&self) -> i32 {
        0
    }
}

/// Registry for pallet handlers.
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn PalletHandler>>,
    ordered_handlers: Vec<Arc<dyn PalletHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            ordered_handlers: Vec::new(),
        }
    }

    /// Register a handler for a pallet.
    pub fn register(&mut self, handler: Arc<dyn PalletHandler>) {
        let pallet = handler.pallet_name().to_string();
        self.handlers.insert(pallet, handler.clone());
        self.ordered_handlers.push(handler);
        self.ordered_handlers
            .sort_by_key(|b| std::cmp::Reverse(b.priority()));
    }

    /// Get handler for a specific pallet.
    pub fn get(&self, pallet: &str) -> Option<&Arc<dyn PalletHandler>> {
        self.handlers.get(pallet)
    }

    /// Get the handler for a record name (`pallet.Name`).
    pub fn for_record(&self, name: &str) -> Option<&Arc<dyn PalletHandler>> {
        let pallet = name.split_once('.').map_or(name, |(pallet, _)| pallet);
        self.get(pallet)
    }

    /// Get all handlers in priority order.
    pub fn all(&self) -> &[Arc<dyn PalletHandler>] {
        &self.ordered_handlers
    }

    /// Check if a pallet has a registered handler.
    pub fn has_handler(&self, pallet: &str) -> bool {
        self.handlers.contains_key(pallet)
    }

    /// Whether a handler turns `name` into ledger intents.
    pub fn handles(&self, name: &str) -> bool {
        self.for_record(name)
            .is_some_and(|handler| handler.record_names().contains(&name))
    }

    /// Every name some handler turns into ledger intents, in priority order.
    pub fn record_names(&self) -> Vec<&'static str> {
        self.ordered_handlers
            .iter()
            .flat_map(|handler| handler.record_names().iter().copied())
            .collect()
    }

    /// Strip wrapping calls until a directly dispatched call remains.
    ///
    /// Returns `None` when `extrinsic` is not a wrapper.
    pub fn unwrap_call(&self, extrinsic: &RawExtrinsic) -> DomainResult<Option<RawExtrinsic>> {
        let mut unwrapped: Option<RawExtrinsic> = None;
        for _ in 0..MAX_CALL_DEPTH {
            let current = unwrapped.as_ref().unwrap_or(extrinsic);
            let Some(handler) = self.for_record(&current.name) else {
                return Ok(unwrapped);
            };
            match handler.unwrap_call(current)? {
                Some(inner) => unwrapped = Some(inner),
                None => return Ok(unwrapped),
            }
        }
        Err(DomainError::ValidationError(format!(
            "{}: more than {MAX_CALL_DEPTH} nested calls",
            extrinsic.name
        )))
    }

    /// Built-in schemas of every registered handler, in priority order.
    pub fn schemas(&self) -> Vec<SchemaVariant> {
        self.ordered_handlers
            .iter()
            .flat_map(|handler| handler.schemas())
            .collect()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
