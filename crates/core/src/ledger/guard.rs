//! Block-scoped guard against double-recording an extrinsic's effect.

use std::collections::{HashMap, HashSet};

use crate::ports::RawBlock;

/// Tracks which event names each extrinsic of the current block emitted.
///
/// A call-derived ledger entry is suppressed when an event of the same
/// extrinsic already produces the entry for that effect (e.g. a
/// `staking.bond` call whose `staking.Bonded` event is in the block).
#[derive(Debug, Default)]
pub struct IdempotencyGuard {
    emitted: HashMap<u32, HashSet<String>>,
}

impl IdempotencyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every event of `block` by its extrinsic. Resets prior state.
    pub fn observe_block(&mut self, block: &RawBlock) {
        self.emitted.clear();
        for event in &block.events {
            if let Some(extrinsic) = event.extrinsic_index {
                self.record(extrinsic, &event.name);
            }
        }
    }

    /// Note that `extrinsic` emitted an event named `name`.
    pub fn record(&mut self, extrinsic: u32, name: &str) {
        self.emitted
            .entry(extrinsic)
            .or_default()
            .insert(name.to_string());
    }

    /// Whether any of `covering` was emitted by `extrinsic` in this block.
    pub fn is_handled(&self, extrinsic: u32, covering: &[&str]) -> bool {
        self.emitted
            .get(&extrinsic)
            .is_some_and(|names| covering.iter().any(|name| names.contains(*name)))
    }
}
