//! Port trait for the chain data source.
//!
//! This trait defines the interface for reading blocks in height order.
//! Implementations live in the infrastructure layer (e.g., `tally-archive`).

use std::collections::HashSet;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::ChainResult;
use crate::models::{AccountId, Block, BlockHash};

/// Events that close an extrinsic's execution.
const EXTRINSIC_OUTCOME_EVENTS: [&str; 2] = ["system.ExtrinsicSuccess", "system.ExtrinsicFailed"];

/// Raw block data from the source before domain processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBlock {
    /// Block number.
    pub number: u64,
    /// Block hash.
    pub hash: BlockHash,
    /// Parent hash.
    pub parent_hash: BlockHash,
    /// Block timestamp in milliseconds (from Timestamp pallet).
    #[serde(default)]
    pub timestamp: Option<u64>,
    /// Extrinsics in the block.
    #[serde(default)]
    pub extrinsics: Vec<RawExtrinsic>,
    /// Events in emission order.
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

/// Raw extrinsic data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawExtrinsic {
    /// Index in block.
    pub index: u32,
    /// Extrinsic hash.
    #[serde(default)]
    pub hash: Option<String>,
    /// Call name, `pallet.call` (e.g. `staking.bond`).
    pub name: String,
    /// Content hash of the call type at this block.
    #[serde(default)]
    pub content_hash: Option<String>,
    /// Signer (if signed).
    #[serde(default)]
    pub signer: Option<AccountId>,
    /// Call arguments: array (positional) or object (named).
    #[serde(default)]
    pub args: serde_json::Value,
    /// Success flag.
    #[serde(default = "default_success")]
    pub success: bool,
}

fn default_success() -> bool {
    true
}

/// Call carried as an argument of a dispatching call, e.g. the `call`
/// argument of `proxy.proxy`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedCall {
    /// Call name, `pallet.call`.
    pub name: String,
    /// Content hash of the call type at this block.
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub args: serde_json::Value,
    /// Outcome of the dispatch itself, when the archive records it apart
    /// from the extrinsic's.
    #[serde(default)]
    pub success: Option<bool>,
}

impl RawExtrinsic {
    /// This extrinsic as if it had dispatched `call` directly.
    ///
    /// Index, hash and signer stay those of the extrinsic. The call fails
    /// if either the extrinsic or its own dispatch failed.
    pub fn dispatching(&self, call: NestedCall) -> RawExtrinsic {
        RawExtrinsic {
            index: self.index,
            hash: self.hash.clone(),
            name: call.name,
            content_hash: call.content_hash,
            signer: self.signer.clone(),
            args: call.args,
            success: self.success && call.success.unwrap_or(true),
        }
    }
}

/// Raw event data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    /// Index in block.
    pub index: u32,
    /// Extrinsic index (if applicable).
    #[serde(default)]
    pub extrinsic_index: Option<u32>,
    /// Event name, `pallet.Event` (e.g. `staking.Rewarded`).
    pub name: String,
    /// Content hash of the event type at this block.
    #[serde(default)]
    pub content_hash: Option<String>,
    /// Event data: array (positional) or object (named).
    #[serde(default)]
    pub data: serde_json::Value,
}

/// One record of a block in processing order.
#[derive(Debug, Clone, Copy)]
pub enum BlockRecord<'a> {
    Event(&'a RawEvent),
    Call(&'a RawExtrinsic),
}

impl<'a> BlockRecord<'a> {
    /// Block-scoped raw id: `{block}-{index}` for events, `{block}-x{index}` for calls.
    pub fn raw_id(&self, block_number: u64) -> String {
        match self {
            BlockRecord::Event(event) => format!("{}-{}", block_number, event.index),
            BlockRecord::Call(ext) => format!("{}-x{}", block_number, ext.index),
        }
    }

    pub fn name(&self) -> &'a str {
        match self {
            BlockRecord::Event(event) => &event.name,
            BlockRecord::Call(ext) => &ext.name,
        }
    }

    pub fn content_hash(&self) -> Option<&'a str> {
        match self {
            BlockRecord::Event(event) => event.content_hash.as_deref(),
            BlockRecord::Call(ext) => ext.content_hash.as_deref(),
        }
    }

    pub fn payload(&self) -> &'a serde_json::Value {
        match self {
            BlockRecord::Event(event) => &event.data,
            BlockRecord::Call(ext) => &ext.args,
        }
    }
}

impl RawBlock {
    /// Transform into the domain block header.
    pub fn header(&self) -> Block {
        Block {
            number: self.number,
            hash: self.hash.clone(),
            parent_hash: self.parent_hash.clone(),
            timestamp: self
                .timestamp
                .and_then(|ts| chrono::DateTime::from_timestamp_millis(ts as i64)),
        }
    }

    /// Find an extrinsic by index.
    pub fn extrinsic(&self, index: u32) -> Option<&RawExtrinsic> {
        self.extrinsics.iter().find(|ext| ext.index == index)
    }

    /// Records in emission order.
    ///
    /// Events come in index order. A call is placed right after the
    /// `ExtrinsicSuccess`/`ExtrinsicFailed` event closing it, so its
    /// events precede it. Calls without an outcome event come last.
    pub fn records(&self) -> Vec<BlockRecord<'_>> {
        let mut events: Vec<&RawEvent> = self.events.iter().collect();
        events.sort_by_key(|event| event.index);

        let mut records = Vec::with_capacity(self.events.len() + self.extrinsics.len());
        let mut dispatched = HashSet::new();

        for event in events {
            records.push(BlockRecord::Event(event));

            if !EXTRINSIC_OUTCOME_EVENTS.contains(&event.name.as_str()) {
                continue;
            }
            if let Some(ext) = event.extrinsic_index.and_then(|idx| self.extrinsic(idx)) {
                if dispatched.insert(ext.index) {
                    records.push(BlockRecord::Call(ext));
                }
            }
        }

        let mut remaining: Vec<&RawExtrinsic> = self
            .extrinsics
            .iter()
            .filter(|ext| !dispatched.contains(&ext.index))
            .collect();
        remaining.sort_by_key(|ext| ext.index);
        records.extend(remaining.into_iter().map(BlockRecord::Call));

        records
    }
}

/// Head of the source.
#[derive(Debug, Clone)]
pub struct SourceHead {
    pub number: u64,
    pub hash: BlockHash,
}

/// Stream of blocks in increasing height order.
pub type BlockStream = Pin<Box<dyn Stream<Item = ChainResult<RawBlock>> + Send>>;

/// Port trait for the chain data source.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Highest block available, if any.
    async fn head(&self) -> ChainResult<Option<SourceHead>>;

    /// Stream blocks with `number >= from`, in increasing height order.
    async fn blocks_from(&self, from: u64) -> ChainResult<BlockStream>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(index: u32, name: &str, extrinsic_index: Option<u32>) -> RawEvent {
        RawEvent {
            index,
            extrinsic_index,
            name: name.into(),
            content_hash: None,
            data: json!([]),
        }
    }

    fn call(index: u32, name: &str) -> RawExtrinsic {
        RawExtrinsic {
            index,
            hash: None,
            name: name.into(),
            content_hash: None,
            signer: None,
            args: json!({}),
            success: true,
        }
    }

    fn block(events: Vec<RawEvent>, extrinsics: Vec<RawExtrinsic>) -> RawBlock {
        RawBlock {
            number: 7,
            hash: BlockHash([1; 32]),
            parent_hash: BlockHash([0; 32]),
            timestamp: Some(1_700_000_000_000),
            extrinsics,
            events,
        }
    }

    // Test critique: un appel est placé juste après l'événement qui clôt son extrinsic
    #[test]
    fn test_records_place_call_after_outcome_event() {
        let raw = block(
            vec![
                event(0, "staking.Bonded", Some(1)),
                event(1, "system.ExtrinsicSuccess", Some(1)),
                event(2, "balances.Transfer", Some(2)),
            ],
            vec![call(1, "staking.bond"), call(2, "balances.transfer")],
        );

        let names: Vec<&str> = raw.records().iter().map(|r| r.name()).collect();
        assert_eq!(
            names,
            vec![
                "staking.Bonded",
                "system.ExtrinsicSuccess",
                "staking.bond",
                "balances.Transfer",
                "balances.transfer",
            ]
        );
    }

    #[test]
    fn test_records_sort_events_by_index() {
        let raw = block(
            vec![event(3, "b.Second", None), event(1, "a.First", None)],
            vec![],
        );
        let names: Vec<&str> = raw.records().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["a.First", "b.Second"]);
    }

    #[test]
    fn test_raw_ids_distinguish_events_and_calls() {
        let ev = event(4, "x.Y", None);
        let ext = call(4, "x.y");
        assert_eq!(BlockRecord::Event(&ev).raw_id(10), "10-4");
        assert_eq!(BlockRecord::Call(&ext).raw_id(10), "10-x4");
    }

    #[test]
    fn test_dispatching_keeps_extrinsic_identity() {
        let mut outer = call(5, "proxy.proxy");
        outer.hash = Some("0x05".into());
        outer.success = false;

        let nested: NestedCall = serde_json::from_value(json!({
            "name": "balances.transfer",
            "content_hash": "fc85",
            "args": { "dest": "0x01", "value": "10" }
        }))
        .unwrap();
        let inner = outer.dispatching(nested);

        assert_eq!(inner.name, "balances.transfer");
        assert_eq!(inner.content_hash.as_deref(), Some("fc85"));
        assert_eq!((inner.index, inner.hash.as_deref(), inner.success), (5, Some("0x05"), false));
        assert_eq!(BlockRecord::Call(&inner).raw_id(7), "7-x5");
    }

    // Test critique: un appel délégué qui échoue fait échouer l'appel interne,
    // même si l'extrinsic réussit
    #[test]
    fn test_dispatching_failed_inner_call() {
        let outer = call(2, "proxy.proxy");
        assert!(outer.success);

        let nested: NestedCall = serde_json::from_value(json!({
            "name": "balances.transfer",
            "args": { "dest": "0x01", "value": "10" },
            "success": false
        }))
        .unwrap();
        assert!(!outer.dispatching(nested.clone()).success);

        let nested = NestedCall { success: None, ..nested };
        assert!(outer.dispatching(nested).success);
    }

    #[test]
    fn test_raw_block_deserializes_with_defaults() {
        let raw: RawBlock = serde_json::from_value(json!({
            "number": 1,
            "hash": format!("0x{}", "11".repeat(32)),
            "parent_hash": format!("0x{}", "00".repeat(32)),
            "extrinsics": [{ "index": 0, "name": "staking.unbond" }]
        }))
        .unwrap();

        assert!(raw.events.is_empty());
        assert!(raw.extrinsics[0].success);
        assert!(raw.header().timestamp.is_none());
    }
}
