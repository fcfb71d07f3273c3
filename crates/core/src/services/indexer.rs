//! Core indexer service - orchestrates block processing.
//!
//! Blocks are read in height order from a [`BlockSource`], decoded record
//! by record, folded by the [`LedgerAggregator`] and persisted one block
//! per transaction. The next blocks are prefetched while the current one
//! is being processed.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::error::{ChainResult, DomainError, IndexerError, IndexerResult};
use crate::ledger::{ApplyOutcome, LedgerAggregator, LedgerConfig, RecordContext};
use crate::metrics::{ProcessingTimer, record_block_indexed, record_schema_error};
use crate::models::{BlockHash, IndexerCursor};
use crate::ports::{
    BlockRecord, BlockSource, HandlerRegistry, LedgerBatch, RawBlock, Repositories, StakingLookup,
};
use crate::schema::{SchemaRegistry, normalize};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the indexer service.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// First block to read. Defaults to the block after the cursor.
    pub start_block: Option<u64>,
    /// Reprocess blocks at or below the cursor instead of skipping them.
    pub replay: bool,
    /// Number of decoded blocks buffered ahead of processing.
    pub prefetch: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            start_block: None,
            replay: false,
            prefetch: 16,
        }
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub blocks_indexed: u64,
    pub blocks_skipped: u64,
    pub entries_recorded: u64,
    pub entries_duplicate: u64,
    pub entries_suppressed: u64,
    pub entries_dropped: u64,
}

impl RunStats {
    fn count(&mut self, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Recorded => self.entries_recorded += 1,
            ApplyOutcome::Duplicate => self.entries_duplicate += 1,
            ApplyOutcome::Suppressed => self.entries_suppressed += 1,
            ApplyOutcome::Dropped => self.entries_dropped += 1,
            ApplyOutcome::Annotated(_) => {}
        }
    }
}

/// Tip of what has been processed so far in this run.
#[derive(Debug, Clone)]
struct Tip {
    number: u64,
    hash: BlockHash,
}

// =============================================================================
// IndexerService
// =============================================================================

/// Main indexer service.
///
/// # Flow
///
/// 1. Verify the stored cursor belongs to the configured chain
/// 2. Stream blocks from the cursor (or the configured start)
/// 3. Resolve, normalize and dispatch each record to its pallet handler
/// 4. Fold the resulting intents into the ledger
/// 5. Persist the block's entries, accounts and cursor atomically
///
/// A block that fails is never partially persisted: the run stops before
/// it and the cursor still points at the previous block.
pub struct IndexerService<S: BlockSource, R: Repositories> {
    ledger: LedgerConfig,
    config: IndexerConfig,
    block_source: Arc<S>,
    repositories: Arc<R>,
    handlers: Arc<HandlerRegistry>,
    schemas: Arc<SchemaRegistry>,
    lookup: Arc<dyn StakingLookup>,
}

impl<S: BlockSource + 'static, R: Repositories + 'static> IndexerService<S, R> {
    pub fn new(
        ledger: LedgerConfig,
        config: IndexerConfig,
        block_source: Arc<S>,
        repositories: Arc<R>,
        handlers: Arc<HandlerRegistry>,
        schemas: Arc<SchemaRegistry>,
        lookup: Arc<dyn StakingLookup>,
    ) -> Self {
        Self {
            ledger,
            config,
            block_source,
            repositories,
            handlers,
            schemas,
            lookup,
        }
    }

    /// Run until the source is exhausted or shutdown is requested.
    #[instrument(skip_all, fields(chain = %self.ledger.chain.name))]
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) -> IndexerResult<RunStats> {
        info!("⛓️  Starting indexer");

        self.verify_chain().await?;
        self.repositories.upsert_chain(&self.ledger.chain).await?;

        let cursor = self
            .repositories
            .cursor()
            .get_cursor(&self.ledger.chain.name)
            .await?;

        let start = match (self.config.start_block, &cursor) {
            (Some(start), _) => start,
            (None, Some(cursor)) => cursor.last_indexed_block + 1,
            (None, None) => 0,
        };

        if let Some(cursor) = &cursor {
            info!(
                cursor = cursor.last_indexed_block,
                start,
                replay = self.config.replay,
                "📍 Resuming from cursor"
            );
        } else {
            info!(start, "📍 No cursor found, starting fresh");
        }

        let mut prev = cursor
            .as_ref()
            .filter(|c| c.last_indexed_block + 1 == start)
            .map(|c| Tip {
                number: c.last_indexed_block,
                hash: c.last_indexed_hash.clone(),
            });

        let mut rx = self.prefetch(start).await?;
        let mut aggregator = LedgerAggregator::new(
            self.ledger.clone(),
            self.repositories.clone(),
            self.lookup.clone(),
        );
        let mut stats = RunStats::default();
        let mut cursor = cursor;

        loop {
            if *shutdown_rx.borrow() {
                debug!("Shutdown requested");
                return Err(IndexerError::ShutdownRequested);
            }

            // Cancellation is only observed between blocks
            let next = tokio::select! {
                biased;
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!(indexed = stats.blocks_indexed, "🛑 Shutdown requested");
                        return Err(IndexerError::ShutdownRequested);
                    }
                    continue;
                }
                next = rx.recv() => next,
            };

            let Some(raw_block) = next else {
                break;
            };
            let raw_block = raw_block?;
            let block_number = raw_block.number;

            match self
                .process_block(&mut aggregator, &raw_block, &mut cursor, &mut prev, &mut stats)
                .await
            {
                Ok(true) => {
                    stats.blocks_indexed += 1;
                    debug!(block = block_number, "⛓️  Block indexed");
                }
                Ok(false) => {
                    stats.blocks_skipped += 1;
                    trace!(block = block_number, "Block skipped (already indexed)");
                }
                Err(e) => {
                    aggregator.rollback();
                    error!(block = block_number, error = %e, "❌ Block processing failed");
                    return Err(IndexerError::BlockFailed {
                        block: block_number,
                        source: Box::new(e),
                    });
                }
            }
        }

        info!(
            indexed = stats.blocks_indexed,
            skipped = stats.blocks_skipped,
            entries = stats.entries_recorded,
            "✅ Source exhausted"
        );
        Ok(stats)
    }

    /// Verify any stored cursor belongs to the configured chain.
    async fn verify_chain(&self) -> IndexerResult<()> {
        let existing_cursor = self.repositories.cursor().get_any_cursor().await?;

        if let Some(cursor) = existing_cursor
            && cursor.chain_id != self.ledger.chain.name
        {
            error!(
                configured = %self.ledger.chain.name,
                expected = %cursor.chain_id,
                "❌ Chain mismatch! Database contains data from a different chain"
            );
            error!("   Manual action required: either configure the correct chain or purge the database");

            return Err(IndexerError::ChainMismatch {
                configured: self.ledger.chain.name.clone(),
                expected: cursor.chain_id,
            });
        }

        debug!("Chain verified");
        Ok(())
    }

    /// Read blocks on a separate task so decoding overlaps processing.
    async fn prefetch(&self, start: u64) -> IndexerResult<mpsc::Receiver<ChainResult<RawBlock>>> {
        let mut stream = self.block_source.blocks_from(start).await?;
        let (tx, rx) = mpsc::channel(self.config.prefetch.max(1));

        tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                let failed = item.is_err();
                if tx.send(item).await.is_err() || failed {
                    break;
                }
            }
        });

        Ok(rx)
    }

    /// Process a single block.
    /// Returns `Ok(true)` if processed, `Ok(false)` if skipped.
    #[instrument(skip_all, fields(block = raw_block.number))]
    async fn process_block(
        &self,
        aggregator: &mut LedgerAggregator,
        raw_block: &RawBlock,
        cursor: &mut Option<IndexerCursor>,
        prev: &mut Option<Tip>,
        stats: &mut RunStats,
    ) -> IndexerResult<bool> {
        let block_number = raw_block.number;

        if let Some(stored) = cursor.as_ref()
            && block_number <= stored.last_indexed_block
        {
            if block_number == stored.last_indexed_block && raw_block.hash != stored.last_indexed_hash {
                warn!(
                    stored = %stored.last_indexed_hash,
                    incoming = %raw_block.hash,
                    "🔄 Block hash differs from the cursor"
                );
                return Err(DomainError::ReorgDetected(block_number).into());
            }
            if !self.config.replay {
                return Ok(false);
            }
        }

        self.check_parent(raw_block, prev.as_ref())?;

        let _timer = ProcessingTimer::new();
        aggregator.begin_block(raw_block);

        for record in raw_block.records() {
            let unwrapped = match record {
                BlockRecord::Call(extrinsic) => self.handlers.unwrap_call(extrinsic)?,
                BlockRecord::Event(_) => None,
            };
            if let Some(inner) = &unwrapped {
                trace!(extrinsic = inner.index, call = %inner.name, "Unwrapped dispatched call");
            }
            let record = unwrapped.as_ref().map_or(record, BlockRecord::Call);
            let ctx = RecordContext::from_record(raw_block, record);
            if let Some(outcome) = self.process_record(aggregator, record, &ctx).await? {
                stats.count(outcome);
            }
        }

        let effects = aggregator.finish_block()?;

        let advances = cursor
            .as_ref()
            .is_none_or(|c| block_number > c.last_indexed_block);
        let new_cursor = advances.then(|| IndexerCursor {
            chain_id: self.ledger.chain.name.clone(),
            last_indexed_block: block_number,
            last_indexed_hash: raw_block.hash.clone(),
            updated_at: chrono::Utc::now(),
        });

        self.repositories
            .persist_block_atomic(LedgerBatch {
                block: &effects.block,
                accounts: &effects.accounts,
                entries: &effects.entries,
                cursor: new_cursor.as_ref(),
            })
            .await?;

        if let Some(new_cursor) = new_cursor {
            *cursor = Some(new_cursor);
        }
        *prev = Some(Tip {
            number: block_number,
            hash: raw_block.hash.clone(),
        });

        record_block_indexed();
        trace!(
            entries = effects.entries.len(),
            accounts = effects.accounts.len(),
            cached = aggregator.cached_accounts(),
            "Block persisted"
        );
        Ok(true)
    }

    /// Parent hash must link to the previous block of this run.
    fn check_parent(&self, raw_block: &RawBlock, prev: Option<&Tip>) -> IndexerResult<()> {
        let Some(prev) = prev else {
            return Ok(());
        };

        if raw_block.number <= prev.number {
            return Err(DomainError::ValidationError(format!(
                "block {} received after block {}",
                raw_block.number, prev.number
            ))
            .into());
        }

        if raw_block.number == prev.number + 1 {
            if raw_block.parent_hash != prev.hash {
                warn!(
                    expected = %prev.hash,
                    parent = %raw_block.parent_hash,
                    "🔄 Reorg detected! Parent hash mismatch"
                );
                return Err(DomainError::ReorgDetected(raw_block.number).into());
            }
        } else {
            warn!(
                block = raw_block.number,
                latest = prev.number,
                gap = raw_block.number - prev.number - 1,
                "⚠️  Gap detected in block sequence"
            );
        }

        Ok(())
    }

    /// Resolve, normalize, dispatch and fold one record.
    ///
    /// Records of pallets without a handler are ignored, and so are names
    /// the handler neither lists nor has a schema for. A name the handler
    /// lists must resolve: without a registered variant it fails with
    /// `UnknownSchema`.
    async fn process_record(
        &self,
        aggregator: &mut LedgerAggregator,
        record: BlockRecord<'_>,
        ctx: &RecordContext<'_>,
    ) -> IndexerResult<Option<ApplyOutcome>> {
        let name = ctx.name;
        let Some(handler) = self.handlers.for_record(name) else {
            return Ok(None);
        };
        if !self.schemas.is_tracked(name) && !self.handlers.handles(name) {
            return Ok(None);
        }

        let variant = self
            .schemas
            .select(name, record.content_hash(), self.ledger.schema_mode)
            .inspect_err(|e| {
                error!(record = %ctx.raw_id, error = %e, "❌ Schema resolution failed");
                record_schema_error(name);
            })?;

        let data = normalize(&variant, record.payload()).inspect_err(|e| {
            error!(record = %ctx.raw_id, version = %variant.version, error = %e, "❌ Payload normalization failed");
            record_schema_error(name);
        })?;

        let intent = match record {
            BlockRecord::Event(event) => handler.handle_event(event, data).await?,
            BlockRecord::Call(extrinsic) => handler.handle_extrinsic(extrinsic, data).await?,
        };

        let Some(intent) = intent else {
            return Ok(None);
        };

        Ok(Some(aggregator.apply(intent, ctx).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::error::{ChainError, DomainResult};
    use crate::ledger::testing::{MockLookup, MockRepositories};
    use crate::models::{AccountId, Chain, EntryKind};
    use crate::ports::{
        BlockStream, BondDirection, CursorRepository, LedgerIntent, PalletHandler, RawEvent,
        RawExtrinsic, SourceHead,
    };
    use crate::schema::{Field, NormalizedEvent, PayloadLayout, SchemaMode, SchemaVariant};

    const BONDED_HASH: &str = "47facb114cad5e5d0612ab12cd27899aed054423f61b0ee4027c8d49284108a0";

    struct VecSource(Vec<RawBlock>);

    #[async_trait]
    impl BlockSource for VecSource {
        async fn head(&self) -> ChainResult<Option<SourceHead>> {
            Ok(self.0.last().map(|b| SourceHead {
                number: b.number,
                hash: b.hash.clone(),
            }))
        }

        async fn blocks_from(&self, from: u64) -> ChainResult<BlockStream> {
            let blocks: Vec<ChainResult<RawBlock>> = self
                .0
                .iter()
                .filter(|b| b.number >= from)
                .cloned()
                .map(Ok)
                .collect();
            Ok(Box::pin(futures::stream::iter(blocks)))
        }
    }

    struct FailingSource;

    #[async_trait]
    impl BlockSource for FailingSource {
        async fn head(&self) -> ChainResult<Option<SourceHead>> {
            Ok(None)
        }

        async fn blocks_from(&self, _from: u64) -> ChainResult<BlockStream> {
            Ok(Box::pin(futures::stream::iter(vec![Err(ChainError::BlockDecodeError {
                line: 1,
                message: "truncated".into(),
            })])))
        }
    }

    struct BondedHandler;

    #[async_trait]
    impl PalletHandler for BondedHandler {
        fn pallet_name(&self) -> &'static str {
            "staking"
        }

        fn record_names(&self) -> &'static [&'static str] {
            &["staking.Bonded", "staking.Unbonded"]
        }

        async fn handle_event(
            &self,
            _event: &RawEvent,
            data: NormalizedEvent,
        ) -> DomainResult<Option<LedgerIntent>> {
            Ok(Some(LedgerIntent::Bond {
                data,
                direction: BondDirection::Increase,
            }))
        }

        async fn handle_extrinsic(
            &self,
            _extrinsic: &RawExtrinsic,
            _data: NormalizedEvent,
        ) -> DomainResult<Option<LedgerIntent>> {
            Ok(None)
        }
    }

    fn hash(n: u64) -> BlockHash {
        BlockHash([n as u8 + 1; 32])
    }

    fn bonded_block(number: u64, amount: u64, content_hash: &str) -> RawBlock {
        RawBlock {
            number,
            hash: hash(number),
            parent_hash: if number == 0 { BlockHash([0; 32]) } else { hash(number - 1) },
            timestamp: Some(1_600_000_000_000 + number * 6000),
            extrinsics: vec![],
            events: vec![RawEvent {
                index: 0,
                extrinsic_index: None,
                name: "staking.Bonded".into(),
                content_hash: Some(content_hash.into()),
                data: json!([format!("0x{}", "aa".repeat(32)), amount]),
            }],
        }
    }

    fn service<S: BlockSource + 'static>(
        source: S,
        repos: Arc<MockRepositories>,
        config: IndexerConfig,
    ) -> IndexerService<S, MockRepositories> {
        let mut handlers = HandlerRegistry::new();
        handlers.register(Arc::new(BondedHandler));

        let mut schemas = SchemaRegistry::new();
        schemas
            .register(SchemaVariant::new(
                "staking.Bonded",
                "V0",
                BONDED_HASH,
                PayloadLayout::positional(&[Field::Account, Field::Amount]),
            ))
            .unwrap();

        IndexerService::new(
            LedgerConfig {
                chain: Chain {
                    name: "polkadot".into(),
                    address_prefix: 0,
                },
                id_prefix: "dot".into(),
                schema_mode: SchemaMode::Historical,
            },
            config,
            Arc::new(source),
            repos,
            Arc::new(handlers),
            Arc::new(schemas),
            Arc::new(MockLookup::default()),
        )
    }

    fn stash() -> String {
        AccountId([0xaa; 32]).to_hex()
    }

    // Test critique: les blocs sont indexés dans l'ordre et le curseur avance
    #[tokio::test]
    async fn test_run_indexes_blocks_and_advances_cursor() {
        let repos = Arc::new(MockRepositories::default());
        let blocks = vec![bonded_block(0, 10, BONDED_HASH), bonded_block(1, 15, BONDED_HASH)];
        let (_tx, rx) = watch::channel(false);

        let stats = service(VecSource(blocks), repos.clone(), IndexerConfig::default())
            .run(rx)
            .await
            .unwrap();

        assert_eq!(stats.blocks_indexed, 2);
        assert_eq!(stats.entries_recorded, 2);
        assert_eq!(repos.account(&stash()).await.unwrap().total_bond, 25);

        let entries = repos.stored_entries().await;
        assert_eq!(entries[1].id, "dot-1-0");
        assert!(matches!(entries[1].kind, EntryKind::Bond { total: 25, success: true }));

        let cursor = repos.get_cursor("polkadot").await.unwrap().unwrap();
        assert_eq!(cursor.last_indexed_block, 1);
        assert_eq!(repos.state.lock().await.chains.len(), 1);
    }

    // Test critique: un schéma inconnu arrête le run sans persister le bloc
    #[tokio::test]
    async fn test_unknown_schema_fails_block_atomically() {
        let repos = Arc::new(MockRepositories::default());
        let blocks = vec![bonded_block(0, 10, BONDED_HASH), bonded_block(1, 15, "deadbeef")];
        let (_tx, rx) = watch::channel(false);

        let err = service(VecSource(blocks), repos.clone(), IndexerConfig::default())
            .run(rx)
            .await
            .unwrap_err();

        match err {
            IndexerError::BlockFailed { block, source } => {
                assert_eq!(block, 1);
                assert!(matches!(
                    *source,
                    IndexerError::Domain(DomainError::UnknownSchema { .. })
                ));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(repos.get_cursor("polkadot").await.unwrap().unwrap().last_indexed_block, 0);
        assert_eq!(repos.account(&stash()).await.unwrap().total_bond, 10);
        assert_eq!(repos.stored_entries().await.len(), 1);
    }

    // Test critique: un enregistrement traité par un handler mais sans schéma n'est jamais ignoré
    #[tokio::test]
    async fn test_handled_record_without_schema_fails() {
        let repos = Arc::new(MockRepositories::default());
        let mut unregistered = bonded_block(1, 15, "c0ffee");
        unregistered.events[0].name = "staking.Unbonded".into();
        let blocks = vec![bonded_block(0, 10, BONDED_HASH), unregistered];
        let (_tx, rx) = watch::channel(false);

        let err = service(VecSource(blocks), repos.clone(), IndexerConfig::default())
            .run(rx)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IndexerError::BlockFailed { block: 1, ref source }
                if matches!(
                    &**source,
                    IndexerError::Domain(DomainError::UnknownSchema { name, .. }) if name == "staking.Unbonded"
                )
        ));
        assert_eq!(repos.get_cursor("polkadot").await.unwrap().unwrap().last_indexed_block, 0);
    }

    #[tokio::test]
    async fn test_unlisted_record_without_schema_is_ignored() {
        let repos = Arc::new(MockRepositories::default());
        let mut era_paid = bonded_block(0, 10, "c0ffee");
        era_paid.events[0].name = "staking.EraPaid".into();
        let (_tx, rx) = watch::channel(false);

        let stats = service(VecSource(vec![era_paid]), repos.clone(), IndexerConfig::default())
            .run(rx)
            .await
            .unwrap();

        assert_eq!(stats.blocks_indexed, 1);
        assert_eq!(stats.entries_recorded, 0);
        assert!(repos.stored_entries().await.is_empty());
    }

    // Test critique: reprendre après le curseur ne rejoue pas les blocs déjà indexés
    #[tokio::test]
    async fn test_resume_skips_indexed_blocks() {
        let repos = Arc::new(MockRepositories::default());
        let blocks = vec![bonded_block(0, 10, BONDED_HASH), bonded_block(1, 15, BONDED_HASH)];

        let (_tx, rx) = watch::channel(false);
        service(VecSource(blocks.clone()), repos.clone(), IndexerConfig::default())
            .run(rx)
            .await
            .unwrap();

        let (_tx, rx) = watch::channel(false);
        let config = IndexerConfig {
            start_block: Some(0),
            ..Default::default()
        };
        let stats = service(VecSource(blocks), repos.clone(), config)
            .run(rx)
            .await
            .unwrap();

        assert_eq!(stats.blocks_skipped, 2);
        assert_eq!(repos.account(&stash()).await.unwrap().total_bond, 25);
    }

    // Test critique: rejouer une plage déjà indexée est idempotent
    #[tokio::test]
    async fn test_replay_is_idempotent() {
        let repos = Arc::new(MockRepositories::default());
        let blocks = vec![bonded_block(0, 10, BONDED_HASH), bonded_block(1, 15, BONDED_HASH)];

        let (_tx, rx) = watch::channel(false);
        service(VecSource(blocks.clone()), repos.clone(), IndexerConfig::default())
            .run(rx)
            .await
            .unwrap();

        let (_tx, rx) = watch::channel(false);
        let config = IndexerConfig {
            start_block: Some(0),
            replay: true,
            ..Default::default()
        };
        let stats = service(VecSource(blocks), repos.clone(), config)
            .run(rx)
            .await
            .unwrap();

        assert_eq!(stats.blocks_indexed, 2);
        assert_eq!(stats.entries_duplicate, 2);
        assert_eq!(stats.entries_recorded, 0);
        assert_eq!(repos.account(&stash()).await.unwrap().total_bond, 25);
        assert_eq!(repos.stored_entries().await.len(), 2);
        assert_eq!(repos.get_cursor("polkadot").await.unwrap().unwrap().last_indexed_block, 1);
    }

    #[tokio::test]
    async fn test_parent_mismatch_is_reorg() {
        let repos = Arc::new(MockRepositories::default());
        let mut orphan = bonded_block(1, 15, BONDED_HASH);
        orphan.parent_hash = BlockHash([0xff; 32]);
        let (_tx, rx) = watch::channel(false);

        let err = service(VecSource(vec![bonded_block(0, 10, BONDED_HASH), orphan]), repos, IndexerConfig::default())
            .run(rx)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IndexerError::BlockFailed { block: 1, ref source }
                if matches!(**source, IndexerError::Domain(DomainError::ReorgDetected(1)))
        ));
    }

    #[tokio::test]
    async fn test_chain_mismatch() {
        let repos = Arc::new(MockRepositories::default());
        repos
            .set_cursor(&IndexerCursor {
                chain_id: "kusama".into(),
                last_indexed_block: 3,
                last_indexed_hash: hash(3),
                updated_at: chrono::Utc::now(),
            })
            .await
            .unwrap();
        let (_tx, rx) = watch::channel(false);

        let err = service(VecSource(vec![]), repos, IndexerConfig::default())
            .run(rx)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::ChainMismatch { .. }));
    }

    #[tokio::test]
    async fn test_shutdown_before_first_block() {
        let repos = Arc::new(MockRepositories::default());
        let (_tx, rx) = watch::channel(true);

        let err = service(VecSource(vec![bonded_block(0, 1, BONDED_HASH)]), repos.clone(), IndexerConfig::default())
            .run(rx)
            .await
            .unwrap_err();

        assert!(matches!(err, IndexerError::ShutdownRequested));
        assert!(repos.stored_entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_source_error_propagates() {
        let repos = Arc::new(MockRepositories::default());
        let (_tx, rx) = watch::channel(false);

        let err = service(FailingSource, repos, IndexerConfig::default())
            .run(rx)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::Chain(ChainError::BlockDecodeError { line: 1, .. })));
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_cursor() {
        let repos = Arc::new(MockRepositories::default());
        repos.fail_next_persist();
        let (_tx, rx) = watch::channel(false);

        let err = service(VecSource(vec![bonded_block(0, 1, BONDED_HASH)]), repos.clone(), IndexerConfig::default())
            .run(rx)
            .await
            .unwrap_err();

        assert!(matches!(err, IndexerError::BlockFailed { block: 0, .. }));
        assert!(repos.get_cursor("polkadot").await.unwrap().is_none());
    }
}
