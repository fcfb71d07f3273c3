//! Ledger entry repository implementation for PostgreSQL.
//!
//! All entry variants share the `ledger_entries` table; variant-specific
//! columns are NULL for the other kinds.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use tally_core::error::{StorageError, StorageResult};
use tally_core::models::{BlockHash, EntryKind, LedgerEntry};
use tally_core::ports::EntryRepository;

use super::database::Database;
use super::helpers::{bytes_to_hash32, parse_optional_u128, query_err, to_i32};

const SELECT_ENTRY: &str = r#"
    SELECT id, chain, kind, block_number, block_hash, timestamp,
           extrinsic_index, extrinsic_hash, name, account,
           amount::TEXT AS amount, total::TEXT AS total,
           era, validator, success, para_id,
           from_account, to_account, status,
           free::TEXT AS free, reserved::TEXT AS reserved
    FROM ledger_entries
"#;

/// PostgreSQL implementation of EntryRepository.
pub struct PgEntryRepository {
    pool: PgPool,
}

impl PgEntryRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }
}

#[async_trait]
impl EntryRepository for PgEntryRepository {
    async fn entry_exists(&self, id: &str) -> StorageResult<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM ledger_entries WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(query_err)?;
        Ok(exists)
    }

    async fn list_entries_for_account(&self, account: &str) -> StorageResult<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            "{SELECT_ENTRY} WHERE account = $1 ORDER BY seq"
        ))
        .bind(account)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;

        rows.into_iter().map(EntryRow::into_entry).collect()
    }

    async fn count_entries(&self) -> StorageResult<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ledger_entries")
            .fetch_one(&self.pool)
            .await
            .map_err(query_err)?;
        Ok(count as u64)
    }
}

/// Variant-specific columns of an entry.
#[derive(Debug, Default, PartialEq)]
struct KindColumns<'a> {
    total: Option<u128>,
    era: Option<u32>,
    validator: Option<&'a str>,
    success: Option<bool>,
    para_id: Option<u32>,
    from: Option<&'a str>,
    to: Option<&'a str>,
    status: Option<&'a str>,
    free: Option<u128>,
    reserved: Option<u128>,
}

impl<'a> KindColumns<'a> {
    fn of(kind: &'a EntryKind) -> Self {
        match kind {
            EntryKind::Reward { total, era, validator } => Self {
                total: Some(*total),
                era: *era,
                validator: validator.as_deref(),
                ..Default::default()
            },
            EntryKind::Slash { total, era } => Self {
                total: Some(*total),
                era: *era,
                ..Default::default()
            },
            EntryKind::Bond { total, success } => Self {
                total: Some(*total),
                success: Some(*success),
                ..Default::default()
            },
            EntryKind::Contribution { para_id, success } => Self {
                para_id: Some(*para_id),
                success: Some(*success),
                ..Default::default()
            },
            EntryKind::BalanceTransaction {
                from,
                to,
                status,
                free,
                reserved,
                success,
            } => Self {
                from: from.as_deref(),
                to: to.as_deref(),
                status: status.as_deref(),
                free: *free,
                reserved: *reserved,
                success: Some(*success),
                ..Default::default()
            },
        }
    }
}

/// Insert an entry inside an open transaction, keeping any existing row
/// with the same id.
///
/// Returns whether a row was written.
pub(super) async fn insert_entry(conn: &mut PgConnection, entry: &LedgerEntry) -> StorageResult<bool> {
    let cols = KindColumns::of(&entry.kind);
    let result = sqlx::query(
        r#"
        INSERT INTO ledger_entries (
            id, chain, kind, block_number, block_hash, timestamp,
            extrinsic_index, extrinsic_hash, name, account, amount, total,
            era, validator, success, para_id,
            from_account, to_account, status, free, reserved
        )
        VALUES (
            $1, $2, $3, $4, $5, $6,
            $7, $8, $9, $10, $11::NUMERIC, $12::NUMERIC,
            $13, $14, $15, $16,
            $17, $18, $19, $20::NUMERIC, $21::NUMERIC
        )
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.chain)
    .bind(entry.kind.label())
    .bind(entry.block_number as i64)
    .bind(&entry.block_hash.0[..])
    .bind(entry.timestamp)
    .bind(entry.extrinsic_index.map(|i| to_i32(i, "entry.extrinsic_index")).transpose()?)
    .bind(&entry.extrinsic_hash)
    .bind(&entry.name)
    .bind(&entry.account)
    .bind(entry.amount.map(|a| a.to_string()))
    .bind(cols.total.map(|t| t.to_string()))
    .bind(cols.era.map(|e| to_i32(e, "entry.era")).transpose()?)
    .bind(cols.validator)
    .bind(cols.success)
    .bind(cols.para_id.map(|p| to_i32(p, "entry.para_id")).transpose()?)
    .bind(cols.from)
    .bind(cols.to)
    .bind(cols.status)
    .bind(cols.free.map(|f| f.to_string()))
    .bind(cols.reserved.map(|r| r.to_string()))
    .execute(conn)
    .await
    .map_err(query_err)?;

    Ok(result.rows_affected() == 1)
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    id: String,
    chain: String,
    kind: String,
    block_number: i64,
    block_hash: Vec<u8>,
    timestamp: Option<chrono::DateTime<chrono::Utc>>,
    extrinsic_index: Option<i32>,
    extrinsic_hash: Option<String>,
    name: String,
    account: String,
    amount: Option<String>,
    total: Option<String>,
    era: Option<i32>,
    validator: Option<String>,
    success: Option<bool>,
    para_id: Option<i32>,
    from_account: Option<String>,
    to_account: Option<String>,
    status: Option<String>,
    free: Option<String>,
    reserved: Option<String>,
}

fn missing(id: &str, column: &str) -> StorageError {
    StorageError::SerializationError(format!("entry {id}: {column} is NULL"))
}

impl EntryRow {
    fn into_entry(self) -> StorageResult<LedgerEntry> {
        let id = self.id;
        let total = parse_optional_u128(self.total, "entry.total")?;
        let success = self.success;

        let kind = match self.kind.as_str() {
            "reward" => EntryKind::Reward {
                total: total.ok_or_else(|| missing(&id, "total"))?,
                era: self.era.map(|e| e as u32),
                validator: self.validator,
            },
            "slash" => EntryKind::Slash {
                total: total.ok_or_else(|| missing(&id, "total"))?,
                era: self.era.map(|e| e as u32),
            },
            "bond" => EntryKind::Bond {
                total: total.ok_or_else(|| missing(&id, "total"))?,
                success: success.ok_or_else(|| missing(&id, "success"))?,
            },
            "contribution" => EntryKind::Contribution {
                para_id: self.para_id.ok_or_else(|| missing(&id, "para_id"))? as u32,
                success: success.ok_or_else(|| missing(&id, "success"))?,
            },
            "balance_transaction" => EntryKind::BalanceTransaction {
                from: self.from_account,
                to: self.to_account,
                status: self.status,
                free: parse_optional_u128(self.free, "entry.free")?,
                reserved: parse_optional_u128(self.reserved, "entry.reserved")?,
                success: success.ok_or_else(|| missing(&id, "success"))?,
            },
            other => {
                return Err(StorageError::SerializationError(format!(
                    "entry {id}: unknown kind {other}"
                )));
            }
        };

        Ok(LedgerEntry {
            chain: self.chain,
            block_number: self.block_number as u64,
            block_hash: BlockHash(bytes_to_hash32(self.block_hash, "entry.block_hash")?),
            timestamp: self.timestamp,
            extrinsic_index: self.extrinsic_index.map(|i| i as u32),
            extrinsic_hash: self.extrinsic_hash,
            name: self.name,
            account: self.account,
            amount: parse_optional_u128(self.amount, "entry.amount")?,
            kind,
            id,
        })
    }
}
