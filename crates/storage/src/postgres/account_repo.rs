//! Account repository implementation for PostgreSQL.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use tally_core::error::{StorageError, StorageResult};
use tally_core::models::{Account, AccountId, PayeeType, StakingInfo};
use tally_core::ports::AccountRepository;

use super::database::Database;
use super::helpers::{parse_optional_account, parse_u128, query_err};

/// PostgreSQL implementation of AccountRepository.
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn get_account(&self, id: &str) -> StorageResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id,
                   total_reward::TEXT AS total_reward,
                   total_slash::TEXT AS total_slash,
                   total_bond::TEXT AS total_bond,
                   has_staking, controller, payee, payee_account
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;

        row.map(AccountRow::into_account).transpose()
    }

    async fn count_accounts(&self) -> StorageResult<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.pool)
            .await
            .map_err(query_err)?;
        Ok(count as u64)
    }
}

/// Upsert an account with its new totals inside an open transaction.
pub(super) async fn upsert_account(conn: &mut PgConnection, account: &Account) -> StorageResult<()> {
    let info = account.staking_info.as_ref();
    sqlx::query(
        r#"
        INSERT INTO accounts (
            id, total_reward, total_slash, total_bond,
            has_staking, controller, payee, payee_account, updated_at
        )
        VALUES ($1, $2::NUMERIC, $3::NUMERIC, $4::NUMERIC, $5, $6, $7, $8, NOW())
        ON CONFLICT (id) DO UPDATE SET
            total_reward = EXCLUDED.total_reward,
            total_slash = EXCLUDED.total_slash,
            total_bond = EXCLUDED.total_bond,
            has_staking = EXCLUDED.has_staking,
            controller = EXCLUDED.controller,
            payee = EXCLUDED.payee,
            payee_account = EXCLUDED.payee_account,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(&account.id)
    .bind(account.total_reward.to_string())
    .bind(account.total_slash.to_string())
    .bind(account.total_bond.to_string())
    .bind(info.is_some())
    .bind(info.and_then(|i| i.controller.as_ref()).map(AccountId::to_hex))
    .bind(info.and_then(|i| i.payee).map(|p| p.as_str()))
    .bind(info.and_then(|i| i.payee_account.as_ref()).map(AccountId::to_hex))
    .execute(conn)
    .await
    .map_err(query_err)?;

    Ok(())
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: String,
    total_reward: String,
    total_slash: String,
    total_bond: String,
    has_staking: bool,
    controller: Option<String>,
    payee: Option<String>,
    payee_account: Option<String>,
}

impl AccountRow {
    fn into_account(self) -> StorageResult<Account> {
        let staking_info = if self.has_staking {
            let payee = self
                .payee
                .map(|p| {
                    PayeeType::parse(&p).ok_or_else(|| {
                        StorageError::SerializationError(format!("account.payee: unknown {p}"))
                    })
                })
                .transpose()?;
            Some(StakingInfo {
                controller: parse_optional_account(self.controller, "account.controller")?,
                payee,
                payee_account: parse_optional_account(self.payee_account, "account.payee_account")?,
            })
        } else {
            None
        };

        Ok(Account {
            total_reward: parse_u128(&self.total_reward, "account.total_reward")?,
            total_slash: parse_u128(&self.total_slash, "account.total_slash")?,
            total_bond: parse_u128(&self.total_bond, "account.total_bond")?,
            id: self.id,
            staking_info,
        })
    }
}
