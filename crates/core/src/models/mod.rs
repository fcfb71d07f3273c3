//! Domain models representing the indexed ledger.
//!
//! These models are storage-agnostic and represent the canonical
//! form of ledger data within the domain layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// 32-byte Hash Types
// =============================================================================

/// Macro to generate 32-byte hash newtypes with common functionality.
///
/// Generates:
/// - `from_hex()` - Parse from hex string (with or without 0x prefix)
/// - `to_hex()` - Convert to 0x-prefixed hex string
/// - `Display` trait implementation
/// - `From<[u8; 32]>` implementation
/// - Serde as a 0x-prefixed hex string
macro_rules! hash32_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// Parse from hex string (with or without 0x prefix).
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let s = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(s)?;
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| hex::FromHexError::InvalidStringLength)?;
                Ok(Self(arr))
            }

            /// Convert to 0x-prefixed hex string.
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }

            /// Get the inner bytes.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

hash32_newtype!(
    /// 32-byte block hash (Blake2-256).
    BlockHash
);

hash32_newtype!(
    /// 32-byte account identifier (SS58 decoded public key).
    AccountId
);

// =============================================================================
// Chain & Block
// =============================================================================

/// Immutable chain reference data attached to every ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    /// Chain name (e.g., "polkadot").
    pub name: String,
    /// Address-encoding prefix of the chain.
    pub address_prefix: u16,
}

/// Block header data needed to stamp ledger entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block number (height).
    pub number: u64,
    /// Block hash.
    pub hash: BlockHash,
    /// Parent block hash.
    pub parent_hash: BlockHash,
    /// Timestamp from `pallet_timestamp` (if available).
    pub timestamp: Option<DateTime<Utc>>,
}

// =============================================================================
// Accounts
// =============================================================================

/// Reward destination configured for a stash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayeeType {
    /// Rewards are added back to the bonded stake.
    Staked,
    Stash,
    Controller,
    Account,
    None,
}

impl PayeeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayeeType::Staked => "staked",
            PayeeType::Stash => "stash",
            PayeeType::Controller => "controller",
            PayeeType::Account => "account",
            PayeeType::None => "none",
        }
    }

    /// Parse from the lowercase form used in storage and chain JSON
    /// (`"Staked"`, `"staked"`, ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "staked" => Some(PayeeType::Staked),
            "stash" => Some(PayeeType::Stash),
            "controller" => Some(PayeeType::Controller),
            "account" => Some(PayeeType::Account),
            "none" => Some(PayeeType::None),
            _ => None,
        }
    }
}

/// Staking configuration of a stash, materialized on first touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingInfo {
    /// Bonded controller account.
    pub controller: Option<AccountId>,
    /// Reward destination.
    pub payee: Option<PayeeType>,
    /// Destination account when `payee` is `Account`.
    pub payee_account: Option<AccountId>,
}

/// Persistent per-account aggregate with running totals.
///
/// Created on first reference and never deleted. Totals are only
/// mutated by [`crate::ledger::LedgerAggregator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Address string (0x-prefixed hex public key).
    pub id: String,
    /// Cumulative staking rewards.
    pub total_reward: u128,
    /// Cumulative slashes.
    pub total_slash: u128,
    /// Current bonded stake as tracked by the ledger.
    pub total_bond: u128,
    /// Staking configuration, populated lazily.
    pub staking_info: Option<StakingInfo>,
}

impl Account {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            total_reward: 0,
            total_slash: 0,
            total_bond: 0,
            staking_info: None,
        }
    }

    /// Whether rewards for this account are re-bonded.
    pub fn is_staked_payee(&self) -> bool {
        matches!(
            self.staking_info.as_ref().and_then(|info| info.payee),
            Some(PayeeType::Staked)
        )
    }
}

// =============================================================================
// Ledger Entries
// =============================================================================

/// Variant-specific part of a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryKind {
    Reward {
        /// `total_reward` right after this entry.
        total: u128,
        era: Option<u32>,
        validator: Option<String>,
    },
    Slash {
        /// `total_slash` right after this entry.
        total: u128,
        era: Option<u32>,
    },
    Bond {
        /// `total_bond` right after this entry.
        total: u128,
        success: bool,
    },
    Contribution {
        para_id: u32,
        success: bool,
    },
    BalanceTransaction {
        from: Option<String>,
        to: Option<String>,
        status: Option<String>,
        free: Option<u128>,
        reserved: Option<u128>,
        success: bool,
    },
}

impl EntryKind {
    /// Short label used in metrics, logs and storage.
    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::Reward { .. } => "reward",
            EntryKind::Slash { .. } => "slash",
            EntryKind::Bond { .. } => "bond",
            EntryKind::Contribution { .. } => "contribution",
            EntryKind::BalanceTransaction { .. } => "balance_transaction",
        }
    }

    /// Running-total snapshot, for kinds that carry one.
    pub fn total(&self) -> Option<u128> {
        match self {
            EntryKind::Reward { total, .. }
            | EntryKind::Slash { total, .. }
            | EntryKind::Bond { total, .. } => Some(*total),
            _ => None,
        }
    }
}

/// One row of the append-only ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Globally unique id: `{id_prefix}-{raw record id}`.
    pub id: String,
    /// Chain name.
    pub chain: String,
    /// Block number containing the record.
    pub block_number: u64,
    /// Block hash containing the record.
    pub block_hash: BlockHash,
    /// Block timestamp (if available).
    pub timestamp: Option<DateTime<Utc>>,
    /// Index of the triggering extrinsic within the block.
    pub extrinsic_index: Option<u32>,
    /// Hash of the triggering extrinsic.
    pub extrinsic_hash: Option<String>,
    /// Event or call name (e.g. `staking.Rewarded`).
    pub name: String,
    /// Owning account id.
    pub account: String,
    /// Amount moved by the record.
    pub amount: Option<u128>,
    #[serde(flatten)]
    pub kind: EntryKind,
}

// =============================================================================
// Indexer State
// =============================================================================

/// Indexer cursor tracking progress.
///
/// The cursor tracks the last successfully indexed block for each chain,
/// enabling the indexer to resume from where it left off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerCursor {
    /// Chain name.
    pub chain_id: String,
    /// Last fully indexed block number.
    pub last_indexed_block: u64,
    /// Last indexed block hash (for parent checks).
    pub last_indexed_hash: BlockHash,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Tests
// =============================================================================
