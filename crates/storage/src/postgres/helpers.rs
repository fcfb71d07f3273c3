//! Shared helper functions for PostgreSQL row conversion.
//!
//! Balances are stored as `NUMERIC(39, 0)`, which fits any `u128`. They are
//! bound as text with a `::NUMERIC` cast and read back with `::TEXT`.

use tally_core::error::{StorageError, StorageResult};
use tally_core::models::AccountId;

/// Convert a `Vec<u8>` to a fixed-size 32-byte array.
///
/// Returns an error if the length doesn't match.
pub fn bytes_to_hash32(bytes: Vec<u8>, field_name: &str) -> StorageResult<[u8; 32]> {
    bytes.try_into().map_err(|v: Vec<u8>| {
        StorageError::SerializationError(format!(
            "{} has invalid length: expected 32, got {}",
            field_name,
            v.len()
        ))
    })
}

/// Parse a `NUMERIC` column read as text.
pub fn parse_u128(text: &str, field_name: &str) -> StorageResult<u128> {
    text.parse().map_err(|e| {
        StorageError::SerializationError(format!("{field_name} is not a u128 ({text}): {e}"))
    })
}

pub fn parse_optional_u128(text: Option<String>, field_name: &str) -> StorageResult<Option<u128>> {
    text.map(|t| parse_u128(&t, field_name)).transpose()
}

pub fn parse_optional_account(
    text: Option<String>,
    field_name: &str,
) -> StorageResult<Option<AccountId>> {
    text.map(|t| {
        AccountId::from_hex(&t)
            .map_err(|e| StorageError::SerializationError(format!("{field_name}: {e}")))
    })
    .transpose()
}

/// Convert an unsigned column value to the `i32` Postgres stores.
pub fn to_i32(value: u32, field_name: &str) -> StorageResult<i32> {
    i32::try_from(value).map_err(|_| {
        StorageError::SerializationError(format!("{field_name} out of range: {value}"))
    })
}

pub fn query_err(e: sqlx::Error) -> StorageError {
    StorageError::QueryError(e.to_string())
}

pub fn tx_err(e: sqlx::Error) -> StorageError {
    StorageError::TransactionError(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test critique: les montants dépassent largement u64 sur Polkadot (10 décimales)
    #[test]
    fn test_parse_u128_beyond_u64() {
        let big = (u64::MAX as u128 * 1000).to_string();
        assert_eq!(parse_u128(&big, "amount").unwrap(), u64::MAX as u128 * 1000);
        assert_eq!(parse_u128(&u128::MAX.to_string(), "amount").unwrap(), u128::MAX);
    }

    // Test critique: erreurs incluent le nom du champ pour debug
    #[test]
    fn test_error_includes_field_name() {
        let err = bytes_to_hash32(vec![1u8; 16], "entry.block_hash").unwrap_err().to_string();
        assert!(err.contains("entry.block_hash"));
        assert!(err.contains("expected 32"));

        let err = parse_u128("-5", "account.total_bond").unwrap_err().to_string();
        assert!(err.contains("account.total_bond"));
    }

    #[test]
    fn test_optional_account() {
        let hex = format!("0x{}", "cd".repeat(32));
        let parsed = parse_optional_account(Some(hex), "payee_account").unwrap();
        assert_eq!(parsed, Some(AccountId([0xcd; 32])));
        assert_eq!(parse_optional_account(None, "payee_account").unwrap(), None);
        assert!(parse_optional_account(Some("0x12".into()), "payee_account").is_err());
    }

    #[test]
    fn test_to_i32_range() {
        assert_eq!(to_i32(7, "era").unwrap(), 7);
        assert!(to_i32(u32::MAX, "era").is_err());
    }
}
