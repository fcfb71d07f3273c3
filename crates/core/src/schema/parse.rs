//! Scalar parsers for JSON payload values.
//!
//! Payloads arrive as JSON produced by the archive. The same logical value
//! can take several shapes depending on the runtime version that emitted it.

use serde_json::Value;

use crate::models::AccountId;

// =============================================================================
// Account parsing
// =============================================================================

/// Parse an account ID from various JSON representations.
///
/// Handles:
/// - Hex string: `"0x1234..."`
/// - Wrapped object: `{ "Id": "0x..." }`
/// - Tagged multi-address: `{ "__kind": "Id", "value": "0x..." }`
/// - Array wrapper: `["0x..."]`
/// - Byte array: `[b0, b1, ..., b31]`
pub fn parse_account(value: &Value) -> Option<AccountId> {
    match value {
        Value::String(s) => AccountId::from_hex(s).ok(),
        Value::Object(obj) => {
            if let Some(kind) = obj.get("__kind").and_then(Value::as_str) {
                // Only `Id` addresses carry a raw public key
                return match kind {
                    "Id" => obj.get("value").and_then(parse_account),
                    _ => None,
                };
            }
            obj.get("Id").or_else(|| obj.get("id")).and_then(parse_account)
        }
        Value::Array(arr) => {
            if arr.len() == 1 {
                return parse_account(&arr[0]);
            }
            if arr.len() != 32 {
                return None;
            }
            let mut bytes = [0u8; 32];
            for (i, v) in arr.iter().enumerate() {
                bytes[i] = u8::try_from(v.as_u64()?).ok()?;
            }
            Some(AccountId(bytes))
        }
        _ => None,
    }
}

// =============================================================================
// Numeric parsing
// =============================================================================

/// Parse an amount (u128) from JSON.
///
/// JSON numbers stop at u64, so large balances arrive as decimal strings.
/// `0x`-prefixed hex strings are accepted as well.
pub fn parse_amount(value: &Value) -> Option<u128> {
    match value {
        Value::Number(n) => n.as_u64().map(u128::from),
        Value::String(s) => match s.strip_prefix("0x") {
            Some(hex) => u128::from_str_radix(hex, 16).ok(),
            None => s.parse().ok(),
        },
        _ => None,
    }
}

/// Parse a u32 from JSON.
pub fn parse_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| v.try_into().ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

// =============================================================================
// Enum tags
// =============================================================================

/// Parse an enum tag such as a balance status.
///
/// Accepts a bare string (`"Free"`) or a tagged object (`{ "__kind": "Free" }`).
pub fn parse_tag(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj
            .get("__kind")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_account_hex_string() {
        let hex = "0x".to_string() + &"ab".repeat(32);
        assert_eq!(parse_account(&json!(hex)).unwrap().0, [0xab; 32]);
    }

    #[test]
    fn test_parse_account_multi_address() {
        let hex = "0x".to_string() + &"ef".repeat(32);
        let result = parse_account(&json!({"__kind": "Id", "value": hex}));
        assert_eq!(result.unwrap().0, [0xef; 32]);

        // Index addresses cannot be resolved without chain state
        assert!(parse_account(&json!({"__kind": "Index", "value": 12})).is_none());
    }

    #[test]
    fn test_parse_account_wrapped_id() {
        let hex = "0x".to_string() + &"12".repeat(32);
        assert!(parse_account(&json!({"Id": hex})).is_some());
    }

    #[test]
    fn test_parse_account_byte_array() {
        let bytes: Vec<u8> = (0..32).collect();
        let result = parse_account(&json!(bytes)).unwrap();
        assert_eq!(result.0[31], 31);
    }

    #[test]
    fn test_parse_account_rejects_invalid() {
        let short_hex = "0x".to_string() + &"ab".repeat(16);
        assert!(parse_account(&json!(short_hex)).is_none());
        assert!(parse_account(&json!("not_valid_hex")).is_none());
        assert!(parse_account(&json!(42)).is_none());
    }

    #[test]
    fn test_parse_amount_variants() {
        assert_eq!(parse_amount(&json!(12345)), Some(12345));
        assert_eq!(parse_amount(&json!("67890")), Some(67890));
        assert_eq!(parse_amount(&json!("0x10")), Some(16));
        let large = "340282366920938463463374607431768211455";
        assert_eq!(parse_amount(&json!(large)), Some(u128::MAX));
        assert_eq!(parse_amount(&json!(-5)), None);
    }

    #[test]
    fn test_parse_u32_bounds() {
        assert_eq!(parse_u32(&json!(2000)), Some(2000));
        assert_eq!(parse_u32(&json!("2001")), Some(2001));
        assert!(parse_u32(&json!(u64::MAX)).is_none());
    }

    #[test]
    fn test_parse_tag() {
        assert_eq!(parse_tag(&json!("Reserved")).as_deref(), Some("Reserved"));
        assert_eq!(parse_tag(&json!({"__kind": "Free"})).as_deref(), Some("Free"));
        assert_eq!(parse_tag(&json!(1)), None);
    }
}
