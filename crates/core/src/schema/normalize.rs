//! Payload normalization.
//!
//! Maps a raw payload, positional or named, onto one canonical record
//! using the layout of its resolved [`SchemaVariant`]. Pure: no I/O.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::parse::{parse_account, parse_amount, parse_tag, parse_u32};
use super::registry::{Field, PayloadLayout, SchemaVariant};
use crate::error::{DomainError, DomainResult};
use crate::models::AccountId;

/// Canonical form of any tracked event or call payload.
///
/// Only the fields meaningful for the record's kind are populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub account: Option<AccountId>,
    pub from: Option<AccountId>,
    pub to: Option<AccountId>,
    pub amount: Option<u128>,
    pub status: Option<String>,
    pub free: Option<u128>,
    pub reserved: Option<u128>,
    pub era: Option<u32>,
    pub validator: Option<AccountId>,
    pub para_id: Option<u32>,
}

/// Raw payload viewed by shape.
#[derive(Debug, Clone, Copy)]
pub enum RawPayload<'a> {
    Positional(&'a [Value]),
    Named(&'a Map<String, Value>),
}

impl<'a> RawPayload<'a> {
    /// Classify a JSON payload. A bare scalar is a one-element tuple and
    /// `null` is an empty one.
    pub fn from_value(value: &'a Value) -> Self {
        match value {
            Value::Array(items) => RawPayload::Positional(items),
            Value::Object(map) => RawPayload::Named(map),
            Value::Null => RawPayload::Positional(&[]),
            scalar => RawPayload::Positional(std::slice::from_ref(scalar)),
        }
    }

    pub fn shape(&self) -> &'static str {
        match self {
            RawPayload::Positional(_) => "positional",
            RawPayload::Named(_) => "named",
        }
    }
}

/// Normalize `payload` according to `variant`'s layout.
pub fn normalize(variant: &SchemaVariant, payload: &Value) -> DomainResult<NormalizedEvent> {
    let raw = RawPayload::from_value(payload);
    let mut out = NormalizedEvent::default();

    match (&variant.layout, raw) {
        (PayloadLayout::Positional(fields), RawPayload::Positional(items)) => {
            for (index, field) in fields.iter().enumerate() {
                if *field == Field::Skip {
                    continue;
                }
                let value = items.get(index).ok_or_else(|| missing(variant, *field))?;
                assign(&mut out, *field, value).ok_or_else(|| missing(variant, *field))?;
            }
        }
        (PayloadLayout::Named(fields), RawPayload::Named(map)) => {
            for (key, field) in fields {
                if *field == Field::Skip {
                    continue;
                }
                let value = map.get(key).ok_or_else(|| missing(variant, *field))?;
                assign(&mut out, *field, value).ok_or_else(|| missing(variant, *field))?;
            }
        }
        (layout, raw) => {
            return Err(DomainError::ShapeMismatch {
                name: variant.name.clone(),
                expected: layout.shape(),
                found: raw.shape(),
            });
        }
    }

    Ok(out)
}

fn missing(variant: &SchemaVariant, field: Field) -> DomainError {
    DomainError::MissingField {
        name: variant.name.clone(),
        field: field.as_str().to_string(),
    }
}

/// Parse `value` into the slot for `field`. `None` when unparsable.
fn assign(out: &mut NormalizedEvent, field: Field, value: &Value) -> Option<()> {
    match field {
        Field::Account => out.account = Some(parse_account(value)?),
        Field::From => out.from = Some(parse_account(value)?),
        Field::To => out.to = Some(parse_account(value)?),
        Field::Validator => out.validator = Some(parse_account(value)?),
        Field::Amount => out.amount = Some(parse_amount(value)?),
        Field::Free => out.free = Some(parse_amount(value)?),
        Field::Reserved => out.reserved = Some(parse_amount(value)?),
        Field::Era => out.era = Some(parse_u32(value)?),
        Field::ParaId => out.para_id = Some(parse_u32(value)?),
        Field::Status => out.status = Some(parse_tag(value)?),
        Field::Skip => {}
    }
    Some(())
}
