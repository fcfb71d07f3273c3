//! Registry of historical payload layouts.
//!
//! Every event or call name maps to the list of variants it was emitted
//! with over the chain's history. Each variant is keyed by the exact
//! content hash of its type definition, so a runtime upgrade that changes
//! the encoding without renaming the event still resolves correctly.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DomainError, DomainResult};

/// Canonical slot a payload value is mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Account,
    From,
    To,
    Amount,
    Status,
    Free,
    Reserved,
    Era,
    Validator,
    ParaId,
    /// Present in the payload but not needed by the ledger.
    Skip,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Account => "account",
            Field::From => "from",
            Field::To => "to",
            Field::Amount => "amount",
            Field::Status => "status",
            Field::Free => "free",
            Field::Reserved => "reserved",
            Field::Era => "era",
            Field::Validator => "validator",
            Field::ParaId => "para_id",
            Field::Skip => "skip",
        }
    }
}

/// How a payload is laid out on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadLayout {
    /// Tuple payload, fields addressed by index.
    Positional(Vec<Field>),
    /// Record payload, fields addressed by key.
    Named(BTreeMap<String, Field>),
}

impl PayloadLayout {
    pub fn shape(&self) -> &'static str {
        match self {
            PayloadLayout::Positional(_) => "positional",
            PayloadLayout::Named(_) => "named",
        }
    }

    /// Shorthand for a positional layout.
    pub fn positional(fields: &[Field]) -> Self {
        PayloadLayout::Positional(fields.to_vec())
    }

    /// Shorthand for a named layout.
    pub fn named(fields: &[(&str, Field)]) -> Self {
        PayloadLayout::Named(
            fields
                .iter()
                .map(|(key, field)| (key.to_string(), *field))
                .collect(),
        )
    }
}

/// One historical encoding of an event or call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaVariant {
    /// Logical name, `pallet.Name`.
    pub name: String,
    /// Runtime version label the variant first appeared in (e.g. `V9140`).
    pub version: String,
    /// Content hash of the type definition.
    pub hash: String,
    pub layout: PayloadLayout,
}

impl SchemaVariant {
    pub fn new(name: &str, version: &str, hash: &str, layout: PayloadLayout) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            hash: normalize_hash(hash),
            layout,
        }
    }
}

/// Which variant a lookup should pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaMode {
    /// Exact match on the record's content hash.
    #[default]
    Historical,
    /// Always the newest registered variant. Only valid against tip data.
    Latest,
}

impl std::str::FromStr for SchemaMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "historical" => Ok(SchemaMode::Historical),
            "latest" => Ok(SchemaMode::Latest),
            other => Err(format!("unknown schema mode '{other}'")),
        }
    }
}

/// Lowercase, no `0x` prefix.
pub fn normalize_hash(hash: &str) -> String {
    let trimmed = hash.trim();
    trimmed
        .strip_prefix("0x")
        .unwrap_or(trimmed)
        .to_ascii_lowercase()
}

/// Registry of schema variants, keyed by logical name.
///
/// Variants are kept in registration order; the last one registered for a
/// name is its latest variant.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    variants: HashMap<String, Vec<Arc<SchemaVariant>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a variant.
    ///
    /// Registering an identical variant twice is a no-op. Registering a
    /// different layout under an existing (name, hash) pair is rejected.
    pub fn register(&mut self, variant: SchemaVariant) -> DomainResult<()> {
        let list = self.variants.entry(variant.name.clone()).or_default();

        if let Some(existing) = list.iter().find(|v| v.hash == variant.hash) {
            if existing.layout == variant.layout {
                return Ok(());
            }
            return Err(DomainError::ValidationError(format!(
                "conflicting layouts for {} with hash {}",
                variant.name, variant.hash
            )));
        }

        list.push(Arc::new(variant));
        Ok(())
    }

    /// Register every variant of an iterator.
    pub fn extend<I>(&mut self, variants: I) -> DomainResult<()>
    where
        I: IntoIterator<Item = SchemaVariant>,
    {
        for variant in variants {
            self.register(variant)?;
        }
        Ok(())
    }

    /// Whether any variant is registered for a name.
    pub fn is_tracked(&self, name: &str) -> bool {
        self.variants.contains_key(name)
    }

    /// Resolve the variant whose hash matches exactly.
    pub fn resolve(&self, name: &str, hash: &str) -> DomainResult<Arc<SchemaVariant>> {
        let wanted = normalize_hash(hash);
        self.variants
            .get(name)
            .and_then(|list| list.iter().find(|v| v.hash == wanted))
            .cloned()
            .ok_or_else(|| DomainError::UnknownSchema {
                name: name.to_string(),
                hash: wanted,
            })
    }

    /// Newest registered variant for a name.
    pub fn latest(&self, name: &str) -> DomainResult<Arc<SchemaVariant>> {
        self.variants
            .get(name)
            .and_then(|list| list.last())
            .cloned()
            .ok_or_else(|| DomainError::UnknownSchema {
                name: name.to_string(),
                hash: "<latest>".to_string(),
            })
    }

    /// Pick the variant for a record according to `mode`.
    ///
    /// In historical mode a record without a content hash cannot be
    /// resolved and is reported as an unknown schema.
    pub fn select(
        &self,
        name: &str,
        hash: Option<&str>,
        mode: SchemaMode,
    ) -> DomainResult<Arc<SchemaVariant>> {
        match mode {
            SchemaMode::Latest => self.latest(name),
            SchemaMode::Historical => match hash {
                Some(hash) => self.resolve(name, hash),
                None => Err(DomainError::UnknownSchema {
                    name: name.to_string(),
                    hash: "<none>".to_string(),
                }),
            },
        }
    }

    /// Number of registered variants across all names.
    pub fn len(&self) -> usize {
        self.variants.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Load additional variants from a JSON array.
    pub fn load_json(&mut self, json: &str) -> DomainResult<usize> {
        let variants: Vec<SchemaVariant> = serde_json::from_str(json)
            .map_err(|e| DomainError::DecodingError(format!("invalid schema file: {e}")))?;
        let count = variants.len();
        self.extend(variants.into_iter().map(|mut v| {
            v.hash = normalize_hash(&v.hash);
            v
        }))?;
        debug!(count, "Loaded schema variants");
        Ok(count)
    }

    /// Load additional variants from a JSON file on disk.
    pub fn load_file(&mut self, path: &Path) -> DomainResult<usize> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DomainError::DecodingError(format!("cannot read {}: {e}", path.display()))
        })?;
        self.load_json(&content)
    }
}
