//! Error types for the indexer domain layer.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`DomainError`] - Schema resolution, decoding and ledger rule errors
//! - [`StorageError`] - Persistence gateway errors
//! - [`ChainError`] - Chain data source and lookup errors
//! - [`IndexerError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Domain Errors
// =============================================================================

/// Business logic and domain rule violations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No registered schema variant matches the record's content hash.
    ///
    /// Fatal for the record: skipping it would desynchronize running
    /// totals from chain state.
    #[error("Unknown schema for {name}: no variant registered with hash {hash}")]
    UnknownSchema {
        /// Logical event or call name (e.g. `staking.Bonded`).
        name: String,
        /// Content hash carried by the record (`<none>` when absent).
        hash: String,
    },

    /// The payload shape does not match the resolved variant's layout.
    #[error("Shape mismatch for {name}: expected {expected} payload, found {found}")]
    ShapeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A field declared by the resolved layout is absent or unparsable.
    #[error("Missing or invalid field '{field}' in {name}")]
    MissingField { name: String, field: String },

    /// Neither the payload nor the extrinsic signer identifies an account.
    #[error("No account identity available for entry {entry_id}")]
    MissingAccountIdentity { entry_id: String },

    /// Data decoding/deserialization failed.
    #[error("Decoding error: {0}")]
    DecodingError(String),

    /// Chain reorganization was detected.
    #[error("Chain reorg detected at block {0}")]
    ReorgDetected(u64),

    /// Generic validation error.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Collaborator lookup against the chain failed.
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Database and repository errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to establish database connection.
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// SQL query execution failed.
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// Requested record was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Database migration failed.
    #[error("Migration error: {0}")]
    MigrationError(String),

    /// Transaction commit/rollback failed.
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// Data serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

// =============================================================================
// Chain Errors
// =============================================================================

/// Chain data source errors.
///
/// Raised by the block source adapter and by staking lookups.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The data source could not be opened.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A read against the source failed.
    #[error("Read error: {0}")]
    ReadError(String),

    /// A block record could not be decoded.
    #[error("Block decode error at line {line}: {message}")]
    BlockDecodeError {
        /// 1-based line in the source.
        line: usize,
        /// Error details.
        message: String,
    },

    /// A storage lookup (bonded/payee/era) failed.
    #[error("Lookup error: {0}")]
    LookupError(String),
}

// =============================================================================
// Indexer Errors
// =============================================================================

/// Top-level indexer orchestration errors.
///
/// This is the main error type returned by [`crate::services::IndexerService`].
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Domain logic error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Storage/database error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Data source error.
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Configured chain doesn't match stored data.
    ///
    /// This is a fatal error that requires manual intervention.
    #[error("Chain mismatch: configured for {configured} but database contains data for {expected}")]
    ChainMismatch {
        /// Chain name from configuration.
        configured: String,
        /// Chain name found in the stored cursor.
        expected: String,
    },

    /// A block failed and the run was halted before it.
    #[error("Block {block} failed: {source}")]
    BlockFailed {
        block: u64,
        #[source]
        source: Box<IndexerError>,
    },

    /// Graceful shutdown was requested.
    ///
    /// This is not really an error but uses the error type for control flow.
    #[error("Indexer shutdown requested")]
    ShutdownRequested,

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for indexer operations.
pub type IndexerResult<T> = Result<T, IndexerError>;

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;
