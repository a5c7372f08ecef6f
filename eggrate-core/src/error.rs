//! Error types for EGGRATE operations
//!
//! Absence is never an error: a read that matches nothing returns `Ok(None)`
//! or an empty vec. The variants here cover genuine faults only.

use thiserror::Error;

/// Cache layer errors.
///
/// Every variant is absorbable: the cache is advisory, and callers degrade
/// to a miss when one of these occurs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Cache serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Cache deserialization failed: {reason}")]
    Deserialization { reason: String },

    #[error("Corrupt cache entry for key {key}")]
    Corrupt { key: String },
}

/// Validation errors for upsert input. Reported before any write attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Constraint violation on {constraint}: {reason}")]
    ConstraintViolation { constraint: String, reason: String },
}

/// Storage layer errors for the dual-path store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Insert failed in {shape} shape: {reason}")]
    InsertFailed { shape: String, reason: String },

    #[error("Update failed in {shape} shape: {reason}")]
    UpdateFailed { shape: String, reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all EGGRATE errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EggRateError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl EggRateError {
    /// True when the error came from the cache layer and may be absorbed.
    pub fn is_cache(&self) -> bool {
        matches!(self, EggRateError::Cache(_))
    }
}

/// Result type alias for EGGRATE operations.
pub type EggRateResult<T> = Result<T, EggRateError>;

// =============================================================================
// TESTS
// =============================================================================
