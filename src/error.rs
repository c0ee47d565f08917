//! Error types for the region cache
//!
//! Cache operations are fail-open and report misses and conflicts through
//! `bool`/`Option` results. Errors are reserved for construction and for
//! faults raised inside a sweep pass.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the region cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Configuration value rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The background sweeper could not be started
    #[error("Failed to start sweeper: {0}")]
    SweeperSpawn(#[from] std::io::Error),

    /// Removing one expired pair panicked during a sweep pass
    #[error("Removal of {region}/{key} panicked during sweep: {message}")]
    RemovalPanicked {
        region: String,
        key: String,
        message: String,
    },
}

// == Result Type Alias ==
/// Convenience Result type for the region cache.
pub type Result<T> = std::result::Result<T, CacheError>;
