//! Error types for the sensor network.
//!
//! Expected conditions (`DuplicateNode`, `NotFound`, `CapacityExceeded`,
//! `WorldUnavailable`) are reported to the caller and never escalate.
//! Broken internal invariants go through [`invariant_violation`], which is
//! fatal in debug builds and self-healing in release builds.

use crate::types::{NodePosition, RegionId};
use tracing::error;

/// Errors surfaced by network operations.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// A node is already registered at this position
    #[error("Sensor already registered at {0}")]
    DuplicateNode(NodePosition),
    /// No node is registered at this position
    #[error("No sensor registered at {0}")]
    NotFound(NodePosition),
    /// The hot-region pool is full
    #[error("Hot region capacity of {capacity} reached, cannot activate {region}")]
    CapacityExceeded { region: RegionId, capacity: usize },
    /// The region activation collaborator could not resolve the world
    #[error("World unavailable for region {region}: {source}")]
    WorldUnavailable {
        region: RegionId,
        #[source]
        source: WorldError,
    },
    /// An internal structure was found inconsistent and has been rebuilt
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
    /// Node persistence failed
    #[error("Storage error: {0}")]
    Storage(String),
    /// Settings rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failure reported by a [`RegionActivator`](crate::world::RegionActivator).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    #[error("World not found: {0}")]
    WorldNotFound(String),
}

impl From<std::io::Error> for NetworkError {
    fn from(err: std::io::Error) -> Self {
        NetworkError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(err: serde_json::Error) -> Self {
        NetworkError::Storage(err.to_string())
    }
}

/// Reports a broken internal invariant.
///
/// Panics when built with debug assertions. Otherwise logs at error level
/// and returns an [`NetworkError::InvariantViolation`]; the caller is
/// responsible for rebuilding the offending structure.
pub(crate) fn invariant_violation(message: impl Into<String>) -> NetworkError {
    let message = message.into();
    if cfg!(debug_assertions) {
        panic!("invariant violated: {message}");
    }
    error!(%message, "Invariant violated, rebuilding affected structure");
    NetworkError::InvariantViolation(message)
}
