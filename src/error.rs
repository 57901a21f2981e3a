//! Error taxonomy for generator operations
//!
//! Construction and capacity failures are reported to callers as values and
//! never cross the persistence boundary. Persistence failures are wrapped so a
//! handler can surface them, but the in-memory state stays authoritative.

use crate::persistence::PersistenceError;
use crate::world::BlockLocation;

/// Result type for generator operations
pub type GeneratorResult<T> = Result<T, GeneratorError>;

/// Which density limit refused a placement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitScope {
    /// Too many generators in one chunk cell
    Cell,
    /// Too many generators owned by one player
    Owner,
}

impl std::fmt::Display for LimitScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitScope::Cell => write!(f, "chunk"),
            LimitScope::Owner => write!(f, "player"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("Invalid generator data: {0}")]
    Validation(String),

    #[error("A generator already exists at {0}")]
    OccupiedLocation(BlockLocation),

    #[error("Generator {scope} limit reached ({limit})")]
    LimitExceeded { scope: LimitScope, limit: usize },

    #[error("Storage full: {requested} items requested, {available} available")]
    CapacityExceeded { requested: u32, available: u32 },

    #[error("Unknown generator type: {0}")]
    UnknownType(String),

    #[error("Block type mismatch: expected {expected}, found {found}")]
    BlockMismatch { expected: String, found: String },

    #[error("Access denied to generator at {0}")]
    AccessDenied(BlockLocation),

    #[error("No generator at {0}")]
    NotFound(BlockLocation),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl GeneratorError {
    /// Build a validation error
    pub fn validation(reason: impl Into<String>) -> Self {
        GeneratorError::Validation(reason.into())
    }
}
