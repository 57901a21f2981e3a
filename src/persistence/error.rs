//! Persistence-specific error helpers
//!
//! Constructors and a context trait so call sites can say which file failed
//! without building `io::Error`s by hand.

use std::path::Path;

use crate::persistence::{PersistenceError, PersistenceResult};

/// Attach a short description of the failed step to an error
pub trait PersistenceErrorContext<T> {
    fn persistence_context(self, context: &str) -> PersistenceResult<T>;
}

impl<T> PersistenceErrorContext<T> for Result<T, std::io::Error> {
    fn persistence_context(self, context: &str) -> PersistenceResult<T> {
        self.map_err(|e| {
            PersistenceError::IoError(std::io::Error::new(e.kind(), format!("{}: {}", context, e)))
        })
    }
}

/// Create a save error
pub fn save_error(path: impl AsRef<Path>, error: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::IoError(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("Save failed for {}: {}", path.as_ref().display(), error),
    ))
}

/// Create a load error for a file that could be read but not parsed
pub fn load_error(path: impl AsRef<Path>, error: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::DeserializationError(format!(
        "Load failed for {}: {}",
        path.as_ref().display(),
        error
    ))
}

/// Create a corrupted data error
pub fn corrupted_data(reason: impl Into<String>) -> PersistenceError {
    PersistenceError::CorruptedData(reason.into())
}
