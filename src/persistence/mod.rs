//! Persistence system for saving and loading generators

pub mod atomic_save;
pub mod backup;
pub mod error;
pub mod generator_store;
pub mod save_manager;

pub use atomic_save::{atomic_write, temp_path_for};
pub use backup::{BackupInfo, BackupManager};
pub use error::{corrupted_data, load_error, save_error, PersistenceErrorContext};
pub use generator_store::{GeneratorStore, StoreLayout, StoreStats};
pub use save_manager::{SaveHandle, SaveManager, SaveRequest};

/// Result type for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Errors that can occur during persistence operations
#[derive(Debug)]
pub enum PersistenceError {
    IoError(std::io::Error),
    SerializationError(String),
    DeserializationError(String),
    CorruptedData(String),
    BackupError(String),
}

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceError::IoError(e) => write!(f, "IO error: {}", e),
            PersistenceError::SerializationError(e) => write!(f, "Serialization error: {}", e),
            PersistenceError::DeserializationError(e) => write!(f, "Deserialization error: {}", e),
            PersistenceError::CorruptedData(e) => write!(f, "Corrupted data: {}", e),
            PersistenceError::BackupError(e) => write!(f, "Backup error: {}", e),
        }
    }
}

impl std::error::Error for PersistenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistenceError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PersistenceError {
    fn from(err: std::io::Error) -> Self {
        PersistenceError::IoError(err)
    }
}
