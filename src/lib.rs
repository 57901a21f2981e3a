//! Passive resource generators for a shared block world.
//!
//! Each placed generator accumulates output over real elapsed time, bounded by
//! its storage capacity. Nothing ticks in the background: owed production is
//! reconstructed from a stored checkpoint whenever a player interacts with the
//! generator. The registry keeps every live generator indexed by id, location,
//! owner and chunk cell, and the persistence layer snapshots it to a JSON file
//! with atomic replacement and rotating backups.

pub mod config;
pub mod error;
pub mod game;
pub mod generator;
pub mod inventory;
pub mod item;
pub mod persistence;
pub mod time;
pub mod world;

pub use config::{GeneratorSettings, ConfigError};
pub use error::{GeneratorError, GeneratorResult, LimitScope};
pub use game::{GeneratorService, GeneratorHandlers, Actor, PlaceEvent, BreakOutcome, InteractOutcome};
pub use generator::{
    GeneratorCatalog, GeneratorId, GeneratorInstance, GeneratorRegistry, GeneratorType, Harvest,
    RegistryLimits,
};
pub use inventory::{ItemStack, StoredItems};
pub use item::ItemKind;
pub use persistence::{GeneratorStore, PersistenceError, PersistenceResult, SaveHandle, SaveManager};
pub use time::{Clock, ManualClock, SystemClock};
pub use world::{BlockLocation, CellKey};

/// Install `env_logger` as the log backend.
///
/// Safe to call more than once; later calls leave the existing logger alone.
pub fn init_logging() {
    if let Err(e) = env_logger::try_init() {
        log::debug!("[resource_generator::init_logging] env_logger already initialized: {}", e);
    }
}
