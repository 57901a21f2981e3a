//! Generator types, placed instances, and the registry that tracks them

pub mod catalog;
pub mod instance;
pub mod registry;

pub use catalog::{GeneratorCatalog, GeneratorType};
pub use instance::{GeneratorId, GeneratorInstance, Harvest, OwnerId};
pub use registry::{GeneratorRegistry, RegistryLimits};
