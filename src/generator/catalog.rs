//! Generator type catalog
//!
//! Immutable per-type configuration looked up by name. Types live as one JSON
//! file each in a catalog directory; an empty directory is seeded with the
//! built-in iron farm and villager breeder.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::error::{GeneratorError, GeneratorResult};
use crate::inventory::ItemStack;
use crate::item::ItemKind;

/// Configuration for one kind of generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "GeneratorTypeFile")]
pub struct GeneratorType {
    pub name: String,
    /// Block the host places to represent the generator
    pub block_type: String,
    /// Items produced by one generation cycle
    pub output: ItemStack,
    pub generation_time_seconds: u32,
    /// Storage limit in individual items, not stacks
    pub storage_capacity: u32,
}

impl GeneratorType {
    pub fn new(
        name: &str,
        block_type: &str,
        output: ItemStack,
        generation_time_seconds: u32,
        storage_capacity: u32,
    ) -> GeneratorResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GeneratorError::validation("generator name cannot be empty"));
        }
        let block_type = ItemKind::new(block_type);
        if block_type.is_air() {
            return Err(GeneratorError::validation("block type cannot be empty"));
        }
        if output.is_empty() {
            return Err(GeneratorError::validation("output cannot be empty"));
        }
        if generation_time_seconds == 0 {
            return Err(GeneratorError::validation("generation time must be positive"));
        }
        if storage_capacity == 0 {
            return Err(GeneratorError::validation("storage capacity must be positive"));
        }

        Ok(Self {
            name: name.to_string(),
            block_type: block_type.as_str().to_string(),
            output,
            generation_time_seconds,
            storage_capacity,
        })
    }

    /// Default iron farm: one ingot every 3 seconds, 27 slots of 64
    pub fn iron_farm() -> Self {
        Self {
            name: "iron_farm".to_string(),
            block_type: "furnace".to_string(),
            output: ItemStack::new("iron_ingot", 1),
            generation_time_seconds: 3,
            storage_capacity: 1728,
        }
    }

    /// Default villager breeder: one spawn egg every 30 seconds, 27 slots of 16
    pub fn villager_breeder() -> Self {
        Self {
            name: "villager_breeder".to_string(),
            block_type: "composter".to_string(),
            output: ItemStack::new("villager_spawn_egg", 1),
            generation_time_seconds: 30,
            storage_capacity: 432,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratorTypeFile {
    name: String,
    block_type: String,
    output: ItemStack,
    generation_time_seconds: u32,
    storage_capacity: u32,
}

impl TryFrom<GeneratorTypeFile> for GeneratorType {
    type Error = GeneratorError;

    fn try_from(file: GeneratorTypeFile) -> Result<Self, Self::Error> {
        GeneratorType::new(
            &file.name,
            &file.block_type,
            file.output,
            file.generation_time_seconds,
            file.storage_capacity,
        )
    }
}

/// Name-keyed table of generator types
pub struct GeneratorCatalog {
    types: RwLock<HashMap<String, GeneratorType>>,
    dir: Option<PathBuf>,
}

impl GeneratorCatalog {
    /// In-memory catalog with no backing directory
    pub fn new(types: impl IntoIterator<Item = GeneratorType>) -> Self {
        let types = types.into_iter().map(|t| (t.name.clone(), t)).collect();
        Self {
            types: RwLock::new(types),
            dir: None,
        }
    }

    /// In-memory catalog holding the built-in types
    pub fn with_defaults() -> Self {
        Self::new(default_types())
    }

    /// Load every `*.json` type file in `dir`, seeding defaults if none load
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
            log::info!("Created generator type directory {}", dir.display());
        }

        let catalog = Self {
            types: RwLock::new(HashMap::new()),
            dir: Some(dir),
        };
        catalog.reload()?;

        if catalog.is_empty() {
            for generator_type in default_types() {
                catalog.save_type(generator_type)?;
            }
            log::info!("Created default generator types");
        }

        log::info!("Loaded {} generator types", catalog.len());
        Ok(catalog)
    }

    /// Re-read the backing directory, replacing the whole table
    pub fn reload(&self) -> Result<usize, ConfigError> {
        let Some(dir) = &self.dir else {
            return Ok(self.len());
        };

        let mut loaded = HashMap::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_type_file(&path) {
                Ok(generator_type) => {
                    log::debug!("Loaded generator type: {}", generator_type.name);
                    loaded.insert(generator_type.name.clone(), generator_type);
                }
                Err(e) => log::warn!("Failed to load generator type file {}: {}", path.display(), e),
            }
        }

        let count = loaded.len();
        *self.types.write() = loaded;
        Ok(count)
    }

    /// Register a type, writing `<name>.json` when the catalog is file backed
    pub fn save_type(&self, generator_type: GeneratorType) -> Result<(), ConfigError> {
        if let Some(dir) = &self.dir {
            let path = dir.join(format!("{}.json", generator_type.name));
            let json = serde_json::to_string_pretty(&generator_type)?;
            fs::write(&path, json)?;
            log::info!("Saved generator type: {}", generator_type.name);
        }
        self.types.write().insert(generator_type.name.clone(), generator_type);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<GeneratorType> {
        self.types.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.read().contains_key(name)
    }

    /// Sorted type names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }
}

fn default_types() -> Vec<GeneratorType> {
    vec![GeneratorType::iron_farm(), GeneratorType::villager_breeder()]
}

fn read_type_file(path: &Path) -> Result<GeneratorType, ConfigError> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}
