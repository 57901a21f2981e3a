//! Entry points the host calls when players touch generator blocks
//!
//! The host delivers these on its single callback thread. Each handler reads
//! the registry, works on a copy of the generator, and writes the copy back
//! with `update`; persistence happens behind the registry's save handle.

use std::sync::Arc;

use crate::error::{GeneratorError, GeneratorResult};
use crate::generator::{GeneratorCatalog, GeneratorInstance, GeneratorRegistry, GeneratorType, Harvest, OwnerId};
use crate::inventory::ItemStack;
use crate::item::ItemKind;
use crate::time::Clock;
use crate::world::BlockLocation;

/// Who triggered an event, with permission outcomes already evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: OwnerId,
    /// May open and break generators owned by anyone
    pub is_admin: bool,
    /// Ignores per-chunk and per-player limits when placing
    pub bypass_limits: bool,
}

impl Actor {
    pub fn player(id: OwnerId) -> Self {
        Self {
            id,
            is_admin: false,
            bypass_limits: false,
        }
    }

    pub fn admin(id: OwnerId) -> Self {
        Self {
            id,
            is_admin: true,
            bypass_limits: true,
        }
    }

    pub fn can_access(&self, generator: &GeneratorInstance) -> bool {
        self.is_admin || generator.owner() == self.id
    }
}

/// A player placed a block that should become a generator
#[derive(Debug, Clone)]
pub struct PlaceEvent {
    pub location: BlockLocation,
    pub type_name: String,
    /// Block actually placed in the world
    pub block_type: String,
    pub actor: Actor,
}

/// A generator was broken; `drops` should be spawned at its location
#[derive(Debug, Clone)]
pub struct BreakOutcome {
    pub generator: GeneratorInstance,
    pub drops: Vec<ItemStack>,
}

/// Result of opening a generator
#[derive(Debug, Clone)]
pub struct InteractOutcome {
    pub harvest: Harvest,
    /// State after the harvest, to fill the storage view
    pub generator: GeneratorInstance,
    pub generator_type: GeneratorType,
}

pub struct GeneratorHandlers {
    registry: Arc<GeneratorRegistry>,
    catalog: Arc<GeneratorCatalog>,
    clock: Arc<dyn Clock>,
    verbose: bool,
}

impl GeneratorHandlers {
    pub fn new(registry: Arc<GeneratorRegistry>, catalog: Arc<GeneratorCatalog>, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry,
            catalog,
            clock,
            verbose: false,
        }
    }

    /// Log per-interaction details at info instead of debug
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn registry(&self) -> &Arc<GeneratorRegistry> {
        &self.registry
    }

    pub fn catalog(&self) -> &Arc<GeneratorCatalog> {
        &self.catalog
    }

    pub fn on_place(&self, event: PlaceEvent) -> GeneratorResult<GeneratorInstance> {
        let generator_type = self.lookup_type(&event.type_name)?;

        let placed = ItemKind::new(&event.block_type);
        if placed.as_str() != generator_type.block_type {
            return Err(GeneratorError::BlockMismatch {
                expected: generator_type.block_type,
                found: placed.as_str().to_string(),
            });
        }

        self.registry.create(
            event.location,
            &generator_type.name,
            event.actor.id,
            event.actor.bypass_limits,
        )
    }

    /// Destroy the generator at `location`
    ///
    /// `Ok(None)` means the block was not a generator and the host should
    /// treat the break normally.
    pub fn on_break(&self, location: &BlockLocation, actor: Actor) -> GeneratorResult<Option<BreakOutcome>> {
        let Some(generator) = self.registry.get_at(location) else {
            return Ok(None);
        };
        if !actor.can_access(&generator) {
            log::warn!("{} tried to break generator {} owned by {}", actor.id, generator.id(), generator.owner());
            return Err(GeneratorError::AccessDenied(location.clone()));
        }

        let Some(mut generator) = self.registry.destroy(generator.id()) else {
            return Ok(None);
        };
        let drops = generator.take_stored_items();
        log::log!(
            self.detail_level(),
            "Generator {} broken by {}, dropping {} stacks",
            generator.id(),
            actor.id,
            drops.len()
        );
        Ok(Some(BreakOutcome { generator, drops }))
    }

    /// Collect production owed since the last visit
    pub fn on_interact(&self, location: &BlockLocation, actor: Actor) -> GeneratorResult<InteractOutcome> {
        let mut generator = self.accessible_at(location, actor)?;
        let generator_type = self.lookup_type(generator.type_name())?;

        let now = self.clock.now_millis();
        let harvest = generator.harvest(&generator_type, now);
        generator.touch(now);
        self.registry.update(&generator);

        log::log!(
            self.detail_level(),
            "Generator {}: {} cycles over {}s, added {} items, {}/{} stored, next in {}s",
            generator.id(),
            harvest.cycles,
            harvest.elapsed_seconds,
            harvest.items_added,
            harvest.stored_total,
            harvest.capacity,
            harvest.seconds_until_next
        );
        Ok(InteractOutcome {
            harvest,
            generator,
            generator_type,
        })
    }

    /// Store whatever the player left in the storage view
    pub fn on_storage_close(
        &self,
        location: &BlockLocation,
        actor: Actor,
        remaining: Vec<ItemStack>,
    ) -> GeneratorResult<GeneratorInstance> {
        let mut generator = self.accessible_at(location, actor)?;
        let generator_type = self.lookup_type(generator.type_name())?;

        generator.replace_stored_items(remaining, generator_type.storage_capacity)?;
        generator.touch(self.clock.now_millis());
        self.registry.update(&generator);
        Ok(generator)
    }

    fn accessible_at(&self, location: &BlockLocation, actor: Actor) -> GeneratorResult<GeneratorInstance> {
        let generator = self
            .registry
            .get_at(location)
            .ok_or_else(|| GeneratorError::NotFound(location.clone()))?;
        if !actor.can_access(&generator) {
            return Err(GeneratorError::AccessDenied(location.clone()));
        }
        Ok(generator)
    }

    fn lookup_type(&self, name: &str) -> GeneratorResult<GeneratorType> {
        self.catalog
            .get(name)
            .ok_or_else(|| GeneratorError::UnknownType(name.to_string()))
    }

    fn detail_level(&self) -> log::Level {
        if self.verbose {
            log::Level::Info
        } else {
            log::Level::Debug
        }
    }
}
