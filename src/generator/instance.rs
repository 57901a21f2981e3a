//! One placed generator and its lazy accumulation arithmetic
//!
//! Nothing ticks. Production owed since the last checkpoint is reconstructed
//! from `last_generation_time` at the moment a player interacts, and the
//! checkpoint then advances by exactly the time the produced cycles consumed.
//! When storage caps production, the leftover elapsed time beyond what filling
//! the free space needed is not banked: it is dropped as soon as `advance`
//! runs with the capped cycle count. While storage stays full nothing is
//! produced, `advance` is skipped, and elapsed time keeps accruing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GeneratorError, GeneratorResult};
use crate::generator::GeneratorType;
use crate::inventory::{ItemStack, StoredItems};
use crate::time::MILLIS_PER_SECOND;
use crate::world::{BlockLocation, CellKey};

/// Unique identifier of a placed generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneratorId(pub Uuid);

impl GeneratorId {
    /// Fresh random (v4) identifier
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for GeneratorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of the player that placed a generator
pub type OwnerId = Uuid;

/// Result of one interaction's accumulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Harvest {
    /// Generation cycles consumed from elapsed time
    pub cycles: u32,
    /// Individual items inserted into storage
    pub items_added: u32,
    /// Whole seconds since the checkpoint, measured before it advanced
    pub elapsed_seconds: i64,
    /// Seconds until the next cycle completes
    pub seconds_until_next: i64,
    /// Items in storage after insertion
    pub stored_total: u64,
    pub capacity: u32,
}

impl Harvest {
    pub fn storage_full(&self) -> bool {
        self.stored_total >= self.capacity as u64
    }
}

/// A generator instance placed in the world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GeneratorRecord", into = "GeneratorRecord")]
pub struct GeneratorInstance {
    id: GeneratorId,
    location: BlockLocation,
    type_name: String,
    owner: OwnerId,
    last_accessed_time: i64,
    last_generation_time: i64,
    stored_items: StoredItems,
}

impl GeneratorInstance {
    /// Rebuild an instance from stored fields, validating identity
    pub fn new(
        id: GeneratorId,
        location: BlockLocation,
        type_name: &str,
        owner: OwnerId,
        last_accessed_time: i64,
        last_generation_time: i64,
        stored_items: StoredItems,
    ) -> GeneratorResult<Self> {
        if id.0.is_nil() {
            return Err(GeneratorError::validation("generator id cannot be nil"));
        }
        if location.world.trim().is_empty() {
            return Err(GeneratorError::validation("location world cannot be empty"));
        }
        let type_name = type_name.trim();
        if type_name.is_empty() {
            return Err(GeneratorError::validation("generator type cannot be empty"));
        }
        if owner.is_nil() {
            return Err(GeneratorError::validation("owner cannot be nil"));
        }

        Ok(Self {
            id,
            location,
            type_name: type_name.to_string(),
            owner,
            last_accessed_time,
            last_generation_time,
            stored_items,
        })
    }

    /// Create a new generator whose generation timer starts now
    pub fn create(
        location: BlockLocation,
        type_name: &str,
        owner: OwnerId,
        now: i64,
    ) -> GeneratorResult<Self> {
        Self::new(
            GeneratorId::random(),
            location,
            type_name,
            owner,
            now,
            now,
            StoredItems::new(),
        )
    }

    pub fn id(&self) -> GeneratorId {
        self.id
    }

    pub fn location(&self) -> &BlockLocation {
        &self.location
    }

    pub fn cell(&self) -> CellKey {
        self.location.to_cell()
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn last_accessed_time(&self) -> i64 {
        self.last_accessed_time
    }

    pub fn last_generation_time(&self) -> i64 {
        self.last_generation_time
    }

    pub fn stored_items(&self) -> &StoredItems {
        &self.stored_items
    }

    /// Total individual items in storage
    pub fn total_stored_count(&self) -> u64 {
        self.stored_items.total_count()
    }

    /// Record an interaction; informational only
    pub fn touch(&mut self, now: i64) {
        self.last_accessed_time = now;
    }

    /// Whole seconds since the generation checkpoint
    pub fn elapsed_seconds(&self, now: i64) -> i64 {
        ((now - self.last_generation_time) / MILLIS_PER_SECOND).max(0)
    }

    /// Free space left before `capacity`, in items
    pub fn available_space(&self, capacity: u32) -> u64 {
        (capacity as u64).saturating_sub(self.total_stored_count())
    }

    /// Items owed since the checkpoint when each interval yields one item
    pub fn items_owed(&self, interval_seconds: i64, capacity: u32, now: i64) -> u32 {
        self.cycles_owed(interval_seconds, capacity, 1, now)
    }

    /// Generation cycles owed since the checkpoint
    ///
    /// Bounded by the cycles needed to fill the free space, where one cycle
    /// yields `per_cycle` items.
    pub fn cycles_owed(&self, interval_seconds: i64, capacity: u32, per_cycle: u32, now: i64) -> u32 {
        if interval_seconds <= 0 {
            return 0;
        }
        let per_cycle = per_cycle.max(1) as u64;
        let from_time = (self.elapsed_seconds(now) / interval_seconds) as u64;
        let available = self.available_space(capacity);
        let fill_cycles = available.div_ceil(per_cycle);
        from_time.min(fill_cycles).min(u32::MAX as u64) as u32
    }

    /// Move the checkpoint forward by the time `cycles` consumed
    pub fn advance(&mut self, cycles: u32, interval_seconds: i64) {
        if cycles > 0 && interval_seconds > 0 {
            self.last_generation_time += cycles as i64 * interval_seconds * MILLIS_PER_SECOND;
        }
    }

    /// Seconds until the next cycle completes
    pub fn seconds_until_next(&self, interval_seconds: i64, now: i64) -> i64 {
        if interval_seconds <= 0 {
            return 0;
        }
        interval_seconds - self.elapsed_seconds(now) % interval_seconds
    }

    /// Insert items with stacking; capacity is the caller's concern
    pub fn add_stored_item(&mut self, stack: ItemStack) -> bool {
        self.stored_items.add(stack)
    }

    /// Insert items only if the total stays within `capacity`
    pub fn add_stored_item_checked(&mut self, stack: ItemStack, capacity: u32) -> GeneratorResult<()> {
        if stack.is_empty() {
            return Err(GeneratorError::validation("cannot store an empty stack"));
        }
        let available = self.available_space(capacity);
        if stack.count as u64 > available {
            return Err(GeneratorError::CapacityExceeded {
                requested: stack.count,
                available: available.min(u32::MAX as u64) as u32,
            });
        }
        self.stored_items.add(stack);
        Ok(())
    }

    /// Replace storage with what the player left behind
    pub fn replace_stored_items(&mut self, stacks: Vec<ItemStack>, capacity: u32) -> GeneratorResult<()> {
        let requested: u64 = stacks.iter().filter(|s| !s.is_empty()).map(|s| s.count as u64).sum();
        if requested > capacity as u64 {
            return Err(GeneratorError::CapacityExceeded {
                requested: requested.min(u32::MAX as u64) as u32,
                available: capacity,
            });
        }
        self.stored_items = StoredItems::from_stacks(stacks);
        Ok(())
    }

    /// Empty storage and hand the stacks to the caller
    pub fn take_stored_items(&mut self) -> Vec<ItemStack> {
        self.stored_items.take_all()
    }

    /// Run one interaction's accumulation against a type's configuration
    pub fn harvest(&mut self, generator_type: &GeneratorType, now: i64) -> Harvest {
        let interval = generator_type.generation_time_seconds as i64;
        let capacity = generator_type.storage_capacity;
        let per_cycle = generator_type.output.count.max(1);

        let elapsed_seconds = self.elapsed_seconds(now);
        let seconds_until_next = self.seconds_until_next(interval, now);

        let cycles = self.cycles_owed(interval, capacity, per_cycle, now);
        let items = (cycles as u64 * per_cycle as u64).min(self.available_space(capacity)) as u32;
        if items > 0 {
            self.stored_items.add(generator_type.output.with_count(items));
        }
        self.advance(cycles, interval);

        Harvest {
            cycles,
            items_added: items,
            elapsed_seconds,
            seconds_until_next,
            stored_total: self.total_stored_count(),
            capacity,
        }
    }
}

/// On-disk shape of a generator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratorRecord {
    id: GeneratorId,
    location: BlockLocation,
    generator_type: String,
    owner: OwnerId,
    #[serde(default)]
    last_accessed_time: i64,
    #[serde(default)]
    last_generation_time: Option<i64>,
    #[serde(default)]
    stored_items: StoredItems,
}

impl TryFrom<GeneratorRecord> for GeneratorInstance {
    type Error = GeneratorError;

    fn try_from(record: GeneratorRecord) -> Result<Self, Self::Error> {
        let last_generation_time = record
            .last_generation_time
            .unwrap_or(record.last_accessed_time);
        // Hand-edited files may hold empty or oversized stacks
        let mut loaded = record.stored_items;
        let stored_items = StoredItems::from_stacks(loaded.take_all());
        GeneratorInstance::new(
            record.id,
            record.location,
            &record.generator_type,
            record.owner,
            record.last_accessed_time,
            last_generation_time,
            stored_items,
        )
    }
}

impl From<GeneratorInstance> for GeneratorRecord {
    fn from(generator: GeneratorInstance) -> Self {
        Self {
            id: generator.id,
            location: generator.location,
            generator_type: generator.type_name,
            owner: generator.owner,
            last_accessed_time: generator.last_accessed_time,
            last_generation_time: Some(generator.last_generation_time),
            stored_items: generator.stored_items,
        }
    }
}
