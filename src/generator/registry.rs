//! Authoritative in-memory set of live generators
//!
//! Four indices sit beside the primary map: exact location, owner, and chunk
//! cell. Readers go straight to the `DashMap`s without locking. Writers take
//! `write_lock` so a create, destroy or update lands in every index before
//! the next writer starts, and the save worker can read concurrently.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use crate::error::{GeneratorError, GeneratorResult, LimitScope};
use crate::generator::{GeneratorId, GeneratorInstance, OwnerId};
use crate::persistence::{GeneratorStore, SaveHandle};
use crate::time::Clock;
use crate::world::{BlockLocation, CellKey};

/// Density limits applied on creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryLimits {
    pub max_per_cell: usize,
    pub max_per_owner: usize,
}

impl Default for RegistryLimits {
    fn default() -> Self {
        Self {
            max_per_cell: 10,
            max_per_owner: 50,
        }
    }
}

pub struct GeneratorRegistry {
    generators: DashMap<GeneratorId, GeneratorInstance>,
    by_location: DashMap<BlockLocation, GeneratorId>,
    by_owner: DashMap<OwnerId, FxHashSet<GeneratorId>>,
    by_cell: DashMap<CellKey, FxHashSet<GeneratorId>>,
    write_lock: Mutex<()>,
    limits: RegistryLimits,
    saver: SaveHandle,
    clock: Arc<dyn Clock>,
}

impl GeneratorRegistry {
    pub fn new(limits: RegistryLimits, saver: SaveHandle, clock: Arc<dyn Clock>) -> Self {
        Self {
            generators: DashMap::new(),
            by_location: DashMap::new(),
            by_owner: DashMap::new(),
            by_cell: DashMap::new(),
            write_lock: Mutex::new(()),
            limits,
            saver,
            clock,
        }
    }

    /// Registry that never touches disk
    pub fn in_memory(limits: RegistryLimits, clock: Arc<dyn Clock>) -> Self {
        Self::new(limits, SaveHandle::Disabled, clock)
    }

    pub fn limits(&self) -> RegistryLimits {
        self.limits
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Whether `owner` may place another generator at `location`
    ///
    /// Checks the cell and owner counts only; occupancy of the exact block is
    /// checked by `create`.
    pub fn can_create(&self, location: &BlockLocation, owner: OwnerId) -> bool {
        self.check_limits(location, owner).is_ok()
    }

    fn check_limits(&self, location: &BlockLocation, owner: OwnerId) -> GeneratorResult<()> {
        if self.count_in_cell(&location.to_cell()) >= self.limits.max_per_cell {
            return Err(GeneratorError::LimitExceeded {
                scope: LimitScope::Cell,
                limit: self.limits.max_per_cell,
            });
        }
        if self.count_by_owner(owner) >= self.limits.max_per_owner {
            return Err(GeneratorError::LimitExceeded {
                scope: LimitScope::Owner,
                limit: self.limits.max_per_owner,
            });
        }
        Ok(())
    }

    /// Place a new generator whose timer starts now
    ///
    /// Refused without any mutation when the block is occupied or, unless
    /// `limit_exempt`, when a density limit is reached.
    pub fn create(
        &self,
        location: BlockLocation,
        type_name: &str,
        owner: OwnerId,
        limit_exempt: bool,
    ) -> GeneratorResult<GeneratorInstance> {
        let generator = {
            let _guard = self.write_lock.lock();

            if self.by_location.contains_key(&location) {
                log::warn!("Refused generator at {}: location occupied", location);
                return Err(GeneratorError::OccupiedLocation(location));
            }
            if !limit_exempt {
                if let Err(e) = self.check_limits(&location, owner) {
                    log::warn!("Refused generator at {} for {}: {}", location, owner, e);
                    return Err(e);
                }
            }

            let generator = GeneratorInstance::create(location, type_name, owner, self.clock.now_millis())?;
            self.insert_indices(&generator);
            self.saver.record(&generator);
            generator
        };

        log::info!(
            "Created {} generator {} at {} for {}",
            generator.type_name(),
            generator.id(),
            generator.location(),
            owner
        );
        self.request_save();
        Ok(generator)
    }

    /// Remove a generator from every index and hand it back
    ///
    /// Unknown ids are a no-op and trigger no save.
    pub fn destroy(&self, id: GeneratorId) -> Option<GeneratorInstance> {
        let removed = {
            let _guard = self.write_lock.lock();
            let (_, removed) = self.generators.remove(&id)?;
            self.remove_indices(&removed);
            self.saver.forget(id);
            removed
        };

        log::info!("Destroyed generator {} at {}", id, removed.location());
        self.request_save();
        Some(removed)
    }

    /// Replace the stored state of a registered generator
    ///
    /// Returns false, without saving, when the id is not registered or the
    /// replacement disagrees on location or owner.
    pub fn update(&self, generator: &GeneratorInstance) -> bool {
        {
            let _guard = self.write_lock.lock();
            let Some(mut current) = self.generators.get_mut(&generator.id()) else {
                log::debug!("Ignoring update for unregistered generator {}", generator.id());
                return false;
            };
            if current.location() != generator.location() || current.owner() != generator.owner() {
                log::warn!("Ignoring update that changes identity of generator {}", generator.id());
                return false;
            }
            *current = generator.clone();
            drop(current);
            self.saver.record(generator);
        }

        self.request_save();
        true
    }

    pub fn get_by_id(&self, id: GeneratorId) -> Option<GeneratorInstance> {
        self.generators.get(&id).map(|entry| entry.value().clone())
    }

    pub fn get_at(&self, location: &BlockLocation) -> Option<GeneratorInstance> {
        let id = *self.by_location.get(location)?;
        self.get_by_id(id)
    }

    /// Snapshot of every generator `owner` has placed
    pub fn list_by_owner(&self, owner: OwnerId) -> Vec<GeneratorInstance> {
        let ids = self.by_owner.get(&owner).map(|ids| ids.value().clone());
        self.collect_ids(ids)
    }

    /// Snapshot of every generator in the cell containing `location`
    pub fn list_by_cell(&self, location: &BlockLocation) -> Vec<GeneratorInstance> {
        self.list_in_cell(&location.to_cell())
    }

    pub fn list_in_cell(&self, cell: &CellKey) -> Vec<GeneratorInstance> {
        let ids = self.by_cell.get(cell).map(|ids| ids.value().clone());
        self.collect_ids(ids)
    }

    fn collect_ids(&self, ids: Option<FxHashSet<GeneratorId>>) -> Vec<GeneratorInstance> {
        let mut generators: Vec<GeneratorInstance> = ids
            .unwrap_or_default()
            .into_iter()
            .filter_map(|id| self.get_by_id(id))
            .collect();
        generators.sort_by_key(|g| g.id());
        generators
    }

    pub fn count(&self) -> usize {
        self.generators.len()
    }

    pub fn count_by_owner(&self, owner: OwnerId) -> usize {
        self.by_owner.get(&owner).map(|ids| ids.len()).unwrap_or(0)
    }

    pub fn count_in_cell(&self, cell: &CellKey) -> usize {
        self.by_cell.get(cell).map(|ids| ids.len()).unwrap_or(0)
    }

    /// Snapshot of every generator, ordered by id
    pub fn all(&self) -> Vec<GeneratorInstance> {
        let mut generators: Vec<GeneratorInstance> =
            self.generators.iter().map(|entry| entry.value().clone()).collect();
        generators.sort_by_key(|g| g.id());
        generators
    }

    /// Bulk-register generators loaded from disk without saving
    ///
    /// Records that collide on id or location with one already registered
    /// are skipped.
    pub fn register_all(&self, generators: impl IntoIterator<Item = GeneratorInstance>) -> (usize, Vec<GeneratorId>) {
        let _guard = self.write_lock.lock();
        let mut registered = 0;
        let mut skipped = Vec::new();

        for generator in generators {
            if self.generators.contains_key(&generator.id()) || self.by_location.contains_key(generator.location()) {
                log::warn!(
                    "Skipping duplicate generator {} at {}",
                    generator.id(),
                    generator.location()
                );
                skipped.push(generator.id());
                continue;
            }
            self.insert_indices(&generator);
            registered += 1;
        }
        (registered, skipped)
    }

    /// Populate the registry from a store's snapshot
    ///
    /// The store cache is brought back in line with what was registered: a
    /// skipped id that is still live keeps the registered copy, any other
    /// skipped id is dropped from the cache.
    pub fn load_from(&self, store: &GeneratorStore) -> usize {
        let (registered, skipped) = self.register_all(store.load_all());
        for id in skipped {
            match self.get_by_id(id) {
                Some(live) => store.put(live),
                None => {
                    store.forget(id);
                }
            }
        }
        log::info!("Registered {} generators", registered);
        registered
    }

    /// Drop every generator from memory; nothing is saved
    pub fn clear(&self) {
        let _guard = self.write_lock.lock();
        self.generators.clear();
        self.by_location.clear();
        self.by_owner.clear();
        self.by_cell.clear();
    }

    /// Write the current state out and wait for it
    pub fn save_now(&self) -> GeneratorResult<()> {
        Ok(self.saver.flush()?)
    }

    fn request_save(&self) {
        if let Err(e) = self.saver.request() {
            log::warn!("Failed to save generators, will retry on next save: {}", e);
        }
    }

    fn insert_indices(&self, generator: &GeneratorInstance) {
        let id = generator.id();
        self.by_location.insert(generator.location().clone(), id);
        self.by_owner.entry(generator.owner()).or_default().insert(id);
        self.by_cell.entry(generator.cell()).or_default().insert(id);
        self.generators.insert(id, generator.clone());
    }

    fn remove_indices(&self, generator: &GeneratorInstance) {
        let id = generator.id();
        self.by_location.remove(generator.location());
        self.by_owner.remove_if_mut(&generator.owner(), |_, ids| {
            ids.remove(&id);
            ids.is_empty()
        });
        self.by_cell.remove_if_mut(&generator.cell(), |_, ids| {
            ids.remove(&id);
            ids.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::ItemStack;
    use crate::time::ManualClock;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn registry_with(limits: RegistryLimits) -> (GeneratorRegistry, ManualClock) {
        let clock = ManualClock::fixed();
        (GeneratorRegistry::in_memory(limits, Arc::new(clock.clone())), clock)
    }

    fn location(x: i32, z: i32) -> BlockLocation {
        BlockLocation::new("world", x, 64, z)
    }

    #[test]
    fn test_create_indexes_everywhere() {
        let (registry, clock) = registry_with(RegistryLimits::default());
        let owner = Uuid::new_v4();

        let generator = registry
            .create(location(3, 4), "iron_farm", owner, false)
            .expect("Failed to create generator");

        assert_eq!(generator.last_generation_time(), clock.now_millis());
        assert_eq!(registry.get_by_id(generator.id()), Some(generator.clone()));
        assert_eq!(registry.get_at(&location(3, 4)), Some(generator.clone()));
        assert_eq!(registry.list_by_owner(owner), vec![generator.clone()]);
        assert_eq!(registry.list_by_cell(&location(15, 15)), vec![generator]);
        assert!(registry.list_by_cell(&location(16, 0)).is_empty());
    }

    #[test]
    fn test_one_generator_per_location() {
        let (registry, _) = registry_with(RegistryLimits::default());
        let first = registry
            .create(location(0, 0), "iron_farm", Uuid::new_v4(), false)
            .expect("Failed to create generator");

        let at_same_block = location(0, 0).with_orientation(180.0, 0.0);
        let err = registry
            .create(at_same_block, "villager_breeder", Uuid::new_v4(), true)
            .expect_err("Second generator on the same block should be refused");
        assert!(matches!(err, GeneratorError::OccupiedLocation(_)));
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.get_at(&location(0, 0)), Some(first));
    }

    #[test]
    fn test_cell_limit_and_exemption() {
        let (registry, _) = registry_with(RegistryLimits { max_per_cell: 2, max_per_owner: 50 });
        let owner = Uuid::new_v4();
        registry.create(location(0, 0), "iron_farm", owner, false).expect("Failed to create generator");
        registry.create(location(1, 0), "iron_farm", owner, false).expect("Failed to create generator");

        assert!(!registry.can_create(&location(2, 0), owner));
        let err = registry
            .create(location(2, 0), "iron_farm", owner, false)
            .expect_err("Cell limit should refuse creation");
        assert!(matches!(err, GeneratorError::LimitExceeded { scope: LimitScope::Cell, limit: 2 }));
        assert_eq!(registry.count(), 2);

        assert!(registry.can_create(&location(16, 0), owner));
        registry.create(location(2, 0), "iron_farm", owner, true).expect("Exempt creation should succeed");
        assert_eq!(registry.count_in_cell(&location(0, 0).to_cell()), 3);
    }

    #[test]
    fn test_owner_limit() {
        let (registry, _) = registry_with(RegistryLimits { max_per_cell: 10, max_per_owner: 1 });
        let owner = Uuid::new_v4();
        registry.create(location(0, 0), "iron_farm", owner, false).expect("Failed to create generator");

        let err = registry
            .create(location(100, 100), "iron_farm", owner, false)
            .expect_err("Owner limit should refuse creation");
        assert!(matches!(err, GeneratorError::LimitExceeded { scope: LimitScope::Owner, .. }));
        assert!(registry.create(location(100, 100), "iron_farm", Uuid::new_v4(), false).is_ok());
    }

    #[test]
    fn test_destroy_clears_indices() {
        let (registry, _) = registry_with(RegistryLimits::default());
        let owner = Uuid::new_v4();
        let mut generator = registry
            .create(location(5, 5), "iron_farm", owner, false)
            .expect("Failed to create generator");
        generator.add_stored_item(ItemStack::new("iron_ingot", 12));
        assert!(registry.update(&generator));

        let removed = registry.destroy(generator.id()).expect("Generator should be destroyed");
        assert_eq!(removed.total_stored_count(), 12);
        assert_eq!(registry.count(), 0);
        assert!(registry.get_at(&location(5, 5)).is_none());
        assert_eq!(registry.count_by_owner(owner), 0);
        assert_eq!(registry.count_in_cell(&location(5, 5).to_cell()), 0);
        assert!(registry.list_by_owner(owner).is_empty());
    }

    #[test]
    fn test_destroy_unknown_is_noop() {
        let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
        let store = Arc::new(GeneratorStore::new(temp_dir.path(), 10));
        let registry = GeneratorRegistry::new(
            RegistryLimits::default(),
            SaveHandle::Immediate(Arc::clone(&store)),
            Arc::new(ManualClock::fixed()),
        );
        registry
            .create(location(0, 0), "iron_farm", Uuid::new_v4(), false)
            .expect("Failed to create generator");
        let saves = store.stats().saves_completed;

        assert!(registry.destroy(GeneratorId::random()).is_none());
        assert_eq!(registry.count(), 1);
        assert_eq!(store.stats().saves_completed, saves);
    }

    #[test]
    fn test_update_ignores_unknown_and_identity_changes() {
        let (registry, clock) = registry_with(RegistryLimits::default());
        let stranger = GeneratorInstance::create(location(9, 9), "iron_farm", Uuid::new_v4(), clock.now_millis())
            .expect("Failed to create generator");
        assert!(!registry.update(&stranger));
        assert_eq!(registry.count(), 0);

        let generator = registry
            .create(location(1, 1), "iron_farm", Uuid::new_v4(), false)
            .expect("Failed to create generator");
        let moved = GeneratorInstance::new(
            generator.id(),
            location(2, 2),
            generator.type_name(),
            generator.owner(),
            generator.last_accessed_time(),
            generator.last_generation_time(),
            generator.stored_items().clone(),
        )
        .expect("Failed to build generator");
        assert!(!registry.update(&moved));
        assert_eq!(registry.get_by_id(generator.id()), Some(generator));
    }

    #[test]
    fn test_immediate_saves_round_trip_through_store() {
        let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
        let store = Arc::new(GeneratorStore::new(temp_dir.path(), 10));
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::fixed());
        let registry = GeneratorRegistry::new(
            RegistryLimits::default(),
            SaveHandle::Immediate(Arc::clone(&store)),
            Arc::clone(&clock),
        );
        let kept = registry
            .create(location(0, 0), "iron_farm", Uuid::new_v4(), false)
            .expect("Failed to create generator");
        let gone = registry
            .create(location(1, 0), "iron_farm", Uuid::new_v4(), false)
            .expect("Failed to create generator");
        registry.destroy(gone.id());

        let reopened = GeneratorStore::new(temp_dir.path(), 10);
        let restored = GeneratorRegistry::in_memory(RegistryLimits::default(), clock);
        assert_eq!(restored.load_from(&reopened), 1);
        assert_eq!(restored.all(), vec![kept]);
    }

    #[test]
    fn test_register_all_skips_collisions() {
        let (registry, clock) = registry_with(RegistryLimits::default());
        let a = GeneratorInstance::create(location(0, 0), "iron_farm", Uuid::new_v4(), clock.now_millis())
            .expect("Failed to create generator");
        let b = GeneratorInstance::create(location(0, 0), "iron_farm", Uuid::new_v4(), clock.now_millis())
            .expect("Failed to create generator");

        let (registered, skipped) = registry.register_all(vec![a.clone(), a, b.clone()]);
        assert_eq!(registered, 1);
        assert_eq!(skipped.len(), 2);
        assert!(skipped.contains(&b.id()));
    }

    #[test]
    fn test_load_with_duplicate_ids_keeps_live_generator_on_disk() {
        let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
        let store = Arc::new(GeneratorStore::new(temp_dir.path(), 10));
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::fixed());
        let first = GeneratorInstance::create(location(0, 0), "iron_farm", Uuid::new_v4(), clock.now_millis())
            .expect("Failed to create generator");
        let mut later = first.clone();
        later.add_stored_item(ItemStack::new("iron_ingot", 5));
        store.save_all(&[first.clone(), later]).expect("Failed to save generators");

        let registry = GeneratorRegistry::new(
            RegistryLimits::default(),
            SaveHandle::Immediate(Arc::clone(&store)),
            Arc::clone(&clock),
        );
        assert_eq!(registry.load_from(&store), 1);
        assert_eq!(store.get(first.id()), Some(first.clone()));

        let other = registry
            .create(location(1, 0), "iron_farm", Uuid::new_v4(), false)
            .expect("Failed to create generator");

        let on_disk = GeneratorStore::new(temp_dir.path(), 10).load_all();
        assert_eq!(on_disk.len(), 2);
        assert_eq!(on_disk, registry.all());
        assert!(on_disk.contains(&first));
        assert!(on_disk.contains(&other));
    }

    #[test]
    fn test_load_with_location_collision_drops_loser_from_store() {
        let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
        let store = GeneratorStore::new(temp_dir.path(), 10);
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::fixed());
        let kept = GeneratorInstance::create(location(0, 0), "iron_farm", Uuid::new_v4(), clock.now_millis())
            .expect("Failed to create generator");
        let loser = GeneratorInstance::create(location(0, 0), "iron_farm", Uuid::new_v4(), clock.now_millis())
            .expect("Failed to create generator");
        store.save_all(&[kept.clone(), loser.clone()]).expect("Failed to save generators");

        let registry = GeneratorRegistry::in_memory(RegistryLimits::default(), clock);
        registry.load_from(&store);
        let live = registry.get_at(&location(0, 0)).expect("One generator should be registered");
        assert_eq!(store.cached_count(), 1);
        assert_eq!(store.snapshot(), vec![live]);
    }

    #[test]
    fn test_limits_ignore_other_worlds() {
        let (registry, _) = registry_with(RegistryLimits { max_per_cell: 1, max_per_owner: 50 });
        let owner = Uuid::new_v4();
        registry.create(location(0, 0), "iron_farm", owner, false).expect("Failed to create generator");
        assert!(registry.can_create(&BlockLocation::new("world_nether", 0, 64, 0), owner));
    }

    #[test]
    fn test_clear_empties_everything() {
        let (registry, _) = registry_with(RegistryLimits::default());
        let owner = Uuid::new_v4();
        registry.create(location(0, 0), "iron_farm", owner, false).expect("Failed to create generator");
        registry.clear();
        assert_eq!(registry.count(), 0);
        assert_eq!(registry.count_by_owner(owner), 0);
        assert!(registry.all().is_empty());
    }
}
