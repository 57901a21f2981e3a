//! Durable JSON store for generators
//!
//! The whole set is written as one JSON array on every save. Before the
//! primary file is replaced it is copied to a timestamped backup, so the last
//! good snapshot survives a crash mid-save. Loading falls back through the
//! backups newest-first when the primary file is unreadable.
//!
//! Layout under the data root:
//!
//! ```text
//! data/generators.json        primary snapshot
//! data/generators.json.tmp    transient, only during a save
//! backups/generators_<ts>.json
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::generator::{GeneratorId, GeneratorInstance};
use crate::persistence::{
    atomic_write, corrupted_data, load_error, BackupInfo, BackupManager, PersistenceError,
    PersistenceErrorContext, PersistenceResult,
};

const DATA_FILE_STEM: &str = "generators";

/// File locations used by a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    pub root: PathBuf,
    pub data_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub primary: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let data_dir = root.join("data");
        let backup_dir = root.join("backups");
        let primary = data_dir.join(format!("{}.json", DATA_FILE_STEM));
        Self {
            root,
            data_dir,
            backup_dir,
            primary,
        }
    }
}

/// Counters for save activity since the store was opened
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub saves_completed: u64,
    pub saves_failed: u64,
    pub bytes_written: u64,
    pub backups_created: u64,
}

pub struct GeneratorStore {
    layout: StoreLayout,
    /// Latest known state of every generator, keyed by id
    cache: DashMap<GeneratorId, GeneratorInstance>,
    backups: BackupManager,
    /// Serializes the backup + temp-file + rename sequence
    write_lock: Mutex<()>,
    stats: Mutex<StoreStats>,
    verbose: bool,
}

impl GeneratorStore {
    pub fn new(root: impl Into<PathBuf>, max_backups: usize) -> Self {
        let layout = StoreLayout::new(root);
        let backups = BackupManager::new(layout.backup_dir.clone(), DATA_FILE_STEM, max_backups);
        Self {
            layout,
            cache: DashMap::new(),
            backups,
            write_lock: Mutex::new(()),
            stats: Mutex::new(StoreStats::default()),
            verbose: false,
        }
    }

    /// Log per-save details at info instead of debug
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    /// Create the data and backup directories
    pub fn initialize(&self) -> PersistenceResult<()> {
        fs::create_dir_all(&self.layout.data_dir).persistence_context("Failed to create data directory")?;
        fs::create_dir_all(&self.layout.backup_dir).persistence_context("Failed to create backup directory")?;
        Ok(())
    }

    /// Load every generator, falling back to backups when the primary is bad
    ///
    /// Never fails: when nothing can be recovered the result is empty and the
    /// loss is logged at error level. The cache is replaced with the result.
    pub fn load_all(&self) -> Vec<GeneratorInstance> {
        let primary = &self.layout.primary;
        let generators = if !primary.exists() {
            log::info!("No generator data at {}, starting fresh", primary.display());
            Vec::new()
        } else {
            match read_snapshot(primary) {
                Ok(generators) => generators,
                Err(e) => {
                    log::warn!("Failed to load {}: {}. Trying backups", primary.display(), e);
                    self.load_from_backups().unwrap_or_else(|| {
                        log::error!(
                            "Generator data at {} and all backups is unrecoverable; starting with no generators",
                            primary.display()
                        );
                        Vec::new()
                    })
                }
            }
        };

        self.cache.clear();
        for generator in &generators {
            self.cache.insert(generator.id(), generator.clone());
        }
        log::info!("Loaded {} generators", generators.len());
        generators
    }

    fn load_from_backups(&self) -> Option<Vec<GeneratorInstance>> {
        let backups = match self.backups.list_backups() {
            Ok(backups) => backups,
            Err(e) => {
                log::warn!("Failed to list backups: {}", e);
                return None;
            }
        };

        for backup in backups {
            match read_snapshot(&backup.path) {
                Ok(generators) => {
                    log::warn!("Restored {} generators from backup {}", generators.len(), backup.name);
                    return Some(generators);
                }
                Err(e) => log::warn!("Backup {} is unreadable: {}", backup.name, e),
            }
        }
        None
    }

    /// Write `generators` as the new primary snapshot
    ///
    /// The current primary is backed up first and old backups are pruned. On
    /// failure the primary and its latest backup are left as they were.
    pub fn save_all(&self, generators: &[GeneratorInstance]) -> PersistenceResult<()> {
        let _guard = self.write_lock.lock();
        let result = self.write_snapshot(generators);

        let mut stats = self.stats.lock();
        match &result {
            Ok(written) => {
                stats.saves_completed += 1;
                stats.bytes_written += written;
                log::log!(self.detail_level(), "Saved {} generators ({} bytes)", generators.len(), written);
            }
            Err(e) => {
                stats.saves_failed += 1;
                log::warn!("Failed to save generators: {}", e);
            }
        }
        result.map(|_| ())
    }

    fn write_snapshot(&self, generators: &[GeneratorInstance]) -> PersistenceResult<u64> {
        fs::create_dir_all(&self.layout.data_dir).persistence_context("Failed to create data directory")?;

        if self.layout.primary.exists() {
            self.rotate_backup();
        }

        let json = serde_json::to_vec_pretty(generators)
            .map_err(|e| PersistenceError::SerializationError(e.to_string()))?;
        atomic_write(&self.layout.primary, &json)
    }

    /// Back up the primary and prune; failures here never block a save
    fn rotate_backup(&self) -> Option<BackupInfo> {
        let backup = match self.backups.create_backup(&self.layout.primary) {
            Ok(backup) => backup,
            Err(e) => {
                log::warn!("Failed to create backup: {}", e);
                return None;
            }
        };
        self.stats.lock().backups_created += 1;

        if let Err(e) = self.backups.cleanup_old_backups() {
            log::warn!("Failed to prune old backups: {}", e);
        }
        Some(backup)
    }

    /// Save the cached set
    pub fn save_cached(&self) -> PersistenceResult<()> {
        self.save_all(&self.snapshot())
    }

    /// Cache one generator and save everything
    pub fn save(&self, generator: GeneratorInstance) -> PersistenceResult<()> {
        self.put(generator);
        self.save_cached()
    }

    /// Drop one generator from the cache and save everything
    pub fn remove(&self, id: GeneratorId) -> PersistenceResult<Option<GeneratorInstance>> {
        let removed = self.forget(id);
        self.save_cached()?;
        Ok(removed)
    }

    /// Update the cache without touching disk
    pub fn put(&self, generator: GeneratorInstance) {
        self.cache.insert(generator.id(), generator);
    }

    /// Remove from the cache without touching disk
    pub fn forget(&self, id: GeneratorId) -> Option<GeneratorInstance> {
        self.cache.remove(&id).map(|(_, generator)| generator)
    }

    pub fn get(&self, id: GeneratorId) -> Option<GeneratorInstance> {
        self.cache.get(&id).map(|entry| entry.value().clone())
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// Cached generators ordered by id
    pub fn snapshot(&self) -> Vec<GeneratorInstance> {
        let mut generators: Vec<GeneratorInstance> =
            self.cache.iter().map(|entry| entry.value().clone()).collect();
        generators.sort_by_key(|g| g.id());
        generators
    }

    pub fn stats(&self) -> StoreStats {
        *self.stats.lock()
    }

    /// Describe every problem found in the cached records
    pub fn validate_integrity(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut locations = HashSet::new();

        for generator in self.snapshot() {
            if generator.type_name().trim().is_empty() {
                problems.push(format!("Generator {} has no type", generator.id()));
            }
            if generator.last_accessed_time() <= 0 {
                problems.push(format!(
                    "Generator {} has invalid last access time {}",
                    generator.id(),
                    generator.last_accessed_time()
                ));
            }
            if !locations.insert(generator.location().clone()) {
                problems.push(format!(
                    "Generator {} shares location {} with another generator",
                    generator.id(),
                    generator.location()
                ));
            }
        }

        if problems.is_empty() {
            log::debug!("Integrity check passed for {} generators", locations.len());
        } else {
            log::warn!("Integrity check found {} problems", problems.len());
        }
        problems
    }

    /// Back up the primary file now, if there is one
    pub fn perform_backup(&self) -> PersistenceResult<Option<BackupInfo>> {
        let _guard = self.write_lock.lock();
        if !self.layout.primary.exists() {
            return Ok(None);
        }
        let backup = self.backups.create_backup(&self.layout.primary)?;
        self.stats.lock().backups_created += 1;
        self.backups.cleanup_old_backups()?;
        log::info!("Created backup {}", backup.name);
        Ok(Some(backup))
    }

    fn detail_level(&self) -> log::Level {
        if self.verbose {
            log::Level::Info
        } else {
            log::Level::Debug
        }
    }
}

/// Parse a snapshot file
///
/// A file that is empty or not a JSON array is corrupt as a whole. Individual
/// records that fail validation are skipped with a warning.
pub fn read_snapshot(path: &Path) -> PersistenceResult<Vec<GeneratorInstance>> {
    let data = fs::read_to_string(path).persistence_context("Failed to read generator data")?;
    if data.trim().is_empty() {
        return Err(corrupted_data(format!("{} is empty", path.display())));
    }

    let records: Vec<serde_json::Value> = serde_json::from_str(&data).map_err(|e| load_error(path, e))?;
    let mut generators = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<GeneratorInstance>(record) {
            Ok(generator) => generators.push(generator),
            Err(e) => log::warn!("Skipping invalid generator record {} in {}: {}", index, path.display(), e),
        }
    }
    Ok(generators)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::ItemStack;
    use crate::world::BlockLocation;
    use tempfile::TempDir;
    use uuid::Uuid;

    const T0: i64 = 1_700_000_000_000;

    fn generator_at(x: i32) -> GeneratorInstance {
        let mut generator =
            GeneratorInstance::create(BlockLocation::new("world", x, 64, 0), "iron_farm", Uuid::new_v4(), T0)
                .expect("Failed to create generator");
        generator.add_stored_item(ItemStack::new("iron_ingot", 70));
        generator
    }

    #[test]
    fn test_missing_primary_loads_empty() {
        let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
        let store = GeneratorStore::new(temp_dir.path(), 10);
        assert!(store.load_all().is_empty());
        assert_eq!(store.cached_count(), 0);
    }

    #[test]
    fn test_round_trip_preserves_every_field() {
        let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
        let store = GeneratorStore::new(temp_dir.path(), 10);
        let generator = generator_at(1).with_orientation_for_test();

        store.save_all(std::slice::from_ref(&generator)).expect("Failed to save generators");
        let loaded = GeneratorStore::new(temp_dir.path(), 10).load_all();
        assert_eq!(loaded, vec![generator.clone()]);

        // Location equality ignores orientation, so check it on its own
        assert_eq!(loaded[0].location().yaw, Some(90.0));
        assert_eq!(loaded[0].location().pitch, Some(-15.5));
        let expected = serde_json::to_value(&generator).expect("Failed to serialize generator");
        let actual = serde_json::to_value(&loaded[0]).expect("Failed to serialize generator");
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_second_save_creates_backup() {
        let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
        let store = GeneratorStore::new(temp_dir.path(), 10);

        store.save_all(&[generator_at(1)]).expect("Failed to save generators");
        assert_eq!(store.stats().backups_created, 0);
        store.save_all(&[generator_at(1), generator_at(2)]).expect("Failed to save generators");

        let stats = store.stats();
        assert_eq!(stats.saves_completed, 2);
        assert_eq!(stats.backups_created, 1);
        assert!(stats.bytes_written > 0);
        assert_eq!(store.backups().list_backups().expect("Failed to list backups").len(), 1);
        assert!(!crate::persistence::temp_path_for(&store.layout().primary).exists());
    }

    #[test]
    fn test_corrupt_primary_recovers_from_backup() {
        let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
        let store = GeneratorStore::new(temp_dir.path(), 10);
        let first = generator_at(1);

        store.save_all(std::slice::from_ref(&first)).expect("Failed to save generators");
        store.save_all(&[first.clone(), generator_at(2)]).expect("Failed to save generators");
        fs::write(&store.layout().primary, "{ this is not json").expect("Failed to corrupt primary");

        let loaded = store.load_all();
        assert_eq!(loaded, vec![first]);
    }

    #[test]
    fn test_all_corrupt_loads_empty() {
        let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
        let store = GeneratorStore::new(temp_dir.path(), 10);
        store.initialize().expect("Failed to initialize store");
        fs::write(&store.layout().primary, "").expect("Failed to write primary");
        let backup = store.backups().backup_dir().join("generators_2024-01-01_00-00-00.json");
        fs::write(&backup, "[{]").expect("Failed to write backup");

        assert!(store.load_all().is_empty());
    }

    #[test]
    fn test_invalid_record_is_skipped() {
        let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
        let store = GeneratorStore::new(temp_dir.path(), 10);
        store.save_all(&[generator_at(3)]).expect("Failed to save generators");

        let mut records: Vec<serde_json::Value> =
            serde_json::from_str(&fs::read_to_string(&store.layout().primary).expect("Failed to read primary"))
                .expect("Failed to parse primary");
        records.push(serde_json::json!({ "id": Uuid::new_v4(), "generatorType": "" }));
        fs::write(&store.layout().primary, serde_json::to_string(&records).expect("Failed to serialize"))
            .expect("Failed to write primary");

        assert_eq!(store.load_all().len(), 1);
    }

    #[test]
    fn test_remove_rewrites_snapshot() {
        let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
        let store = GeneratorStore::new(temp_dir.path(), 10);
        let kept = generator_at(1);
        let dropped = generator_at(2);

        store.save(kept.clone()).expect("Failed to save generator");
        store.save(dropped.clone()).expect("Failed to save generator");
        let removed = store.remove(dropped.id()).expect("Failed to remove generator");
        assert_eq!(removed.map(|g| g.id()), Some(dropped.id()));

        let reloaded = GeneratorStore::new(temp_dir.path(), 10).load_all();
        assert_eq!(reloaded, vec![kept]);
    }

    #[test]
    fn test_backups_are_pruned() {
        let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
        let store = GeneratorStore::new(temp_dir.path(), 2);
        store.save_all(&[generator_at(1)]).expect("Failed to save generators");

        let source = &store.layout().primary;
        for day in 1..=4 {
            let stamp = chrono::NaiveDate::from_ymd_opt(2023, 1, day)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .expect("Failed to build timestamp");
            store.backups().create_backup_at(source, stamp).expect("Failed to create backup");
        }

        store.perform_backup().expect("Failed to back up");
        let backups = store.backups().list_backups().expect("Failed to list backups");
        assert_eq!(backups.len(), 2);
        assert!(backups.iter().all(|b| b.created_at.and_utc().timestamp() > 1_672_704_000));
    }

    #[test]
    fn test_integrity_reports_shared_location() {
        let temp_dir = TempDir::new().expect("Failed to create temporary directory for test");
        let store = GeneratorStore::new(temp_dir.path(), 10);
        store.put(generator_at(5));
        assert!(store.validate_integrity().is_empty());

        store.put(generator_at(5));
        assert_eq!(store.validate_integrity().len(), 1);
    }

    trait WithOrientation {
        fn with_orientation_for_test(self) -> Self;
    }

    impl WithOrientation for GeneratorInstance {
        fn with_orientation_for_test(self) -> Self {
            let location = self.location().clone().with_orientation(90.0, -15.5);
            GeneratorInstance::new(
                self.id(),
                location,
                self.type_name(),
                self.owner(),
                self.last_accessed_time(),
                self.last_generation_time() + 3_000,
                self.stored_items().clone(),
            )
            .expect("Failed to rebuild generator")
        }
    }
}
