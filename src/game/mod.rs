//! Startup composition and the host-facing event interface
//!
//! `GeneratorService` builds the catalog, store, registry and save worker
//! once and passes them to the handlers explicitly. Hosts hold the service
//! and call its handlers from their event callbacks.

pub mod handlers;

pub use handlers::{Actor, BreakOutcome, GeneratorHandlers, InteractOutcome, PlaceEvent};

use std::sync::Arc;

use anyhow::Context;

use crate::config::GeneratorSettings;
use crate::generator::{GeneratorCatalog, GeneratorRegistry};
use crate::persistence::{GeneratorStore, SaveManager};
use crate::time::{Clock, SystemClock};

pub struct GeneratorService {
    settings: GeneratorSettings,
    catalog: Arc<GeneratorCatalog>,
    store: Arc<GeneratorStore>,
    registry: Arc<GeneratorRegistry>,
    save_manager: SaveManager,
    handlers: GeneratorHandlers,
}

impl GeneratorService {
    /// Open the data directory using the system clock
    pub fn open(settings: GeneratorSettings) -> anyhow::Result<Self> {
        Self::open_with_clock(settings, Arc::new(SystemClock))
    }

    pub fn open_with_clock(settings: GeneratorSettings, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let verbose = settings.plugin.debug;

        let catalog = GeneratorCatalog::load_dir(settings.types_dir())
            .with_context(|| format!("Failed to load generator types from {}", settings.types_dir().display()))?;
        let catalog = Arc::new(catalog);

        let store = Arc::new(GeneratorStore::new(&settings.data_dir, settings.storage.max_backups).with_verbose(verbose));
        store
            .initialize()
            .with_context(|| format!("Failed to prepare data directory {}", settings.data_dir.display()))?;

        let save_manager = SaveManager::start(Arc::clone(&store), settings.auto_save_interval())
            .context("Failed to start save worker")?;

        let registry = Arc::new(GeneratorRegistry::new(
            settings.limits(),
            save_manager.handle(),
            Arc::clone(&clock),
        ));
        registry.load_from(&store);

        let handlers = GeneratorHandlers::new(Arc::clone(&registry), Arc::clone(&catalog), clock).with_verbose(verbose);

        log::info!(
            "Generator service ready: {} generators, {} types, data in {}",
            registry.count(),
            catalog.len(),
            settings.data_dir.display()
        );
        Ok(Self {
            settings,
            catalog,
            store,
            registry,
            save_manager,
            handlers,
        })
    }

    pub fn handlers(&self) -> &GeneratorHandlers {
        &self.handlers
    }

    pub fn registry(&self) -> &Arc<GeneratorRegistry> {
        &self.registry
    }

    pub fn catalog(&self) -> &Arc<GeneratorCatalog> {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<GeneratorStore> {
        &self.store
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Write everything out and wait for it
    pub fn flush(&self) -> anyhow::Result<()> {
        self.save_manager.flush().context("Failed to flush generators")
    }

    /// Final save, then drop everything from memory
    pub fn shutdown(mut self) -> anyhow::Result<()> {
        let result = self.save_manager.stop().context("Final generator save failed");
        self.registry.clear();
        log::info!("Generator service stopped");
        result
    }
}
