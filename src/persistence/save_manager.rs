use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};

use crate::generator::{GeneratorId, GeneratorInstance};
use crate::persistence::{save_error, GeneratorStore, PersistenceErrorContext, PersistenceResult};

/// Request sent to the save worker
#[derive(Debug)]
pub enum SaveRequest {
    /// Save soon; consecutive requests collapse into one save
    Save,
    /// Save now and report the outcome
    Flush(Sender<Result<(), String>>),
    /// Save one last time and exit
    Shutdown,
}

/// How the registry hands mutations to the store
#[derive(Clone)]
pub enum SaveHandle {
    /// Save synchronously on the calling thread
    Immediate(Arc<GeneratorStore>),
    /// Update the cache and let the save worker write it out
    Queued {
        store: Arc<GeneratorStore>,
        sender: Sender<SaveRequest>,
    },
    /// Keep everything in memory
    Disabled,
}

impl SaveHandle {
    fn store(&self) -> Option<&Arc<GeneratorStore>> {
        match self {
            SaveHandle::Immediate(store) | SaveHandle::Queued { store, .. } => Some(store),
            SaveHandle::Disabled => None,
        }
    }

    /// Mirror a created or updated generator into the store cache
    pub fn record(&self, generator: &GeneratorInstance) {
        if let Some(store) = self.store() {
            store.put(generator.clone());
        }
    }

    /// Mirror a destroyed generator into the store cache
    pub fn forget(&self, id: GeneratorId) {
        if let Some(store) = self.store() {
            store.forget(id);
        }
    }

    /// Ask for the cache to be written out
    pub fn request(&self) -> PersistenceResult<()> {
        match self {
            SaveHandle::Immediate(store) => store.save_cached(),
            SaveHandle::Queued { store, sender } => {
                if sender.send(SaveRequest::Save).is_err() {
                    log::warn!("Save worker is gone, saving on the calling thread");
                    return store.save_cached();
                }
                Ok(())
            }
            SaveHandle::Disabled => Ok(()),
        }
    }

    /// Write the cache out and wait for the result
    pub fn flush(&self) -> PersistenceResult<()> {
        match self {
            SaveHandle::Immediate(store) => store.save_cached(),
            SaveHandle::Queued { store, sender } => {
                let (ack_sender, ack_receiver) = bounded(1);
                if sender.send(SaveRequest::Flush(ack_sender)).is_err() {
                    return store.save_cached();
                }
                match ack_receiver.recv() {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(message)) => Err(save_error(&store.layout().primary, message)),
                    Err(_) => store.save_cached(),
                }
            }
            SaveHandle::Disabled => Ok(()),
        }
    }
}

impl std::fmt::Debug for SaveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveHandle::Immediate(_) => write!(f, "SaveHandle::Immediate"),
            SaveHandle::Queued { .. } => write!(f, "SaveHandle::Queued"),
            SaveHandle::Disabled => write!(f, "SaveHandle::Disabled"),
        }
    }
}

/// Background worker that writes the store out
///
/// Saves run periodically and after mutations. Requests that queue up while a
/// save is running are folded into the next single save.
pub struct SaveManager {
    store: Arc<GeneratorStore>,
    sender: Sender<SaveRequest>,
    save_thread: Option<thread::JoinHandle<()>>,
}

impl SaveManager {
    /// Spawn the worker; `interval` is the periodic save period
    pub fn start(store: Arc<GeneratorStore>, interval: Duration) -> PersistenceResult<Self> {
        let (sender, receiver) = unbounded();
        let worker_store = Arc::clone(&store);
        let save_thread = thread::Builder::new()
            .name("generator-save".to_string())
            .spawn(move || save_loop(worker_store, receiver, interval))
            .persistence_context("Failed to spawn save worker")?;

        log::info!("Auto-save scheduled every {} seconds", interval.as_secs());
        Ok(Self {
            store,
            sender,
            save_thread: Some(save_thread),
        })
    }

    /// Handle for a registry that should save through this worker
    pub fn handle(&self) -> SaveHandle {
        SaveHandle::Queued {
            store: Arc::clone(&self.store),
            sender: self.sender.clone(),
        }
    }

    pub fn request_save(&self) -> PersistenceResult<()> {
        self.handle().request()
    }

    /// Save now and wait for the worker to finish
    pub fn flush(&self) -> PersistenceResult<()> {
        self.handle().flush()
    }

    pub fn is_running(&self) -> bool {
        self.save_thread.is_some()
    }

    /// Run a final save and join the worker
    pub fn stop(&mut self) -> PersistenceResult<()> {
        let Some(save_thread) = self.save_thread.take() else {
            return Ok(());
        };

        if self.sender.send(SaveRequest::Shutdown).is_err() {
            log::warn!("Save worker exited early, running final save here");
            self.store.save_cached()?;
        }
        if save_thread.join().is_err() {
            log::error!("Save worker panicked");
            return self.store.save_cached();
        }
        Ok(())
    }
}

impl Drop for SaveManager {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("Final save failed: {}", e);
        }
    }
}

fn save_loop(store: Arc<GeneratorStore>, receiver: Receiver<SaveRequest>, interval: Duration) {
    loop {
        let first = match receiver.recv_timeout(interval) {
            Ok(request) => request,
            Err(RecvTimeoutError::Timeout) => {
                if store.cached_count() > 0 {
                    log::debug!("Running periodic save");
                    if let Err(e) = store.save_cached() {
                        log::warn!("Periodic save failed, will retry next interval: {}", e);
                    }
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => {
                if let Err(e) = store.save_cached() {
                    log::warn!("Final save after handles were dropped failed: {}", e);
                }
                break;
            }
        };

        // Fold everything already queued into one save
        let mut shutdown = false;
        let mut acks = Vec::new();
        let mut coalesced = 0usize;
        for request in std::iter::once(first).chain(receiver.try_iter()) {
            coalesced += 1;
            match request {
                SaveRequest::Save => {}
                SaveRequest::Flush(ack) => acks.push(ack),
                SaveRequest::Shutdown => shutdown = true,
            }
        }

        let started = Instant::now();
        let result = store.save_cached().map_err(|e| e.to_string());
        log::debug!(
            "Save for {} requests finished in {:?}",
            coalesced,
            started.elapsed()
        );
        for ack in acks {
            let _ = ack.send(result.clone());
        }

        if shutdown {
            log::info!("Save worker stopped");
            break;
        }
    }
}
