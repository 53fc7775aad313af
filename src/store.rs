//! Main SilenceStore tying records and expiry together.

use crate::codec::{decode_silences, encode_silences};
use crate::error::{Result, StoreError};
use crate::expiry::{ExpiryHandle, ExpiryScheduler};
use crate::types::{LabelSet, Silence, SilenceId};
use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Silence file used by [`SilenceStore::open`] and [`SilenceStore::persist`].
    pub path: PathBuf,

    /// Whether to create the file if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to hold an exclusive lock on `<path>.lock` while open.
    pub lock: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./silences.json"),
            create_if_missing: true,
            lock: true,
        }
    }
}

/// Answers whether an event is currently suppressed.
///
/// This is the contract the alert dispatch path depends on.
pub trait Inhibitor {
    /// The silence suppressing `event`, if any.
    fn is_inhibited(&self, event: &dyn LabelSet) -> Option<Silence>;
}

/// A stored silence together with its live expiry action.
struct StoredSilence {
    silence: Silence,
    expiry: ExpiryHandle,
}

#[derive(Default)]
struct StoreState {
    silences: HashMap<SilenceId, StoredSilence>,
    /// Highest ID handed out or seen so far.
    last_id: SilenceId,
}

impl StoreState {
    fn next_id(&mut self) -> Result<SilenceId> {
        self.last_id = self.last_id.next().ok_or(StoreError::IdsExhausted(self.last_id))?;
        Ok(self.last_id)
    }

    /// Remove a silence and stop its expiry action.
    fn remove(&mut self, id: SilenceId) -> Option<Silence> {
        let stored = self.silences.remove(&id)?;
        stored.expiry.stop();
        Some(stored.silence)
    }
}

struct Inner {
    config: StoreConfig,

    /// Records and ID counter, guarded by the single store lock.
    state: Mutex<StoreState>,

    scheduler: ExpiryScheduler,

    /// Lock file for exclusive access (only for stores opened from disk).
    _lock_file: Option<File>,
}

/// The silence registry.
///
/// Owns every silence and its expiry action. All operations take one lock
/// for their full duration, so none of them observes a partial update.
/// Cloning is cheap and yields another handle to the same store; the
/// expiry worker stops when the last clone is dropped.
#[derive(Clone)]
pub struct SilenceStore {
    inner: Arc<Inner>,
}

impl SilenceStore {
    /// Create an empty in-memory store with the default config.
    pub fn new() -> Result<Self> {
        Self::with_config(StoreConfig::default())
    }

    /// Create an empty in-memory store. Nothing is read from or written to
    /// `config.path` until [`persist`](Self::persist) is called.
    pub fn with_config(config: StoreConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Open the silence file at `config.path`, creating it if allowed.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let exists = config.path.exists();
        if !exists {
            if !config.create_if_missing {
                return Err(StoreError::NotInitialized(config.path));
            }
            if let Some(parent) = config.path.parent() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_file = if config.lock {
            Some(Self::acquire_lock(&config.path)?)
        } else {
            None
        };

        let store = Self::build(config, lock_file)?;
        if exists {
            store.load_from_file(&store.inner.config.path)?;
        } else {
            store.persist()?;
        }

        Ok(store)
    }

    fn build(config: StoreConfig, lock_file: Option<File>) -> Result<Self> {
        let (scheduler, worker) = ExpiryScheduler::new();

        let inner = Arc::new(Inner {
            config,
            state: Mutex::new(StoreState::default()),
            scheduler,
            _lock_file: lock_file,
        });

        // Expiry goes back through the store itself; the worker must not keep
        // the store alive.
        let weak: Weak<Inner> = Arc::downgrade(&inner);
        let thread = worker.spawn(move |id, handle| {
            if let Some(inner) = weak.upgrade() {
                SilenceStore { inner }.expire(id, handle);
            }
        })?;
        inner.scheduler.attach(thread);

        Ok(Self { inner })
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_path = sibling_path(path, ".lock");
        let lock_file = File::create(&lock_path)?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked(lock_path))?;

        Ok(lock_file)
    }

    /// The configuration this store was created with.
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    // --- Record Operations ---

    /// Add a silence and arm its expiry.
    ///
    /// An unset ID is replaced by the next counter value. An explicit ID
    /// advances the counter if it is higher, and replaces any silence already
    /// stored under it.
    ///
    /// Fails with [`StoreError::IdsExhausted`] when an ID must be allocated
    /// but the counter already sits at `u64::MAX`; the store is unchanged.
    pub fn add(&self, mut silence: Silence) -> Result<SilenceId> {
        let mut state = self.inner.state.lock();

        if silence.id.is_unset() {
            silence.id = state.next_id()?;
        } else if silence.id > state.last_id {
            state.last_id = silence.id;
        }

        let id = silence.id;
        let expiry = self.inner.scheduler.arm(id, silence.ends_at);
        let ends_at = silence.ends_at;

        if let Some(previous) = state.silences.insert(id, StoredSilence { silence, expiry }) {
            previous.expiry.stop();
            debug!(silence_id = %id, "replaced existing silence");
        }

        debug!(silence_id = %id, ends_at = %ends_at, "added silence");
        Ok(id)
    }

    /// Replace a stored silence wholesale and re-arm its expiry.
    pub fn update(&self, silence: Silence) -> Result<()> {
        let mut state = self.inner.state.lock();

        let id = silence.id;
        let stored = state
            .silences
            .get_mut(&id)
            .ok_or(StoreError::SilenceNotFound(id))?;

        // Stop first so the old action can never remove the refreshed record.
        stored.expiry.stop();
        stored.expiry = self.inner.scheduler.arm(id, silence.ends_at);
        stored.silence = silence;

        debug!(silence_id = %id, ends_at = %stored.silence.ends_at, "updated silence");
        Ok(())
    }

    /// Get a silence by ID.
    pub fn get(&self, id: SilenceId) -> Result<Silence> {
        self.inner
            .state
            .lock()
            .silences
            .get(&id)
            .map(|stored| stored.silence.clone())
            .ok_or(StoreError::SilenceNotFound(id))
    }

    /// Delete a silence and cancel its expiry.
    pub fn delete(&self, id: SilenceId) -> Result<()> {
        let mut state = self.inner.state.lock();
        state.remove(id).ok_or(StoreError::SilenceNotFound(id))?;

        debug!(silence_id = %id, "deleted silence");
        Ok(())
    }

    /// Snapshot of every stored silence, in no particular order.
    pub fn list(&self) -> Vec<Silence> {
        self.inner
            .state
            .lock()
            .silences
            .values()
            .map(|stored| stored.silence.clone())
            .collect()
    }

    /// Number of stored silences.
    pub fn len(&self) -> usize {
        self.inner.state.lock().silences.len()
    }

    /// Whether the store holds no silences.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find a silence whose filters handle `event`.
    ///
    /// Silences are scanned in hash map order and the first match wins.
    /// When several silences match, which one is returned is unspecified.
    pub fn is_inhibited<E: LabelSet + ?Sized>(&self, event: &E) -> Option<Silence> {
        self.inner
            .state
            .lock()
            .silences
            .values()
            .find(|stored| stored.silence.filters.handles(event))
            .map(|stored| stored.silence.clone())
    }

    // --- Lifecycle ---

    /// Stop every expiry action. Silences stay in the store.
    pub fn close(&self) {
        let state = self.inner.state.lock();
        let disarmed = state
            .silences
            .values()
            .filter(|stored| stored.expiry.stop())
            .count();

        info!(disarmed, retained = state.silences.len(), "closed silence store");
    }

    /// Remove every silence and cancel their expiry. Returns how many were
    /// removed. The ID counter is not reset.
    pub fn clear(&self) -> usize {
        let mut state = self.inner.state.lock();
        let removed = state.silences.len();
        for (_, stored) in state.silences.drain() {
            stored.expiry.stop();
        }

        info!(removed, "cleared silence store");
        removed
    }

    /// Expiry callback: removes the silence if `handle` is still its live
    /// action.
    fn expire(&self, id: SilenceId, handle: &ExpiryHandle) {
        let mut state = self.inner.state.lock();

        let is_current = match state.silences.get(&id) {
            Some(stored) => stored.expiry.same_action(handle),
            None => {
                warn!(
                    silence_id = %id,
                    ends_at = %handle.deadline(),
                    "failed to delete expired silence: {}",
                    StoreError::SilenceNotFound(id)
                );
                return;
            }
        };

        // A stopped handle lost a race with update, delete or close.
        if !is_current || !handle.stop() {
            debug!(silence_id = %id, ends_at = %handle.deadline(), "skipping stale expiry");
            return;
        }

        state.remove(id);
        info!(silence_id = %id, ends_at = %handle.deadline(), "silence expired");
    }

    // --- Persistence ---

    /// Load a JSON array of silences and add each of them.
    ///
    /// The document is decoded as a whole before anything is added, so a
    /// malformed file leaves the store untouched. An add that runs out of
    /// IDs stops the load; silences added before it stay. Returns the number
    /// of silences added.
    pub fn load_from_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let silences = decode_silences(&bytes)?;

        let count = silences.len();
        for silence in silences {
            self.add(silence)?;
        }

        info!(path = %path.display(), count, "loaded silences");
        Ok(count)
    }

    /// Write a snapshot of all silences to `path` as a JSON array.
    ///
    /// The file is replaced atomically via a sibling temp file.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let silences = self.list();
        let encoded = encode_silences(&silences)?;

        let tmp_path = sibling_path(path, ".tmp");
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)?;
            file.write_all(&encoded)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;

        info!(path = %path.display(), count = silences.len(), "saved silences");
        Ok(())
    }

    /// Save to the configured path.
    pub fn persist(&self) -> Result<()> {
        self.save_to_file(&self.inner.config.path)
    }
}

impl Inhibitor for SilenceStore {
    fn is_inhibited(&self, event: &dyn LabelSet) -> Option<Silence> {
        SilenceStore::is_inhibited(self, event)
    }
}

impl fmt::Debug for SilenceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SilenceStore")
            .field("path", &self.inner.config.path)
            .field("silences", &self.len())
            .finish()
    }
}

/// `path` with `suffix` appended to its file name.
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
