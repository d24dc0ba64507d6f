//! Core store type, builder, and the handle that owns its flush worker.

use crate::backend::{File, Memory, StorageBackend};
use crate::error::{default_sink, ErrorSink, Result, StoreError};
use crate::flush::{FlushWorker, Wake};
use crate::serializer::JsonCodec;
use crate::track::{self, Handle, Notifier};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{Map, Value};
use shardmap::ShardMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

/// Interval between periodic flush checks when the builder doesn't set one.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Dirty bookkeeping shared between the store and the handles it gives out.
///
/// Invariant: the store is dirty exactly when `generation != flushed`.
/// `generation` bumps on every mutation; `flushed` records the generation a
/// successful flush captured. A mutation landing after a flush's snapshot
/// bumps `generation` past what that flush will record, so its signal
/// survives the flush completing — no write is ever silently lost.
#[derive(Default)]
struct DirtySignal {
    generation: AtomicU64,
    flushed: AtomicU64,
}

impl DirtySignal {
    fn mark(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    fn is_dirty(&self) -> bool {
        self.generation.load(Ordering::Acquire) != self.flushed.load(Ordering::Acquire)
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn record_flush(&self, generation: u64) {
        self.flushed.store(generation, Ordering::Release);
    }
}

/// Mutation-tracked key-value store with debounced persistence.
///
/// Values are JSON attribute bags. `get` and `set` hand out [`Handle`]s that
/// write through to the stored value and mark the store dirty on every
/// mutation; a background worker flushes the whole map to the backend when
/// the store is dirty, bounding data loss on abnormal termination to one
/// flush interval.
///
/// Backend failures are reported through the store's error sink, never
/// raised from `save`/`load` — they are recoverable operational events.
pub struct Store {
    map: ShardMap<String, Arc<RwLock<Value>>>,
    backend: Box<dyn StorageBackend>,
    signal: Arc<DirtySignal>,
    closed: AtomicBool,
    sink: RwLock<ErrorSink>,
    trigger: Mutex<Option<mpsc::SyncSender<()>>>,
}

impl Store {
    /// Start configuring a new store. Call [`.build()`](StoreBuilder::build)
    /// when ready.
    #[must_use]
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    // ---- reads ----

    /// Tracked handle over the value for `key`, or `None` if absent.
    ///
    /// Mutations on the handle reach the stored value and mark the store
    /// dirty. Non-bag values (arrays, primitives) come back as detached
    /// untracked clones — mutations on those are invisible to the dirty
    /// flag, a stated limitation of the tracking model.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Handle> {
        self.map
            .get(&key.to_owned())
            .map(|slot| track::from_slot(slot, self.notifier()))
    }

    /// `true` if the key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.map.get(&key.to_owned()).is_some()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// `true` when the store has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.map.entries().into_iter().map(|(k, _)| k).collect()
    }

    /// `true` while there are mutations the backend hasn't seen.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.signal.is_dirty()
    }

    /// Path to the backing file, when this store has one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.backend.path()
    }

    // ---- writes ----

    /// Store `value` under `key` and return a tracked handle to it.
    ///
    /// The value is converted into the JSON object model first; a value that
    /// cannot convert (say, a map with non-string keys) fails with
    /// [`StoreError::InvalidArgument`] and nothing is stored — no partial
    /// write, no dirty flag change.
    pub fn set(&self, key: impl Into<String>, value: impl Serialize) -> Result<Handle> {
        let key = key.into();
        let value =
            serde_json::to_value(value).map_err(|e| StoreError::InvalidArgument(e.to_string()))?;
        self.signal.mark();
        self.map.insert(key.clone(), Arc::new(RwLock::new(value)));
        match self.map.get(&key) {
            Some(slot) => Ok(track::from_slot(slot, self.notifier())),
            // only reachable when a concurrent remove wins the race against
            // the re-read
            None => Ok(Handle::Untracked(Value::Null)),
        }
    }

    /// Remove `key`, returning its value if it was present. Marks the store
    /// dirty even when the key was absent — the flag means "might have
    /// changed".
    pub fn remove(&self, key: &str) -> Option<Value> {
        let prev = self
            .map
            .remove(&key.to_owned())
            .map(|slot| slot.read().clone());
        self.signal.mark();
        prev
    }

    // ---- iteration ----

    /// Visit every entry with a tracked handle. Iterates a snapshot, so the
    /// callback may mutate entries (marking the store dirty) or touch the
    /// store itself. Chainable.
    pub fn for_each(&self, mut f: impl FnMut(Handle, &str)) -> &Self {
        for (key, slot) in self.map.entries() {
            f(track::from_slot(slot, self.notifier()), &key);
        }
        self
    }

    /// Visit every entry without wrapping — read-only bulk consumption with
    /// no tracking overhead or side effects. Chainable.
    pub fn for_each_plain(&self, mut f: impl FnMut(&Value, &str)) -> &Self {
        for (key, slot) in self.map.entries() {
            f(&slot.read(), &key);
        }
        self
    }

    // ---- persistence ----

    /// Replace the store's contents from the backend.
    ///
    /// A successful load is clear-then-populate, never a merge. An
    /// unreadable target is reported to the sink and leaves the store empty
    /// (first runs with no file yet land here). Malformed content is
    /// reported and leaves the in-memory state untouched, so a corrupt file
    /// cannot destroy data the store already holds.
    pub fn load(&self) -> &Self {
        match self.backend.load() {
            Ok(entries) => {
                self.clear_map();
                for (key, value) in entries {
                    self.map.insert(key, Arc::new(RwLock::new(value)));
                }
            }
            Err(err @ StoreError::Access { .. }) => {
                self.report(&err);
                self.clear_map();
            }
            Err(err) => self.report(&err),
        }
        self
    }

    /// Flush the store to the backend.
    ///
    /// `sync = true` blocks until the write finishes and clears the dirty
    /// flag before returning on success. `sync = false` nudges the
    /// background worker and returns immediately; the flag clears only when
    /// that write completes, and a mutation racing the in-flight write
    /// leaves the store dirty so the next tick re-flushes. Write failures go
    /// to the error sink, never to the caller.
    ///
    /// After [`StoreHandle::close`] this is a permanent no-op by contract.
    pub fn save(&self, sync: bool) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if sync {
            self.flush_once();
        } else if let Some(trigger) = &*self.trigger.lock() {
            // a dropped nudge means the worker is mid-write; dirty stays set
            // and the next tick catches up
            let _ = trigger.try_send(());
        }
    }

    /// Install the error callback, replacing whichever one was active.
    /// Exactly one sink is active at a time; last registration wins.
    pub fn on_error(&self, f: impl Fn(&StoreError) + Send + Sync + 'static) -> &Self {
        *self.sink.write() = Arc::new(f);
        self
    }

    // ---- internal ----

    fn notifier(&self) -> Notifier {
        let signal = Arc::clone(&self.signal);
        Notifier::inline(move || signal.mark())
    }

    fn clear_map(&self) {
        for (key, _) in self.map.entries() {
            self.map.remove(&key);
        }
    }

    fn snapshot(&self) -> Map<String, Value> {
        let mut out = Map::new();
        for (key, slot) in self.map.entries() {
            out.insert(key, slot.read().clone());
        }
        out
    }

    /// One whole-map flush. The synchronous path runs this inline and has
    /// therefore cleared the flag by the time `save(true)` returns; the
    /// worker runs it in the background and clears only on completion. Both
    /// record the generation captured at snapshot time, so a mutation
    /// arriving mid-write keeps the store dirty.
    pub(crate) fn flush_once(&self) {
        let generation = self.signal.generation();
        let snapshot = self.snapshot();
        match self.backend.persist(&snapshot) {
            Ok(()) => self.signal.record_flush(generation),
            // dirty stays set so a later flush retries
            Err(err) => self.report(&err),
        }
    }

    pub(crate) fn on_wake(&self, wake: Wake) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        match wake {
            Wake::Nudge => self.flush_once(),
            Wake::Tick => {
                if self.signal.is_dirty() {
                    tracing::debug!(target: "json_backed", backend = %self.backend.describe(), "periodic flush");
                    self.flush_once();
                }
            }
        }
    }

    fn report(&self, err: &StoreError) {
        // clone the sink out before invoking so a callback may re-register
        // without deadlocking
        let sink = Arc::clone(&self.sink.read());
        (*sink)(err);
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("backend", &self.backend.describe())
            .field("dirty", &self.is_dirty())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Store with no durable backing.
///
/// The periodic worker still runs, but flushes have nothing durable to do.
/// Useful in tests and wherever the dirty-tracking API is wanted without
/// persistence.
#[must_use]
pub fn memory() -> StoreHandle {
    Store::builder().build()
}

/// Store backed by a JSON file at `path`.
///
/// An empty path falls back to a memory store — never a file store without
/// a target. Call [`load`](Store::load) to populate from the file.
#[must_use]
pub fn file(path: impl AsRef<Path>) -> StoreHandle {
    Store::builder().path(path).build()
}

/// Configures and opens a [`Store`].
///
/// ```rust,no_run
/// use std::time::Duration;
///
/// let db = json_backed::Store::builder()
///     .path("state.json")
///     .interval(Duration::from_secs(5))
///     .build();
/// db.load();
/// ```
pub struct StoreBuilder {
    path: Option<PathBuf>,
    interval: Duration,
    pretty: bool,
    sink: Option<ErrorSink>,
}

impl StoreBuilder {
    fn new() -> Self {
        Self {
            path: None,
            interval: DEFAULT_SYNC_INTERVAL,
            pretty: true,
            sink: None,
        }
    }

    /// Back the store with the JSON file at `path`. An empty path keeps the
    /// memory backend.
    #[must_use]
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Interval between periodic flush checks (default 30 s). Shorter
    /// intervals bound data loss tighter at the cost of more I/O.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Write human-readable JSON with indentation (default) or compact
    /// single-line JSON.
    #[must_use]
    pub fn pretty(mut self, yes: bool) -> Self {
        self.pretty = yes;
        self
    }

    /// Install an error sink at construction instead of the default logging
    /// one.
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&StoreError) + Send + Sync + 'static) -> Self {
        self.sink = Some(Arc::new(f));
        self
    }

    /// Create the store and start its flush worker. Population from the
    /// backend is an explicit [`load`](Store::load).
    #[must_use]
    pub fn build(self) -> StoreHandle {
        let codec = if self.pretty {
            JsonCodec::new()
        } else {
            JsonCodec::compact()
        };
        let backend: Box<dyn StorageBackend> = match self.path {
            Some(p) if !p.as_os_str().is_empty() => Box::new(File::with_codec(p, codec)),
            _ => Box::new(Memory),
        };
        let sink = self
            .sink
            .unwrap_or_else(|| default_sink(backend.describe()));

        let (trigger, rx) = mpsc::sync_channel(0);
        let store = Arc::new(Store {
            map: ShardMap::default(),
            backend,
            signal: Arc::new(DirtySignal::default()),
            closed: AtomicBool::new(false),
            sink: RwLock::new(sink),
            trigger: Mutex::new(Some(trigger)),
        });

        let worker = {
            let store = Arc::clone(&store);
            FlushWorker::start_with_receiver(self.interval, move |wake| store.on_wake(wake), rx)
        };

        StoreHandle {
            inner: store,
            worker: Some(worker),
        }
    }
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StoreBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreBuilder")
            .field("path", &self.path)
            .field("interval", &self.interval)
            .field("pretty", &self.pretty)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Owns the store and its periodic flush worker.
///
/// Derefs to [`Store`] so store methods are called directly on it. Dropping
/// the handle runs [`close(true)`](Self::close) — scope exit is the
/// shutdown hook, giving every store exactly one final synchronous flush.
pub struct StoreHandle {
    inner: Arc<Store>,
    worker: Option<FlushWorker>,
}

impl StoreHandle {
    /// Shut the store down: disarm the periodic worker, run one final save,
    /// and turn subsequent [`save`](Store::save) calls into permanent
    /// no-ops. Idempotent — a second close does nothing.
    ///
    /// `sync = false` hands the final write to a detached thread and
    /// returns immediately; prefer `close(true)` on shutdown paths that
    /// must not lose data. Mutations made after close still land in memory
    /// but never reach the backend.
    pub fn close(&mut self, sync: bool) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // dropping the trigger disconnects the worker's channel; the drop
        // below then joins the thread promptly
        self.inner.trigger.lock().take();
        drop(self.worker.take());

        if sync {
            self.inner.flush_once();
        } else {
            let store = Arc::clone(&self.inner);
            std::thread::spawn(move || store.flush_once());
        }
    }
}

impl std::ops::Deref for StoreHandle {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Drop for StoreHandle {
    fn drop(&mut self) {
        self.close(true);
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&*self.inner, f)
    }
}
