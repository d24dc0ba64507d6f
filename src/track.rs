//! Mutation-tracked handles over shared JSON values.
//!
//! [`wrap`] turns a plain attribute bag (a JSON object) into a [`Tracked`]
//! handle that writes through to the shared underlying value and invokes a
//! caller-supplied notifier exactly once per mutating call. Values that are
//! not plain bags (arrays, strings, numbers) pass through untracked;
//! mutations on them are invisible to the notifier.
//!
//! The store uses this to mark itself dirty whenever a value obtained from
//! `get`/`set` is mutated, without callers ever calling an explicit
//! "mark dirty".

use crate::error::{Result, StoreError};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{mpsc, Arc};

/// Callback invoked after a tracked mutation has been applied.
pub type Hook = Arc<dyn Fn() + Send + Sync>;

/// Shared slot holding the real value. Handles and the store's map point at
/// the same slot, which is what makes write-through possible.
pub(crate) type Slot = Arc<RwLock<Value>>;

// ---------------------------------------------------------------------------
// Notification delivery
// ---------------------------------------------------------------------------

/// FIFO queue of pending notifications for deferred delivery.
///
/// Mutations push their hook onto the queue; [`drain`](Self::drain) later
/// invokes the hooks in the order the mutations were issued. No ordering is
/// guaranteed relative to unrelated work.
#[derive(Clone)]
pub struct DeferredQueue {
    tx: mpsc::Sender<Hook>,
    rx: Arc<Mutex<mpsc::Receiver<Hook>>>,
}

impl DeferredQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    fn push(&self, hook: Hook) {
        // receiver lives as long as self, so the send cannot fail
        let _ = self.tx.send(hook);
    }

    /// Deliver every pending notification in mutation order. Returns how many
    /// hooks ran.
    pub fn drain(&self) -> usize {
        let rx = self.rx.lock();
        let mut delivered = 0;
        while let Ok(hook) = rx.try_recv() {
            (*hook)();
            delivered += 1;
        }
        delivered
    }
}

impl Default for DeferredQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DeferredQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredQueue").finish_non_exhaustive()
    }
}

/// When the notifier's hook runs relative to the mutating call.
#[derive(Clone)]
pub enum Delivery {
    /// Run the hook inline, inside the mutating call.
    Inline,
    /// Queue the notification; the owner of the [`DeferredQueue`] delivers it
    /// later via [`DeferredQueue::drain`].
    Deferred(DeferredQueue),
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Delivery::Inline => f.write_str("Inline"),
            Delivery::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

/// A mutation callback plus its delivery mode.
#[derive(Clone)]
pub struct Notifier {
    hook: Hook,
    delivery: Delivery,
}

impl Notifier {
    /// Notifier whose hook runs inline with each mutating call.
    pub fn inline(hook: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            hook: Arc::new(hook),
            delivery: Delivery::Inline,
        }
    }

    /// Notifier whose hook is queued on `queue` and runs when the queue is
    /// drained.
    pub fn deferred(hook: impl Fn() + Send + Sync + 'static, queue: &DeferredQueue) -> Self {
        Self {
            hook: Arc::new(hook),
            delivery: Delivery::Deferred(queue.clone()),
        }
    }

    fn notify(&self) {
        match &self.delivery {
            Delivery::Inline => (*self.hook)(),
            Delivery::Deferred(queue) => queue.push(Arc::clone(&self.hook)),
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("delivery", &self.delivery)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// A value as handed out by the store.
///
/// Plain attribute bags come back as [`Handle::Tracked`] — a write-through
/// view whose mutations notify. Anything else (arrays, strings, numbers,
/// null) comes back as [`Handle::Untracked`]: a detached clone with no
/// attributes to mutate, invisible to the notifier. That asymmetry is a
/// stated limitation of the tracking model.
#[derive(Debug, Clone)]
pub enum Handle {
    /// Write-through handle over a shared attribute bag.
    Tracked(Tracked),
    /// Detached clone of a value the tracker does not support.
    Untracked(Value),
}

impl Handle {
    /// `true` when mutations through this handle reach the shared value.
    #[must_use]
    pub fn is_tracked(&self) -> bool {
        matches!(self, Handle::Tracked(_))
    }

    /// Read an attribute as a cloned value.
    #[must_use]
    pub fn get(&self, attr: &str) -> Option<Value> {
        match self {
            Handle::Tracked(t) => t.get(attr),
            Handle::Untracked(_) => None,
        }
    }

    /// Descend into a nested attribute. A nested bag comes back as a further
    /// tracked handle over the *same* underlying object (no copy), so
    /// mutating two levels deep still notifies. Non-bag attributes come back
    /// untracked.
    #[must_use]
    pub fn child(&self, attr: &str) -> Option<Handle> {
        match self {
            Handle::Tracked(t) => t.child(attr),
            Handle::Untracked(_) => None,
        }
    }

    /// Assign an attribute. Returns `Ok(true)` when the mutation reached the
    /// underlying value (and the notifier ran), `Ok(false)` when this handle
    /// has no target to mutate.
    pub fn set(&self, attr: &str, value: impl Serialize) -> Result<bool> {
        match self {
            Handle::Tracked(t) => t.set(attr, value),
            Handle::Untracked(_) => Ok(false),
        }
    }

    /// Delete an attribute, returning its previous value. Notifies whenever
    /// the underlying bag was reached, even if the attribute was absent.
    pub fn remove(&self, attr: &str) -> Option<Value> {
        match self {
            Handle::Tracked(t) => t.remove(attr),
            Handle::Untracked(_) => None,
        }
    }

    /// Mutate the underlying bag through a closure. One mutating operation,
    /// one notification. Returns `false` when there is no target.
    pub fn update(&self, f: impl FnOnce(&mut Map<String, Value>)) -> bool {
        match self {
            Handle::Tracked(t) => t.update(f),
            Handle::Untracked(_) => false,
        }
    }

    /// Attribute names, in the bag's current order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        match self {
            Handle::Tracked(t) => t.keys(),
            Handle::Untracked(_) => Vec::new(),
        }
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Handle::Tracked(t) => t.len(),
            Handle::Untracked(_) => 0,
        }
    }

    /// `true` when the handle has no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` when the attribute exists.
    #[must_use]
    pub fn contains(&self, attr: &str) -> bool {
        match self {
            Handle::Tracked(t) => t.contains(attr),
            Handle::Untracked(_) => false,
        }
    }

    /// Snapshot of the current value. For a tracked handle whose target no
    /// longer exists (a parent attribute was removed), this is `Null`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Handle::Tracked(t) => t.to_value(),
            Handle::Untracked(v) => v.clone(),
        }
    }
}

/// Write-through handle over a shared attribute bag.
///
/// Every mutating call applies to the real object first, then notifies
/// exactly once. N mutations in a row produce N notifications; there is no
/// batching.
#[derive(Clone)]
pub struct Tracked {
    slot: Slot,
    path: Vec<String>,
    notifier: Notifier,
}

impl Tracked {
    /// Walk to the bag this handle addresses and run `f` on it. `None` when
    /// the path no longer leads to a bag (a parent was removed or retyped
    /// since the handle was created).
    fn with_target<R>(&self, f: impl FnOnce(&mut Map<String, Value>) -> R) -> Option<R> {
        let mut guard = self.slot.write();
        let mut cur: &mut Value = &mut guard;
        for seg in &self.path {
            cur = cur.get_mut(seg)?;
        }
        cur.as_object_mut().map(f)
    }

    fn read_target<R>(&self, f: impl FnOnce(&Map<String, Value>) -> R) -> Option<R> {
        let guard = self.slot.read();
        let mut cur: &Value = &guard;
        for seg in &self.path {
            cur = cur.get(seg)?;
        }
        cur.as_object().map(f)
    }

    /// Read an attribute as a cloned value.
    #[must_use]
    pub fn get(&self, attr: &str) -> Option<Value> {
        self.read_target(|bag| bag.get(attr).cloned()).flatten()
    }

    /// Handle over a nested attribute; see [`Handle::child`].
    #[must_use]
    pub fn child(&self, attr: &str) -> Option<Handle> {
        let is_bag = self
            .read_target(|bag| bag.get(attr).map(Value::is_object))
            .flatten()?;
        if is_bag {
            // same slot, one segment deeper: the child writes through to the
            // identical underlying object
            let mut path = self.path.clone();
            path.push(attr.to_string());
            Some(Handle::Tracked(Tracked {
                slot: Arc::clone(&self.slot),
                path,
                notifier: self.notifier.clone(),
            }))
        } else {
            self.get(attr).map(Handle::Untracked)
        }
    }

    /// Assign an attribute; see [`Handle::set`].
    pub fn set(&self, attr: &str, value: impl Serialize) -> Result<bool> {
        let value =
            serde_json::to_value(value).map_err(|e| StoreError::InvalidArgument(e.to_string()))?;
        let applied = self
            .with_target(|bag| {
                bag.insert(attr.to_string(), value);
            })
            .is_some();
        if applied {
            self.notifier.notify();
        }
        Ok(applied)
    }

    /// Delete an attribute; see [`Handle::remove`].
    pub fn remove(&self, attr: &str) -> Option<Value> {
        match self.with_target(|bag| bag.remove(attr)) {
            Some(prev) => {
                // the delete reached the real object: notify even when the
                // attribute was already absent
                self.notifier.notify();
                prev
            }
            None => None,
        }
    }

    /// Closure mutation; see [`Handle::update`].
    pub fn update(&self, f: impl FnOnce(&mut Map<String, Value>)) -> bool {
        let applied = self.with_target(f).is_some();
        if applied {
            self.notifier.notify();
        }
        applied
    }

    /// Attribute names, in the bag's current order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.read_target(|bag| bag.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read_target(Map::len).unwrap_or(0)
    }

    /// `true` when the bag has no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` when the attribute exists.
    #[must_use]
    pub fn contains(&self, attr: &str) -> bool {
        self.read_target(|bag| bag.contains_key(attr))
            .unwrap_or(false)
    }

    /// Snapshot of the bag, `Null` when the target no longer exists.
    #[must_use]
    pub fn to_value(&self) -> Value {
        self.read_target(|bag| Value::Object(bag.clone()))
            .unwrap_or(Value::Null)
    }
}

impl std::fmt::Debug for Tracked {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracked")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Wrapping
// ---------------------------------------------------------------------------

/// Wrap `value` for mutation tracking.
///
/// A plain attribute bag becomes a [`Handle::Tracked`] write-through handle
/// that owns a fresh shared slot. Anything else is returned unchanged as
/// [`Handle::Untracked`] — tracking is best-effort, not guaranteed for
/// unsupported shapes.
#[must_use]
pub fn wrap(value: Value, notifier: Notifier) -> Handle {
    if value.is_object() {
        Handle::Tracked(Tracked {
            slot: Arc::new(RwLock::new(value)),
            path: Vec::new(),
            notifier,
        })
    } else {
        Handle::Untracked(value)
    }
}

/// Wrap an existing shared slot (the store's own entries).
pub(crate) fn from_slot(slot: Slot, notifier: Notifier) -> Handle {
    let tracked = slot.read().is_object();
    if tracked {
        Handle::Tracked(Tracked {
            slot,
            path: Vec::new(),
            notifier,
        })
    } else {
        let value = slot.read().clone();
        Handle::Untracked(value)
    }
}
