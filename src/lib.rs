//! Mutation-tracked key-value store with debounced JSON persistence.
//!
//! Values handed out by the store are write-through handles: mutate one and
//! the store marks itself dirty, a background worker flushes dirty state to
//! the backing file on a timer, and dropping the store runs one final
//! synchronous flush. Persistence failures flow to a per-store error sink
//! instead of crashing the host.
//!
//! ```rust,no_run
//! let db = json_backed::file("state.json");
//! db.load();
//!
//! let user = db.set("user", serde_json::json!({"visits": 1})).unwrap();
//! user.set("visits", 2).unwrap(); // store is now dirty; the timer flushes it
//! db.save(true); // or flush right now
//! ```
//!
//! **Single-process only.** If multiple processes open the same file they
//! will clobber each other. Use advisory file locking or a real database
//! for multi-process access.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod flush;
pub mod persist;
pub mod serializer;
pub mod store;
pub mod track;

pub use error::{ErrorSink, Result, StoreError};
pub use serializer::{JsonCodec, WireCodec};
pub use store::{file, memory, Store, StoreBuilder, StoreHandle, DEFAULT_SYNC_INTERVAL};
pub use track::{wrap, DeferredQueue, Delivery, Handle, Hook, Notifier, Tracked};
