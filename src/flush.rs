//! The periodic flush worker.
//!
//! One background thread per store: it wakes on a timer or when nudged
//! through the store's trigger channel, and hands control back to the store
//! with the reason for the wake-up. Dropping the worker joins the thread so
//! nothing leaks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Why the worker woke up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// Explicit nudge from a non-blocking `save`: flush unconditionally.
    Nudge,
    /// Timer tick: flush only if something changed since the last flush.
    Tick,
}

/// Background thread driving the debounced flush.
///
/// The caller keeps the sender side of the channel and drops it when the
/// store closes — that, or the stop flag, ends the loop. A nudge that
/// arrives while the worker is busy writing is silently dropped; the dirty
/// flag stays set, so the next timer tick catches up.
pub struct FlushWorker {
    stop: Arc<AtomicBool>,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl FlushWorker {
    /// Spawn a worker using an externally-created channel.
    pub fn start_with_receiver<F>(interval: Duration, flush_fn: F, rx: mpsc::Receiver<()>) -> Self
    where
        F: Fn(Wake) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let join_handle = thread::spawn(move || loop {
            if stop_flag.load(Ordering::Relaxed) {
                break;
            }
            match rx.recv_timeout(interval) {
                Ok(()) => flush_fn(Wake::Nudge),
                Err(mpsc::RecvTimeoutError::Timeout) => flush_fn(Wake::Tick),
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        });

        Self {
            stop,
            join_handle: Some(join_handle),
        }
    }
}

impl Drop for FlushWorker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.join_handle.take() {
            let _ = h.join();
        }
    }
}
