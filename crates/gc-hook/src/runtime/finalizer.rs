//! Finalizer - Background Collection Turns
//!
//! Runs collection turns on a registry from a dedicated thread, so callbacks
//! fire without the application polling `Registry::tick` itself.
//!
//! Each turn sweeps the registry for unreachable targets and drains the
//! callbacks that became due. Turns are spaced by the configured interval;
//! `stop` wakes the thread immediately through a channel instead of waiting
//! out the current sleep.
//!
//! Callback timing stays best-effort: a callback scheduled right before
//! `stop` may never run.

use crate::error::{HookError, Result};
use crate::registry::Registry;
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Finalizer - owner of the background collection thread
pub struct Finalizer {
    registry: Arc<Registry>,

    /// Delay between turns
    interval: Duration,

    /// Finalizer thread handle
    thread_handle: Mutex<Option<JoinHandle<()>>>,

    /// Dropping the sender stops the thread
    shutdown: Mutex<Option<Sender<()>>>,

    /// Running flag
    running: Arc<AtomicBool>,

    /// Completed turns
    turns: Arc<AtomicUsize>,
}

impl Finalizer {
    /// Create new finalizer for `registry`
    pub fn new(registry: Arc<Registry>, interval: Duration) -> Self {
        Self {
            registry,
            interval,
            thread_handle: Mutex::new(None),
            shutdown: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
            turns: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Start finalizer thread
    pub fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(HookError::InvalidState {
                expected: "stopped finalizer".to_string(),
                actual: "running finalizer".to_string(),
            });
        }

        let (tx, rx) = channel::bounded::<()>(1);
        let registry = self.registry.clone();
        let turns = self.turns.clone();
        let interval = self.interval;

        let spawned = std::thread::Builder::new()
            .name("gc-hook-finalizer".to_string())
            .spawn(move || loop {
                match rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let fired = registry.tick();
                        turns.fetch_add(1, Ordering::Relaxed);
                        if fired > 0 {
                            log::debug!("gc-hook finalizer: {} callbacks fired", fired);
                        }
                    },
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            });

        match spawned {
            Ok(handle) => {
                *self.thread_handle.lock() = Some(handle);
                *self.shutdown.lock() = Some(tx);
                Ok(())
            },
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(HookError::Internal(format!(
                    "failed to spawn finalizer thread: {}",
                    e
                )))
            },
        }
    }

    /// Stop finalizer thread
    ///
    /// Stopping a finalizer that is not running is a no-op. Called from a
    /// callback on the finalizer thread itself, the thread is signalled but
    /// not joined; it exits once the current turn returns.
    pub fn stop(&self) -> Result<()> {
        if let Some(tx) = self.shutdown.lock().take() {
            // A full buffer means a stop signal is already queued.
            let _ = tx.try_send(());
        }

        let handle = self.thread_handle.lock().take();
        self.running.store(false, Ordering::Release);

        if let Some(handle) = handle {
            if handle.thread().id() == std::thread::current().id() {
                log::debug!("gc-hook finalizer stopped from its own thread");
                return Ok(());
            }
            handle
                .join()
                .map_err(|_| HookError::Internal("finalizer thread panicked".to_string()))?;
        }

        Ok(())
    }

    /// Check if the thread is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Completed collection turns
    pub fn turns(&self) -> usize {
        self.turns.load(Ordering::Relaxed)
    }

    /// Registry this finalizer drives
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl Drop for Finalizer {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("gc-hook finalizer shutdown failed: {}", e);
        }
    }
}
