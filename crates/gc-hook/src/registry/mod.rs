//! Finalization Registry
//!
//! Lets a caller learn that a value is no longer used, without the
//! observation itself keeping the value alive.
//!
//! `create` wraps the held value in a fresh `Proxy` (or takes a substitute
//! target from the caller) and records a `Weak` to that target. A
//! collection pass (`collect`) moves every registration whose target has no
//! strong reference left to the pending queue; a later turn (`run_pending`)
//! invokes the callbacks with the held value.
//!
//! Lifecycle of a registration:
//!
//! ```text
//!   create ──► Pending ──cancel(token)──► Cancelled
//!                 │
//!                 └──collect──► Scheduled ──run_pending──► Fired
//! ```
//!
//! `Cancelled` and `Fired` are terminal. A scheduled registration can no
//! longer be cancelled. Every registration is owned by exactly one of the
//! live list, the pending queue, or the stack frame running its callback, so
//! a callback cannot fire twice.
//!
//! Callbacks never run inside `create`, `cancel` or `collect`, and no lock is
//! held while they run: callbacks may register or cancel freely.

pub mod token;

pub use token::{Token, TokenKey};

use crate::config::HookConfig;
use crate::logging::{HookEvent, HookLogger};
use crate::proxy::{PassThrough, Proxy, ProxyHandler};
use parking_lot::Mutex;
use serde::Serialize;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use token::address_of;

/// Options for `Registry::create` and `Registry::create_returning`
///
/// # Examples
///
/// ```rust
/// use gc_hook::{HookOptions, Token};
///
/// let options: HookOptions<String> = HookOptions::new()
///     .token(Token::Disabled)
///     .debug(true)
///     .label("session");
/// assert!(options.token.is_disabled());
/// ```
pub struct HookOptions<H> {
    /// Emit a `Released` diagnostic before the callback runs
    pub debug: bool,

    /// Cancellation policy; defaults to the held value
    pub token: Token,

    /// Forwarding policy of the proxy built by `create`
    ///
    /// Ignored by `create_returning`.
    pub handler: Option<Arc<dyn ProxyHandler<H>>>,

    /// Text naming the held value in diagnostics
    pub label: Option<String>,
}

impl<H> HookOptions<H> {
    pub fn new() -> Self {
        Self {
            debug: false,
            token: Token::Held,
            handler: None,
            label: None,
        }
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn token(mut self, token: Token) -> Self {
        self.token = token;
        self
    }

    pub fn handler(mut self, handler: Arc<dyn ProxyHandler<H>>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl<H> Default for HookOptions<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Registrations ever created
    pub registered: usize,
    /// Registrations removed by `cancel`
    pub cancelled: usize,
    /// Registrations whose target was found unreachable
    pub collected: usize,
    /// Callbacks invoked, including the ones that panicked
    pub fired: usize,
    /// Callbacks that panicked
    pub failed: usize,
    /// Registrations still waiting for their target to go away
    pub live: usize,
    /// Registrations scheduled but not yet fired
    pub pending: usize,
}

struct Registration {
    id: u64,
    target: Weak<dyn Any + Send + Sync>,
    token: Option<TokenKey>,
    callback: Box<dyn FnOnce() + Send>,
    debug_label: Option<String>,
}

impl Registration {
    fn is_collected(&self) -> bool {
        self.target.strong_count() == 0
    }

    fn cancelled_by(&self, addr: usize) -> bool {
        matches!(&self.token, Some(key) if key.addr_eq(addr))
    }
}

/// Weak observer registry
///
/// # Examples
///
/// ```rust
/// use gc_hook::{HookOptions, Registry};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// let registry = Registry::new();
/// let fired = Arc::new(AtomicBool::new(false));
///
/// let flag = fired.clone();
/// let proxy = registry.create(
///     Arc::new(vec![1, 2, 3]),
///     move |held| flag.store(held.len() == 3, Ordering::SeqCst),
///     HookOptions::new(),
/// );
/// assert_eq!(proxy.len(), 3);
///
/// registry.tick();
/// assert!(!fired.load(Ordering::SeqCst));
///
/// std::mem::drop(proxy);
/// registry.tick();
/// assert!(fired.load(Ordering::SeqCst));
/// ```
pub struct Registry {
    entries: Mutex<Vec<Registration>>,
    pending: Mutex<VecDeque<Registration>>,
    next_id: AtomicU64,
    force_debug: bool,
    logger: Arc<HookLogger>,

    registered: AtomicUsize,
    cancelled: AtomicUsize,
    collected: AtomicUsize,
    fired: AtomicUsize,
    failed: AtomicUsize,
}

impl Registry {
    /// Create an empty registry with a default logger
    pub fn new() -> Self {
        Self::with_logger(Arc::new(HookLogger::default()))
    }

    /// Create an empty registry reporting to `logger`
    pub fn with_logger(logger: Arc<HookLogger>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            pending: Mutex::new(VecDeque::new()),
            next_id: AtomicU64::new(1),
            force_debug: false,
            logger,
            registered: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
            collected: AtomicUsize::new(0),
            fired: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    /// Create an empty registry from configuration
    pub fn from_config(config: &HookConfig) -> Self {
        let mut registry = Self::with_logger(Arc::new(HookLogger::new(config.logger.clone())));
        registry.force_debug = config.debug;
        registry
    }

    /// Logger receiving this registry's events
    pub fn logger(&self) -> &Arc<HookLogger> {
        &self.logger
    }

    /// Watch a fresh proxy around `hold`
    ///
    /// Returns the proxy. Once every clone of it is dropped and a collection
    /// turn runs, `on_collected` receives `hold`. The registry keeps `hold`
    /// alive until then.
    pub fn create<H, F>(&self, hold: Arc<H>, on_collected: F, options: HookOptions<H>) -> Arc<Proxy<H>>
    where
        H: Any + Send + Sync,
        F: FnOnce(Arc<H>) + Send + 'static,
    {
        let handler = options
            .handler
            .clone()
            .unwrap_or_else(|| Arc::new(PassThrough) as Arc<dyn ProxyHandler<H>>);
        let target = Arc::new(Proxy::with_handler(Arc::clone(&hold), handler));
        self.register(&target, hold, on_collected, options, true);
        target
    }

    /// Watch a caller-supplied `target` on behalf of `hold`
    ///
    /// Returns `target` itself. The callback fires after `target`, not
    /// `hold`, loses its last strong reference. Passing `hold` as its own
    /// target means the callback can never fire, since the registry keeps
    /// `hold` alive.
    pub fn create_returning<H, R, F>(
        &self,
        hold: Arc<H>,
        on_collected: F,
        target: Arc<R>,
        options: HookOptions<H>,
    ) -> Arc<R>
    where
        H: Any + Send + Sync,
        R: Any + Send + Sync,
        F: FnOnce(Arc<H>) + Send + 'static,
    {
        if address_of(&target) == address_of(&hold) {
            log::warn!(
                "gc-hook: target is the held value itself; its callback will never fire"
            );
        }
        self.register(&target, hold, on_collected, options, false);
        target
    }

    fn register<H, R, F>(
        &self,
        target: &Arc<R>,
        hold: Arc<H>,
        on_collected: F,
        options: HookOptions<H>,
        proxied: bool,
    ) where
        H: Any + Send + Sync,
        R: Any + Send + Sync,
        F: FnOnce(Arc<H>) + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = match options.token {
            Token::Held => Some(TokenKey::of(&hold)),
            Token::Disabled => None,
            Token::Key(key) => Some(key),
        };
        let debug_label = if options.debug || self.force_debug {
            Some(options.label.unwrap_or_else(|| {
                format!(
                    "{}@{:#x}",
                    std::any::type_name::<H>(),
                    address_of(&hold)
                )
            }))
        } else {
            None
        };
        let cancellable = token.is_some();
        let watched: Weak<R> = Arc::downgrade(target);
        let watched: Weak<dyn Any + Send + Sync> = watched;

        let registration = Registration {
            id,
            target: watched,
            token,
            callback: Box::new(move || on_collected(hold)),
            debug_label,
        };

        self.entries.lock().push(registration);
        self.registered.fetch_add(1, Ordering::Relaxed);
        self.logger.log(HookEvent::Registered {
            id,
            proxied,
            cancellable,
        });
    }

    /// Cancel every pending registration whose token is `token`
    ///
    /// Returns `true` if at least one registration was removed. Registrations
    /// made with `Token::Disabled`, already scheduled, or already fired are
    /// never matched. `gc_hook::drop` is the same operation on the
    /// process-wide registry.
    pub fn cancel<T: ?Sized>(&self, token: &Arc<T>) -> bool {
        let addr = address_of(token);
        let removed = self.extract(|r| r.cancelled_by(addr));
        if removed.is_empty() {
            return false;
        }

        self.cancelled.fetch_add(removed.len(), Ordering::Relaxed);
        for registration in &removed {
            self.logger.log(HookEvent::Cancelled { id: registration.id });
        }
        // Callbacks and held values are released here, outside the lock.
        true
    }

    /// Schedule the callbacks of every registration whose target is gone
    ///
    /// Returns the number of newly scheduled callbacks. Nothing runs yet.
    pub fn collect(&self) -> usize {
        let dead = self.extract(Registration::is_collected);
        if dead.is_empty() {
            return 0;
        }

        let count = dead.len();
        for registration in &dead {
            self.logger.log(HookEvent::Collected { id: registration.id });
        }
        self.collected.fetch_add(count, Ordering::Relaxed);
        self.pending.lock().extend(dead);
        count
    }

    /// Run every scheduled callback
    ///
    /// Callbacks scheduled by the callbacks themselves run in the same turn.
    /// Returns the number of callbacks invoked.
    pub fn run_pending(&self) -> usize {
        let mut count = 0;
        loop {
            let next = self.pending.lock().pop_front();
            match next {
                Some(registration) => {
                    self.fire(registration);
                    count += 1;
                },
                None => return count,
            }
        }
    }

    /// One scheduler turn: `collect` followed by `run_pending`
    pub fn tick(&self) -> usize {
        self.collect();
        self.run_pending()
    }

    fn fire(&self, registration: Registration) {
        let Registration {
            id,
            callback,
            debug_label,
            ..
        } = registration;

        if let Some(label) = debug_label {
            self.logger.log(HookEvent::Released { id, label });
        }

        self.fired.fetch_add(1, Ordering::Relaxed);
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(callback)) {
            let message = panic_message(payload.as_ref());
            self.failed.fetch_add(1, Ordering::Relaxed);
            self.logger.log(HookEvent::CallbackPanicked { id, message });
        }
    }

    fn extract(&self, mut pred: impl FnMut(&Registration) -> bool) -> Vec<Registration> {
        let mut entries = self.entries.lock();
        if !entries.iter().any(&mut pred) {
            return Vec::new();
        }
        let (taken, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut *entries).into_iter().partition(|r| pred(r));
        *entries = kept;
        taken
    }

    /// Registrations still waiting for their target to go away
    pub fn live_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Callbacks scheduled but not yet run
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn has_pending(&self) -> bool {
        self.pending_count() > 0
    }

    /// Snapshot of the registry counters
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            registered: self.registered.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            collected: self.collected.load(Ordering::Relaxed),
            fired: self.fired.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            live: self.live_count(),
            pending: self.pending_count(),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
