//! Process-wide registry, handle table and tracker
//!
//! The free functions here operate on singletons created on first use from
//! `HookConfig::from_env`. Nothing fires in the background until a runtime
//! is started with `gc_hook::init` or the caller ticks the registry.

use crate::config::HookConfig;
use crate::error::Result;
use crate::handle::{Handle, HandleTable};
use crate::proxy::Proxy;
use crate::registry::{HookOptions, Registry};
use crate::track::Tracker;
use lazy_static::lazy_static;
use std::any::Any;
use std::sync::Arc;

lazy_static! {
    static ref CONFIG: HookConfig = {
        let config = HookConfig::from_env();
        match config.validate() {
            Ok(()) => config,
            Err(e) => {
                log::warn!("gc-hook: ignoring environment configuration: {}", e);
                HookConfig::default()
            },
        }
    };
    static ref REGISTRY: Arc<Registry> = Arc::new(Registry::from_config(&CONFIG));
    static ref HANDLES: Arc<HandleTable> = Arc::new(HandleTable::with_limit(CONFIG.handle_limit));
    static ref TRACKER: Tracker = Tracker::new();
}

/// Configuration the singletons were built from
pub fn config() -> &'static HookConfig {
    &CONFIG
}

/// The process-wide registry
pub fn registry() -> &'static Arc<Registry> {
    &REGISTRY
}

/// The process-wide handle table
pub fn handles() -> &'static Arc<HandleTable> {
    &HANDLES
}

/// `Registry::create` on the process-wide registry
pub fn create<H, F>(hold: Arc<H>, on_collected: F, options: HookOptions<H>) -> Arc<Proxy<H>>
where
    H: Any + Send + Sync,
    F: FnOnce(Arc<H>) + Send + 'static,
{
    REGISTRY.create(hold, on_collected, options)
}

/// `Registry::create_returning` on the process-wide registry
pub fn create_returning<H, R, F>(
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
    REGISTRY.create_returning(hold, on_collected, target, options)
}

/// `Registry::cancel` on the process-wide registry
pub fn drop<T: ?Sized>(token: &Arc<T>) -> bool {
    REGISTRY.cancel(token)
}

pub fn collect() -> usize {
    REGISTRY.collect()
}

pub fn run_pending() -> usize {
    REGISTRY.run_pending()
}

/// One collection turn on the calling thread
pub fn tick() -> usize {
    REGISTRY.tick()
}

/// Issue a handle for `value` in the process-wide table
pub fn alloc<V: Any + Send + Sync>(value: &Arc<V>) -> Result<Handle> {
    HANDLES.alloc_any(value)
}

pub fn dealloc(handle: Handle) -> bool {
    HANDLES.dealloc(handle)
}

/// Value behind `handle` in the process-wide table
pub fn resolve(handle: Handle) -> Option<Arc<dyn Any + Send + Sync>> {
    HANDLES.resolve(handle)
}

/// Value behind `handle`, if it has type `V`
pub fn resolve_as<V: Any + Send + Sync>(handle: Handle) -> Option<Arc<V>> {
    HANDLES.resolve_as(handle)
}

/// `Tracker::track` on the process-wide registry
pub fn track<'a, K, V, I>(record: I) -> usize
where
    I: IntoIterator<Item = (K, &'a Arc<V>)>,
    K: AsRef<str>,
    V: Any + Send + Sync,
{
    TRACKER.track(&REGISTRY, record)
}
