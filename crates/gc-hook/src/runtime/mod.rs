//! Runtime Module - Hook Runtime Integration
//!
//! Bundles what an application needs to use gc-hook as a service:
//! - Configuration
//! - Finalization registry
//! - Handle table
//! - Background finalizer thread

pub mod finalizer;

pub use finalizer::Finalizer;

use crate::config::HookConfig;
use crate::error::{HookError, Result};
use crate::handle::HandleTable;
use crate::registry::Registry;
use parking_lot::Mutex;
use std::sync::Arc;

/// Runtime - finalizer and handle table orchestrator
///
/// # Examples
///
/// ```rust
/// use gc_hook::{HookConfig, HookOptions, Runtime};
/// use std::sync::Arc;
///
/// let runtime = Runtime::new(HookConfig {
///     finalizer_interval_ms: 10,
///     ..Default::default()
/// })?;
/// runtime.start()?;
///
/// let proxy = runtime.registry().create(Arc::new(1u8), |_| {}, HookOptions::new());
/// let id = runtime.handles().alloc_any(&Arc::new("shared".to_string()))?;
/// assert!(runtime.handles().dealloc(id));
/// drop(proxy);
///
/// runtime.stop()?;
/// # Ok::<(), gc_hook::HookError>(())
/// ```
pub struct Runtime {
    config: HookConfig,

    /// Finalization registry
    registry: Arc<Registry>,

    /// Handle table
    handles: Arc<HandleTable>,

    /// Finalizer
    finalizer: Finalizer,

    /// Runtime state
    state: Mutex<RuntimeState>,
}

impl Runtime {
    /// Create new runtime with its own registry and handle table
    pub fn new(config: HookConfig) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(Registry::from_config(&config));
        let handles = Arc::new(HandleTable::with_limit(config.handle_limit));
        Self::with_parts(config, registry, handles)
    }

    /// Create new runtime driving an existing registry and handle table
    pub fn with_parts(
        config: HookConfig,
        registry: Arc<Registry>,
        handles: Arc<HandleTable>,
    ) -> Result<Self> {
        config.validate()?;
        let finalizer = Finalizer::new(registry.clone(), config.finalizer_interval());

        Ok(Self {
            config,
            registry,
            handles,
            finalizer,
            state: Mutex::new(RuntimeState::Initialized),
        })
    }

    /// Start runtime
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        if *state == RuntimeState::Running {
            return Err(HookError::InvalidState {
                expected: "Initialized or Stopped".to_string(),
                actual: format!("{:?}", *state),
            });
        }

        self.finalizer.start()?;
        *state = RuntimeState::Running;
        log::debug!(
            "gc-hook runtime started (interval {}ms)",
            self.config.finalizer_interval_ms
        );
        Ok(())
    }

    /// Stop runtime
    ///
    /// Registrations and handles survive; callbacks simply stop firing in
    /// the background until the runtime is started again or the registry
    /// is ticked by hand.
    pub fn stop(&self) -> Result<()> {
        *self.state.lock() = RuntimeState::Stopping;
        self.finalizer.stop()?;
        *self.state.lock() = RuntimeState::Stopped;
        log::debug!("gc-hook runtime stopped");
        Ok(())
    }

    /// Get runtime state
    pub fn state(&self) -> RuntimeState {
        *self.state.lock()
    }

    pub fn config(&self) -> &HookConfig {
        &self.config
    }

    /// Get registry
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Get handle table
    pub fn handles(&self) -> &Arc<HandleTable> {
        &self.handles
    }

    /// Run one collection turn on the calling thread
    pub fn tick(&self) -> usize {
        self.registry.tick()
    }
}

/// Runtime state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    /// Runtime not yet started
    Initialized,
    /// Finalizer thread running
    Running,
    /// Runtime is stopping
    Stopping,
    /// Runtime has stopped
    Stopped,
}
