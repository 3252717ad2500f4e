//! # gc-hook - Finalization Callbacks for Shared Values
//!
//! gc-hook tells you when a value is no longer used, without the act of
//! watching keeping it alive, and maps shared values to plain integer
//! handles so references can cross boundaries that only carry data.
//!
//! ## Overview
//!
//! - **Finalization Registry**: `create` wraps a held value in a fresh
//!   forwarding `Proxy`; once every clone of the proxy is dropped, a later
//!   collection turn calls your callback with the held value
//! - **Cancellation Tokens**: `drop` cancels registrations by token, which
//!   defaults to the held value itself
//! - **Handle Tables**: `alloc` issues a `u32` handle for a value,
//!   `resolve` maps it back, `dealloc` releases it
//! - **Background Finalizer**: a `Runtime` runs collection turns on its own
//!   thread; without one, call `tick` yourself
//! - **Diagnostics**: debug registrations log `Held value <label> not
//!   relevant anymore` when their callback is about to run
//!
//! ## Quick Start
//!
//! ```rust
//! use gc_hook::{HookOptions, Registry};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let registry = Registry::new();
//! let closed = Arc::new(AtomicUsize::new(0));
//!
//! let counter = closed.clone();
//! let socket = registry.create(
//!     Arc::new(String::from("fd:7")),
//!     move |fd| {
//!         assert_eq!(fd.as_str(), "fd:7");
//!         counter.fetch_add(1, Ordering::SeqCst);
//!     },
//!     HookOptions::new(),
//! );
//!
//! // The proxy forwards to the held value.
//! assert!(socket.starts_with("fd:"));
//!
//! drop(socket);
//! registry.tick();
//! assert_eq!(closed.load(Ordering::SeqCst), 1);
//! ```
//!
//! ## Example: Returning a Different Target
//!
//! ```rust
//! use gc_hook::{HookOptions, Registry};
//! use std::sync::Arc;
//!
//! let registry = Registry::new();
//! let session = Arc::new(vec![0u8; 16]);
//! let same = registry.create_returning(
//!     Arc::new("session buffer"),
//!     |name| println!("{} released", name),
//!     session.clone(),
//!     HookOptions::new(),
//! );
//! assert!(Arc::ptr_eq(&same, &session));
//! ```
//!
//! ## Example: Using Runtime
//!
//! ```rust
//! use gc_hook::{HookConfig, Runtime};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), gc_hook::HookError> {
//!     let runtime = Runtime::new(HookConfig::default())?;
//!     runtime.start()?;
//!
//!     let value = Arc::new(3.5f64);
//!     let handle = runtime.handles().alloc_any(&value)?;
//!     assert_eq!(runtime.handles().resolve_as::<f64>(handle).as_deref(), Some(&3.5));
//!     runtime.handles().dealloc(handle);
//!
//!     runtime.stop()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration parameters and validation
//! - [`error`]: Error types
//! - [`global`]: Process-wide registry, handle table and tracker
//! - [`handle`]: Integer handle tables
//! - [`logging`]: Structured hook events
//! - [`proxy`]: Forwarding proxy and handlers
//! - [`registry`]: Finalization registry and cancellation tokens
//! - [`runtime`]: Background finalizer and runtime lifecycle
//! - [`track`]: Labelled release diagnostics
//!
//! ## Limitations
//!
//! - **Timing**: Callbacks run on the next collection turn after the target
//!   is released, never synchronously
//! - **Cycles**: A target kept alive by a reference cycle is never released
//! - **Shutdown**: Callbacks still pending when the process exits do not run

// Core
pub mod config;
pub mod error;
pub mod logging;

// Finalization
pub mod proxy;
pub mod registry;
pub mod track;

// Handles
pub mod handle;

// Runtime and process-wide state
pub mod global;
pub mod runtime;

// Re-export main types for convenience
pub use config::HookConfig;
pub use error::{HookError, Result};
pub use global::{
    alloc, collect, create, create_returning, dealloc, drop, resolve, resolve_as, run_pending,
    tick, track,
};
pub use handle::{Handle, HandleTable};
pub use logging::{HookEvent, HookLogger};
pub use proxy::{PassThrough, Proxy, ProxyHandler};
pub use registry::{HookOptions, Registry, RegistryStats, Token};
pub use runtime::{Runtime, RuntimeState};
pub use track::Tracker;

/// gc-hook version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Start background finalization for the process-wide registry
///
/// Returns a running `Runtime` driving `gc_hook::registry()` and
/// `gc_hook::handles()` with the configuration read from the environment.
/// Dropping the runtime stops the finalizer thread.
///
/// # Examples
///
/// ```rust
/// let runtime = gc_hook::init()?;
/// assert_eq!(runtime.state(), gc_hook::RuntimeState::Running);
/// runtime.stop()?;
/// # Ok::<(), gc_hook::HookError>(())
/// ```
pub fn init() -> Result<Runtime> {
    init_with_config(global::config().clone())
}

/// Start background finalization for the process-wide registry
///
/// Only `finalizer_interval_ms` takes effect: the process-wide registry and
/// handle table keep the configuration they were first built with.
pub fn init_with_config(config: HookConfig) -> Result<Runtime> {
    let runtime = Runtime::with_parts(
        config,
        global::registry().clone(),
        global::handles().clone(),
    )?;
    runtime.start()?;
    Ok(runtime)
}
