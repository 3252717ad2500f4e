//! Error Module - gc-hook Error Types
//!
//! Most expected failure paths in this crate are boolean or `Option`
//! results (`drop`, `dealloc`, `resolve`). The error type covers the few
//! places where an operation genuinely cannot proceed.
//!
//! # Error Categories
//!
//! ## Resource Errors
//! - `ResourceExhausted` - Handle id space is full
//!
//! ## Configuration Errors
//! - `Configuration` - Invalid configuration
//!
//! ## Runtime Errors
//! - `InvalidState` - Runtime state machine violation
//! - `Internal` - Finalizer thread could not be spawned or joined

use crate::config::ConfigError;
use thiserror::Error;

/// Main error type for all gc-hook operations
///
/// # Examples
///
/// ```rust
/// use gc_hook::HookError;
///
/// fn handle_error(err: HookError) {
///     match err {
///         HookError::ResourceExhausted { resource } => {
///             eprintln!("exhausted: {}", resource);
///         }
///         _ => {
///             eprintln!("other error: {}", err);
///         }
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum HookError {
    /// Resource exhausted
    ///
    /// **When returned:** every id in a handle table's id space is in use
    ///
    /// **Recovery strategy:** `dealloc` unused handles, or build the table
    /// with a larger limit
    #[error("Resource exhausted: {resource}")]
    ResourceExhausted { resource: String },

    /// Configuration error
    ///
    /// **When returned:** `HookConfig::validate` rejected the configuration
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Invalid state
    ///
    /// **When returned:** runtime started twice, or used after stop
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Internal error
    ///
    /// **When returned:** the finalizer thread failed to spawn or panicked
    /// outside of a user callback
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HookError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, HookError::ResourceExhausted { .. })
    }

    /// Check if this error indicates a bug in the code
    pub fn is_bug(&self) -> bool {
        matches!(self, HookError::Internal(_))
    }
}

/// Result type alias for gc-hook operations
pub type Result<T> = std::result::Result<T, HookError>;
