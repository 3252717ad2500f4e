//! Diagnostic tracking of labelled values
//!
//! `Tracker::track` takes label/value pairs and, for every value it has not
//! seen before, registers an uncancellable debug hook on it. When a value is
//! later released, the registry logs `Held value <label> not relevant
//! anymore`. Values are never wrapped: callers keep using them as-is.
//!
//! ```rust
//! use gc_hook::{Registry, Tracker};
//! use std::sync::Arc;
//!
//! let registry = Registry::new();
//! let tracker = Tracker::new();
//! let config = Arc::new(vec![1, 2]);
//!
//! assert_eq!(tracker.track(&registry, [("config", &config)]), 1);
//! assert_eq!(tracker.track(&registry, [("config again", &config)]), 0);
//!
//! drop(config);
//! registry.tick();
//! assert_eq!(
//!     registry.logger().events().last().unwrap().to_string(),
//!     "Held value config not relevant anymore"
//! );
//! ```

use crate::registry::{HookOptions, Registry, Token};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::sync::{Arc, Weak};

/// Identity set of already tracked values, held weakly
#[derive(Default)]
pub struct Tracker {
    known: Mutex<FxHashMap<usize, Weak<dyn Any + Send + Sync>>>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a debug hook for every value not tracked yet
    ///
    /// Returns the number of newly tracked values.
    pub fn track<'a, K, V, I>(&self, registry: &Registry, record: I) -> usize
    where
        I: IntoIterator<Item = (K, &'a Arc<V>)>,
        K: AsRef<str>,
        V: Any + Send + Sync,
    {
        let mut tracked = 0;
        for (label, value) in record {
            if !self.remember(value) {
                continue;
            }
            let label = label.as_ref().to_string();
            registry.create_returning(
                Arc::new(label.clone()),
                |_| {},
                Arc::clone(value),
                HookOptions::new()
                    .token(Token::Disabled)
                    .debug(true)
                    .label(label),
            );
            tracked += 1;
        }
        tracked
    }

    /// Whether `value` was tracked and is still alive
    pub fn is_tracked<V: Any + Send + Sync>(&self, value: &Arc<V>) -> bool {
        self.known.lock().contains_key(&identity(value))
    }

    /// Number of tracked values still alive
    pub fn len(&self) -> usize {
        let mut known = self.known.lock();
        known.retain(|_, weak| weak.strong_count() > 0);
        known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remember<V: Any + Send + Sync>(&self, value: &Arc<V>) -> bool {
        let mut known = self.known.lock();
        // Dead entries release their allocation so the address can be reused.
        known.retain(|_, weak| weak.strong_count() > 0);

        let key = identity(value);
        if known.contains_key(&key) {
            return false;
        }
        let weak: Weak<V> = Arc::downgrade(value);
        let weak: Weak<dyn Any + Send + Sync> = weak;
        known.insert(key, weak);
        true
    }
}

fn identity<V>(value: &Arc<V>) -> usize {
    Arc::as_ptr(value) as *const () as usize
}
