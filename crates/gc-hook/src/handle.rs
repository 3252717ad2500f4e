//! Handle Table
//!
//! Maps shared values to small integer handles so a reference can cross a
//! boundary that only carries plain data (a serialized message, an FFI
//! integer, a channel of `u32`) and be resolved back on the other side.
//!
//! The table keeps every allocated value alive until its handle is passed to
//! `dealloc`. Nothing is reclaimed implicitly.
//!
//! Identity is pointer identity of the `Arc` allocation: two clones of the
//! same `Arc` share a handle, two equal but separately allocated values do
//! not. The table owns a strong clone of each value, so an address cannot be
//! reused while it is a key.

use crate::error::{HookError, Result};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Integer identifier standing in for a shared value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(pub u32);

impl From<u32> for Handle {
    fn from(id: u32) -> Self {
        Handle(id)
    }
}

impl From<Handle> for u32 {
    fn from(handle: Handle) -> Self {
        handle.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address used as the reverse-mapping key of a value
fn identity<T: ?Sized>(value: &Arc<T>) -> usize {
    Arc::as_ptr(value) as *const () as usize
}

struct TableInner<T: ?Sized> {
    ids: FxHashMap<Handle, Arc<T>>,
    values: FxHashMap<usize, Handle>,
    next: u32,
}

/// Bidirectional handle <-> value table
///
/// The default type parameter stores heterogeneous values; typed tables
/// such as `HandleTable<Session>` skip the downcast on resolution.
///
/// # Examples
///
/// ```rust
/// use gc_hook::HandleTable;
/// use std::sync::Arc;
///
/// let table: HandleTable<String> = HandleTable::new();
/// let value = Arc::new("payload".to_string());
///
/// let id = table.alloc(&value)?;
/// assert_eq!(table.alloc(&value)?, id);
/// assert!(Arc::ptr_eq(&table.resolve(id).unwrap(), &value));
///
/// assert!(table.dealloc(id));
/// assert!(table.resolve(id).is_none());
/// # Ok::<(), gc_hook::HookError>(())
/// ```
pub struct HandleTable<T: ?Sized = dyn Any + Send + Sync> {
    inner: Mutex<TableInner<T>>,
    limit: u32,
}

impl<T: ?Sized> HandleTable<T> {
    /// Create an empty table using the full `u32` id space
    pub fn new() -> Self {
        Self::with_limit(u32::MAX)
    }

    /// Create an empty table issuing ids from `[0, limit)`
    ///
    /// A zero limit is treated as one.
    pub fn with_limit(limit: u32) -> Self {
        Self {
            inner: Mutex::new(TableInner {
                ids: FxHashMap::default(),
                values: FxHashMap::default(),
                next: 0,
            }),
            limit: limit.max(1),
        }
    }

    /// Size of the id space
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Return the handle of `value`, allocating one if needed
    ///
    /// Allocating the same value twice returns the same handle. A new handle
    /// is taken from a counter that wraps at the table limit and skips ids
    /// still in use.
    ///
    /// # Errors
    ///
    /// `ResourceExhausted` when every id in the space is taken.
    pub fn alloc(&self, value: &Arc<T>) -> Result<Handle> {
        let key = identity(value);
        let mut inner = self.inner.lock();

        if let Some(&handle) = inner.values.get(&key) {
            return Ok(handle);
        }

        if inner.ids.len() as u64 >= self.limit as u64 {
            return Err(HookError::ResourceExhausted {
                resource: format!("handle ids (limit {})", self.limit),
            });
        }

        // At most `ids.len()` probes can collide, so this terminates.
        let handle = loop {
            let candidate = Handle(inner.next);
            inner.next = if inner.next + 1 >= self.limit {
                0
            } else {
                inner.next + 1
            };
            if !inner.ids.contains_key(&candidate) {
                break candidate;
            }
        };

        inner.ids.insert(handle, Arc::clone(value));
        inner.values.insert(key, handle);
        log::trace!("handle {} allocated ({} live)", handle, inner.ids.len());

        Ok(handle)
    }

    /// Free `handle`, releasing the table's reference to its value
    ///
    /// Returns `false` without side effects when the handle is unknown.
    pub fn dealloc(&self, handle: Handle) -> bool {
        let removed = {
            let mut inner = self.inner.lock();
            match inner.ids.remove(&handle) {
                Some(value) => {
                    inner.values.remove(&identity(&value));
                    log::trace!("handle {} freed ({} live)", handle, inner.ids.len());
                    Some(value)
                },
                None => None,
            }
        };
        // `removed` is dropped here, after the lock is released.
        removed.is_some()
    }

    /// Resolve `handle` back to its value
    pub fn resolve(&self, handle: Handle) -> Option<Arc<T>> {
        self.inner.lock().ids.get(&handle).cloned()
    }

    /// Handle currently assigned to `value`, if any
    pub fn handle_of(&self, value: &Arc<T>) -> Option<Handle> {
        self.inner.lock().values.get(&identity(value)).copied()
    }

    /// Whether `value` currently has a handle
    pub fn contains(&self, value: &Arc<T>) -> bool {
        self.handle_of(value).is_some()
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.inner.lock().ids.len()
    }

    /// Check if no handle is live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free every handle
    ///
    /// The counter is not reset, so handles issued afterwards do not collide
    /// with stale ids still held by callers.
    pub fn clear(&self) {
        let drained: Vec<Arc<T>> = {
            let mut inner = self.inner.lock();
            inner.values.clear();
            inner.ids.drain().map(|(_, value)| value).collect()
        };
        log::trace!("handle table cleared ({} freed)", drained.len());
    }
}

impl HandleTable<dyn Any + Send + Sync> {
    /// Allocate a handle for a concretely typed value
    pub fn alloc_any<V: Any + Send + Sync>(&self, value: &Arc<V>) -> Result<Handle> {
        let erased: Arc<dyn Any + Send + Sync> = value.clone();
        self.alloc(&erased)
    }

    /// Resolve `handle` and downcast to `V`
    ///
    /// Returns `None` if the handle is unknown or holds another type.
    pub fn resolve_as<V: Any + Send + Sync>(&self, handle: Handle) -> Option<Arc<V>> {
        self.resolve(handle)?.downcast::<V>().ok()
    }
}

impl<T: ?Sized> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
