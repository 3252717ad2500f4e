//! Forwarding Proxy
//!
//! A `Proxy<T>` is a distinct allocation that owns a strong reference to a
//! value and forwards every access to it. Code holding the proxy behaves as
//! if it held the value, while the proxy's own identity can be observed
//! weakly: once the last `Arc<Proxy<T>>` is dropped, the proxy is gone even
//! though the wrapped value may live on elsewhere.
//!
//! Forwarding goes through a `ProxyHandler`. The default handler,
//! `PassThrough`, returns the wrapped value untouched.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Forwarding policy of a `Proxy`
///
/// Every dereference of a proxy asks its handler which value to expose.
/// Handlers may observe accesses (counting, tracing) or redirect them to a
/// value that outlives the proxy.
///
/// # Examples
///
/// ```rust
/// use gc_hook::{Proxy, ProxyHandler};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Counting(AtomicUsize);
///
/// impl ProxyHandler<String> for Counting {
///     fn get<'a>(&self, target: &'a String) -> &'a String {
///         self.0.fetch_add(1, Ordering::Relaxed);
///         target
///     }
/// }
///
/// let handler = Arc::new(Counting::default());
/// let proxy = Proxy::with_handler(Arc::new("hi".to_string()), handler.clone());
/// assert_eq!(proxy.len(), 2);
/// assert_eq!(handler.0.load(Ordering::Relaxed), 1);
/// ```
pub trait ProxyHandler<T: ?Sized>: Send + Sync {
    /// Resolve the value an access on the proxy should see
    fn get<'a>(&self, target: &'a T) -> &'a T {
        target
    }
}

/// Pure pass-through handler
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl<T: ?Sized> ProxyHandler<T> for PassThrough {}

/// Transparent wrapper around a shared value
pub struct Proxy<T: ?Sized> {
    target: Arc<T>,
    handler: Arc<dyn ProxyHandler<T>>,
}

impl<T: ?Sized> Proxy<T> {
    /// Wrap `target` with the pass-through handler
    pub fn new(target: Arc<T>) -> Self {
        Self {
            target,
            handler: Arc::new(PassThrough),
        }
    }

    /// Wrap `target` with a custom handler
    pub fn with_handler(target: Arc<T>, handler: Arc<dyn ProxyHandler<T>>) -> Self {
        Self { target, handler }
    }

    /// Whether this proxy wraps exactly the allocation behind `other`
    pub fn wraps(&self, other: &Arc<T>) -> bool {
        Arc::ptr_eq(&self.target, other)
    }
}

impl<T: ?Sized> Deref for Proxy<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.handler.get(&self.target)
    }
}

impl<T: ?Sized> AsRef<T> for Proxy<T> {
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Proxy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: ?Sized + fmt::Display> fmt::Display for Proxy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

impl<T: ?Sized + PartialEq> PartialEq<T> for Proxy<T> {
    fn eq(&self, other: &T) -> bool {
        **self == *other
    }
}
