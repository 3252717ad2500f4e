//! Cancellation tokens
//!
//! A token identifies the registrations `Registry::cancel` removes.
//! Tokens compare by allocation identity and are held weakly, so keeping a
//! registration never keeps its token alive.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

/// Cancellation policy of a registration
#[derive(Clone, Default)]
pub enum Token {
    /// Cancel with the held value itself
    #[default]
    Held,
    /// Never cancellable; the callback always fires once the target is gone
    Disabled,
    /// Cancel with an arbitrary shared value
    Key(TokenKey),
}

impl Token {
    /// Use `value` as the cancellation token
    pub fn key<T: Any + Send + Sync>(value: &Arc<T>) -> Self {
        Token::Key(TokenKey::of(value))
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, Token::Disabled)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Held => f.write_str("Held"),
            Token::Disabled => f.write_str("Disabled"),
            Token::Key(key) => f.debug_tuple("Key").field(key).finish(),
        }
    }
}

/// Weak, identity-compared reference to a token value
#[derive(Clone)]
pub struct TokenKey {
    addr: usize,
    // Keeps the allocation (not the value) reserved, so `addr` stays unique.
    _anchor: Weak<dyn Any + Send + Sync>,
}

impl TokenKey {
    pub fn of<T: Any + Send + Sync>(value: &Arc<T>) -> Self {
        let anchor: Weak<T> = Arc::downgrade(value);
        let anchor: Weak<dyn Any + Send + Sync> = anchor;
        Self {
            addr: address_of(value),
            _anchor: anchor,
        }
    }

    /// Whether `value` is the allocation this key was built from
    pub fn matches<T: ?Sized>(&self, value: &Arc<T>) -> bool {
        self.addr_eq(address_of(value))
    }

    pub(crate) fn addr_eq(&self, addr: usize) -> bool {
        self.addr == addr
    }
}

impl fmt::Debug for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenKey({:#x})", self.addr)
    }
}

pub(crate) fn address_of<T: ?Sized>(value: &Arc<T>) -> usize {
    Arc::as_ptr(value) as *const () as usize
}
