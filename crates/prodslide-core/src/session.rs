#![forbid(unsafe_code)]

//! Per-browsing-session key/value storage.
//!
//! Used to deduplicate one-time informational notices across page loads in
//! the same session. On the web this is `sessionStorage`; natively and in
//! tests it is [`MemorySessionStore`].
//!
//! # Design Invariants
//!
//! 1. **Graceful degradation**: storage failures never panic. A failed read
//!    counts as "not recorded", a failed write is reported to the caller and
//!    otherwise ignored.
//! 2. **String values only**, matching the browser API.

use std::collections::HashMap;
use std::fmt;

/// Errors from a session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The store exists but refused the operation (quota, privacy mode).
    Rejected(String),
    /// No store is available in this environment.
    Unavailable,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(msg) => write!(f, "session storage rejected operation: {msg}"),
            Self::Unavailable => f.write_str("session storage unavailable"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Pluggable session storage.
pub trait SessionStore {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Read a value.
    fn get(&self, key: &str) -> Result<Option<String>, SessionError>;

    /// Write a value.
    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionError>;

    /// Whether `key` holds a value; read failures count as absent.
    fn contains(&self, key: &str) -> bool {
        matches!(self.get(key), Ok(Some(_)))
    }
}

/// In-memory session storage, lost when dropped.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    data: HashMap<String, String>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated store (simulates an earlier page load in the session).
    #[must_use]
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            data: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn name(&self) -> &str {
        "MemorySessionStore"
    }

    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.data.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionError> {
        self.data.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// A store that refuses every operation (storage disabled by the browser).
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSessionStore;

impl SessionStore for DisabledSessionStore {
    fn name(&self) -> &str {
        "DisabledSessionStore"
    }

    fn get(&self, _key: &str) -> Result<Option<String>, SessionError> {
        Err(SessionError::Unavailable)
    }

    fn set(&mut self, _key: &str, _value: &str) -> Result<(), SessionError> {
        Err(SessionError::Unavailable)
    }
}
