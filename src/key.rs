//! Secret key supply.
//!
//! The signer never stores a key; it asks a [`KeyResolver`] on every call so
//! the source (static, environment, remote) can change underneath it.

use std::fmt;

use crate::{Result, UrlSignerError};

/// Secret HMAC key bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Key(Vec<u8>);

impl Key {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Key(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(<redacted>)")
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key(value.as_bytes().to_vec())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key(value.into_bytes())
    }
}

impl From<Vec<u8>> for Key {
    fn from(value: Vec<u8>) -> Self {
        Key(value)
    }
}

impl From<&[u8]> for Key {
    fn from(value: &[u8]) -> Self {
        Key(value.to_vec())
    }
}

/// Supplies the signing key at call time.
pub trait KeyResolver: Send + Sync {
    fn resolve(&self) -> Result<Key>;
}

impl<F, K> KeyResolver for F
where
    F: Fn() -> K + Send + Sync,
    K: Into<Key>,
{
    fn resolve(&self) -> Result<Key> {
        Ok(self().into())
    }
}

/// A key fixed at construction.
#[derive(Clone)]
pub struct StaticKey(Key);

impl StaticKey {
    pub fn new(key: impl Into<Key>) -> Self {
        StaticKey(key.into())
    }
}

impl KeyResolver for StaticKey {
    fn resolve(&self) -> Result<Key> {
        Ok(self.0.clone())
    }
}

/// Reads the key from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvKey {
    var: String,
}

impl EnvKey {
    pub fn new(var: impl Into<String>) -> Self {
        EnvKey { var: var.into() }
    }
}

impl KeyResolver for EnvKey {
    fn resolve(&self) -> Result<Key> {
        match std::env::var(&self.var) {
            Ok(value) if !value.is_empty() => Ok(Key::from(value)),
            Ok(_) => Err(UrlSignerError::KeyUnavailable(format!("{} is empty", self.var))),
            Err(e) => Err(UrlSignerError::KeyUnavailable(format!("{}: {e}", self.var))),
        }
    }
}
