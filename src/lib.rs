use thiserror::Error;

pub mod clock;
pub mod config;
pub mod key;
pub mod server;
pub mod signature;
pub mod signer;
pub mod url;

pub use crate::clock::{Clock, FixedClock, SystemClock};
pub use crate::key::{EnvKey, Key, KeyResolver, StaticKey};
pub use crate::server::router;
pub use crate::signer::{Expiration, UrlSigner, Verdict};
pub use crate::url::{CanonicalUrl, QueryMap, QueryValue};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlSignerError {
    #[error("URL is empty")]
    EmptyInput,
    #[error("Malformed URL: {0}")]
    MalformedUrl(String),
    #[error("Signing key unavailable: {0}")]
    KeyUnavailable(String),
}

pub type Result<T> = std::result::Result<T, UrlSignerError>;
