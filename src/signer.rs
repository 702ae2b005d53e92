//! Signing and validation of URLs.
//!
//! A signed URL carries an HMAC-SHA256 over its own canonical form in the
//! `signature` query parameter and, optionally, an `expires` Unix timestamp
//! that is covered by the signature.

use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::key::{Key, KeyResolver};
use crate::signature::{compute_signature, constant_time_eq, EXPIRES_PARAM, SIGNATURE_PARAM};
use crate::url::{query, CanonicalUrl, QueryMap, QueryValue};
use crate::{Result, UrlSignerError};

/// When a signed URL stops being valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// Seconds from now.
    Seconds(u64),
    /// A span added to now.
    After(time::Duration),
    /// A fixed point in time.
    At(time::OffsetDateTime),
}

impl Expiration {
    /// Absolute Unix timestamp relative to `now`.
    pub fn resolve(&self, now: i64) -> i64 {
        match self {
            Expiration::Seconds(secs) => now.saturating_add(i64::try_from(*secs).unwrap_or(i64::MAX)),
            Expiration::After(span) => now.saturating_add(span.whole_seconds()),
            Expiration::At(at) => at.unix_timestamp(),
        }
    }
}

impl From<u64> for Expiration {
    fn from(secs: u64) -> Self {
        Expiration::Seconds(secs)
    }
}

impl From<time::Duration> for Expiration {
    fn from(span: time::Duration) -> Self {
        Expiration::After(span)
    }
}

impl From<std::time::Duration> for Expiration {
    fn from(span: std::time::Duration) -> Self {
        Expiration::After(time::Duration::try_from(span).unwrap_or(time::Duration::MAX))
    }
}

impl From<time::OffsetDateTime> for Expiration {
    fn from(at: time::OffsetDateTime) -> Self {
        Expiration::At(at)
    }
}

/// Outcome of checking a signed URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Valid,
    MissingSignature,
    InvalidSignature,
    Expired,
}

impl Verdict {
    pub fn is_valid(self) -> bool {
        self == Verdict::Valid
    }
}

/// Signs URLs and validates signed ones.
///
/// Holds no key material: the resolver is asked on every call. Safe to share
/// between threads when the resolver and clock are.
#[derive(Debug, Clone)]
pub struct UrlSigner<K, C = SystemClock> {
    key_resolver: K,
    clock: C,
}

impl<K: KeyResolver> UrlSigner<K> {
    pub fn new(key_resolver: K) -> Self {
        Self {
            key_resolver,
            clock: SystemClock,
        }
    }
}

impl<K: KeyResolver, C: Clock> UrlSigner<K, C> {
    /// Swap the time source, e.g. for a [`FixedClock`](crate::clock::FixedClock) in tests.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> UrlSigner<K, C2> {
        UrlSigner {
            key_resolver: self.key_resolver,
            clock,
        }
    }

    fn key(&self) -> Result<Key> {
        let key = self.key_resolver.resolve()?;
        if key.is_empty() {
            return Err(UrlSignerError::KeyUnavailable(
                "resolver returned an empty key".into(),
            ));
        }
        Ok(key)
    }

    /// Sign `url` together with `parameters`.
    ///
    /// With an `expiration`, an `expires` timestamp replaces any value already
    /// present in the URL or parameters. A `signature` in either is replaced
    /// by the freshly computed one.
    pub fn sign<I, P, V>(&self, url: &str, parameters: I, expiration: Option<Expiration>) -> Result<String>
    where
        I: IntoIterator<Item = (P, V)>,
        P: Into<String>,
        V: Into<QueryValue>,
    {
        let params: QueryMap = parameters
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        // Sign the map the validator will rebuild from the query string.
        let mut params = query::normalize(&params)?;
        if params.remove(SIGNATURE_PARAM).is_some() {
            tracing::debug!("dropping caller-supplied signature parameter");
        }

        let mut reserved = vec![SIGNATURE_PARAM];
        if let Some(expiration) = expiration {
            let expires = expiration.resolve(self.clock.now());
            params.insert(EXPIRES_PARAM.to_string(), QueryValue::from(expires));
            reserved.push(EXPIRES_PARAM);
        }

        let unsigned = CanonicalUrl::new(url)?.without(&reserved).merge(params.clone());
        let message = unsigned.format(true);

        let key = self.key()?;
        let signature = compute_signature(key.as_bytes(), &message);

        params.insert(SIGNATURE_PARAM.to_string(), QueryValue::Scalar(signature));
        let signed = CanonicalUrl::parse(&message, params)?;

        tracing::debug!(
            url = %signed.to_string_without_query(),
            expires = ?signed.query_str(EXPIRES_PARAM),
            "signed url"
        );
        Ok(signed.format(true))
    }

    /// Sign `url` with a mandatory expiration.
    pub fn temporary_sign<I, P, V>(
        &self,
        url: &str,
        expiration: impl Into<Expiration>,
        parameters: I,
    ) -> Result<String>
    where
        I: IntoIterator<Item = (P, V)>,
        P: Into<String>,
        V: Into<QueryValue>,
    {
        self.sign(url, parameters, Some(expiration.into()))
    }

    /// Check a signed URL and report why it is rejected, if it is.
    ///
    /// Signature mismatch and expiry are verdicts, not errors. Errors come
    /// only from canonicalizing `url` or from the key resolver.
    pub fn check(&self, url: &str) -> Result<Verdict> {
        let url = CanonicalUrl::new(url)?;
        let message = url.without(&[SIGNATURE_PARAM]).format(true);
        let provided = url.query_str(SIGNATURE_PARAM).unwrap_or("");

        let key = self.key()?;
        let expected = compute_signature(key.as_bytes(), &message);

        let verdict = if !constant_time_eq(&expected, provided) {
            if url.query_value(SIGNATURE_PARAM).is_none() {
                Verdict::MissingSignature
            } else {
                Verdict::InvalidSignature
            }
        } else if is_expired(url.query_value(EXPIRES_PARAM), self.clock.now()) {
            Verdict::Expired
        } else {
            Verdict::Valid
        };

        tracing::debug!(url = %url.to_string_without_query(), ?verdict, "checked signed url");
        Ok(verdict)
    }

    /// `true` only for an authentic, unexpired URL.
    pub fn validate(&self, url: &str) -> Result<bool> {
        self.check(url).map(Verdict::is_valid)
    }
}

// A non-integer `expires` counts as expired.
fn is_expired(expires: Option<&QueryValue>, now: i64) -> bool {
    match expires {
        None => false,
        Some(value) => match value.as_str().and_then(|s| s.parse::<i64>().ok()) {
            Some(expires) => now > expires,
            None => true,
        },
    }
}
