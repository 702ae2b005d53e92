//! URL canonicalization.
//!
//! A [`CanonicalUrl`] splits a URL into its components and keeps the query
//! string as a key-ordered map, so the same logical URL always serializes to
//! the same bytes. Signing and validation both go through this type.

pub mod query;

use std::fmt;
use std::str::FromStr;

pub use query::{QueryMap, QueryValue};

use crate::{Result, UrlSignerError};

/// Immutable, normalized view of a URL.
///
/// Absent components are stored as empty strings. Every transformation
/// returns a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalUrl {
    scheme: String,
    user: String,
    pass: String,
    host: String,
    port: Option<u16>,
    path: String,
    query: QueryMap,
    fragment: String,
    has_authority: bool,
}

impl CanonicalUrl {
    /// Parse `url` without extra parameters.
    pub fn new(url: &str) -> Result<Self> {
        Self::parse(url, QueryMap::new())
    }

    /// Parse `url` and add `extra` parameters.
    ///
    /// Keys already present in the URL's own query string win; `extra` only
    /// contributes keys the URL does not carry.
    pub fn parse(url: &str, extra: QueryMap) -> Result<Self> {
        if url.is_empty() {
            return Err(UrlSignerError::EmptyInput);
        }
        if let Some(c) = url
            .chars()
            .find(|c| c.is_control() || c.is_whitespace() || matches!(c, '<' | '>' | '"'))
        {
            return Err(UrlSignerError::MalformedUrl(format!(
                "forbidden character {c:?}"
            )));
        }

        let (rest, fragment) = url.split_once('#').unwrap_or((url, ""));
        let (rest, raw_query) = match rest.split_once('?') {
            Some((r, q)) => (r, Some(q)),
            None => (rest, None),
        };
        let (scheme, rest) = split_scheme(rest);

        let mut parsed = CanonicalUrl {
            scheme: scheme.to_string(),
            user: String::new(),
            pass: String::new(),
            host: String::new(),
            port: None,
            path: String::new(),
            query: QueryMap::new(),
            fragment: fragment.to_string(),
            has_authority: false,
        };

        match rest.strip_prefix("//") {
            Some(after) => {
                let end = after.find('/').unwrap_or(after.len());
                let (authority, path) = after.split_at(end);
                parsed.parse_authority(authority)?;
                parsed.path = path.to_string();
            }
            None => parsed.path = rest.to_string(),
        }

        if let Some(raw) = raw_query {
            parsed.query = query::decode(raw)?;
        }

        Ok(parsed.merge(query::normalize(&extra)?))
    }

    fn parse_authority(&mut self, authority: &str) -> Result<()> {
        self.has_authority = true;

        let hostport = match authority.rsplit_once('@') {
            Some((userinfo, hostport)) => {
                if userinfo.contains('@') {
                    return Err(UrlSignerError::MalformedUrl(format!(
                        "unencoded '@' in userinfo {userinfo:?}"
                    )));
                }
                let (user, pass) = userinfo.split_once(':').unwrap_or((userinfo, ""));
                self.user = user.to_string();
                self.pass = pass.to_string();
                hostport
            }
            None => authority,
        };

        let (host, port) = split_host_port(hostport)?;
        if host.is_empty() && !self.scheme.eq_ignore_ascii_case("file") {
            return Err(UrlSignerError::MalformedUrl(format!(
                "missing host in authority {authority:?}"
            )));
        }
        if !host.is_empty() {
            ::url::Host::parse(host).map_err(|e| {
                UrlSignerError::MalformedUrl(format!("invalid host {host:?}: {e}"))
            })?;
        }
        self.host = host.to_string();
        self.port = port;
        Ok(())
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn pass(&self) -> &str {
        &self.pass
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    pub fn query(&self) -> &QueryMap {
        &self.query
    }

    pub fn query_value(&self, key: &str) -> Option<&QueryValue> {
        self.query.get(key)
    }

    /// Scalar query value for `key`; `None` when absent or list/map-valued.
    pub fn query_str(&self, key: &str) -> Option<&str> {
        self.query.get(key).and_then(QueryValue::as_str)
    }

    /// Copy with `extra` added under the same precedence rule as [`parse`](Self::parse).
    ///
    /// `extra` is taken as-is; pass it through [`query::normalize`] first if it
    /// was not produced by decoding a query string.
    pub fn merge(&self, extra: QueryMap) -> Self {
        let mut merged = self.clone();
        for (key, value) in extra {
            merged.query.entry(key).or_insert(value);
        }
        merged
    }

    /// Copy with the given query keys removed.
    pub fn without(&self, keys: &[&str]) -> Self {
        let mut stripped = self.clone();
        stripped.query.retain(|k, _| !keys.contains(&k.as_str()));
        stripped
    }

    /// Serialize back into a URL string.
    ///
    /// The query string is emitted only when `include_query` is set and the
    /// query is non-empty.
    pub fn format(&self, include_query: bool) -> String {
        let mut out = String::new();
        if !self.scheme.is_empty() {
            out.push_str(&self.scheme);
            out.push(':');
        }
        if self.has_authority {
            out.push_str("//");
            if !self.user.is_empty() || !self.pass.is_empty() {
                out.push_str(&self.user);
                if !self.pass.is_empty() {
                    out.push(':');
                    out.push_str(&self.pass);
                }
                out.push('@');
            }
            out.push_str(&self.host);
            if let Some(port) = self.port {
                out.push(':');
                out.push_str(&port.to_string());
            }
        }
        out.push_str(&self.path);
        if include_query && !self.query.is_empty() {
            out.push('?');
            out.push_str(&query::encode(&self.query));
        }
        if !self.fragment.is_empty() {
            out.push('#');
            out.push_str(&self.fragment);
        }
        out
    }

    pub fn to_string_without_query(&self) -> String {
        self.format(false)
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(true))
    }
}

impl FromStr for CanonicalUrl {
    type Err = UrlSignerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

fn split_scheme(s: &str) -> (&str, &str) {
    if let Some((candidate, rest)) = s.split_once(':') {
        let valid = candidate.starts_with(|c: char| c.is_ascii_alphabetic())
            && candidate
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        // `localhost:8080/path` carries a port, not a scheme.
        let port_like = !rest.starts_with("//") && {
            let head = rest.split('/').next().unwrap_or("");
            !head.is_empty() && head.bytes().all(|b| b.is_ascii_digit())
        };
        if valid && !port_like {
            return (candidate, rest);
        }
    }
    ("", s)
}

fn split_host_port(hostport: &str) -> Result<(&str, Option<u16>)> {
    if hostport.starts_with('[') {
        let end = hostport.find(']').ok_or_else(|| {
            UrlSignerError::MalformedUrl(format!("unterminated IPv6 literal in {hostport:?}"))
        })?;
        let (host, rest) = hostport.split_at(end + 1);
        return match rest.strip_prefix(':') {
            Some(port) => Ok((host, parse_port(port)?)),
            None if rest.is_empty() => Ok((host, None)),
            None => Err(UrlSignerError::MalformedUrl(format!(
                "unexpected {rest:?} after IPv6 literal"
            ))),
        };
    }
    match hostport.rsplit_once(':') {
        Some((host, port)) => Ok((host, parse_port(port)?)),
        None => Ok((hostport, None)),
    }
}

fn parse_port(port: &str) -> Result<Option<u16>> {
    if port.is_empty() {
        return Ok(None);
    }
    if !port.bytes().all(|b| b.is_ascii_digit()) {
        return Err(UrlSignerError::MalformedUrl(format!("invalid port {port:?}")));
    }
    port.parse::<u16>()
        .map(Some)
        .map_err(|_| UrlSignerError::MalformedUrl(format!("port out of range {port:?}")))
}
