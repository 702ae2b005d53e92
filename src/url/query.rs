use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::UrlSignerError;

/// Characters left untouched when encoding a query component (RFC 3986 unreserved).
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Decoded query string, ordered by key.
pub type QueryMap = BTreeMap<String, QueryValue>;

/// A single query parameter value.
///
/// `Scalar` comes from `k=v`, `List` from repeated `k[]=v` and `Map` from
/// `k[sub]=v`. Sub-keys of a `Map` are ordered like the top-level keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Scalar(String),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

impl QueryValue {
    /// The value when it is a plain `k=v` scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::Scalar(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Scalar(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Scalar(value)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Scalar(value.to_string())
    }
}

impl From<u64> for QueryValue {
    fn from(value: u64) -> Self {
        QueryValue::Scalar(value.to_string())
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(value: Vec<String>) -> Self {
        QueryValue::List(value)
    }
}

impl From<Vec<&str>> for QueryValue {
    fn from(value: Vec<&str>) -> Self {
        QueryValue::List(value.into_iter().map(str::to_string).collect())
    }
}

impl From<BTreeMap<String, String>> for QueryValue {
    fn from(value: BTreeMap<String, String>) -> Self {
        QueryValue::Map(value)
    }
}

enum KeyShape<'a> {
    Plain(&'a str),
    List(&'a str),
    Entry(&'a str, &'a str),
}

fn key_shape(key: &str) -> KeyShape<'_> {
    if let Some(name) = key.strip_suffix("[]") {
        if !name.is_empty() && !name.contains(['[', ']']) {
            return KeyShape::List(name);
        }
    }
    if let Some((name, sub)) = key.strip_suffix(']').and_then(|inner| inner.split_once('[')) {
        if !name.is_empty() && !sub.is_empty() && !name.contains(']') && !sub.contains(['[', ']']) {
            return KeyShape::Entry(name, sub);
        }
    }
    KeyShape::Plain(key)
}

/// Decode a raw query string (without the leading `?`).
///
/// A scalar key given twice keeps the last value; `k[]` entries accumulate in
/// order. Pairs with an empty key are dropped.
pub fn decode(raw: &str) -> Result<QueryMap, UrlSignerError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw)
        .map_err(|e| UrlSignerError::MalformedUrl(format!("query string: {e}")))?;

    let mut query = QueryMap::new();
    for (key, value) in pairs {
        if key.is_empty() {
            continue;
        }
        match key_shape(&key) {
            KeyShape::Plain(name) => {
                query.insert(name.to_string(), QueryValue::Scalar(value));
            }
            KeyShape::List(name) => match query.get_mut(name) {
                Some(QueryValue::List(items)) => items.push(value),
                _ => {
                    query.insert(name.to_string(), QueryValue::List(vec![value]));
                }
            },
            KeyShape::Entry(name, sub) => match query.get_mut(name) {
                Some(QueryValue::Map(entries)) => {
                    entries.insert(sub.to_string(), value);
                }
                _ => {
                    let mut entries = BTreeMap::new();
                    entries.insert(sub.to_string(), value);
                    query.insert(name.to_string(), QueryValue::Map(entries));
                }
            },
        }
    }
    Ok(query)
}

/// Bring a caller-built map into the shape `decode` produces.
///
/// Bracketed scalar keys become lists or maps, empty keys and empty
/// lists/maps disappear. The result survives `encode` then `decode` unchanged.
pub fn normalize(query: &QueryMap) -> Result<QueryMap, UrlSignerError> {
    decode(&encode(query))
}

fn escape(component: &str) -> String {
    utf8_percent_encode(component, QUERY_ENCODE_SET).to_string()
}

/// Encode a query map as `&`-joined pairs in key order.
///
/// Lists become repeated `k[]=v` pairs and maps `k[sub]=v` pairs; `decode`
/// reverses this exactly.
pub fn encode(query: &QueryMap) -> String {
    let mut pairs = Vec::new();
    for (key, value) in query {
        let name = escape(key);
        match value {
            QueryValue::Scalar(v) => pairs.push(format!("{}={}", name, escape(v))),
            QueryValue::List(items) => {
                for item in items {
                    pairs.push(format!("{}[]={}", name, escape(item)));
                }
            }
            QueryValue::Map(entries) => {
                for (sub, v) in entries {
                    pairs.push(format!("{}[{}]={}", name, escape(sub), escape(v)));
                }
            }
        }
    }
    pairs.join("&")
}
