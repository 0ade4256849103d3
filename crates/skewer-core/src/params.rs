//! Runtime parameters as an ordered key/value store.
//!
//! Keys are fully qualified `"Section:name"` strings. Values are kept as
//! the raw text found in the parameter file and parsed on access. The
//! store preserves insertion order so it can be echoed into output files
//! in the order it was read.

use std::fmt::Display;
use std::str::FromStr;

use indexmap::IndexMap;

use crate::error::ConfigError;

/// Ordered runtime parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Parameters {
    entries: IndexMap<String, String>,
}

impl Parameters {
    /// An empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parameter.
    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.entries.insert(key.into(), value.to_string());
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    /// Raw text of a parameter.
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Whether a parameter is present.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, raw value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate over the parameters in `section`, yielding the unqualified name.
    pub fn section<'a>(&'a self, section: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.iter().filter_map(move |(k, v)| {
            k.strip_prefix(section)
                .and_then(|rest| rest.strip_prefix(':'))
                .map(|name| (name, v))
        })
    }

    /// Parse a compulsory parameter.
    pub fn get<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.raw(key).ok_or_else(|| ConfigError::MissingParameter {
            key: key.to_string(),
        })?;
        parse(key, raw)
    }

    /// Parse an optional parameter, falling back to `default`.
    pub fn get_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.raw(key) {
            Some(raw) => parse(key, raw),
            None => Ok(default),
        }
    }

    /// A compulsory string parameter, trimmed of surrounding whitespace.
    pub fn get_string(&self, key: &str) -> Result<String, ConfigError> {
        self.raw(key)
            .map(|v| v.trim().to_string())
            .ok_or_else(|| ConfigError::MissingParameter {
                key: key.to_string(),
            })
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.set(k, v);
        }
        params
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidParameter {
            key: key.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
}
