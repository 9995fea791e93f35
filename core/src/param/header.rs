use std::collections::{BTreeSet, HashMap};

use super::{CaseInsensitiveMap, MediaType};
use crate::error::ApiError;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const ACCEPT_CHARSET: &str = "Accept-Charset";
pub const AUTHORIZATION: &str = "Authorization";

const DEFAULT_CHARSET: &str = "UTF-8";

/// Request headers with case-insensitive keys.
///
/// A fresh `Header` always carries `Content-Type: application/json;charset=UTF-8`
/// and `Accept-Charset: UTF-8`; both can be overwritten like any other key.
/// Until then they count as defaults and are not carried by [`Header::explicit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    inner: CaseInsensitiveMap,
    // lowercased keys still holding their default value
    defaulted: BTreeSet<String>,
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

impl Header {
    pub fn new() -> Self {
        let mut header = Self {
            inner: CaseInsensitiveMap::default(),
            defaulted: BTreeSet::new(),
        };
        for (key, value) in [
            (CONTENT_TYPE, MediaType::APPLICATION_JSON),
            (ACCEPT_CHARSET, DEFAULT_CHARSET),
        ] {
            header.inner.insert(key, value.to_string());
            header.defaulted.insert(key.to_ascii_lowercase());
        }
        header
    }

    /// Set `key` to `value`, replacing any value under the same key in any
    /// case. Empty keys are ignored.
    pub fn add_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.defaulted.remove(&key.to_ascii_lowercase());
        self.inner.insert(key, value.into());
    }

    pub fn add_all<K, V>(&mut self, params: impl IntoIterator<Item = (K, V)>)
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        for (k, v) in params {
            self.insert(k.as_ref(), v);
        }
    }

    /// Add pairs from a flattened `[key, value, key, value, ...]` list.
    pub fn add_list(&mut self, list: &[&str]) -> Result<(), ApiError> {
        if list.len() % 2 != 0 {
            return Err(ApiError::config("header list size must be a multiple of 2"));
        }
        for pair in list.chunks(2) {
            if !pair[0].trim().is_empty() {
                self.insert(pair[0], pair[1]);
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.defaulted.remove(&key.to_ascii_lowercase());
        self.inner.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter()
    }

    /// Entries the caller set, leaving out untouched defaults.
    pub fn explicit(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner
            .iter()
            .filter(|(k, _)| !self.defaulted.contains(&k.to_ascii_lowercase()))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    /// Flatten into `[key, value, key, value, ...]`.
    pub fn to_list(&self) -> Vec<String> {
        self.iter()
            .flat_map(|(k, v)| [k.to_string(), v.to_string()])
            .collect()
    }

    pub fn to_map(&self) -> HashMap<String, String> {
        self.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Overwrite the content type; `None` restores the JSON default.
    pub fn set_content_type(mut self, content_type: Option<&str>) -> Self {
        let value = content_type.unwrap_or(MediaType::APPLICATION_JSON);
        self.insert(CONTENT_TYPE, value);
        self
    }

    /// The request content type, JSON when the header is absent.
    pub fn content_type(&self) -> Result<MediaType, ApiError> {
        match self.get(CONTENT_TYPE) {
            Some(value) => MediaType::parse(value),
            None => Ok(MediaType::json()),
        }
    }

    /// Charset declared by the content type, UTF-8 when the header is absent.
    pub fn charset(&self) -> Result<String, ApiError> {
        self.content_type().map(|mt| mt.charset().to_string())
    }

    pub fn clear(&mut self) {
        self.defaulted.clear();
        self.inner.clear();
    }
}
