//! Request parameter containers.
//!
//! # Design
//! `Header` and `Cookie` are keyed case-insensitively and iterate in
//! lexicographic case-insensitive order; `Query` keeps insertion order. All
//! three ignore empty keys and overwrite on a repeated key, so the container
//! never grows for a key it already holds.

mod cookie;
mod header;
mod media_type;
mod query;

use std::collections::BTreeMap;

pub use cookie::Cookie;
pub use header::{Header, ACCEPT_CHARSET, AUTHORIZATION, CONTENT_TYPE};
pub use media_type::MediaType;
pub use query::Query;

/// Map keyed by the lowercased key, remembering the key as first written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CaseInsensitiveMap {
    entries: BTreeMap<String, (String, String)>,
}

impl CaseInsensitiveMap {
    fn insert(&mut self, key: &str, value: String) {
        if key.is_empty() {
            return;
        }
        let lower = key.to_ascii_lowercase();
        match self.entries.get_mut(&lower) {
            Some((_, v)) => *v = value,
            None => {
                self.entries.insert(lower, (key.to_string(), value));
            }
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(|(_, v)| v.as_str())
    }

    fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(&key.to_ascii_lowercase()).map(|(_, v)| v)
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.values().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}
