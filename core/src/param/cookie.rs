use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use super::CaseInsensitiveMap;

// RFC 6265 separators a cookie name may not contain, plus `%` itself.
const NAME_ENCODE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'(')
    .add(b')')
    .add(b',')
    .add(b'/')
    .add(b':')
    .add(b';')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'{')
    .add(b'}');

const VALUE_ENCODE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b',')
    .add(b';')
    .add(b'\\');

/// Request cookies with case-insensitive names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookie {
    inner: CaseInsensitiveMap,
}

impl Cookie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.inner.insert(key, value.into());
    }

    pub fn add_all<K, V>(&mut self, params: impl IntoIterator<Item = (K, V)>)
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        for (k, v) in params {
            self.inner.insert(k.as_ref(), v.into());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Render as a `Cookie` request header value, `None` when empty.
    ///
    /// Characters that would split or end a cookie pair are percent-encoded,
    /// so every entry stays exactly one cookie on the wire.
    pub fn to_header_value(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        Some(
            self.iter()
                .map(|(k, v)| {
                    format!(
                        "{}={}",
                        utf8_percent_encode(k, NAME_ENCODE),
                        utf8_percent_encode(v, VALUE_ENCODE)
                    )
                })
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}
