use url::form_urlencoded;

/// Query parameters in insertion order.
///
/// A key may be held with an absent value; such entries are dropped when the
/// query string is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    params: Vec<(String, Option<String>)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`. A repeated key keeps its original position and
    /// takes the new value. Empty keys are ignored.
    pub fn add_param(mut self, key: &str, value: impl ToString) -> Self {
        self.insert(key, Some(value.to_string()));
        self
    }

    pub fn add_optional<V: ToString>(mut self, key: &str, value: Option<V>) -> Self {
        self.insert(key, value.map(|v| v.to_string()));
        self
    }

    pub fn insert(&mut self, key: &str, value: Option<String>) {
        if key.is_empty() {
            return;
        }
        match self.params.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.params.push((key.to_string(), value)),
        }
    }

    pub fn init_params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: ToString,
    {
        for (k, v) in params {
            self.insert(k.as_ref(), Some(v.to_string()));
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn clear(&mut self) {
        self.params.clear();
    }

    /// Encode as `k=v&k=v`, form-urlencoding keys and values and skipping
    /// entries without a value.
    pub fn build_query_url(&self) -> String {
        self.params
            .iter()
            .filter_map(|(k, v)| {
                v.as_ref().map(|v| {
                    format!(
                        "{}={}",
                        form_urlencoded::byte_serialize(k.as_bytes()).collect::<String>(),
                        form_urlencoded::byte_serialize(v.as_bytes()).collect::<String>()
                    )
                })
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}
