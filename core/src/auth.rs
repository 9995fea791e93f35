//! Authentication strategies.
//!
//! # Design
//! A strategy contributes credentials to a call by mutating its query, header
//! and cookie containers. The set of strategies is closed, so they live in the
//! `Authentication` enum and share the `Authenticate` interface. A strategy
//! without credentials contributes nothing, which lets unauthenticated calls
//! go through without the caller checking for credentials first.
//!
//! The client keeps strategies in an `Authentications` map keyed by scheme
//! name and publishes it as an immutable snapshot; see `ApiClient`.

use std::collections::BTreeMap;
use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::param::{Cookie, Header, Query, AUTHORIZATION};

/// Scheme name of the default API-key strategy.
pub const API_KEY: &str = "apiKey";
/// Scheme name of the default HTTP basic strategy.
pub const BASIC: &str = "basic";
/// Scheme name of the default HTTP bearer strategy.
pub const BEARER: &str = "bearer";

/// Strategies by scheme name.
pub type Authentications = BTreeMap<String, Authentication>;

/// Something that can add credentials to an outgoing request.
pub trait Authenticate {
    fn apply(&self, query: &mut Query, headers: &mut Header, cookies: &mut Cookie);
}

/// Where an API key is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyLocation {
    Query,
    Header,
    Cookie,
}

/// API key sent as a query parameter, header or cookie, with an optional
/// prefix separated by a space (`<prefix> <key>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyAuth {
    location: ApiKeyLocation,
    param_name: String,
    api_key: Option<String>,
    api_key_prefix: Option<String>,
}

impl ApiKeyAuth {
    pub fn new(location: ApiKeyLocation, param_name: impl Into<String>) -> Self {
        Self {
            location,
            param_name: param_name.into(),
            api_key: None,
            api_key_prefix: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_key_prefix = Some(prefix.into());
        self
    }

    pub fn set_api_key(&mut self, api_key: impl Into<String>) {
        self.api_key = Some(api_key.into());
    }

    pub fn set_api_key_prefix(&mut self, prefix: impl Into<String>) {
        self.api_key_prefix = Some(prefix.into());
    }

    pub fn location(&self) -> ApiKeyLocation {
        self.location
    }

    pub fn param_name(&self) -> &str {
        &self.param_name
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

impl Authenticate for ApiKeyAuth {
    fn apply(&self, query: &mut Query, headers: &mut Header, cookies: &mut Cookie) {
        let Some(key) = &self.api_key else {
            return;
        };
        let value = match &self.api_key_prefix {
            Some(prefix) => format!("{prefix} {key}"),
            None => key.clone(),
        };
        match self.location {
            ApiKeyLocation::Query => query.insert(&self.param_name, Some(value)),
            ApiKeyLocation::Header => headers.insert(&self.param_name, value),
            ApiKeyLocation::Cookie => cookies.insert(&self.param_name, value),
        }
    }
}

/// HTTP basic authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpBasicAuth {
    username: Option<String>,
    password: Option<String>,
}

impl HttpBasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = Some(username.into());
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = Some(password.into());
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }
}

impl Authenticate for HttpBasicAuth {
    fn apply(&self, _query: &mut Query, headers: &mut Header, _cookies: &mut Cookie) {
        if self.username.is_none() && self.password.is_none() {
            return;
        }
        let credentials = format!(
            "{}:{}",
            self.username.as_deref().unwrap_or_default(),
            self.password.as_deref().unwrap_or_default()
        );
        headers.insert(AUTHORIZATION, format!("Basic {}", BASE64.encode(credentials)));
    }
}

/// HTTP bearer authentication, `Authorization: <Scheme> <token>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpBearerAuth {
    scheme: String,
    bearer_token: Option<String>,
}

impl Default for HttpBearerAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpBearerAuth {
    pub const DEFAULT_SCHEME: &'static str = "bearer";

    pub fn new() -> Self {
        Self::with_scheme(Self::DEFAULT_SCHEME)
    }

    /// An empty scheme sends the bare token.
    pub fn with_scheme(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            bearer_token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn set_bearer_token(&mut self, token: impl Into<String>) {
        self.bearer_token = Some(token.into());
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }
}

impl Authenticate for HttpBearerAuth {
    fn apply(&self, _query: &mut Query, headers: &mut Header, _cookies: &mut Cookie) {
        let Some(token) = &self.bearer_token else {
            return;
        };
        let value = if self.scheme.is_empty() {
            token.clone()
        } else if self.scheme.eq_ignore_ascii_case("bearer") {
            format!("Bearer {token}")
        } else {
            format!("{} {token}", self.scheme)
        };
        headers.insert(AUTHORIZATION, value);
    }
}

/// Variant tag of an [`Authentication`], used to check swaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    ApiKey,
    Basic,
    Bearer,
}

impl fmt::Display for AuthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthKind::ApiKey => "ApiKeyAuth",
            AuthKind::Basic => "HttpBasicAuth",
            AuthKind::Bearer => "HttpBearerAuth",
        };
        f.write_str(name)
    }
}

/// One registered authentication strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    ApiKey(ApiKeyAuth),
    Basic(HttpBasicAuth),
    Bearer(HttpBearerAuth),
}

impl Authentication {
    pub fn kind(&self) -> AuthKind {
        match self {
            Authentication::ApiKey(_) => AuthKind::ApiKey,
            Authentication::Basic(_) => AuthKind::Basic,
            Authentication::Bearer(_) => AuthKind::Bearer,
        }
    }
}

impl Authenticate for Authentication {
    fn apply(&self, query: &mut Query, headers: &mut Header, cookies: &mut Cookie) {
        match self {
            Authentication::ApiKey(auth) => auth.apply(query, headers, cookies),
            Authentication::Basic(auth) => auth.apply(query, headers, cookies),
            Authentication::Bearer(auth) => auth.apply(query, headers, cookies),
        }
    }
}

impl From<ApiKeyAuth> for Authentication {
    fn from(auth: ApiKeyAuth) -> Self {
        Authentication::ApiKey(auth)
    }
}

impl From<HttpBasicAuth> for Authentication {
    fn from(auth: HttpBasicAuth) -> Self {
        Authentication::Basic(auth)
    }
}

impl From<HttpBearerAuth> for Authentication {
    fn from(auth: HttpBearerAuth) -> Self {
        Authentication::Bearer(auth)
    }
}

/// The strategies a new client starts with: an API key in the
/// `Authorization` header, HTTP basic and HTTP bearer, all without credentials.
pub fn default_authentications() -> Authentications {
    let mut auths = Authentications::new();
    auths.insert(
        API_KEY.to_string(),
        ApiKeyAuth::new(ApiKeyLocation::Header, AUTHORIZATION).into(),
    );
    auths.insert(BASIC.to_string(), HttpBasicAuth::default().into());
    auths.insert(BEARER.to_string(), HttpBearerAuth::new().into());
    auths
}

#[cfg(test)]
mod tests {
    use super::*;

    fn containers() -> (Query, Header, Cookie) {
        (Query::new(), Header::new(), Cookie::new())
    }

    #[test]
    fn bearer_with_default_scheme_sets_one_authorization_header() {
        let (mut q, mut h, mut c) = containers();
        HttpBearerAuth::new().with_token("abc").apply(&mut q, &mut h, &mut c);
        let auth: Vec<_> = h.iter().filter(|(k, _)| k.eq_ignore_ascii_case("authorization")).collect();
        assert_eq!(auth, vec![("Authorization", "Bearer abc")]);
    }

    #[test]
    fn bearer_without_token_leaves_headers_unchanged() {
        let (mut q, mut h, mut c) = containers();
        let before = h.clone();
        HttpBearerAuth::new().apply(&mut q, &mut h, &mut c);
        assert_eq!(h, before);
    }

    #[test]
    fn bearer_custom_scheme_is_kept_verbatim() {
        let (mut q, mut h, mut c) = containers();
        HttpBearerAuth::with_scheme("Token").with_token("t").apply(&mut q, &mut h, &mut c);
        assert_eq!(h.get(AUTHORIZATION), Some("Token t"));

        HttpBearerAuth::with_scheme("").with_token("raw").apply(&mut q, &mut h, &mut c);
        assert_eq!(h.get(AUTHORIZATION), Some("raw"));
    }

    #[test]
    fn basic_encodes_credentials() {
        let (mut q, mut h, mut c) = containers();
        HttpBasicAuth::new("admin", "secret").apply(&mut q, &mut h, &mut c);
        assert_eq!(h.get(AUTHORIZATION), Some("Basic YWRtaW46c2VjcmV0"));
    }

    #[test]
    fn basic_with_only_username_still_applies() {
        let (mut q, mut h, mut c) = containers();
        let mut auth = HttpBasicAuth::default();
        auth.set_username("admin");
        auth.apply(&mut q, &mut h, &mut c);
        assert_eq!(h.get(AUTHORIZATION), Some("Basic YWRtaW46"));
    }

    #[test]
    fn basic_without_credentials_is_noop() {
        let (mut q, mut h, mut c) = containers();
        HttpBasicAuth::default().apply(&mut q, &mut h, &mut c);
        assert!(h.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn api_key_routes_by_location() {
        let (mut q, mut h, mut c) = containers();
        ApiKeyAuth::new(ApiKeyLocation::Query, "api_key")
            .with_api_key("k1")
            .apply(&mut q, &mut h, &mut c);
        ApiKeyAuth::new(ApiKeyLocation::Header, "X-Api-Key")
            .with_api_key("k2")
            .with_prefix("Key")
            .apply(&mut q, &mut h, &mut c);
        ApiKeyAuth::new(ApiKeyLocation::Cookie, "key")
            .with_api_key("k3")
            .apply(&mut q, &mut h, &mut c);

        assert_eq!(q.get("api_key"), Some("k1"));
        assert_eq!(h.get("x-api-key"), Some("Key k2"));
        assert_eq!(c.get("KEY"), Some("k3"));
    }

    #[test]
    fn api_key_without_key_is_noop() {
        let (mut q, mut h, mut c) = containers();
        ApiKeyAuth::new(ApiKeyLocation::Query, "api_key").apply(&mut q, &mut h, &mut c);
        assert!(q.is_empty());
    }

    #[test]
    fn default_set_has_three_schemes() {
        let auths = default_authentications();
        assert_eq!(auths[API_KEY].kind(), AuthKind::ApiKey);
        assert_eq!(auths[BASIC].kind(), AuthKind::Basic);
        assert_eq!(auths[BEARER].kind(), AuthKind::Bearer);
    }
}
