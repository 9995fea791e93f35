//! The request-execution pipeline.
//!
//! # Design
//! `ApiClient` is long-lived and shared across threads. Each call runs in
//! two halves that are also public on their own:
//!
//! - `build_request` resolves the named authentication strategies against the
//!   current snapshot, applies them to a copy of the descriptor's containers,
//!   encodes the body and produces an `HttpRequest`. No I/O happens here.
//! - `decode_response` selects a decoder by `ResultType` and binds the
//!   decoded value to the caller's type.
//!
//! `execute` joins them with a `Transport::send` in between.
//!
//! The authentication map and the decoder registry are immutable snapshots
//! behind `ArcSwap` handles. Writers clone the current snapshot, change the
//! clone and publish it whole, so a call in flight sees either the old map or
//! the new one, never a mix.

use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::auth::{default_authentications, AuthKind, Authentication, Authentications};
use crate::config::{validate_base_url, ClientBuilder, ClientConfig};
use crate::decode::{DecoderRegistry, ResponseDecoder, ResultType};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::request::RequestDescriptor;
use crate::transport::Transport;

/// Client for the IAM HTTP API.
pub struct ApiClient {
    config: ClientConfig,
    base_url: ArcSwap<String>,
    transport: Arc<dyn Transport>,
    authentications: ArcSwap<Authentications>,
    decoders: ArcSwap<DecoderRegistry>,
    // Serializes copy-on-write updates; readers never take it.
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url())
            .field("config", &self.config)
            .field("schemes", &self.authentications.load().keys().collect::<Vec<_>>())
            .field("decoders", &self.decoders.load())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// A client with default configuration and the ureq transport.
    pub fn new() -> Result<Self, ApiError> {
        ClientBuilder::new().build()
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: ArcSwap::from_pointee(config.base_url.clone()),
            config,
            transport,
            authentications: ArcSwap::from_pointee(default_authentications()),
            decoders: ArcSwap::from_pointee(DecoderRegistry::default()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn base_url(&self) -> String {
        self.base_url.load().as_ref().clone()
    }

    /// Point later calls at `base_url`; it must be an absolute http(s) URL.
    pub fn set_base_url(&self, base_url: impl Into<String>) -> Result<(), ApiError> {
        let base_url = base_url.into();
        validate_base_url(&base_url)?;
        self.base_url.store(Arc::new(base_url));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Authentication
    // -----------------------------------------------------------------------

    /// The current authentication snapshot.
    pub fn authentications(&self) -> Arc<Authentications> {
        self.authentications.load_full()
    }

    pub fn authentication(&self, name: &str) -> Option<Authentication> {
        self.authentications.load().get(name).cloned()
    }

    /// Replace the strategy registered under `name` with one of the same kind.
    pub fn replace_authentication(
        &self,
        name: &str,
        authentication: impl Into<Authentication>,
    ) -> Result<(), ApiError> {
        let authentication = authentication.into();
        self.update_authentications(|auths| {
            let previous = auths
                .get(name)
                .ok_or_else(|| ApiError::config(format!("{name} authentication not configured")))?;
            if previous.kind() != authentication.kind() {
                return Err(ApiError::config(format!(
                    "{} cannot replace authentication {name} ({})",
                    authentication.kind(),
                    previous.kind()
                )));
            }
            auths.insert(name.to_string(), authentication);
            Ok(())
        })?;
        info!(scheme = name, "authentication replaced");
        Ok(())
    }

    /// Set the key of the first API-key strategy.
    pub fn set_api_key(&self, api_key: impl Into<String>) -> Result<(), ApiError> {
        let api_key = api_key.into();
        self.update_first(AuthKind::ApiKey, |auth| {
            if let Authentication::ApiKey(auth) = auth {
                auth.set_api_key(api_key);
            }
        })
    }

    /// Set the key prefix of the first API-key strategy.
    pub fn set_api_key_prefix(&self, prefix: impl Into<String>) -> Result<(), ApiError> {
        let prefix = prefix.into();
        self.update_first(AuthKind::ApiKey, |auth| {
            if let Authentication::ApiKey(auth) = auth {
                auth.set_api_key_prefix(prefix);
            }
        })
    }

    pub fn set_bearer_token(&self, token: impl Into<String>) -> Result<(), ApiError> {
        let token = token.into();
        self.update_first(AuthKind::Bearer, |auth| {
            if let Authentication::Bearer(auth) = auth {
                auth.set_bearer_token(token);
            }
        })
    }

    pub fn set_basic_credentials(
        &self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<(), ApiError> {
        let (username, password) = (username.into(), password.into());
        self.update_first(AuthKind::Basic, |auth| {
            if let Authentication::Basic(auth) = auth {
                auth.set_username(username);
                auth.set_password(password);
            }
        })
    }

    fn update_first(
        &self,
        kind: AuthKind,
        f: impl FnOnce(&mut Authentication),
    ) -> Result<(), ApiError> {
        self.update_authentications(|auths| {
            let auth = auths
                .values_mut()
                .find(|a| a.kind() == kind)
                .ok_or_else(|| ApiError::config(format!("no {kind} authentication configured")))?;
            f(auth);
            Ok(())
        })
    }

    fn update_authentications<R>(
        &self,
        f: impl FnOnce(&mut Authentications) -> Result<R, ApiError>,
    ) -> Result<R, ApiError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = Authentications::clone(&self.authentications.load());
        let out = f(&mut next)?;
        self.authentications.store(Arc::new(next));
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Decoders
    // -----------------------------------------------------------------------

    /// Register `decoder` for `result_type`; the last registration wins.
    pub fn register_decoder(&self, result_type: ResultType, decoder: Arc<dyn ResponseDecoder>) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = DecoderRegistry::clone(&self.decoders.load());
        next.register(result_type, decoder);
        self.decoders.store(Arc::new(next));
    }

    // -----------------------------------------------------------------------
    // Verbs
    // -----------------------------------------------------------------------

    pub fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        request: &RequestDescriptor,
        result_type: ResultType,
    ) -> Result<Option<T>, ApiError> {
        self.execute(HttpMethod::Get, path, request, result_type)
    }

    pub fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        request: &RequestDescriptor,
        result_type: ResultType,
    ) -> Result<Option<T>, ApiError> {
        self.execute(HttpMethod::Post, path, request, result_type)
    }

    pub fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        request: &RequestDescriptor,
        result_type: ResultType,
    ) -> Result<Option<T>, ApiError> {
        self.execute(HttpMethod::Put, path, request, result_type)
    }

    pub fn patch<T: DeserializeOwned>(
        &self,
        path: &str,
        request: &RequestDescriptor,
        result_type: ResultType,
    ) -> Result<Option<T>, ApiError> {
        self.execute(HttpMethod::Patch, path, request, result_type)
    }

    pub fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        request: &RequestDescriptor,
        result_type: ResultType,
    ) -> Result<Option<T>, ApiError> {
        self.execute(HttpMethod::Delete, path, request, result_type)
    }

    /// Build, send and decode one call. `Ok(None)` means the service
    /// answered with success and no entity.
    pub fn execute<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        request: &RequestDescriptor,
        result_type: ResultType,
    ) -> Result<Option<T>, ApiError> {
        let http_request = self.build_request(method, path, request)?;
        // the query may carry an API key
        let endpoint = http_request
            .url
            .split_once('?')
            .map_or(http_request.url.as_str(), |(endpoint, _)| endpoint);
        debug!(method = %method, url = %endpoint, "sending request");

        let response = self
            .transport
            .send(&http_request)
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        debug!(status = response.status, "received response");

        self.decode_response(&response, &result_type)
    }

    /// Assemble the wire request for one call without sending it.
    pub fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        request: &RequestDescriptor,
    ) -> Result<HttpRequest, ApiError> {
        let auths = self.authentications.load();
        let (query, mut headers, cookies) = request.authenticated_params(&auths)?;

        let content_type = headers.content_type()?;
        let body = match request.body() {
            Some(_) if !method.allows_body() => {
                return Err(ApiError::BodyNotAllowed {
                    method: method.to_string(),
                })
            }
            Some(payload) => payload.encode(&content_type)?,
            None => Vec::new(),
        };

        if let Some(cookie) = cookies.to_header_value() {
            headers.insert("Cookie", cookie);
        }
        if let Some(user_agent) = &self.config.user_agent {
            if headers.get("User-Agent").is_none() {
                headers.insert("User-Agent", user_agent.as_str());
            }
        }

        Ok(HttpRequest {
            method,
            url: build_url(&self.base_url.load(), path, &query.build_query_url()),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body,
        })
    }

    /// Decode a response with the decoder registered for `result_type`.
    pub fn decode_response<T: DeserializeOwned>(
        &self,
        response: &HttpResponse,
        result_type: &ResultType,
    ) -> Result<Option<T>, ApiError> {
        let decoder = self.decoders.load().select(result_type);
        debug!(result_type = result_type.key(), "decoding response");
        decoder.decode(response)?.into_typed()
    }
}

/// Join base URL, path and encoded query with exactly one `/` between base
/// and path and one `?` (or `&` if the path already has a query) before the
/// query string.
fn build_url(base: &str, path: &str, query: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    let mut url = if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    };
    if !query.is_empty() {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(query);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{HttpBearerAuth, BEARER};
    use crate::param::{Cookie, Query, AUTHORIZATION};
    use crate::request::Payload;
    use crate::transport::TransportError;

    struct Canned(HttpResponse);

    impl Transport for Canned {
        fn send(&self, _request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            Ok(self.0.clone())
        }
    }

    fn client() -> ApiClient {
        let config = ClientConfig {
            base_url: "http://localhost:8001/".to_string(),
            user_agent: None,
            ..ClientConfig::default()
        };
        ApiClient::with_transport(config, Arc::new(Canned(HttpResponse::new(200))))
    }

    #[test]
    fn build_url_joins_with_single_separators() {
        assert_eq!(build_url("http://h/", "/api/v1", ""), "http://h/api/v1");
        assert_eq!(build_url("http://h", "api/v1", "a=1"), "http://h/api/v1?a=1");
        assert_eq!(build_url("http://h//", "//x", ""), "http://h/x");
        assert_eq!(build_url("http://h", "x?y=1", "a=1"), "http://h/x?y=1&a=1");
        assert_eq!(build_url("http://h", "", "a=1"), "http://h?a=1");
    }

    #[test]
    fn get_request_has_empty_entity_and_default_headers() {
        let req = client()
            .build_request(HttpMethod::Get, "/api/v1/users/u-1", &RequestDescriptor::new())
            .unwrap();
        assert_eq!(req.url, "http://localhost:8001/api/v1/users/u-1");
        assert!(req.body.is_empty());
        assert_eq!(req.header("content-type"), Some("application/json;charset=UTF-8"));
        assert_eq!(req.header("accept-charset"), Some("UTF-8"));
        assert!(req.header("user-agent").is_none());
    }

    #[test]
    fn get_with_body_is_rejected() {
        let desc = RequestDescriptor::new().with_body(Payload::Bytes(b"x".to_vec()));
        let err = client().build_request(HttpMethod::Get, "/x", &desc).unwrap_err();
        assert!(matches!(err, ApiError::BodyNotAllowed { method } if method == "GET"));
    }

    #[test]
    fn post_encodes_json_body() {
        let desc = RequestDescriptor::new()
            .with_json_body(&serde_json::json!({"name": "alice"}))
            .unwrap();
        let req = client().build_request(HttpMethod::Post, "/api/v1/users", &desc).unwrap();
        let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(body["name"], "alice");
    }

    #[test]
    fn delete_and_patch_accept_bodies() {
        let desc = RequestDescriptor::new().with_json_body("u-1").unwrap();
        for method in [HttpMethod::Delete, HttpMethod::Patch, HttpMethod::Put] {
            let req = client().build_request(method, "/x", &desc).unwrap();
            assert_eq!(req.body, br#""u-1""#.to_vec(), "{method}");
        }
    }

    #[test]
    fn malformed_content_type_fails_before_send() {
        let desc = RequestDescriptor::new()
            .with_headers(crate::param::Header::new().add_param("Content-Type", "bogus"));
        let err = client().build_request(HttpMethod::Get, "/x", &desc).unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[test]
    fn query_and_cookies_reach_the_wire_request() {
        let desc = RequestDescriptor::new()
            .with_query(Query::new().add_param("q", "a b").add_optional::<String>("skip", None))
            .with_cookies(Cookie::new().add_param("SESSION", "s1"));
        let req = client().build_request(HttpMethod::Get, "/search", &desc).unwrap();
        assert_eq!(req.url, "http://localhost:8001/search?q=a+b");
        assert_eq!(req.header("cookie"), Some("SESSION=s1"));
    }

    #[test]
    fn api_key_in_query_is_part_of_the_url() {
        let client = client();
        client
            .replace_authentication(
                "apiKey",
                crate::auth::ApiKeyAuth::new(crate::auth::ApiKeyLocation::Query, "api_key"),
            )
            .unwrap();
        client.set_api_key("k-1").unwrap();
        let desc = RequestDescriptor::new().with_auth_names(["apiKey"]);
        let req = client.build_request(HttpMethod::Get, "/x", &desc).unwrap();
        assert_eq!(req.url, "http://localhost:8001/x?api_key=k-1");
    }

    #[test]
    fn swap_rejects_other_kinds_and_unknown_names() {
        let client = client();
        let err = client
            .replace_authentication(BEARER, crate::auth::HttpBasicAuth::new("a", "b"))
            .unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));

        let err = client
            .replace_authentication("oauth2", HttpBearerAuth::new())
            .unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[test]
    fn helpers_update_the_snapshot() {
        let client = client();
        let before = client.authentications();
        client.set_bearer_token("t-1").unwrap();
        client.set_basic_credentials("admin", "pw").unwrap();

        // the old snapshot is unchanged
        assert_eq!(before[BEARER], Authentication::from(HttpBearerAuth::new()));

        let desc = RequestDescriptor::new().with_auth_names([BEARER]);
        let req = client.build_request(HttpMethod::Get, "/x", &desc).unwrap();
        assert_eq!(req.header(AUTHORIZATION), Some("Bearer t-1"));
    }

    #[test]
    fn base_url_can_be_changed() {
        let client = client();
        client.set_base_url("https://iam.example.com").unwrap();
        let req = client.build_request(HttpMethod::Get, "/x", &RequestDescriptor::new()).unwrap();
        assert_eq!(req.url, "https://iam.example.com/x");

        for bad in ["iam.example.com", "ftp://iam.example.com"] {
            let err = client.set_base_url(bad).unwrap_err();
            assert!(matches!(err, ApiError::Config(_)), "{bad}");
        }
        assert_eq!(client.base_url(), "https://iam.example.com");
    }

    #[test]
    fn user_agent_is_added_when_configured() {
        let client = ApiClient::with_transport(
            ClientConfig::default(),
            Arc::new(Canned(HttpResponse::new(200))),
        );
        let req = client.build_request(HttpMethod::Get, "/x", &RequestDescriptor::new()).unwrap();
        assert!(req.header("User-Agent").unwrap().starts_with("iam-sdk-rust/"));
    }

    #[test]
    #[tracing_test::traced_test]
    fn execute_logs_dispatch() {
        let result: Option<String> = client()
            .get("/ping", &RequestDescriptor::new(), ResultType::Void)
            .unwrap();
        assert_eq!(result, None);
        assert!(logs_contain("sending request"));
        assert!(logs_contain("http://localhost:8001/ping"));
    }

    #[test]
    #[tracing_test::traced_test]
    fn dispatch_log_omits_query_credentials() {
        let client = client();
        client
            .replace_authentication(
                "apiKey",
                crate::auth::ApiKeyAuth::new(crate::auth::ApiKeyLocation::Query, "api_key")
                    .with_api_key("SUPERSECRET"),
            )
            .unwrap();
        let desc = RequestDescriptor::new().with_auth_names(["apiKey"]);
        let _: Option<String> = client.get("/x", &desc, ResultType::Void).unwrap();
        assert!(logs_contain("http://localhost:8001/x"));
        assert!(!logs_contain("SUPERSECRET"));
    }
}
