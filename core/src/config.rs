//! Client configuration and the builder that produces an `ApiClient`.
//!
//! # Design
//! `ClientBuilder` collects settings and `build()` copies them into a
//! validated `ClientConfig` owned by the new client. The builder can be
//! reused or changed afterwards without affecting clients it already built.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::transport::{Transport, UreqTransport};

pub const DEFAULT_BASE_URL: &str = "https://iam.wecoding.top";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Forward proxy with optional credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Proxy {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

/// Settings a built client runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub response_timeout: Option<Duration>,
    pub retry_max_attempts: u32,
    pub retry_max_elapsed: Duration,
    pub proxy: Option<Proxy>,
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            response_timeout: None,
            retry_max_attempts: 0,
            retry_max_elapsed: Duration::ZERO,
            proxy: None,
            user_agent: Some(concat!("iam-sdk-rust/", env!("CARGO_PKG_VERSION")).to_string()),
        }
    }
}

/// Builder for [`ApiClient`].
#[derive(Clone, Default)]
pub struct ClientBuilder {
    base_url: Option<String>,
    connect_timeout: Option<Duration>,
    response_timeout: Option<Duration>,
    retry_max_attempts: Option<u32>,
    retry_max_elapsed: Option<Duration>,
    proxy_host: Option<String>,
    proxy_port: Option<u16>,
    proxy_username: Option<String>,
    proxy_password: Option<String>,
    user_agent: Option<String>,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a builder from `IAM_*` environment variables.
    pub fn from_env() -> Result<Self, ApiError> {
        let mut builder = Self::new();
        if let Some(url) = env_var("IAM_BASE_URL") {
            builder = builder.base_url(url);
        }
        if let Some(secs) = env_var("IAM_CONNECT_TIMEOUT_SECS") {
            builder = builder.connect_timeout(Duration::from_secs(parse_env("IAM_CONNECT_TIMEOUT_SECS", &secs)?));
        }
        builder.proxy_host = env_var("IAM_PROXY_HOST");
        if let Some(port) = env_var("IAM_PROXY_PORT") {
            builder.proxy_port = Some(parse_env("IAM_PROXY_PORT", &port)?);
        }
        builder.proxy_username = env_var("IAM_PROXY_USERNAME");
        builder.proxy_password = env_var("IAM_PROXY_PASSWORD");
        Ok(builder)
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn proxy(mut self, proxy: Proxy) -> Self {
        self.proxy_host = Some(proxy.host);
        self.proxy_port = Some(proxy.port);
        self.proxy_username = proxy.username;
        self.proxy_password = proxy.password;
        self
    }

    /// Credentials for the proxy; requires a proxy host and port at `build()`.
    pub fn proxy_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.proxy_username = Some(username.into());
        self.proxy_password = Some(password.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }

    pub fn retry_max_attempts(mut self, attempts: u32) -> Self {
        self.retry_max_attempts = Some(attempts);
        self
    }

    pub fn retry_max_elapsed(mut self, elapsed: Duration) -> Self {
        self.retry_max_elapsed = Some(elapsed);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Use `transport` instead of the default ureq transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Validate the collected settings into a `ClientConfig`.
    pub fn config(&self) -> Result<ClientConfig, ApiError> {
        let defaults = ClientConfig::default();

        let base_url = self.base_url.clone().unwrap_or(defaults.base_url);
        validate_base_url(&base_url)?;

        let has_credentials = self.proxy_username.is_some() || self.proxy_password.is_some();
        let proxy = match (&self.proxy_host, self.proxy_port) {
            (Some(host), Some(port)) if !host.is_empty() && port != 0 => Some(Proxy {
                host: host.clone(),
                port,
                username: self.proxy_username.clone(),
                password: self.proxy_password.clone(),
            }),
            (None, None) if !has_credentials => None,
            _ if has_credentials => {
                return Err(ApiError::config(
                    "proxy credentials require both a proxy host and port",
                ))
            }
            _ => return Err(ApiError::config("proxy requires both a host and a non-zero port")),
        };

        Ok(ClientConfig {
            base_url,
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            response_timeout: self.response_timeout.or(defaults.response_timeout),
            retry_max_attempts: self.retry_max_attempts.unwrap_or(defaults.retry_max_attempts),
            retry_max_elapsed: self.retry_max_elapsed.unwrap_or(defaults.retry_max_elapsed),
            proxy,
            user_agent: self.user_agent.clone().or(defaults.user_agent),
        })
    }

    /// Build a client from a copy of the current settings.
    pub fn build(&self) -> Result<ApiClient, ApiError> {
        let config = self.config()?;
        let transport: Arc<dyn Transport> = match &self.transport {
            Some(transport) => Arc::clone(transport),
            None => Arc::new(UreqTransport::new(&config)?),
        };
        Ok(ApiClient::with_transport(config, transport))
    }
}

pub(crate) fn validate_base_url(base_url: &str) -> Result<(), ApiError> {
    let url = Url::parse(base_url)
        .map_err(|e| ApiError::config(format!("invalid base URL {base_url:?}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ApiError::config(format!("unsupported base URL scheme {other}"))),
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ApiError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ApiError::config(format!("{name}={value:?}: {e}")))
}
