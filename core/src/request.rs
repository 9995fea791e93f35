//! The per-call request descriptor.

use std::path::PathBuf;

use serde::Serialize;

use crate::auth::{Authenticate, Authentications};
use crate::error::ApiError;
use crate::param::{Cookie, Header, MediaType, Query};

/// A request body before it is encoded for the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(serde_json::Value),
    Bytes(Vec<u8>),
    File(PathBuf),
}

impl Payload {
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ApiError> {
        serde_json::to_value(value)
            .map(Payload::Json)
            .map_err(|e| ApiError::Serialization(e.to_string()))
    }

    /// Encode for `content_type`.
    ///
    /// JSON content types encode JSON values and pass bytes and files through
    /// as already-encoded JSON. Other content types accept only bytes and files.
    pub fn encode(&self, content_type: &MediaType) -> Result<Vec<u8>, ApiError> {
        match self {
            Payload::Json(value) if content_type.is_json() => {
                serde_json::to_vec(value).map_err(|e| ApiError::Serialization(e.to_string()))
            }
            Payload::Json(_) => Err(ApiError::Serialization(format!(
                "serialization for content type '{content_type}' not supported"
            ))),
            Payload::Bytes(bytes) => Ok(bytes.clone()),
            Payload::File(path) => std::fs::read(path).map_err(|e| {
                ApiError::Serialization(format!("failed to read {}: {e}", path.display()))
            }),
        }
    }
}

/// Everything one call sends besides its method and path: headers, query,
/// cookies, an optional body and the authentication schemes it requires.
///
/// The descriptor is not modified by execution; authentication is applied to
/// a copy of its containers.
#[derive(Debug, Clone, Default)]
pub struct RequestDescriptor {
    headers: Header,
    query: Query,
    cookies: Cookie,
    body: Option<Payload>,
    auth_names: Vec<String>,
}

impl RequestDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the entries the caller set on `headers` over the current ones.
    /// Defaults `headers` merely carries never overwrite an earlier value.
    pub fn with_headers(mut self, headers: Header) -> Self {
        self.headers.add_all(headers.explicit());
        self
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    pub fn with_cookies(mut self, cookies: Cookie) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_body(mut self, body: Payload) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_json_body<T: Serialize + ?Sized>(self, body: &T) -> Result<Self, ApiError> {
        Ok(self.with_body(Payload::json(body)?))
    }

    pub fn with_auth_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.auth_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn headers(&self) -> &Header {
        &self.headers
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn cookies(&self) -> &Cookie {
        &self.cookies
    }

    pub fn body(&self) -> Option<&Payload> {
        self.body.as_ref()
    }

    pub fn auth_names(&self) -> &[String] {
        &self.auth_names
    }

    /// Copy the containers and run every named strategy over them in order.
    ///
    /// Fails before applying anything if a name has no registered strategy.
    pub fn authenticated_params(
        &self,
        auths: &Authentications,
    ) -> Result<(Query, Header, Cookie), ApiError> {
        let strategies = self
            .auth_names
            .iter()
            .map(|name| {
                auths
                    .get(name)
                    .ok_or_else(|| ApiError::config(format!("authentication undefined: {name}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut query = self.query.clone();
        let mut headers = self.headers.clone();
        let mut cookies = self.cookies.clone();
        for strategy in strategies {
            strategy.apply(&mut query, &mut headers, &mut cookies);
        }
        Ok((query, headers, cookies))
    }
}
