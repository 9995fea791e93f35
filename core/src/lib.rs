//! Synchronous client for the IAM service.
//!
//! # Overview
//! Every call runs through one pipeline: a [`RequestDescriptor`] carries the
//! headers, query, cookies, body and authentication scheme names; the
//! [`ApiClient`] applies the named strategies, encodes the body, sends the
//! request through a [`Transport`] and hands the response to the decoder
//! selected by a [`ResultType`].
//!
//! # Design
//! - `build_request` and `decode_response` are pure and public, so the I/O
//!   boundary stays explicit and testable without a network.
//! - `ApiClient` is shared across threads. Credentials and decoders live in
//!   copy-on-write snapshots; in-flight calls never observe a partial update.
//! - All failures surface as [`ApiError`].
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod http;
pub mod param;
pub mod request;
pub mod transport;
pub mod types;

pub use api::{AuthenticationApi, UserApi};
pub use auth::{
    ApiKeyAuth, ApiKeyLocation, AuthKind, Authenticate, Authentication, Authentications,
    HttpBasicAuth, HttpBearerAuth,
};
pub use client::ApiClient;
pub use config::{ClientBuilder, ClientConfig, Proxy};
pub use decode::{Decoded, ResponseDecoder, ResultType};
pub use error::{ApiError, ErrorKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use param::{Cookie, Header, MediaType, Query};
pub use request::{Payload, RequestDescriptor};
pub use transport::{Transport, TransportError, UreqTransport};
pub use types::{
    ApiResult, AuthenticationRequest, CreateUserRequest, Metadata, RefreshTokenRequest, TokenInfo,
    UpdateUserRequest, UserInfo,
};
