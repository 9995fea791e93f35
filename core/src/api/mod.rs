//! Typed IAM endpoints built on the client pipeline.

mod authentication;
mod user;

pub use authentication::AuthenticationApi;
pub use user::UserApi;

use crate::error::ApiError;

/// Schemes required by endpoints that act on behalf of a signed-in user.
const USER_AUTH_NAMES: [&str; 2] = [crate::auth::BASIC, crate::auth::BEARER];

/// Every endpoint answers with an envelope; no entity is a protocol error.
fn require<T>(value: Option<T>, endpoint: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::Deserialization(format!("{endpoint}: response has no body")))
}
