use std::sync::Arc;

use super::{require, USER_AUTH_NAMES};
use crate::client::ApiClient;
use crate::decode::ResultType;
use crate::error::ApiError;
use crate::request::RequestDescriptor;
use crate::types::{
    AuthenticationRequest, AuthenticationResponse, RefreshTokenRequest, RefreshTokenResponse,
    UserInfoResponse,
};

const LOGIN_API: &str = "/api/v1/login";
const REFRESH_TOKEN_API: &str = "/api/v1/token/refresh";
const CURRENT_USER_API: &str = "/api/v1/users/me";

/// Login, token refresh and the signed-in user's profile.
#[derive(Debug, Clone)]
pub struct AuthenticationApi {
    client: Arc<ApiClient>,
}

impl AuthenticationApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    /// Exchange a username and password for tokens. Sends no credentials of
    /// its own.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<AuthenticationResponse, ApiError> {
        let request = AuthenticationRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let desc = RequestDescriptor::new().with_json_body(&request)?;
        let response = self.client.post(LOGIN_API, &desc, ResultType::Envelope)?;
        require(response, LOGIN_API)
    }

    pub fn refresh_token(&self, refresh_token: &str) -> Result<RefreshTokenResponse, ApiError> {
        let request = RefreshTokenRequest {
            refresh_token: refresh_token.to_string(),
        };
        let desc = RequestDescriptor::new().with_json_body(&request)?;
        let response = self.client.post(REFRESH_TOKEN_API, &desc, ResultType::Envelope)?;
        require(response, REFRESH_TOKEN_API)
    }

    pub fn current_user_info(&self) -> Result<UserInfoResponse, ApiError> {
        let desc = RequestDescriptor::new().with_auth_names(USER_AUTH_NAMES);
        let response = self.client.get(CURRENT_USER_API, &desc, ResultType::Envelope)?;
        require(response, CURRENT_USER_API)
    }
}
