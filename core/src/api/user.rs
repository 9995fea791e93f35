use std::sync::Arc;

use super::{require, USER_AUTH_NAMES};
use crate::client::ApiClient;
use crate::decode::ResultType;
use crate::error::ApiError;
use crate::request::RequestDescriptor;
use crate::types::{
    ApiResult, CreateUserRequest, CreateUserResponse, UpdateUserRequest, UpdateUserResponse,
    UserInfoResponse,
};

const API_PREFIX: &str = "/api/v1/users";

/// User administration.
#[derive(Debug, Clone)]
pub struct UserApi {
    client: Arc<ApiClient>,
}

impl UserApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    fn descriptor(&self) -> RequestDescriptor {
        RequestDescriptor::new().with_auth_names(USER_AUTH_NAMES)
    }

    pub fn create_user(&self, request: &CreateUserRequest) -> Result<CreateUserResponse, ApiError> {
        let desc = self.descriptor().with_json_body(request)?;
        let response = self.client.post(API_PREFIX, &desc, ResultType::Envelope)?;
        require(response, API_PREFIX)
    }

    pub fn update_user(
        &self,
        user_id: &str,
        request: &UpdateUserRequest,
    ) -> Result<UpdateUserResponse, ApiError> {
        let path = format!("{API_PREFIX}/{user_id}");
        let desc = self.descriptor().with_json_body(request)?;
        let response = self.client.put(&path, &desc, ResultType::Envelope)?;
        require(response, &path)
    }

    pub fn get_user_info(&self, user_id: &str) -> Result<UserInfoResponse, ApiError> {
        let path = format!("{API_PREFIX}/{user_id}");
        let response = self.client.get(&path, &self.descriptor(), ResultType::Envelope)?;
        require(response, &path)
    }

    /// Delete a user; a business code other than success is an
    /// [`ApiError::Service`].
    pub fn delete_user(&self, user_id: &str) -> Result<(), ApiError> {
        let path = format!("{API_PREFIX}/{user_id}");
        let result: ApiResult<serde_json::Value> =
            require(self.client.delete(&path, &self.descriptor(), ResultType::Envelope)?, &path)?;
        if !result.is_success_code() {
            return Err(ApiError::Service {
                code: result.code,
                message: result.msg,
            });
        }
        Ok(())
    }
}
