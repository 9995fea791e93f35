//! Service envelope and DTOs for the IAM API.
//!
//! # Design
//! These types are defined independently from the mock-server crate; the
//! integration tests catch schema drift between the two.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// The service's standard response wrapper.
///
/// `code` is the business result and is independent of the HTTP status;
/// [`ApiResult::SUCCESS_CODE`] marks success.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResult<T> {
    #[serde(default)]
    pub code: i64,
    #[serde(default = "default_msg")]
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

fn default_msg() -> String {
    "success".to_string()
}

impl<T> ApiResult<T> {
    pub const SUCCESS_CODE: i64 = 100001;

    pub fn success(data: T) -> Self {
        Self {
            code: Self::SUCCESS_CODE,
            msg: default_msg(),
            data: Some(data),
            request_id: None,
            headers: None,
        }
    }

    pub fn is_success_code(&self) -> bool {
        self.code == Self::SUCCESS_CODE
    }

    /// Success code with a payload present.
    pub fn is_success(&self) -> bool {
        self.is_success_code() && self.data.is_some()
    }

    /// The payload of a successful result.
    ///
    /// A non-success code becomes [`ApiError::Service`]; a success without a
    /// payload is a deserialization error.
    pub fn into_data(self) -> Result<T, ApiError> {
        if !self.is_success_code() {
            return Err(ApiError::Service {
                code: self.code,
                message: self.msg,
            });
        }
        self.data
            .ok_or_else(|| ApiError::Deserialization("envelope has no data".to_string()))
    }
}

/// Access and refresh tokens issued by the service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenInfo {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default)]
    pub instance_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extend: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub user_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Payload for creating a user. Optional profile fields are omitted from the
/// JSON when unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
}

impl CreateUserRequest {
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn user_type(mut self, user_type: impl Into<String>) -> Self {
        self.user_type = Some(user_type.into());
        self
    }
}

/// Partial profile update; only fields present in the JSON are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
}

pub type AuthenticationResponse = ApiResult<TokenInfo>;
pub type RefreshTokenResponse = ApiResult<TokenInfo>;
pub type UserInfoResponse = ApiResult<UserInfo>;
pub type CreateUserResponse = ApiResult<UserInfo>;
pub type UpdateUserResponse = ApiResult<UserInfo>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_defaults_missing_fields() {
        let result: ApiResult<TokenInfo> = serde_json::from_str(r#"{"code":1}"#).unwrap();
        assert_eq!(result.code, 1);
        assert_eq!(result.msg, "success");
        assert!(result.data.is_none());
        assert!(!result.is_success_code());
    }

    #[test]
    fn token_envelope_deserializes_without_default_payload() {
        fn decode<T: serde::de::DeserializeOwned>(json: &str) -> T {
            serde_json::from_str(json).unwrap()
        }
        let result: AuthenticationResponse = decode(
            r#"{"code":100001,"msg":"success","data":{"access_token":"a","token_type":"Bearer","refresh_token":"r","expires_in":7200}}"#,
        );
        let token = result.into_data().unwrap();
        assert_eq!(token.access_token, "a");
        assert_eq!(token.refresh_token.as_deref(), Some("r"));

        let empty: RefreshTokenResponse = decode(r#"{"code":200401,"msg":"unauthorized"}"#);
        assert!(empty.data.is_none());
    }

    #[test]
    fn into_data_maps_business_failure() {
        let result: ApiResult<UserInfo> =
            serde_json::from_str(r#"{"code":200404,"msg":"user not found"}"#).unwrap();
        let err = result.into_data().unwrap_err();
        assert!(matches!(err, ApiError::Service { code: 200404, .. }));
    }

    #[test]
    fn success_without_data_is_not_success() {
        let result: ApiResult<UserInfo> =
            serde_json::from_str(r#"{"code":100001,"msg":"success"}"#).unwrap();
        assert!(result.is_success_code());
        assert!(!result.is_success());
        assert!(matches!(result.into_data(), Err(ApiError::Deserialization(_))));
    }

    #[test]
    fn user_info_uses_camel_case() {
        let json = r#"{"metadata":{"instanceId":"u-1","name":"alice","createdAt":"2024-01-01"},"userType":"admin"}"#;
        let user: UserInfo = serde_json::from_str(json).unwrap();
        assert_eq!(user.metadata.instance_id, "u-1");
        assert_eq!(user.user_type.as_deref(), Some("admin"));
    }

    #[test]
    fn create_user_omits_unset_fields() {
        let req = CreateUserRequest::new("alice", "pw").email("a@example.com");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["name"], "alice");
        assert_eq!(json["email"], "a@example.com");
        assert!(json.get("alias").is_none());
        assert!(json.get("userType").is_none());
    }

    #[test]
    fn refresh_request_field_name() {
        let json = serde_json::to_value(RefreshTokenRequest {
            refresh_token: "r".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"refreshToken": "r"}));
    }
}
