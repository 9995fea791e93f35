//! In-memory emulation of the IAM service used by the client's tests.
//!
//! Every response, success or failure, is wrapped in the service envelope
//! `{code, msg, data}`. Unknown credentials yield HTTP 401, unknown users on
//! reads yield HTTP 404, and deleting an unknown user answers HTTP 200 with a
//! non-success business code.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{info, warn};
use uuid::Uuid;

pub const SUCCESS_CODE: i64 = 100001;
pub const UNAUTHORIZED_CODE: i64 = 200401;
pub const NOT_FOUND_CODE: i64 = 200404;
pub const CONFLICT_CODE: i64 = 200409;

/// Seeded account every fresh server accepts.
pub const ADMIN_USERNAME: &str = "ADMIN";
pub const ADMIN_PASSWORD: &str = "WECODING";

const TOKEN_TTL_SECS: i64 = 7200;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    fn ok(data: T) -> Self {
        Self {
            code: SUCCESS_CODE,
            msg: "success".to_string(),
            data: Some(data),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenInfo {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub instance_id: String,
    pub name: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub metadata: Metadata,
    pub alias: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub user_type: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub name: String,
    pub password: String,
    pub alias: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub user_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    pub alias: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub user_type: Option<String>,
}

struct Account {
    password: String,
    info: UserInfo,
}

#[derive(Default)]
pub struct Store {
    users: HashMap<String, Account>,
    access_tokens: HashMap<String, String>,
    refresh_tokens: HashMap<String, String>,
}

impl Store {
    fn with_admin() -> Self {
        let mut store = Self::default();
        store.insert_user(ADMIN_USERNAME, ADMIN_PASSWORD, UserInfo {
            user_type: Some("admin".to_string()),
            ..UserInfo::default()
        });
        store
    }

    fn insert_user(&mut self, name: &str, password: &str, mut info: UserInfo) -> UserInfo {
        let now = now();
        info.metadata = Metadata {
            instance_id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Some(now.clone()),
            updated_at: Some(now),
        };
        self.users.insert(
            info.metadata.instance_id.clone(),
            Account {
                password: password.to_string(),
                info: info.clone(),
            },
        );
        info
    }

    fn find_by_credentials(&self, name: &str, password: &str) -> Option<&UserInfo> {
        self.users
            .values()
            .find(|a| a.info.metadata.name == name && a.password == password)
            .map(|a| &a.info)
    }

    fn issue_tokens(&mut self, user_id: &str) -> TokenInfo {
        let access = Uuid::new_v4().simple().to_string();
        let refresh = Uuid::new_v4().simple().to_string();
        self.access_tokens.insert(access.clone(), user_id.to_string());
        self.refresh_tokens.insert(refresh.clone(), user_id.to_string());
        TokenInfo {
            access_token: access,
            token_type: "Bearer".to_string(),
            refresh_token: refresh,
            expires_in: TOKEN_TTL_SECS,
        }
    }

    /// Resolve the caller from a `Bearer` token or `Basic` credentials.
    fn caller(&self, headers: &HeaderMap) -> Option<String> {
        let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
        if let Some(token) = value.strip_prefix("Bearer ") {
            return self.access_tokens.get(token).cloned();
        }
        let encoded = value.strip_prefix("Basic ")?;
        let decoded = String::from_utf8(BASE64.decode(encoded).ok()?).ok()?;
        let (name, password) = decoded.split_once(':')?;
        self.find_by_credentials(name, password)
            .map(|info| info.metadata.instance_id.clone())
    }
}

pub type Db = Arc<RwLock<Store>>;

/// An error reply: HTTP status plus an envelope without data.
#[derive(Debug)]
pub struct Failure {
    status: StatusCode,
    code: i64,
    msg: &'static str,
}

impl Failure {
    fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: UNAUTHORIZED_CODE,
            msg: "unauthorized",
        }
    }

    fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: NOT_FOUND_CODE,
            msg: "user not found",
        }
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let body = Envelope::<()> {
            code: self.code,
            msg: self.msg.to_string(),
            data: None,
        };
        (self.status, Json(body)).into_response()
    }
}

type Reply<T> = Result<Json<Envelope<T>>, Failure>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::with_admin()));
    Router::new()
        .route("/api/v1/login", post(login))
        .route("/api/v1/token/refresh", post(refresh_token))
        .route("/api/v1/users", post(create_user))
        .route("/api/v1/users/me", get(current_user))
        .route(
            "/api/v1/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn login(State(db): State<Db>, Json(input): Json<LoginRequest>) -> Reply<TokenInfo> {
    let mut store = db.write().await;
    let Some(user_id) = store
        .find_by_credentials(&input.username, &input.password)
        .map(|info| info.metadata.instance_id.clone())
    else {
        warn!(username = %input.username, "login rejected");
        return Err(Failure::unauthorized());
    };
    info!(username = %input.username, "login");
    Ok(Json(Envelope::ok(store.issue_tokens(&user_id))))
}

async fn refresh_token(
    State(db): State<Db>,
    Json(input): Json<RefreshRequest>,
) -> Reply<TokenInfo> {
    let mut store = db.write().await;
    let user_id = store
        .refresh_tokens
        .remove(&input.refresh_token)
        .ok_or_else(Failure::unauthorized)?;
    Ok(Json(Envelope::ok(store.issue_tokens(&user_id))))
}

async fn current_user(State(db): State<Db>, headers: HeaderMap) -> Reply<UserInfo> {
    let store = db.read().await;
    let user_id = store.caller(&headers).ok_or_else(Failure::unauthorized)?;
    let account = store.users.get(&user_id).ok_or_else(Failure::not_found)?;
    Ok(Json(Envelope::ok(account.info.clone())))
}

async fn create_user(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<CreateUser>,
) -> Reply<UserInfo> {
    let mut store = db.write().await;
    store.caller(&headers).ok_or_else(Failure::unauthorized)?;
    if store.users.values().any(|a| a.info.metadata.name == input.name) {
        return Err(Failure {
            status: StatusCode::CONFLICT,
            code: CONFLICT_CODE,
            msg: "user already exists",
        });
    }
    let info = UserInfo {
        alias: input.alias,
        email: input.email,
        phone: input.phone,
        user_type: input.user_type,
        ..UserInfo::default()
    };
    let info = store.insert_user(&input.name, &input.password, info);
    info!(user_id = %info.metadata.instance_id, "user created");
    Ok(Json(Envelope::ok(info)))
}

async fn get_user(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply<UserInfo> {
    let store = db.read().await;
    store.caller(&headers).ok_or_else(Failure::unauthorized)?;
    let account = store.users.get(&id).ok_or_else(Failure::not_found)?;
    Ok(Json(Envelope::ok(account.info.clone())))
}

async fn update_user(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<UpdateUser>,
) -> Reply<UserInfo> {
    let mut store = db.write().await;
    store.caller(&headers).ok_or_else(Failure::unauthorized)?;
    let account = store.users.get_mut(&id).ok_or_else(Failure::not_found)?;
    let info = &mut account.info;
    if input.alias.is_some() {
        info.alias = input.alias;
    }
    if input.email.is_some() {
        info.email = input.email;
    }
    if input.phone.is_some() {
        info.phone = input.phone;
    }
    if input.user_type.is_some() {
        info.user_type = input.user_type;
    }
    info.metadata.updated_at = Some(now());
    Ok(Json(Envelope::ok(info.clone())))
}

async fn delete_user(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply<()> {
    let mut store = db.write().await;
    store.caller(&headers).ok_or_else(Failure::unauthorized)?;
    if store.users.remove(&id).is_none() {
        return Ok(Json(Envelope {
            code: NOT_FOUND_CODE,
            msg: "user not found".to_string(),
            data: None,
        }));
    }
    store.access_tokens.retain(|_, owner| *owner != id);
    store.refresh_tokens.retain(|_, owner| *owner != id);
    info!(user_id = %id, "user deleted");
    Ok(Json(Envelope {
        code: SUCCESS_CODE,
        msg: "success".to_string(),
        data: None,
    }))
}

fn now() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
        .to_string()
}
