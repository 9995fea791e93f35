use axum::http::{self, Request, StatusCode};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use http_body_util::BodyExt;
use mock_server::{
    app, Envelope, TokenInfo, UserInfo, ADMIN_PASSWORD, ADMIN_USERNAME, CONFLICT_CODE,
    NOT_FOUND_CODE, SUCCESS_CODE, UNAUTHORIZED_CODE,
};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, auth: Option<&str>, body: &str) -> Request<String> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(http::header::AUTHORIZATION, auth);
    }
    builder.body(body.to_string()).unwrap()
}

fn admin_basic() -> String {
    format!("Basic {}", BASE64.encode(format!("{ADMIN_USERNAME}:{ADMIN_PASSWORD}")))
}

fn login_body(username: &str, password: &str) -> String {
    serde_json::json!({"username": username, "password": password}).to_string()
}

// --- login ---

#[tokio::test]
async fn login_issues_tokens() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/api/v1/login",
            None,
            &login_body(ADMIN_USERNAME, ADMIN_PASSWORD),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let env: Envelope<TokenInfo> = body_json(resp).await;
    assert_eq!(env.code, SUCCESS_CODE);
    let tokens = env.data.unwrap();
    assert_eq!(tokens.token_type, "Bearer");
    assert!(!tokens.access_token.is_empty());
}

#[tokio::test]
async fn login_with_wrong_password_returns_401_envelope() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/api/v1/login",
            None,
            &login_body(ADMIN_USERNAME, "nope"),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let env: Envelope<serde_json::Value> = body_json(resp).await;
    assert_eq!(env.code, UNAUTHORIZED_CODE);
    assert!(env.data.is_none());
}

#[tokio::test]
async fn login_malformed_json_returns_422() {
    let resp = app()
        .oneshot(json_request("POST", "/api/v1/login", None, r#"{"user":1}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- users ---

#[tokio::test]
async fn current_user_requires_credentials() {
    let resp = app()
        .oneshot(json_request("GET", "/api/v1/users/me", None, ""))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn current_user_with_basic_credentials() {
    let resp = app()
        .oneshot(json_request("GET", "/api/v1/users/me", Some(&admin_basic()), ""))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let env: Envelope<UserInfo> = body_json(resp).await;
    assert_eq!(env.data.unwrap().metadata.name, ADMIN_USERNAME);
}

#[tokio::test]
async fn get_unknown_user_returns_404() {
    let resp = app()
        .oneshot(json_request("GET", "/api/v1/users/missing", Some(&admin_basic()), ""))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let env: Envelope<serde_json::Value> = body_json(resp).await;
    assert_eq!(env.code, NOT_FOUND_CODE);
}

#[tokio::test]
async fn delete_unknown_user_is_business_failure() {
    let resp = app()
        .oneshot(json_request("DELETE", "/api/v1/users/missing", Some(&admin_basic()), ""))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let env: Envelope<serde_json::Value> = body_json(resp).await;
    assert_eq!(env.code, NOT_FOUND_CODE);
}

// --- full lifecycle ---

#[tokio::test]
async fn user_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    // login, then act with the bearer token
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            "/api/v1/login",
            None,
            &login_body(ADMIN_USERNAME, ADMIN_PASSWORD),
        ))
        .await
        .unwrap();
    let tokens: Envelope<TokenInfo> = body_json(resp).await;
    let tokens = tokens.data.unwrap();
    let bearer = format!("Bearer {}", tokens.access_token);

    // create
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            "/api/v1/users",
            Some(&bearer),
            r#"{"name":"bob","password":"pw","alias":"Bobby"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let created: Envelope<UserInfo> = body_json(resp).await;
    let created = created.data.unwrap();
    assert_eq!(created.alias.as_deref(), Some("Bobby"));
    let id = created.metadata.instance_id;

    // duplicate name
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            "/api/v1/users",
            Some(&bearer),
            r#"{"name":"bob","password":"other"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let env: Envelope<serde_json::Value> = body_json(resp).await;
    assert_eq!(env.code, CONFLICT_CODE);

    // update, partial
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "PUT",
            &format!("/api/v1/users/{id}"),
            Some(&bearer),
            r#"{"email":"bob@example.com"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Envelope<UserInfo> = body_json(resp).await;
    let updated = updated.data.unwrap();
    assert_eq!(updated.email.as_deref(), Some("bob@example.com"));
    assert_eq!(updated.alias.as_deref(), Some("Bobby")); // unchanged

    // the new user can sign in with basic credentials
    let bob = format!("Basic {}", BASE64.encode("bob:pw"));
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("GET", "/api/v1/users/me", Some(&bob), ""))
        .await
        .unwrap();
    let me: Envelope<UserInfo> = body_json(resp).await;
    assert_eq!(me.data.unwrap().metadata.instance_id, id);

    // refresh rotates the token pair
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            "/api/v1/token/refresh",
            None,
            &serde_json::json!({"refreshToken": tokens.refresh_token}).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "POST",
            "/api/v1/token/refresh",
            None,
            &serde_json::json!({"refreshToken": tokens.refresh_token}).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // delete
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("DELETE", &format!("/api/v1/users/{id}"), Some(&bearer), ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let env: Envelope<serde_json::Value> = body_json(resp).await;
    assert_eq!(env.code, SUCCESS_CODE);

    // get after delete
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("GET", &format!("/api/v1/users/{id}"), Some(&bearer), ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
