mod common;

use axum::http::StatusCode;
use campus_lms::database::models::Role;
use serde_json::json;

use common::{TestApp, PASSWORD};

#[tokio::test]
async fn health_and_root_respond() {
    let app = TestApp::new();

    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");

    let (status, body) = app.get("/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Campus LMS API");
}

#[tokio::test]
async fn login_issues_token_pair() {
    let app = TestApp::new();
    app.user("kim", Role::Student).await;

    let (status, body) = app
        .post("/api/auth/login", None, json!({ "username": "kim", "password": PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["tokenType"], "Bearer");
    assert_eq!(body["data"]["user"]["role"], "STUDENT");
    assert!(body["data"]["user"].get("passwordHash").is_none());

    let token = body["data"]["accessToken"].as_str().unwrap();
    let (status, body) = app.get("/api/auth/whoami", Some(token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "kim");
}

#[tokio::test]
async fn wrong_password_and_missing_token_are_unauthorized() {
    let app = TestApp::new();
    app.user("kim", Role::Student).await;

    let (status, body) = app
        .post("/api/auth/login", None, json!({ "username": "kim", "password": "nope-nope" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = app.get("/api/auth/whoami", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/auth/whoami", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_rotates_and_rejects_reuse() {
    let app = TestApp::new();
    app.user("lee", Role::Professor).await;

    let (_, body) = app
        .post("/api/auth/login", None, json!({ "username": "lee", "password": PASSWORD }))
        .await;
    let first = body["data"]["refreshToken"].as_str().unwrap().to_string();

    let (status, body) = app.post("/api/auth/refresh", None, json!({ "refreshToken": first })).await;
    assert_eq!(status, StatusCode::OK);
    let second = body["data"]["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(first, second);

    let (status, _) = app.post("/api/auth/refresh", None, json!({ "refreshToken": first })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // An access token is not accepted where a refresh token is expected.
    let access = body["data"]["accessToken"].as_str().unwrap().to_string();
    let (status, _) = app.post("/api/auth/refresh", None, json!({ "refreshToken": access })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_refresh_token() {
    let app = TestApp::new();
    app.user("park", Role::Student).await;

    let (_, body) = app
        .post("/api/auth/login", None, json!({ "username": "park", "password": PASSWORD }))
        .await;
    let access = body["data"]["accessToken"].as_str().unwrap().to_string();
    let refresh = body["data"]["refreshToken"].as_str().unwrap().to_string();

    let (status, body) = app
        .post("/api/auth/logout", Some(&access), json!({ "refreshToken": refresh }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["revoked"], true);
    assert_eq!(body["message"], "Logged out");

    let (status, _) = app.post("/api/auth/refresh", None, json!({ "refreshToken": refresh })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn repeated_failures_are_throttled() {
    let mut config = campus_lms::config::AppConfig::development();
    config.api.enable_rate_limiting = true;
    config.api.rate_limit_requests = 3;
    let app = TestApp::with_config(config);
    app.user("choi", Role::Student).await;

    for _ in 0..3 {
        let (status, _) = app
            .post("/api/auth/login", None, json!({ "username": "choi", "password": "wrong-guess" }))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // Even the right password is refused until the window passes.
    let (status, body) = app
        .post("/api/auth/login", None, json!({ "username": "choi", "password": PASSWORD }))
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "TOO_MANY_REQUESTS");
}

#[tokio::test]
async fn admin_routes_require_admin_role() {
    let app = TestApp::new();
    app.user("root", Role::Admin).await;
    app.user("kim", Role::Student).await;
    let admin = app.login("root").await;
    let student = app.login("kim").await;

    let new_user = json!({
        "username": "hong",
        "password": "long-enough-pw",
        "userCode": "20240001",
        "name": "Hong Gildong",
        "role": "PROFESSOR"
    });

    let (status, _) = app.post("/api/admin/users/create", Some(&student), new_user.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.post("/api/admin/users/create", None, new_user.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.post("/api/admin/users/create", Some(&admin), new_user.clone()).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["role"], "PROFESSOR");

    let (status, _) = app.post("/api/admin/users/create", Some(&admin), new_user).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
