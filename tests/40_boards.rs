mod common;

use axum::http::StatusCode;
use campus_lms::database::models::Role;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn posting_rights_follow_board_code() {
    let app = TestApp::new();
    app.user("root", Role::Admin).await;
    app.user("prof", Role::Professor).await;
    app.user("kim", Role::Student).await;
    let admin = app.login("root").await;
    let professor = app.login("prof").await;
    let student = app.login("kim").await;

    let school = json!({ "boardCode": 0, "title": "Campus closed Friday", "content": "Maintenance." });
    let (status, _) = app.post("/api/boards/create", Some(&student), school.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.post("/api/boards/create", Some(&professor), school.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = app.post("/api/boards/create", Some(&admin), school).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let notice = json!({ "boardCode": 3, "title": "Office hours", "content": "Tue 3pm" });
    let (status, _) = app.post("/api/boards/create", Some(&student), notice.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.post("/api/boards/create", Some(&professor), notice).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .post("/api/boards/list", Some(&student), json!({ "boardCode": 0, "page": 0, "size": 10 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalElements"], 1);

    let (_, body) = app.post("/api/boards/list", Some(&student), json!({ "page": 0 })).await;
    assert_eq!(body["data"]["totalElements"], 2);
}

#[tokio::test]
async fn titles_are_validated() {
    let app = TestApp::new();
    app.user("root", Role::Admin).await;
    let admin = app.login("root").await;

    let (status, body) = app
        .post("/api/boards/create", Some(&admin), json!({ "boardCode": 1, "title": "  ", "content": "x" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", body);

    let long_title = "x".repeat(101);
    let (status, _) = app
        .post("/api/boards/create", Some(&admin), json!({ "boardCode": 1, "title": long_title, "content": "x" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn detail_counts_views_and_only_author_edits() {
    let app = TestApp::new();
    app.user("prof", Role::Professor).await;
    app.user("other", Role::Professor).await;
    let author = app.login("prof").await;
    let other = app.login("other").await;

    let (_, body) = app
        .post("/api/boards/create", Some(&author), json!({ "boardCode": 3, "title": "Quiz", "content": "Week 5" }))
        .await;
    let id = body["data"]["boardIdx"].as_i64().unwrap();

    app.post(&format!("/api/boards/{}", id), Some(&other), json!({})).await;
    let (status, body) = app.post(&format!("/api/boards/{}", id), Some(&other), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["viewCount"], 2);

    let (status, _) = app
        .post(&format!("/api/boards/update/{}", id), Some(&other), json!({ "title": "Hijacked" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(&format!("/api/boards/update/{}", id), Some(&author), json!({ "title": "Quiz moved" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Quiz moved");
    assert_eq!(body["data"]["content"], "Week 5");

    let (status, _) = app.post("/api/boards/424242", Some(&author), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
