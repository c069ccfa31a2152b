mod common;

use axum::http::StatusCode;
use campus_lms::database::models::Role;
use chrono::{Duration, Utc};
use serde_json::json;

use common::TestApp;

/// Tomorrow (UTC) at the given hour, so the slot never crosses midnight.
fn tomorrow_at(hour: u32) -> chrono::DateTime<Utc> {
    (Utc::now() + Duration::days(1))
        .date_naive()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
        .and_utc()
}

async fn room(app: &TestApp, admin: &str) -> i64 {
    let (status, body) = app
        .post(
            "/api/admin/facilities/create",
            Some(admin),
            json!({ "name": "Study Room B", "facilityType": "ROOM", "capacity": 6, "location": "Library 2F" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["data"]["facilityIdx"].as_i64().unwrap()
}

#[tokio::test]
async fn overlapping_bookings_conflict() {
    let app = TestApp::new();
    app.user("root", Role::Admin).await;
    app.user("kim", Role::Student).await;
    app.user("lee", Role::Student).await;
    let admin = app.login("root").await;
    let kim = app.login("kim").await;
    let lee = app.login("lee").await;
    let facility = room(&app, &admin).await;

    let (status, body) = app.post("/api/facilities", Some(&kim), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let booking = json!({
        "facilityIdx": facility,
        "startTime": tomorrow_at(10),
        "endTime": tomorrow_at(12),
        "partySize": 3,
        "purpose": "study group"
    });
    let (status, body) = app.post("/api/reservations", Some(&kim), booking).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["status"], "PENDING");
    let reservation = body["data"]["reservationIdx"].as_i64().unwrap();

    let overlap = json!({ "facilityIdx": facility, "startTime": tomorrow_at(11), "endTime": tomorrow_at(13) });
    let (status, _) = app.post("/api/reservations", Some(&lee), overlap.clone()).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Back-to-back is fine.
    let adjacent = json!({ "facilityIdx": facility, "startTime": tomorrow_at(12), "endTime": tomorrow_at(13) });
    let (status, _) = app.post("/api/reservations", Some(&lee), adjacent).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .post(&format!("/api/reservations/{}/cancel", reservation), Some(&lee), json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = app
        .post(&format!("/api/reservations/{}/cancel", reservation), Some(&kim), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "CANCELLED");

    let overlap_after_cancel =
        json!({ "facilityIdx": facility, "startTime": tomorrow_at(10), "endTime": tomorrow_at(11) });
    let (status, _) = app.post("/api/reservations", Some(&lee), overlap_after_cancel).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = app.post("/api/reservations/my", Some(&lee), json!({})).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn booking_rules_are_bad_requests() {
    let app = TestApp::new();
    app.user("root", Role::Admin).await;
    app.user("kim", Role::Student).await;
    let admin = app.login("root").await;
    let kim = app.login("kim").await;
    let facility = room(&app, &admin).await;

    let too_short = json!({ "facilityIdx": facility, "startTime": tomorrow_at(9), "endTime": tomorrow_at(9) + Duration::minutes(10) });
    let (status, body) = app.post("/api/reservations", Some(&kim), too_short).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    let crowd = json!({ "facilityIdx": facility, "startTime": tomorrow_at(9), "endTime": tomorrow_at(10), "partySize": 40 });
    let (status, _) = app.post("/api/reservations", Some(&kim), crowd).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unknown = json!({ "facilityIdx": 777, "startTime": tomorrow_at(9), "endTime": tomorrow_at(10) });
    let (status, _) = app.post("/api/reservations", Some(&kim), unknown).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post(
            "/api/admin/facilities/create",
            Some(&kim),
            json!({ "name": "Gym", "facilityType": "SPORTS", "capacity": 30 }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
