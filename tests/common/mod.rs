#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use campus_lms::auth::{hash_password, MIN_HASH_COST};
use campus_lms::config::AppConfig;
use campus_lms::database::models::{NewUser, Role, User};
use campus_lms::database::{MemoryStore, Store};
use campus_lms::{router, AppState};

pub const PASSWORD: &str = "correct-horse-battery";

/// In-process application over a fresh memory store.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<dyn Store>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::development())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), config);
        Self {
            router: router(state.clone()),
            store,
            state,
        }
    }

    pub async fn user(&self, username: &str, role: Role) -> User {
        self.store
            .create_user(NewUser {
                username: username.to_string(),
                user_code: format!("{}-{}", role.as_str(), username),
                name: username.to_uppercase(),
                email: None,
                role,
                password_hash: hash_password(PASSWORD, MIN_HASH_COST).expect("hash"),
            })
            .await
            .expect("seed user")
    }

    pub async fn login(&self, username: &str) -> String {
        let (status, body) = self
            .post("/api/auth/login", None, json!({ "username": username, "password": PASSWORD }))
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["data"]["accessToken"].as_str().expect("accessToken").to_string()
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, path, token, Some(body)).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::GET, path, token, None).await
    }

    pub async fn call(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.router.clone().oneshot(request).await.expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Serve the router on a real port, for clients that speak HTTP.
    pub async fn spawn(&self) -> String {
        let port = portpicker::pick_unused_port().expect("free port");
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .expect("bind test listener");
        let app = self.router.clone();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://127.0.0.1:{}", port)
    }
}

/// A lecture taught by `professor` with the given students enrolled.
pub struct Course {
    pub lec_serial: String,
    pub professor: User,
    pub professor_token: String,
    pub students: Vec<(User, String)>,
}

pub async fn course(app: &TestApp, lec_serial: &str, students: &[&str]) -> Course {
    let professor = app.user(&format!("prof-{}", lec_serial.to_lowercase()), Role::Professor).await;
    let professor_token = app.login(&professor.username).await;

    let (status, body) = app
        .post(
            "/api/lectures/create",
            Some(&professor_token),
            json!({ "lecSerial": lec_serial, "title": "Data Structures" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "lecture create: {}", body);

    let mut enrolled = Vec::new();
    for name in students {
        let student = app.user(name, Role::Student).await;
        let token = app.login(name).await;
        let (status, body) = app
            .post("/api/enrollments/enroll", Some(&token), json!({ "lecSerial": lec_serial }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "enroll: {}", body);
        enrolled.push((student, token));
    }

    Course {
        lec_serial: lec_serial.to_string(),
        professor,
        professor_token,
        students: enrolled,
    }
}

/// Create an assignment and return its index.
pub async fn assignment(app: &TestApp, course: &Course, name: &str, max_score: f64) -> i64 {
    let (status, body) = app
        .post(
            "/api/assignments/create",
            Some(&course.professor_token),
            json!({ "lecSerial": course.lec_serial, "name": name, "maxScore": max_score }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "assignment create: {}", body);
    body["data"]["assignmentIdx"].as_i64().expect("assignmentIdx")
}

pub async fn score(app: &TestApp, course: &Course, assignment_idx: i64, student_idx: i64, score: f64) {
    let (status, body) = app
        .post(
            "/api/assignments/grade",
            Some(&course.professor_token),
            json!({ "assignmentIdx": assignment_idx, "studentIdx": student_idx, "score": score }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "assignment grade: {}", body);
}
