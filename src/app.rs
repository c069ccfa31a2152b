use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{AppConfig, SecurityConfig};
use crate::database::Store;
use crate::handlers::{protected, public};
use crate::middleware::{jwt_auth_middleware, require_admin_middleware};
use crate::services::{
    AttendanceService, AuthService, BoardService, CourseService, GradeService, LoginRateLimiter,
    ReservationService,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub login_limiter: Arc<LoginRateLimiter>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: AppConfig) -> Self {
        let login_limiter = Arc::new(LoginRateLimiter::new(&config.api));
        Self {
            store,
            config: Arc::new(config),
            login_limiter,
        }
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.store.clone(), self.config.clone(), self.login_limiter.clone())
    }

    pub fn courses(&self) -> CourseService {
        CourseService::new(self.store.clone())
    }

    pub fn grades(&self) -> GradeService {
        GradeService::new(self.store.clone(), self.config.clone())
    }

    pub fn attendance(&self) -> AttendanceService {
        AttendanceService::new(self.store.clone(), self.config.clone())
    }

    pub fn boards(&self) -> BoardService {
        BoardService::new(self.store.clone())
    }

    pub fn reservations(&self) -> ReservationService {
        ReservationService::new(self.store.clone(), self.config.clone())
    }
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(auth_routes())
        .merge(course_routes())
        .merge(grade_routes())
        .merge(attendance_routes())
        .merge(board_routes())
        .merge(reservation_routes())
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    // Layers run outermost-last, so the JWT check happens before the admin check.
    let admin = admin_routes()
        .route_layer(from_fn(require_admin_middleware))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        // Protected API
        .merge(protected)
        .merge(admin)
        // Global middleware
        .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes))
        .layer(cors_layer(&state.config.security))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

fn auth_public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/api/auth/login", post(auth::login_post))
        .route("/api/auth/refresh", post(auth::refresh_post))
}

fn auth_routes() -> Router<AppState> {
    use protected::auth;

    Router::new()
        .route("/api/auth/whoami", get(auth::whoami_get))
        .route("/api/auth/logout", post(auth::logout_post))
}

fn admin_routes() -> Router<AppState> {
    use protected::admin;

    Router::new()
        .route("/api/admin/users/create", post(admin::user_create_post))
        .route("/api/admin/facilities/create", post(admin::facility_create_post))
}

fn course_routes() -> Router<AppState> {
    use protected::courses;

    Router::new()
        .route("/api/lectures/create", post(courses::lecture_create_post))
        .route("/api/enrollments/enroll", post(courses::enroll_post))
        .route("/api/assignments/create", post(courses::assignment_create_post))
        .route("/api/assignments/grade", post(courses::assignment_grade_post))
}

fn grade_routes() -> Router<AppState> {
    use protected::enrollments;

    Router::new()
        .route("/api/enrollments/grade-config", post(enrollments::grade_config_post))
        .route("/api/enrollments/grade-info", post(enrollments::grade_info_post))
        .route("/api/enrollments/grade-list", post(enrollments::grade_list_post))
        .route("/api/enrollments/grade-finalize", post(enrollments::grade_finalize_post))
}

fn attendance_routes() -> Router<AppState> {
    use protected::attendance;

    Router::new()
        .route("/api/attendance/request", post(attendance::request_post))
        .route("/api/attendance/approve", post(attendance::approve_post))
        .route("/api/attendance/student/view", post(attendance::student_view_post))
        .route("/api/attendance/professor/view", post(attendance::professor_view_post))
}

fn board_routes() -> Router<AppState> {
    use protected::boards;

    Router::new()
        .route("/api/boards/list", post(boards::list_post))
        .route("/api/boards/create", post(boards::create_post))
        .route("/api/boards/update/:id", post(boards::update_post))
        .route("/api/boards/:id", post(boards::detail_post))
}

fn reservation_routes() -> Router<AppState> {
    use protected::facilities;

    Router::new()
        .route("/api/facilities", post(facilities::facility_list_post))
        .route("/api/reservations", post(facilities::reservation_create_post))
        .route("/api/reservations/my", post(facilities::reservation_my_post))
        .route("/api/reservations/:id/cancel", post(facilities::reservation_cancel_post))
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Campus LMS API",
            "version": version,
            "endpoints": {
                "public_auth": "/api/auth/login, /api/auth/refresh (public - token acquisition)",
                "auth": "/api/auth/whoami, /api/auth/logout (protected)",
                "grades": "/api/enrollments/grade-config|grade-info|grade-list|grade-finalize (protected)",
                "attendance": "/api/attendance/* (protected)",
                "courses": "/api/lectures/create, /api/enrollments/enroll, /api/assignments/* (protected)",
                "boards": "/api/boards/* (protected)",
                "facilities": "/api/facilities, /api/reservations/* (protected)",
                "admin": "/api/admin/* (administrators only)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
