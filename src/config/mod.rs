use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

use crate::auth::MIN_HASH_COST;

/// Signing key used when `SECURITY_JWT_SECRET` is not set. Production refuses to start with it.
pub const DEV_JWT_SECRET: &str = "campus-lms-development-secret-change-me";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub grading: GradingConfig,
    pub attendance: AttendanceConfig,
    pub reservation: ReservationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_rate_limiting: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_hours: i64,
    /// bcrypt work factor for stored passwords.
    pub password_hash_cost: u32,
}

/// Course-level defaults applied when a professor has not saved a grade configuration yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingConfig {
    pub default_attendance_max_score: f64,
    pub default_total_sessions: u32,
    pub default_passing_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceConfig {
    pub request_expiry_days: i64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationConfig {
    pub max_days_in_advance: i64,
    pub min_duration_minutes: i64,
    pub max_duration_minutes: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("STORE_BACKEND") {
            self.database.backend = match v.to_ascii_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                "postgres" | "postgresql" => StoreBackend::Postgres,
                _ => self.database.backend,
            };
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_RUN_MIGRATIONS") {
            self.database.run_migrations = v.parse().unwrap_or(self.database.run_migrations);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_RATE_LIMITING") {
            self.api.enable_rate_limiting = v.parse().unwrap_or(self.api.enable_rate_limiting);
        }
        if let Ok(v) = env::var("API_RATE_LIMIT_REQUESTS") {
            self.api.rate_limit_requests = v.parse().unwrap_or(self.api.rate_limit_requests);
        }
        if let Ok(v) = env::var("API_RATE_LIMIT_WINDOW_SECS") {
            self.api.rate_limit_window_secs = v.parse().unwrap_or(self.api.rate_limit_window_secs);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("SECURITY_JWT_SECRET") {
            if !v.trim().is_empty() {
                self.security.jwt_secret = v;
            }
        }
        if let Ok(v) = env::var("SECURITY_ACCESS_TOKEN_TTL_MINUTES") {
            self.security.access_token_ttl_minutes = v.parse().unwrap_or(self.security.access_token_ttl_minutes);
        }
        if let Ok(v) = env::var("SECURITY_REFRESH_TOKEN_TTL_HOURS") {
            self.security.refresh_token_ttl_hours = v.parse().unwrap_or(self.security.refresh_token_ttl_hours);
        }
        if let Ok(v) = env::var("SECURITY_PASSWORD_HASH_COST") {
            self.security.password_hash_cost = v.parse().unwrap_or(self.security.password_hash_cost);
        }

        // Grading overrides
        if let Ok(v) = env::var("GRADING_DEFAULT_ATTENDANCE_MAX_SCORE") {
            self.grading.default_attendance_max_score = v.parse().unwrap_or(self.grading.default_attendance_max_score);
        }
        if let Ok(v) = env::var("GRADING_DEFAULT_TOTAL_SESSIONS") {
            self.grading.default_total_sessions = v.parse().unwrap_or(self.grading.default_total_sessions);
        }
        if let Ok(v) = env::var("GRADING_DEFAULT_PASSING_THRESHOLD") {
            self.grading.default_passing_threshold = v.parse().unwrap_or(self.grading.default_passing_threshold);
        }

        // Attendance overrides
        if let Ok(v) = env::var("ATTENDANCE_REQUEST_EXPIRY_DAYS") {
            self.attendance.request_expiry_days = v.parse().unwrap_or(self.attendance.request_expiry_days);
        }
        if let Ok(v) = env::var("ATTENDANCE_SWEEP_INTERVAL_SECS") {
            self.attendance.sweep_interval_secs = v.parse().unwrap_or(self.attendance.sweep_interval_secs);
        }

        // Reservation overrides
        if let Ok(v) = env::var("RESERVATION_MAX_DAYS_IN_ADVANCE") {
            self.reservation.max_days_in_advance = v.parse().unwrap_or(self.reservation.max_days_in_advance);
        }
        if let Ok(v) = env::var("RESERVATION_MIN_DURATION_MINUTES") {
            self.reservation.min_duration_minutes = v.parse().unwrap_or(self.reservation.min_duration_minutes);
        }
        if let Ok(v) = env::var("RESERVATION_MAX_DURATION_MINUTES") {
            self.reservation.max_duration_minutes = v.parse().unwrap_or(self.reservation.max_duration_minutes);
        }

        self
    }

    /// Refuse configurations that must never reach production.
    pub fn validate(&self) -> Result<(), String> {
        if self.environment == Environment::Production && self.security.jwt_secret == DEV_JWT_SECRET {
            return Err("SECURITY_JWT_SECRET must be set in production".to_string());
        }
        if !(MIN_HASH_COST..=31).contains(&self.security.password_hash_cost) {
            return Err(format!("SECURITY_PASSWORD_HASH_COST must be between {} and 31", MIN_HASH_COST));
        }
        if self.database.backend == StoreBackend::Postgres && self.database.url.is_none() {
            return Err("DATABASE_URL is required for the postgres store backend".to_string());
        }
        if self.reservation.min_duration_minutes > self.reservation.max_duration_minutes {
            return Err("RESERVATION_MIN_DURATION_MINUTES exceeds RESERVATION_MAX_DURATION_MINUTES".to_string());
        }
        Ok(())
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                backend: StoreBackend::Memory,
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                run_migrations: true,
            },
            api: ApiConfig {
                enable_rate_limiting: false,
                rate_limit_requests: 1000,
                rate_limit_window_secs: 60,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                jwt_secret: DEV_JWT_SECRET.to_string(),
                access_token_ttl_minutes: 60,
                refresh_token_ttl_hours: 24 * 7, // 1 week
                password_hash_cost: MIN_HASH_COST,
            },
            grading: GradingConfig::default(),
            attendance: AttendanceConfig::default(),
            reservation: ReservationConfig::default(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 20,
                connection_timeout: 10,
                run_migrations: true,
            },
            api: ApiConfig {
                enable_rate_limiting: true,
                rate_limit_requests: 20,
                rate_limit_window_secs: 60,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                jwt_secret: DEV_JWT_SECRET.to_string(),
                access_token_ttl_minutes: 30,
                refresh_token_ttl_hours: 24 * 7,
                password_hash_cost: bcrypt::DEFAULT_COST,
            },
            grading: GradingConfig::default(),
            attendance: AttendanceConfig::default(),
            reservation: ReservationConfig::default(),
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 50,
                connection_timeout: 5,
                run_migrations: false,
            },
            api: ApiConfig {
                enable_rate_limiting: true,
                rate_limit_requests: 10,
                rate_limit_window_secs: 60,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                jwt_secret: DEV_JWT_SECRET.to_string(),
                access_token_ttl_minutes: 15,
                refresh_token_ttl_hours: 24 * 7,
                password_hash_cost: bcrypt::DEFAULT_COST,
            },
            grading: GradingConfig::default(),
            attendance: AttendanceConfig::default(),
            reservation: ReservationConfig::default(),
        }
    }
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            default_attendance_max_score: 20.0,
            default_total_sessions: 80,
            default_passing_threshold: 60.0,
        }
    }
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            request_expiry_days: 7,
            sweep_interval_secs: 300,
        }
    }
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            max_days_in_advance: 30,
            min_duration_minutes: 30,
            max_duration_minutes: 480,
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.database.backend, StoreBackend::Memory);
        assert!(!config.api.enable_rate_limiting);
        assert_eq!(config.grading.default_total_sessions, 80);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(config.api.enable_rate_limiting);
        assert_eq!(config.security.access_token_ttl_minutes, 15);
        assert_eq!(config.security.password_hash_cost, bcrypt::DEFAULT_COST);
    }

    #[test]
    fn production_rejects_development_secret() {
        let mut config = AppConfig::production();
        config.database.url = Some("postgres://localhost/campus".to_string());
        assert!(config.validate().is_err());

        config.security.jwt_secret = "a-real-secret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn postgres_backend_requires_url() {
        let mut config = AppConfig::development();
        config.database.backend = StoreBackend::Postgres;
        assert!(config.validate().is_err());
    }
}
