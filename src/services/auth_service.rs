use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::auth::{hash_password, issue_token_pair, validate_jwt, verify_password, TokenPair, TokenType};
use crate::config::{ApiConfig, AppConfig};
use crate::database::models::{NewUser, Role, User};
use crate::database::Store;
use crate::middleware::AuthUser;
use crate::services::{require_role, ServiceError, ServiceResult};

const MIN_PASSWORD_LENGTH: usize = 8;
/// Tracked usernames above which expired windows are swept on the next failure.
const LIMITER_PRUNE_THRESHOLD: usize = 1024;

/// Fixed-window counter of failed logins per username.
#[derive(Debug)]
pub struct LoginRateLimiter {
    enabled: bool,
    max_attempts: u32,
    window: Duration,
    attempts: Mutex<HashMap<String, (Instant, u32)>>,
}

impl LoginRateLimiter {
    pub fn new(api: &ApiConfig) -> Self {
        Self::with_window(
            api.enable_rate_limiting,
            api.rate_limit_requests,
            Duration::from_secs(api.rate_limit_window_secs),
        )
    }

    fn with_window(enabled: bool, max_attempts: u32, window: Duration) -> Self {
        Self {
            enabled,
            max_attempts,
            window,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub async fn check(&self, username: &str) -> ServiceResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let mut attempts = self.attempts.lock().await;
        if let Some((started, count)) = attempts.get(username).copied() {
            if started.elapsed() >= self.window {
                attempts.remove(username);
            } else if count >= self.max_attempts {
                tracing::warn!("Login for '{}' throttled after {} failed attempts", username, count);
                return Err(ServiceError::TooManyRequests(
                    "Too many login attempts, please try again later".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub async fn record_failure(&self, username: &str) {
        if !self.enabled {
            return;
        }

        let mut attempts = self.attempts.lock().await;
        if attempts.len() >= LIMITER_PRUNE_THRESHOLD {
            let window = self.window;
            let before = attempts.len();
            attempts.retain(|_, (started, _)| started.elapsed() < window);
            tracing::debug!("Login limiter pruned {} expired entries", before - attempts.len());
        }
        let entry = attempts.entry(username.to_string()).or_insert((Instant::now(), 0));
        if entry.0.elapsed() >= self.window {
            *entry = (Instant::now(), 0);
        }
        entry.1 += 1;
    }

    pub async fn reset(&self, username: &str) {
        self.attempts.lock().await.remove(username);
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub revoked: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub user_code: String,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
}

pub struct AuthService {
    store: Arc<dyn Store>,
    config: Arc<AppConfig>,
    limiter: Arc<LoginRateLimiter>,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, config: Arc<AppConfig>, limiter: Arc<LoginRateLimiter>) -> Self {
        Self { store, config, limiter }
    }

    pub async fn login(&self, request: LoginRequest) -> ServiceResult<TokenResponse> {
        let username = request.username.trim();
        if username.is_empty() || request.password.is_empty() {
            return Err(ServiceError::BadRequest("username and password are required".to_string()));
        }

        self.limiter.check(username).await?;

        let account = self.store.find_user_by_username(username).await?;
        let verified = match &account {
            Some(user) => self.check_password(&request.password, &user.password_hash).await?,
            None => false,
        };

        let user = match account {
            Some(user) if verified => user,
            _ => {
                self.limiter.record_failure(username).await;
                tracing::warn!("Failed login for '{}'", username);
                return Err(ServiceError::Unauthorized("Invalid username or password".to_string()));
            }
        };

        self.limiter.reset(username).await;
        tracing::info!("User {} ({}) logged in", user.username, user.role);
        self.issue(user).await
    }

    /// Rotate a refresh token: the presented one is revoked and a new pair is issued.
    pub async fn refresh(&self, refresh_token: &str, now: DateTime<Utc>) -> ServiceResult<TokenResponse> {
        let claims = validate_jwt(refresh_token, TokenType::Refresh, &self.config.security.jwt_secret)?;

        if !self.store.revoke_refresh_token(claims.jti, now).await? {
            tracing::warn!("Rejected reuse of refresh token {} for '{}'", claims.jti, claims.sub);
            return Err(ServiceError::Unauthorized(
                "Refresh token has been revoked or has expired".to_string(),
            ));
        }

        let user = self
            .store
            .find_user(claims.uid)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("User no longer exists".to_string()))?;

        tracing::debug!("Rotated refresh token for {}", user.username);
        self.issue(user).await
    }

    pub async fn logout(
        &self,
        user: &AuthUser,
        refresh_token: Option<&str>,
        now: DateTime<Utc>,
    ) -> ServiceResult<LogoutResponse> {
        let token = refresh_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ServiceError::BadRequest("refreshToken is required".to_string()))?;

        let claims = validate_jwt(token, TokenType::Refresh, &self.config.security.jwt_secret)?;
        if claims.uid != user.user_id {
            return Err(ServiceError::Forbidden(
                "Refresh token belongs to another user".to_string(),
            ));
        }

        let revoked = self.store.revoke_refresh_token(claims.jti, now).await?;
        tracing::info!("User {} logged out", user.username);
        Ok(LogoutResponse { revoked })
    }

    pub async fn whoami(&self, user: &AuthUser) -> ServiceResult<User> {
        self.store
            .find_user(user.user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    pub async fn create_user(&self, admin: &AuthUser, request: CreateUserRequest) -> ServiceResult<User> {
        require_role(admin, &[Role::Admin])?;

        let mut errors = HashMap::new();
        let username = request.username.trim();
        if username.len() < 3 || username.len() > 50 {
            errors.insert("username".to_string(), "must be 3 to 50 characters".to_string());
        }
        if request.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.insert(
                "password".to_string(),
                format!("must be at least {} characters", MIN_PASSWORD_LENGTH),
            );
        }
        if request.user_code.trim().is_empty() {
            errors.insert("userCode".to_string(), "is required".to_string());
        }
        if request.name.trim().is_empty() {
            errors.insert("name".to_string(), "is required".to_string());
        }
        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors));
        }

        let user = self
            .store
            .create_user(NewUser {
                username: username.to_string(),
                user_code: request.user_code.trim().to_string(),
                name: request.name.trim().to_string(),
                email: request.email.filter(|e| !e.trim().is_empty()),
                role: request.role,
                password_hash: self.hash(&request.password).await?,
            })
            .await?;

        tracing::info!("Admin {} created {} account '{}'", admin.username, user.role, user.username);
        Ok(user)
    }

    /// Create the first administrator when no account with that username exists.
    pub async fn bootstrap_admin(&self, username: &str, password: &str) -> ServiceResult<Option<User>> {
        if self.store.find_user_by_username(username).await?.is_some() {
            return Ok(None);
        }

        let user = self
            .store
            .create_user(NewUser {
                username: username.to_string(),
                user_code: "ADMIN".to_string(),
                name: "Administrator".to_string(),
                email: None,
                role: Role::Admin,
                password_hash: self.hash(password).await?,
            })
            .await?;

        tracing::info!("Bootstrapped administrator '{}'", user.username);
        Ok(Some(user))
    }

    async fn hash(&self, password: &str) -> ServiceResult<String> {
        let cost = self.config.security.password_hash_cost;
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hash_password(&password, cost))
            .await
            .map_err(|e| ServiceError::Internal(format!("password hashing task failed: {}", e)))?
            .map_err(ServiceError::from)
    }

    async fn check_password(&self, password: &str, stored: &str) -> ServiceResult<bool> {
        let (password, stored) = (password.to_string(), stored.to_string());
        tokio::task::spawn_blocking(move || verify_password(&password, &stored))
            .await
            .map_err(|e| ServiceError::Internal(format!("password check task failed: {}", e)))
    }

    async fn issue(&self, user: User) -> ServiceResult<TokenResponse> {
        let security = &self.config.security;
        let TokenPair {
            access_token,
            refresh_token,
            refresh,
            ..
        } = issue_token_pair(user.user_idx, &user.username, user.role, security)?;

        self.store
            .save_refresh_token(refresh.jti, user.user_idx, refresh.expires_at())
            .await?;

        Ok(TokenResponse {
            access_token,
            refresh_token,
            token_type: "Bearer",
            expires_in: security.access_token_ttl_minutes * 60,
            user,
        })
    }
}
