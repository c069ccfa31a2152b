use chrono::Utc;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use crate::cli::config::{Session, SessionStore, SessionUser};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("not logged in, run `campus auth login` first")]
    NotLoggedIn,

    #[error("session expired, log in again")]
    SessionExpired,

    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
}

/// HTTP client bound to the stored session.
///
/// Requests carry the access token. A 401 triggers exactly one refresh and a
/// replay; if the refresh itself fails the session is cleared.
pub struct ApiClient {
    http: reqwest::Client,
    store: SessionStore,
    session: Session,
}

impl ApiClient {
    pub fn new(store: SessionStore) -> anyhow::Result<Self> {
        let session = store.load()?;
        Ok(Self {
            http: reqwest::Client::new(),
            store,
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn set_base_url(&mut self, base_url: &str) -> anyhow::Result<()> {
        self.session.base_url = base_url.trim_end_matches('/').to_string();
        self.session.clear();
        self.store.save(&self.session)
    }

    pub async fn login(&mut self, username: &str, password: &str) -> anyhow::Result<Value> {
        let body = json!({ "username": username, "password": password });
        let data = self.send(Method::POST, "/api/auth/login", Some(&body), false).await?;
        self.store_tokens(&data)?;
        Ok(data)
    }

    pub async fn logout(&mut self) -> anyhow::Result<()> {
        let refresh_token = self.session.refresh_token.clone();
        if self.session.is_logged_in() {
            let body = json!({ "refreshToken": refresh_token });
            // The local session is dropped even when the server call fails.
            if let Err(e) = self.post("/api/auth/logout", &body).await {
                tracing::warn!("Server-side logout failed: {}", e);
            }
        }
        self.session.clear();
        self.store.save(&self.session)
    }

    /// Rotate the token pair. On failure the session is cleared.
    pub async fn refresh(&mut self) -> anyhow::Result<()> {
        let Some(refresh_token) = self.session.refresh_token.clone() else {
            return Err(ClientError::NotLoggedIn.into());
        };

        let body = json!({ "refreshToken": refresh_token });
        match self.send(Method::POST, "/api/auth/refresh", Some(&body), false).await {
            Ok(data) => self.store_tokens(&data),
            Err(e) => {
                tracing::debug!("Refresh failed: {}", e);
                self.session.clear();
                self.store.save(&self.session)?;
                Err(ClientError::SessionExpired.into())
            }
        }
    }

    pub async fn get(&mut self, path: &str) -> anyhow::Result<Value> {
        self.authorized(Method::GET, path, None).await
    }

    pub async fn post(&mut self, path: &str, body: &Value) -> anyhow::Result<Value> {
        self.authorized(Method::POST, path, Some(body)).await
    }

    async fn authorized(&mut self, method: Method, path: &str, body: Option<&Value>) -> anyhow::Result<Value> {
        if !self.session.is_logged_in() {
            return Err(ClientError::NotLoggedIn.into());
        }

        match self.send(method.clone(), path, body, true).await {
            Err(e) if is_unauthorized(&e) => {
                self.refresh().await?;
                self.send(method, path, body, true).await
            }
            other => other,
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        with_token: bool,
    ) -> anyhow::Result<Value> {
        let url = format!("{}{}", self.session.base_url.trim_end_matches('/'), path);
        let mut request = self.http.request(method, &url);
        if with_token {
            if let Some(token) = &self.session.access_token {
                request = request.bearer_auth(token);
            }
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);

        if status.is_success() {
            return Ok(payload.get("data").cloned().unwrap_or(Value::Null));
        }

        let message = payload
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed"))
            .to_string();
        let code = payload.get("code").and_then(Value::as_str).map(str::to_string);
        Err(ClientError::Api {
            status: status.as_u16(),
            code,
            message: describe_status(status, &message),
        }
        .into())
    }

    fn store_tokens(&mut self, data: &Value) -> anyhow::Result<()> {
        let token = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);
        let access_token = token("accessToken").ok_or_else(|| anyhow::anyhow!("response carried no accessToken"))?;

        self.session.access_token = Some(access_token);
        self.session.refresh_token = token("refreshToken");
        if let Some(user) = data.get("user") {
            self.session.user = serde_json::from_value::<SessionUser>(user.clone()).ok();
        }
        self.session.updated_at = Some(Utc::now());
        self.store.save(&self.session)
    }
}

fn is_unauthorized(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<ClientError>(),
        Some(ClientError::Api { status: 401, .. })
    )
}

fn describe_status(status: StatusCode, message: &str) -> String {
    match status {
        StatusCode::FORBIDDEN => format!("Permission denied: {}", message),
        StatusCode::NOT_FOUND => format!("Not found: {}", message),
        StatusCode::CONFLICT => format!("Conflict: {}", message),
        StatusCode::TOO_MANY_REQUESTS => format!("{}; try again later", message),
        _ => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_messages_are_prefixed() {
        assert_eq!(
            describe_status(StatusCode::NOT_FOUND, "Lecture 'X' not found"),
            "Not found: Lecture 'X' not found"
        );
        assert_eq!(describe_status(StatusCode::BAD_REQUEST, "bad"), "bad");
    }

    #[test]
    fn only_api_401_triggers_refresh() {
        let unauthorized: anyhow::Error = ClientError::Api {
            status: 401,
            code: None,
            message: "expired".to_string(),
        }
        .into();
        assert!(is_unauthorized(&unauthorized));
        assert!(!is_unauthorized(&ClientError::SessionExpired.into()));
    }
}
