use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Up,
    Down,
}

/// Signed-in user as returned by login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub user_idx: i64,
    pub username: String,
    pub name: String,
    pub role: String,
}

/// Everything the CLI remembers between invocations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub base_url: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<SessionUser>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: None,
            refresh_token: None,
            user: None,
            updated_at: None,
        }
    }
}

impl Session {
    pub fn is_logged_in(&self) -> bool {
        self.access_token.is_some()
    }

    /// Drop tokens and user, keep the server.
    pub fn clear(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.user = None;
        self.updated_at = Some(Utc::now());
    }
}

/// Location of the session file on disk.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// `$CAMPUS_CLI_CONFIG_DIR`, else `~/.config/campus/cli`.
    pub fn open_default() -> anyhow::Result<Self> {
        Ok(Self::at(get_config_dir()?))
    }

    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    pub fn load(&self) -> anyhow::Result<Session> {
        let file = self.path();
        if !file.exists() {
            return Ok(Session::default());
        }

        let content = fs::read_to_string(file)?;
        let session: Session = serde_json::from_str(&content)?;
        Ok(session)
    }

    pub fn save(&self, session: &Session) -> anyhow::Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }

        let content = serde_json::to_string_pretty(session)?;
        fs::write(self.path(), content)?;
        Ok(())
    }
}

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("CAMPUS_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("campus").join("cli")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub async fn ping_server(base_url: &str) -> ServerStatus {
    let client = reqwest::Client::new();
    let url = format!("{}/health", base_url.trim_end_matches('/'));

    match client.get(&url).timeout(std::time::Duration::from_secs(5)).send().await {
        Ok(response) if response.status().is_success() => ServerStatus::Up,
        _ => ServerStatus::Down,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_default_session() {
        let dir = std::env::temp_dir().join(format!("campus-cli-{}", uuid::Uuid::new_v4()));
        let store = SessionStore::at(&dir);
        assert_eq!(store.load().unwrap(), Session::default());

        let mut session = Session {
            access_token: Some("a".to_string()),
            refresh_token: Some("r".to_string()),
            ..Default::default()
        };
        store.save(&session).unwrap();
        assert!(store.load().unwrap().is_logged_in());

        session.clear();
        store.save(&session).unwrap();
        assert!(!store.load().unwrap().is_logged_in());
        let _ = fs::remove_dir_all(dir);
    }
}
