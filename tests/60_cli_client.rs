mod common;

use campus_lms::cli::client::{ApiClient, ClientError};
use campus_lms::cli::config::SessionStore;
use campus_lms::database::models::Role;
use serde_json::json;

use common::{TestApp, PASSWORD};

fn temp_store() -> (SessionStore, std::path::PathBuf) {
    let dir = std::env::temp_dir().join(format!("campus-cli-test-{}", uuid::Uuid::new_v4()));
    (SessionStore::at(&dir), dir)
}

#[tokio::test]
async fn client_refreshes_once_and_replays() -> anyhow::Result<()> {
    let app = TestApp::new();
    app.user("kim", Role::Student).await;
    let base_url = app.spawn().await;
    let (store, dir) = temp_store();

    let mut client = ApiClient::new(store.clone())?;
    client.set_base_url(&base_url)?;
    client.login("kim", PASSWORD).await?;
    let refresh_before = client.session().refresh_token.clone();

    // Corrupt the stored access token so the next call gets a 401.
    let mut session = store.load()?;
    session.access_token = Some("stale".to_string());
    store.save(&session)?;

    let mut client = ApiClient::new(store.clone())?;
    let me = client.get("/api/auth/whoami").await?;
    assert_eq!(me["username"], "kim");
    assert_ne!(client.session().refresh_token, refresh_before);
    assert_ne!(store.load()?.access_token.as_deref(), Some("stale"));

    let _ = std::fs::remove_dir_all(dir);
    Ok(())
}

#[tokio::test]
async fn failed_refresh_clears_session() -> anyhow::Result<()> {
    let app = TestApp::new();
    app.user("lee", Role::Student).await;
    let base_url = app.spawn().await;
    let (store, dir) = temp_store();

    let mut client = ApiClient::new(store.clone())?;
    client.set_base_url(&base_url)?;
    client.login("lee", PASSWORD).await?;

    let mut session = store.load()?;
    session.access_token = Some("stale".to_string());
    session.refresh_token = Some("also-stale".to_string());
    store.save(&session)?;

    let mut client = ApiClient::new(store.clone())?;
    let err = client.post("/api/attendance/student/view", &json!({ "lecSerial": "X" })).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<ClientError>(), Some(ClientError::SessionExpired)));
    assert!(!store.load()?.is_logged_in());
    assert_eq!(store.load()?.base_url, base_url);

    let _ = std::fs::remove_dir_all(dir);
    Ok(())
}

#[tokio::test]
async fn calls_without_login_fail_locally() -> anyhow::Result<()> {
    let (store, dir) = temp_store();
    let mut client = ApiClient::new(store)?;
    let err = client.get("/api/auth/whoami").await.unwrap_err();
    assert!(matches!(err.downcast_ref::<ClientError>(), Some(ClientError::NotLoggedIn)));
    let _ = std::fs::remove_dir_all(dir);
    Ok(())
}
