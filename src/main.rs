use anyhow::Context;
use tracing_subscriber::EnvFilter;

use campus_lms::{config::config, database::DatabaseManager, router, scheduler, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, SECURITY_JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("campus_lms=info,tower_http=info")),
        )
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = config();
    config.validate().map_err(anyhow::Error::msg)?;
    tracing::info!("Starting Campus LMS in {:?} mode", config.environment);

    let store = DatabaseManager::open_store(config)
        .await
        .context("failed to open the store")?;
    let state = AppState::new(store, config.clone());

    if let (Ok(username), Ok(password)) = (
        std::env::var("BOOTSTRAP_ADMIN_USERNAME"),
        std::env::var("BOOTSTRAP_ADMIN_PASSWORD"),
    ) {
        state
            .auth()
            .bootstrap_admin(&username, &password)
            .await
            .context("failed to bootstrap admin")?;
    }

    scheduler::spawn_attendance_sweep(state.clone());

    // Allow tests or deployments to override port via env
    let port = std::env::var("CAMPUS_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Campus LMS listening on http://{}", bind_addr);
    axum::serve(listener, router(state)).await.context("server error")?;
    Ok(())
}
