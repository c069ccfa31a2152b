use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::app::AppState;

/// Periodically auto-approve attendance requests whose expiry has passed.
pub fn spawn_attendance_sweep(state: AppState) -> JoinHandle<()> {
    let period = Duration::from_secs(state.config.attendance.sweep_interval_secs.max(1));

    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!("Attendance sweep running every {:?}", period);

        loop {
            ticker.tick().await;
            if let Err(e) = state.attendance().process_expired(chrono::Utc::now()).await {
                tracing::error!("Attendance sweep failed: {}", e);
            }
        }
    })
}
