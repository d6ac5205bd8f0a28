// service/background_jobs.rs
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use tokio::time::{interval, Duration};

use crate::AppState;

/// Periodically releases one-sided reviews older than `release_after`.
/// Only started when `REVIEW_FORCED_RELEASE_DAYS` is configured.
pub async fn start_forced_release_job(app_state: Arc<AppState>, release_after: TimeDelta) {
    let mut interval = interval(Duration::from_secs(
        app_state.env.forced_release_interval_secs.max(1),
    ));

    loop {
        interval.tick().await;

        let Some(cutoff) = Utc::now().checked_sub_signed(release_after) else {
            tracing::error!("Forced release window {} is out of range, skipping run", release_after);
            continue;
        };
        tracing::info!("Running forced release job for reviews pending since before {}", cutoff);

        match app_state.review_service.release_expired(cutoff).await {
            Ok(0) => tracing::debug!("Forced release job found nothing to release"),
            Ok(released) => tracing::info!("Forced release job released {} reviews", released),
            Err(e) => tracing::error!("Forced release job failed: {}", e),
        }
    }
}
