// service/background_jobs.rs
use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::service::contact_service::ContactRequestService;

/// Periodically expire overdue pending contact requests and release their holds.
pub async fn start_contact_expiry_job(contact_service: Arc<ContactRequestService>) {
    let every = contact_service.policy().expiry_sweep_interval_secs.max(1);
    let mut interval = interval(Duration::from_secs(every));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!("Contact expiry job started, running every {}s", every);

    loop {
        interval.tick().await;

        tracing::debug!("Running contact expiry sweep at {}", Utc::now());

        match contact_service.sweep_expired().await {
            Ok(0) => {}
            Ok(count) => tracing::info!("Contact expiry sweep completed: {} requests expired", count),
            Err(e) => tracing::error!("Contact expiry sweep failed: {}", e),
        }
    }
}
