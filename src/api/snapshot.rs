//! Startup loaders. They never fail: errors are logged and an empty result
//! is returned so the live feed can take over.

use tracing::{error, info};

use crate::normalize::normalize_batch;
use crate::reports::Report;
use crate::types::Alert;

use super::ApiClient;

/// Fetch, normalize and sort (newest-first) the alert history.
pub async fn load_history_snapshot(client: &ApiClient, limit: u32) -> Vec<Alert> {
    match client.fetch_alert_history(limit).await {
        Ok(raw) => {
            let alerts = normalize_batch(&raw);
            info!(count = alerts.len(), limit, "alert history loaded");
            alerts
        }
        Err(err) => {
            error!(error = %err, "failed to load initial alert history");
            Vec::new()
        }
    }
}

pub async fn load_reports(client: &ApiClient) -> Vec<Report> {
    match client.fetch_reports().await {
        Ok(reports) => {
            info!(count = reports.len(), "reports loaded");
            reports
        }
        Err(err) => {
            error!(error = %err, "failed to load reports");
            Vec::new()
        }
    }
}
