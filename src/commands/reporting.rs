//! Upload payloads for the reporting server, built from today's usage.

use chrono::Utc;

use crate::core::usage::UsageReport;
use crate::error::AppError;

use super::logic::{
    build_per_process_report, build_registration_request, build_total_usage_report,
    AppRegistrationRequest, PerProcessUsageReport, TotalUsageReport,
};
use super::state::AppState;
use super::usage::{get_app_network_usage, get_total_network_usage};

/// Reports always cover the current local day.
const REPORT_PERIOD: &str = "day";
const REPORT_COUNT: i64 = 1;

/// A per-app upload together with the records it was built from, kept so
/// apps the server rejects as unknown can be registered without re-querying.
#[derive(Debug, Clone)]
pub struct PerProcessUpload {
    pub payload: PerProcessUsageReport,
    source: UsageReport,
}

impl PerProcessUpload {
    pub fn registration_for(&self, missing: &[String]) -> AppRegistrationRequest {
        build_registration_request(&self.source, missing)
    }
}

/// Today's device totals as a `TotalUsageReport`.
pub async fn prepare_total_usage_report(state: &AppState) -> Result<TotalUsageReport, AppError> {
    let summary = get_total_network_usage(state, REPORT_PERIOD, REPORT_COUNT).await?;
    Ok(build_total_usage_report(&summary, Utc::now()))
}

/// Today's per-app usage. `None` when no app has traffic to report.
pub async fn prepare_per_process_report(
    state: &AppState,
) -> Result<Option<PerProcessUpload>, AppError> {
    let report = get_app_network_usage(state, REPORT_PERIOD, REPORT_COUNT).await?;
    let payload = build_per_process_report(&report, Utc::now());
    if payload.apps.is_empty() {
        tracing::info!("No per-app usage to report for today");
        return Ok(None);
    }
    Ok(Some(PerProcessUpload {
        payload,
        source: report,
    }))
}
