//! Usage queries: per-app report and device-wide totals.

use crate::core::usage::{TotalUsageSummary, UsageReport};
use crate::core::window::{self, Period, TimeWindow};
use crate::error::AppError;

use super::logic::ensure_usage_access;
use super::state::AppState;

/// Ranked per-app usage for the selector `period`/`count`.
pub async fn get_app_network_usage(
    state: &AppState,
    period: &str,
    count: i64,
) -> Result<UsageReport, AppError> {
    let window = authorized_window(state, period, count)?;
    state.aggregator.collect_per_app(window).await
}

/// Device-wide usage for the selector `period`/`count`.
pub async fn get_total_network_usage(
    state: &AppState,
    period: &str,
    count: i64,
) -> Result<TotalUsageSummary, AppError> {
    let window = authorized_window(state, period, count)?;
    state.aggregator.collect_total(window).await
}

/// Validate the selector, then require usage access. No query is issued on failure.
fn authorized_window(state: &AppState, period: &str, count: i64) -> Result<TimeWindow, AppError> {
    let period = Period::from_id(period)?;
    let window = window::resolve(period, count)?;
    ensure_usage_access(state.aggregator.permissions().has_usage_access())?;
    Ok(window)
}
