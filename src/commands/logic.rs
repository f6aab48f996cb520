//! Pure business logic functions extracted from the command handlers.
//!
//! These functions take plain parameters (no `AppState` dependency) and can be
//! unit-tested without any platform collaborators.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::core::usage::{AppUsageRecord, TotalUsageSummary, UsageReport};
use crate::error::AppError;

/// Device-wide totals as uploaded to the reporting server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TotalUsageReport {
    pub timestamp: String,
    pub date: String,
    pub total_rx: u64,
    pub total_tx: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessUsageEntry {
    pub identifier: String,
    pub total_rx: u64,
    pub total_tx: u64,
}

/// Per-app totals as uploaded to the reporting server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PerProcessUsageReport {
    pub timestamp: String,
    pub date: String,
    pub apps: Vec<ProcessUsageEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppRegistration {
    pub identifier: String,
    pub display_name: Option<String>,
    pub icon_hash: Option<String>,
}

/// Apps the server does not know yet, sent before retrying a per-app upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppRegistrationRequest {
    pub apps: Vec<AppRegistration>,
}

/// Fail with `UsageAccessDenied` unless the permission is granted.
pub fn ensure_usage_access(granted: bool) -> Result<(), AppError> {
    if granted {
        Ok(())
    } else {
        Err(AppError::UsageAccessDenied(
            "Usage access permission not granted".into(),
        ))
    }
}

/// Server-side identity of a record: the package id, or `uid-<ownerId>` when it is empty.
pub fn report_identifier(record: &AppUsageRecord) -> String {
    if record.package_id.is_empty() {
        format!("uid-{}", record.owner_id)
    } else {
        record.package_id.clone()
    }
}

/// `(Timestamp, Date)` pair: RFC 3339 UTC with milliseconds, and its calendar date.
fn report_stamp(now: DateTime<Utc>) -> (String, String) {
    (
        now.to_rfc3339_opts(SecondsFormat::Millis, true),
        now.format("%Y-%m-%d").to_string(),
    )
}

/// Totals carry the Wi-Fi counters only; mobile traffic is not uploaded.
pub fn build_total_usage_report(
    summary: &TotalUsageSummary,
    now: DateTime<Utc>,
) -> TotalUsageReport {
    let (timestamp, date) = report_stamp(now);
    TotalUsageReport {
        timestamp,
        date,
        total_rx: summary.wifi.rx,
        total_tx: summary.wifi.tx,
    }
}

/// One entry per record with traffic, in report order.
pub fn build_per_process_report(report: &UsageReport, now: DateTime<Utc>) -> PerProcessUsageReport {
    let (timestamp, date) = report_stamp(now);
    let apps = report
        .records()
        .iter()
        .map(|record| ProcessUsageEntry {
            identifier: report_identifier(record),
            total_rx: record.usage.wifi.rx.saturating_add(record.usage.mobile.rx),
            total_tx: record.usage.wifi.tx.saturating_add(record.usage.mobile.tx),
        })
        .filter(|entry| entry.total_rx > 0 || entry.total_tx > 0)
        .collect();

    PerProcessUsageReport {
        timestamp,
        date,
        apps,
    }
}

/// Registration entries for `missing` identifiers, in the order given.
/// Identifiers absent from `report` are skipped.
pub fn build_registration_request(
    report: &UsageReport,
    missing: &[String],
) -> AppRegistrationRequest {
    let by_identifier: HashMap<String, &AppUsageRecord> = report
        .records()
        .iter()
        .map(|r| (report_identifier(r), r))
        .collect();

    let mut apps = Vec::new();
    for identifier in missing {
        let Some(record) = by_identifier.get(identifier) else {
            tracing::warn!("Could not find app data for identifier: {identifier}");
            continue;
        };
        let display_name = if !record.display_name.is_empty() {
            record.display_name.clone()
        } else if !record.package_id.is_empty() {
            record.package_id.clone()
        } else {
            format!("UID {}", record.owner_id)
        };
        apps.push(AppRegistration {
            identifier: identifier.clone(),
            display_name: Some(display_name),
            icon_hash: record.icon.clone(),
        });
    }

    AppRegistrationRequest { apps }
}
