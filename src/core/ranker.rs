//! Deterministic ranking and canonical shaping of aggregated usage.

use super::usage::{AppUsageRecord, Counters, TotalUsageSummary, UsageReport};

/// Drop zero-usage records and order the rest by `total_bytes`, descending.
///
/// The sort is stable: records with equal totals keep the order they were
/// collected in (catalog enumeration order, tethering last).
pub fn rank(records: Vec<AppUsageRecord>) -> UsageReport {
    let mut records: Vec<AppUsageRecord> =
        records.into_iter().filter(|r| r.total_bytes > 0).collect();
    records.sort_by(|a, b| b.total_bytes.cmp(&a.total_bytes));
    UsageReport::from_ranked(records)
}

/// Device-wide summary. A zero summary is a valid result.
pub fn summarize(wifi: Counters, mobile: Counters) -> TotalUsageSummary {
    TotalUsageSummary {
        wifi,
        mobile,
        total_bytes: wifi.total().saturating_add(mobile.total()),
    }
}
