//! Per-app and device-wide usage collection.
//!
//! Per-app collection fans out over the app catalog with bounded concurrency:
//! one tokio task per reportable entry, admitted through a semaphore, each
//! issuing a Wi-Fi and a mobile detail query under a deadline. Every task
//! yields an explicit [`EntryOutcome`]; outcomes land in one slot per catalog
//! index and are ranked only after the whole batch completes, so completion
//! order never leaks into the report.
//!
//! A failing entry (query error, timeout, aborted task) is logged and dropped.
//! It never cancels or blocks the other entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::ranker;
use super::usage::{
    AppUsageRecord, Counters, InstalledApp, TotalUsageSummary, Transport, TransportUsage,
    UsageReport,
};
use super::window::TimeWindow;
use crate::config::{self, AggregatorConfig};
use crate::error::AppError;
use crate::platform::{AppCatalog, IconEncoder, PermissionGate, StatsProvider};

/// Why a single catalog entry contributed nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryFailure {
    #[error("{transport} query failed: {message}")]
    Query { transport: Transport, message: String },

    #[error("{transport} query timed out after {timeout_ms} ms")]
    Timeout { transport: Transport, timeout_ms: u64 },

    #[error("collection task aborted: {0}")]
    Aborted(String),
}

/// Result of collecting one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Nonzero usage; part of the report.
    Reported(AppUsageRecord),
    /// Queried successfully, zero bytes.
    Idle,
    /// Launcher-less system package, never queried.
    Filtered,
    Failed(EntryFailure),
}

/// Collects usage from the injected platform collaborators.
pub struct UsageAggregator {
    stats: Arc<dyn StatsProvider>,
    catalog: Arc<dyn AppCatalog>,
    icons: Arc<dyn IconEncoder>,
    permissions: Arc<dyn PermissionGate>,
    config: AggregatorConfig,
}

impl UsageAggregator {
    pub fn new(
        stats: Arc<dyn StatsProvider>,
        catalog: Arc<dyn AppCatalog>,
        icons: Arc<dyn IconEncoder>,
        permissions: Arc<dyn PermissionGate>,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            stats,
            catalog,
            icons,
            permissions,
            config,
        }
    }

    pub fn permissions(&self) -> &dyn PermissionGate {
        self.permissions.as_ref()
    }

    /// Ranked per-app usage over `window`, tethering included.
    pub async fn collect_per_app(&self, window: TimeWindow) -> Result<UsageReport, AppError> {
        let apps = self
            .catalog
            .list_installed()
            .await
            .map_err(|e| AppError::CatalogUnavailable(format!("{e:#}")))?;
        let catalog_size = apps.len();

        let outcomes = self.collect_entries(apps, window).await;
        let mut records = retain_reported(outcomes);

        if let Some(tethering) = self.collect_tethering(window).await {
            records.push(tethering);
        }

        let report = ranker::rank(records);
        tracing::info!(
            "Collected per-app usage: {} records from {catalog_size} installed apps",
            report.len()
        );
        Ok(report)
    }

    /// Device-wide usage over `window`, from summary queries.
    ///
    /// Mobile counters are zero when phone-state access is missing or no
    /// subscriber id can be resolved. A failing summary query on a transport
    /// that is queried fails the whole call.
    pub async fn collect_total(&self, window: TimeWindow) -> Result<TotalUsageSummary, AppError> {
        let wifi = self.query_summary(Transport::Wifi, None, window).await?;

        let mobile = match self.mobile_subscriber() {
            Some(subscriber_id) => {
                self.query_summary(Transport::Mobile, Some(&subscriber_id), window)
                    .await?
            }
            None => {
                tracing::debug!("Mobile subscriber id unavailable, reporting zero mobile usage");
                Counters::ZERO
            }
        };

        Ok(ranker::summarize(wifi, mobile))
    }

    /// Run every reportable entry through [`collect_entry`], preserving catalog order.
    async fn collect_entries(
        &self,
        apps: Vec<InstalledApp>,
        window: TimeWindow,
    ) -> Vec<(String, EntryOutcome)> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency()));
        let timeout = self.config.query_timeout();

        let mut packages = Vec::with_capacity(apps.len());
        let mut slots: Vec<Option<EntryOutcome>> = Vec::with_capacity(apps.len());
        let mut tasks = JoinSet::new();

        for (index, app) in apps.into_iter().enumerate() {
            packages.push(app.package_id.clone());

            if !app.is_reportable() {
                tracing::trace!("Skipping launcher-less system package {}", app.package_id);
                slots.push(Some(EntryOutcome::Filtered));
                continue;
            }
            slots.push(None);

            let semaphore = Arc::clone(&semaphore);
            let stats = Arc::clone(&self.stats);
            let icons = Arc::clone(&self.icons);
            tasks.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        collect_entry(stats.as_ref(), icons.as_ref(), &app, window, timeout).await
                    }
                    Err(e) => EntryOutcome::Failed(EntryFailure::Aborted(e.to_string())),
                };
                (index, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => {
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(outcome);
                    }
                }
                Err(e) => tracing::warn!("Usage collection task ended abnormally: {e}"),
            }
        }

        packages
            .into_iter()
            .zip(slots)
            .map(|(package, slot)| {
                let outcome = slot.unwrap_or_else(|| {
                    EntryOutcome::Failed(EntryFailure::Aborted("task did not complete".into()))
                });
                (package, outcome)
            })
            .collect()
    }

    /// Tethering pseudo-entry, or `None` when no traffic was relayed.
    /// A failing transport counts as zero.
    async fn collect_tethering(&self, window: TimeWindow) -> Option<AppUsageRecord> {
        let timeout = self.config.query_timeout();
        let owner_id = config::TETHERING_OWNER_ID;
        let (wifi, mobile) = tokio::join!(
            query_transport(self.stats.as_ref(), Transport::Wifi, owner_id, window, timeout),
            query_transport(self.stats.as_ref(), Transport::Mobile, owner_id, window, timeout),
        );

        let zero_on_failure = |result: Result<Counters, EntryFailure>| {
            result.unwrap_or_else(|failure| {
                tracing::warn!("Error querying tethering usage: {failure}");
                Counters::ZERO
            })
        };
        let usage = TransportUsage::new(zero_on_failure(wifi), zero_on_failure(mobile));

        (usage.total() > 0).then(|| AppUsageRecord::tethering(usage))
    }

    fn mobile_subscriber(&self) -> Option<String> {
        if !self.permissions.has_phone_state_access() {
            return None;
        }
        self.permissions.resolve_mobile_owner_id()
    }

    async fn query_summary(
        &self,
        transport: Transport,
        subscriber_id: Option<&str>,
        window: TimeWindow,
    ) -> Result<Counters, AppError> {
        let timeout = self.config.query_timeout();
        match tokio::time::timeout(
            timeout,
            self.stats.query_summary(transport, subscriber_id, window),
        )
        .await
        {
            Ok(Ok(counters)) => Ok(counters),
            Ok(Err(e)) => Err(AppError::StatsUnavailable(format!(
                "{transport} summary query failed: {e:#}"
            ))),
            Err(_) => Err(AppError::StatsUnavailable(format!(
                "{transport} summary query timed out after {} ms",
                timeout.as_millis()
            ))),
        }
    }
}

/// Keep reported records in catalog order, logging every failed entry.
pub(crate) fn retain_reported(outcomes: Vec<(String, EntryOutcome)>) -> Vec<AppUsageRecord> {
    let mut records = Vec::new();
    let mut failed = 0usize;
    for (package, outcome) in outcomes {
        match outcome {
            EntryOutcome::Reported(record) => records.push(record),
            EntryOutcome::Failed(failure) => {
                failed += 1;
                tracing::warn!("Error processing app {package}: {failure}");
            }
            EntryOutcome::Idle | EntryOutcome::Filtered => {}
        }
    }
    if failed > 0 {
        tracing::debug!("{failed} apps dropped from the report after errors");
    }
    records
}

async fn collect_entry(
    stats: &dyn StatsProvider,
    icons: &dyn IconEncoder,
    app: &InstalledApp,
    window: TimeWindow,
    timeout: Duration,
) -> EntryOutcome {
    let owner_id = app.owner_id;
    let usage = tokio::try_join!(
        query_transport(stats, Transport::Wifi, owner_id, window, timeout),
        query_transport(stats, Transport::Mobile, owner_id, window, timeout),
    );
    let usage = match usage {
        Ok((wifi, mobile)) => TransportUsage::new(wifi, mobile),
        Err(failure) => return EntryOutcome::Failed(failure),
    };

    if usage.total() == 0 {
        return EntryOutcome::Idle;
    }

    let icon = fetch_icon(icons, &app.package_id, timeout).await;
    EntryOutcome::Reported(AppUsageRecord::new(app, usage, icon))
}

/// One detail query, buckets summed.
async fn query_transport(
    stats: &dyn StatsProvider,
    transport: Transport,
    owner_id: i64,
    window: TimeWindow,
    timeout: Duration,
) -> Result<Counters, EntryFailure> {
    match tokio::time::timeout(timeout, stats.query_entity(transport, None, window, owner_id)).await
    {
        Ok(Ok(buckets)) => Ok(Counters::sum(&buckets)),
        Ok(Err(e)) => Err(EntryFailure::Query {
            transport,
            message: format!("{e:#}"),
        }),
        Err(_) => Err(EntryFailure::Timeout {
            transport,
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// Icon failures degrade to no icon; they never drop the entry.
async fn fetch_icon(icons: &dyn IconEncoder, package_id: &str, timeout: Duration) -> Option<String> {
    match tokio::time::timeout(timeout, icons.encode(package_id)).await {
        Ok(Ok(icon)) => icon,
        Ok(Err(e)) => {
            tracing::warn!("Error getting icon for {package_id}: {e:#}");
            None
        }
        Err(_) => {
            tracing::warn!("Icon for {package_id} timed out");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::platform::fixture::{
        system_app, user_app, FixtureCatalog, FixtureIcons, FixturePermissions,
        FixtureStatsProvider,
    };

    fn window() -> TimeWindow {
        TimeWindow::new(1_700_000_000_000, 1_700_003_600_000).unwrap()
    }

    fn make_aggregator(
        stats: Arc<FixtureStatsProvider>,
        apps: Vec<InstalledApp>,
        icons: Arc<FixtureIcons>,
        permissions: FixturePermissions,
    ) -> UsageAggregator {
        make_aggregator_with(stats, apps, icons, permissions, AggregatorConfig::default())
    }

    fn make_aggregator_with(
        stats: Arc<FixtureStatsProvider>,
        apps: Vec<InstalledApp>,
        icons: Arc<FixtureIcons>,
        permissions: FixturePermissions,
        config: AggregatorConfig,
    ) -> UsageAggregator {
        UsageAggregator::new(
            stats,
            Arc::new(FixtureCatalog::new(apps)),
            icons,
            Arc::new(permissions),
            config,
        )
    }

    fn simple(stats: FixtureStatsProvider, apps: Vec<InstalledApp>) -> UsageAggregator {
        make_aggregator(
            Arc::new(stats),
            apps,
            Arc::new(FixtureIcons::new()),
            FixturePermissions::granted(),
        )
    }

    fn packages(report: &UsageReport) -> Vec<&str> {
        report.records().iter().map(|r| r.package_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_sample_end_to_end_filters_launcherless_system_app() {
        let stats = FixtureStatsProvider::new()
            .with_bucket(10_001, Transport::Wifi, Counters::new(200, 0))
            .with_bucket(1_000, Transport::Wifi, Counters::new(500, 0));
        let apps = vec![user_app("com.example.appa", 10_001), system_app("android.appb", 1_000, false)];

        let report = simple(stats, apps).collect_per_app(window()).await.unwrap();

        assert_eq!(packages(&report), vec!["com.example.appa"]);
        assert_eq!(report.records()[0].total_bytes, 200);
    }

    #[tokio::test]
    async fn test_system_app_with_launcher_is_reported() {
        let stats = FixtureStatsProvider::new()
            .with_bucket(1_001, Transport::Mobile, Counters::new(40, 2));
        let apps = vec![system_app("com.android.chrome", 1_001, true)];

        let report = simple(stats, apps).collect_per_app(window()).await.unwrap();

        assert_eq!(packages(&report), vec!["com.android.chrome"]);
        assert_eq!(report.records()[0].usage.mobile, Counters::new(40, 2));
    }

    #[tokio::test]
    async fn test_filtered_entries_are_never_queried() {
        let stats = Arc::new(FixtureStatsProvider::new());
        let apps = vec![system_app("android.hidden", 1_000, false)];
        let aggregator = make_aggregator(
            Arc::clone(&stats),
            apps,
            Arc::new(FixtureIcons::new()),
            FixturePermissions::granted(),
        );

        aggregator.collect_per_app(window()).await.unwrap();

        assert_eq!(stats.entity_calls(1_000), 0);
        // Only the two tethering queries were issued.
        assert_eq!(stats.total_entity_calls(), 2);
    }

    #[tokio::test]
    async fn test_zero_usage_entries_are_excluded() {
        let stats = FixtureStatsProvider::new()
            .with_bucket(10_002, Transport::Wifi, Counters::new(1, 0));
        let apps = vec![user_app("com.idle", 10_001), user_app("com.busy", 10_002)];

        let report = simple(stats, apps).collect_per_app(window()).await.unwrap();

        assert_eq!(packages(&report), vec!["com.busy"]);
        assert!(report.records().iter().all(|r| r.total_bytes > 0));
    }

    #[tokio::test]
    async fn test_buckets_are_summed_per_transport() {
        let stats = FixtureStatsProvider::new()
            .with_bucket(10_001, Transport::Wifi, Counters::new(100, 10))
            .with_bucket(10_001, Transport::Wifi, Counters::new(50, 5))
            .with_bucket(10_001, Transport::Mobile, Counters::new(7, 3));
        let apps = vec![user_app("com.maps", 10_001)];

        let report = simple(stats, apps).collect_per_app(window()).await.unwrap();
        let record = &report.records()[0];

        assert_eq!(record.usage.wifi, Counters::new(150, 15));
        assert_eq!(record.usage.mobile, Counters::new(7, 3));
        assert_eq!(record.total_bytes, 175);
    }

    #[tokio::test]
    async fn test_one_failing_entry_is_isolated() {
        let mut stats = FixtureStatsProvider::new();
        let mut apps = Vec::new();
        for i in 0..5 {
            let owner = 10_000 + i;
            stats = stats.with_bucket(owner, Transport::Wifi, Counters::new(100 * (i as u64 + 1), 0));
            apps.push(user_app(&format!("com.app{i}"), owner));
        }
        let stats = stats.failing_owner(10_002, "binder transaction failed");

        let report = simple(stats, apps).collect_per_app(window()).await.unwrap();

        assert_eq!(
            packages(&report),
            vec!["com.app4", "com.app3", "com.app1", "com.app0"]
        );
    }

    #[tokio::test]
    async fn test_timed_out_entry_is_dropped() {
        let stats = FixtureStatsProvider::new()
            .with_bucket(10_001, Transport::Wifi, Counters::new(10, 0))
            .with_bucket(10_002, Transport::Wifi, Counters::new(20, 0))
            .with_latency(10_002, Duration::from_millis(500));
        let apps = vec![user_app("com.fast", 10_001), user_app("com.slow", 10_002)];
        let config = AggregatorConfig {
            max_concurrent_entries: 4,
            query_timeout_ms: 50,
        };

        let aggregator = make_aggregator_with(
            Arc::new(stats),
            apps,
            Arc::new(FixtureIcons::new()),
            FixturePermissions::granted(),
            config,
        );
        let report = aggregator.collect_per_app(window()).await.unwrap();

        assert_eq!(packages(&report), vec!["com.fast"]);
    }

    #[tokio::test]
    async fn test_tethering_entry_is_ranked_among_apps() {
        let stats = FixtureStatsProvider::new()
            .with_bucket(10_001, Transport::Wifi, Counters::new(1_000, 0))
            .with_bucket(10_002, Transport::Wifi, Counters::new(20, 0))
            .with_bucket(config::TETHERING_OWNER_ID, Transport::Wifi, Counters::new(100, 50));
        let apps = vec![user_app("com.big", 10_001), user_app("com.small", 10_002)];

        let report = simple(stats, apps).collect_per_app(window()).await.unwrap();

        assert_eq!(
            packages(&report),
            vec!["com.big", "com.android.tethering", "com.small"]
        );
        let tether = &report.records()[1];
        assert_eq!(tether.owner_id, -1);
        assert_eq!(tether.total_bytes, 150);
        assert_eq!(tether.usage.mobile, Counters::ZERO);
        assert!(tether.icon.is_none());
    }

    #[tokio::test]
    async fn test_tethering_absent_without_traffic() {
        let stats = FixtureStatsProvider::new()
            .with_bucket(10_001, Transport::Wifi, Counters::new(5, 0));
        let report = simple(stats, vec![user_app("com.a", 10_001)])
            .collect_per_app(window())
            .await
            .unwrap();
        assert!(report.records().iter().all(|r| !r.is_tethering()));
    }

    #[tokio::test]
    async fn test_tethering_failure_yields_no_entry_but_call_succeeds() {
        let stats = FixtureStatsProvider::new()
            .with_bucket(10_001, Transport::Wifi, Counters::new(5, 0))
            .failing_owner(config::TETHERING_OWNER_ID, "tethering stats unsupported");
        let report = simple(stats, vec![user_app("com.a", 10_001)])
            .collect_per_app(window())
            .await
            .unwrap();
        assert_eq!(packages(&report), vec!["com.a"]);
    }

    #[tokio::test]
    async fn test_equal_totals_keep_catalog_order_with_tethering_last() {
        let stats = FixtureStatsProvider::new()
            .with_bucket(10_001, Transport::Wifi, Counters::new(1_000, 0))
            .with_bucket(10_002, Transport::Mobile, Counters::new(600, 400))
            .with_bucket(config::TETHERING_OWNER_ID, Transport::Mobile, Counters::new(0, 1_000));
        let apps = vec![user_app("com.first", 10_001), user_app("com.second", 10_002)];

        let report = simple(stats, apps).collect_per_app(window()).await.unwrap();

        assert_eq!(
            packages(&report),
            vec!["com.first", "com.second", "com.android.tethering"]
        );
    }

    #[tokio::test]
    async fn test_icons_fetched_only_for_reported_entries() {
        let stats = Arc::new(
            FixtureStatsProvider::new().with_bucket(10_001, Transport::Wifi, Counters::new(9, 0)),
        );
        let icons = Arc::new(
            FixtureIcons::new().with_icon("com.busy", "data:image/png;base64,iVBORw0KGgo="),
        );
        let apps = vec![
            user_app("com.busy", 10_001),
            user_app("com.idle", 10_002),
            system_app("android.service", 1_000, false),
        ];
        let aggregator = make_aggregator(
            stats,
            apps,
            Arc::clone(&icons),
            FixturePermissions::granted(),
        );

        let report = aggregator.collect_per_app(window()).await.unwrap();

        assert_eq!(
            report.records()[0].icon.as_deref(),
            Some("data:image/png;base64,iVBORw0KGgo=")
        );
        assert_eq!(icons.calls("com.busy"), 1);
        assert_eq!(icons.calls("com.idle"), 0);
        assert_eq!(icons.calls("android.service"), 0);
    }

    #[tokio::test]
    async fn test_icon_failure_keeps_entry_without_icon() {
        let stats = Arc::new(
            FixtureStatsProvider::new().with_bucket(10_001, Transport::Wifi, Counters::new(9, 0)),
        );
        let icons = Arc::new(FixtureIcons::new().failing_for("com.busy", "drawable too large"));
        let aggregator = make_aggregator(
            stats,
            vec![user_app("com.busy", 10_001)],
            icons,
            FixturePermissions::granted(),
        );

        let report = aggregator.collect_per_app(window()).await.unwrap();

        assert_eq!(packages(&report), vec!["com.busy"]);
        assert!(report.records()[0].icon.is_none());
    }

    #[tokio::test]
    async fn test_slow_icon_times_out_and_keeps_entry() {
        let stats = Arc::new(
            FixtureStatsProvider::new().with_bucket(10_001, Transport::Wifi, Counters::new(9, 0)),
        );
        let icons = Arc::new(
            FixtureIcons::new()
                .with_icon("com.busy", "data:image/png;base64,iVBORw0KGgo=")
                .with_latency("com.busy", Duration::from_millis(500)),
        );
        let aggregator = make_aggregator_with(
            stats,
            vec![user_app("com.busy", 10_001)],
            Arc::clone(&icons),
            FixturePermissions::granted(),
            AggregatorConfig {
                max_concurrent_entries: 4,
                query_timeout_ms: 50,
            },
        );

        let report = aggregator.collect_per_app(window()).await.unwrap();

        assert_eq!(packages(&report), vec!["com.busy"]);
        assert_eq!(report.records()[0].total_bytes, 9);
        assert!(report.records()[0].icon.is_none());
        assert_eq!(icons.calls("com.busy"), 1);
    }

    #[tokio::test]
    async fn test_identical_inputs_serialize_identically() {
        let stats = FixtureStatsProvider::new()
            .with_bucket(10_001, Transport::Wifi, Counters::new(300, 20))
            .with_bucket(10_002, Transport::Mobile, Counters::new(300, 20))
            .with_bucket(10_003, Transport::Wifi, Counters::new(5, 5))
            .with_summary(Transport::Wifi, Counters::new(1_000, 100));
        let apps = vec![
            user_app("com.a", 10_001),
            user_app("com.b", 10_002),
            user_app("com.c", 10_003),
        ];
        let aggregator = simple(stats, apps);

        let first = serde_json::to_string(&aggregator.collect_per_app(window()).await.unwrap()).unwrap();
        let second = serde_json::to_string(&aggregator.collect_per_app(window()).await.unwrap()).unwrap();
        assert_eq!(first, second);

        let first = serde_json::to_string(&aggregator.collect_total(window()).await.unwrap()).unwrap();
        let second = serde_json::to_string(&aggregator.collect_total(window()).await.unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_sequential_and_concurrent_collection_agree() {
        let build = || {
            let mut stats = FixtureStatsProvider::new();
            let mut apps = Vec::new();
            for i in 0..20i64 {
                let owner = 10_000 + i;
                let bytes = u64::try_from((i * 37) % 11).unwrap() * 100;
                stats = stats
                    .with_bucket(owner, Transport::Wifi, Counters::new(bytes, 0))
                    .with_latency(owner, Duration::from_millis(u64::try_from(20 - i).unwrap()));
                apps.push(user_app(&format!("com.app{i}"), owner));
            }
            (Arc::new(stats), apps)
        };

        let (stats, apps) = build();
        let sequential = make_aggregator_with(
            stats,
            apps,
            Arc::new(FixtureIcons::new()),
            FixturePermissions::granted(),
            AggregatorConfig {
                max_concurrent_entries: 1,
                ..AggregatorConfig::default()
            },
        );
        let (stats, apps) = build();
        let concurrent = make_aggregator_with(
            stats,
            apps,
            Arc::new(FixtureIcons::new()),
            FixturePermissions::granted(),
            AggregatorConfig {
                max_concurrent_entries: 16,
                ..AggregatorConfig::default()
            },
        );

        assert_eq!(
            sequential.collect_per_app(window()).await.unwrap(),
            concurrent.collect_per_app(window()).await.unwrap()
        );
    }

    /// Counts in-flight detail queries to check the concurrency bound.
    #[derive(Default)]
    struct InFlightProbe {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl StatsProvider for InFlightProbe {
        async fn query_entity(
            &self,
            _transport: Transport,
            _subscriber_id: Option<&str>,
            _window: TimeWindow,
            owner_id: i64,
        ) -> anyhow::Result<Vec<Counters>> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            let bytes = u64::try_from(owner_id.max(0)).unwrap_or(0);
            Ok(vec![Counters::new(bytes, 0)])
        }

        async fn query_summary(
            &self,
            _transport: Transport,
            _subscriber_id: Option<&str>,
            _window: TimeWindow,
        ) -> anyhow::Result<Counters> {
            Ok(Counters::ZERO)
        }
    }

    #[tokio::test]
    async fn test_fan_out_respects_concurrency_limit() {
        let probe = Arc::new(InFlightProbe::default());
        let apps: Vec<InstalledApp> = (1..=12).map(|i| user_app(&format!("com.app{i}"), i)).collect();
        let aggregator = UsageAggregator::new(
            Arc::clone(&probe) as Arc<dyn StatsProvider>,
            Arc::new(FixtureCatalog::new(apps)),
            Arc::new(FixtureIcons::new()),
            Arc::new(FixturePermissions::granted()),
            AggregatorConfig {
                max_concurrent_entries: 3,
                ..AggregatorConfig::default()
            },
        );

        let report = aggregator.collect_per_app(window()).await.unwrap();

        assert_eq!(report.len(), 12);
        // Each admitted entry runs its Wi-Fi and mobile queries side by side.
        assert!(probe.peak.load(Ordering::SeqCst) <= 3 * 2);
        assert!(probe.peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_catalog_failure_is_reported() {
        let aggregator = UsageAggregator::new(
            Arc::new(FixtureStatsProvider::new()),
            Arc::new(FixtureCatalog::failing("package manager died")),
            Arc::new(FixtureIcons::new()),
            Arc::new(FixturePermissions::granted()),
            AggregatorConfig::default(),
        );
        let err = aggregator.collect_per_app(window()).await.unwrap_err();
        assert_eq!(err.kind(), "CatalogUnavailable");
        assert!(err.to_string().contains("package manager died"));
    }

    #[test]
    fn test_retain_reported_keeps_order_and_skips_non_reported() {
        let record = |package: &str| {
            AppUsageRecord::new(
                &user_app(package, 1),
                TransportUsage::new(Counters::new(1, 0), Counters::ZERO),
                None,
            )
        };
        let outcomes = vec![
            ("com.a".to_string(), EntryOutcome::Reported(record("com.a"))),
            ("com.b".to_string(), EntryOutcome::Idle),
            (
                "com.c".to_string(),
                EntryOutcome::Failed(EntryFailure::Timeout {
                    transport: Transport::Wifi,
                    timeout_ms: 5,
                }),
            ),
            ("com.d".to_string(), EntryOutcome::Filtered),
            ("com.e".to_string(), EntryOutcome::Reported(record("com.e"))),
        ];

        let records = retain_reported(outcomes);
        let names: Vec<&str> = records.iter().map(|r| r.package_id.as_str()).collect();
        assert_eq!(names, vec!["com.a", "com.e"]);
    }

    #[test]
    fn test_entry_failure_messages() {
        let failure = EntryFailure::Query {
            transport: Transport::Mobile,
            message: "denied".into(),
        };
        assert_eq!(failure.to_string(), "mobile query failed: denied");
        let failure = EntryFailure::Timeout {
            transport: Transport::Wifi,
            timeout_ms: 50,
        };
        assert_eq!(failure.to_string(), "wifi query timed out after 50 ms");
    }

    #[tokio::test]
    async fn test_total_combines_wifi_and_mobile_summaries() {
        let stats = Arc::new(
            FixtureStatsProvider::new()
                .with_summary(Transport::Wifi, Counters::new(1_000, 200))
                .with_summary(Transport::Mobile, Counters::new(300, 50)),
        );
        let aggregator = make_aggregator(
            Arc::clone(&stats),
            Vec::new(),
            Arc::new(FixtureIcons::new()),
            FixturePermissions::granted(),
        );

        let total = aggregator.collect_total(window()).await.unwrap();

        assert_eq!(total.wifi, Counters::new(1_000, 200));
        assert_eq!(total.mobile, Counters::new(300, 50));
        assert_eq!(total.total_bytes, 1_550);
        assert_eq!(
            stats.summary_subscriber(Transport::Mobile),
            Some(Some("310260000000000".to_string()))
        );
    }

    #[tokio::test]
    async fn test_total_mobile_is_zero_without_phone_state_access() {
        let stats = Arc::new(
            FixtureStatsProvider::new()
                .with_summary(Transport::Wifi, Counters::new(10, 5))
                .with_summary(Transport::Mobile, Counters::new(300, 50)),
        );
        let aggregator = make_aggregator(
            Arc::clone(&stats),
            Vec::new(),
            Arc::new(FixtureIcons::new()),
            FixturePermissions::without_phone_state(),
        );

        let total = aggregator.collect_total(window()).await.unwrap();

        assert_eq!(total.wifi, Counters::new(10, 5));
        assert_eq!(total.mobile, Counters::ZERO);
        assert_eq!(total.total_bytes, 15);
        assert_eq!(stats.summary_subscriber(Transport::Mobile), None);
    }

    #[tokio::test]
    async fn test_total_mobile_is_zero_without_subscriber_id() {
        let stats = FixtureStatsProvider::new()
            .with_summary(Transport::Mobile, Counters::new(300, 50))
            .failing_summary(Transport::Mobile, "should not be queried");
        let aggregator = make_aggregator(
            Arc::new(stats),
            Vec::new(),
            Arc::new(FixtureIcons::new()),
            FixturePermissions::without_subscriber(),
        );

        let total = aggregator.collect_total(window()).await.unwrap();
        assert_eq!(total, TotalUsageSummary::default());
    }

    #[tokio::test]
    async fn test_total_fails_when_wifi_summary_unavailable() {
        let stats = FixtureStatsProvider::new().failing_summary(Transport::Wifi, "service unreachable");
        let err = simple(stats, Vec::new()).collect_total(window()).await.unwrap_err();
        assert_eq!(err.kind(), "StatsUnavailable");
        assert!(err.to_string().contains("service unreachable"));
    }

    #[tokio::test]
    async fn test_total_fails_when_mobile_summary_unavailable() {
        let stats = FixtureStatsProvider::new()
            .with_summary(Transport::Wifi, Counters::new(1, 1))
            .failing_summary(Transport::Mobile, "radio off");
        let err = simple(stats, Vec::new()).collect_total(window()).await.unwrap_err();
        assert_eq!(err.kind(), "StatsUnavailable");
        assert!(err.to_string().starts_with("mobile summary query failed"));
    }
}
