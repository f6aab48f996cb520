//! In-memory platform with deterministic data, injectable failures and latency.
//!
//! Used by the engine's tests and by hosts that want to exercise the request
//! surface without a device. All state sits in `DashMap`s so the aggregator's
//! concurrent fan-out can read it without locking.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{AppCatalog, IconEncoder, PermissionGate, StatsProvider};
use crate::core::usage::{Counters, InstalledApp, Transport};
use crate::core::window::TimeWindow;

/// Ordinary (non-system) application with a launcher entry.
pub fn user_app(package_id: &str, owner_id: i64) -> InstalledApp {
    InstalledApp {
        package_id: package_id.to_string(),
        owner_id,
        display_name: display_name_for(package_id),
        is_system: false,
        is_updated_system: false,
        has_launcher: true,
    }
}

/// Preinstalled system package, optionally exposing a launcher entry.
pub fn system_app(package_id: &str, owner_id: i64, has_launcher: bool) -> InstalledApp {
    InstalledApp {
        package_id: package_id.to_string(),
        owner_id,
        display_name: display_name_for(package_id),
        is_system: true,
        is_updated_system: false,
        has_launcher,
    }
}

/// Last dotted segment, capitalized: `com.example.maps` → `Maps`.
fn display_name_for(package_id: &str) -> String {
    let last = package_id.rsplit('.').next().unwrap_or(package_id);
    let mut chars = last.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Stats provider backed by fixed per-owner buckets and per-transport summaries.
#[derive(Default)]
pub struct FixtureStatsProvider {
    buckets: DashMap<(Transport, i64), Vec<Counters>>,
    summaries: DashMap<Transport, Counters>,
    failing_owners: DashMap<i64, String>,
    failing_summaries: DashMap<Transport, String>,
    latency: DashMap<i64, Duration>,
    entity_calls: DashMap<i64, usize>,
    summary_subscribers: DashMap<Transport, Option<String>>,
}

impl FixtureStatsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one bucket for `owner_id` on `transport`.
    pub fn with_bucket(self, owner_id: i64, transport: Transport, counters: Counters) -> Self {
        self.buckets
            .entry((transport, owner_id))
            .or_default()
            .push(counters);
        self
    }

    pub fn with_summary(self, transport: Transport, counters: Counters) -> Self {
        self.summaries.insert(transport, counters);
        self
    }

    /// Every detail query for `owner_id` fails with `message`.
    pub fn failing_owner(self, owner_id: i64, message: &str) -> Self {
        self.failing_owners.insert(owner_id, message.to_string());
        self
    }

    pub fn failing_summary(self, transport: Transport, message: &str) -> Self {
        self.failing_summaries.insert(transport, message.to_string());
        self
    }

    /// Detail queries for `owner_id` sleep for `delay` before answering.
    pub fn with_latency(self, owner_id: i64, delay: Duration) -> Self {
        self.latency.insert(owner_id, delay);
        self
    }

    /// Number of detail queries issued for `owner_id`, across transports.
    pub fn entity_calls(&self, owner_id: i64) -> usize {
        self.entity_calls.get(&owner_id).map(|c| *c).unwrap_or(0)
    }

    pub fn total_entity_calls(&self) -> usize {
        self.entity_calls.iter().map(|e| *e.value()).sum()
    }

    /// Subscriber id passed to the last summary query on `transport`, if any was issued.
    pub fn summary_subscriber(&self, transport: Transport) -> Option<Option<String>> {
        self.summary_subscribers.get(&transport).map(|s| s.value().clone())
    }
}

#[async_trait]
impl StatsProvider for FixtureStatsProvider {
    async fn query_entity(
        &self,
        transport: Transport,
        _subscriber_id: Option<&str>,
        _window: TimeWindow,
        owner_id: i64,
    ) -> anyhow::Result<Vec<Counters>> {
        *self.entity_calls.entry(owner_id).or_insert(0) += 1;

        let delay = self.latency.get(&owner_id).map(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.failing_owners.get(&owner_id) {
            anyhow::bail!("{} (uid {owner_id}, {transport})", message.value());
        }

        Ok(self
            .buckets
            .get(&(transport, owner_id))
            .map(|b| b.value().clone())
            .unwrap_or_default())
    }

    async fn query_summary(
        &self,
        transport: Transport,
        subscriber_id: Option<&str>,
        _window: TimeWindow,
    ) -> anyhow::Result<Counters> {
        self.summary_subscribers
            .insert(transport, subscriber_id.map(str::to_string));

        if let Some(message) = self.failing_summaries.get(&transport) {
            anyhow::bail!("{} ({transport} summary)", message.value());
        }

        Ok(self
            .summaries
            .get(&transport)
            .map(|c| *c)
            .unwrap_or_default())
    }
}

/// Catalog returning a fixed list, or failing outright.
pub struct FixtureCatalog {
    apps: Vec<InstalledApp>,
    failure: Option<String>,
}

impl FixtureCatalog {
    pub fn new(apps: Vec<InstalledApp>) -> Self {
        Self {
            apps,
            failure: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            apps: Vec::new(),
            failure: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl AppCatalog for FixtureCatalog {
    async fn list_installed(&self) -> anyhow::Result<Vec<InstalledApp>> {
        match &self.failure {
            Some(message) => anyhow::bail!("{message}"),
            None => Ok(self.apps.clone()),
        }
    }
}

/// Icon encoder answering from a fixed package → data URI map.
#[derive(Default)]
pub struct FixtureIcons {
    icons: DashMap<String, String>,
    failing: DashMap<String, String>,
    latency: DashMap<String, Duration>,
    calls: DashMap<String, usize>,
}

impl FixtureIcons {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_icon(self, package_id: &str, data_uri: &str) -> Self {
        self.icons
            .insert(package_id.to_string(), data_uri.to_string());
        self
    }

    pub fn failing_for(self, package_id: &str, message: &str) -> Self {
        self.failing
            .insert(package_id.to_string(), message.to_string());
        self
    }

    /// Requests for `package_id` sleep for `delay` before answering.
    pub fn with_latency(self, package_id: &str, delay: Duration) -> Self {
        self.latency.insert(package_id.to_string(), delay);
        self
    }

    pub fn calls(&self, package_id: &str) -> usize {
        self.calls.get(package_id).map(|c| *c).unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.iter().map(|e| *e.value()).sum()
    }
}

#[async_trait]
impl IconEncoder for FixtureIcons {
    async fn encode(&self, package_id: &str) -> anyhow::Result<Option<String>> {
        *self.calls.entry(package_id.to_string()).or_insert(0) += 1;

        let delay = self.latency.get(package_id).map(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.failing.get(package_id) {
            anyhow::bail!("{}", message.value());
        }
        Ok(self.icons.get(package_id).map(|uri| uri.value().clone()))
    }
}

/// Permission gate with fixed answers.
pub struct FixturePermissions {
    usage_access: bool,
    phone_state: bool,
    mobile_owner_id: Option<String>,
    settings_opened: AtomicUsize,
}

impl FixturePermissions {
    /// Usage access and phone-state access granted, subscriber id resolvable.
    pub fn granted() -> Self {
        Self {
            usage_access: true,
            phone_state: true,
            mobile_owner_id: Some("310260000000000".to_string()),
            settings_opened: AtomicUsize::new(0),
        }
    }

    /// Usage access granted, phone-state access not granted.
    pub fn without_phone_state() -> Self {
        Self {
            phone_state: false,
            mobile_owner_id: None,
            ..Self::granted()
        }
    }

    /// Phone-state access granted but the device exposes no subscriber id.
    pub fn without_subscriber() -> Self {
        Self {
            mobile_owner_id: None,
            ..Self::granted()
        }
    }

    /// Nothing granted.
    pub fn denied() -> Self {
        Self {
            usage_access: false,
            ..Self::without_phone_state()
        }
    }

    pub fn settings_opened(&self) -> usize {
        self.settings_opened.load(Ordering::Relaxed)
    }
}

impl PermissionGate for FixturePermissions {
    fn has_usage_access(&self) -> bool {
        self.usage_access
    }

    fn has_phone_state_access(&self) -> bool {
        self.phone_state
    }

    fn resolve_mobile_owner_id(&self) -> Option<String> {
        if self.phone_state {
            self.mobile_owner_id.clone()
        } else {
            None
        }
    }

    fn open_usage_access_settings(&self) -> anyhow::Result<()> {
        self.settings_opened.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
