//! Usage data model: byte counters, per-transport usage, per-app records,
//! and the device-wide summary.
//!
//! Everything here is built fresh per request and serialized in the shape the
//! phone client's JavaScript layer already consumes.

use serde::ser::SerializeStruct;
use serde::Serialize;

use crate::config;

/// Physical medium the traffic was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Wifi,
    Mobile,
}

impl Transport {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Wifi => "wifi",
            Self::Mobile => "mobile",
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Received/transmitted byte counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub rx: u64,
    pub tx: u64,
}

impl Counters {
    pub const ZERO: Counters = Counters { rx: 0, tx: 0 };

    pub fn new(rx: u64, tx: u64) -> Self {
        Self { rx, tx }
    }

    pub fn total(&self) -> u64 {
        self.rx.saturating_add(self.tx)
    }

    /// Sum a sequence of detail-query buckets.
    pub fn sum<'a>(buckets: impl IntoIterator<Item = &'a Counters>) -> Counters {
        buckets
            .into_iter()
            .fold(Counters::ZERO, |acc, b| Counters {
                rx: acc.rx.saturating_add(b.rx),
                tx: acc.tx.saturating_add(b.tx),
            })
    }
}

/// Serializes as `{ "rx": .., "tx": .., "total": .. }`.
impl Serialize for Counters {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut s = serializer.serialize_struct("Counters", 3)?;
        s.serialize_field("rx", &self.rx)?;
        s.serialize_field("tx", &self.tx)?;
        s.serialize_field("total", &self.total())?;
        s.end()
    }
}

/// Counters split by transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransportUsage {
    pub wifi: Counters,
    pub mobile: Counters,
}

impl TransportUsage {
    pub fn new(wifi: Counters, mobile: Counters) -> Self {
        Self { wifi, mobile }
    }

    pub fn total(&self) -> u64 {
        self.wifi.total().saturating_add(self.mobile.total())
    }
}

/// One installed application as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledApp {
    pub package_id: String,
    pub owner_id: i64,
    pub display_name: String,
    pub is_system: bool,
    pub is_updated_system: bool,
    pub has_launcher: bool,
}

impl InstalledApp {
    /// Launcher-less system packages are skipped. Background services without a
    /// launcher entry are therefore never attributed, even when they use the network.
    pub fn is_reportable(&self) -> bool {
        !((self.is_system || self.is_updated_system) && !self.has_launcher)
    }
}

/// Usage of a single application (or the tethering pseudo-entry) over a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppUsageRecord {
    #[serde(rename = "packageName")]
    pub package_id: String,
    #[serde(rename = "appName")]
    pub display_name: String,
    /// `data:image/png;base64,...` thumbnail, `null` when unavailable.
    pub icon: Option<String>,
    #[serde(rename = "uid")]
    pub owner_id: i64,
    #[serde(flatten)]
    pub usage: TransportUsage,
    #[serde(rename = "totalBytes")]
    pub total_bytes: u64,
}

impl AppUsageRecord {
    pub fn new(app: &InstalledApp, usage: TransportUsage, icon: Option<String>) -> Self {
        Self {
            package_id: app.package_id.clone(),
            display_name: app.display_name.clone(),
            icon,
            owner_id: app.owner_id,
            total_bytes: usage.total(),
            usage,
        }
    }

    /// Synthetic entry for traffic relayed through tethering/hotspot.
    pub fn tethering(usage: TransportUsage) -> Self {
        Self {
            package_id: config::TETHERING_PACKAGE_ID.to_string(),
            display_name: config::TETHERING_DISPLAY_NAME.to_string(),
            icon: None,
            owner_id: config::TETHERING_OWNER_ID,
            total_bytes: usage.total(),
            usage,
        }
    }

    pub fn is_tethering(&self) -> bool {
        self.owner_id == config::TETHERING_OWNER_ID
    }
}

/// Ranked per-app usage. Only built by [`crate::core::ranker::rank`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UsageReport(Vec<AppUsageRecord>);

impl UsageReport {
    pub(crate) fn from_ranked(records: Vec<AppUsageRecord>) -> Self {
        Self(records)
    }

    pub fn records(&self) -> &[AppUsageRecord] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Device-wide usage over a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TotalUsageSummary {
    pub wifi: Counters,
    pub mobile: Counters,
    #[serde(rename = "totalBytes")]
    pub total_bytes: u64,
}
