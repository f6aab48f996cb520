//! Centralized runtime constants for PacketMeter.
//!
//! All tunable limits, identities, and sizes are collected here so they can
//! be found and adjusted in a single place rather than scattered across modules.

use std::time::Duration;

use serde::Deserialize;

/// Maximum number of catalog entries collected concurrently. Each admitted entry
/// runs its Wi-Fi and mobile queries side by side, so up to twice as many
/// provider queries can be in flight.
pub const MAX_CONCURRENT_ENTRIES: usize = 8;

/// Deadline applied to every individual provider query and icon request (milliseconds).
pub const QUERY_TIMEOUT_MS: u64 = 5_000;

/// Upper bound of `count` for the `day` period.
pub const MAX_DAY_COUNT: u32 = 7;

/// Upper bound of `count` for the `week` period.
pub const MAX_WEEK_COUNT: u32 = 4;

/// Upper bound of `count` for the `month` period.
pub const MAX_MONTH_COUNT: u32 = 12;

/// Owner id the platform attributes tethered/hotspot traffic to.
pub const TETHERING_OWNER_ID: i64 = -1;

/// Package id reported for the tethering pseudo-entry.
pub const TETHERING_PACKAGE_ID: &str = "com.android.tethering";

/// Display name reported for the tethering pseudo-entry.
pub const TETHERING_DISPLAY_NAME: &str = "Tethering / Hotspot";

/// Edge length of encoded icon thumbnails (pixels).
pub const ICON_SIZE_PX: u32 = 64;

/// Prefix of every encoded icon thumbnail.
pub const ICON_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Aggregator tunables. Deserializable so a host can pass overrides as JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AggregatorConfig {
    /// Entries admitted to the fan-out at once. Values below 1 are treated as 1.
    pub max_concurrent_entries: usize,
    /// Per-query deadline in milliseconds.
    pub query_timeout_ms: u64,
}

impl AggregatorConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn concurrency(&self) -> usize {
        self.max_concurrent_entries.max(1)
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_entries: MAX_CONCURRENT_ENTRIES,
            query_timeout_ms: QUERY_TIMEOUT_MS,
        }
    }
}
