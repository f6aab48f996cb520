//! Core logic: window resolution, usage collection, ranking.
//!
//! - [`window`]: period selector to concrete `[start, end)` window
//! - [`usage`]: counters, per-app records, device summary
//! - [`UsageAggregator`]: bounded concurrent fan-out over the app catalog
//! - [`ranker`]: filtering and stable descending order
//! - [`icon_encoder`]: RGBA icon to PNG data URI

pub mod aggregator;
pub mod icon_encoder;
pub mod ranker;
pub mod usage;
pub mod window;

pub use aggregator::{EntryFailure, EntryOutcome, UsageAggregator};
pub use icon_encoder::{IconSource, PngIconEncoder, RgbaIcon};
pub use usage::{
    AppUsageRecord, Counters, InstalledApp, TotalUsageSummary, Transport, TransportUsage,
    UsageReport,
};
pub use window::{Period, TimeWindow};
