//! Seams to the host platform's services.
//!
//! The engine never reaches platform singletons directly: every collaborator is
//! injected as a trait object so a host bridge (or the in-memory [`fixture`]
//! platform) can stand behind it.
//!
//! - [`StatsProvider`]: detail and summary byte-counter queries
//! - [`AppCatalog`]: installed applications and their flags
//! - [`IconEncoder`]: thumbnail data URIs for app icons
//! - [`PermissionGate`]: usage-access / phone-state checks and settings navigation

pub mod fixture;

use async_trait::async_trait;

use crate::core::usage::{Counters, InstalledApp, Transport};
use crate::core::window::TimeWindow;

/// Network statistics subsystem.
#[async_trait]
pub trait StatsProvider: Send + Sync {
    /// Detail query for one owner id. Returns the raw buckets; the caller sums them.
    ///
    /// `subscriber_id` is `None` for per-app queries; the platform then matches
    /// every subscriber of the transport.
    async fn query_entity(
        &self,
        transport: Transport,
        subscriber_id: Option<&str>,
        window: TimeWindow,
        owner_id: i64,
    ) -> anyhow::Result<Vec<Counters>>;

    /// Summary query for the whole device on one transport.
    async fn query_summary(
        &self,
        transport: Transport,
        subscriber_id: Option<&str>,
        window: TimeWindow,
    ) -> anyhow::Result<Counters>;
}

/// Installed-application listing.
#[async_trait]
pub trait AppCatalog: Send + Sync {
    async fn list_installed(&self) -> anyhow::Result<Vec<InstalledApp>>;
}

/// Produces `data:image/png;base64,...` thumbnails for a package's icon.
#[async_trait]
pub trait IconEncoder: Send + Sync {
    /// `Ok(None)` when the package has no icon.
    async fn encode(&self, package_id: &str) -> anyhow::Result<Option<String>>;
}

/// OS permission checks. All calls are cheap and synchronous.
pub trait PermissionGate: Send + Sync {
    fn has_usage_access(&self) -> bool;

    fn has_phone_state_access(&self) -> bool;

    /// Subscriber identifier for mobile summary queries. `None` when phone-state
    /// access is missing or the device cannot provide one.
    fn resolve_mobile_owner_id(&self) -> Option<String>;

    /// Navigate to the OS usage-access settings screen.
    fn open_usage_access_settings(&self) -> anyhow::Result<()>;
}
