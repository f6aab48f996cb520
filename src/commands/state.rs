//! Shared application state handed to every command.

use std::sync::Arc;

use crate::config::AggregatorConfig;
use crate::core::UsageAggregator;
use crate::platform::{AppCatalog, IconEncoder, PermissionGate, StatsProvider};

/// Shared application state. Holds no per-request data.
pub struct AppState {
    pub aggregator: Arc<UsageAggregator>,
}

impl AppState {
    pub fn new(
        stats: Arc<dyn StatsProvider>,
        catalog: Arc<dyn AppCatalog>,
        icons: Arc<dyn IconEncoder>,
        permissions: Arc<dyn PermissionGate>,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            aggregator: Arc::new(UsageAggregator::new(
                stats,
                catalog,
                icons,
                permissions,
                config,
            )),
        }
    }
}
