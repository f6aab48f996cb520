//! Permission commands.

use super::state::AppState;

/// Whether the usage-access permission is currently granted.
pub fn has_usage_access_permission(state: &AppState) -> bool {
    state.aggregator.permissions().has_usage_access()
}

/// Open the OS usage-access settings screen. Fire-and-forget: failures are logged.
pub fn open_usage_access_settings(state: &AppState) {
    match state.aggregator.permissions().open_usage_access_settings() {
        Ok(()) => tracing::debug!("Opened usage access settings"),
        Err(e) => tracing::warn!("Failed to open usage access settings: {e:#}"),
    }
}
