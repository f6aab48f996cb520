//! Request surface, organized by functional domain.
//!
//! - `usage`: per-app report and device-wide totals
//! - `system`: usage-access permission check and settings navigation
//! - `reporting`: upload payloads for the reporting server
//! - `logic`: Pure business logic functions (unit-testable)
//! - `state`: Shared `AppState` definition

pub mod logic;
pub mod reporting;
mod state;
pub mod system;
pub mod usage;

pub use reporting::{prepare_per_process_report, prepare_total_usage_report, PerProcessUpload};
pub use state::AppState;
pub use system::{has_usage_access_permission, open_usage_access_settings};
pub use usage::{get_app_network_usage, get_total_network_usage};
