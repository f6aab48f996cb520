pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod platform;

pub use crate::commands::AppState;
pub use crate::config::AggregatorConfig;
pub use crate::core::{Period, TimeWindow, TotalUsageSummary, UsageAggregator, UsageReport};
pub use crate::error::AppError;

/// Install the log subscriber and a panic hook that logs before unwinding.
///
/// Filter comes from `RUST_LOG`, defaulting to `packetmeter=info`. Only the
/// first call has any effect.
pub fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();

    INIT.call_once(|| {
        let default_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!("PANIC in PacketMeter: {info}");
            default_hook(info);
        }));

        let installed = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "packetmeter=info".into()),
            )
            .try_init();

        match installed {
            Ok(()) => tracing::info!("PacketMeter usage engine initialized"),
            Err(e) => tracing::debug!("Keeping existing tracing subscriber: {e}"),
        }
    });
}
