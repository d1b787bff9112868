#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # MrZAP telemetry
//!
//! A single entry point for initializing the global `tracing` subscriber
//! shared by the agent and daemon binaries.

use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Initializes the global `tracing` subscriber for structured JSON logging to
/// stderr, with the level controlled by `RUST_LOG` (defaulting to `info`).
///
/// Also bridges any `log`-crate output from dependencies into the same
/// subscriber via `tracing-log`, so nothing is silently dropped.
pub fn init_tracing() -> Result<(), anyhow::Error> {
    let fmt_layer = fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing_log::LogTracer::init()?;
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
