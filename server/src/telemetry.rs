//! Structured logging setup. Mirrors the HTTP server's telemetry module:
//! a `Registry` with an `EnvFilter`, then one of three `fmt` layers chosen
//! by config.

use crate::config::{Config, LogFormat, LoggingConfig};
use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

pub fn init_telemetry(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.level)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to build log filter")?;

    let registry = Registry::default().with(filter);

    match config.format {
        LogFormat::Pretty => {
            registry
                .with(fmt::layer().pretty().with_target(true))
                .try_init()
                .context("failed to install pretty log subscriber")?;
        }
        LogFormat::Json => {
            registry
                .with(fmt::layer().json().with_target(true).with_current_span(true))
                .try_init()
                .context("failed to install json log subscriber")?;
        }
        LogFormat::Compact => {
            registry
                .with(fmt::layer().compact().with_target(false))
                .try_init()
                .context("failed to install compact log subscriber")?;
        }
    }

    Ok(())
}

pub fn log_startup_info(config: &Config) {
    tracing::info!(
        transport = %config.server.transport,
        database_url = %config.database_url(),
        "task orchestrator starting"
    );
}

pub fn log_config_validation(config: &Config) {
    match config.validate() {
        Ok(()) => tracing::debug!("configuration validated"),
        Err(err) => tracing::error!(error = %err, "configuration validation failed"),
    }
}

pub fn log_shutdown_info() {
    tracing::info!("task orchestrator shutting down");
}

pub fn report_error(context: &str, err: &anyhow::Error) {
    tracing::error!(context, error = %err, "operation failed");
}

/// Scoped timer that logs elapsed time on drop; used around migration and
/// startup work where a dedicated metric isn't worth wiring up.
pub struct PerformanceTimer {
    label: &'static str,
    started: std::time::Instant,
}

impl PerformanceTimer {
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            started: std::time::Instant::now(),
        }
    }
}

impl Drop for PerformanceTimer {
    fn drop(&mut self) {
        tracing::debug!(label = self.label, elapsed_ms = self.started.elapsed().as_millis() as u64, "timed block finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_falls_back_to_info_on_bad_level() {
        let cfg = LoggingConfig {
            level: "not-a-real-level".to_string(),
            format: LogFormat::Compact,
        };
        let filter = EnvFilter::try_new(&cfg.level).or_else(|_| EnvFilter::try_new("info"));
        assert!(filter.is_ok());
    }
}
