//! Structured debug logging system

use crate::diagnostic_log::DiagnosticLog;
use posecam_core::{CoreError, CoreResult};
use tracing::Subscriber;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info";

/// Builder for the process-wide tracing subscriber
#[derive(Debug, Default)]
pub struct DebugLogger {
    directives: Option<String>,
    with_target: bool,
    diagnostic_log: Option<DiagnosticLog>,
}

impl DebugLogger {
    /// Create new debug logger
    pub fn new() -> Self {
        Self::default()
    }

    /// Use explicit filter directives instead of `RUST_LOG`
    pub fn with_filter(mut self, directives: impl Into<String>) -> Self {
        self.directives = Some(directives.into());
        self
    }

    /// Print event targets in the formatted output
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    /// Also record events into `log`
    pub fn with_diagnostic_log(mut self, log: DiagnosticLog) -> Self {
        self.diagnostic_log = Some(log);
        self
    }

    fn env_filter(&self) -> CoreResult<EnvFilter> {
        match &self.directives {
            Some(directives) => {
                EnvFilter::try_new(directives).map_err(|e| CoreError::Initialization {
                    reason: format!("Invalid log filter '{}': {}", directives, e),
                })
            }
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
        }
    }

    /// Build the subscriber without installing it
    pub fn build(self) -> CoreResult<impl Subscriber + Send + Sync + 'static> {
        let filter = self.env_filter()?;
        let fmt_layer = fmt::layer()
            .with_target(self.with_target)
            .with_writer(std::io::stderr);

        Ok(tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .with(self.diagnostic_log))
    }

    /// Install this configuration as the global default subscriber
    pub fn init(self) -> CoreResult<()> {
        self.build()?
            .try_init()
            .map_err(|e| CoreError::Initialization {
                reason: format!("Failed to install tracing subscriber: {}", e),
            })
    }

    /// Initialize logging system with the default configuration
    pub fn init_logging() -> CoreResult<()> {
        Self::new().init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, info};

    #[test]
    fn test_invalid_filter_rejected() {
        let err = DebugLogger::new()
            .with_filter("posecam=[")
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, CoreError::Initialization { .. }));
    }

    #[test]
    fn test_filter_applies_to_diagnostic_log() {
        let log = DiagnosticLog::new();
        let subscriber = DebugLogger::new()
            .with_filter("info")
            .with_diagnostic_log(log.clone())
            .build()
            .unwrap();

        tracing::subscriber::with_default(subscriber, || {
            debug!("hidden");
            info!("shown");
        });

        assert!(log.contains("shown"));
        assert!(!log.contains("hidden"));
    }
}
