//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber once at startup
//! - Derive the filter from `RUST_LOG`, else from the configured level
//! - Raise this crate to `debug` when debug logging is requested

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Filter directives used when `RUST_LOG` is not set.
pub fn default_directives(config: &ObservabilityConfig) -> String {
    let crate_level = if config.debug { "debug" } else { config.log_level.as_str() };
    format!(
        "{},layout_render_proxy={},tower_http={}",
        config.log_level, crate_level, crate_level
    )
}

/// Install the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(config)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let initialized = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init();

    if initialized.is_err() {
        tracing::debug!("Logging already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        let config = ObservabilityConfig::default();
        assert_eq!(
            default_directives(&config),
            "info,layout_render_proxy=info,tower_http=info"
        );

        let config = ObservabilityConfig {
            log_level: "warn".into(),
            debug: true,
            ..ObservabilityConfig::default()
        };
        assert_eq!(
            default_directives(&config),
            "warn,layout_render_proxy=debug,tower_http=debug"
        );
    }
}
