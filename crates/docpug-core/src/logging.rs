//! Logging bootstrap using `tracing` and `tracing-subscriber`.
//!
//! - `error`: failed API calls and storage errors
//! - `warn`: stale responses ignored, compensating actions
//! - `info`: line edits, catalog changes, visit writes
//! - `debug`: requests, normalization fallbacks

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogSettings;

/// Build the filter: `RUST_LOG` when set, otherwise the configured directive.
pub fn build_env_filter(settings: &LogSettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| configured_filter(&settings.filter))
}

/// Parse a configured directive, falling back to `info` when it is invalid.
fn configured_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// Returns false when a subscriber was already installed (by an earlier call
/// or by the host application).
pub fn init_logging(settings: &LogSettings) -> bool {
    let filter = build_env_filter(settings);

    let result = if settings.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(false))
            .try_init()
    };

    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_bad_directive_falls_back() {
        let filter = configured_filter("==not a filter==");
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn test_configured_directive_kept() {
        let filter = configured_filter("debug");
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }
}
