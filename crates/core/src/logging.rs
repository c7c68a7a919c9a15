//! tracing subscriber setup.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Directives applied when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_LOG_FILTER: &str = "info,meshview=debug";

fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Installs a global fmt subscriber with target and thread ids.
///
/// Later calls leave the first subscriber in place.
///
/// ```
/// meshview_core::init_logging();
/// tracing::debug!("ready");
/// ```
pub fn init_logging() {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let installed = tracing_subscriber::registry()
        .with(filter_from(directives.as_deref()))
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
    if installed.is_err() {
        tracing::trace!("Subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_falls_back_to_default_filter() {
        assert_eq!(filter_from(None).to_string(), filter_from(Some("meshview=loud")).to_string());
        assert_eq!(filter_from(Some("warn")).to_string(), "warn");
    }

    #[test]
    fn test_repeated_init_is_harmless() {
        init_logging();
        init_logging();
    }
}
