//! Logging and tracing initialization.

use crate::config::LoggingConfig;

/// Transport crates are chatty at debug level; keep them at warn unless
/// `RUST_LOG` says otherwise.
const QUIET_DEPENDENCIES: &str = "hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn";

/// Build the filter directive string for a configured level.
pub fn filter_directives(level: &str) -> String {
    format!("{level},{QUIET_DEPENDENCIES}")
}

/// Initialize the tracing subscriber with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level. Returns `false`
/// when a global subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(&config.level)));

    if config.json {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .json()
            .with_current_span(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber).is_ok()
    } else {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber).is_ok()
    }
}

/// Pick the level for the CLI `--verbose` flag, keeping the configured
/// level otherwise.
pub fn level_for_verbosity(config: &LoggingConfig, verbose: bool) -> LoggingConfig {
    LoggingConfig {
        level: if verbose {
            "debug".to_string()
        } else {
            config.level.clone()
        },
        json: config.json,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives_keep_level_first() {
        let directives = filter_directives("fallwatch=debug");
        assert!(directives.starts_with("fallwatch=debug,"));
        assert!(directives.contains("reqwest=warn"));
    }

    #[test]
    fn test_verbose_overrides_level() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            json: true,
        };
        assert_eq!(level_for_verbosity(&config, true).level, "debug");
        let quiet = level_for_verbosity(&config, false);
        assert_eq!(quiet.level, "warn");
        assert!(quiet.json);
    }
}
