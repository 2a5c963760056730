//! crates/logging/src/subscriber.rs
//! Installation of the process-wide `tracing` subscriber.

use std::io;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

use crate::config::VerbosityConfig;

/// Environment variable whose directives replace the verbosity mapping.
pub const LOG_ENV: &str = "RUST_LOG";

/// Builds the filter for `config`, letting `override_directives` (normally
/// the value of [`LOG_ENV`]) take precedence when present and non-empty.
pub fn build_filter(
    config: &VerbosityConfig,
    override_directives: Option<&str>,
) -> Result<EnvFilter, ParseError> {
    match override_directives.map(str::trim) {
        Some(directives) if !directives.is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(config.filter_directive()),
    }
}

/// Installs a formatting subscriber that writes to standard error.
///
/// `RUST_LOG` overrides the level derived from `config`; an unparsable
/// `RUST_LOG` falls back to the configured level. Returns an error when a
/// global subscriber is already installed.
///
/// ```no_run
/// use logging::{VerbosityConfig, init_tracing};
///
/// init_tracing(VerbosityConfig::from_verbose_level(2)).expect("subscriber");
/// tracing::debug!("visible at -vv");
/// ```
pub fn init_tracing(config: VerbosityConfig) -> Result<(), TryInitError> {
    let env = std::env::var(LOG_ENV).ok();
    let filter = build_filter(&config, env.as_deref())
        .or_else(|_| build_filter(&config, None))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(config.show_targets)
        .without_time();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
}
