//! crates/logging/src/config.rs
//! Verbosity configuration derived from the `-v` count.

use std::fmt;

use tracing::level_filters::LevelFilter;

/// Crates whose events follow the requested verbosity. Everything else stays
/// at `warn`.
pub const WORKSPACE_TARGETS: &[&str] = &[
    "streampump",
    "cli",
    "transfer",
    "transport",
    "compress",
    "bandwidth",
];

/// Detail level for workspace log output.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum LogLevel {
    /// Errors only; failures are reported by the command itself.
    #[default]
    Error,
    /// Failures as they are detected.
    Warn,
    /// Connection and completion summaries.
    Info,
    /// State transitions.
    Debug,
    /// Per-step byte counts.
    Trace,
}

impl LogLevel {
    /// Lowercase directive name understood by `EnvFilter`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// Equivalent [`LevelFilter`].
    #[must_use]
    pub const fn as_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How chatty the process should be.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VerbosityConfig {
    /// Level applied to workspace crates.
    pub level: LogLevel,
    /// Whether events carry their module target.
    pub show_targets: bool,
}

impl VerbosityConfig {
    /// Maps a `-v` count onto a configuration.
    ///
    /// | count | level |
    /// |-------|-------|
    /// | 0     | error |
    /// | 1     | info  |
    /// | 2     | debug |
    /// | 3+    | trace |
    ///
    /// Targets are shown from level 2 on.
    pub fn from_verbose_level(level: u8) -> Self {
        let log_level = match level {
            0 => LogLevel::Error,
            1 => LogLevel::Info,
            2 => LogLevel::Debug,
            _ => LogLevel::Trace,
        };
        Self {
            level: log_level,
            show_targets: level >= 2,
        }
    }

    /// `EnvFilter` directive string for this configuration, e.g.
    /// `warn,transfer=debug,transport=debug`.
    #[must_use]
    pub fn filter_directive(&self) -> String {
        let mut directive = String::from("warn");
        if self.level != LogLevel::Warn {
            for target in WORKSPACE_TARGETS {
                directive.push(',');
                directive.push_str(target);
                directive.push('=');
                directive.push_str(self.level.as_str());
            }
        }
        directive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_counts_map_to_levels() {
        assert_eq!(VerbosityConfig::from_verbose_level(0).level, LogLevel::Error);
        assert_eq!(VerbosityConfig::from_verbose_level(1).level, LogLevel::Info);
        assert_eq!(VerbosityConfig::from_verbose_level(2).level, LogLevel::Debug);
        assert_eq!(VerbosityConfig::from_verbose_level(3).level, LogLevel::Trace);
        assert_eq!(VerbosityConfig::from_verbose_level(9).level, LogLevel::Trace);
    }

    #[test]
    fn targets_shown_from_debug() {
        assert!(!VerbosityConfig::from_verbose_level(1).show_targets);
        assert!(VerbosityConfig::from_verbose_level(2).show_targets);
    }

    #[test]
    fn quiet_directive_silences_workspace_warnings() {
        let directive = VerbosityConfig::default().filter_directive();
        assert!(directive.starts_with("warn,"));
        assert!(directive.contains("transfer=error"), "{directive}");
    }

    #[test]
    fn warn_level_needs_no_per_crate_directives() {
        let config = VerbosityConfig {
            level: LogLevel::Warn,
            show_targets: false,
        };
        assert_eq!(config.filter_directive(), "warn");
    }

    #[test]
    fn verbose_directive_names_every_workspace_crate() {
        let directive = VerbosityConfig::from_verbose_level(2).filter_directive();
        assert!(directive.starts_with("warn,"));
        for target in WORKSPACE_TARGETS {
            assert!(directive.contains(&format!("{target}=debug")), "{directive}");
        }
    }

    #[test]
    fn level_filters_are_ordered() {
        assert!(LogLevel::Trace.as_filter() > LogLevel::Warn.as_filter());
        assert!(LogLevel::Warn.as_filter() > LogLevel::Error.as_filter());
        assert_eq!(LogLevel::Info.to_string(), "info");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_uses_lowercase_levels() {
        let json = serde_json::to_string(&VerbosityConfig::from_verbose_level(1)).unwrap();
        assert!(json.contains("\"info\""));
    }
}
