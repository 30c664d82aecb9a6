//! Log output configuration.

use crate::config::LoggingSettings;
use crate::{Error, Result};
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Variable consulted first for the log filter directive.
pub const LOG_ENV_VAR: &str = "ANIMA_LOG";

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Returns the format name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(Error::InvalidInput(format!(
                "unknown log format '{other}' (expected 'pretty' or 'json')"
            ))),
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Log file; stderr when absent.
    pub file: Option<PathBuf>,
    /// Event filter.
    pub filter: EnvFilter,
}

impl LoggingConfig {
    /// Builds logging configuration from settings and the process environment.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        let directive = std::env::var(LOG_ENV_VAR)
            .ok()
            .or_else(|| std::env::var("RUST_LOG").ok());
        Self {
            format: settings.format,
            file: settings.file.clone(),
            filter: build_filter(directive.as_deref(), verbose),
        }
    }
}

/// Parses `directive`, falling back to `info` (or `debug` when verbose).
///
/// An invalid directive is ignored in favour of the fallback.
#[must_use]
pub fn build_filter(directive: Option<&str>, verbose: bool) -> EnvFilter {
    let fallback = if verbose { "debug" } else { "info" };
    directive
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("pretty" => LogFormat::Pretty; "pretty")]
    #[test_case("TEXT" => LogFormat::Pretty; "text alias")]
    #[test_case(" json " => LogFormat::Json; "json")]
    fn test_parse_log_format(input: &str) -> LogFormat {
        input.parse().expect("format")
    }

    #[test]
    fn test_unknown_log_format() {
        assert!(matches!(
            "xml".parse::<LogFormat>(),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_filter_fallbacks() {
        assert_eq!(build_filter(None, false).to_string(), "info");
        assert_eq!(build_filter(None, true).to_string(), "debug");
        assert_eq!(build_filter(Some("   "), false).to_string(), "info");
        assert_eq!(build_filter(Some("anima=trace"), false).to_string(), "anima=trace");
    }
}
