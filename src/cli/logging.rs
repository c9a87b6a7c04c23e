//! Log subscriber setup for the CLI
//!
//! Library code only emits `tracing` events; the binary decides where they
//! go. Logs are written to stderr so that reports on stdout stay parseable.

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid log format: {}", s)),
        }
    }
}

/// Build the event filter
///
/// A valid `rust_log` replaces the default level, which is `info`, or
/// `debug` with `verbose`. `verbose` also keeps this crate's own events at
/// `debug` under any `rust_log`.
pub fn filter_from(rust_log: Option<&str>, verbose: bool) -> EnvFilter {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level.as_str()));

    if verbose {
        match "semantic_loader=debug".parse() {
            Ok(directive) => filter.add_directive(directive),
            Err(_) => filter,
        }
    } else {
        filter
    }
}

/// Install the global subscriber, filtered by `RUST_LOG`
pub fn init_logging(verbose: bool, format: LogFormat) -> Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = filter_from(rust_log.as_deref(), verbose);

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose);

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .context("Failed to install log subscriber")?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .try_init()
            .context("Failed to install log subscriber")?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_rust_log_replaces_default_level() {
        let filter = filter_from(Some("warn"), false).to_string();
        assert!(filter.contains("warn"));
        assert!(!filter.contains("info"));

        assert_eq!(filter_from(None, false).to_string(), "info");
        assert_eq!(filter_from(Some("  "), false).to_string(), "info");
    }

    #[test]
    fn test_verbose_adds_crate_debug() {
        let filter = filter_from(Some("warn"), true).to_string();
        assert!(filter.contains("warn"));
        assert!(filter.contains("semantic_loader=debug"));
    }
}
