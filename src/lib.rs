//! # Grapefruit
//!
//! A serial G-code sender for hobby CNC machines.
//!
//! ## Architecture
//!
//! Grapefruit is organized as a workspace with multiple crates:
//!
//! 1. **grapefruit-core** - Error types, line sanitizer, motion command formatting
//! 2. **grapefruit-settings** - Configuration file loading, saving and validation
//! 3. **grapefruit-gcodeeditor** - G-code file input and text buffers
//! 4. **grapefruit-communication** - Port discovery, CNC link, batch streaming
//! 5. **grapefruit** - Command line front end that wires the crates together
//!
//! This crate holds the glue: logging setup and the translation from a loaded
//! [`Config`] into the values the link and the streaming loop take.

use grapefruit_communication::{LinkConfig, SerialEndpoint, StreamOptions};
use grapefruit_core::{ConnectionError, Result};
use grapefruit_settings::Config;
use std::time::Duration;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Log lines go to stderr so command output on stdout stays machine readable.
/// `RUST_LOG` is honoured; `verbose` raises the default level from INFO to DEBUG.
pub fn init_logging(verbose: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_level(true)
        .with_thread_names(verbose)
        .with_line_number(verbose);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Link tuning taken from the `[link]` section
pub fn link_config(config: &Config) -> LinkConfig {
    let link = &config.link;
    LinkConfig {
        settle_delay: Duration::from_millis(link.settle_delay_ms),
        pacing_interval: Duration::from_millis(link.pacing_interval_ms),
        handshake_command: link.handshake_command.clone(),
        shutdown_command: link.shutdown_command.clone(),
        inline_comments: link.inline_comments,
    }
}

/// Streaming options taken from the `[streaming]` section
pub fn stream_options(config: &Config, verbose: bool, run_anyway: bool) -> StreamOptions {
    StreamOptions {
        inter_command_delay: Duration::from_millis(config.streaming.inter_command_delay_ms),
        verbose,
        run_anyway,
    }
}

/// Serial endpoint from the `[connection]` section, with command line overrides
///
/// # Errors
/// [`ConnectionError::InvalidParameters`] when neither the override nor the
/// config names a port.
pub fn endpoint(
    config: &Config,
    port: Option<&str>,
    baud_rate: Option<u32>,
) -> Result<SerialEndpoint> {
    let connection = &config.connection;
    let port = port
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(connection.port.trim());

    if port.is_empty() {
        return Err(ConnectionError::InvalidParameters {
            reason: "no port given; pass --port or set connection.port".to_string(),
        }
        .into());
    }

    Ok(
        SerialEndpoint::new(port, baud_rate.unwrap_or(connection.baud_rate))
            .with_read_timeout(Duration::from_millis(connection.read_timeout_ms)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use grapefruit_core::InlineCommentPolicy;

    #[test]
    fn test_link_config_from_defaults() {
        let link = link_config(&Config::default());
        assert_eq!(link, LinkConfig::default());
    }

    #[test]
    fn test_link_config_follows_settings() {
        let mut config = Config::default();
        config.link.settle_delay_ms = 500;
        config.link.handshake_command = "$I".to_string();
        config.link.inline_comments = InlineCommentPolicy::Preserve;

        let link = link_config(&config);
        assert_eq!(link.settle_delay, Duration::from_millis(500));
        assert_eq!(link.handshake_command, "$I");
        assert_eq!(link.inline_comments, InlineCommentPolicy::Preserve);
    }

    #[test]
    fn test_stream_options() {
        let mut config = Config::default();
        config.streaming.inter_command_delay_ms = 250;

        let options = stream_options(&config, false, true);
        assert_eq!(options.inter_command_delay, Duration::from_millis(250));
        assert!(!options.verbose);
        assert!(options.run_anyway);
    }

    #[test]
    fn test_endpoint_override_wins() {
        let mut config = Config::default();
        config.connection.port = "/dev/ttyUSB0".to_string();

        let ep = endpoint(&config, Some("COM3"), Some(9600)).unwrap();
        assert_eq!(ep.port, "COM3");
        assert_eq!(ep.baud_rate, 9600);
        assert_eq!(ep.read_timeout, Duration::from_millis(1000));
    }

    #[test]
    fn test_endpoint_falls_back_to_config() {
        let mut config = Config::default();
        config.connection.port = "/dev/ttyACM0".to_string();
        config.connection.baud_rate = 250000;

        let ep = endpoint(&config, Some("  "), None).unwrap();
        assert_eq!(ep.to_string(), "/dev/ttyACM0@250000");
    }

    #[test]
    fn test_endpoint_without_port() {
        let err = endpoint(&Config::default(), None, None).unwrap_err();
        assert!(err.is_connection_error());
    }
}
