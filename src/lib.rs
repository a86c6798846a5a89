//! # RootClay
//!
//! Headless G-code streamer for serial clay and 3D printers. Commands go out
//! one at a time: each line is written only after the printer acknowledged
//! the previous one.
//!
//! ## Architecture
//!
//! RootClay is organized as a workspace with multiple crates:
//!
//! 1. **rootclay-core** - Errors, stream state, events and event sinks
//! 2. **rootclay-communication** - Serial link, streaming engine, printer controller
//! 3. **rootclay-settings** - TOML/JSON configuration
//! 4. **rootclay** - Command-line binary that integrates all crates

pub mod cli;
pub mod commands;

pub use rootclay_communication::{
    list_ports, ControllerConfig, PrinterCommand, PrinterController, SerialOpener, SourceOrigin,
};
pub use rootclay_core::{Error, ErrorKind, EventBus, EventSink, Result, StreamEvent, StreamState};
pub use rootclay_settings::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Output on stderr, leaving stdout to printer events
/// - RUST_LOG environment variable support (default level INFO)
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing::Level::INFO.as_str()));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
