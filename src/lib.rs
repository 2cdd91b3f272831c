//! # FluidLink
//!
//! A WebSocket machine-link protocol engine for FluidNC CNC controllers,
//! with a small console monitor on top.
//!
//! ## Architecture
//!
//! FluidLink is organized as a workspace:
//!
//! 1. **fluidlink-core** - Machine state snapshot, modal types, errors
//! 2. **fluidlink-link** - Wire transport, report parser, connection
//!    health, protocol engine
//! 3. **fluidlink** - Console monitor binary that integrates the crates
//!
//! ## Features
//!
//! - **Push reporting**: requests FluidNC auto-reports and falls back to
//!   polling when the controller ignores the request
//! - **Full status parsing**: machine/work position, feed, spindle,
//!   overrides, SD job progress, parser modal state
//! - **Real-time control**: feed hold, resume, soft reset, jogging,
//!   override nudges

pub mod config;

pub use config::MonitorConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output on stderr (stdout belongs to the monitor)
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}
