//! Observability utilities.
//!
//! [`init_tracing`] installs the process-wide `tracing` subscriber, and
//! [`RunLogger`] writes a markdown transcript of a run from its events.
//!
//! # Example
//!
//! ```no_run
//! use erk::observability::{init_tracing, RunLogger};
//! use std::sync::Arc;
//!
//! init_tracing("info").unwrap();
//! let logger = Arc::new(RunLogger::new(None).unwrap());
//! println!("Transcript: {}", logger.log_file().display());
//! ```

pub mod logger;

pub use logger::RunLogger;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a fmt subscriber filtered at `level`; `RUST_LOG` takes precedence.
///
/// Fails when a global subscriber is already installed.
pub fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()?;
    Ok(())
}
