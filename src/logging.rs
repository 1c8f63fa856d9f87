//! Structured logging handle.
//!
//! The subscriber is built once in `main` and handed down as a [`Telemetry`]
//! value instead of being installed as the global default. The command future
//! runs under [`Telemetry::dispatch`], and tasks spawned by the library
//! inherit it through `with_current_subscriber()`.

use tracing::Dispatch;
use tracing_subscriber::{EnvFilter, fmt};

/// Owns the `tracing` dispatcher for the lifetime of the process.
#[derive(Clone)]
pub struct Telemetry {
    dispatch: Dispatch,
}

impl Telemetry {
    /// Builds a stderr subscriber.
    ///
    /// `RUST_LOG` wins when set. Otherwise `verbosity` selects the level for
    /// this crate (0 = info, 1 = debug, 2+ = trace) while dependencies stay at
    /// `warn`.
    pub fn new(verbosity: u8) -> Self {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

        let subscriber = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .finish();

        Telemetry {
            dispatch: Dispatch::new(subscriber),
        }
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }
}

fn default_directive(verbosity: u8) -> String {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    format!("spintally={level},warn")
}
