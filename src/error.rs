//! Error types for every layer of the play counter.
//!
//! Startup failures ([`AuthError`], [`ConfigError`], [`StoreError`] while
//! opening the table) abort the process. Steady-state failures
//! ([`SnapshotError`]) are contained within a single poll tick.

use std::{io, path::PathBuf, time::Duration};

use reqwest::StatusCode;
use thiserror::Error;

/// Failures of the OAuth flows and the local callback listener.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("cannot bind callback listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("authorization was not completed within {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error("authorization denied: {error} ({description})")]
    Denied { error: String, description: String },

    #[error("token endpoint rejected the request with status {status}")]
    TokenExchange { status: u16 },

    #[error("invalid redirect uri: {0}")]
    InvalidRedirect(String),

    #[error("callback listener stopped unexpectedly: {0}")]
    Listener(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl AuthError {
    /// Whether a fresh attempt of the same flow may succeed.
    ///
    /// Transport failures, rate limiting and server-side token endpoint
    /// errors are transient. Denials, timeouts and bind failures need the
    /// operator to intervene.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Http(_) => true,
            AuthError::TokenExchange { status } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            _ => false,
        }
    }
}

/// A single poll of the currently playing endpoint failed.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("currently playing endpoint answered with status {0}")]
    Status(u16),

    #[error("malformed playback payload: {0}")]
    Malformed(String),

    #[error("cannot refresh access token: {0}")]
    Auth(#[from] AuthError),
}

/// Failures reading or writing the track table.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("cannot save {} after {attempts} attempts: {source}", path.display())]
    Persist {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// The only ways the steady-state polling loop ends with an error.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Store(#[from] StoreError),
}
