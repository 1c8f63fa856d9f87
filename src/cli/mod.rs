//! # CLI Module
//!
//! Command implementations behind the `spintally` binary.
//!
//! - [`track`] - authorizes with Spotify, then polls the currently playing
//!   track and counts plays until SIGINT/SIGTERM
//! - [`auth`] - runs one OAuth flow (authorization code, or client
//!   credentials) and reports the result
//! - [`stats`] - prints the most played tracks from the track table
//!
//! Commands return [`Res`](crate::Res); `main` reports errors to the operator
//! and exits non-zero.

mod auth;
mod stats;
mod track;

pub use auth::{MAX_AUTH_ATTEMPTS, auth, authorize};
pub use stats::stats;
pub use track::{TrackOptions, track};
