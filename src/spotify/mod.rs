//! # Spotify Integration Module
//!
//! The two places the play counter talks to Spotify:
//!
//! - [`auth`] - [`TokenBroker`] performs the client credentials, authorization
//!   code and refresh token flows. The authorization code flow runs the local
//!   [`CallbackListener`](crate::server::CallbackListener) to catch the browser
//!   redirect.
//! - [`player`] - [`SpotifyPlayer`] samples the "currently playing" endpoint
//!   and turns its payload into a
//!   [`PlaybackSnapshot`](crate::types::PlaybackSnapshot).
//!
//! ```text
//! TokenBroker ──code──> token endpoint ──token──> SpotifyPlayer
//!      │                                               │
//!  CallbackListener <── browser redirect       GET /me/player/currently-playing
//! ```
//!
//! Neither layer retries on its own beyond a single token refresh on `401`;
//! the CLI decides about startup retries and the tracker treats a failed poll
//! as an idle tick.

pub mod auth;
pub mod player;

pub use auth::{KNOWN_SCOPES, TokenBroker, callback_target, unknown_scopes};
pub use player::{SpotifyPlayer, snapshot_from_payload};
