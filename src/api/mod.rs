//! # API Module
//!
//! HTTP endpoint served by the local OAuth callback listener.
//!
//! - [`callback`] - receives the browser redirect from the Spotify authorize
//!   page and hands the authorization code (or the denial) to the waiting
//!   caller through a [`ResultSlot`]
//!
//! The route is mounted by [`crate::server::CallbackListener`] on the path of
//! the configured redirect URI.

mod callback;

pub use callback::{CallbackParams, CallbackState, ResultSlot, callback};
