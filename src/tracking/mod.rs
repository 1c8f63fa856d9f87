//! # Tracking Module
//!
//! Turns the periodically sampled "currently playing" state into counted
//! plays.
//!
//! - [`PlayCounter`] - pure state machine deciding, per snapshot, whether a
//!   play, a repeat or a track change happened
//! - [`PlaybackSampler`] - source of snapshots (the Spotify player in
//!   production, scripted sequences in tests)
//! - [`Tracker`] - the polling loop gluing a sampler, the counter and the
//!   [`TrackStore`](crate::management::TrackStore) together
//!
//! ```text
//! PlaybackSampler --snapshot--> PlayCounter --transition--> TrackStore
//!        ^                                                      |
//!        +----------------- every poll interval ----------------+
//! ```

mod counter;
mod poller;

use async_trait::async_trait;

pub use counter::{CounterState, PlayCounter, RepeatPolicy, Transition};
pub use poller::{FAILURE_WARN_THRESHOLD, Tracker};

use crate::{error::SnapshotError, types::PlaybackSnapshot};

/// Fetches the current playback snapshot.
///
/// `Ok(None)` means nothing is playing (or what plays is not a track).
#[async_trait]
pub trait PlaybackSampler: Send + Sync {
    async fn current_playback(&self) -> Result<Option<PlaybackSnapshot>, SnapshotError>;
}
