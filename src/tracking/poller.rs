use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    error::{SnapshotError, StoreError, TrackerError},
    management::TrackStore,
    tracking::{PlayCounter, PlaybackSampler, Transition},
};

/// Consecutive failed polls, with no play pending, before a warning is raised.
pub const FAILURE_WARN_THRESHOLD: u32 = 5;

/// The steady-state polling loop.
///
/// One snapshot at a time, strictly in order: fetch, decide, write, commit,
/// sleep. Cancellation is honoured between ticks and during the sleep, never
/// in the middle of a track table write.
pub struct Tracker<S> {
    sampler: S,
    counter: PlayCounter,
    store: TrackStore,
    poll_interval: Duration,
    cancel: CancellationToken,
    consecutive_failures: u32,
    recorded: u64,
}

impl<S: PlaybackSampler> Tracker<S> {
    pub fn new(
        sampler: S,
        counter: PlayCounter,
        store: TrackStore,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Tracker {
            sampler,
            counter,
            store,
            poll_interval,
            cancel,
            consecutive_failures: 0,
            recorded: 0,
        }
    }

    pub fn store(&self) -> &TrackStore {
        &self.store
    }

    pub fn counter(&self) -> &PlayCounter {
        &self.counter
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Plays recorded since the tracker was created.
    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    /// Polls until cancelled and hands the track table back.
    ///
    /// Snapshot failures never end the loop. A track table write that cannot
    /// be saved nor backed up does.
    pub async fn run(mut self) -> Result<TrackStore, TrackerError> {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            threshold_ms = self.counter.acceptance_threshold_ms(),
            repeat_policy = %self.counter.repeat_policy(),
            "starting play tracker"
        );

        while !self.cancel.is_cancelled() {
            self.tick().await?;

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!(recorded = self.recorded, "play tracker stopped");
        Ok(self.store)
    }

    /// Runs one poll. A failed fetch is logged and treated as an idle tick.
    pub async fn tick(&mut self) -> Result<Transition, StoreError> {
        let snapshot = match self.sampler.current_playback().await {
            Ok(snapshot) => {
                self.consecutive_failures = 0;
                snapshot
            }
            Err(e) => {
                self.record_failure(&e);
                return Ok(Transition::Idle);
            }
        };

        let Some(snapshot) = snapshot else {
            debug!("nothing playing");
            return Ok(Transition::Idle);
        };
        debug!(
            track_id = %snapshot.track_id,
            progress_ms = snapshot.progress_ms,
            playing = snapshot.is_playing,
            "polled playback"
        );

        let transition = self.counter.decide(Some(&snapshot));
        match &transition {
            Transition::Idle => {}
            Transition::NewPlay { track_id } => {
                let count = self.store.record_play(&snapshot).await?;
                self.recorded += 1;
                info!(
                    track_id = %track_id,
                    track = %snapshot.track_name,
                    artists = %snapshot.artists.join(", "),
                    progress_ms = snapshot.progress_ms,
                    count,
                    "new play recorded"
                );
            }
            Transition::Repeat {
                track_id,
                counted: true,
            } => {
                let count = self.store.increment(track_id).await?;
                if count.is_some() {
                    self.recorded += 1;
                }
                info!(
                    track_id = %track_id,
                    track = %snapshot.track_name,
                    count = ?count,
                    "repeat recorded"
                );
            }
            Transition::Repeat {
                track_id,
                counted: false,
            } => {
                info!(track_id = %track_id, "track restarted, counting again at threshold");
            }
            Transition::TrackChanged { previous, current } => {
                info!(previous = %previous, current = %current, "track changed");
            }
        }

        self.counter.commit(&transition);
        Ok(transition)
    }

    fn record_failure(&mut self, e: &SnapshotError) {
        warn!(error = %e, "cannot fetch current playback");

        // failures only count while no play is pending
        if self.counter.state().awaiting_repeat_resolution {
            return;
        }

        self.consecutive_failures += 1;
        if self.consecutive_failures >= FAILURE_WARN_THRESHOLD {
            warn!(
                failures = self.consecutive_failures,
                "multiple consecutive failures, possible issue with the Spotify API or the connection"
            );
        }
    }
}
