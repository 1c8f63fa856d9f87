use std::{fmt, str::FromStr};

use crate::types::PlaybackSnapshot;

/// How a track restarting right after being counted is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RepeatPolicy {
    /// Count the repeat as soon as the restart is seen.
    #[default]
    Immediate,
    /// Only re-arm the counter; the restarted listen counts once it crosses
    /// the acceptance threshold again.
    AtThreshold,
}

impl FromStr for RepeatPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "immediate" => Ok(RepeatPolicy::Immediate),
            "at-threshold" | "at_threshold" | "threshold" => Ok(RepeatPolicy::AtThreshold),
            other => Err(format!(
                "unknown repeat policy '{other}', expected 'immediate' or 'at-threshold'"
            )),
        }
    }
}

impl fmt::Display for RepeatPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepeatPolicy::Immediate => f.write_str("immediate"),
            RepeatPolicy::AtThreshold => f.write_str("at-threshold"),
        }
    }
}

/// What the counter wants done for one poll tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Nothing playing, or nothing worth acting on.
    Idle,
    /// The track crossed the acceptance threshold: record one play.
    NewPlay { track_id: String },
    /// The counted track restarted from the top. `counted` tells whether the
    /// repeat is recorded now (see [`RepeatPolicy`]).
    Repeat { track_id: String, counted: bool },
    /// Another track started while the previous play was pending.
    TrackChanged { previous: String, current: String },
}

impl Transition {
    /// Whether the transition needs a track table write.
    pub fn mutates_store(&self) -> bool {
        matches!(
            self,
            Transition::NewPlay { .. } | Transition::Repeat { counted: true, .. }
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterState {
    /// Last track a play was recorded for.
    pub active_track_id: Option<String>,
    /// A play was just recorded and we are watching for an immediate restart.
    pub awaiting_repeat_resolution: bool,
}

/// Turns periodic playback snapshots into de-duplicated play events.
///
/// Deciding and committing are separate steps: [`PlayCounter::decide`] never
/// mutates, and [`PlayCounter::commit`] is called only once the track table
/// has accepted the write. A failed tick therefore leaves the state untouched.
#[derive(Debug, Clone)]
pub struct PlayCounter {
    acceptance_threshold_ms: u64,
    repeat_policy: RepeatPolicy,
    state: CounterState,
}

impl PlayCounter {
    pub fn new(acceptance_threshold_ms: u64, repeat_policy: RepeatPolicy) -> Self {
        PlayCounter {
            acceptance_threshold_ms,
            repeat_policy,
            state: CounterState::default(),
        }
    }

    pub fn state(&self) -> &CounterState {
        &self.state
    }

    pub fn acceptance_threshold_ms(&self) -> u64 {
        self.acceptance_threshold_ms
    }

    pub fn repeat_policy(&self) -> RepeatPolicy {
        self.repeat_policy
    }

    /// Evaluates one snapshot against the current state.
    ///
    /// Rules, first match wins:
    /// 1. absent or paused: idle
    /// 2. no pending play and progress at or past the threshold: new play
    /// 3. pending play, same track, progress back at or below the threshold: repeat
    /// 4. pending play, different track: track changed
    /// 5. otherwise idle
    ///
    /// The guard of rule 2 is the pending flag, not the active track, so a new
    /// track is counted once the previous play has been resolved.
    pub fn decide(&self, snapshot: Option<&PlaybackSnapshot>) -> Transition {
        let Some(snapshot) = snapshot.filter(|s| s.is_playing) else {
            return Transition::Idle;
        };

        let pending = self.state.awaiting_repeat_resolution;
        let same_track = self.state.active_track_id.as_deref() == Some(snapshot.track_id.as_str());

        if !pending && snapshot.progress_ms >= self.acceptance_threshold_ms {
            return Transition::NewPlay {
                track_id: snapshot.track_id.clone(),
            };
        }

        if pending && same_track && snapshot.progress_ms <= self.acceptance_threshold_ms {
            return Transition::Repeat {
                track_id: snapshot.track_id.clone(),
                counted: self.repeat_policy == RepeatPolicy::Immediate,
            };
        }

        if pending && !same_track {
            return Transition::TrackChanged {
                previous: self.state.active_track_id.clone().unwrap_or_default(),
                current: snapshot.track_id.clone(),
            };
        }

        Transition::Idle
    }

    /// Applies a transition previously returned by [`PlayCounter::decide`].
    pub fn commit(&mut self, transition: &Transition) {
        match transition {
            Transition::Idle => {}
            Transition::NewPlay { track_id } => {
                self.state.active_track_id = Some(track_id.clone());
                self.state.awaiting_repeat_resolution = true;
            }
            Transition::Repeat { .. } | Transition::TrackChanged { .. } => {
                self.state.awaiting_repeat_resolution = false;
            }
        }
    }

    /// Decides and commits in one step, for callers without side effects.
    pub fn observe(&mut self, snapshot: Option<&PlaybackSnapshot>) -> Transition {
        let transition = self.decide(snapshot);
        self.commit(&transition);
        transition
    }
}
