use std::{path::PathBuf, sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;

use crate::{
    Res,
    cli::authorize,
    config::{Settings, TrackerSettings},
    info,
    management::TrackStore,
    spotify::{SpotifyPlayer, TokenBroker},
    success,
    tracking::{PlayCounter, RepeatPolicy, Tracker},
    utils,
};

/// Command line overrides of [`TrackerSettings`].
#[derive(Debug, Clone, Default)]
pub struct TrackOptions {
    pub threshold_ms: Option<u64>,
    pub interval_secs: Option<u64>,
    pub repeat_policy: Option<RepeatPolicy>,
    pub store: Option<PathBuf>,
}

impl TrackOptions {
    pub fn apply(self, settings: &mut TrackerSettings) {
        if let Some(threshold_ms) = self.threshold_ms {
            settings.acceptance_threshold_ms = threshold_ms;
        }
        if let Some(secs) = self.interval_secs {
            settings.poll_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(policy) = self.repeat_policy {
            settings.repeat_policy = policy;
        }
        if let Some(store) = self.store {
            settings.store_path = store;
        }
    }
}

/// `track` command: authorize, then count plays until interrupted.
pub async fn track(settings: Settings, options: TrackOptions) -> Res<()> {
    let mut tracker_settings = settings.tracker;
    options.apply(&mut tracker_settings);

    let store = TrackStore::open(&tracker_settings.store_path).await?;
    info!(
        "Tracking plays into {} ({} tracks so far)",
        store.path().display(),
        store.len()
    );

    let http_timeout = settings.auth.http_timeout;
    let broker = Arc::new(TokenBroker::new(settings.auth)?);
    let token = authorize(&broker).await?;
    success!("Authentication successful!");

    let player = SpotifyPlayer::new(
        Arc::clone(&broker),
        token,
        tracker_settings.api_url.clone(),
        http_timeout,
    )?;

    let cancel = CancellationToken::new();
    tokio::spawn(utils::cancel_on_shutdown_signal(cancel.clone()).with_current_subscriber());

    let counter = PlayCounter::new(
        tracker_settings.acceptance_threshold_ms,
        tracker_settings.repeat_policy,
    );
    let tracker = Tracker::new(
        player,
        counter,
        store,
        tracker_settings.poll_interval,
        cancel.clone(),
    );

    let result = tracker.run().await;
    // releases the signal listener
    cancel.cancel();

    let store = result?;
    success!(
        "Stopped. {} tracks recorded in {}",
        store.len(),
        store.path().display()
    );
    Ok(())
}
