use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    error::SnapshotError,
    spotify::TokenBroker,
    tracking::PlaybackSampler,
    types::{CurrentlyPlaying, PlaybackSnapshot, Token},
};

/// Samples the user's currently playing track.
///
/// Keeps the access token fresh on its own: refreshes ahead of expiry and
/// once more when the API answers 401.
pub struct SpotifyPlayer {
    http: Client,
    api_url: Url,
    broker: Arc<TokenBroker>,
    token: Mutex<Token>,
}

impl SpotifyPlayer {
    pub fn new(
        broker: Arc<TokenBroker>,
        token: Token,
        api_url: Url,
        http_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(http_timeout).build()?;
        Ok(SpotifyPlayer {
            http,
            api_url,
            broker,
            token: Mutex::new(token),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/me/player/currently-playing",
            self.api_url.as_str().trim_end_matches('/')
        )
    }

    async fn access_token(&self, force_refresh: bool) -> Result<String, SnapshotError> {
        let mut token = self.token.lock().await;

        if force_refresh || token.is_expired() {
            if let Some(refresh_token) = token.refresh_token.clone() {
                let mut fresh = self.broker.refresh(&refresh_token).await?;
                if fresh.refresh_token.is_none() {
                    fresh.refresh_token = Some(refresh_token);
                }
                *token = fresh;
            }
        }

        Ok(token.access_token.clone())
    }
}

#[async_trait]
impl PlaybackSampler for SpotifyPlayer {
    async fn current_playback(&self) -> Result<Option<PlaybackSnapshot>, SnapshotError> {
        let mut access_token = self.access_token(false).await?;
        let mut refreshed = false;

        loop {
            let response = self
                .http
                .get(self.endpoint())
                .bearer_auth(&access_token)
                .send()
                .await?;

            match response.status() {
                StatusCode::NO_CONTENT => {
                    debug!("no active playback");
                    return Ok(None);
                }
                StatusCode::UNAUTHORIZED if !refreshed => {
                    info!("access token rejected, refreshing");
                    refreshed = true;
                    access_token = self.access_token(true).await?;
                    continue; // retry
                }
                status if !status.is_success() => {
                    return Err(SnapshotError::Status(status.as_u16()));
                }
                _ => {}
            }

            let body = response.text().await?;
            let payload: CurrentlyPlaying = serde_json::from_str(&body)
                .map_err(|e| SnapshotError::Malformed(e.to_string()))?;

            return snapshot_from_payload(payload);
        }
    }
}

/// Converts the raw endpoint payload into a snapshot.
///
/// Anything that is not a track (episodes, ads) or has no item counts as
/// nothing playing. A track without progress or id is malformed.
pub fn snapshot_from_payload(
    payload: CurrentlyPlaying,
) -> Result<Option<PlaybackSnapshot>, SnapshotError> {
    if let Some(kind) = payload.currently_playing_type.as_deref() {
        if kind != "track" {
            debug!(kind, "not a track, ignoring");
            return Ok(None);
        }
    }

    let Some(item) = payload.item else {
        return Ok(None);
    };

    let progress_ms = payload
        .progress_ms
        .ok_or_else(|| SnapshotError::Malformed("missing progress_ms".to_string()))?;
    let track_id = item
        .id
        .ok_or_else(|| SnapshotError::Malformed("missing item.id".to_string()))?;
    let track_name = item
        .name
        .ok_or_else(|| SnapshotError::Malformed("missing item.name".to_string()))?;

    let artists = match item.album {
        Some(album) if !album.artists.is_empty() => album.artists,
        _ => item.artists,
    };

    Ok(Some(PlaybackSnapshot {
        progress_ms,
        track_id,
        track_name,
        artists: artists.into_iter().map(|a| a.name).collect(),
        is_playing: payload.is_playing,
    }))
}
