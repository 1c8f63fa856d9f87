use chrono::Utc;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// Access token pair returned by the token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub expires_in: u64,
    pub obtained_at: u64,
}

impl Token {
    /// Seconds before expiry at which a token is treated as expired.
    pub const EXPIRY_MARGIN_SECS: u64 = 240;

    pub fn is_expired(&self) -> bool {
        let now = Utc::now().timestamp() as u64;
        now + Self::EXPIRY_MARGIN_SECS >= self.obtained_at + self.expires_in
    }
}

/// Raw body of a successful token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub expires_in: Option<u64>,
}

impl From<TokenResponse> for Token {
    fn from(res: TokenResponse) -> Self {
        Token {
            access_token: res.access_token,
            refresh_token: res.refresh_token,
            scope: res.scope,
            expires_in: res.expires_in.unwrap_or(3600),
            obtained_at: Utc::now().timestamp() as u64,
        }
    }
}

/// Outcome of the browser redirect captured by the callback listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationResult {
    Code(String),
    Denied { error: String, description: String },
}

/// One sample of what the user is playing right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    pub progress_ms: u64,
    pub track_id: String,
    pub track_name: String,
    pub artists: Vec<String>,
    pub is_playing: bool,
}

/// A counted track as kept in the track table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRecord {
    pub track_id: String,
    pub track_name: String,
    pub artists: Vec<String>,
    pub play_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentlyPlaying {
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub is_playing: bool,
    pub currently_playing_type: Option<String>,
    pub item: Option<PlayingItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayingItem {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    pub album: Option<AlbumRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlbumRef {
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistRef {
    pub name: String,
}

#[derive(Tabled)]
pub struct TrackTableRow {
    #[tabled(rename = "#")]
    pub rank: usize,
    pub name: String,
    pub artists: String,
    pub plays: u64,
}
