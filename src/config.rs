//! Configuration management for the spintally play counter.
//!
//! Values come from environment variables, optionally seeded from `.env`
//! files. Loading order:
//! 1. Environment variables (highest priority, never overridden)
//! 2. `.env` file in the local data directory (`<data_local_dir>/spintally/.env`)
//! 3. `.env` file in the working directory
//! 4. Application defaults (where applicable)
//!
//! Everything is read once at startup into a [`Settings`] value that is passed
//! down to the components that need it.

use std::{env, path::PathBuf, str::FromStr, time::Duration};

use reqwest::Url;

use crate::{error::ConfigError, tracking::RepeatPolicy};

pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:3000/callback";
pub const DEFAULT_SCOPE: &str = "user-read-currently-playing";
pub const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_ACCEPTANCE_MS: u64 = 40_000;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 5;

/// Loads `.env` files into the process environment.
///
/// Creates the spintally data directory if needed so the user has an obvious
/// place to put the file. Missing `.env` files are not an error.
pub async fn load_env() -> Result<(), String> {
    let path = data_dir().join(".env");
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }

    if path.is_file() {
        dotenv::from_path(&path).map_err(|e| e.to_string())?;
    }
    // a local .env is a convenience for development
    dotenv::dotenv().ok();

    Ok(())
}

/// `<data_local_dir>/spintally`, falling back to the working directory.
pub fn data_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("spintally");
    path
}

/// Track table location from `TRACKER_STORE_PATH`, or the default
/// `<data_local_dir>/spintally/songs.csv`. Needs no credentials.
pub fn store_path() -> PathBuf {
    env::var("TRACKER_STORE_PATH")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir().join("songs.csv"))
}

/// Credentials and endpoints of the OAuth flows.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: Url,
    pub scope: String,
    pub auth_url: Url,
    pub token_url: Url,
    pub timeout: Duration,
    pub http_timeout: Duration,
}

/// Parameters of the polling loop and the track table.
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub api_url: Url,
    pub acceptance_threshold_ms: u64,
    pub poll_interval: Duration,
    pub repeat_policy: RepeatPolicy,
    pub store_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub auth: AuthSettings,
    pub tracker: TrackerSettings,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let redirect_uri = parse_url(
            "SPOTIFY_API_REDIRECT_URI",
            get("SPOTIFY_API_REDIRECT_URI").unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
        )?;
        if redirect_uri.scheme() != "http" || redirect_uri.host_str().is_none() {
            return Err(ConfigError::Invalid {
                key: "SPOTIFY_API_REDIRECT_URI",
                value: redirect_uri.to_string(),
                reason: "must be an http:// url with a host".to_string(),
            });
        }

        let auth = AuthSettings {
            client_id: require("SPOTIFY_API_AUTH_CLIENT_ID")?,
            client_secret: require("SPOTIFY_API_AUTH_CLIENT_SECRET")?,
            redirect_uri,
            scope: get("SPOTIFY_API_AUTH_SCOPE").unwrap_or_else(|| DEFAULT_SCOPE.to_string()),
            auth_url: parse_url(
                "SPOTIFY_API_AUTH_URL",
                get("SPOTIFY_API_AUTH_URL").unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
            )?,
            token_url: parse_url(
                "SPOTIFY_API_TOKEN_URL",
                get("SPOTIFY_API_TOKEN_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            )?,
            timeout: Duration::from_secs(parse_or(
                "AUTH_TIMEOUT_SECS",
                get("AUTH_TIMEOUT_SECS"),
                DEFAULT_AUTH_TIMEOUT_SECS,
            )?),
            http_timeout: Duration::from_secs(parse_or(
                "HTTP_TIMEOUT_SECS",
                get("HTTP_TIMEOUT_SECS"),
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?),
        };

        let poll_interval_secs = parse_or(
            "TRACKER_POLL_INTERVAL_SECS",
            get("TRACKER_POLL_INTERVAL_SECS"),
            DEFAULT_POLL_INTERVAL_SECS,
        )?;
        if poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "TRACKER_POLL_INTERVAL_SECS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let tracker = TrackerSettings {
            api_url: parse_url(
                "SPOTIFY_API_URL",
                get("SPOTIFY_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            )?,
            acceptance_threshold_ms: parse_or(
                "TRACKER_ACCEPTANCE_MS",
                get("TRACKER_ACCEPTANCE_MS"),
                DEFAULT_ACCEPTANCE_MS,
            )?,
            poll_interval: Duration::from_secs(poll_interval_secs),
            repeat_policy: parse_or(
                "TRACKER_REPEAT_POLICY",
                get("TRACKER_REPEAT_POLICY"),
                RepeatPolicy::default(),
            )?,
            store_path: get("TRACKER_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir().join("songs.csv")),
        };

        Ok(Settings { auth, tracker })
    }
}

fn parse_url(key: &'static str, value: String) -> Result<Url, ConfigError> {
    Url::parse(&value).map_err(|e| ConfigError::Invalid {
        key,
        value,
        reason: e.to_string(),
    })
}

fn parse_or<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(v) = value else {
        return Ok(default);
    };

    let parsed = v.trim().parse::<T>();
    parsed.map_err(|e| ConfigError::Invalid {
        key,
        value: v,
        reason: e.to_string(),
    })
}
