use std::{collections::HashMap, path::PathBuf, time::Duration};

use spintally::{
    config::{DEFAULT_ACCEPTANCE_MS, DEFAULT_SCOPE, Settings},
    error::ConfigError,
    tracking::RepeatPolicy,
};

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    let mut vars: HashMap<String, String> = [
        ("SPOTIFY_API_AUTH_CLIENT_ID", "client"),
        ("SPOTIFY_API_AUTH_CLIENT_SECRET", "secret"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in pairs {
        vars.insert(k.to_string(), v.to_string());
    }
    vars
}

fn load(vars: &HashMap<String, String>) -> Result<Settings, ConfigError> {
    Settings::from_lookup(|key| vars.get(key).cloned())
}

#[test]
fn test_defaults() {
    let settings = load(&env(&[])).unwrap();

    assert_eq!(settings.auth.client_id, "client");
    assert_eq!(settings.auth.client_secret, "secret");
    assert_eq!(
        settings.auth.redirect_uri.as_str(),
        "http://127.0.0.1:3000/callback"
    );
    assert_eq!(settings.auth.scope, DEFAULT_SCOPE);
    assert_eq!(settings.auth.timeout, Duration::from_secs(120));
    assert_eq!(settings.auth.http_timeout, Duration::from_secs(5));

    assert_eq!(settings.tracker.acceptance_threshold_ms, DEFAULT_ACCEPTANCE_MS);
    assert_eq!(settings.tracker.poll_interval, Duration::from_secs(5));
    assert_eq!(settings.tracker.repeat_policy, RepeatPolicy::Immediate);
    assert!(settings.tracker.store_path.ends_with("songs.csv"));
    assert_eq!(settings.tracker.api_url.as_str(), "https://api.spotify.com/v1");
}

#[test]
fn test_overrides() {
    let vars = env(&[
        ("SPOTIFY_API_REDIRECT_URI", "http://localhost:8888/spotify/cb"),
        ("TRACKER_ACCEPTANCE_MS", "30000"),
        ("TRACKER_POLL_INTERVAL_SECS", " 2 "),
        ("TRACKER_REPEAT_POLICY", "at-threshold"),
        ("TRACKER_STORE_PATH", "/tmp/plays.csv"),
        ("AUTH_TIMEOUT_SECS", "30"),
    ]);

    let settings = load(&vars).unwrap();

    assert_eq!(settings.auth.redirect_uri.port(), Some(8888));
    assert_eq!(settings.auth.redirect_uri.path(), "/spotify/cb");
    assert_eq!(settings.auth.timeout, Duration::from_secs(30));
    assert_eq!(settings.tracker.acceptance_threshold_ms, 30_000);
    assert_eq!(settings.tracker.poll_interval, Duration::from_secs(2));
    assert_eq!(settings.tracker.repeat_policy, RepeatPolicy::AtThreshold);
    assert_eq!(settings.tracker.store_path, PathBuf::from("/tmp/plays.csv"));
}

#[test]
fn test_missing_credentials() {
    let err = Settings::from_lookup(|_| None).unwrap_err();
    assert!(matches!(err, ConfigError::Missing("SPOTIFY_API_AUTH_CLIENT_ID")));

    let mut vars = env(&[]);
    vars.insert("SPOTIFY_API_AUTH_CLIENT_SECRET".to_string(), "  ".to_string());
    let err = load(&vars).unwrap_err();
    assert!(matches!(err, ConfigError::Missing("SPOTIFY_API_AUTH_CLIENT_SECRET")));
}

#[test]
fn test_zero_poll_interval_is_rejected() {
    let err = load(&env(&[("TRACKER_POLL_INTERVAL_SECS", "0")])).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Invalid {
            key: "TRACKER_POLL_INTERVAL_SECS",
            ..
        }
    ));
}

#[test]
fn test_invalid_values() {
    let err = load(&env(&[("TRACKER_ACCEPTANCE_MS", "forty seconds")])).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Invalid {
            key: "TRACKER_ACCEPTANCE_MS",
            ..
        }
    ));

    let err = load(&env(&[("TRACKER_REPEAT_POLICY", "sometimes")])).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Invalid {
            key: "TRACKER_REPEAT_POLICY",
            ..
        }
    ));

    let err = load(&env(&[("SPOTIFY_API_TOKEN_URL", "not a url")])).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Invalid {
            key: "SPOTIFY_API_TOKEN_URL",
            ..
        }
    ));
}

#[test]
fn test_redirect_uri_must_be_local_http() {
    let err = load(&env(&[(
        "SPOTIFY_API_REDIRECT_URI",
        "https://127.0.0.1:3000/callback",
    )]))
    .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Invalid {
            key: "SPOTIFY_API_REDIRECT_URI",
            ..
        }
    ));
}
