use rand::{Rng, distr::Alphanumeric};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::types::{TrackRecord, TrackTableRow};

/// Random value for the OAuth `state` parameter.
pub fn generate_state() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

/// Encodes an artist list as a JSON array for a single CSV cell.
pub fn encode_artists(artists: &[String]) -> String {
    serde_json::to_string(artists).unwrap_or_default()
}

/// Decodes an artist cell.
///
/// Accepts JSON arrays, Python-style lists (`['A', 'B']`) written by older
/// versions of the table, and plain single names.
pub fn decode_artists(cell: &str) -> Vec<String> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Vec::new();
    }

    if let Ok(artists) = serde_json::from_str::<Vec<String>>(cell) {
        return artists;
    }

    match cell.strip_prefix('[').and_then(|c| c.strip_suffix(']')) {
        Some(inner) => parse_list_literal(inner),
        None => vec![cell.to_string()],
    }
}

/// Items of a Python list literal body, e.g. `'A, B', "C"`.
///
/// Quoted items keep their commas and honour backslash escapes. Unquoted
/// items run up to the next comma.
fn parse_list_literal(inner: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}
        let Some(first) = chars.next() else {
            break;
        };

        let mut name = String::new();
        if first == '\'' || first == '"' {
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            name.push(escaped);
                        }
                    }
                    c if c == first => break,
                    c => name.push(c),
                }
            }
        } else {
            name.push(first);
            while let Some(c) = chars.next_if(|c| *c != ',') {
                name.push(c);
            }
            name = name.trim_end().to_string();
        }

        if !name.is_empty() {
            names.push(name);
        }
    }

    names
}

/// Most played tracks first, ties by name, optionally filtered by a
/// case-insensitive search on track or artist names.
pub fn top_tracks(
    records: &[TrackRecord],
    search: Option<&str>,
    limit: usize,
) -> Vec<TrackTableRow> {
    let search = search.map(str::to_lowercase);
    let mut matching: Vec<&TrackRecord> = records
        .iter()
        .filter(|r| match &search {
            Some(term) => {
                r.track_name.to_lowercase().contains(term)
                    || r.artists.iter().any(|a| a.to_lowercase().contains(term))
            }
            None => true,
        })
        .collect();

    matching.sort_by(|a, b| {
        b.play_count
            .cmp(&a.play_count)
            .then_with(|| a.track_name.to_lowercase().cmp(&b.track_name.to_lowercase()))
    });

    matching
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, r)| TrackTableRow {
            rank: i + 1,
            name: r.track_name.clone(),
            artists: r.artists.join(", "),
            plays: r.play_count,
        })
        .collect()
}

/// Cancels `token` on Ctrl-C or, on Unix, SIGTERM.
pub async fn cancel_on_shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let term = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let term = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = term => {},
        _ = token.cancelled() => return,
    }

    warn!("shutdown signal received, stopping after the current poll");
    token.cancel();
}
