use std::sync::{Arc, Mutex};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
};
use serde::Deserialize;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::types::AuthorizationResult;

const AUTHORIZED: &str = "<html><body>\
    <h1>Successfully authorized!</h1>\
    <p>You can close this window now.</p>\
    </body></html>";
const ALREADY_HANDLED: &str = "<html><body><h4>Authorization already received.</h4></body></html>";
const DENIED: &str = "<html><body><h4>Authorization failed.</h4></body></html>";
const MISSING_CODE: &str = "<html><body><h4>Missing authorization code.</h4></body></html>";
const STATE_MISMATCH: &str = "<html><body><h4>Authorization state does not match.</h4></body></html>";

/// Write-once slot carrying the authorization result to the waiting caller.
///
/// The first [`ResultSlot::fill`] wins and signals the receiver; every later
/// call is a no-op returning `false`.
pub struct ResultSlot {
    sender: Mutex<Option<oneshot::Sender<AuthorizationResult>>>,
}

impl ResultSlot {
    pub fn new() -> (Self, oneshot::Receiver<AuthorizationResult>) {
        let (tx, rx) = oneshot::channel();
        let slot = ResultSlot {
            sender: Mutex::new(Some(tx)),
        };
        (slot, rx)
    }

    pub fn fill(&self, result: AuthorizationResult) -> bool {
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        match sender {
            Some(tx) => {
                // the waiter may already have timed out
                let _ = tx.send(result);
                true
            }
            None => false,
        }
    }

    pub fn is_filled(&self) -> bool {
        match self.sender.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

/// Shared state of the callback route.
#[derive(Clone)]
pub struct CallbackState {
    slot: Arc<ResultSlot>,
    expected_state: Option<String>,
    done: CancellationToken,
}

impl CallbackState {
    /// `done` is cancelled once the slot has been filled, which stops the
    /// listener after the current response has been sent.
    pub fn new(slot: ResultSlot, expected_state: Option<String>, done: CancellationToken) -> Self {
        CallbackState {
            slot: Arc::new(slot),
            expected_state,
            done,
        }
    }

    fn finish(&self, result: AuthorizationResult) -> bool {
        let first = self.slot.fill(result);
        if first {
            self.done.cancel();
        }
        first
    }
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub state: Option<String>,
}

/// Handles the OAuth redirect.
///
/// `code` fills the slot with the code (200), `error` fills it with the
/// denial (400). Requests without either, or with a `state` that differs from
/// the one sent to the authorize endpoint, are rejected with 400 and leave the
/// slot empty. Once the slot is filled every request gets a plain 200.
pub async fn callback(
    State(ctx): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Html<&'static str>) {
    if ctx.slot.is_filled() {
        debug!("authorization already handled, ignoring callback");
        return (StatusCode::OK, Html(ALREADY_HANDLED));
    }

    if let (Some(expected), Some(received)) =
        (ctx.expected_state.as_deref(), params.state.as_deref())
    {
        if expected != received {
            warn!("callback state does not match the authorization request");
            return (StatusCode::BAD_REQUEST, Html(STATE_MISMATCH));
        }
    }

    if let Some(error) = params.error {
        let description = params.error_description.unwrap_or_default();
        error!(error = %error, description = %description, "authorization error from Spotify");
        return match ctx.finish(AuthorizationResult::Denied { error, description }) {
            true => (StatusCode::BAD_REQUEST, Html(DENIED)),
            false => (StatusCode::OK, Html(ALREADY_HANDLED)),
        };
    }

    match params.code.filter(|code| !code.is_empty()) {
        Some(code) => match ctx.finish(AuthorizationResult::Code(code)) {
            true => {
                info!("received authorization code");
                (StatusCode::OK, Html(AUTHORIZED))
            }
            false => (StatusCode::OK, Html(ALREADY_HANDLED)),
        },
        None => {
            warn!("received callback without code parameter");
            (StatusCode::BAD_REQUEST, Html(MISSING_CODE))
        }
    }
}
