use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::time::sleep;

use crate::{
    Res,
    config::Settings,
    error::AuthError,
    info,
    spotify::TokenBroker,
    success,
    types::Token,
};

/// Attempts of the startup authorization before giving up.
pub const MAX_AUTH_ATTEMPTS: u32 = 3;
const AUTH_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Runs the authorization code flow, retrying transient failures.
///
/// Denials, timeouts and bind failures are returned right away; transport
/// and server-side token endpoint errors are retried up to
/// [`MAX_AUTH_ATTEMPTS`] times.
pub async fn authorize(broker: &TokenBroker) -> Result<Token, AuthError> {
    let mut attempt = 1;
    loop {
        let pb = spinner("Waiting for authorization in the browser...");
        let result = broker.user_token(&broker.settings().scope).await;
        pb.finish_and_clear();

        match result {
            Ok(token) => return Ok(token),
            Err(e) if e.is_transient() && attempt < MAX_AUTH_ATTEMPTS => {
                tracing::warn!(attempt, error = %e, "authorization failed, retrying");
                sleep(AUTH_RETRY_DELAY).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(attempt, error = %e, "authorization failed");
                return Err(e);
            }
        }
    }
}

/// `auth` command: runs one flow and reports the outcome.
pub async fn auth(settings: Settings, client_credentials: bool) -> Res<()> {
    let broker = TokenBroker::new(settings.auth)?;

    let token = if client_credentials {
        broker.client_token().await?
    } else {
        authorize(&broker).await?
    };

    success!(
        "Authentication successful! Access token valid for {} seconds.",
        token.expires_in
    );
    if let Some(scope) = &token.scope {
        info!("Granted scope: {}", scope);
    }
    if token.refresh_token.is_some() {
        info!("A refresh token was issued; the tracker renews access on its own.");
    }

    Ok(())
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb
}
