use std::time::Duration;

use reqwest::{Client, Url};
use tracing::{error, info, warn};

use crate::{
    config::AuthSettings,
    error::AuthError,
    server::CallbackListener,
    types::{AuthorizationResult, Token, TokenResponse},
};

/// Scopes the Spotify authorize endpoint knows about.
pub const KNOWN_SCOPES: &[&str] = &[
    "user-read-private",
    "user-read-email",
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
    "user-read-recently-played",
    "user-read-playback-position",
    "user-top-read",
    "playlist-read-private",
    "playlist-read-collaborative",
    "streaming",
    "app-remote-control",
    "user-library-read",
    "user-library-modify",
    "user-follow-read",
    "user-follow-modify",
];

/// Scopes of a space-separated list that are not in [`KNOWN_SCOPES`].
pub fn unknown_scopes(scope: &str) -> Vec<&str> {
    scope
        .split_whitespace()
        .filter(|s| !KNOWN_SCOPES.contains(s))
        .collect()
}

/// Performs the OAuth flows against the Spotify accounts service.
///
/// Supports three grants, all authenticated with the client id and secret
/// as HTTP Basic credentials:
/// 1. **Client credentials** ([`TokenBroker::client_token`]): app-only token,
///    no user data, no refresh token
/// 2. **Authorization code** ([`TokenBroker::user_token`]): runs the local
///    [`CallbackListener`] on the redirect URI, sends the user to the
///    authorize page and exchanges the returned code
/// 3. **Refresh token** ([`TokenBroker::refresh`]): renews a user token
///
/// Every call makes exactly one token endpoint request; retrying is up to the
/// caller.
///
/// # Error Handling
///
/// - Non-2xx token endpoint answers become [`AuthError::TokenExchange`] with
///   the status; the body is logged
/// - Transport failures become [`AuthError::Http`]
/// - [`AuthError::is_transient`] tells which of them are worth a retry
///
/// # Example
///
/// ```
/// let broker = TokenBroker::new(settings.auth)?;
/// let token = broker.user_token("user-read-currently-playing").await?;
/// let renewed = broker.refresh(token.refresh_token.as_deref().unwrap_or_default()).await?;
/// ```
pub struct TokenBroker {
    http: Client,
    settings: AuthSettings,
    open_browser: bool,
}

impl TokenBroker {
    pub fn new(settings: AuthSettings) -> Result<Self, AuthError> {
        let http = Client::builder().timeout(settings.http_timeout).build()?;
        Ok(TokenBroker {
            http,
            settings,
            open_browser: true,
        })
    }

    /// Logs the authorize URL instead of opening a browser.
    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    /// Authorize endpoint URL for `scope`, without the `state` parameter.
    pub fn authorize_url(&self, scope: &str) -> Url {
        let mut url = self.settings.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("scope", scope)
            .append_pair("redirect_uri", self.settings.redirect_uri.as_str());
        url
    }

    /// Client credentials flow. The token carries no refresh token.
    pub async fn client_token(&self) -> Result<Token, AuthError> {
        let token = self
            .exchange(&[("grant_type", "client_credentials")])
            .await?;
        info!("client credentials access token retrieved");
        Ok(token)
    }

    /// Authorization code flow with the configured timeout.
    pub async fn user_token(&self, scope: &str) -> Result<Token, AuthError> {
        self.user_token_within(scope, self.settings.timeout).await
    }

    /// Authorization code flow with an explicit wait for the browser.
    ///
    /// # Arguments
    ///
    /// * `scope` - Space-separated scopes; unknown ones are logged, not
    ///   rejected
    /// * `timeout` - How long the callback listener waits for the redirect
    ///
    /// # Error Handling
    ///
    /// - [`AuthError::InvalidRedirect`] when the redirect URI has no host or
    ///   port to bind
    /// - [`AuthError::Bind`], [`AuthError::Timeout`] and
    ///   [`AuthError::Listener`] from the callback listener
    /// - [`AuthError::Denied`] when the user declined on the authorize page;
    ///   no token request is made then
    /// - [`AuthError::TokenExchange`] or [`AuthError::Http`] from the code
    ///   exchange
    pub async fn user_token_within(
        &self,
        scope: &str,
        timeout: Duration,
    ) -> Result<Token, AuthError> {
        for unknown in unknown_scopes(scope) {
            warn!(scope = unknown, "unknown scope requested");
        }

        let code = self.authorization_code(scope, timeout).await?;
        let token = self
            .exchange(&[
                ("grant_type", "authorization_code"),
                ("code", &code),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
            ])
            .await?;

        info!("user access token retrieved");
        Ok(token)
    }

    /// Exchanges a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Token, AuthError> {
        let token = self
            .exchange(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;
        info!("access token refreshed");
        Ok(token)
    }

    /// Runs the callback listener end to end and returns the code.
    async fn authorization_code(&self, scope: &str, timeout: Duration) -> Result<String, AuthError> {
        let (host, port, path) = callback_target(&self.settings.redirect_uri)?;
        let authorize_url = self.authorize_url(scope);

        let listener = if self.open_browser {
            CallbackListener::start(&host, port, &path, &authorize_url).await?
        } else {
            let listener = CallbackListener::bind(&host, port, &path).await?;
            info!(
                url = %listener.authorize_url(&authorize_url),
                "open this url to authorize"
            );
            listener
        };

        match listener.await_result(timeout).await? {
            AuthorizationResult::Code(code) => Ok(code),
            AuthorizationResult::Denied { error, description } => {
                Err(AuthError::Denied { error, description })
            }
        }
    }

    async fn exchange(&self, form: &[(&str, &str)]) -> Result<Token, AuthError> {
        let response = self
            .http
            .post(self.settings.token_url.clone())
            .basic_auth(&self.settings.client_id, Some(&self.settings.client_secret))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "token request rejected");
            return Err(AuthError::TokenExchange {
                status: status.as_u16(),
            });
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.into())
    }
}

/// Host, port and path the callback listener serves for `redirect_uri`.
pub fn callback_target(redirect_uri: &Url) -> Result<(String, u16, String), AuthError> {
    let host = redirect_uri
        .host_str()
        .ok_or_else(|| AuthError::InvalidRedirect(format!("{redirect_uri} has no host")))?;
    let port = redirect_uri
        .port_or_known_default()
        .ok_or_else(|| AuthError::InvalidRedirect(format!("{redirect_uri} has no port")))?;

    let host = host.trim_start_matches('[').trim_end_matches(']').to_string();
    Ok((host, port, redirect_uri.path().to_string()))
}
