//! Single-use local HTTP listener for the OAuth redirect.
//!
//! The accept loop runs in its own task. The caller waits on the receiving
//! half of a [`ResultSlot`] under an independent timeout, and the listener is
//! shut down and its port released on every exit path.

use std::{net::SocketAddr, time::Duration};

use axum::{Router, routing::get};
use reqwest::Url;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument::WithSubscriber, warn};

use crate::{
    api::{self, CallbackState, ResultSlot},
    error::AuthError,
    types::AuthorizationResult,
    utils, warning,
};

/// How long a stopping listener may take to finish in-flight responses.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

pub struct CallbackListener {
    local_addr: SocketAddr,
    path: String,
    state: String,
    result: oneshot::Receiver<AuthorizationResult>,
    shutdown: CancellationToken,
    server: Option<JoinHandle<()>>,
}

impl CallbackListener {
    /// Binds `host:port` and serves `path` until one callback arrives.
    ///
    /// The server runs in its own task from the moment this returns. A random
    /// `state` is generated for the authorize request; see
    /// [`CallbackListener::authorize_url`].
    ///
    /// # Arguments
    ///
    /// * `host` - Interface to bind, usually the redirect URI host
    /// * `port` - Port to bind; `0` picks a free one (see
    ///   [`CallbackListener::local_addr`])
    /// * `path` - Route of the redirect; a missing leading `/` is added
    ///
    /// # Error Handling
    ///
    /// - Returns [`AuthError::Bind`] when the address is taken or cannot be
    ///   bound. Nothing is left running in that case.
    ///
    /// # Example
    ///
    /// ```
    /// let listener = CallbackListener::bind("127.0.0.1", 3000, "/callback").await?;
    /// let url = listener.authorize_url(&broker.authorize_url(scope));
    /// let result = listener.await_result(Duration::from_secs(120)).await?;
    /// ```
    pub async fn bind(host: &str, port: u16, path: &str) -> Result<Self, AuthError> {
        let listener =
            TcpListener::bind((host, port))
                .await
                .map_err(|source| AuthError::Bind {
                    addr: format!("{host}:{port}"),
                    source,
                })?;
        let local_addr = listener.local_addr().map_err(|source| AuthError::Bind {
            addr: format!("{host}:{port}"),
            source,
        })?;

        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        let state = utils::generate_state();
        let shutdown = CancellationToken::new();
        let (slot, result) = ResultSlot::new();

        let app = Router::new()
            .route(&path, get(api::callback))
            .with_state(CallbackState::new(
                slot,
                Some(state.clone()),
                shutdown.clone(),
            ));

        let signal = shutdown.clone();
        let server = tokio::spawn(
            async move {
                let served = axum::serve(listener, app)
                    .with_graceful_shutdown(signal.cancelled_owned())
                    .await;
                if let Err(e) = served {
                    error!(error = %e, "callback listener failed");
                }
            }
            .with_current_subscriber(),
        );

        info!(addr = %local_addr, path = %path, "callback listener started");

        Ok(CallbackListener {
            local_addr,
            path,
            state,
            result,
            shutdown,
            server: Some(server),
        })
    }

    /// Binds like [`CallbackListener::bind`], then sends the user's browser to
    /// `authorize_url` extended with this listener's `state`.
    pub async fn start(
        host: &str,
        port: u16,
        path: &str,
        authorize_url: &Url,
    ) -> Result<Self, AuthError> {
        let listener = Self::bind(host, port, path).await?;
        open_browser(&listener.authorize_url(authorize_url));
        Ok(listener)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Random value the authorize request must echo back.
    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn authorize_url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        url.query_pairs_mut().append_pair("state", &self.state);
        url
    }

    /// Waits for the first callback, at most `timeout`, then tears the
    /// listener down.
    ///
    /// Consumes the listener: whatever the outcome, the server task has
    /// stopped and the port is free again when this returns. Requests
    /// without a code, or with a foreign `state`, do not end the wait.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Upper bound on the wait, independent of any request
    ///
    /// # Returns
    ///
    /// The [`AuthorizationResult`] of the first accepted callback: the code,
    /// or the error the authorize page redirected with.
    ///
    /// # Error Handling
    ///
    /// - [`AuthError::Timeout`] when no callback arrived in time
    /// - [`AuthError::Listener`] when the server task ended before a result
    ///
    /// # Example
    ///
    /// ```
    /// match listener.await_result(Duration::from_secs(120)).await? {
    ///     AuthorizationResult::Code(code) => exchange(code).await,
    ///     AuthorizationResult::Denied { error, .. } => bail(error),
    /// }
    /// ```
    pub async fn await_result(
        mut self,
        timeout: Duration,
    ) -> Result<AuthorizationResult, AuthError> {
        info!(
            addr = %self.local_addr,
            timeout_secs = timeout.as_secs(),
            "waiting for authorization"
        );
        let outcome = tokio::time::timeout(timeout, &mut self.result).await;
        self.stop().await;

        match outcome {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(AuthError::Listener(
                "server exited before a callback arrived".to_string(),
            )),
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "authorization timed out");
                Err(AuthError::Timeout(timeout))
            }
        }
    }

    async fn stop(&mut self) {
        self.shutdown.cancel();

        let Some(mut server) = self.server.take() else {
            return;
        };
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut server)
            .await
            .is_err()
        {
            warn!("callback listener did not stop in time, aborting it");
            server.abort();
            let _ = server.await;
        }

        debug!(addr = %self.local_addr, "callback listener closed");
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(server) = self.server.take() {
            server.abort();
        }
    }
}

/// Opens `url` in the default browser, falling back to asking the user.
pub fn open_browser(url: &Url) {
    info!(url = %url, "opening browser for authorization");
    if let Err(e) = webbrowser::open(url.as_str()) {
        warn!(error = %e, "failed to open browser");
        warning!(
            "Failed to open browser. Please navigate to the following URL manually:\n{}",
            url
        );
    }
}
