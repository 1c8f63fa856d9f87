use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use reqwest::Url;
use serde_json::json;
use spintally::{config::AuthSettings, error::AuthError, spotify::TokenBroker};

#[derive(Clone, Default)]
struct MockAccounts {
    status: Arc<Mutex<Option<StatusCode>>>,
    requests: Arc<Mutex<Vec<(Option<String>, HashMap<String, String>)>>>,
}

impl MockAccounts {
    fn fail_with(&self, status: StatusCode) {
        *self.status.lock().unwrap() = Some(status);
    }

    fn requests(&self) -> Vec<(Option<String>, HashMap<String, String>)> {
        self.requests.lock().unwrap().clone()
    }
}

async fn token(
    State(mock): State<MockAccounts>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let grant_type = form.get("grant_type").cloned().unwrap_or_default();
    mock.requests.lock().unwrap().push((authorization, form));

    if let Some(status) = *mock.status.lock().unwrap() {
        return (status, Json(json!({ "error": "invalid_client" }))).into_response();
    }

    let body = match grant_type.as_str() {
        "client_credentials" => json!({
            "access_token": "client-token",
            "token_type": "Bearer",
            "expires_in": 3600
        }),
        "authorization_code" => json!({
            "access_token": "user-token",
            "token_type": "Bearer",
            "scope": "user-read-currently-playing",
            "expires_in": 3600,
            "refresh_token": "refresh-1"
        }),
        "refresh_token" => json!({
            "access_token": "refreshed-token",
            "token_type": "Bearer",
            "expires_in": 1800
        }),
        _ => return StatusCode::BAD_REQUEST.into_response(),
    };
    Json(body).into_response()
}

async fn spawn_accounts() -> (SocketAddr, MockAccounts) {
    let mock = MockAccounts::default();
    let app = Router::new()
        .route("/api/token", post(token))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, mock)
}

async fn free_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

fn settings(accounts: SocketAddr, redirect_port: u16) -> AuthSettings {
    AuthSettings {
        client_id: "my-client".to_string(),
        client_secret: "my-secret".to_string(),
        redirect_uri: Url::parse(&format!("http://127.0.0.1:{redirect_port}/callback")).unwrap(),
        scope: "user-read-currently-playing".to_string(),
        auth_url: Url::parse(&format!("http://{accounts}/authorize")).unwrap(),
        token_url: Url::parse(&format!("http://{accounts}/api/token")).unwrap(),
        timeout: Duration::from_secs(5),
        http_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_client_credentials_token() {
    let (addr, mock) = spawn_accounts().await;
    let broker = TokenBroker::new(settings(addr, 3000)).unwrap();

    let token = broker.client_token().await.unwrap();

    assert_eq!(token.access_token, "client-token");
    assert_eq!(token.expires_in, 3600);
    assert!(token.refresh_token.is_none());
    assert!(!token.is_expired());

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    let (authorization, form) = &requests[0];
    // base64("my-client:my-secret")
    assert_eq!(
        authorization.as_deref(),
        Some("Basic bXktY2xpZW50Om15LXNlY3JldA==")
    );
    assert_eq!(form["grant_type"], "client_credentials");
}

#[tokio::test]
async fn test_rejected_exchange_reports_status() {
    let (addr, mock) = spawn_accounts().await;
    mock.fail_with(StatusCode::BAD_REQUEST);
    let broker = TokenBroker::new(settings(addr, 3000)).unwrap();

    let err = broker.client_token().await.unwrap_err();

    assert!(matches!(err, AuthError::TokenExchange { status: 400 }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let (addr, mock) = spawn_accounts().await;
    mock.fail_with(StatusCode::SERVICE_UNAVAILABLE);
    let broker = TokenBroker::new(settings(addr, 3000)).unwrap();

    let err = broker.refresh("refresh-1").await.unwrap_err();

    assert!(matches!(err, AuthError::TokenExchange { status: 503 }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_refresh_token_exchange() {
    let (addr, mock) = spawn_accounts().await;
    let broker = TokenBroker::new(settings(addr, 3000)).unwrap();

    let token = broker.refresh("refresh-1").await.unwrap();

    assert_eq!(token.access_token, "refreshed-token");
    assert_eq!(token.expires_in, 1800);

    let (_, form) = &mock.requests()[0];
    assert_eq!(form["grant_type"], "refresh_token");
    assert_eq!(form["refresh_token"], "refresh-1");
}

#[tokio::test]
async fn test_authorize_url_parameters() {
    let (addr, _) = spawn_accounts().await;
    let broker = TokenBroker::new(settings(addr, 3000)).unwrap();

    let url = broker.authorize_url("user-read-currently-playing");
    let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();

    assert_eq!(pairs["response_type"], "code");
    assert_eq!(pairs["client_id"], "my-client");
    assert_eq!(pairs["scope"], "user-read-currently-playing");
    assert_eq!(pairs["redirect_uri"], "http://127.0.0.1:3000/callback");
    assert!(!pairs.contains_key("state"));
}

#[tokio::test]
async fn test_user_token_end_to_end() {
    let (addr, mock) = spawn_accounts().await;
    let port = free_port().await;
    let broker = TokenBroker::new(settings(addr, port)).unwrap().without_browser();

    // plays the browser: retries until the listener is up
    let browser = tokio::spawn(async move {
        let url = format!("http://127.0.0.1:{port}/callback?code=AUTH-CODE");
        for _ in 0..50 {
            if let Ok(response) = reqwest::get(&url).await {
                return response.status();
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("callback listener never came up");
    });

    let token = broker
        .user_token_within("user-read-currently-playing", Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(browser.await.unwrap(), StatusCode::OK);
    assert_eq!(token.access_token, "user-token");
    assert_eq!(token.refresh_token.as_deref(), Some("refresh-1"));
    assert_eq!(token.scope.as_deref(), Some("user-read-currently-playing"));

    let (_, form) = &mock.requests()[0];
    assert_eq!(form["grant_type"], "authorization_code");
    assert_eq!(form["code"], "AUTH-CODE");
    assert_eq!(form["redirect_uri"], format!("http://127.0.0.1:{port}/callback"));

    // the listener released its port
    tokio::net::TcpListener::bind(("127.0.0.1", port)).await.unwrap();
}

#[tokio::test]
async fn test_user_token_denied() {
    let (addr, mock) = spawn_accounts().await;
    let port = free_port().await;
    let broker = TokenBroker::new(settings(addr, port)).unwrap().without_browser();

    tokio::spawn(async move {
        let url = format!("http://127.0.0.1:{port}/callback?error=access_denied");
        for _ in 0..50 {
            if reqwest::get(&url).await.is_ok() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    });

    let err = broker
        .user_token_within("user-read-currently-playing", Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Denied { ref error, .. } if error == "access_denied"));
    assert!(!err.is_transient());
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn test_user_token_times_out() {
    let (addr, _) = spawn_accounts().await;
    let port = free_port().await;
    let broker = TokenBroker::new(settings(addr, port)).unwrap().without_browser();

    let err = broker
        .user_token_within("user-read-currently-playing", Duration::from_secs(1))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Timeout(_)));
    assert!(!err.is_transient());
}
