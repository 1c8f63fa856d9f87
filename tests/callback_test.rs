use std::time::Duration;

use reqwest::{StatusCode, Url};
use spintally::{
    api::ResultSlot,
    error::AuthError,
    server::CallbackListener,
    types::AuthorizationResult,
};

async fn get(url: String) -> (StatusCode, String) {
    let response = reqwest::get(url).await.unwrap();
    let status = response.status();
    (status, response.text().await.unwrap())
}

#[tokio::test]
async fn test_code_is_returned_and_port_released() {
    let listener = CallbackListener::bind("127.0.0.1", 0, "/callback")
        .await
        .unwrap();
    let addr = listener.local_addr();

    let browser = tokio::spawn(get(format!("http://{addr}/callback?code=ABC123")));
    let result = listener.await_result(Duration::from_secs(5)).await.unwrap();

    assert_eq!(result, AuthorizationResult::Code("ABC123".to_string()));

    let (status, body) = browser.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Successfully authorized"));

    // the port is free again
    tokio::net::TcpListener::bind(addr).await.unwrap();
}

#[tokio::test]
async fn test_timeout_without_request() {
    let listener = CallbackListener::bind("127.0.0.1", 0, "/callback")
        .await
        .unwrap();
    let addr = listener.local_addr();

    let err = listener
        .await_result(Duration::from_secs(1))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Timeout(d) if d == Duration::from_secs(1)));
    tokio::net::TcpListener::bind(addr).await.unwrap();
}

#[tokio::test]
async fn test_error_parameter_is_returned() {
    let listener = CallbackListener::bind("127.0.0.1", 0, "/callback")
        .await
        .unwrap();
    let addr = listener.local_addr();

    let browser = tokio::spawn(get(format!(
        "http://{addr}/callback?error=access_denied&error_description=user%20said%20no"
    )));
    let result = listener.await_result(Duration::from_secs(5)).await.unwrap();

    assert_eq!(
        result,
        AuthorizationResult::Denied {
            error: "access_denied".to_string(),
            description: "user said no".to_string(),
        }
    );
    let (status, _) = browser.await.unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_request_without_code_keeps_waiting() {
    let listener = CallbackListener::bind("127.0.0.1", 0, "/callback")
        .await
        .unwrap();
    let addr = listener.local_addr();

    let browser = tokio::spawn(async move {
        let missing = get(format!("http://{addr}/callback")).await;
        let wrong_path = get(format!("http://{addr}/elsewhere?code=NOPE")).await;
        let good = get(format!("http://{addr}/callback?code=LATER")).await;
        (missing, wrong_path, good)
    });

    let result = listener.await_result(Duration::from_secs(5)).await.unwrap();
    assert_eq!(result, AuthorizationResult::Code("LATER".to_string()));

    let (missing, wrong_path, good) = browser.await.unwrap();
    assert_eq!(missing.0, StatusCode::BAD_REQUEST);
    assert_eq!(wrong_path.0, StatusCode::NOT_FOUND);
    assert_eq!(good.0, StatusCode::OK);
}

#[tokio::test]
async fn test_mismatched_state_is_rejected() {
    let listener = CallbackListener::bind("127.0.0.1", 0, "callback")
        .await
        .unwrap();
    let addr = listener.local_addr();
    let state = listener.state().to_string();
    assert_eq!(listener.path(), "/callback");

    let browser = tokio::spawn(async move {
        let forged = get(format!("http://{addr}/callback?code=EVIL&state=forged")).await;
        let genuine = get(format!("http://{addr}/callback?code=GOOD&state={state}")).await;
        (forged, genuine)
    });

    let result = listener.await_result(Duration::from_secs(5)).await.unwrap();
    assert_eq!(result, AuthorizationResult::Code("GOOD".to_string()));

    let (forged, genuine) = browser.await.unwrap();
    assert_eq!(forged.0, StatusCode::BAD_REQUEST);
    assert_eq!(genuine.0, StatusCode::OK);
}

#[tokio::test]
async fn test_bind_fails_when_port_taken() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = taken.local_addr().unwrap().port();

    let err = CallbackListener::bind("127.0.0.1", port, "/callback")
        .await
        .err()
        .unwrap();

    assert!(matches!(err, AuthError::Bind { .. }));
}

#[tokio::test]
async fn test_authorize_url_carries_state() {
    let listener = CallbackListener::bind("127.0.0.1", 0, "/callback")
        .await
        .unwrap();
    let base = Url::parse("https://accounts.example.com/authorize?client_id=abc").unwrap();

    let url = listener.authorize_url(&base);

    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert!(pairs.contains(&("client_id".to_string(), "abc".to_string())));
    assert!(pairs.contains(&("state".to_string(), listener.state().to_string())));
}

#[test]
fn test_result_slot_is_write_once() {
    let (slot, mut rx) = ResultSlot::new();
    assert!(!slot.is_filled());

    assert!(slot.fill(AuthorizationResult::Code("first".to_string())));
    assert!(slot.is_filled());
    assert!(!slot.fill(AuthorizationResult::Code("second".to_string())));

    assert_eq!(
        rx.try_recv().unwrap(),
        AuthorizationResult::Code("first".to_string())
    );
}

#[test]
fn test_result_slot_survives_gone_waiter() {
    let (slot, rx) = ResultSlot::new();
    drop(rx);

    assert!(slot.fill(AuthorizationResult::Code("late".to_string())));
    assert!(!slot.fill(AuthorizationResult::Code("later".to_string())));
}
