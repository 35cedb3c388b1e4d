mod common;

use common::{Backend, eventually, init_tracing, rest_harness};
use serde_json::Value;
use std::sync::atomic::Ordering;
use strading_session::{ApiRequest, SessionError, TokenPair};

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    init_tracing();
    let backend = Backend::start().await;
    let harness = rest_harness(&backend);

    let (_, refresh) = backend.issue_tokens();
    harness
        .credentials
        .set_token_data(&TokenPair::new("expired-token", refresh))
        .unwrap();
    backend.state.refresh_delay_ms.store(200, Ordering::SeqCst);

    let requests = (0..8).map(|_| {
        let api = harness.api.clone();
        tokio::spawn(async move { api.get_json::<Value>("/orders").await })
    });
    let results = futures::future::join_all(requests).await;

    for result in results {
        let body = result.unwrap().unwrap();
        assert_eq!(body["orders"][0]["symbol"], "BTC-USD");
    }
    assert_eq!(backend.refresh_calls(), 1);
    assert!(!harness.refresher.is_refreshing());

    let stored = harness.credentials.get_token_data().unwrap();
    assert_eq!(stored.access_token, "access-2");
    assert_eq!(stored.refresh_token, "refresh-2");
}

#[tokio::test]
async fn test_late_401_reuses_completed_refresh() {
    let backend = Backend::start().await;
    let harness = rest_harness(&backend);

    let (_, refresh) = backend.issue_tokens();
    harness
        .credentials
        .set_token_data(&TokenPair::new("expired-token", refresh))
        .unwrap();

    // First call refreshes; the second one starts with the rotated token
    harness.api.get_json::<Value>("/orders").await.unwrap();
    harness.api.get_json::<Value>("/orders").await.unwrap();

    assert_eq!(backend.refresh_calls(), 1);
}

#[tokio::test]
async fn test_refresh_failure_signs_out() {
    let backend = Backend::start().await;
    let harness = rest_harness(&backend);

    harness
        .credentials
        .set_token_data(&TokenPair::new("expired-token", "revoked-refresh"))
        .unwrap();
    backend.state.refresh_fails.store(true, Ordering::SeqCst);

    let error = harness
        .api
        .get_json::<Value>("/orders")
        .await
        .unwrap_err();

    // The caller sees the original 401, not the refresh failure
    assert!(error.is_unauthorized());
    assert_eq!(backend.refresh_calls(), 1);
    assert!(harness.credentials.get_token_data().is_none());
    assert_eq!(harness.navigator.current().as_deref(), Some("/sign-in"));
}

#[tokio::test]
async fn test_refresh_failure_is_shared_by_waiters() {
    let backend = Backend::start().await;
    let harness = rest_harness(&backend);

    harness
        .credentials
        .set_token_data(&TokenPair::new("expired-token", "revoked-refresh"))
        .unwrap();
    backend.state.refresh_fails.store(true, Ordering::SeqCst);
    backend.state.refresh_delay_ms.store(200, Ordering::SeqCst);

    let requests = (0..4).map(|_| {
        let api = harness.api.clone();
        tokio::spawn(async move { api.get_json::<Value>("/orders").await })
    });
    for result in futures::future::join_all(requests).await {
        assert!(result.unwrap().unwrap_err().is_unauthorized());
    }

    assert_eq!(backend.refresh_calls(), 1);
}

#[tokio::test]
async fn test_without_credentials_no_refresh_is_attempted() {
    let backend = Backend::start().await;
    let harness = rest_harness(&backend);

    let error = harness
        .api
        .get_json::<Value>("/orders")
        .await
        .unwrap_err();

    assert!(error.is_unauthorized());
    assert_eq!(backend.refresh_calls(), 0);
    assert_eq!(harness.navigator.current(), None);
}

#[tokio::test]
async fn test_second_401_after_retry_is_returned() {
    let backend = Backend::start().await;
    let harness = rest_harness(&backend);

    let (access, refresh) = backend.issue_tokens();
    harness
        .credentials
        .set_token_data(&TokenPair::new(access, refresh))
        .unwrap();
    backend.state.reject_all.store(true, Ordering::SeqCst);

    let error = harness
        .api
        .send(ApiRequest::get("/orders"))
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        SessionError::Status { status, .. } if status.as_u16() == 401
    ));
    assert_eq!(backend.refresh_calls(), 1);
    // Refresh itself worked, so the session is kept
    assert!(harness.credentials.get_token_data().is_some());
}

#[tokio::test]
async fn test_anonymous_request_never_refreshes() {
    let backend = Backend::start().await;
    let harness = rest_harness(&backend);

    let (access, refresh) = backend.issue_tokens();
    harness
        .credentials
        .set_token_data(&TokenPair::new(access, refresh))
        .unwrap();
    backend.state.reject_all.store(true, Ordering::SeqCst);

    let error = harness
        .api
        .send(ApiRequest::get("/orders").anonymous())
        .await
        .unwrap_err();

    assert!(error.is_unauthorized());
    assert_eq!(backend.refresh_calls(), 0);
}

#[tokio::test]
async fn test_successful_request_is_untouched() {
    let backend = Backend::start().await;
    let harness = rest_harness(&backend);

    let (access, refresh) = backend.issue_tokens();
    harness
        .credentials
        .set_token_data(&TokenPair::new(access.clone(), refresh))
        .unwrap();

    let body: Value = harness.api.get_json("/orders").await.unwrap();
    assert!(body["orders"].is_array());

    eventually("no refresh", || backend.refresh_calls() == 0).await;
    assert_eq!(
        harness.credentials.access_token().as_deref(),
        Some(access.as_str())
    );
}
