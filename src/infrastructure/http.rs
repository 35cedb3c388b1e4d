use crate::auth::RefreshCoordinator;
use crate::credentials::CredentialStore;
use crate::types::{Result, SessionError};
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// An outgoing REST call plus the retry metadata the interceptor needs.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    authenticated: bool,
    retried: bool,
    sent_with: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            authenticated: true,
            retried: false,
            sent_with: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_json<B: Serialize>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Send without a bearer token and never attempt a refresh.
    pub fn anonymous(mut self) -> Self {
        self.authenticated = false;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_retry(&self) -> bool {
        self.retried
    }

    fn into_retry(self) -> Self {
        Self {
            retried: true,
            ..self
        }
    }
}

/// REST client with the auth interceptor chain:
///
/// 1. attach `Authorization: Bearer <access>` when a token is stored;
/// 2. on a first 401 with a refresh token stored, refresh (shared with any
///    concurrent refresh) and re-dispatch once with the new token;
/// 3. otherwise surface the response status as [`SessionError::Status`].
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    credentials: Arc<CredentialStore>,
    refresher: Arc<RefreshCoordinator>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        http: reqwest::Client,
        credentials: Arc<CredentialStore>,
        refresher: Arc<RefreshCoordinator>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            credentials,
            refresher,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    /// Run a request through the interceptor chain.
    pub async fn send(&self, request: ApiRequest) -> Result<Response> {
        let (request, response) = self.dispatch(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return ensure_success(response).await;
        }

        let error = status_error(response).await;
        if !request.authenticated || request.is_retry() || !self.credentials.has_refresh_token() {
            return Err(error);
        }

        if let Err(failure) = self
            .refresher
            .refresh_rejected(request.sent_with.as_deref())
            .await
        {
            tracing::warn!("{} {} failed after refresh: {}", request.method, request.path, failure);
            return Err(error);
        }

        let (_, response) = self.dispatch(request.into_retry()).await?;
        ensure_success(response).await
    }

    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let response = self.send(request).await?;
        Ok(response.json::<T>().await?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send_json(ApiRequest::get(path)).await
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send_json(ApiRequest::post(path).with_json(body)?).await
    }

    async fn dispatch(&self, mut request: ApiRequest) -> Result<(ApiRequest, Response)> {
        let url = self.url_for(&request.path);
        let mut builder = self.http.request(request.method.clone(), &url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        request.sent_with = None;
        if request.authenticated
            && let Some(token) = self.credentials.access_token()
        {
            builder = builder.bearer_auth(&token);
            request.sent_with = Some(token);
        }

        tracing::debug!(
            "{} {} (retry: {}, bearer: {})",
            request.method,
            url,
            request.retried,
            request.sent_with.is_some()
        );
        let response = builder.send().await?;
        Ok((request, response))
    }
}

/// Converts the REST base URL into the WebSocket URL of a namespace.
///
/// A trailing `/api` is dropped and `http`/`https` become `ws`/`wss`:
/// `https://host/api` + `/messages` gives `wss://host/messages`.
pub fn realtime_endpoint(api_url: &str, namespace: &str) -> Result<Url> {
    let mut url = Url::parse(api_url)?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(SessionError::Config(format!(
                "unsupported API URL scheme '{}'",
                other
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| SessionError::Config(format!("cannot use scheme '{}'", scheme)))?;

    let path = url.path().trim_end_matches('/');
    let base = path.strip_suffix("/api").unwrap_or(path);
    let full_path = format!("{}/{}", base, namespace.trim_start_matches('/'));
    url.set_path(&full_path);
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

async fn ensure_success(response: Response) -> Result<Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(status_error(response).await)
    }
}

async fn status_error(response: Response) -> SessionError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    SessionError::Status { status, body }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url_keeps_base_path() {
        assert_eq!(
            join_url("http://localhost:3001/api", "/auth/login"),
            "http://localhost:3001/api/auth/login"
        );
        assert_eq!(
            join_url("http://localhost:3001/api/", "orders"),
            "http://localhost:3001/api/orders"
        );
    }

    #[test]
    fn test_realtime_endpoint_strips_api_suffix() {
        let url = realtime_endpoint("https://api.strading.com/api", "/messages").unwrap();
        assert_eq!(url.as_str(), "wss://api.strading.com/messages");

        let url = realtime_endpoint("http://localhost:3001/api/", "notifications").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:3001/notifications");

        let url = realtime_endpoint("http://localhost:3001", "/messages").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:3001/messages");
    }

    #[test]
    fn test_realtime_endpoint_keeps_other_prefixes() {
        let url = realtime_endpoint("https://host/v2/api?debug=1", "/messages").unwrap();
        assert_eq!(url.as_str(), "wss://host/v2/messages");
    }

    #[test]
    fn test_realtime_endpoint_rejects_unknown_scheme() {
        assert!(matches!(
            realtime_endpoint("ftp://host/api", "/messages"),
            Err(SessionError::Config(_))
        ));
    }

    #[test]
    fn test_retry_marks_request_without_mutating_original() {
        let request = ApiRequest::get("/orders").with_query("page", 2);
        let retry = request.clone().into_retry();

        assert!(!request.is_retry());
        assert!(retry.is_retry());
        assert_eq!(retry.path(), "/orders");
        assert_eq!(retry.method(), &Method::GET);
    }

    #[test]
    fn test_anonymous_request_skips_auth() {
        let request = ApiRequest::post("/auth/login").anonymous();
        assert!(!request.authenticated);
    }
}
