use super::models::{AuthResponse, RefreshRequest, TokenPair};
use crate::credentials::CredentialStore;
use crate::infrastructure::Navigator;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Why a refresh did not produce a new token pair. Cloneable so every
/// waiter on a shared in-flight refresh receives it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("token refresh failed: {0}")]
pub struct RefreshFailure(pub String);

pub type RefreshOutcome = std::result::Result<TokenPair, RefreshFailure>;

type InFlight = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Exchanges the stored refresh token for a new pair, at most once at a time.
///
/// While a refresh is pending every caller awaits the same future, so N
/// concurrent 401s produce a single `POST /auth/refresh`. On failure the
/// stored credentials are wiped and the navigator is sent to sign-in, once.
pub struct RefreshCoordinator {
    http: reqwest::Client,
    refresh_url: String,
    credentials: Arc<CredentialStore>,
    navigator: Arc<dyn Navigator>,
    sign_in_route: String,
    in_flight: Mutex<Option<InFlight>>,
}

impl RefreshCoordinator {
    pub fn new(
        http: reqwest::Client,
        refresh_url: String,
        credentials: Arc<CredentialStore>,
        navigator: Arc<dyn Navigator>,
        sign_in_route: String,
    ) -> Self {
        Self {
            http,
            refresh_url,
            credentials,
            navigator,
            sign_in_route,
            in_flight: Mutex::new(None),
        }
    }

    /// Refresh the token pair, joining an in-flight refresh if there is one.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.refresh_rejected(None).await
    }

    /// Refresh after `rejected` was turned down with a 401.
    ///
    /// When the stored access token no longer matches `rejected`, another
    /// caller already rotated it and the stored pair is returned as is.
    pub async fn refresh_rejected(&self, rejected: Option<&str>) -> RefreshOutcome {
        let flight = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(existing) => {
                    tracing::debug!("Joining in-flight token refresh");
                    existing.clone()
                }
                None => {
                    if let Some(rejected) = rejected
                        && let Some(current) = self.credentials.get_token_data()
                        && current.access_token != rejected
                    {
                        tracing::debug!("Access token already rotated, skipping refresh");
                        return Ok(current);
                    }
                    let Some(refresh_token) = self.credentials.refresh_token() else {
                        return Err(RefreshFailure("no refresh token stored".to_string()));
                    };
                    let flight = Self::perform(
                        self.http.clone(),
                        self.refresh_url.clone(),
                        refresh_token,
                        Arc::clone(&self.credentials),
                        Arc::clone(&self.navigator),
                        self.sign_in_route.clone(),
                    )
                    .boxed()
                    .shared();
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };

        let outcome = flight.clone().await;

        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&flight)) {
            *slot = None;
        }

        outcome
    }

    /// Whether a refresh is currently pending.
    pub fn is_refreshing(&self) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    async fn perform(
        http: reqwest::Client,
        refresh_url: String,
        refresh_token: String,
        credentials: Arc<CredentialStore>,
        navigator: Arc<dyn Navigator>,
        sign_in_route: String,
    ) -> RefreshOutcome {
        tracing::info!("Access token rejected, refreshing");

        match Self::exchange(&http, &refresh_url, &refresh_token).await {
            Ok(response) => {
                let tokens = response.tokens();
                if let Err(e) = credentials.set_token_data(&tokens) {
                    tracing::error!("Failed to store refreshed tokens: {}", e);
                }
                if let Some(user) = &response.user
                    && let Err(e) = credentials.set_user_data(user)
                {
                    tracing::error!("Failed to store refreshed profile: {}", e);
                }
                tracing::info!("Token refresh succeeded");
                Ok(tokens)
            }
            Err(failure) => {
                tracing::warn!("{}; signing out", failure);
                credentials.clear_auth_data();
                navigator.navigate(&sign_in_route);
                Err(failure)
            }
        }
    }

    async fn exchange(
        http: &reqwest::Client,
        refresh_url: &str,
        refresh_token: &str,
    ) -> std::result::Result<AuthResponse, RefreshFailure> {
        let response = http
            .post(refresh_url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e| RefreshFailure(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RefreshFailure(format!(
                "refresh endpoint answered {}",
                response.status()
            )));
        }

        let body = response
            .json::<AuthResponse>()
            .await
            .map_err(|e| RefreshFailure(format!("invalid refresh response: {}", e)))?;

        if body.tokens().is_usable() {
            Ok(body)
        } else {
            Err(RefreshFailure("refresh response carried empty tokens".to_string()))
        }
    }
}
