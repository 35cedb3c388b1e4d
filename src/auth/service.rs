use super::models::{AuthResponse, AuthSession, LoginRequest, SignupRequest, UserProfile};
use crate::credentials::CredentialStore;
use crate::infrastructure::{ApiClient, ApiRequest};
use crate::types::{Result, SessionError, endpoints};
use std::sync::Arc;

/// Login, signup, logout and profile calls against `/auth/*`.
#[derive(Clone)]
pub struct AuthService {
    api: ApiClient,
    credentials: Arc<CredentialStore>,
    dashboard_route: String,
}

impl AuthService {
    pub fn new(
        api: ApiClient,
        credentials: Arc<CredentialStore>,
        dashboard_route: impl Into<String>,
    ) -> Self {
        Self {
            api,
            credentials,
            dashboard_route: dashboard_route.into(),
        }
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthSession> {
        let response: AuthResponse = self
            .api
            .send_json(
                ApiRequest::post(endpoints::LOGIN)
                    .anonymous()
                    .with_json(request)?,
            )
            .await?;

        tracing::info!("Logged in as {}", request.email);
        self.store(response)
    }

    pub async fn signup(&self, request: &SignupRequest) -> Result<AuthSession> {
        let response: AuthResponse = self
            .api
            .send_json(
                ApiRequest::post(endpoints::SIGNUP)
                    .anonymous()
                    .with_json(request)?,
            )
            .await?;

        tracing::info!("Signed up as {}", request.email);
        self.store(response)
    }

    /// Tell the backend (best effort) and always drop local credentials.
    pub async fn logout(&self) -> Result<()> {
        if self.credentials.get_token_data().is_some()
            && let Err(e) = self.api.send(ApiRequest::post(endpoints::LOGOUT)).await
        {
            tracing::warn!("Logout request failed, clearing local session anyway: {}", e);
        }

        self.credentials.clear_auth_data();
        tracing::info!("Logged out");
        Ok(())
    }

    /// Fetch the profile and refresh the stored copy.
    pub async fn profile(&self) -> Result<UserProfile> {
        let profile: UserProfile = self.api.get_json(endpoints::PROFILE).await?;
        self.credentials.set_user_data(&profile)?;
        Ok(profile)
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.credentials.get_user_data()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.get_token_data().is_some()
    }

    fn store(&self, response: AuthResponse) -> Result<AuthSession> {
        let tokens = response.tokens();
        if !tokens.is_usable() {
            return Err(SessionError::Auth(
                "backend returned an empty token pair".to_string(),
            ));
        }

        self.credentials.set_token_data(&tokens)?;
        if let Some(user) = &response.user {
            self.credentials.set_user_data(user)?;
        }

        Ok(AuthSession {
            tokens,
            user: response.user,
            redirect_to: self.dashboard_route.clone(),
        })
    }
}
