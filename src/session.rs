use crate::auth::{AuthService, AuthSession, LoginRequest, RefreshCoordinator, SignupRequest, UserProfile};
use crate::bridge::{UnreadCounter, UnreadSource};
use crate::channel::{ChannelManagerBuilder, ChannelOptions, MessagesChannel, NotificationsChannel};
use crate::config::ClientConfig;
use crate::credentials::{CookieJar, CredentialStore};
use crate::infrastructure::{ApiClient, Navigator};
use crate::infrastructure::http::join_url;
use crate::types::{Result, endpoints};
use std::sync::Arc;

/// Root composition of the session layer: one credential store, one REST
/// client, both realtime namespaces and their unread counters.
///
/// Lifecycle: [`new`](Self::new) → [`login`](Self::login) or
/// [`resume`](Self::resume) (connects realtime, starts counters) →
/// subscribe through [`notifications`](Self::notifications) /
/// [`messages`](Self::messages) → [`logout`](Self::logout).
pub struct SessionClient {
    config: ClientConfig,
    credentials: Arc<CredentialStore>,
    navigator: Arc<dyn Navigator>,
    api: ApiClient,
    auth: AuthService,
    notifications: NotificationsChannel,
    messages: MessagesChannel,
    notification_counter: UnreadCounter,
    message_counter: UnreadCounter,
}

impl SessionClient {
    pub fn new(
        config: ClientConfig,
        jar: Arc<dyn CookieJar>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let credentials = Arc::new(CredentialStore::new(jar));

        let refresher = Arc::new(RefreshCoordinator::new(
            http.clone(),
            join_url(&config.api_url, endpoints::REFRESH),
            Arc::clone(&credentials),
            Arc::clone(&navigator),
            config.sign_in_route.clone(),
        ));
        let api = ApiClient::new(
            config.api_url.clone(),
            http,
            Arc::clone(&credentials),
            refresher,
        );
        let auth = AuthService::new(
            api.clone(),
            Arc::clone(&credentials),
            config.dashboard_route.clone(),
        );

        let notifications = NotificationsChannel::new(
            ChannelManagerBuilder::new(&config.api_url, Self::channel_options(&config, ChannelOptions::notifications()))
                .with_credentials(Arc::clone(&credentials))
                .build()?,
        );
        let messages = MessagesChannel::new(
            ChannelManagerBuilder::new(&config.api_url, Self::channel_options(&config, ChannelOptions::messages()))
                .with_credentials(Arc::clone(&credentials))
                .build()?,
        );

        let notification_counter = UnreadCounter::new(
            UnreadSource::notifications(),
            api.clone(),
            notifications.manager().clone(),
        )
        .with_poll_interval(config.unread_poll_interval);
        let message_counter = UnreadCounter::new(
            UnreadSource::messages(),
            api.clone(),
            messages.manager().clone(),
        )
        .with_poll_interval(config.unread_poll_interval);

        Ok(Self {
            config,
            credentials,
            navigator,
            api,
            auth,
            notifications,
            messages,
            notification_counter,
            message_counter,
        })
    }

    /// Sign in, store credentials, go to the dashboard and go live.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession> {
        let session = self.auth.login(&LoginRequest::new(email, password)).await?;
        self.enter(&session).await?;
        Ok(session)
    }

    pub async fn signup(&self, request: &SignupRequest) -> Result<AuthSession> {
        let session = self.auth.signup(request).await?;
        self.enter(&session).await?;
        Ok(session)
    }

    /// Pick up a session from stored credentials, as after a page reload.
    ///
    /// Returns `None` when no usable tokens are stored.
    pub async fn resume(&self) -> Result<Option<UserProfile>> {
        if !self.auth.is_authenticated() {
            return Ok(None);
        }

        let user = match self.credentials.get_user_data() {
            Some(user) => user,
            None => self.auth.profile().await?,
        };
        self.activate(&user).await;
        Ok(Some(user))
    }

    /// Stop realtime and polling, drop credentials and go to sign-in.
    pub async fn logout(&self) -> Result<()> {
        self.notification_counter.stop().await;
        self.message_counter.stop().await;
        self.notifications.disconnect().await?;
        self.messages.disconnect().await?;

        self.auth.logout().await?;
        self.navigator.navigate(&self.config.sign_in_route);
        Ok(())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn notifications(&self) -> &NotificationsChannel {
        &self.notifications
    }

    pub fn messages(&self) -> &MessagesChannel {
        &self.messages
    }

    pub fn notification_counter(&self) -> &UnreadCounter {
        &self.notification_counter
    }

    pub fn message_counter(&self) -> &UnreadCounter {
        &self.message_counter
    }

    fn channel_options(config: &ClientConfig, options: ChannelOptions) -> ChannelOptions {
        options
            .with_reconnect(config.reconnect_delay, config.max_reconnect_attempts)
            .with_heartbeat(config.heartbeat_interval)
    }

    async fn enter(&self, session: &AuthSession) -> Result<()> {
        self.navigator.navigate(&session.redirect_to);

        let user = match &session.user {
            Some(user) => user.clone(),
            None => self.auth.profile().await?,
        };
        self.activate(&user).await;
        Ok(())
    }

    /// Realtime failures degrade to polling; they never fail the caller.
    async fn activate(&self, user: &UserProfile) {
        let user_id = user.id.as_str();

        if let Err(e) = self.notifications.connect(user_id).await {
            tracing::warn!("Notifications realtime unavailable, polling only: {}", e);
        }
        if let Err(e) = self.messages.connect(user_id).await {
            tracing::warn!("Messages realtime unavailable, polling only: {}", e);
        }

        self.notification_counter.start(user_id).await;
        self.message_counter.start(user_id).await;
        tracing::info!("Session active for {}", user.email);
    }
}
