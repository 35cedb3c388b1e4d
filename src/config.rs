use crate::types::{
    API_URL_ENV, DASHBOARD_ROUTE, DEFAULT_TIMEOUT, HEARTBEAT_INTERVAL, MAX_RECONNECT_ATTEMPTS,
    RECONNECT_DELAY, Result, SIGN_IN_ROUTE, SessionError, UNREAD_POLL_INTERVAL,
};
use std::str::FromStr;
use std::time::Duration;

const REQUEST_TIMEOUT_ENV: &str = "STRADING_REQUEST_TIMEOUT_SECS";
const UNREAD_POLL_ENV: &str = "STRADING_UNREAD_POLL_SECS";
const RECONNECT_DELAY_ENV: &str = "STRADING_RECONNECT_DELAY_MS";
const MAX_RECONNECT_ENV: &str = "STRADING_MAX_RECONNECT_ATTEMPTS";
const HEARTBEAT_ENV: &str = "STRADING_HEARTBEAT_SECS";

/// Settings for a [`SessionClient`](crate::SessionClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST base URL, e.g. `https://host/api`
    pub api_url: String,
    pub request_timeout: Duration,
    pub unread_poll_interval: Duration,
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
    /// `None` disables WebSocket heartbeats
    pub heartbeat_interval: Option<Duration>,
    pub sign_in_route: String,
    pub dashboard_route: String,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT),
            unread_poll_interval: Duration::from_millis(UNREAD_POLL_INTERVAL),
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY),
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            heartbeat_interval: Some(Duration::from_millis(HEARTBEAT_INTERVAL)),
            sign_in_route: SIGN_IN_ROUTE.to_string(),
            dashboard_route: DASHBOARD_ROUTE.to_string(),
        }
    }

    /// Read `NEXT_PUBLIC_API_URL` and the optional `STRADING_*` overrides.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_url = lookup(API_URL_ENV)
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| SessionError::Config(format!("{} is not set", API_URL_ENV)))?;

        let mut config = Self::new(api_url.trim());

        if let Some(secs) = parse_var::<u64>(&lookup, REQUEST_TIMEOUT_ENV)? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, UNREAD_POLL_ENV)? {
            config.unread_poll_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, RECONNECT_DELAY_ENV)? {
            config.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(attempts) = parse_var::<u32>(&lookup, MAX_RECONNECT_ENV)? {
            config.max_reconnect_attempts = attempts;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, HEARTBEAT_ENV)? {
            config.heartbeat_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_unread_poll_interval(mut self, interval: Duration) -> Self {
        self.unread_poll_interval = interval;
        self
    }

    pub fn with_reconnect(mut self, delay: Duration, max_attempts: u32) -> Self {
        self.reconnect_delay = delay;
        self.max_reconnect_attempts = max_attempts;
        self
    }

    pub fn with_heartbeat(mut self, interval: Option<Duration>) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_routes(mut self, sign_in: impl Into<String>, dashboard: impl Into<String>) -> Self {
        self.sign_in_route = sign_in.into();
        self.dashboard_route = dashboard.into();
        self
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| SessionError::Config(format!("invalid {} '{}': {}", key, raw, e))),
    }
}
