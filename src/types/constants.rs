/// Realtime event strings (magic strings layer)
pub mod realtime_events {
    // Consumed
    pub const NOTIFICATION: &str = "notification";
    pub const UNREAD_COUNT_UPDATE: &str = "unread_count_update";
    pub const NEW_MESSAGE: &str = "newMessage";
    pub const CONVERSATION_UPDATE: &str = "conversationUpdate";
    pub const UNREAD_COUNT: &str = "unreadCount";
    pub const MESSAGE_SENT: &str = "messageSent";
    pub const MESSAGE_ERROR: &str = "messageError";
    pub const MESSAGE_MARKED_AS_READ: &str = "messageMarkedAsRead";
    pub const AUTHENTICATED: &str = "authenticated";

    // Emitted
    pub const SUBSCRIBE: &str = "subscribe";
    pub const AUTHENTICATE: &str = "authenticate";
    pub const SEND_MESSAGE: &str = "sendMessage";
    pub const MARK_AS_READ: &str = "markAsRead";
    pub const JOIN_CONVERSATION: &str = "joinConversation";
    pub const LEAVE_CONVERSATION: &str = "leaveConversation";
}

/// REST endpoints, relative to the API base URL
pub mod endpoints {
    pub const LOGIN: &str = "/auth/login";
    pub const SIGNUP: &str = "/auth/signup";
    pub const REFRESH: &str = "/auth/refresh";
    pub const LOGOUT: &str = "/auth/logout";
    pub const PROFILE: &str = "/auth/profile";
    pub const NOTIFICATIONS_UNREAD_COUNT: &str = "/notifications/unread-count";
    pub const MESSAGES_UNREAD_COUNT: &str = "/messages/unread-count";
}

/// Realtime namespaces
pub const NOTIFICATIONS_NAMESPACE: &str = "/notifications";
pub const MESSAGES_NAMESPACE: &str = "/messages";

/// Cookie names
pub const USER_DATA_COOKIE: &str = "user_data";
pub const AUTH_TOKENS_COOKIE: &str = "auth_tokens";

/// Cookie lifetime (seconds)
pub const COOKIE_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;

/// Environment variable holding the REST base URL
pub const API_URL_ENV: &str = "NEXT_PUBLIC_API_URL";

/// Navigation targets
pub const SIGN_IN_ROUTE: &str = "/sign-in";
pub const DASHBOARD_ROUTE: &str = "/dashboard";

/// Default HTTP request timeout (milliseconds)
pub const DEFAULT_TIMEOUT: u64 = 10000;

/// Default heartbeat interval (milliseconds)
pub const HEARTBEAT_INTERVAL: u64 = 25000;

/// Base reconnect delay, multiplied by the attempt number (milliseconds)
pub const RECONNECT_DELAY: u64 = 1000;

/// A socket open at least this long resets the reconnect counter when it drops (milliseconds)
pub const STABLE_CONNECTION: u64 = 10000;

/// Reconnect attempts before the channel gives up
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Fallback unread-count poll interval (milliseconds)
pub const UNREAD_POLL_INTERVAL: u64 = 30000;
