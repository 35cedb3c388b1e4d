// Auth module - token models, single-flight refresh, auth endpoints
mod models;
mod refresh;
mod service;

pub use models::{
    AuthResponse, AuthSession, LoginRequest, RefreshRequest, SignupRequest, TokenPair, UserId,
    UserProfile,
};
pub use refresh::{RefreshCoordinator, RefreshFailure, RefreshOutcome};
pub use service::AuthService;
