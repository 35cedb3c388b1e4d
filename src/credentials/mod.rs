// Credentials module - cookie-backed token and profile storage
mod cookie;
mod store;

pub use cookie::{CookieAttributes, CookieJar, MemoryCookieJar, SameSite};
pub use store::CredentialStore;
