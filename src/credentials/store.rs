use super::cookie::{CookieAttributes, CookieJar};
use crate::auth::{TokenPair, UserProfile};
use crate::types::{AUTH_TOKENS_COOKIE, Result, USER_DATA_COOKIE};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Persists the token pair and user profile as JSON cookies.
///
/// Reads never fail: a missing, expired or malformed cookie is reported as
/// `None`. No network side effects.
pub struct CredentialStore {
    jar: Arc<dyn CookieJar>,
    attributes: CookieAttributes,
}

impl CredentialStore {
    pub fn new(jar: Arc<dyn CookieJar>) -> Self {
        Self::with_attributes(jar, CookieAttributes::default())
    }

    pub fn with_attributes(jar: Arc<dyn CookieJar>, attributes: CookieAttributes) -> Self {
        Self { jar, attributes }
    }

    pub fn set_token_data(&self, tokens: &TokenPair) -> Result<()> {
        self.write(AUTH_TOKENS_COOKIE, tokens)
    }

    pub fn get_token_data(&self) -> Option<TokenPair> {
        self.read::<TokenPair>(AUTH_TOKENS_COOKIE)
            .filter(TokenPair::is_usable)
    }

    pub fn set_user_data(&self, user: &UserProfile) -> Result<()> {
        self.write(USER_DATA_COOKIE, user)
    }

    pub fn get_user_data(&self) -> Option<UserProfile> {
        self.read(USER_DATA_COOKIE)
    }

    pub fn clear_auth_data(&self) {
        self.jar.remove(AUTH_TOKENS_COOKIE, &self.attributes.path);
        self.jar.remove(USER_DATA_COOKIE, &self.attributes.path);
        tracing::debug!("Cleared stored credentials");
    }

    pub fn access_token(&self) -> Option<String> {
        self.get_token_data().map(|tokens| tokens.access_token)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.get_token_data().map(|tokens| tokens.refresh_token)
    }

    pub fn has_refresh_token(&self) -> bool {
        self.get_token_data().is_some()
    }

    fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let encoded = urlencoding::encode(&json);
        self.jar.set(name, &encoded, &self.attributes);
        Ok(())
    }

    fn read<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let raw = self.jar.get(name)?;
        let decoded = match urlencoding::decode(&raw) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!("Cookie '{}' is not valid percent-encoding: {}", name, e);
                return None;
            }
        };
        match serde_json::from_str(&decoded) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Cookie '{}' holds malformed JSON: {}", name, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserId;
    use crate::credentials::{MemoryCookieJar, SameSite};

    fn store() -> (Arc<MemoryCookieJar>, CredentialStore) {
        let jar = Arc::new(MemoryCookieJar::new());
        let store = CredentialStore::new(jar.clone());
        (jar, store)
    }

    fn profile() -> UserProfile {
        UserProfile {
            id: UserId::from("7"),
            email: "demo@strading.com".to_string(),
            first_name: "Demo".to_string(),
            last_name: "Trader".to_string(),
            client_user_id: None,
            role: Some("client".to_string()),
        }
    }

    #[test]
    fn test_token_round_trip() {
        let (_, store) = store();
        let tokens = TokenPair::new("access.jwt", "refresh.jwt");

        store.set_token_data(&tokens).unwrap();

        assert_eq!(store.get_token_data(), Some(tokens));
        assert_eq!(store.access_token().as_deref(), Some("access.jwt"));
        assert_eq!(store.refresh_token().as_deref(), Some("refresh.jwt"));
    }

    #[test]
    fn test_token_cookie_is_encoded_json_with_strict_attributes() {
        let (jar, store) = store();
        store.set_token_data(&TokenPair::new("a b", "r;x")).unwrap();

        let raw = jar.get(AUTH_TOKENS_COOKIE).unwrap();
        assert!(!raw.contains(' '));
        assert!(!raw.contains(';'));

        let attributes = jar.attributes(AUTH_TOKENS_COOKIE).unwrap();
        assert_eq!(attributes.path, "/");
        assert_eq!(attributes.same_site, SameSite::Strict);
        assert_eq!(attributes.max_age.as_secs(), 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_malformed_cookie_reads_as_absent() {
        let (jar, store) = store();
        for garbage in ["not json", "%7Bbroken", "%E0%A4%A", "{\"accessToken\":1}", ""] {
            jar.set(AUTH_TOKENS_COOKIE, garbage, &CookieAttributes::default());
            assert_eq!(store.get_token_data(), None, "garbage: {garbage:?}");
        }
    }

    #[test]
    fn test_empty_tokens_read_as_absent() {
        let (_, store) = store();
        store.set_token_data(&TokenPair::new("", "refresh")).unwrap();
        assert_eq!(store.get_token_data(), None);
        assert!(!store.has_refresh_token());
    }

    #[test]
    fn test_user_round_trip_and_clear() {
        let (_, store) = store();
        store.set_user_data(&profile()).unwrap();
        store.set_token_data(&TokenPair::new("a", "r")).unwrap();

        assert_eq!(store.get_user_data(), Some(profile()));

        store.clear_auth_data();
        assert_eq!(store.get_user_data(), None);
        assert_eq!(store.get_token_data(), None);
    }
}
