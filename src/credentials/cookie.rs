use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::types::COOKIE_MAX_AGE_SECS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

/// Attributes written alongside every cookie value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieAttributes {
    pub path: String,
    pub max_age: Duration,
    pub same_site: SameSite,
    pub secure: bool,
}

impl CookieAttributes {
    /// Render as the attribute tail of a `Set-Cookie` header.
    pub fn to_header_suffix(&self) -> String {
        let mut suffix = format!(
            "Path={}; Max-Age={}; SameSite={}",
            self.path,
            self.max_age.as_secs(),
            self.same_site.as_str()
        );
        if self.secure {
            suffix.push_str("; Secure");
        }
        suffix
    }
}

impl Default for CookieAttributes {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            max_age: Duration::from_secs(COOKIE_MAX_AGE_SECS),
            same_site: SameSite::Strict,
            secure: false,
        }
    }
}

/// Storage medium for credential cookies.
///
/// Values handed to and returned from a jar are already cookie-encoded.
pub trait CookieJar: Send + Sync {
    /// Current value, or `None` when missing or expired.
    fn get(&self, name: &str) -> Option<String>;

    fn set(&self, name: &str, value: &str, attributes: &CookieAttributes);

    fn remove(&self, name: &str, path: &str);
}

#[derive(Debug, Clone)]
struct StoredCookie {
    value: String,
    attributes: CookieAttributes,
    expires_at: Instant,
}

/// Process-local cookie jar that enforces `Max-Age`.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    cookies: Mutex<HashMap<String, StoredCookie>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attributes the named cookie was last written with.
    pub fn attributes(&self, name: &str) -> Option<CookieAttributes> {
        self.lock().get(name).map(|cookie| cookie.attributes.clone())
    }

    /// `Set-Cookie` header for the named cookie, for handing to a browser.
    pub fn set_cookie_header(&self, name: &str) -> Option<String> {
        self.lock().get(name).map(|cookie| {
            format!(
                "{}={}; {}",
                name,
                cookie.value,
                cookie.attributes.to_header_suffix()
            )
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredCookie>> {
        self.cookies.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CookieJar for MemoryCookieJar {
    fn get(&self, name: &str) -> Option<String> {
        let mut cookies = self.lock();
        match cookies.get(name) {
            Some(cookie) if cookie.expires_at > Instant::now() => Some(cookie.value.clone()),
            Some(_) => {
                tracing::debug!("Cookie '{}' expired, evicting", name);
                cookies.remove(name);
                None
            }
            None => None,
        }
    }

    fn set(&self, name: &str, value: &str, attributes: &CookieAttributes) {
        let cookie = StoredCookie {
            value: value.to_string(),
            attributes: attributes.clone(),
            expires_at: Instant::now() + attributes.max_age,
        };
        self.lock().insert(name.to_string(), cookie);
    }

    fn remove(&self, name: &str, path: &str) {
        let mut cookies = self.lock();
        if cookies
            .get(name)
            .is_some_and(|cookie| cookie.attributes.path == path)
        {
            cookies.remove(name);
        }
    }
}
