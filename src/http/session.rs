//! Session cookie store
//!
//! Wraps a [`CookieStoreMutex`] that is also installed as the HTTP client's
//! cookie provider, so `Set-Cookie` headers from the server land in the same
//! jar that seeding writes to. The session token is the `sessionid` cookie.

use chrono::{Duration as ChronoDuration, Utc};
use reqwest_cookie_store::{CookieStore, CookieStoreMutex};
use std::sync::{Arc, MutexGuard, PoisonError};
use tracing::{debug, warn};
use url::Url;

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "sessionid";

/// Reserved language cookie, always forced to [`LANGUAGE_VALUE`].
pub const LANGUAGE_COOKIE: &str = "Steam_Language";

/// Value of the reserved language cookie.
pub const LANGUAGE_VALUE: &str = "english";

/// Years until seeded cookies expire.
const SEEDED_COOKIE_YEARS: i64 = 1000;

/// Cookie jar plus the URL its cookies are scoped to.
#[derive(Debug, Clone)]
pub struct SessionStore {
    url: Url,
    jar: Arc<CookieStoreMutex>,
}

impl SessionStore {
    /// Fresh session for `url` holding only the language cookie.
    pub fn new(url: Url) -> Self {
        let store = Self {
            url,
            jar: Arc::new(CookieStoreMutex::new(CookieStore::default())),
        };
        store.force_language();
        store
    }

    /// Fresh session seeded from a `name=value; name=value` header string.
    pub fn seeded(url: Url, cookie_header: &str) -> Self {
        let store = Self::new(url);
        store.seed(cookie_header);
        store
    }

    /// Add every `name=value` segment of `cookie_header` to the jar.
    ///
    /// Segments without `=` are dropped, and the language cookie in the input
    /// is ignored in favour of the fixed one.
    pub fn seed(&self, cookie_header: &str) {
        let mut added = 0usize;
        {
            let mut jar = self.lock();
            for segment in cookie_header.split("; ") {
                let segment = segment.trim();
                if segment.is_empty() {
                    continue;
                }
                let Some((name, value)) = segment.split_once('=') else {
                    debug!(segment = %segment, "Dropping cookie segment without '='");
                    continue;
                };
                if name == LANGUAGE_COOKIE {
                    continue;
                }
                if insert(&mut jar, &self.url, name, value) {
                    added += 1;
                }
            }
        }
        self.force_language();
        debug!(cookies = added, "Session seeded");
    }

    /// Value of a live cookie by name.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.lock()
            .iter_unexpired()
            .find(|cookie| cookie.name() == name)
            .map(|cookie| cookie.value().to_string())
    }

    /// Session token, `None` until the server or the seed provides one.
    pub fn session_token(&self) -> Option<String> {
        self.cookie(SESSION_COOKIE).filter(|token| !token.is_empty())
    }

    /// All live cookies as `name=value; ` pairs.
    pub fn current_cookie_header(&self) -> String {
        self.lock()
            .iter_unexpired()
            .map(|cookie| format!("{}={}; ", cookie.name(), cookie.value()))
            .collect()
    }

    /// Number of live cookies.
    pub fn len(&self) -> usize {
        self.lock().iter_unexpired().count()
    }

    /// Whether the jar holds no live cookies.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// URL the cookies are scoped to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Jar handle for the HTTP client's cookie provider.
    pub(crate) fn provider(&self) -> Arc<CookieStoreMutex> {
        Arc::clone(&self.jar)
    }

    fn force_language(&self) {
        let mut jar = self.lock();
        insert(&mut jar, &self.url, LANGUAGE_COOKIE, LANGUAGE_VALUE);
    }

    fn lock(&self) -> MutexGuard<'_, CookieStore> {
        self.jar.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn insert(jar: &mut CookieStore, url: &Url, name: &str, value: &str) -> bool {
    let expires = (Utc::now() + ChronoDuration::days(365 * SEEDED_COOKIE_YEARS))
        .format("%a, %d %b %Y %H:%M:%S GMT");
    let raw = format!("{name}={value}; Path=/; Expires={expires}");
    match jar.parse(&raw, url) {
        Ok(_) => true,
        Err(e) => {
            warn!(cookie = %name, error = %e, "Rejected cookie");
            false
        }
    }
}
