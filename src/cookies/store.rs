use crate::base::neterror::NetError;
use crate::cookies::canonical_cookie::CanonicalCookie;
use crate::cookies::persistence::CookiePersistence;
use dashmap::DashMap;
use http::HeaderMap;
use parking_lot::RwLock;
use std::sync::Arc;
use time::OffsetDateTime;
use url::Url;

/// Maximum cookies per domain (Chromium default).
const MAX_COOKIES_PER_DOMAIN: usize = 50;

/// Decides per cookie whether it may be stored or sent for a URL.
pub type CookieFilter = Arc<dyn Fn(&CanonicalCookie, &Url) -> bool + Send + Sync>;

/// Shared cookie jar used by every request task.
///
/// Cookies are bucketed by domain. Each bucket is replaced under its shard
/// lock, so a concurrent reader sees a bucket either before or after a
/// write and never a half-updated record.
pub struct CookieStore {
    // Map<Domain, List<Cookie>>
    store: DashMap<String, Vec<CanonicalCookie>>,
    filter: RwLock<Option<CookieFilter>>,
}

impl Default for CookieStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CookieStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieStore")
            .field("domains", &self.store.len())
            .field("has_filter", &self.filter.read().is_some())
            .finish()
    }
}

impl CookieStore {
    pub fn new() -> Self {
        Self {
            store: DashMap::new(),
            filter: RwLock::new(None),
        }
    }

    /// Install a predicate consulted before storing and before sending each
    /// cookie. Returning `false` drops that cookie from that operation only.
    pub fn set_filter<F>(&self, filter: F)
    where
        F: Fn(&CanonicalCookie, &Url) -> bool + Send + Sync + 'static,
    {
        *self.filter.write() = Some(Arc::new(filter));
    }

    pub fn clear_filter(&self) {
        *self.filter.write() = None;
    }

    fn allowed(&self, cookie: &CanonicalCookie, url: &Url) -> bool {
        // Clone the Arc out so the predicate runs without holding the lock.
        let filter = self.filter.read().clone();
        filter.map_or(true, |f| f(cookie, url))
    }

    /// Parse every `Set-Cookie` header in `headers` as received from `url`
    /// and store the acceptable ones. Returns the cookies that were stored.
    pub fn record_set_cookies(&self, headers: &HeaderMap, url: &Url) -> Vec<CanonicalCookie> {
        let mut stored = Vec::new();
        for value in headers.get_all(http::header::SET_COOKIE) {
            let Ok(line) = value.to_str() else {
                tracing::warn!(url = %url, "dropping non-ASCII Set-Cookie header");
                continue;
            };
            match self.parse_and_save_cookie(url, line) {
                Some(cookie) => stored.push(cookie),
                None => tracing::debug!(url = %url, line, "Set-Cookie dropped"),
            }
        }
        stored
    }

    /// Parse and store one `Set-Cookie` line. Returns the stored cookie.
    pub fn parse_and_save_cookie(&self, url: &Url, cookie_line: &str) -> Option<CanonicalCookie> {
        let cookie = CanonicalCookie::from_set_cookie(cookie_line, url)?;
        if !self.allowed(&cookie, url) {
            return None;
        }
        self.set_canonical_cookie(cookie.clone());
        Some(cookie)
    }

    /// Insert a cookie, replacing any with the same name and path in its
    /// domain bucket.
    pub fn set_canonical_cookie(&self, cookie: CanonicalCookie) {
        let mut entry = self.store.entry(cookie.domain.clone()).or_default();

        entry.retain(|c| c.name != cookie.name || c.path != cookie.path);

        // Enforce the per-domain limit by evicting the oldest-created cookie
        while entry.len() >= MAX_COOKIES_PER_DOMAIN {
            let oldest = entry
                .iter()
                .enumerate()
                .min_by_key(|(_, c)| c.creation_time)
                .map(|(i, _)| i);
            match oldest {
                Some(idx) => {
                    entry.remove(idx);
                }
                None => break,
            }
        }

        entry.push(cookie);
    }

    /// Cookies applicable to `url`, longest path first, then oldest first.
    pub fn cookies_for(&self, url: &Url) -> Vec<CanonicalCookie> {
        let Some(host) = url.host_str() else {
            return Vec::new();
        };
        let host = host.to_ascii_lowercase();
        let now = OffsetDateTime::now_utc();
        let secure_scheme = url.scheme() == "https";

        let mut result = Vec::new();
        let mut saw_expired = Vec::new();

        for domain in Self::candidate_domains(&host) {
            let Some(entry) = self.store.get(&domain) else {
                continue;
            };
            for cookie in entry.iter() {
                if cookie.is_expired(now) {
                    saw_expired.push(domain.clone());
                    continue;
                }
                if !cookie.domain_matches(&host) || !cookie.path_matches(url.path()) {
                    continue;
                }
                if cookie.secure && !secure_scheme {
                    continue;
                }
                result.push(cookie.clone());
            }
        }

        // Lazy eviction, after all read guards are released.
        for domain in saw_expired {
            self.evict_expired_in(&domain, now);
        }

        result.retain(|c| self.allowed(c, url));

        result.sort_by(|a, b| {
            b.path
                .len()
                .cmp(&a.path.len())
                .then_with(|| a.creation_time.cmp(&b.creation_time))
        });

        result
    }

    /// Render the `Cookie` request header value for `url`; empty when no
    /// cookie applies.
    pub fn cookie_header_for(&self, url: &Url) -> String {
        self.cookies_for(url)
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// The host itself and each parent domain, e.g. `a.b.example.com`,
    /// `b.example.com`, `example.com`, `com`.
    fn candidate_domains(host: &str) -> Vec<String> {
        let mut domains = vec![host.to_string()];
        let mut rest = host;
        while let Some((_, parent)) = rest.split_once('.') {
            if parent.is_empty() {
                break;
            }
            domains.push(parent.to_string());
            rest = parent;
        }
        domains
    }

    fn evict_expired_in(&self, domain: &str, now: OffsetDateTime) {
        if let Some(mut entry) = self.store.get_mut(domain) {
            entry.retain(|c| !c.is_expired(now));
        }
        self.store.remove_if(domain, |_, cookies| cookies.is_empty());
    }

    /// Drop every expired cookie. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let mut removed = 0;
        for mut entry in self.store.iter_mut() {
            let before = entry.len();
            entry.retain(|c| !c.is_expired(now));
            removed += before - entry.len();
        }
        self.store.retain(|_, cookies| !cookies.is_empty());
        removed
    }

    /// Remove all cookies stored under exactly `domain`.
    pub fn remove_domain(&self, domain: &str) -> usize {
        self.store
            .remove(&domain.trim_start_matches('.').to_ascii_lowercase())
            .map(|(_, cookies)| cookies.len())
            .unwrap_or(0)
    }

    pub fn total_cookie_count(&self) -> usize {
        self.store.iter().map(|e| e.value().len()).sum()
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    /// Snapshot of every stored cookie.
    pub fn all_cookies(&self) -> Vec<CanonicalCookie> {
        self.store
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect()
    }

    /// Load unexpired cookies from a persistence collaborator.
    pub fn load_from(&self, persistence: &dyn CookiePersistence) -> Result<usize, NetError> {
        let now = OffsetDateTime::now_utc();
        let mut count = 0;
        for cookie in persistence.load()? {
            if cookie.is_expired(now) {
                continue;
            }
            self.set_canonical_cookie(cookie);
            count += 1;
        }
        Ok(count)
    }

    /// Write every unexpired cookie to a persistence collaborator.
    pub fn save_to(&self, persistence: &dyn CookiePersistence) -> Result<(), NetError> {
        let now = OffsetDateTime::now_utc();
        let cookies: Vec<_> = self
            .all_cookies()
            .into_iter()
            .filter(|c| !c.is_expired(now))
            .collect();
        persistence.save(&cookies)
    }
}
