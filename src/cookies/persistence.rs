//! Cookie persistence collaborators.
//!
//! The store itself lives only for the process; a [`CookiePersistence`]
//! implementation is how cookies survive across runs. [`JsonFilePersistence`]
//! keeps them in a JSON file.

use crate::base::neterror::NetError;
use crate::cookies::canonical_cookie::CanonicalCookie;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// Loads and saves a cookie snapshot.
pub trait CookiePersistence: Send + Sync {
    fn load(&self) -> Result<Vec<CanonicalCookie>, NetError>;
    fn save(&self, cookies: &[CanonicalCookie]) -> Result<(), NetError>;
}

/// Serializable representation of a cookie for persistence.
#[derive(Serialize, Deserialize, Debug, Clone)]
struct PersistentCookie {
    name: String,
    value: String,
    domain: String,
    path: String,
    secure: bool,
    http_only: bool,
    host_only: bool,
    created_unix_secs: i64,
    expires_unix_secs: Option<i64>,
}

impl From<&CanonicalCookie> for PersistentCookie {
    fn from(cookie: &CanonicalCookie) -> Self {
        Self {
            name: cookie.name.clone(),
            value: cookie.value.clone(),
            domain: cookie.domain.clone(),
            path: cookie.path.clone(),
            secure: cookie.secure,
            http_only: cookie.http_only,
            host_only: cookie.host_only,
            created_unix_secs: cookie.creation_time.unix_timestamp(),
            expires_unix_secs: cookie.expiration_time.map(|t| t.unix_timestamp()),
        }
    }
}

impl PersistentCookie {
    fn into_cookie(self) -> CanonicalCookie {
        let creation_time = OffsetDateTime::from_unix_timestamp(self.created_unix_secs)
            .unwrap_or_else(|_| OffsetDateTime::now_utc());
        CanonicalCookie {
            name: self.name,
            value: self.value,
            domain: self.domain,
            path: self.path,
            creation_time,
            expiration_time: self
                .expires_unix_secs
                .and_then(|s| OffsetDateTime::from_unix_timestamp(s).ok()),
            secure: self.secure,
            http_only: self.http_only,
            host_only: self.host_only,
        }
    }
}

/// Stores cookies as pretty-printed JSON at a fixed path.
///
/// A missing file loads as an empty jar.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CookiePersistence for JsonFilePersistence {
    fn load(&self) -> Result<Vec<CanonicalCookie>, NetError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(NetError::config(format!("{}: {}", self.path.display(), e))),
        };

        let persisted: Vec<PersistentCookie> = serde_json::from_str(&json)
            .map_err(|e| NetError::config(format!("{}: {}", self.path.display(), e)))?;

        Ok(persisted.into_iter().map(PersistentCookie::into_cookie).collect())
    }

    fn save(&self, cookies: &[CanonicalCookie]) -> Result<(), NetError> {
        let persisted: Vec<PersistentCookie> = cookies.iter().map(PersistentCookie::from).collect();
        let json = serde_json::to_string_pretty(&persisted)
            .map_err(|e| NetError::config(e.to_string()))?;

        fs::write(&self.path, json)
            .map_err(|e| NetError::config(format!("{}: {}", self.path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::store::CookieStore;
    use tempfile::tempdir;

    #[test]
    fn test_save_load_roundtrip() {
        let store = CookieStore::new();
        let mut cookie = CanonicalCookie::new("session", "abc123", "example.com", "/");
        cookie.secure = true;
        cookie.http_only = true;
        cookie.host_only = false;
        store.set_canonical_cookie(cookie);

        let dir = tempdir().unwrap();
        let persistence = JsonFilePersistence::new(dir.path().join("cookies.json"));
        store.save_to(&persistence).unwrap();

        let loaded = CookieStore::new();
        assert_eq!(loaded.load_from(&persistence).unwrap(), 1);

        let url = url::Url::parse("https://www.example.com/").unwrap();
        let cookies = loaded.cookies_for(&url);
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name, "session");
        assert_eq!(cookies[0].value, "abc123");
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let persistence = JsonFilePersistence::new(dir.path().join("absent.json"));
        assert!(persistence.load().unwrap().is_empty());
    }

    #[test]
    fn test_expired_not_loaded() {
        let dir = tempdir().unwrap();
        let persistence = JsonFilePersistence::new(dir.path().join("cookies.json"));
        let mut stale = CanonicalCookie::new("stale", "1", "example.com", "/");
        stale.expiration_time = Some(OffsetDateTime::now_utc() - time::Duration::days(1));
        persistence.save(&[stale]).unwrap();

        let store = CookieStore::new();
        assert_eq!(store.load_from(&persistence).unwrap(), 0);
    }
}
