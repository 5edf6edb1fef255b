//! Persistence of remembered values.
//!
//! Stories only need a small key-value store with expiry, scoped by a key
//! prefix. [`CookieJar`] is the in-memory implementation; it can be saved
//! to and loaded from a JSON file so remembered values outlive a process.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::fs;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Key-value storage with expiry, as the story needs it.
pub trait PersistenceStore: Send {
    /// Store `value` under `key` until `expires`.
    fn set(&mut self, key: &str, value: &str, expires: SystemTime);

    /// Every unexpired (key, value) whose key starts with `prefix`.
    fn get_all(&self, prefix: &str) -> Vec<(String, String)>;
}

/// Current cookie file version.
const SAVE_VERSION: u32 = 1;

/// One stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub value: String,
    /// Seconds since the Unix epoch.
    pub expires_at: u64,
}

impl Cookie {
    fn is_live(&self, now: SystemTime) -> bool {
        self.expires_at > unix_seconds(now)
    }
}

/// In-memory cookie storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieJar {
    cookies: BTreeMap<String, Cookie>,
}

/// On-disk form of a [`CookieJar`].
#[derive(Debug, Serialize, Deserialize)]
struct SavedCookies {
    version: u32,
    cookies: BTreeMap<String, Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored cookies, expired or not.
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// An unexpired value.
    pub fn get(&self, key: &str) -> Option<&str> {
        let now = SystemTime::now();
        self.cookies
            .get(key)
            .filter(|c| c.is_live(now))
            .map(|c| c.value.as_str())
    }

    pub fn cookie(&self, key: &str) -> Option<&Cookie> {
        self.cookies.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Cookie> {
        self.cookies.remove(key)
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    /// Drop cookies that expired before `now`.
    pub fn purge_expired(&mut self, now: SystemTime) -> usize {
        let before = self.cookies.len();
        self.cookies.retain(|_, c| c.is_live(now));
        before - self.cookies.len()
    }

    /// Save to a JSON file. Expired cookies are left out.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let now = SystemTime::now();
        let saved = SavedCookies {
            version: SAVE_VERSION,
            cookies: self
                .cookies
                .iter()
                .filter(|(_, c)| c.is_live(now))
                .map(|(k, c)| (k.clone(), c.clone()))
                .collect(),
        };
        let content = serde_json::to_string_pretty(&saved)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        let saved: SavedCookies = serde_json::from_str(&content)?;

        if saved.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: saved.version,
            });
        }

        Ok(Self {
            cookies: saved.cookies,
        })
    }
}

impl PersistenceStore for CookieJar {
    fn set(&mut self, key: &str, value: &str, expires: SystemTime) {
        self.cookies.insert(
            key.to_string(),
            Cookie {
                value: value.to_string(),
                expires_at: unix_seconds(expires),
            },
        );
    }

    fn get_all(&self, prefix: &str) -> Vec<(String, String)> {
        let now = SystemTime::now();
        self.cookies
            .iter()
            .filter(|(k, c)| k.starts_with(prefix) && c.is_live(now))
            .map(|(k, c)| (k.clone(), c.value.clone()))
            .collect()
    }
}

fn unix_seconds(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}
