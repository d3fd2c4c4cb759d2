use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Statuses the host classifies as "ok".
pub const OK_STATUS: RangeInclusive<u16> = 200..=299;

// ── Stores ──────────────────────────────────────────────────────

/// Versioned name of one durable key-value store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreIdentity(String);

impl StoreIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Requests and responses ──────────────────────────────────────

/// The `(method, url)` pair a cache entry is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestIdentity {
    pub method: String,
    pub url: String,
}

impl RequestIdentity {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url: url.into(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Whether a response to this request may be written to a store.
    ///
    /// The host store only accepts `GET` requests over http(s); relative
    /// URLs resolve against the agent's own origin and are accepted too.
    pub fn is_cacheable(&self) -> bool {
        if self.method != "GET" {
            return false;
        }
        match url_scheme(&self.url) {
            Some(scheme) => {
                scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
            }
            None => true,
        }
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

fn url_scheme(url: &str) -> Option<&str> {
    let (scheme, _) = url.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    let valid = first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}

/// Immutable copy of a response taken at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Vec<u8>,
}

impl ResponseSnapshot {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub request: RequestIdentity,
    pub response: ResponseSnapshot,
}

// ── Lifecycle ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Installing,
    Activating,
    Active,
}

impl LifecyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installing => "installing",
            Self::Activating => "activating",
            Self::Active => "active",
        }
    }

    /// Phases only move forward: installing → activating → active.
    pub fn can_advance_to(self, next: LifecyclePhase) -> bool {
        matches!(
            (self, next),
            (Self::Installing, Self::Activating) | (Self::Activating, Self::Active)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub store: StoreIdentity,
    pub cached: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub kept: StoreIdentity,
    pub deleted: Vec<StoreIdentity>,
    pub failed: Vec<StoreIdentity>,
    pub navigation_preload: bool,
}

impl ActivationReport {
    pub fn new(kept: StoreIdentity) -> Self {
        Self {
            kept,
            deleted: Vec::new(),
            failed: Vec::new(),
            navigation_preload: false,
        }
    }
}
