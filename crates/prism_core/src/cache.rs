//! TTL-bounded cache value carried by reports and widgets.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::record::Value;

/// Cached payload of a cache-bearing entity
///
/// The only invalidation is TTL expiry: a payload is valid while
/// `now < cached_at + ttl_minutes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheState {
    /// Last materialized payload
    #[serde(default)]
    pub payload: Option<Value>,
    /// When the payload was written
    #[serde(default)]
    pub cached_at: Option<DateTime<Utc>>,
    /// Time-to-live in minutes
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u32,
}

fn default_ttl_minutes() -> u32 {
    60
}

impl CacheState {
    /// Empty cache with the given TTL
    #[must_use]
    pub fn new(ttl_minutes: u32) -> Self {
        Self {
            payload: None,
            cached_at: None,
            ttl_minutes,
        }
    }

    /// When the current payload stops being valid
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.cached_at
            .map(|at| at + Duration::minutes(i64::from(self.ttl_minutes)))
    }

    /// Whether the cached payload may be served at `now`
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        if self.payload.is_none() {
            return false;
        }
        match self.expires_at() {
            Some(expires_at) => now < expires_at,
            None => false,
        }
    }

    /// Replace the payload and restart the TTL window
    pub fn store(&mut self, payload: Value, now: DateTime<Utc>) {
        self.payload = Some(payload);
        self.cached_at = Some(now);
    }

    /// The payload if it is still valid at `now`
    #[must_use]
    pub fn fresh_payload(&self, now: DateTime<Utc>) -> Option<&Value> {
        if self.is_valid(now) {
            self.payload.as_ref()
        } else {
            None
        }
    }
}

impl Default for CacheState {
    fn default() -> Self {
        Self::new(default_ttl_minutes())
    }
}
