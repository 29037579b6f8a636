//! Cached Spacelift bearer credential

use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

/// How long an exchanged token is reused. Spacelift tokens live for an hour;
/// we stop handing one out well before that.
pub const DEFAULT_TOKEN_VALIDITY: Duration = Duration::from_secs(50 * 60);

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Process-wide slot for the current bearer token.
///
/// The guard is only held long enough to copy the token in or out, never
/// across a credential exchange. Callers that find the slot empty or expired at
/// the same moment will each run their own exchange and the last write wins.
/// Every token written is independently valid, so the race costs a redundant
/// round trip and nothing else.
#[derive(Debug)]
pub struct TokenCache {
    slot: RwLock<Option<CachedToken>>,
    validity: Duration,
}

impl TokenCache {
    pub fn new(validity: Duration) -> Self {
        Self {
            slot: RwLock::new(None),
            validity,
        }
    }

    /// Token to reuse, if one is cached and not yet expired
    pub fn get(&self) -> Option<String> {
        self.get_at(Instant::now())
    }

    pub fn get_at(&self, now: Instant) -> Option<String> {
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref()
            .filter(|cached| now < cached.expires_at)
            .map(|cached| cached.value.clone())
    }

    /// Store a freshly exchanged token, replacing whatever was cached
    pub fn set(&self, token: String) {
        self.set_at(token, Instant::now());
    }

    pub fn set_at(&self, token: String, acquired_at: Instant) {
        let cached = CachedToken {
            value: token,
            expires_at: acquired_at + self.validity,
        };
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(cached);
    }

    pub fn expiry(&self) -> Option<Instant> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|cached| cached.expires_at)
    }

    pub fn clear(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_VALIDITY)
    }
}
