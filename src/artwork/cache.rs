//! Artwork memoization and the upstream rate-limit gate.
//!
//! Both are process-wide shared state passed around as explicit `Arc`
//! handles. The resolver is the only writer; the poller and queue
//! enricher read through it.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Lowercase and collapse interior whitespace.
pub fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalized (artist, album) cache key. Never keyed on artist alone - an
/// artist-only key previously put the wrong album's cover on screen.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    artist: String,
    album: String,
}

impl CacheKey {
    pub fn new(artist: &str, album: &str) -> Self {
        Self {
            artist: normalize(artist),
            album: normalize(album),
        }
    }
}

/// One resolved lookup. `url: None` is the explicit no-match sentinel,
/// cached with equal weight to a hit so a miss is not retried every cycle;
/// it is only re-attempted after restart or explicit invalidation.
#[derive(Debug, Clone)]
pub struct CachedArtwork {
    pub url: Option<String>,
    pub resolved_at: DateTime<Utc>,
}

/// Memoized (artist, album) -> artwork results. No TTL: catalog matches
/// do not change.
#[derive(Default)]
pub struct ArtworkCache {
    entries: RwLock<HashMap<CacheKey, CachedArtwork>>,
}

impl ArtworkCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &CacheKey) -> Option<CachedArtwork> {
        self.entries.read().await.get(key).cloned()
    }

    /// Record a result (or the no-match sentinel). Atomic per key.
    pub async fn insert(&self, key: CacheKey, url: Option<String>) {
        self.entries.write().await.insert(
            key,
            CachedArtwork {
                url,
                resolved_at: Utc::now(),
            },
        );
    }

    /// Drop a single entry so the next resolution retries the lookup.
    pub async fn invalidate(&self, key: &CacheKey) {
        self.entries.write().await.remove(key);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Cooldown window after an upstream rate-limit rejection. While blocked,
/// every resolution short-circuits to native art without calling out.
#[derive(Default)]
pub struct RateLimitGate {
    blocked_until: RwLock<Option<Instant>>,
}

impl RateLimitGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the gate for `cooldown` from now.
    pub async fn block(&self, cooldown: Duration) {
        *self.blocked_until.write().await = Some(Instant::now() + cooldown);
    }

    /// Whether lookups are currently blocked. Clears itself once the
    /// cooldown has passed.
    pub async fn is_blocked(&self) -> bool {
        let until = *self.blocked_until.read().await;
        match until {
            Some(t) if Instant::now() < t => true,
            Some(_) => {
                *self.blocked_until.write().await = None;
                false
            }
            None => false,
        }
    }
}
