//! Artwork resolution pipeline: cache, rate-limit gate, external lookup.
//!
//! Resolution never fails: every error path degrades to the device's
//! native art with a diagnostic reason, so the poll cycle always has
//! something to publish.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::artwork::cache::{normalize, ArtworkCache, CacheKey, RateLimitGate};
use crate::artwork::itunes::{ArtworkLookup, LookupError};
use crate::track::ArtSource;

/// Outcome of one resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub display_url: Option<String>,
    pub source: ArtSource,
    pub reason: String,
    /// The native URL that external art replaced, when it did.
    pub original_native_url: Option<String>,
}

impl Resolution {
    fn native(url: Option<&str>, reason: &str) -> Self {
        Self {
            display_url: url.map(str::to_string),
            source: if url.is_some() {
                ArtSource::Native
            } else {
                ArtSource::None
            },
            reason: reason.to_string(),
            original_native_url: None,
        }
    }

    fn external(url: String, native: Option<&str>, reason: &str) -> Self {
        Self {
            display_url: Some(url),
            source: ArtSource::External,
            reason: reason.to_string(),
            original_native_url: native.map(str::to_string),
        }
    }
}

pub struct ArtworkResolver {
    lookup: Arc<dyn ArtworkLookup>,
    cache: Arc<ArtworkCache>,
    gate: Arc<RateLimitGate>,
    enabled: bool,
    cooldown: Duration,
}

impl ArtworkResolver {
    pub fn new(
        lookup: Arc<dyn ArtworkLookup>,
        cache: Arc<ArtworkCache>,
        gate: Arc<RateLimitGate>,
        enabled: bool,
        cooldown: Duration,
    ) -> Self {
        Self {
            lookup,
            cache,
            gate,
            enabled,
            cooldown,
        }
    }

    /// Resolve a display URL for (artist, album), preferring external art
    /// over the device's native URL.
    pub async fn resolve(
        &self,
        artist: &str,
        album: &str,
        native_art_url: Option<&str>,
    ) -> Resolution {
        if !self.enabled {
            return Resolution::native(native_art_url, "external lookup disabled");
        }
        if artist.trim().is_empty() && album.trim().is_empty() {
            return Resolution::native(native_art_url, "no metadata");
        }
        if self.gate.is_blocked().await {
            return Resolution::native(native_art_url, "rate-limited, using native art");
        }

        let key = CacheKey::new(artist, album);
        if let Some(hit) = self.cache.get(&key).await {
            return match hit.url {
                Some(url) => Resolution::external(url, native_art_url, "cached"),
                None => Resolution::native(native_art_url, "cached no-match"),
            };
        }

        match self.lookup.search(artist, album).await {
            Ok(Some(candidate)) => {
                // Artist alone is not enough: accepting it once put the
                // wrong album's cover on screen. Both fields must match.
                if normalize(&candidate.artist) == normalize(artist)
                    && normalize(&candidate.album) == normalize(album)
                {
                    info!(artist, album, "external artwork matched");
                    self.cache
                        .insert(key, Some(candidate.image_url.clone()))
                        .await;
                    Resolution::external(candidate.image_url, native_art_url, "matched")
                } else {
                    debug!(
                        artist,
                        album,
                        candidate_artist = %candidate.artist,
                        candidate_album = %candidate.album,
                        "rejecting mismatched artwork candidate"
                    );
                    self.cache.insert(key, None).await;
                    Resolution::native(native_art_url, "no album match")
                }
            }
            Ok(None) => {
                debug!(artist, album, "no artwork candidate");
                self.cache.insert(key, None).await;
                Resolution::native(native_art_url, "no album match")
            }
            Err(LookupError::RateLimited) => {
                warn!(
                    cooldown_secs = self.cooldown.as_secs(),
                    "artwork lookup rate-limited, opening cooldown gate"
                );
                self.gate.block(self.cooldown).await;
                // nothing cached: this key deserves a retry after cooldown
                Resolution::native(native_art_url, "rate-limited")
            }
            Err(e) => {
                warn!(artist, album, error = %e, "artwork lookup failed");
                Resolution::native(native_art_url, "lookup failed")
            }
        }
    }
}
