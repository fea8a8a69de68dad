//! Canonical playback state shared across the pipeline.
//!
//! `CanonicalTrack` is the single normalized representation of "what is
//! playing now", independent of which device API produced it. It is the
//! unit pushed to subscribers and returned by `/api/state`.

use serde::{Deserialize, Serialize};

/// Where the displayed artwork came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtSource {
    /// Artwork URL as reported by the playback device (typically low-res).
    Native,
    /// High-resolution artwork from the external lookup.
    External,
    /// No artwork available at all.
    None,
}

/// One upcoming queue entry. Rebuilt every poll cycle, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub native_art_url: Option<String>,
    pub resolved_display_url: Option<String>,
    pub has_external_match: bool,
    pub match_reason: String,
}

/// The unit of published state.
///
/// When `is_playing` is false, `position_ms`/`duration_ms` may be stale and
/// are not authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTrack {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub is_playing: bool,
    pub position_ms: u64,
    /// 0 = unknown.
    pub duration_ms: u64,
    pub album_art_url: Option<String>,
    pub art_source: ArtSource,
    pub art_source_reason: String,
    /// Present only when external art replaced the device's native art.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_native_art_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_name: Option<String>,
    #[serde(default)]
    pub upcoming: Vec<QueueItem>,
}

/// Structural diff driving publish decisions.
///
/// Position/duration drift continuously and would flood subscribers; they
/// ride along in payloads but never force a push on their own. Queue
/// artwork URLs converge through the cache and are likewise excluded, but
/// queue identity changes count so displays can refresh prefetch hints.
pub fn significant_change(old: Option<&CanonicalTrack>, new: Option<&CanonicalTrack>) -> bool {
    match (old, new) {
        (None, None) => false,
        (None, Some(_)) | (Some(_), None) => true,
        (Some(a), Some(b)) => {
            a.title != b.title
                || a.artist != b.artist
                || a.album != b.album
                || a.is_playing != b.is_playing
                || a.album_art_url != b.album_art_url
                || !queue_identity_eq(&a.upcoming, &b.upcoming)
        }
    }
}

fn queue_identity_eq(a: &[QueueItem], b: &[QueueItem]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.title == y.title && x.artist == y.artist && x.album == y.album)
}
