//! Queue prefetch enrichment.
//!
//! Resolves artwork for the upcoming-queue entries concurrently so a
//! display can prefetch covers before tracks start. Fan-out/fan-in within
//! one poll cycle: every entry carries its own timeout, so one slow or
//! failing lookup never holds up the rest - it alone degrades to native
//! art. Steady-state queues cost nothing after first sight because
//! results land in the shared cache.

use std::time::Duration;

use futures::future::join_all;
use tokio::time::timeout;
use tracing::debug;

use crate::artwork::{ArtworkResolver, Resolution};
use crate::device::RawQueueEntry;
use crate::track::{ArtSource, QueueItem};

pub async fn enrich_queue(
    resolver: &ArtworkResolver,
    entries: &[RawQueueEntry],
    lookahead: usize,
    per_item_timeout: Duration,
) -> Vec<QueueItem> {
    let bounded = &entries[..entries.len().min(lookahead)];

    let futures = bounded.iter().map(|entry| async move {
        let resolved = timeout(
            per_item_timeout,
            resolver.resolve(&entry.artist, &entry.album, entry.art_url.as_deref()),
        )
        .await;

        match resolved {
            Ok(resolution) => to_item(entry, resolution),
            Err(_) => {
                debug!(title = %entry.title, "queue artwork lookup timed out, keeping native art");
                QueueItem {
                    title: entry.title.clone(),
                    artist: entry.artist.clone(),
                    album: entry.album.clone(),
                    native_art_url: entry.art_url.clone(),
                    resolved_display_url: entry.art_url.clone(),
                    has_external_match: false,
                    match_reason: "lookup timed out".to_string(),
                }
            }
        }
    });

    join_all(futures).await
}

fn to_item(entry: &RawQueueEntry, resolution: Resolution) -> QueueItem {
    QueueItem {
        title: entry.title.clone(),
        artist: entry.artist.clone(),
        album: entry.album.clone(),
        native_art_url: entry.art_url.clone(),
        has_external_match: resolution.source == ArtSource::External,
        resolved_display_url: resolution.display_url,
        match_reason: resolution.reason,
    }
}
