//! Device poll loop.
//!
//! Drives the whole pipeline on a fixed interval: query the device,
//! normalize into a `CanonicalTrack`, resolve artwork, enrich the queue,
//! diff against the last published state, and hand changes to the
//! broadcaster. Transient device failures are absorbed by a grace period
//! before the display is demoted to "nothing playing". The interval is
//! fixed - the device is polled, not pushed to, so there is no retry
//! storm to dampen.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, interval_at, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::artwork::ArtworkResolver;
use crate::broadcaster::SharedBroadcaster;
use crate::config::Config;
use crate::device::{DeviceClient, RawPlayback};
use crate::enricher::enrich_queue;
use crate::track::{significant_change, CanonicalTrack};

/// Poll-loop tunables, lifted out of `Config` so tests can shrink them.
#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub interval: Duration,
    pub query_timeout: Duration,
    pub grace_cycles: u32,
    pub heartbeat: Duration,
    pub queue_lookahead: usize,
    pub lookup_timeout: Duration,
}

impl From<&Config> for PollerSettings {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.polling.interval(),
            query_timeout: config.device.query_timeout(),
            grace_cycles: config.polling.grace_cycles,
            heartbeat: config.polling.heartbeat(),
            queue_lookahead: config.device.queue_lookahead,
            lookup_timeout: config.artwork.lookup_timeout(),
        }
    }
}

pub struct DevicePoller {
    device: Arc<dyn DeviceClient>,
    resolver: Arc<ArtworkResolver>,
    broadcaster: SharedBroadcaster,
    settings: PollerSettings,
}

impl DevicePoller {
    pub fn new(
        device: Arc<dyn DeviceClient>,
        resolver: Arc<ArtworkResolver>,
        broadcaster: SharedBroadcaster,
        settings: PollerSettings,
    ) -> Self {
        Self {
            device,
            resolver,
            broadcaster,
            settings,
        }
    }

    /// Main polling loop. Runs until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut poll = interval(self.settings.interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // heartbeat starts one period out: the initial state event on
        // subscribe covers a fresh connection
        let mut heartbeat = interval_at(
            Instant::now() + self.settings.heartbeat,
            self.settings.heartbeat,
        );
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut consecutive_failures: u32 = 0;
        let mut last_published: Option<CanonicalTrack> = None;

        info!("device poller started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("device poller shutting down");
                    break;
                }

                _ = heartbeat.tick() => {
                    self.broadcaster.ping();
                }

                _ = poll.tick() => {
                    match timeout(self.settings.query_timeout, self.device.query()).await {
                        Ok(Ok(Some(raw))) => {
                            consecutive_failures = 0;
                            let track = self.normalize(raw).await;
                            if significant_change(last_published.as_ref(), Some(&track)) {
                                debug!(title = %track.title, artist = %track.artist, "publishing state change");
                                last_published = Some(track.clone());
                                self.broadcaster.publish(Some(track)).await;
                            } else {
                                // position drift only: refresh the stored
                                // snapshot without waking subscribers
                                last_published = Some(track.clone());
                                self.broadcaster.set_current(Some(track)).await;
                            }
                        }
                        Ok(Ok(None)) => {
                            debug!("device reports nothing playing");
                            self.note_miss(&mut consecutive_failures, &mut last_published).await;
                        }
                        Ok(Err(e)) => {
                            warn!(error = %e, consecutive_failures, "device query failed");
                            self.note_miss(&mut consecutive_failures, &mut last_published).await;
                        }
                        Err(_) => {
                            warn!(consecutive_failures, "device query timed out");
                            self.note_miss(&mut consecutive_failures, &mut last_published).await;
                        }
                    }
                }
            }
        }
    }

    /// A cycle without a usable track: failed query, timeout, or an idle
    /// device. Within the grace period the last good state stays
    /// published so transient blips never flicker the display.
    async fn note_miss(
        &self,
        consecutive_failures: &mut u32,
        last_published: &mut Option<CanonicalTrack>,
    ) {
        *consecutive_failures = consecutive_failures.saturating_add(1);
        if *consecutive_failures >= self.settings.grace_cycles && last_published.is_some() {
            info!(
                cycles = *consecutive_failures,
                "grace period elapsed, publishing nothing-playing"
            );
            *last_published = None;
            self.broadcaster.publish(None).await;
        }
    }

    async fn normalize(&self, raw: RawPlayback) -> CanonicalTrack {
        let resolution = self
            .resolver
            .resolve(&raw.artist, &raw.album, raw.art_url.as_deref())
            .await;
        let upcoming = enrich_queue(
            &self.resolver,
            &raw.queue,
            self.settings.queue_lookahead,
            self.settings.lookup_timeout,
        )
        .await;

        CanonicalTrack {
            title: raw.title,
            artist: raw.artist,
            album: raw.album,
            is_playing: raw.is_playing,
            position_ms: raw.position_ms,
            duration_ms: raw.duration_ms,
            album_art_url: resolution.display_url,
            art_source: resolution.source,
            art_source_reason: resolution.reason,
            original_native_art_url: resolution.original_native_url,
            room_name: raw.room_name,
            upcoming,
        }
    }
}
