//! Playback device boundary.
//!
//! The poller only sees the `DeviceClient` trait; `SonosDevice` is the
//! UPnP implementation. Tests substitute scripted devices.

use anyhow::Result;
use async_trait::async_trait;

pub mod sonos;

pub use sonos::SonosDevice;

/// One upcoming entry as reported by the device, before enrichment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawQueueEntry {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub art_url: Option<String>,
}

/// Raw playback info straight off the device, before normalization.
#[derive(Debug, Clone, Default)]
pub struct RawPlayback {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub art_url: Option<String>,
    pub is_playing: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub room_name: Option<String>,
    /// Upcoming queue in playback order, bounded by the device client.
    pub queue: Vec<RawQueueEntry>,
}

/// Bounded query interface to the playback device.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// One playback query. `Ok(None)` means the device is reachable but
    /// reports nothing playing.
    async fn query(&self) -> Result<Option<RawPlayback>>;
}
