//! Album Art Display
//!
//! A "now playing" tracker for a local-network speaker: polls the device,
//! resolves high-resolution album artwork from the iTunes Search API, and
//! pushes state changes to display clients over Server-Sent Events.
//!
//! This library provides:
//! - Sonos/UPnP device polling with a transient-failure grace period
//! - Debounced change detection (position drift never wakes clients)
//! - Cached, rate-limit-aware external artwork resolution
//! - Concurrent artwork prefetch for the upcoming queue
//! - Server-Sent Events fan-out with snapshot-then-updates ordering

pub mod api;
pub mod artwork;
pub mod broadcaster;
pub mod config;
pub mod device;
pub mod enricher;
pub mod poller;
pub mod track;
