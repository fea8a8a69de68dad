//! Sonos device client over UPnP SOAP.
//!
//! Talks directly to the speaker's SOAP services on port 1400:
//! AVTransport for the current track and transport state, ContentDirectory
//! for the play queue, DeviceProperties for the room name. Track metadata
//! arrives as DIDL-Lite XML escaped inside the SOAP response.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::debug;

use crate::device::{DeviceClient, RawPlayback, RawQueueEntry};

const AV_TRANSPORT_URN: &str = "urn:schemas-upnp-org:service:AVTransport:1";
const CONTENT_DIRECTORY_URN: &str = "urn:schemas-upnp-org:service:ContentDirectory:1";
const DEVICE_PROPERTIES_URN: &str = "urn:schemas-upnp-org:service:DeviceProperties:1";

const AV_TRANSPORT_CONTROL: &str = "/MediaRenderer/AVTransport/Control";
const CONTENT_DIRECTORY_CONTROL: &str = "/MediaServer/ContentDirectory/Control";
const DEVICE_PROPERTIES_CONTROL: &str = "/DeviceProperties/Control";

/// Sonos speakers serve their UPnP control endpoints here.
const SONOS_PORT: u16 = 1400;

pub struct SonosDevice {
    base_url: String,
    http: Client,
    queue_lookahead: usize,
    /// Room name rarely changes; fetched once and cached.
    room_name: RwLock<Option<String>>,
}

impl SonosDevice {
    pub fn new(host: &str, queue_lookahead: usize, timeout: Duration) -> Self {
        Self::with_base_url(
            format!("http://{}:{}", host, SONOS_PORT),
            queue_lookahead,
            timeout,
        )
    }

    /// Tests point this at a mock speaker.
    pub fn with_base_url(
        base_url: impl Into<String>,
        queue_lookahead: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            http: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            queue_lookahead,
            room_name: RwLock::new(None),
        }
    }

    async fn soap_call(&self, path: &str, service_type: &str, action: &str, body_content: &str) -> Result<String> {
        let soap_body = format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
  <s:Body>
    <u:{action} xmlns:u="{service_type}">{body}</u:{action}>
  </s:Body>
</s:Envelope>"#,
            action = action,
            service_type = service_type,
            body = body_content
        );

        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", format!("\"{}#{}\"", service_type, action))
            .body(soap_body)
            .send()
            .await
            .with_context(|| format!("device unreachable: {}", action))?
            .error_for_status()
            .with_context(|| format!("device rejected {}", action))?;

        Ok(response.text().await?)
    }

    async fn fetch_room_name(&self) -> Option<String> {
        if let Some(name) = self.room_name.read().await.clone() {
            return Some(name);
        }

        let response = self
            .soap_call(
                DEVICE_PROPERTIES_CONTROL,
                DEVICE_PROPERTIES_URN,
                "GetZoneAttributes",
                "",
            )
            .await
            .ok()?;
        let name = extract_xml_value(&response, "CurrentZoneName")?;
        if name.is_empty() {
            return None;
        }

        debug!(room = %name, "resolved speaker room name");
        *self.room_name.write().await = Some(name.clone());
        Some(name)
    }

    /// Browse the play queue starting after the current track. Queue-less
    /// sources (radio streams) simply yield an empty list.
    async fn fetch_queue(&self, current_track_no: u32) -> Vec<RawQueueEntry> {
        if self.queue_lookahead == 0 {
            return Vec::new();
        }

        let body = format!(
            "<ObjectID>Q:0</ObjectID><BrowseFlag>BrowseDirectChildren</BrowseFlag><Filter>*</Filter><StartingIndex>{}</StartingIndex><RequestedCount>{}</RequestedCount><SortCriteria></SortCriteria>",
            current_track_no, self.queue_lookahead
        );

        let response = match self
            .soap_call(CONTENT_DIRECTORY_CONTROL, CONTENT_DIRECTORY_URN, "Browse", &body)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "queue browse failed, treating as empty");
                return Vec::new();
            }
        };

        let Some(didl) = extract_xml_value(&response, "Result").map(|v| unescape_xml(&v)) else {
            return Vec::new();
        };
        parse_queue_didl(&didl, &self.base_url, self.queue_lookahead)
    }
}

#[async_trait]
impl DeviceClient for SonosDevice {
    async fn query(&self) -> Result<Option<RawPlayback>> {
        let position = self
            .soap_call(
                AV_TRANSPORT_CONTROL,
                AV_TRANSPORT_URN,
                "GetPositionInfo",
                "<InstanceID>0</InstanceID>",
            )
            .await?;

        let metadata = extract_xml_value(&position, "TrackMetaData")
            .map(|v| unescape_xml(&v))
            .unwrap_or_default();
        if metadata.is_empty() || metadata == "NOT_IMPLEMENTED" {
            return Ok(None);
        }

        let title = didl_field(&metadata, "title").unwrap_or_default();
        if title.is_empty() {
            return Ok(None);
        }
        let artist = didl_field(&metadata, "creator").unwrap_or_default();
        let album = didl_field(&metadata, "album").unwrap_or_default();
        let art_url = didl_field(&metadata, "albumArtURI")
            .filter(|u| !u.is_empty())
            .map(|u| absolutize(&u, &self.base_url));

        let position_ms = extract_xml_value(&position, "RelTime")
            .map(|t| parse_clock(&t))
            .unwrap_or(0);
        let duration_ms = extract_xml_value(&position, "TrackDuration")
            .map(|t| parse_clock(&t))
            .unwrap_or(0);
        // Track is 1-based; as a 0-based browse index it points at the
        // entry after the current one.
        let track_no = extract_xml_value(&position, "Track")
            .and_then(|t| t.parse::<u32>().ok())
            .unwrap_or(0);

        let transport = self
            .soap_call(
                AV_TRANSPORT_CONTROL,
                AV_TRANSPORT_URN,
                "GetTransportInfo",
                "<InstanceID>0</InstanceID>",
            )
            .await?;
        let is_playing = extract_xml_value(&transport, "CurrentTransportState")
            .map(|s| s == "PLAYING")
            .unwrap_or(false);

        let room_name = self.fetch_room_name().await;
        let queue = self.fetch_queue(track_no).await;

        Ok(Some(RawPlayback {
            title,
            artist,
            album,
            art_url,
            is_playing,
            position_ms,
            duration_ms,
            room_name,
            queue,
        }))
    }
}

/// Extract XML value, handling optional namespace prefixes
/// (e.g., `<dc:title>` or `<Track>`).
fn extract_xml_value(xml: &str, tag: &str) -> Option<String> {
    let pattern = format!(
        r"<(?:[^:>]+:)?{}\b[^>]*>([^<]*)</(?:[^:>]+:)?{}>",
        regex::escape(tag),
        regex::escape(tag)
    );

    let re = Regex::new(&pattern).ok()?;
    re.captures(xml)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extract a DIDL-Lite field and unescape any entities left in the value.
fn didl_field(didl: &str, tag: &str) -> Option<String> {
    extract_xml_value(didl, tag).map(|v| unescape_xml(&v))
}

/// Parse the `<item>` entries of a queue browse DIDL document.
fn parse_queue_didl(didl: &str, base_url: &str, limit: usize) -> Vec<RawQueueEntry> {
    let Ok(item_re) = Regex::new(r"(?s)<item\b[^>]*>(.*?)</item>") else {
        return Vec::new();
    };

    item_re
        .captures_iter(didl)
        .take(limit)
        .filter_map(|caps| {
            let item = caps.get(1)?.as_str();
            let title = didl_field(item, "title")?;
            if title.is_empty() {
                return None;
            }
            Some(RawQueueEntry {
                title,
                artist: didl_field(item, "creator").unwrap_or_default(),
                album: didl_field(item, "album").unwrap_or_default(),
                art_url: didl_field(item, "albumArtURI")
                    .filter(|u| !u.is_empty())
                    .map(|u| absolutize(&u, base_url)),
            })
        })
        .collect()
}

/// Device art URIs are usually relative (`/getaa?...`); anchor them on the
/// speaker's base URL.
fn absolutize(art_url: &str, base_url: &str) -> String {
    if art_url.starts_with("http://") || art_url.starts_with("https://") {
        art_url.to_string()
    } else if art_url.starts_with('/') {
        format!("{}{}", base_url, art_url)
    } else {
        format!("{}/{}", base_url, art_url)
    }
}

/// Unescape the XML entities Sonos uses when embedding DIDL documents.
fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Parse a `H:MM:SS` or `M:SS` clock string to milliseconds. Unknown or
/// malformed values (radio streams report `NOT_IMPLEMENTED`) become 0.
fn parse_clock(clock: &str) -> u64 {
    let parts: Vec<&str> = clock.trim().split(':').collect();
    let nums: Option<Vec<u64>> = parts.iter().map(|p| p.parse::<u64>().ok()).collect();
    match nums.as_deref() {
        Some([h, m, s]) => (h * 3600 + m * 60 + s) * 1000,
        Some([m, s]) => (m * 60 + s) * 1000,
        _ => 0,
    }
}
