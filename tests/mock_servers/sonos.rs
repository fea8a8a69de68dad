//! Mock Sonos speaker for testing
//!
//! Simulates the UPnP SOAP control endpoints on a random port:
//! AVTransport (GetPositionInfo, GetTransportInfo), ContentDirectory
//! (Browse) and DeviceProperties (GetZoneAttributes). Responses embed
//! DIDL-Lite metadata escaped inside the SOAP envelope the way real
//! speakers do.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Current-track state served by the mock speaker.
#[derive(Debug, Clone)]
pub struct MockNowPlaying {
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Relative URI, absolutized by the client under test.
    pub art_uri: String,
    /// "PLAYING", "PAUSED_PLAYBACK" or "STOPPED".
    pub transport_state: String,
    pub rel_time: String,
    pub duration: String,
    /// 1-based queue position.
    pub track_no: u32,
}

impl MockNowPlaying {
    pub fn new(title: &str, artist: &str, album: &str) -> Self {
        Self {
            title: title.to_string(),
            artist: artist.to_string(),
            album: album.to_string(),
            art_uri: format!("/getaa?u=x-file:{}", title.replace(' ', "-")),
            transport_state: "PLAYING".to_string(),
            rel_time: "0:01:23".to_string(),
            duration: "0:03:21".to_string(),
            track_no: 1,
        }
    }
}

/// One queue entry served by a Browse call.
#[derive(Debug, Clone)]
pub struct MockQueueEntry {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub art_uri: String,
}

struct MockSonosState {
    now_playing: Option<MockNowPlaying>,
    queue: Vec<MockQueueEntry>,
    room_name: String,
    failing: bool,
}

pub struct MockSonosServer {
    addr: SocketAddr,
    state: Arc<RwLock<MockSonosState>>,
    handle: JoinHandle<()>,
}

impl MockSonosServer {
    /// Start a mock speaker on a random port
    pub async fn start() -> Self {
        let state = Arc::new(RwLock::new(MockSonosState {
            now_playing: None,
            queue: Vec::new(),
            room_name: "Living Room".to_string(),
            failing: false,
        }));

        let app = Router::new()
            .route("/MediaRenderer/AVTransport/Control", post(handle_soap))
            .route("/MediaServer/ContentDirectory/Control", post(handle_soap))
            .route("/DeviceProperties/Control", post(handle_soap))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Base URL in place of `http://<speaker>:1400`
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn set_now_playing(&self, np: MockNowPlaying) {
        self.state.write().await.now_playing = Some(np);
    }

    /// Clear the current track (idle speaker)
    pub async fn clear_now_playing(&self) {
        self.state.write().await.now_playing = None;
    }

    pub async fn set_queue(&self, queue: Vec<MockQueueEntry>) {
        self.state.write().await.queue = queue;
    }

    pub async fn set_room_name(&self, name: &str) {
        self.state.write().await.room_name = name.to_string();
    }

    /// Make every SOAP call fail with a 500 (unreachable speaker)
    pub async fn set_failing(&self, failing: bool) {
        self.state.write().await.failing = failing;
    }

    pub async fn stop(self) {
        self.handle.abort();
    }
}

/// Escape a DIDL document for embedding in a SOAP response value.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn soap_envelope(service: &str, action: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
  <s:Body>
    <u:{action}Response xmlns:u="{service}">{body}</u:{action}Response>
  </s:Body>
</s:Envelope>"#
    )
}

fn track_didl(np: &MockNowPlaying) -> String {
    format!(
        r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/"><item id="-1" parentID="-1"><dc:title>{}</dc:title><dc:creator>{}</dc:creator><upnp:album>{}</upnp:album><upnp:albumArtURI>{}</upnp:albumArtURI></item></DIDL-Lite>"#,
        np.title, np.artist, np.album, np.art_uri
    )
}

fn queue_didl(queue: &[MockQueueEntry]) -> String {
    let items: String = queue
        .iter()
        .map(|e| {
            format!(
                r#"<item id="Q:0/{}"><dc:title>{}</dc:title><dc:creator>{}</dc:creator><upnp:album>{}</upnp:album><upnp:albumArtURI>{}</upnp:albumArtURI></item>"#,
                e.title.replace(' ', "-"),
                e.title,
                e.artist,
                e.album,
                e.art_uri
            )
        })
        .collect();
    format!(
        r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/">{}</DIDL-Lite>"#,
        items
    )
}

/// Dispatch SOAP calls on the SOAPAction header
async fn handle_soap(
    State(state): State<Arc<RwLock<MockSonosState>>>,
    headers: HeaderMap,
    _body: String,
) -> Result<String, StatusCode> {
    let action = headers
        .get("SOAPAction")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let state = state.read().await;
    if state.failing {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    if action.contains("#GetPositionInfo") {
        let body = match &state.now_playing {
            Some(np) => format!(
                "<Track>{}</Track><TrackDuration>{}</TrackDuration><TrackMetaData>{}</TrackMetaData><RelTime>{}</RelTime>",
                np.track_no,
                np.duration,
                escape_xml(&track_didl(np)),
                np.rel_time
            ),
            None => {
                "<Track>0</Track><TrackDuration>NOT_IMPLEMENTED</TrackDuration><TrackMetaData>NOT_IMPLEMENTED</TrackMetaData><RelTime>NOT_IMPLEMENTED</RelTime>"
                    .to_string()
            }
        };
        return Ok(soap_envelope(
            "urn:schemas-upnp-org:service:AVTransport:1",
            "GetPositionInfo",
            &body,
        ));
    }

    if action.contains("#GetTransportInfo") {
        let transport_state = state
            .now_playing
            .as_ref()
            .map(|np| np.transport_state.clone())
            .unwrap_or_else(|| "STOPPED".to_string());
        let body = format!(
            "<CurrentTransportState>{}</CurrentTransportState><CurrentTransportStatus>OK</CurrentTransportStatus><CurrentSpeed>1</CurrentSpeed>",
            transport_state
        );
        return Ok(soap_envelope(
            "urn:schemas-upnp-org:service:AVTransport:1",
            "GetTransportInfo",
            &body,
        ));
    }

    if action.contains("#Browse") {
        let didl = queue_didl(&state.queue);
        let body = format!(
            "<Result>{}</Result><NumberReturned>{}</NumberReturned><TotalMatches>{}</TotalMatches><UpdateID>1</UpdateID>",
            escape_xml(&didl),
            state.queue.len(),
            state.queue.len()
        );
        return Ok(soap_envelope(
            "urn:schemas-upnp-org:service:ContentDirectory:1",
            "Browse",
            &body,
        ));
    }

    if action.contains("#GetZoneAttributes") {
        let body = format!(
            "<CurrentZoneName>{}</CurrentZoneName><CurrentIcon></CurrentIcon>",
            state.room_name
        );
        return Ok(soap_envelope(
            "urn:schemas-upnp-org:service:DeviceProperties:1",
            "GetZoneAttributes",
            &body,
        ));
    }

    Err(StatusCode::BAD_REQUEST)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_sonos_starts_and_stops() {
        let server = MockSonosServer::start().await;
        assert!(server.addr.port() > 0);
        server.stop().await;
    }

    #[tokio::test]
    async fn mock_sonos_serves_position_info() {
        let server = MockSonosServer::start().await;
        server
            .set_now_playing(MockNowPlaying::new("Mother", "Pink Floyd", "The Wall"))
            .await;

        let client = reqwest::Client::new();
        let response = client
            .post(format!(
                "{}/MediaRenderer/AVTransport/Control",
                server.base_url()
            ))
            .header(
                "SOAPAction",
                "\"urn:schemas-upnp-org:service:AVTransport:1#GetPositionInfo\"",
            )
            .body("")
            .send()
            .await
            .unwrap();

        let body = response.text().await.unwrap();
        assert!(body.contains("&lt;dc:title&gt;Mother&lt;/dc:title&gt;"));
        assert!(body.contains("<RelTime>0:01:23</RelTime>"));

        server.stop().await;
    }
}
