//! Mock iTunes Search API for testing
//!
//! Simulates `GET /search?term=...&entity=album&limit=1`: exact
//! catalog matches, an optional wrong-album fallback, a rate-limited
//! mode and a failure trigger. Counts requests so cache tests can
//! assert the lookup was hit exactly once.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// One album in the mock catalog.
#[derive(Debug, Clone)]
pub struct MockAlbum {
    pub artist: String,
    pub album: String,
    pub artwork_url_100: String,
}

impl MockAlbum {
    pub fn new(artist: &str, album: &str) -> Self {
        Self {
            artist: artist.to_string(),
            album: album.to_string(),
            artwork_url_100: format!(
                "https://mock.mzstatic.example/{}/100x100bb.jpg",
                album.to_lowercase().replace(' ', "-")
            ),
        }
    }

    fn to_result(&self) -> Value {
        json!({
            "artistName": self.artist,
            "collectionName": self.album,
            "artworkUrl100": self.artwork_url_100,
        })
    }
}

struct MockItunesState {
    catalog: Vec<MockAlbum>,
    /// Returned when no catalog entry matches the term, simulating the
    /// real API's habit of answering with some other album by the artist.
    fallback: Option<MockAlbum>,
    rate_limited: bool,
    /// Terms containing this substring get a 500.
    fail_term: Option<String>,
}

pub struct MockItunesServer {
    addr: SocketAddr,
    state: Arc<RwLock<MockItunesState>>,
    requests: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl MockItunesServer {
    /// Start a mock search API on a random port
    pub async fn start() -> Self {
        let state = Arc::new(RwLock::new(MockItunesState {
            catalog: Vec::new(),
            fallback: None,
            rate_limited: false,
            fail_term: None,
        }));
        let requests = Arc::new(AtomicUsize::new(0));

        let app = Router::new()
            .route("/search", get(handle_search))
            .with_state((state.clone(), requests.clone()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            requests,
            handle,
        }
    }

    /// Search URL in place of `https://itunes.apple.com/search`
    pub fn search_url(&self) -> String {
        format!("http://{}/search", self.addr)
    }

    pub async fn add_album(&self, album: MockAlbum) {
        self.state.write().await.catalog.push(album);
    }

    /// Album answered when the term matches nothing in the catalog
    pub async fn set_fallback(&self, album: MockAlbum) {
        self.state.write().await.fallback = Some(album);
    }

    pub async fn set_rate_limited(&self, rate_limited: bool) {
        self.state.write().await.rate_limited = rate_limited;
    }

    /// Make terms containing `term` fail with a 500
    pub async fn set_fail_term(&self, term: &str) {
        self.state.write().await.fail_term = Some(term.to_string());
    }

    /// Number of /search requests served so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub async fn stop(self) {
        self.handle.abort();
    }
}

type SearchState = (Arc<RwLock<MockItunesState>>, Arc<AtomicUsize>);

/// Handle /search requests
async fn handle_search(
    State((state, requests)): State<SearchState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    requests.fetch_add(1, Ordering::SeqCst);

    let state = state.read().await;
    if state.rate_limited {
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    let term = params.get("term").cloned().unwrap_or_default();
    if let Some(fail_term) = &state.fail_term {
        if term.contains(fail_term.as_str()) {
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    let needle = term.to_lowercase();
    let results: Vec<Value> = state
        .catalog
        .iter()
        .find(|a| format!("{} {}", a.artist, a.album).to_lowercase() == needle)
        .or(state.fallback.as_ref())
        .map(|a| vec![a.to_result()])
        .unwrap_or_default();

    Ok(Json(json!({
        "resultCount": results.len(),
        "results": results,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_itunes_matches_exact_terms() {
        let server = MockItunesServer::start().await;
        server
            .add_album(MockAlbum::new("Pink Floyd", "The Wall"))
            .await;

        let client = reqwest::Client::new();
        let body: Value = client
            .get(server.search_url())
            .query(&[("term", "Pink Floyd The Wall"), ("entity", "album")])
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["resultCount"], 1);
        assert_eq!(body["results"][0]["collectionName"], "The Wall");
        assert_eq!(server.request_count(), 1);

        server.stop().await;
    }

    #[tokio::test]
    async fn mock_itunes_rate_limited_returns_429() {
        let server = MockItunesServer::start().await;
        server.set_rate_limited(true).await;

        let client = reqwest::Client::new();
        let response = client
            .get(server.search_url())
            .query(&[("term", "anything")])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 429);

        server.stop().await;
    }
}
