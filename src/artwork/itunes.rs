//! iTunes Search API lookup for high-resolution album artwork.
//!
//! The API returns `artworkUrl100` thumbnails; iTunes serves the same
//! image at any square size (up to 3000px) via URL substitution, so the
//! client rewrites `100x100bb` to the configured size.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

const SEARCH_URL: &str = "https://itunes.apple.com/search";

/// Failure taxonomy the resolver branches on.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Upstream asked us to back off; opens the cooldown gate.
    #[error("rate limited by artwork lookup service")]
    RateLimited,
    #[error("artwork lookup transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("artwork lookup returned malformed data: {0}")]
    Decode(String),
}

/// One candidate from the external lookup, with its own reported identity.
/// The resolver validates that identity against the query before trusting
/// the image.
#[derive(Debug, Clone)]
pub struct ArtworkCandidate {
    pub artist: String,
    pub album: String,
    pub image_url: String,
}

/// External artwork lookup seam (mocked in tests).
#[async_trait]
pub trait ArtworkLookup: Send + Sync {
    /// Returns zero or one candidate for (artist, album).
    async fn search(
        &self,
        artist: &str,
        album: &str,
    ) -> Result<Option<ArtworkCandidate>, LookupError>;
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default, rename = "artistName")]
    artist_name: String,
    #[serde(default, rename = "collectionName")]
    collection_name: String,
    #[serde(default, rename = "artworkUrl100")]
    artwork_url_100: String,
}

/// Rewrite an `artworkUrl100` thumbnail URL to the requested square size.
fn upscale_art_url(url: &str, size: u32) -> String {
    url.replace("100x100bb", &format!("{0}x{0}bb", size))
}

pub struct ItunesClient {
    http: Client,
    base_url: String,
    image_size: u32,
}

impl ItunesClient {
    pub fn new(image_size: u32, timeout: Duration) -> Self {
        Self::with_base_url(SEARCH_URL, image_size, timeout)
    }

    /// Tests point this at a mock server.
    pub fn with_base_url(base_url: impl Into<String>, image_size: u32, timeout: Duration) -> Self {
        Self {
            http: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            image_size,
        }
    }
}

#[async_trait]
impl ArtworkLookup for ItunesClient {
    async fn search(
        &self,
        artist: &str,
        album: &str,
    ) -> Result<Option<ArtworkCandidate>, LookupError> {
        let term = format!("{} {}", artist, album).trim().to_string();
        if term.is_empty() {
            return Ok(None);
        }

        let response = self
            .http
            .get(&self.base_url)
            .query(&[("term", term.as_str()), ("entity", "album"), ("limit", "1")])
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(LookupError::RateLimited);
        }
        let response = response.error_for_status()?;

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| LookupError::Decode(e.to_string()))?;

        let Some(first) = body.results.into_iter().next() else {
            return Ok(None);
        };
        if first.artwork_url_100.is_empty() {
            return Ok(None);
        }

        Ok(Some(ArtworkCandidate {
            artist: first.artist_name,
            album: first.collection_name,
            image_url: upscale_art_url(&first.artwork_url_100, self.image_size),
        }))
    }
}
