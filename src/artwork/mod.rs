//! Artwork resolution: memo cache, rate-limit gate, external lookup.

pub mod cache;
pub mod itunes;
pub mod resolver;

pub use cache::{ArtworkCache, CacheKey, RateLimitGate};
pub use itunes::{ArtworkCandidate, ArtworkLookup, ItunesClient, LookupError};
pub use resolver::{ArtworkResolver, Resolution};
