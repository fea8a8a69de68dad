//! Mock servers for pipeline integration testing
//!
//! These simulate the speaker's UPnP SOAP services and the iTunes Search
//! API, allowing full integration testing without real hardware or
//! network access.

pub mod itunes;
pub mod sonos;

pub use itunes::MockItunesServer;
pub use sonos::MockSonosServer;
