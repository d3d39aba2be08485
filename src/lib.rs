//! Caches the Metlink GTFS feeds and serves them as JSON
//!
//! Every table of the static archive is served as an array of typed records under its own
//! name (`/routes`, `/stop_times`, ...), the realtime vehicle positions under `/vehiclepositions`.
//! Concurrent misses on the same upstream document share a single fetch.

pub mod configuration;
pub mod error;
pub mod feed;
pub mod feed_service;
pub mod single_flight;
pub mod upstream;
pub mod web;
pub mod web_cache;

pub use configuration::Configuration;
pub use error::FeedError;
pub use feed::{FeedKey, Source};
pub use feed_service::{ArchiveIndex, FeedService};
pub use web_cache::{CachedPayload, ContentEncoding, TtlCache};
