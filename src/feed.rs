use std::fmt;
use std::sync::Arc;

/// Realtime vehicle positions
pub const REALTIME_FEED: &str = "vehiclepositions";
/// Listing of the tables of the static archive; also the flight key of the archive
pub const ARCHIVE_INDEX: &str = "gtfs";

/// Name of a table or feed, e.g. `routes` or `vehiclepositions`
///
/// Only `[a-z0-9_]` is accepted, so a key is always a safe path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeedKey(Arc<str>);

impl FeedKey {
    pub fn new(name: &str) -> Option<FeedKey> {
        let valid = !name.is_empty()
            && name
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
        valid.then(|| FeedKey(Arc::from(name)))
    }

    pub fn realtime() -> FeedKey {
        FeedKey(Arc::from(REALTIME_FEED))
    }

    pub fn archive_index() -> FeedKey {
        FeedKey(Arc::from(ARCHIVE_INDEX))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn source(&self) -> Source {
        match self.as_str() {
            REALTIME_FEED => Source::Realtime,
            _ => Source::StaticArchive,
        }
    }
}

impl fmt::Display for FeedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upstream document a key is read from
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    /// Zip of every static table, refreshed about daily
    StaticArchive,
    /// JSON vehicle positions, refreshed every few seconds
    Realtime,
}

impl Source {
    /// One fetch per flight key can be in progress
    pub fn flight_key(&self) -> FeedKey {
        match self {
            Source::StaticArchive => FeedKey::archive_index(),
            Source::Realtime => FeedKey::realtime(),
        }
    }
}
