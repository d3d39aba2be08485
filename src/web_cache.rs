use crate::feed::FeedKey;
use bytes::Bytes;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::warn;
use lru::LruCache;
use serde::Serialize;
use std::io::{self, Read, Write};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ContentEncoding {
    Identity,
    Gzip,
}

impl ContentEncoding {
    /// Value of the `Content-Encoding` header, none for identity
    pub fn header_value(&self) -> Option<&'static str> {
        match self {
            ContentEncoding::Identity => None,
            ContentEncoding::Gzip => Some("gzip"),
        }
    }
}

/// A serialized response body, ready to be sent
///
/// Cloning only bumps a reference count.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPayload {
    body: Bytes,
    encoding: ContentEncoding,
    content_type: &'static str,
}

impl CachedPayload {
    /// Serializes `value` to JSON, gzipped when the JSON is at least `compression_threshold` bytes
    pub fn json<T: Serialize + ?Sized>(
        value: &T,
        compression_threshold: usize,
    ) -> io::Result<CachedPayload> {
        let json = serde_json::to_vec(value)?;
        if json.len() < compression_threshold {
            return Ok(CachedPayload {
                body: Bytes::from(json),
                encoding: ContentEncoding::Identity,
                content_type: "application/json",
            });
        }

        let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 4), Compression::fast());
        encoder.write_all(&json)?;
        Ok(CachedPayload {
            body: Bytes::from(encoder.finish()?),
            encoding: ContentEncoding::Gzip,
            content_type: "application/json",
        })
    }

    /// Body as stored, possibly compressed; see [CachedPayload::encoding]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn encoding(&self) -> ContentEncoding {
        self.encoding
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// Body without any content encoding
    pub fn decoded(&self) -> io::Result<Bytes> {
        match self.encoding {
            ContentEncoding::Identity => Ok(self.body.clone()),
            ContentEncoding::Gzip => {
                let mut json = Vec::with_capacity(self.body.len() * 4);
                GzDecoder::new(&self.body[..]).read_to_end(&mut json)?;
                Ok(Bytes::from(json))
            }
        }
    }
}

struct CacheEntry {
    payload: CachedPayload,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl
    }
}

/// Payloads by feed key, each with its own time-to-live
///
/// An entry is only ever replaced as a whole. Expired entries stay around so they can still be
/// served when a refresh fails, until room is needed. Capacity only ever evicts expired
/// entries: when fresh entries alone exceed it, the cache grows.
pub struct TtlCache {
    entries: Mutex<LruCache<FeedKey, CacheEntry>>,
}

impl TtlCache {
    pub fn new(capacity: usize) -> Self {
        TtlCache {
            entries: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    // Entries are replaced whole, so a panic elsewhere cannot leave one half written
    fn lock(&self) -> MutexGuard<'_, LruCache<FeedKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The payload if it is younger than its ttl
    pub fn get(&self, key: &FeedKey) -> Option<CachedPayload> {
        let now = Instant::now();
        self.lock()
            .get(key)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.payload.clone())
    }

    /// The payload whatever its age
    pub fn get_stale(&self, key: &FeedKey) -> Option<CachedPayload> {
        self.lock().get(key).map(|entry| entry.payload.clone())
    }

    pub fn put(&self, key: FeedKey, payload: CachedPayload, ttl: Duration) {
        self.put_all([(key, payload)], ttl);
    }

    /// Stores several payloads under one lock: readers see all of them or none
    pub fn put_all<I>(&self, payloads: I, ttl: Duration)
    where
        I: IntoIterator<Item = (FeedKey, CachedPayload)>,
    {
        let payloads: Vec<_> = payloads.into_iter().collect();
        let stored_at = Instant::now();
        let mut cache = self.lock();
        let incoming = payloads
            .iter()
            .filter(|(key, _)| !cache.contains(key))
            .count();
        make_room(&mut cache, &payloads, incoming, stored_at);

        for (key, payload) in payloads {
            cache.put(
                key,
                CacheEntry {
                    payload,
                    stored_at,
                    ttl,
                },
            );
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Frees a slot for each of the `incoming` keys by dropping expired entries, least recently
/// used first, and grows the cache for whatever fresh entries leave missing
fn make_room(
    cache: &mut LruCache<FeedKey, CacheEntry>,
    batch: &[(FeedKey, CachedPayload)],
    incoming: usize,
    now: Instant,
) {
    let capacity = cache.cap().get();
    let mut missing = (cache.len() + incoming).saturating_sub(capacity);
    if missing == 0 {
        return;
    }

    let expired: Vec<FeedKey> = cache
        .iter()
        .rev()
        .filter(|(key, entry)| !entry.is_fresh(now) && !batch.iter().any(|(k, _)| k == *key))
        .map(|(key, _)| key.clone())
        .take(missing)
        .collect();
    missing -= expired.len();
    for key in &expired {
        cache.pop(key);
    }

    if let Some(grown) = NonZeroUsize::new(capacity + missing).filter(|_| missing > 0) {
        warn!("Cache capacity {capacity} is too small for the fresh entries, growing to {grown}");
        cache.resize(grown);
    }
}
