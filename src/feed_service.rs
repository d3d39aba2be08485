use crate::configuration::Configuration;
use crate::error::FeedError;
use crate::feed::{FeedKey, Source};
use crate::single_flight::SingleFlight;
use crate::upstream::UpstreamClient;
use crate::web_cache::{CachedPayload, TtlCache};
use gtfs_tables::realtime::FeedMessage;
use gtfs_tables::{ArchiveReader, RawTable};
use log::{debug, error, info, warn};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

/// Everything one pipeline wrote to the cache
///
/// Waiters pick their key from here rather than from the cache, whose entry may already be
/// expired again when the ttl is very short.
type Snapshot = Arc<FxHashMap<FeedKey, CachedPayload>>;

/// Content of the `gtfs` feed
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArchiveIndex {
    pub sha256: String,
    /// Sorted
    pub tables: Vec<String>,
    /// Every file of the archive, tables or not, sorted
    pub files: Vec<String>,
}

impl ArchiveIndex {
    pub fn contains(&self, table: &str) -> bool {
        self.tables
            .binary_search_by(|name| name.as_str().cmp(table))
            .is_ok()
    }
}

/// Answers feed requests from the cache, refreshing it from upstream when needed
pub struct FeedService {
    config: Configuration,
    upstream: UpstreamClient,
    cache: TtlCache,
    flights: SingleFlight<FeedKey, Snapshot>,
    /// Index of the last archive, with the moment it was stored
    archive_index: Mutex<Option<(ArchiveIndex, tokio::time::Instant)>>,
}

impl FeedService {
    pub fn new(config: Configuration) -> Result<FeedService, FeedError> {
        let upstream = UpstreamClient::new(config.api_key.clone(), config.upstream_timeout)?;
        Ok(FeedService {
            upstream,
            cache: TtlCache::new(config.cache_capacity),
            flights: SingleFlight::new(),
            archive_index: Mutex::new(None),
            config,
        })
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    /// The payload of a table of the static archive, of the archive index or of the realtime feed
    ///
    /// A refresh started here keeps running if the caller goes away.
    pub async fn get_feed(self: &Arc<Self>, key: &FeedKey) -> Result<CachedPayload, FeedError> {
        if !self.upstream.has_credential() {
            return Err(FeedError::MissingCredential);
        }
        if let Some(payload) = self.cache.get(key) {
            return Ok(payload);
        }
        if self.is_known_missing(key) {
            return Err(FeedError::TableNotFound(key.clone()));
        }

        let source = key.source();
        let service = Arc::clone(self);
        let refreshed = self
            .flights
            .run(source.flight_key(), async move { service.refresh(source).await })
            .await;

        match refreshed {
            Ok(snapshot) => snapshot
                .get(key)
                .cloned()
                .ok_or_else(|| FeedError::TableNotFound(key.clone())),
            Err(e) => match self.cache.get_stale(key) {
                Some(stale) if self.config.serve_stale => {
                    warn!("{key}: serving expired entry, refresh failed: {e}");
                    Ok(stale)
                }
                _ => Err(e),
            },
        }
    }

    /// A fresh archive index that does not list `key`
    fn is_known_missing(&self, key: &FeedKey) -> bool {
        if key.source() != Source::StaticArchive || *key == FeedKey::archive_index() {
            return false;
        }
        let index = self
            .archive_index
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match &*index {
            Some((index, stored_at)) if stored_at.elapsed() < self.config.static_ttl => {
                !index.contains(key.as_str())
            }
            _ => false,
        }
    }

    async fn refresh(&self, source: Source) -> Result<Snapshot, FeedError> {
        let flight_key = source.flight_key();
        let start = Instant::now();
        info!("{flight_key}: refreshing from upstream");

        let refreshed = match source {
            Source::StaticArchive => self.refresh_archive().await,
            Source::Realtime => self.refresh_realtime().await,
        };
        match &refreshed {
            Ok(snapshot) => info!(
                "{flight_key}: cached {} payloads in {:.2}s",
                snapshot.len(),
                start.elapsed().as_secs_f32()
            ),
            Err(e) => error!(
                "{flight_key}: refresh failed after {:.2}s: {e}",
                start.elapsed().as_secs_f32()
            ),
        }
        refreshed
    }

    async fn refresh_archive(&self) -> Result<Snapshot, FeedError> {
        let bytes = self
            .upstream
            .fetch(&self.config.static_feed_url, "application/zip")
            .await?;

        let reader = ArchiveReader::default().suffix(self.config.table_suffix.as_str());
        let threshold = self.config.compression_threshold;
        let (payloads, index) = tokio::task::spawn_blocking(move || {
            archive_payloads(&reader, &bytes, threshold)
        })
        .await
        .map_err(|e| {
            error!("Archive processing task failed: {e}");
            FeedError::PipelineAborted
        })??;

        self.cache.put_all(
            payloads
                .iter()
                .map(|(key, payload)| (key.clone(), payload.clone())),
            self.config.static_ttl,
        );
        *self
            .archive_index
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some((index, tokio::time::Instant::now()));
        Ok(Arc::new(payloads))
    }

    async fn refresh_realtime(&self) -> Result<Snapshot, FeedError> {
        let bytes = self
            .upstream
            .fetch(&self.config.realtime_feed_url, "application/json")
            .await?;
        let feed = FeedMessage::from_slice(&bytes)?;
        debug!("{} vehicle positions", feed.vehicles().count());

        let payload = CachedPayload::json(&feed, self.config.compression_threshold)
            .map_err(|e| FeedError::MalformedFeed(e.to_string()))?;
        let key = FeedKey::realtime();
        self.cache
            .put(key.clone(), payload.clone(), self.config.realtime_ttl);

        let mut snapshot = FxHashMap::default();
        snapshot.insert(key, payload);
        Ok(Arc::new(snapshot))
    }
}

/// Extracts, parses and serializes every table of the archive, plus its index
///
/// Nothing is returned unless every table was read.
fn archive_payloads(
    reader: &ArchiveReader,
    bytes: &[u8],
    compression_threshold: usize,
) -> Result<(FxHashMap<FeedKey, CachedPayload>, ArchiveIndex), FeedError> {
    let archive = reader.extract(bytes)?;
    let mut payloads = FxHashMap::default();
    let mut tables = Vec::with_capacity(archive.entries.len());

    for entry in archive.entries {
        let key = match FeedKey::new(&entry.name) {
            Some(key) if key.source() == Source::StaticArchive && key != FeedKey::archive_index() => key,
            _ => {
                warn!("Skipping {}: not usable as a table name", entry.name);
                continue;
            }
        };

        let records = RawTable::parse(&entry.name, &entry.text)?.into_typed();
        debug!("{key}: {} records", records.len());
        let payload = CachedPayload::json(&records, compression_threshold)
            .map_err(|e| FeedError::CorruptArchive(format!("{key}: {e}")))?;
        tables.push(entry.name);
        payloads.insert(key, payload);
    }

    tables.sort();
    let mut files = archive.files;
    files.sort();
    let index = ArchiveIndex {
        sha256: archive.sha256,
        tables,
        files,
    };
    let payload = CachedPayload::json(&index, compression_threshold)
        .map_err(|e| FeedError::CorruptArchive(e.to_string()))?;
    payloads.insert(FeedKey::archive_index(), payload);
    Ok((payloads, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn archive(files: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in files {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn key(name: &str) -> FeedKey {
        FeedKey::new(name).unwrap()
    }

    #[test]
    fn every_table_and_the_index_are_built() {
        let bytes = archive(&[
            ("routes.txt", "route_id,route_type\n10,3\n"),
            ("stops.txt", "stop_id,stop_lat\n5000,-41.28\n"),
            ("README.md", "not a table"),
        ]);
        let (payloads, built) =
            archive_payloads(&ArchiveReader::default(), &bytes, usize::MAX).unwrap();
        assert_eq!(3, payloads.len());

        let routes: serde_json::Value =
            serde_json::from_slice(&payloads[&key("routes")].decoded().unwrap()).unwrap();
        assert_eq!(serde_json::json!([{"route_id": "10", "route_type": 3}]), routes);

        let index: ArchiveIndex =
            serde_json::from_slice(&payloads[&FeedKey::archive_index()].decoded().unwrap())
                .unwrap();
        assert_eq!(built, index);
        assert_eq!(vec!["routes", "stops"], index.tables);
        assert_eq!(vec!["README.md", "routes.txt", "stops.txt"], index.files);
        assert_eq!(64, index.sha256.len());
        assert!(index.contains("stops"));
        assert!(!index.contains("trips"));
    }

    #[test]
    fn reserved_and_invalid_names_are_skipped() {
        let bytes = archive(&[
            ("gtfs.txt", "a\n1\n"),
            ("vehiclepositions.txt", "a\n1\n"),
            ("Fare Rules.txt", "a\n1\n"),
            ("agency.txt", "agency_id\nMETLINK\n"),
        ]);
        let (payloads, _) =
            archive_payloads(&ArchiveReader::default(), &bytes, usize::MAX).unwrap();
        let index: ArchiveIndex =
            serde_json::from_slice(&payloads[&FeedKey::archive_index()].decoded().unwrap())
                .unwrap();
        assert_eq!(vec!["agency"], index.tables);
        assert_eq!(2, payloads.len());
    }

    #[test]
    fn corrupt_archive_is_an_error() {
        let outcome = archive_payloads(&ArchiveReader::default(), b"<html>", usize::MAX);
        assert!(matches!(outcome, Err(FeedError::CorruptArchive(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn tables_missing_from_a_fresh_index_are_not_found() {
        let config = Configuration {
            api_key: Some("key".to_owned()),
            static_ttl: std::time::Duration::from_secs(60),
            ..Configuration::default()
        };
        let service = Arc::new(FeedService::new(config).unwrap());
        *service.archive_index.lock().unwrap() = Some((
            ArchiveIndex {
                sha256: String::new(),
                tables: vec!["routes".to_owned(), "stops".to_owned()],
                files: vec!["routes.txt".to_owned(), "stops.txt".to_owned()],
            },
            tokio::time::Instant::now(),
        ));

        assert_eq!(
            Err(FeedError::TableNotFound(key("fare_rules"))),
            service.get_feed(&key("fare_rules")).await
        );
        assert!(!service.is_known_missing(&key("stops")));
        assert!(!service.is_known_missing(&FeedKey::realtime()));

        tokio::time::advance(std::time::Duration::from_secs(61)).await;
        assert!(!service.is_known_missing(&key("fare_rules")));
    }

    #[tokio::test]
    async fn missing_credential_answers_before_the_cache() {
        let service = Arc::new(FeedService::new(Configuration::default()).unwrap());
        service.cache().put(
            key("routes"),
            CachedPayload::json(&serde_json::json!([]), usize::MAX).unwrap(),
            std::time::Duration::from_secs(60),
        );
        assert_eq!(
            Err(FeedError::MissingCredential),
            service.get_feed(&key("routes")).await
        );
    }
}
