use derivative::Derivative;
use log::{info, warn};
use std::env;
use std::fmt::Display;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

/// Runtime settings, read once from the environment
#[derive(Derivative, Clone)]
#[derivative(Default, Debug)]
pub struct Configuration {
    /// Sent upstream as `x-api-key`. Requests are refused with 503 while it is unset
    #[derivative(Debug = "ignore")]
    pub api_key: Option<String>,
    #[derivative(Default(
        value = "\"https://static.opendata.metlink.org.nz/v1/gtfs/full.zip\".to_owned()"
    ))]
    pub static_feed_url: String,
    #[derivative(Default(
        value = "\"https://api.opendata.metlink.org.nz/v1/gtfs-rt/vehiclepositions\".to_owned()"
    ))]
    pub realtime_feed_url: String,
    #[derivative(Default(value = "Duration::from_secs(86400)"))]
    pub static_ttl: Duration,
    #[derivative(Default(value = "Duration::from_secs(5)"))]
    pub realtime_ttl: Duration,
    #[derivative(Default(value = "Duration::from_secs(30)"))]
    pub upstream_timeout: Duration,
    #[derivative(Default(value = "\".txt\".to_owned()"))]
    pub table_suffix: String,
    /// Payloads of at least this many bytes are kept gzipped in the cache
    #[derivative(Default(value = "8192"))]
    pub compression_threshold: usize,
    /// Entries kept before expired ones are evicted; fresh entries are never evicted
    #[derivative(Default(value = "64"))]
    pub cache_capacity: usize,
    /// Answer with an expired entry when its refresh fails
    #[derivative(Default(value = "true"))]
    pub serve_stale: bool,
    #[derivative(Default(value = "IpAddr::from([0, 0, 0, 0])"))]
    pub bind_addr: IpAddr,
    #[derivative(Default(value = "3030"))]
    pub port: u16,
}

impl Configuration {
    pub fn from_env() -> Self {
        let default = Configuration::default();
        Configuration {
            api_key: env::var("METLINK_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            static_feed_url: try_load("STATIC_FEED_URL", default.static_feed_url),
            realtime_feed_url: try_load("REALTIME_FEED_URL", default.realtime_feed_url),
            static_ttl: Duration::from_secs(try_load(
                "STATIC_TTL_SECS",
                default.static_ttl.as_secs(),
            )),
            realtime_ttl: Duration::from_secs(try_load(
                "REALTIME_TTL_SECS",
                default.realtime_ttl.as_secs(),
            )),
            upstream_timeout: Duration::from_secs(try_load(
                "UPSTREAM_TIMEOUT_SECS",
                default.upstream_timeout.as_secs(),
            )),
            table_suffix: try_load("TABLE_SUFFIX", default.table_suffix),
            compression_threshold: try_load(
                "COMPRESSION_THRESHOLD_BYTES",
                default.compression_threshold,
            ),
            cache_capacity: try_load("CACHE_CAPACITY", default.cache_capacity).max(1),
            serve_stale: try_load("SERVE_STALE", default.serve_stale),
            bind_addr: try_load("BIND_ADDR", default.bind_addr),
            port: try_load("PORT", default.port),
        }
    }

    pub fn log_summary(&self) {
        info!(
            "static feed {} (ttl {}s), realtime feed {} (ttl {}s)",
            self.static_feed_url,
            self.static_ttl.as_secs(),
            self.realtime_feed_url,
            self.realtime_ttl.as_secs()
        );
        if self.api_key.is_none() {
            warn!("METLINK_API_KEY is not set, every feed request will answer 503");
        }
    }
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Err(_) => default,
        Ok(value) => value.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value '{value}': {e}, using default {default}");
            default
        }),
    }
}
