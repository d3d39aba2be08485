use crate::error::FeedError;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, error};
use rustc_hash::FxHashMap;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Flight<V> = Shared<BoxFuture<'static, Result<V, FeedError>>>;
type Registry<K, V> = Arc<Mutex<FxHashMap<K, Flight<V>>>>;

/// Runs at most one pipeline per key at a time
///
/// Callers arriving while a pipeline is in flight for their key wait for it and get a clone
/// of its outcome instead of starting their own. The pipeline is spawned, so it finishes (and
/// its key is released) even if every caller gives up waiting.
pub struct SingleFlight<K, V> {
    in_flight: Registry<K, V>,
}

fn lock<K, V>(registry: &Registry<K, V>) -> MutexGuard<'_, FxHashMap<K, Flight<V>>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes the key when the pipeline task ends, panics included
struct Landing<K: Hash + Eq, V> {
    registry: Registry<K, V>,
    key: K,
}

impl<K: Hash + Eq, V> Drop for Landing<K, V> {
    fn drop(&mut self) {
        lock(&self.registry).remove(&self.key);
    }
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        SingleFlight {
            in_flight: Arc::new(Mutex::new(FxHashMap::default())),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Hash + Eq + Clone + Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        SingleFlight::default()
    }

    /// Joins the pipeline in flight for `key`, or starts `pipeline` if there is none
    ///
    /// `pipeline` is dropped without being polled when a flight is joined.
    pub async fn run<F>(&self, key: K, pipeline: F) -> Result<V, FeedError>
    where
        F: Future<Output = Result<V, FeedError>> + Send + 'static,
    {
        let flight = {
            let mut in_flight = lock(&self.in_flight);
            match in_flight.get(&key) {
                Some(flight) => {
                    debug!("{key}: joining fetch in flight");
                    flight.clone()
                }
                None => {
                    let landing = Landing {
                        registry: Arc::clone(&self.in_flight),
                        key: key.clone(),
                    };
                    // The registry lock is held until the flight is inserted, so the
                    // landing of a fast pipeline cannot run before that
                    let task = tokio::spawn(async move {
                        let _landing = landing;
                        pipeline.await
                    });
                    let flight_key = key.clone();
                    let flight = async move {
                        task.await.unwrap_or_else(|e| {
                            error!("{flight_key}: fetch pipeline aborted: {e}");
                            Err(FeedError::PipelineAborted)
                        })
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(key, flight.clone());
                    flight
                }
            }
        };
        flight.await
    }

    /// Number of keys with a pipeline in flight
    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }
}
