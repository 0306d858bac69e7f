//! The cache-and-refresh engine behind a single API key.

use std::{
    sync::{
        Arc, Mutex, PoisonError, Weak,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use thiserror::Error;
use tokio::{
    sync::{Mutex as AsyncMutex, broadcast},
    runtime::Handle,
    task::JoinHandle,
    time::{Instant, sleep_until},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    cache::WeatherCache,
    clock::Clock,
    config::Config,
    error::HandleError,
    model::{UpdatePolicy, Weather},
    registry::RegistryShared,
    remote::RemoteClient,
};

const POLLING_ERRORS_CAPACITY: usize = 64;
const MIN_POLL_PERIOD: Duration = Duration::from_secs(1);

/// A background refresh of one city failed.
#[derive(Debug, Clone, Error)]
#[error("failed to refresh weather for '{city}'")]
pub struct PollingError {
    pub city: String,
    #[source]
    pub error: Arc<HandleError>,
}

/// A live handle to the weather API, bound to one credential.
///
/// Clones share the same cache and lifecycle. Create handles through a
/// [`Registry`](crate::Registry), which guarantees one live handle per credential.
#[derive(Debug, Clone)]
pub struct WeatherHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    state: Arc<HandleState>,
    disposed: AtomicBool,
    cancel: CancellationToken,
    poller: Mutex<Option<JoinHandle<()>>>,
    registry: Weak<RegistryShared>,
}

/// Everything the poller needs; it never holds the lifecycle half of the handle.
#[derive(Debug)]
struct HandleState {
    credential: String,
    policy: UpdatePolicy,
    refresh_period_secs: u64,
    remote: RemoteClient,
    clock: Arc<dyn Clock>,
    cache: AsyncMutex<WeatherCache>,
    polling_errors: broadcast::Sender<PollingError>,
}

impl WeatherHandle {
    /// Build a handle and, for [`UpdatePolicy::Polling`], start its poller.
    ///
    /// Fails with [`HandleError::NoRuntime`] when a polling handle is built
    /// outside a Tokio runtime.
    pub(crate) fn spawn(
        credential: String,
        policy: UpdatePolicy,
        config: &Config,
        remote: RemoteClient,
        clock: Arc<dyn Clock>,
        registry: Weak<RegistryShared>,
    ) -> Result<Self, HandleError> {
        let runtime = match policy {
            UpdatePolicy::OnDemand => None,
            UpdatePolicy::Polling => {
                Some(Handle::try_current().map_err(|_| HandleError::NoRuntime)?)
            }
        };

        let (polling_errors, _) = broadcast::channel(POLLING_ERRORS_CAPACITY);
        let state = Arc::new(HandleState {
            credential,
            policy,
            refresh_period_secs: config.refresh_period_secs,
            remote,
            clock,
            cache: AsyncMutex::new(WeatherCache::new(config.cache_limit)),
            polling_errors,
        });

        let cancel = CancellationToken::new();
        let poller = runtime.map(|runtime| {
            let period = config.refresh_period().max(MIN_POLL_PERIOD);
            let first_pass = Instant::now() + period;
            runtime.spawn(poll_loop(Arc::clone(&state), period, first_pass, cancel.clone()))
        });

        info!(
            credential = %masked(&state.credential),
            policy = %policy,
            cache_limit = config.cache_limit,
            refresh_period_secs = config.refresh_period_secs,
            "weather handle created"
        );

        Ok(Self {
            inner: Arc::new(HandleInner {
                state,
                disposed: AtomicBool::new(false),
                cancel,
                poller: Mutex::new(poller),
                registry,
            }),
        })
    }

    pub fn credential(&self) -> &str {
        &self.inner.state.credential
    }

    pub fn policy(&self) -> UpdatePolicy {
        self.inner.state.policy
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Names of the currently cached cities, in insertion order.
    pub async fn cached_cities(&self) -> Vec<String> {
        self.inner.state.cache.lock().await.cities()
    }

    /// Current weather in `city`, serialized to the caller-facing JSON form.
    pub async fn get_weather(&self, city: &str) -> Result<String, HandleError> {
        self.lookup(city).await?.to_json()
    }

    /// Current weather in `city`, served from the cache when possible.
    pub async fn lookup(&self, city: &str) -> Result<Weather, HandleError> {
        if self.is_disposed() {
            return Err(HandleError::Disposed);
        }
        self.inner.state.lookup(city).await
    }

    /// Receive failures of the background refresh. Only polling handles ever send.
    pub fn subscribe_polling_errors(&self) -> broadcast::Receiver<PollingError> {
        self.inner.state.polling_errors.subscribe()
    }

    /// Release the credential and stop background polling.
    ///
    /// Returns immediately; a refresh already in flight may still complete.
    /// Calling it again is a no-op.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(registry) = self.inner.registry.upgrade() {
            registry.unregister(self);
        }
        self.inner.cancel.cancel();

        info!(credential = %masked(self.credential()), "weather handle disposed");
    }

    /// [`dispose`](Self::dispose), then wait for the poller to exit.
    pub async fn dispose_and_wait(&self) {
        self.dispose();

        let poller = self.inner.poller.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(poller) = poller {
            if let Err(e) = poller.await {
                warn!(credential = %masked(self.credential()), err = %e, "poller task failed");
            }
        }
    }

    pub(crate) fn same_handle(&self, other: &WeatherHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl HandleState {
    async fn lookup(&self, city: &str) -> Result<Weather, HandleError> {
        let now = self.clock.now_secs();
        let mut cache = self.cache.lock().await;

        if let Some(entry) = cache.touch(city, now) {
            if self.policy == UpdatePolicy::OnDemand && self.is_stale(entry.weather.dt, now) {
                debug!(city, dt = entry.weather.dt, now, "cached weather is stale, refreshing");
                entry.weather =
                    self.remote.fetch_weather(&self.credential, entry.weather.coord).await?;
            } else {
                debug!(city, "cache hit");
            }
            return Ok(entry.weather.clone());
        }

        debug!(city, "cache miss");
        let weather = self.remote.fetch_weather_in_city(&self.credential, city).await?;

        if let Some(evicted) = cache.insert(city, weather.clone(), now) {
            debug!(city, evicted = %evicted, "cache full, evicted least recently requested city");
        }
        debug!(city, cached = cache.len(), "weather fetched");

        Ok(weather)
    }

    fn is_stale(&self, dt: i64, now: i64) -> bool {
        let period = i64::try_from(self.refresh_period_secs).unwrap_or(i64::MAX);
        now.saturating_sub(dt) > period
    }

    /// Re-fetch every cached city from its stored coordinates.
    async fn refresh_all(&self, cancel: &CancellationToken) {
        let mut cache = self.cache.lock().await;

        for (city, coord) in cache.refresh_targets() {
            if cancel.is_cancelled() {
                break;
            }

            match self.remote.fetch_weather(&self.credential, coord).await {
                Ok(weather) => cache.replace_weather(&city, weather),
                Err(error) => {
                    warn!(
                        credential = %masked(&self.credential),
                        city = %city,
                        err = %error,
                        "background refresh failed"
                    );
                    // No subscribers is fine.
                    let _ = self.polling_errors.send(PollingError { city, error: Arc::new(error) });
                }
            }
        }
    }
}

/// Refresh every `period`, measured from the start of one pass to the start of the next.
async fn poll_loop(
    state: Arc<HandleState>,
    period: Duration,
    mut next_pass: Instant,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = sleep_until(next_pass) => {}
        }

        next_pass = Instant::now() + period;
        debug!(credential = %masked(&state.credential), "polling pass");
        state.refresh_all(&cancel).await;
    }

    debug!(credential = %masked(&state.credential), "poller stopped");
}

/// Show only the tail of a credential in logs.
pub(crate) fn masked(credential: &str) -> String {
    let count = credential.chars().count();
    if count <= 4 {
        return "***".to_string();
    }
    let tail: String = credential.chars().skip(count - 4).collect();
    format!("***{tail}")
}
