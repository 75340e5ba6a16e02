use crate::data_sync::{
    config::DataSyncConfig,
    fetcher::{HttpFetcher, RecordFetcher},
    merge::{merge_response, KeyFn, MergeStats},
    rate::{ExchangeRate, RateSource},
    records::Keyed,
};
use crate::error::SyncError;
use crate::logic::{
    conversion::{to_display_value, DisplayValue, Unit},
    pagination::{paginate, PageWindow},
    search::{filter_records, Searchable},
};
use eyre::{eyre, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// What became of one fetch-and-merge cycle
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The response replaced the collection
    Applied(MergeStats),
    /// The fetch failed; the collection was left as it was
    Failed(SyncError),
    /// A response to a later request had already been applied
    Stale,
    /// The store was stopped while the request was in flight
    Cancelled,
}

impl FetchOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Counters for one store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Completed fetches, including failed and stale ones
    pub fetches: u64,
    pub applied: u64,
    pub failed: u64,
    pub stale: u64,
    pub last_merge: Option<MergeStats>,
}

#[derive(Debug)]
struct StoreState<R> {
    collection: Vec<R>,
    page_index: usize,
    page_size: usize,
    rate: ExchangeRate,
    last_error: Option<SyncError>,
    /// Sequence number of the response currently shown, 0 before the first
    last_applied_seq: u64,
    stats: StoreStats,
}

type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

/// A fetch running on its own task, plus the handle callers join it through
struct InFlight {
    fetch: SharedFetch,
    task: AbortHandle,
}

/// State and fetch machinery shared between the store handle and its poll task
struct StoreCore<R, K> {
    fetcher: Arc<dyn RecordFetcher>,
    key_of: KeyFn<R, K>,
    state: RwLock<StoreState<R>>,
    in_flight: Mutex<Option<InFlight>>,
    next_seq: AtomicU64,
    /// Bumped by `stop`; completions from an older generation are dropped
    generation: AtomicU64,
}

impl<R, K> StoreCore<R, K>
where
    R: DeserializeOwned + Clone + Send + Sync + 'static,
    K: Eq + Hash + Send + Sync + 'static,
{
    /// Join the fetch in flight, or start one if there is none
    async fn refresh(self: &Arc<Self>) -> FetchOutcome {
        let fetch = {
            let mut slot = self.in_flight.lock().await;
            let joinable = slot
                .as_ref()
                .filter(|in_flight| !in_flight.task.is_finished())
                .map(|in_flight| in_flight.fetch.clone());
            match joinable {
                Some(fetch) => {
                    debug!("Joining in-flight fetch of {}", self.fetcher.endpoint());
                    fetch
                }
                None => {
                    let in_flight = self.spawn_fetch();
                    let fetch = in_flight.fetch.clone();
                    *slot = Some(in_flight);
                    fetch
                }
            }
        };
        fetch.await
    }

    /// Run one fetch on its own task so it completes even if every caller
    /// stops waiting for it
    fn spawn_fetch(self: &Arc<Self>) -> InFlight {
        let task = tokio::spawn(Arc::clone(self).fetch_and_apply());
        let abort = task.abort_handle();
        let endpoint = self.fetcher.endpoint().to_string();

        let fetch = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    if !e.is_cancelled() {
                        warn!("Fetch task for {} ended abnormally: {}", endpoint, e);
                    }
                    FetchOutcome::Cancelled
                }
            }
        }
        .boxed()
        .shared();

        InFlight { fetch, task: abort }
    }

    async fn fetch_and_apply(self: Arc<Self>) -> FetchOutcome {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = self.generation.load(Ordering::SeqCst);

        let result = self
            .fetcher
            .fetch_json()
            .await
            .and_then(|body| merge_response(body, &self.key_of));

        let mut state = self.state.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Dropping response #{} from {}: store stopped", seq, self.fetcher.endpoint());
            return FetchOutcome::Cancelled;
        }

        state.stats.fetches += 1;
        if seq < state.last_applied_seq {
            state.stats.stale += 1;
            debug!(
                "Dropping stale response #{} from {} (showing #{})",
                seq,
                self.fetcher.endpoint(),
                state.last_applied_seq
            );
            return FetchOutcome::Stale;
        }

        match result {
            Ok((collection, merge)) => {
                debug!(
                    "Applied response #{} from {}: {} records ({} duplicates)",
                    seq,
                    self.fetcher.endpoint(),
                    merge.retained,
                    merge.duplicates
                );
                state.collection = collection;
                state.last_applied_seq = seq;
                state.last_error = None;
                state.stats.applied += 1;
                state.stats.last_merge = Some(merge);
                FetchOutcome::Applied(merge)
            }
            Err(e) => {
                warn!("Fetch #{} from {} failed: {}", seq, self.fetcher.endpoint(), e);
                state.last_error = Some(e.clone());
                state.stats.failed += 1;
                FetchOutcome::Failed(e)
            }
        }
    }

    async fn refresh_rate(&self, source: &RateSource) -> ExchangeRate {
        let generation = self.generation.load(Ordering::SeqCst);
        let fetched = source.fetch_logged().await;

        let mut state = self.state.write().await;
        if let Some(rate) = fetched {
            if self.generation.load(Ordering::SeqCst) == generation {
                state.rate = ExchangeRate::Known(rate);
            }
        }
        state.rate
    }

    async fn is_loading(&self) -> bool {
        self.in_flight.lock().await.as_ref().is_some_and(|in_flight| !in_flight.task.is_finished())
    }
}

/// Keeps one data series in sync with a JSON endpoint.
///
/// The store fetches on `start`, then on every poll tick if it has a poll
/// interval. Each successful response replaces the collection wholesale,
/// deduplicated by `key_of`. Failures are recorded in
/// [`last_error`](Self::last_error) and never returned as `Err`; the next
/// tick retries. Pages are cut from the current collection on demand.
pub struct DataSyncStore<R, K> {
    core: Arc<StoreCore<R, K>>,
    poll_interval: Option<Duration>,
    secondary_rate: Option<RateSource>,
    poll_task: Option<JoinHandle<()>>,
    rate_task: Option<JoinHandle<()>>,
    started: bool,
}

impl<R, K> DataSyncStore<R, K>
where
    R: DeserializeOwned + Clone + Send + Sync + 'static,
    K: Eq + Hash + Send + Sync + 'static,
{
    pub fn builder() -> DataSyncStoreBuilder<R, K> {
        DataSyncStoreBuilder::new()
    }

    /// Fetch immediately, fetch the secondary rate in the background, and
    /// schedule polling if configured.
    ///
    /// Returns the outcome of the immediate fetch, or `None` when the store
    /// was already started.
    pub async fn start(&mut self) -> Option<FetchOutcome> {
        if self.started {
            debug!("Store for {} already started", self.endpoint());
            return None;
        }
        self.started = true;
        info!("Starting store for {} (poll interval: {:?})", self.endpoint(), self.poll_interval);

        if let Some(source) = self.secondary_rate.clone() {
            let core = Arc::clone(&self.core);
            self.rate_task = Some(tokio::spawn(async move {
                core.refresh_rate(&source).await;
            }));
        }

        let initial = self.core.refresh().await;

        if let Some(period) = self.poll_interval {
            self.poll_task = Some(self.spawn_poll_task(period));
        }

        Some(initial)
    }

    /// Cancel polling and invalidate anything in flight. Nothing mutates the
    /// store after this returns. Safe to call any number of times.
    pub async fn stop(&mut self) {
        self.core.generation.fetch_add(1, Ordering::SeqCst);

        for task in [self.poll_task.take(), self.rate_task.take()].into_iter().flatten() {
            task.abort();
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("Store task for {} ended abnormally: {}", self.endpoint(), e);
                }
            }
        }

        if let Some(in_flight) = self.core.in_flight.lock().await.take() {
            in_flight.task.abort();
        }

        // a completion that passed the generation check still holds the lock
        drop(self.core.state.write().await);

        if self.started {
            info!("Stopped store for {}", self.endpoint());
        }
        self.started = false;
    }

    /// Fetch now, outside the poll cadence. Overlapping calls share one request.
    pub async fn refresh(&self) -> FetchOutcome {
        self.core.refresh().await
    }

    /// Re-fetch the secondary rate. Returns the rate now held, which is the
    /// previous one if the fetch failed.
    pub async fn refresh_rate(&self) -> ExchangeRate {
        match &self.secondary_rate {
            Some(source) => self.core.refresh_rate(source).await,
            None => self.rate().await,
        }
    }

    /// Page `index` of the collection, clamped into range. Becomes the current page.
    pub async fn get_page(&self, index: i64) -> PageWindow<R> {
        let mut state = self.core.state.write().await;
        let window = paginate(&state.collection, index, state.page_size);
        state.page_index = window.page_index;
        window
    }

    pub async fn current_page(&self) -> PageWindow<R> {
        let state = self.core.state.read().await;
        paginate(&state.collection, state.page_index as i64, state.page_size)
    }

    /// Change the page size and go back to the first page
    pub async fn set_page_size(&self, page_size: usize) {
        let page_size = if page_size == 0 {
            warn!("Page size 0 requested for {}, using 1", self.endpoint());
            1
        } else {
            page_size
        };

        let mut state = self.core.state.write().await;
        state.page_size = page_size;
        state.page_index = 0;
    }

    pub async fn page_size(&self) -> usize {
        self.core.state.read().await.page_size
    }

    pub async fn records(&self) -> Vec<R> {
        self.core.state.read().await.collection.clone()
    }

    pub async fn len(&self) -> usize {
        self.core.state.read().await.collection.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn last_error(&self) -> Option<SyncError> {
        self.core.state.read().await.last_error.clone()
    }

    pub async fn rate(&self) -> ExchangeRate {
        self.core.state.read().await.rate
    }

    /// Format a satoshi amount with the store's current rate
    pub async fn display_value(&self, raw_satoshis: u64, unit: Unit) -> DisplayValue {
        to_display_value(raw_satoshis, unit, self.rate().await)
    }

    /// True while a fetch is in flight
    pub async fn is_loading(&self) -> bool {
        self.core.is_loading().await
    }

    pub async fn stats(&self) -> StoreStats {
        self.core.state.read().await.stats.clone()
    }

    pub fn is_running(&self) -> bool {
        self.started
    }

    pub fn endpoint(&self) -> &str {
        self.core.fetcher.endpoint()
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval
    }

    fn spawn_poll_task(&self, period: Duration) -> JoinHandle<()> {
        let core = Arc::clone(&self.core);
        let generation = core.generation.load(Ordering::SeqCst);

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if core.generation.load(Ordering::SeqCst) != generation {
                    break;
                }
                match core.refresh().await {
                    FetchOutcome::Applied(merge) => debug!("Poll tick: {} records", merge.retained),
                    FetchOutcome::Failed(_) => debug!("Poll tick failed, retrying next tick"),
                    FetchOutcome::Stale => {}
                    FetchOutcome::Cancelled => break,
                }
            }
        })
    }
}

impl<R, K> DataSyncStore<R, K>
where
    R: DeserializeOwned + Clone + Searchable + Send + Sync + 'static,
    K: Eq + Hash + Send + Sync + 'static,
{
    /// Page `index` of the records matching `term`. Does not move the current page.
    pub async fn search_page(&self, term: &str, index: i64) -> PageWindow<R> {
        let state = self.core.state.read().await;
        let matching = filter_records(&state.collection, term);
        paginate(&matching, index, state.page_size)
    }
}

impl<R, K> Drop for DataSyncStore<R, K> {
    fn drop(&mut self) {
        self.core.generation.fetch_add(1, Ordering::SeqCst);
        for task in [self.poll_task.take(), self.rate_task.take()].into_iter().flatten() {
            task.abort();
        }
        if let Ok(mut slot) = self.core.in_flight.try_lock() {
            if let Some(in_flight) = slot.take() {
                in_flight.task.abort();
            }
        }
    }
}

/// Builder for [`DataSyncStore`]
pub struct DataSyncStoreBuilder<R, K> {
    endpoint: Option<String>,
    fetcher: Option<Arc<dyn RecordFetcher>>,
    key_of: Option<KeyFn<R, K>>,
    poll_interval: Option<Duration>,
    page_size: usize,
    http_timeout: Duration,
    secondary_rate: Option<RateSource>,
}

impl<R, K> DataSyncStoreBuilder<R, K>
where
    R: DeserializeOwned + Clone + Send + Sync + 'static,
    K: Eq + Hash + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            endpoint: None,
            fetcher: None,
            key_of: None,
            poll_interval: None,
            page_size: DEFAULT_PAGE_SIZE,
            http_timeout: Duration::from_secs(10),
            secondary_rate: None,
        }
    }

    /// Endpoint `path` under the configured API, with the configured cadence,
    /// page size and timeout
    pub fn from_config(config: &DataSyncConfig, path: &str) -> Self {
        Self::new()
            .endpoint(config.endpoint(path))
            .poll_interval(config.poll_interval())
            .page_size(config.page_size)
            .http_timeout(config.http_timeout())
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Use a custom fetcher instead of HTTP; overrides `endpoint`
    pub fn fetcher(mut self, fetcher: Arc<dyn RecordFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn key_of<F>(mut self, key_of: F) -> Self
    where
        F: Fn(&R) -> K + Send + Sync + 'static,
    {
        self.key_of = Some(Arc::new(key_of));
        self
    }

    pub fn key_fn(mut self, key_of: KeyFn<R, K>) -> Self {
        self.key_of = Some(key_of);
        self
    }

    /// `None` fetches once on start
    pub fn poll_interval(mut self, poll_interval: Option<Duration>) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn one_shot(self) -> Self {
        self.poll_interval(None)
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn http_timeout(mut self, http_timeout: Duration) -> Self {
        self.http_timeout = http_timeout;
        self
    }

    pub fn secondary_rate(mut self, source: RateSource) -> Self {
        self.secondary_rate = Some(source);
        self
    }

    pub fn build(self) -> Result<DataSyncStore<R, K>> {
        let key_of = self.key_of.ok_or_else(|| eyre!("DataSyncStore needs a key_of function"))?;
        if self.page_size == 0 {
            return Err(eyre!("Page size must be at least 1"));
        }
        if self.poll_interval.is_some_and(|p| p.is_zero()) {
            return Err(eyre!("Poll interval must be positive"));
        }

        let fetcher: Arc<dyn RecordFetcher> = match (self.fetcher, self.endpoint) {
            (Some(fetcher), _) => fetcher,
            (None, Some(endpoint)) => Arc::new(
                HttpFetcher::new(endpoint, self.http_timeout).map_err(|e| eyre!("Invalid fetcher: {}", e))?,
            ),
            (None, None) => return Err(eyre!("DataSyncStore needs an endpoint or a fetcher")),
        };

        let state = StoreState {
            collection: Vec::new(),
            page_index: 0,
            page_size: self.page_size,
            rate: ExchangeRate::Unknown,
            last_error: None,
            last_applied_seq: 0,
            stats: StoreStats::default(),
        };

        Ok(DataSyncStore {
            core: Arc::new(StoreCore {
                fetcher,
                key_of,
                state: RwLock::new(state),
                in_flight: Mutex::new(None),
                next_seq: AtomicU64::new(0),
                generation: AtomicU64::new(0),
            }),
            poll_interval: self.poll_interval,
            secondary_rate: self.secondary_rate,
            poll_task: None,
            rate_task: None,
            started: false,
        })
    }
}

impl<R> DataSyncStoreBuilder<R, R::Key>
where
    R: Keyed + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Dedup by the record's natural key
    pub fn keyed(self) -> Self {
        self.key_of(|record: &R| record.key())
    }
}

impl<R, K> Default for DataSyncStoreBuilder<R, K>
where
    R: DeserializeOwned + Clone + Send + Sync + 'static,
    K: Eq + Hash + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
