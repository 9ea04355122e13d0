use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
};

use alloy::rpc::types::{Filter, Log};
use tokio::sync::{mpsc, oneshot};

use crate::{
    FeedError,
    feed::{LiveFeed, LogSource, Unsubscribe},
};

const MOCK_FEED_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct State {
    backlog: Vec<Log>,
    preloaded: Vec<Log>,
    historical_failure: Option<FeedError>,
    live_failure: Option<FeedError>,
    historical_calls: usize,
    live_calls: usize,
    filters: Vec<Filter>,
    feeds: VecDeque<MockFeed>,
}

/// Scripted [`LogSource`] for tests.
///
/// `historical` returns the configured backlog; `live` opens a [`MockFeed`] the test drives by
/// hand. Every call and every release is recorded.
///
/// Clones share state, so a test can keep one clone for inspection and hand another to
/// [`ContractEvents`](crate::ContractEvents).
#[derive(Debug, Clone, Default)]
pub struct MockLogSource {
    state: Arc<Mutex<State>>,
}

impl MockLogSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs returned by every `historical` call.
    #[must_use]
    pub fn with_backlog(self, backlog: impl IntoIterator<Item = Log>) -> Self {
        self.lock().backlog = backlog.into_iter().collect();
        self
    }

    /// Logs already buffered in every live feed when it is opened.
    #[must_use]
    pub fn with_live_logs(self, logs: impl IntoIterator<Item = Log>) -> Self {
        self.lock().preloaded = logs.into_iter().collect();
        self
    }

    /// Makes every `historical` call fail with `err`.
    #[must_use]
    pub fn failing_historical(self, err: FeedError) -> Self {
        self.lock().historical_failure = Some(err);
        self
    }

    /// Makes every `live` call fail with `err`.
    #[must_use]
    pub fn failing_live(self, err: FeedError) -> Self {
        self.lock().live_failure = Some(err);
        self
    }

    #[must_use]
    pub fn historical_calls(&self) -> usize {
        self.lock().historical_calls
    }

    #[must_use]
    pub fn live_calls(&self) -> usize {
        self.lock().live_calls
    }

    /// Every filter passed to the source, in call order.
    #[must_use]
    pub fn filters(&self) -> Vec<Filter> {
        self.lock().filters.clone()
    }

    /// Handle to the most recently opened live feed.
    #[must_use]
    pub fn last_feed(&self) -> Option<MockFeed> {
        self.lock().feeds.back().cloned()
    }

    /// Total number of releases across all feeds opened so far.
    #[must_use]
    pub fn unsubscribe_count(&self) -> usize {
        self.lock().feeds.iter().map(MockFeed::release_count).sum()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("mock log source state poisoned")
    }
}

impl LogSource for MockLogSource {
    async fn historical(&self, filter: &Filter) -> Result<Vec<Log>, FeedError> {
        let mut state = self.lock();
        state.historical_calls += 1;
        state.filters.push(filter.clone());
        match &state.historical_failure {
            Some(err) => Err(err.clone()),
            None => Ok(state.backlog.clone()),
        }
    }

    async fn live(&self, filter: &Filter) -> Result<LiveFeed, FeedError> {
        let mut state = self.lock();
        state.live_calls += 1;
        state.filters.push(filter.clone());
        if let Some(err) = &state.live_failure {
            return Err(err.clone());
        }

        let (log_tx, log_rx) = mpsc::channel(MOCK_FEED_CAPACITY);
        for log in &state.preloaded {
            log_tx.try_send(log.clone()).expect("preloaded logs exceed mock feed capacity");
        }
        let (err_tx, err_rx) = oneshot::channel();
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let unsubscribe = Unsubscribe::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        state.feeds.push_back(MockFeed {
            logs: Arc::new(Mutex::new(Some(log_tx))),
            errors: Arc::new(Mutex::new(Some(err_tx))),
            unsubscribe: unsubscribe.clone(),
            released,
        });

        Ok(LiveFeed::new(log_rx, err_rx, unsubscribe))
    }
}

/// The upstream end of a live feed opened by [`MockLogSource`].
#[derive(Debug, Clone)]
pub struct MockFeed {
    logs: Arc<Mutex<Option<mpsc::Sender<Log>>>>,
    errors: Arc<Mutex<Option<oneshot::Sender<FeedError>>>>,
    unsubscribe: Unsubscribe,
    released: Arc<AtomicUsize>,
}

impl MockFeed {
    /// Delivers `log` to the feed. Returns `false` once the feed was released, completed or
    /// dropped by its consumer.
    pub async fn push(&self, log: Log) -> bool {
        if self.unsubscribe.is_unsubscribed() {
            return false;
        }
        let sender = self.logs.lock().expect("mock feed poisoned").clone();
        match sender {
            Some(sender) => sender.send(log).await.is_ok(),
            None => false,
        }
    }

    /// Ends the feed with `err`.
    pub fn fail(&self, err: FeedError) {
        if let Some(errors) = self.errors.lock().expect("mock feed poisoned").take() {
            _ = errors.send(err);
        }
    }

    /// Closes the log channel only. The feed stays open until [`fail`](MockFeed::fail) or
    /// [`complete`](MockFeed::complete).
    pub fn close_logs(&self) {
        self.logs.lock().expect("mock feed poisoned").take();
    }

    /// Ends the feed cleanly: both channels are closed without an error.
    pub fn complete(&self) {
        self.logs.lock().expect("mock feed poisoned").take();
        self.errors.lock().expect("mock feed poisoned").take();
    }

    #[must_use]
    pub fn is_unsubscribed(&self) -> bool {
        self.unsubscribe.is_unsubscribed()
    }

    /// How many times the release callback ran. Anything but 0 or 1 is a bug.
    #[must_use]
    pub fn release_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}
