//! The live-feed primitive shared by iterators and subscriptions, and the [`LogSource`] seam
//! that produces it.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use alloy::rpc::types::{Filter, Log};
use tokio::sync::{mpsc, oneshot};

use crate::FeedError;

/// Where matched logs come from.
///
/// A source answers two questions for a resolved [`Filter`]: which logs already exist
/// (ledger order, oldest first) and which logs arrive from now on. The engine owns each
/// [`LiveFeed`] it obtains and releases it exactly once.
pub trait LogSource: Send + Sync + 'static {
    /// Returns every historical log matching `filter`, in ledger order.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying retrieval fails.
    fn historical(
        &self,
        filter: &Filter,
    ) -> impl Future<Output = Result<Vec<Log>, FeedError>> + Send;

    /// Opens a feed of logs matching `filter` that arrive from now on.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be established.
    fn live(&self, filter: &Filter) -> impl Future<Output = Result<LiveFeed, FeedError>> + Send;
}

impl<S: LogSource> LogSource for Arc<S> {
    fn historical(
        &self,
        filter: &Filter,
    ) -> impl Future<Output = Result<Vec<Log>, FeedError>> + Send {
        S::historical(self, filter)
    }

    fn live(&self, filter: &Filter) -> impl Future<Output = Result<LiveFeed, FeedError>> + Send {
        S::live(self, filter)
    }
}

/// Releases a live feed's upstream resources.
///
/// Cloning shares the same release: whichever clone fires first runs the callback, every later
/// call is a no-op.
#[derive(Clone)]
pub struct Unsubscribe {
    fired: Arc<AtomicBool>,
    release: Arc<dyn Fn() + Send + Sync>,
}

impl Unsubscribe {
    pub fn new(release: impl Fn() + Send + Sync + 'static) -> Self {
        Self { fired: Arc::new(AtomicBool::new(false)), release: Arc::new(release) }
    }

    /// A release with nothing to release.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// Runs the release callback unless it already ran.
    pub fn unsubscribe(&self) {
        if !self.fired.swap(true, Ordering::AcqRel) {
            (self.release)();
        }
    }

    #[must_use]
    pub fn is_unsubscribed(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe").field("fired", &self.is_unsubscribed()).finish()
    }
}

/// What a [`LiveFeed`] produced next.
#[derive(Debug)]
pub enum FeedEvent {
    Log(Log),
    /// The feed ended with a terminal error.
    Failed(FeedError),
    /// The feed ended cleanly.
    Completed,
}

/// A live stream of logs with a single terminal outcome.
///
/// Built from the three parts a source hands out: a log channel (arrival order), an error
/// channel that carries at most one terminal error, and an [`Unsubscribe`] handle. The feed
/// completes once both channels are closed and no error was sent.
///
/// Dropping the feed unsubscribes.
#[derive(Debug)]
pub struct LiveFeed {
    logs: mpsc::Receiver<Log>,
    errors: Option<oneshot::Receiver<FeedError>>,
    unsubscribe: Unsubscribe,
}

impl LiveFeed {
    pub fn new(
        logs: mpsc::Receiver<Log>,
        errors: oneshot::Receiver<FeedError>,
        unsubscribe: Unsubscribe,
    ) -> Self {
        Self { logs, errors: Some(errors), unsubscribe }
    }

    /// Waits for the next log or the end of the feed.
    ///
    /// Logs already buffered are returned before a pending error. After the feed ended, every
    /// further call reports [`FeedEvent::Completed`].
    pub async fn recv(&mut self) -> FeedEvent {
        loop {
            tokio::select! {
                biased;

                log = self.logs.recv() => match log {
                    Some(log) => return FeedEvent::Log(log),
                    None => return self.closing_outcome().await,
                },
                result = Self::error_slot(&mut self.errors) => {
                    self.errors = None;
                    if let Ok(err) = result {
                        return FeedEvent::Failed(err);
                    }
                }
            }
        }
    }

    /// Waits only for the terminal error, leaving buffered logs untouched.
    ///
    /// Never resolves if the feed ends cleanly; meant to be raced against other work.
    pub async fn failure(&mut self) -> FeedError {
        match Self::error_slot(&mut self.errors).await {
            Ok(err) => {
                self.errors = None;
                err
            }
            Err(_) => {
                self.errors = None;
                std::future::pending().await
            }
        }
    }

    /// Returns a log that is already buffered, without waiting.
    pub fn try_recv(&mut self) -> Option<Log> {
        self.logs.try_recv().ok()
    }

    /// Releases the upstream subscription. Idempotent.
    ///
    /// Logs already buffered stay readable through [`LiveFeed::try_recv`].
    pub fn unsubscribe(&self) {
        self.unsubscribe.unsubscribe();
    }

    #[must_use]
    pub fn is_unsubscribed(&self) -> bool {
        self.unsubscribe.is_unsubscribed()
    }

    /// The log channel is closed: report a pending error, otherwise completion.
    ///
    /// The error receiver stays in its slot until it resolves, so a caller that gives up
    /// waiting (a timeout around `recv`) still sees the error on the next call.
    async fn closing_outcome(&mut self) -> FeedEvent {
        let Some(errors) = self.errors.as_mut() else {
            return FeedEvent::Completed;
        };
        let outcome = match errors.await {
            Ok(err) => FeedEvent::Failed(err),
            Err(_) => FeedEvent::Completed,
        };
        self.errors = None;
        outcome
    }

    async fn error_slot(
        errors: &mut Option<oneshot::Receiver<FeedError>>,
    ) -> Result<FeedError, oneshot::error::RecvError> {
        match errors {
            Some(errors) => errors.await,
            None => std::future::pending().await,
        }
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        self.unsubscribe.unsubscribe();
    }
}
