use std::{collections::VecDeque, fmt, sync::Arc};

use alloy::rpc::types::Log;
use futures::Stream;

use crate::{
    Decoded, FeedError,
    decoder::EventDecoder,
    feed::{FeedEvent, LiveFeed},
};

#[derive(Debug, Clone, PartialEq)]
enum State {
    Streaming,
    /// The live feed ended cleanly, or there never was one and the backlog ran out.
    Exhausted,
    /// The caller closed the iterator; buffered logs may still be drained.
    Closed,
    Failed(FeedError),
}

/// Pull-based cursor over the logs of one event: historical backlog first, then the live feed.
///
/// Obtained from [`ContractEvents::iter`](crate::ContractEvents::iter) (backlog then live) or
/// [`ContractEvents::filter`](crate::ContractEvents::filter) (backlog only).
///
/// # Termination
///
/// [`next`](EventIterator::next) returns `false` once the iterator is exhausted, closed or
/// failed; [`error`](EventIterator::error) tells a failure apart from a clean end. A failure
/// is sticky: later calls return `false` without decoding anything else.
///
/// # Closing
///
/// [`close`](EventIterator::close) releases the live feed immediately. Logs that were already
/// buffered locally (remaining backlog and logs sitting in the live channel) are still handed
/// out by subsequent `next` calls; once they are drained `next` returns `false` and `error`
/// stays `None`.
///
/// The live feed is released exactly once on every terminal path, including drop.
///
/// # Example
///
/// ```no_run
/// # use event_feed::{ContractEvents, EventFilter, FeedError, LogSource, SolEventDecoder};
/// # alloy::sol! { event Transfer(address indexed from, address indexed to, uint256 value); }
/// # async fn example<S: LogSource>(events: ContractEvents<S, SolEventDecoder<Transfer>>) -> Result<(), FeedError> {
/// let mut iter = events.iter(EventFilter::new("Transfer")).await?;
/// while iter.next().await {
///     if let Some(transfer) = iter.event() {
///         println!("{} -> {}: {}", transfer.from, transfer.to, transfer.value);
///     }
/// }
/// if let Some(err) = iter.error() {
///     eprintln!("iteration failed: {err}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct EventIterator<D: EventDecoder> {
    name: String,
    decoder: Arc<D>,
    backlog: VecDeque<Log>,
    live: Option<LiveFeed>,
    current: Option<Decoded<D::Event>>,
    state: State,
}

impl<D: EventDecoder> EventIterator<D> {
    pub(crate) fn new(
        name: String,
        decoder: Arc<D>,
        backlog: Vec<Log>,
        live: Option<LiveFeed>,
    ) -> Self {
        debug!(event = %name, backlog = backlog.len(), live = live.is_some(), "Iterator created");
        Self {
            name,
            decoder,
            backlog: backlog.into(),
            live,
            current: None,
            state: State::Streaming,
        }
    }

    /// Advances to the next event.
    ///
    /// Returns `true` when a log was decoded; the event is then available through
    /// [`event`](EventIterator::event). Suspends while no log is available and the live feed
    /// is still open.
    pub async fn next(&mut self) -> bool {
        self.current = None;

        let log = match self.state {
            State::Failed(_) | State::Exhausted => return false,
            State::Closed => match self.buffered() {
                Some(log) => log,
                None => return false,
            },
            State::Streaming => match self.backlog.pop_front() {
                Some(log) => log,
                None => match self.await_live().await {
                    Some(log) => log,
                    None => return false,
                },
            },
        };

        match self.decoder.decode(&self.name, &log) {
            Ok(event) => {
                self.current = Some(Decoded::new(event, log));
                true
            }
            Err(err) => {
                warn!(event = %self.name, error = %err, "Failed to decode log");
                self.fail(err.into());
                false
            }
        }
    }

    /// The event decoded by the last [`next`](EventIterator::next) call, if it returned `true`.
    #[must_use]
    pub fn event(&self) -> Option<&Decoded<D::Event>> {
        self.current.as_ref()
    }

    /// Takes the current event out of the iterator.
    pub fn take_event(&mut self) -> Option<Decoded<D::Event>> {
        self.current.take()
    }

    /// The failure that ended the iteration, if any.
    #[must_use]
    pub fn error(&self) -> Option<&FeedError> {
        match &self.state {
            State::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Releases the live feed and stops waiting for new logs.
    ///
    /// Calling it again, or after the iterator already ended, changes nothing.
    ///
    /// # Errors
    ///
    /// Currently never fails; the signature leaves room for sources whose release can.
    pub fn close(&mut self) -> Result<(), FeedError> {
        if let Some(live) = &self.live {
            live.unsubscribe();
        }
        if self.state == State::Streaming {
            debug!(event = %self.name, "Iterator closed");
            self.state = State::Closed;
        }
        Ok(())
    }

    /// `true` once the iterator reached a terminal state.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.state != State::Streaming
    }

    /// Converts the iterator into a stream of decoded events.
    ///
    /// The stream yields the failure, if any, as its final item.
    pub fn into_stream(self) -> impl Stream<Item = Result<Decoded<D::Event>, FeedError>> {
        futures::stream::unfold(Some(self), |iter| async move {
            let mut iter = iter?;
            if iter.next().await {
                let event = iter.take_event()?;
                return Some((Ok(event), Some(iter)));
            }
            let err = iter.error().cloned()?;
            Some((Err(err), None))
        })
    }

    /// Waits for the next live log, moving to a terminal state when the feed ends.
    async fn await_live(&mut self) -> Option<Log> {
        let Some(live) = self.live.as_mut() else {
            self.finish();
            return None;
        };
        match live.recv().await {
            FeedEvent::Log(log) => Some(log),
            FeedEvent::Failed(err) => {
                error!(event = %self.name, error = %err, "Live feed failed");
                self.fail(err);
                None
            }
            FeedEvent::Completed => {
                self.finish();
                None
            }
        }
    }

    /// Logs still deliverable after `close`: backlog first, then whatever the live channel
    /// already holds.
    fn buffered(&mut self) -> Option<Log> {
        self.backlog.pop_front().or_else(|| self.live.as_mut().and_then(LiveFeed::try_recv))
    }

    fn finish(&mut self) {
        debug!(event = %self.name, "Iterator exhausted");
        self.release();
        self.state = State::Exhausted;
    }

    fn fail(&mut self, err: FeedError) {
        self.release();
        self.state = State::Failed(err);
    }

    fn release(&self) {
        if let Some(live) = &self.live {
            live.unsubscribe();
        }
    }
}

impl<D: EventDecoder> Drop for EventIterator<D> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<D: EventDecoder> fmt::Debug for EventIterator<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventIterator")
            .field("event", &self.name)
            .field("backlog", &self.backlog.len())
            .field("live", &self.live.is_some())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use alloy::{
        primitives::{B256, LogData},
        sol,
        sol_types::SolEvent,
    };
    use tokio::sync::{mpsc, oneshot};

    use super::*;
    use crate::{SolEventDecoder, feed::Unsubscribe};

    sol! {
        #[derive(Debug, PartialEq, Eq)]
        event Ping(uint256 seq);
    }

    fn ping(seq: u64) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: Default::default(),
                data: Ping { seq: alloy::primitives::U256::from(seq) }.encode_log_data(),
            },
            block_number: Some(seq),
            log_index: Some(0),
            transaction_hash: Some(B256::with_last_byte(u8::try_from(seq).unwrap())),
            ..Default::default()
        }
    }

    fn garbage(seq: u64) -> Log {
        let mut log = ping(seq);
        log.inner.data = LogData::new_unchecked(vec![Ping::SIGNATURE_HASH], vec![1, 2].into());
        log
    }

    struct Harness {
        logs: mpsc::Sender<Log>,
        errors: Option<oneshot::Sender<FeedError>>,
        released: Arc<AtomicUsize>,
    }

    fn iterator(backlog: Vec<Log>) -> (EventIterator<SolEventDecoder<Ping>>, Harness) {
        let (log_tx, log_rx) = mpsc::channel(16);
        let (err_tx, err_rx) = oneshot::channel();
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let feed = LiveFeed::new(
            log_rx,
            err_rx,
            Unsubscribe::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let decoder = Arc::new(SolEventDecoder::new());
        let iter = EventIterator::new("Ping".into(), decoder, backlog, Some(feed));
        (iter, Harness { logs: log_tx, errors: Some(err_tx), released })
    }

    fn seq(iter: &EventIterator<SolEventDecoder<Ping>>) -> Option<u64> {
        iter.event().map(|e| e.seq.to::<u64>())
    }

    #[tokio::test]
    async fn backlog_then_live_until_completion() {
        let (mut iter, mut harness) = iterator(vec![ping(1), ping(2)]);
        harness.logs.send(ping(3)).await.unwrap();
        drop(harness.errors.take());
        drop(harness.logs);

        for expected in 1..=3 {
            assert!(iter.next().await);
            assert_eq!(seq(&iter), Some(expected));
        }
        assert!(!iter.next().await);
        assert_eq!(iter.event(), None);
        assert_eq!(iter.error(), None);
        assert_eq!(harness.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn decode_failure_is_sticky() {
        let (mut iter, harness) = iterator(vec![ping(1), garbage(2), ping(3)]);

        assert!(iter.next().await);
        assert!(!iter.next().await);

        let Some(FeedError::Decode(err)) = iter.error().cloned() else {
            panic!("expected decode error, got {:?}", iter.error());
        };
        assert_eq!(err.tx_hash, Some(B256::with_last_byte(2)));

        assert!(!iter.next().await);
        assert_eq!(iter.error(), Some(&FeedError::Decode(err)));
        assert_eq!(harness.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn upstream_error_fails_iteration() {
        let (mut iter, mut harness) = iterator(vec![]);
        harness.errors.take().unwrap().send(FeedError::Upstream("gone".into())).unwrap();

        assert!(!iter.next().await);
        assert_eq!(iter.error(), Some(&FeedError::Upstream("gone".into())));
        assert!(!iter.next().await);
        assert_eq!(harness.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_drains_buffered_logs_then_stops() {
        let (mut iter, harness) = iterator(vec![ping(1)]);
        harness.logs.send(ping(2)).await.unwrap();

        iter.close().unwrap();
        iter.close().unwrap();
        assert_eq!(harness.released.load(Ordering::SeqCst), 1);

        assert!(iter.next().await);
        assert_eq!(seq(&iter), Some(1));
        assert!(iter.next().await);
        assert_eq!(seq(&iter), Some(2));
        assert!(!iter.next().await);
        assert_eq!(iter.error(), None);
        assert!(iter.is_terminated());
    }

    #[tokio::test]
    async fn backlog_only_iterator_exhausts_without_live_feed() {
        let mut iter = EventIterator::new(
            "Ping".into(),
            Arc::new(SolEventDecoder::<Ping>::new()),
            vec![ping(7)],
            None,
        );

        assert!(iter.next().await);
        assert_eq!(seq(&iter), Some(7));
        assert!(!iter.next().await);
        assert_eq!(iter.error(), None);
    }

    #[tokio::test]
    async fn drop_releases_feed() {
        let (iter, harness) = iterator(vec![]);
        drop(iter);
        assert_eq!(harness.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stream_yields_events_then_failure() {
        use tokio_stream::StreamExt;

        let (iter, mut harness) = iterator(vec![ping(1)]);
        harness.errors.take().unwrap().send(FeedError::SubscriptionClosed).unwrap();

        let items: Vec<_> = iter.into_stream().collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().map(|e| e.seq.to::<u64>()), Ok(1));
        assert_eq!(items[1].as_ref().map(|_| ()), Err(&FeedError::SubscriptionClosed));
    }
}
