use std::sync::Arc;

use alloy::{
    primitives::Address,
    rpc::types::{Filter, Log},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    Decoded, EventFilter, FeedError,
    decoder::EventDecoder,
    feed::LogSource,
    iterator::EventIterator,
    subscription::EventSubscription,
};

/// Event access for one contract: filter historical logs, iterate backlog plus live logs, watch
/// into a channel, or decode a single log.
///
/// Every entry point checks the [`EventFilter`] and resolves the event name through the decoder
/// before touching the [`LogSource`]. An unknown name fails with [`FeedError::UnknownEvent`]
/// and leaves the source untouched.
///
/// ```no_run
/// use alloy::{primitives::address, sol};
/// use event_feed::{
///     ContractEvents, EventFilter, ProviderLogSource, ProviderLogSourceBuilder, SolEventDecoder,
/// };
/// use tokio::sync::mpsc;
///
/// sol! {
///     event Transfer(address indexed from, address indexed to, uint256 value);
/// }
///
/// # async fn example() -> anyhow::Result<()> {
/// tracing_subscriber::fmt::init();
///
/// let source: ProviderLogSource =
///     ProviderLogSourceBuilder::new().connect("ws://localhost:8546").await?;
/// let events = ContractEvents::new(source, SolEventDecoder::<Transfer>::new())
///     .at(address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"));
///
/// let (sink, mut transfers) = mpsc::channel(128);
/// let subscription = events.watch(EventFilter::new("Transfer"), sink).await?;
/// while let Some(transfer) = transfers.recv().await {
///     println!("block {:?}: {} wei", transfer.block_number(), transfer.value);
/// }
/// subscription.wait().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ContractEvents<S, D> {
    source: Arc<S>,
    decoder: Arc<D>,
    address: Option<Address>,
}

impl<S, D> Clone for ContractEvents<S, D> {
    fn clone(&self) -> Self {
        Self { source: self.source.clone(), decoder: self.decoder.clone(), address: self.address }
    }
}

impl<S: LogSource, D: EventDecoder> ContractEvents<S, D> {
    /// Events of any contract, as seen through `source`.
    #[must_use]
    pub fn new(source: S, decoder: D) -> Self {
        Self { source: Arc::new(source), decoder: Arc::new(decoder), address: None }
    }

    /// Restricts every query to logs emitted by `address`.
    #[must_use]
    pub fn at(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    #[must_use]
    pub fn address(&self) -> Option<Address> {
        self.address
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    #[must_use]
    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Historical logs matching `filter`, as an iterator that ends after the backlog.
    ///
    /// # Errors
    ///
    /// * [`FeedError::UnknownEvent`] / [`FeedError::InvalidIndexedPosition`] if the filter
    ///   doesn't resolve; the source is not called.
    /// * Any error of [`LogSource::historical`].
    pub async fn filter(&self, filter: EventFilter) -> Result<EventIterator<D>, FeedError> {
        let log_filter = self.resolve(&filter)?;
        let backlog = self.source.historical(&log_filter).await?;
        debug!(filter = %filter, backlog = backlog.len(), "Fetched historical logs");

        Ok(EventIterator::new(filter.event().to_owned(), self.decoder.clone(), backlog, None))
    }

    /// Historical logs matching `filter`, followed by the ones that arrive from now on.
    ///
    /// The backlog is fetched before the live feed is opened. Logs emitted in between may be
    /// missed or appear twice depending on the source; no deduplication is performed.
    ///
    /// # Errors
    ///
    /// * [`FeedError::UnknownEvent`] / [`FeedError::InvalidIndexedPosition`] if the filter
    ///   doesn't resolve; the source is not called.
    /// * Any error of [`LogSource::historical`] or [`LogSource::live`].
    pub async fn iter(&self, filter: EventFilter) -> Result<EventIterator<D>, FeedError> {
        let log_filter = self.resolve(&filter)?;
        let backlog = self.source.historical(&log_filter).await?;
        let live = self.source.live(&log_filter).await?;
        debug!(filter = %filter, backlog = backlog.len(), "Opened live feed");

        let name = filter.event().to_owned();
        Ok(EventIterator::new(name, self.decoder.clone(), backlog, Some(live)))
    }

    /// Decodes live logs matching `filter` into `sink` on a background task.
    ///
    /// Only logs that arrive after the call are delivered; the filter's block bounds are
    /// ignored by live sources.
    ///
    /// # Errors
    ///
    /// * [`FeedError::UnknownEvent`] / [`FeedError::InvalidIndexedPosition`] if the filter
    ///   doesn't resolve; nothing is spawned and the source is not called.
    /// * Any error of [`LogSource::live`].
    pub async fn watch(
        &self,
        filter: EventFilter,
        sink: mpsc::Sender<Decoded<D::Event>>,
    ) -> Result<EventSubscription, FeedError> {
        self.watch_with_cancellation(filter, sink, CancellationToken::new()).await
    }

    /// Like [`ContractEvents::watch`], additionally stopped when `cancel` is cancelled.
    ///
    /// # Errors
    ///
    /// See [`ContractEvents::watch`].
    pub async fn watch_with_cancellation(
        &self,
        filter: EventFilter,
        sink: mpsc::Sender<Decoded<D::Event>>,
        cancel: CancellationToken,
    ) -> Result<EventSubscription, FeedError> {
        let log_filter = self.resolve(&filter)?;
        let feed = self.source.live(&log_filter).await?;

        Ok(EventSubscription::spawn(
            filter.event().to_owned(),
            self.decoder.clone(),
            feed,
            sink,
            cancel.child_token(),
        ))
    }

    /// Decodes a single log as an occurrence of `name`.
    ///
    /// # Errors
    ///
    /// * [`FeedError::UnknownEvent`] if the decoder doesn't know `name`.
    /// * [`FeedError::Decode`] if the log doesn't match the event's layout.
    pub fn parse(&self, name: &str, log: &Log) -> Result<Decoded<D::Event>, FeedError> {
        if self.decoder.selector(name).is_none() {
            return Err(FeedError::UnknownEvent(name.to_owned()));
        }
        let event = self.decoder.decode(name, log)?;
        Ok(Decoded::new(event, log.clone()))
    }

    fn resolve(&self, filter: &EventFilter) -> Result<Filter, FeedError> {
        let anonymous = self.decoder.is_anonymous(filter.event());
        filter.validate_layout(anonymous)?;
        let selector = self
            .decoder
            .selector(filter.event())
            .ok_or_else(|| FeedError::UnknownEvent(filter.event().to_owned()))?;
        Ok(filter.to_log_filter((!anonymous).then_some(selector), self.address))
    }
}
