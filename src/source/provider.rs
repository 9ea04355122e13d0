use alloy::{
    network::{Ethereum, Network},
    providers::{Provider, RootProvider},
    pubsub::Subscription,
    rpc::types::{Filter, Log},
};
use tokio::sync::{broadcast::error::RecvError, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::{
    FeedError,
    feed::{LiveFeed, LogSource, Unsubscribe},
    source::chunks::BlockChunks,
};

/// [`LogSource`] backed by an Ethereum JSON-RPC node.
///
/// Historical logs come from `eth_getLogs`, split into chunks of at most
/// [`max_block_range`](crate::ProviderLogSourceBuilder::max_block_range) blocks. Live logs come
/// from an `eth_subscribe("logs")` subscription, so live feeds require a pubsub transport
/// (WebSocket or IPC).
///
/// Build it with [`ProviderLogSourceBuilder`](crate::ProviderLogSourceBuilder).
#[derive(Clone, Debug)]
pub struct ProviderLogSource<N: Network = Ethereum> {
    pub(crate) provider: RootProvider<N>,
    pub(crate) max_block_range: u64,
    pub(crate) buffer_capacity: usize,
}

impl<N: Network> ProviderLogSource<N> {
    #[must_use]
    pub fn provider(&self) -> &RootProvider<N> {
        &self.provider
    }

    #[must_use]
    pub fn max_block_range(&self) -> u64 {
        self.max_block_range
    }

    #[must_use]
    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }
}

impl<N: Network> LogSource for ProviderLogSource<N> {
    async fn historical(&self, filter: &Filter) -> Result<Vec<Log>, FeedError> {
        let from = filter.get_from_block().unwrap_or(0);
        let to = match filter.get_to_block() {
            Some(to) => to,
            None => self.provider.get_block_number().await?,
        };

        let chunks = BlockChunks::new(from..=to, self.max_block_range);
        debug!(from = from, to = to, chunks = chunks.remaining(), "Fetching historical logs");

        let mut logs = Vec::new();
        for range in chunks {
            let chunk = filter.clone().from_block(*range.start()).to_block(*range.end());
            let batch = self.provider.get_logs(&chunk).await.inspect_err(|err| {
                error!(error = %err, block_range = ?range, "eth_getLogs failed");
            })?;
            trace!(block_range = ?range, logs = batch.len(), "Fetched log chunk");
            logs.extend(batch);
        }

        Ok(logs)
    }

    async fn live(&self, filter: &Filter) -> Result<LiveFeed, FeedError> {
        let subscription = self.provider.subscribe_logs(filter).await.inspect_err(|err| {
            error!(error = %err, "eth_subscribe failed");
        })?;
        info!("Live log subscription started");

        Ok(spawn_forwarder(subscription, self.buffer_capacity))
    }
}

/// Upstream end of a live log subscription.
trait UpstreamLogs: Send + 'static {
    fn recv(&mut self) -> impl Future<Output = Result<Log, RecvError>> + Send;
}

impl UpstreamLogs for Subscription<Log> {
    fn recv(&mut self) -> impl Future<Output = Result<Log, RecvError>> + Send {
        Subscription::recv(self)
    }
}

/// Starts forwarding `upstream` into a new [`LiveFeed`] buffering up to `capacity` logs.
fn spawn_forwarder(upstream: impl UpstreamLogs, capacity: usize) -> LiveFeed {
    let (log_tx, log_rx) = mpsc::channel(capacity);
    let (err_tx, err_rx) = oneshot::channel();
    let cancel = CancellationToken::new();

    tokio::spawn(forward_logs(upstream, log_tx, err_tx, cancel.clone()));

    LiveFeed::new(log_rx, err_rx, Unsubscribe::new(move || cancel.cancel()))
}

/// Moves logs from the upstream subscription into a feed until the feed is released, dropped
/// by its consumer, or the subscription breaks.
///
/// A closed subscription is reported as [`FeedError::SubscriptionClosed`]; a lagged one as
/// [`FeedError::Lagged`]. Both end the feed, since the missed logs can't be replayed.
async fn forward_logs(
    mut subscription: impl UpstreamLogs,
    logs: mpsc::Sender<Log>,
    errors: oneshot::Sender<FeedError>,
    cancel: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("Live feed released, dropping log subscription");
                return;
            }
            received = subscription.recv() => received,
        };

        match received {
            Ok(log) => {
                tokio::select! {
                    biased;

                    () = cancel.cancelled() => {
                        debug!("Live feed released, dropping log subscription");
                        return;
                    }
                    sent = logs.send(log) => {
                        if sent.is_err() {
                            warn!("Live feed dropped by consumer, stopping forwarder");
                            return;
                        }
                    }
                }
            }
            Err(RecvError::Closed) => {
                error!("Log subscription closed");
                _ = errors.send(FeedError::SubscriptionClosed);
                return;
            }
            Err(RecvError::Lagged(skipped)) => {
                error!(skipped = skipped, "Log subscription lagged");
                _ = errors.send(FeedError::Lagged(skipped));
                return;
            }
        }
    }
}
