use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::{
    Decoded, FeedError,
    decoder::EventDecoder,
    feed::{FeedEvent, LiveFeed},
};

#[derive(Debug, Clone, PartialEq)]
enum Status {
    Running,
    Stopped(Option<FeedError>),
}

/// Handle to a background task that decodes a live feed and pushes events into a sink.
///
/// Created by [`ContractEvents::watch`](crate::ContractEvents::watch). The task stops when:
///
/// * [`unsubscribe`](EventSubscription::unsubscribe) is called, the cancellation token passed
///   to [`ContractEvents::watch_with_cancellation`](crate::ContractEvents::watch_with_cancellation)
///   is cancelled, or the handle is dropped (no failure);
/// * a log fails to decode or the live feed reports an error (the failure is recorded);
/// * the live feed completes or the sink's receiver is dropped (no failure).
///
/// Delivery into a full sink waits, but that wait is raced against cancellation and upstream
/// errors, so a stalled consumer cannot keep the task alive. Whatever the reason for stopping,
/// the live feed is released exactly once. The sink itself belongs to the caller and is never
/// closed by the task; the task only drops its own sender.
#[must_use = "dropping the subscription cancels it"]
#[derive(Debug)]
pub struct EventSubscription {
    cancel: CancellationToken,
    status: watch::Receiver<Status>,
}

impl EventSubscription {
    pub(crate) fn spawn<D: EventDecoder>(
        name: String,
        decoder: Arc<D>,
        mut feed: LiveFeed,
        sink: mpsc::Sender<Decoded<D::Event>>,
        cancel: CancellationToken,
    ) -> Self {
        let (status_tx, status) = watch::channel(Status::Running);
        let token = cancel.clone();

        tokio::spawn(async move {
            info!(event = %name, "Subscription started");
            let outcome = forward(&name, decoder.as_ref(), &mut feed, &sink, &token).await;
            feed.unsubscribe();

            match &outcome {
                Ok(()) => info!(event = %name, "Subscription stopped"),
                Err(err) => error!(event = %name, error = %err, "Subscription failed"),
            }
            status_tx.send_replace(Status::Stopped(outcome.err()));
        });

        Self { cancel, status }
    }

    /// Stops the subscription. Idempotent and non-blocking.
    ///
    /// At most one delivery that was already in flight may still land in the sink.
    pub fn unsubscribe(&self) {
        self.cancel.cancel();
    }

    /// The token that cancels this subscription.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// `true` while the forwarding task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        *self.status.borrow() == Status::Running
    }

    /// The failure that stopped the subscription, if it stopped because of one.
    #[must_use]
    pub fn err(&self) -> Option<FeedError> {
        match &*self.status.borrow() {
            Status::Stopped(failure) => failure.clone(),
            Status::Running => None,
        }
    }

    /// Waits for the forwarding task to stop and reports why.
    ///
    /// # Errors
    ///
    /// Returns the decode or upstream error that ended the subscription.
    pub async fn wait(&self) -> Result<(), FeedError> {
        let mut status = self.status.clone();
        let stopped = status.wait_for(|status| *status != Status::Running).await;
        match stopped.as_deref() {
            Ok(Status::Stopped(Some(err))) => Err(err.clone()),
            Ok(_) => Ok(()),
            Err(_) => Err(FeedError::Upstream("subscription task aborted".into())),
        }
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// The forwarding loop. Returns on cancellation, feed completion, a closed sink, or the first
/// decode/upstream error. The caller releases `feed` afterwards.
async fn forward<D: EventDecoder>(
    name: &str,
    decoder: &D,
    feed: &mut LiveFeed,
    sink: &mpsc::Sender<Decoded<D::Event>>,
    cancel: &CancellationToken,
) -> Result<(), FeedError> {
    loop {
        let log = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(event = %name, "Subscription cancelled");
                return Ok(());
            }
            next = feed.recv() => match next {
                FeedEvent::Log(log) => log,
                FeedEvent::Failed(err) => return Err(err),
                FeedEvent::Completed => {
                    debug!(event = %name, "Live feed completed");
                    return Ok(());
                }
            },
        };

        let event = decoder.decode(name, &log)?;
        let decoded = Decoded::new(event, log);

        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(event = %name, "Subscription cancelled during delivery");
                return Ok(());
            }
            err = feed.failure() => return Err(err),
            permit = sink.reserve() => match permit {
                Ok(permit) => {
                    trace!(event = %name, "Delivered event");
                    permit.send(decoded);
                }
                Err(_) => {
                    warn!(event = %name, "Sink closed, stopping subscription");
                    return Ok(());
                }
            },
        }
    }
}
