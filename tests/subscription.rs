mod common;

use std::time::Duration;

use common::{CountIncreased, count, count_log, counter_events};
use event_feed::{
    EventFilter, FeedError, assert_closed, assert_received,
    test_utils::{MockLogSource, undecodable_log},
};
use tokio::{sync::mpsc, time::timeout};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

async fn stopped(subscription: &event_feed::EventSubscription) -> Result<(), FeedError> {
    timeout(Duration::from_secs(5), subscription.wait()).await.expect("subscription did not stop")
}

#[tokio::test]
async fn cancel_after_first_event_stops_delivery() -> anyhow::Result<()> {
    let source = MockLogSource::new();
    let events = counter_events(&source);
    let (sink, rx) = mpsc::channel(8);
    let mut received = ReceiverStream::new(rx);

    let subscription = events.watch(EventFilter::new("CountIncreased"), sink).await?;
    let feed = source.last_feed().expect("live feed opened");

    feed.push(count_log(1)).await;
    assert_received!(received, count(1));

    subscription.unsubscribe();
    feed.push(count_log(2)).await;

    assert_eq!(stopped(&subscription).await, Ok(()));
    assert_eq!(subscription.err(), None);
    assert_closed!(received);
    assert_eq!(feed.release_count(), 1);

    Ok(())
}

#[tokio::test]
async fn unsubscribe_many_times_is_harmless() -> anyhow::Result<()> {
    let source = MockLogSource::new();
    let events = counter_events(&source);
    let (sink, _rx) = mpsc::channel(8);

    let subscription = events.watch(EventFilter::new("CountIncreased"), sink).await?;
    for _ in 0..5 {
        subscription.unsubscribe();
    }
    assert_eq!(stopped(&subscription).await, Ok(()));
    subscription.unsubscribe();

    assert_eq!(source.unsubscribe_count(), 1);
    assert_eq!(subscription.err(), None);
    Ok(())
}

#[tokio::test]
async fn decode_failure_is_recorded_and_releases_the_feed() -> anyhow::Result<()> {
    let source = MockLogSource::new();
    let events = counter_events(&source);
    let (sink, rx) = mpsc::channel(8);
    let mut received = ReceiverStream::new(rx);

    let subscription = events.watch(EventFilter::new("CountIncreased"), sink).await?;
    let feed = source.last_feed().expect("live feed opened");
    feed.push(count_log(1)).await;
    feed.push(undecodable_log::<CountIncreased>(2, 3)).await;
    feed.push(count_log(3)).await;

    let Err(FeedError::Decode(err)) = stopped(&subscription).await else {
        panic!("expected a decode failure, got {:?}", subscription.err());
    };
    assert_eq!(err.log_index, Some(3));
    assert_eq!(subscription.err(), Some(FeedError::Decode(err)));

    assert_received!(received, count(1));
    assert_closed!(received);
    assert_eq!(feed.release_count(), 1);

    Ok(())
}

#[tokio::test]
async fn upstream_error_is_recorded_and_releases_the_feed() -> anyhow::Result<()> {
    let source = MockLogSource::new();
    let events = counter_events(&source);
    let (sink, _rx) = mpsc::channel(8);

    let subscription = events.watch(EventFilter::new("CountIncreased"), sink).await?;
    let feed = source.last_feed().expect("live feed opened");
    feed.fail(FeedError::Lagged(12));

    assert_eq!(stopped(&subscription).await, Err(FeedError::Lagged(12)));
    assert_eq!(subscription.err(), Some(FeedError::Lagged(12)));
    assert_eq!(subscription.err(), Some(FeedError::Lagged(12)));
    assert_eq!(feed.release_count(), 1);

    Ok(())
}

#[tokio::test]
async fn completed_feed_ends_cleanly() -> anyhow::Result<()> {
    let source = MockLogSource::new();
    let events = counter_events(&source);
    let (sink, rx) = mpsc::channel(8);
    let mut received = ReceiverStream::new(rx);

    let subscription = events.watch(EventFilter::new("CountIncreased"), sink).await?;
    let feed = source.last_feed().expect("live feed opened");
    feed.push(count_log(1)).await;
    feed.complete();

    assert_received!(received, count(1));
    assert_eq!(stopped(&subscription).await, Ok(()));
    assert_closed!(received);
    assert_eq!(feed.release_count(), 1);

    Ok(())
}

#[tokio::test]
async fn dropped_receiver_stops_the_subscription() -> anyhow::Result<()> {
    let source = MockLogSource::new();
    let events = counter_events(&source);
    let (sink, rx) = mpsc::channel(1);

    let subscription = events.watch(EventFilter::new("CountIncreased"), sink).await?;
    let feed = source.last_feed().expect("live feed opened");
    drop(rx);
    feed.push(count_log(1)).await;

    assert_eq!(stopped(&subscription).await, Ok(()));
    assert_eq!(feed.release_count(), 1);

    Ok(())
}

#[tokio::test]
async fn caller_token_cancels_and_own_cancel_leaves_it_alone() -> anyhow::Result<()> {
    let source = MockLogSource::new();
    let events = counter_events(&source);
    let shutdown = CancellationToken::new();

    let (first_sink, _first) = mpsc::channel(1);
    let (second_sink, _second) = mpsc::channel(1);
    let first = events
        .watch_with_cancellation(EventFilter::new("CountIncreased"), first_sink, shutdown.clone())
        .await?;
    let second = events
        .watch_with_cancellation(EventFilter::new("CountIncreased"), second_sink, shutdown.clone())
        .await?;

    first.unsubscribe();
    assert_eq!(stopped(&first).await, Ok(()));
    assert!(!shutdown.is_cancelled());
    assert!(second.is_running());

    shutdown.cancel();
    assert_eq!(stopped(&second).await, Ok(()));
    assert_eq!(source.unsubscribe_count(), 2);

    Ok(())
}

#[tokio::test]
async fn unknown_event_spawns_nothing() {
    let source = MockLogSource::new();
    let events = counter_events(&source);
    let (sink, rx) = mpsc::channel(1);
    let mut received = ReceiverStream::new(rx);

    let result = events.watch(EventFilter::new("Transfer"), sink).await;

    assert_eq!(result.err(), Some(FeedError::UnknownEvent("Transfer".into())));
    assert_eq!(source.live_calls(), 0);
    assert_eq!(source.historical_calls(), 0);
    assert_closed!(received);
}

#[tokio::test]
async fn sink_is_left_open_for_other_senders() -> anyhow::Result<()> {
    let source = MockLogSource::new();
    let events = counter_events(&source);
    let (sink, mut rx) = mpsc::channel(8);
    let other = sink.clone();

    let subscription = events.watch(EventFilter::new("CountIncreased"), sink).await?;
    subscription.unsubscribe();
    assert_eq!(stopped(&subscription).await, Ok(()));

    other.send(event_feed::Decoded::new(count(9), count_log(9))).await?;
    assert_eq!(rx.recv().await.map(|d| d.event), Some(count(9)));

    Ok(())
}
