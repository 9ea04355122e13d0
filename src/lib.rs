//! Event-Feed turns the raw logs of an EVM contract into typed events, historical and live.
//!
//! The main entry point is [`ContractEvents`]: bind a [`LogSource`] (usually a
//! [`ProviderLogSource`] built via [`ProviderLogSourceBuilder`]) and an [`EventDecoder`] (a
//! [`SolEventDecoder`] for `sol!` events or an [`AbiDecoder`] for a runtime JSON ABI), then
//! describe what you want with an [`EventFilter`].
//!
//! # Consumption styles
//!
//! * **Pull**: [`ContractEvents::filter`] and [`ContractEvents::iter`] return an
//!   [`EventIterator`]. `filter` only replays history; `iter` replays history and then follows
//!   the live feed. Call [`EventIterator::next`] until it returns `false`, then check
//!   [`EventIterator::error`].
//! * **Push**: [`ContractEvents::watch`] spawns a task that decodes live logs into a
//!   `tokio::sync::mpsc` sink and returns an [`EventSubscription`] handle to stop it, read its
//!   failure or wait for it.
//!
//! # Ordering
//!
//! Historical logs are delivered in ledger order, followed by live logs in arrival order.
//! There is no deduplication across the two: a log emitted while the live feed is being set up
//! may be missed or seen twice, depending on the source.
//!
//! # Failures
//!
//! The first log that fails to decode, or the first error reported by the live feed, ends the
//! iterator or subscription. The failure is stored and reported on every later read. Malformed
//! filters and unknown event names are rejected before the source is queried.
//!
//! # Resources
//!
//! Each live feed is released exactly once, whichever way its consumer ends: exhaustion,
//! failure, an explicit close/unsubscribe, or drop.

#[macro_use]
mod logging;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

mod contract;
mod decoder;
mod error;
mod feed;
mod filter;
mod iterator;
pub mod source;
mod subscription;
mod types;

pub use contract::ContractEvents;
pub use decoder::{AbiDecoder, EventDecoder, SolEventDecoder};
pub use error::{DecodeError, FeedError};
pub use feed::{FeedEvent, LiveFeed, LogSource, Unsubscribe};
pub use filter::{EventFilter, MAX_INDEXED_POSITION};
pub use iterator::EventIterator;
pub use source::{
    DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_BLOCK_RANGE, IntoRootProvider, ProviderLogSource,
    ProviderLogSourceBuilder,
};
pub use subscription::EventSubscription;
pub use types::Decoded;
