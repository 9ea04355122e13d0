use std::{mem::discriminant, sync::Arc};

use alloy::{
    primitives::TxHash,
    rpc::types::Log,
    transports::{RpcError, TransportErrorKind},
};
use thiserror::Error;

/// Errors surfaced by event iterators, subscriptions and log sources.
///
/// Construction errors ([`FeedError::UnknownEvent`], [`FeedError::InvalidIndexedPosition`],
/// [`FeedError::InvalidMaxBlockRange`], [`FeedError::InvalidBufferCapacity`]) are returned
/// before anything is spawned or queried. Every other variant is terminal for the iterator or
/// subscription that observed it.
#[derive(Error, Debug, Clone)]
pub enum FeedError {
    /// The decoder does not know an event with this name.
    #[error("Unknown event: {0:?}")]
    UnknownEvent(String),

    /// An indexed-parameter constraint targets a position that has no topic slot.
    ///
    /// Events carry at most three indexed parameters (topics 1 to 3).
    #[error("Indexed parameter position {0} is out of range (expected 0..=2)")]
    InvalidIndexedPosition(usize),

    /// The configured maximum block range is invalid (must be greater than zero).
    #[error("Max block range must be greater than 0")]
    InvalidMaxBlockRange,

    /// The configured live feed buffer capacity is invalid (must be greater than zero).
    #[error("Buffer capacity must be greater than 0")]
    InvalidBufferCapacity,

    /// A log could not be decoded into the requested event.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The underlying RPC transport returned an error.
    #[error("RPC error: {0}")]
    RpcError(Arc<RpcError<TransportErrorKind>>),

    /// The upstream log subscription ended.
    #[error("Subscription closed")]
    SubscriptionClosed,

    /// The upstream log subscription skipped this many logs because the forwarder fell behind.
    #[error("Subscription lagged by {0} logs")]
    Lagged(u64),

    /// A log source that isn't RPC-backed reported a failure.
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl From<RpcError<TransportErrorKind>> for FeedError {
    fn from(error: RpcError<TransportErrorKind>) -> Self {
        FeedError::RpcError(Arc::new(error))
    }
}

/// Two errors are equal when they are the same variant; decode errors, unknown event names
/// and upstream messages must also carry the same payload.
impl PartialEq for FeedError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FeedError::UnknownEvent(a), FeedError::UnknownEvent(b)) |
            (FeedError::Upstream(a), FeedError::Upstream(b)) => a == b,
            (FeedError::InvalidIndexedPosition(a), FeedError::InvalidIndexedPosition(b)) => a == b,
            (FeedError::Decode(a), FeedError::Decode(b)) => a == b,
            (FeedError::Lagged(a), FeedError::Lagged(b)) => a == b,
            _ => discriminant(self) == discriminant(other),
        }
    }
}

/// A log that could not be decoded, identified by its position on chain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to decode {event} from log {log_index:?} of tx {tx_hash:?}: {reason}")]
pub struct DecodeError {
    /// Name of the event the log was decoded as.
    pub event: String,
    /// Transaction that emitted the log, if the source reported it.
    pub tx_hash: Option<TxHash>,
    /// Position of the log within its block, if the source reported it.
    pub log_index: Option<u64>,
    pub reason: String,
}

impl DecodeError {
    /// Creates a decode error for `log`, copying the log's transaction hash and index.
    pub fn new(event: impl Into<String>, log: &Log, reason: impl ToString) -> Self {
        Self {
            event: event.into(),
            tx_hash: log.transaction_hash,
            log_index: log.log_index,
            reason: reason.to_string(),
        }
    }
}
