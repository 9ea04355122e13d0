use std::ops::Deref;

use alloy::rpc::types::Log;

/// A decoded event occurrence together with the log it was decoded from.
///
/// Ownership passes to whoever received it: the caller of
/// [`EventIterator::next`](crate::EventIterator::next) or the sink of an
/// [`EventSubscription`](crate::EventSubscription).
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<E> {
    pub event: E,
    /// The log the event was decoded from.
    pub raw: Log,
}

impl<E> Decoded<E> {
    #[must_use]
    pub fn new(event: E, raw: Log) -> Self {
        Self { event, raw }
    }

    #[must_use]
    pub fn into_parts(self) -> (E, Log) {
        (self.event, self.raw)
    }

    /// Block the log was emitted in, if known.
    #[must_use]
    pub fn block_number(&self) -> Option<u64> {
        self.raw.block_number
    }

    /// Position of the log within its block, if known.
    #[must_use]
    pub fn log_index(&self) -> Option<u64> {
        self.raw.log_index
    }
}

impl<E> Deref for Decoded<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.event
    }
}
