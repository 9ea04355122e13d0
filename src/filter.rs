use std::{collections::BTreeMap, fmt};

use alloy::{
    primitives::{Address, B256},
    rpc::types::Filter,
};

use crate::FeedError;

/// Highest indexed-parameter position an event can have (topics 1..=3). Anonymous events have
/// no selector in topic 0 and allow one position more.
pub const MAX_INDEXED_POSITION: usize = 2;

/// Selects the logs of one event, optionally narrowed by indexed-parameter values and a block
/// range.
///
/// ```
/// use alloy::primitives::address;
/// use event_feed::EventFilter;
///
/// let from = address!("0xd8dA6BF26964af9d7eed9e03e53415d37aa96045");
/// let filter = EventFilter::new("Transfer")
///     .indexed(0, [from.into_word()])
///     .from_block(19_000_000);
/// assert_eq!(filter.event(), "Transfer");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    event: String,
    indexed: BTreeMap<usize, Vec<B256>>,
    from_block: Option<u64>,
    to_block: Option<u64>,
}

impl EventFilter {
    /// Matches every occurrence of `event`.
    #[must_use]
    pub fn new(event: impl Into<String>) -> Self {
        Self { event: event.into(), indexed: BTreeMap::new(), from_block: None, to_block: None }
    }

    /// Accepts only logs whose indexed parameter at `position` equals one of `values`.
    ///
    /// `position` counts indexed parameters from zero. An empty set of values leaves the
    /// position unconstrained. Calling this twice for the same position extends the set.
    #[must_use]
    pub fn indexed(mut self, position: usize, values: impl IntoIterator<Item = B256>) -> Self {
        let accepted = self.indexed.entry(position).or_default();
        for value in values {
            if !accepted.contains(&value) {
                accepted.push(value);
            }
        }
        self
    }

    /// First block (inclusive) of the historical query. Defaults to the earliest block.
    #[must_use]
    pub fn from_block(mut self, block: u64) -> Self {
        self.from_block = Some(block);
        self
    }

    /// Last block (inclusive) of the historical query. Defaults to the latest block.
    #[must_use]
    pub fn to_block(mut self, block: u64) -> Self {
        self.to_block = Some(block);
        self
    }

    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }

    #[must_use]
    pub fn indexed_values(&self) -> &BTreeMap<usize, Vec<B256>> {
        &self.indexed
    }

    #[must_use]
    pub fn block_bounds(&self) -> (Option<u64>, Option<u64>) {
        (self.from_block, self.to_block)
    }

    /// Checks the filter is well formed.
    ///
    /// # Errors
    ///
    /// * [`FeedError::UnknownEvent`] if the event name is empty.
    /// * [`FeedError::InvalidIndexedPosition`] if a constraint targets a position past
    ///   [`MAX_INDEXED_POSITION`].
    pub fn validate(&self) -> Result<(), FeedError> {
        self.validate_layout(false)
    }

    /// Like [`validate`](EventFilter::validate), with the extra position anonymous events have.
    pub(crate) fn validate_layout(&self, anonymous: bool) -> Result<(), FeedError> {
        if self.event.trim().is_empty() {
            return Err(FeedError::UnknownEvent(self.event.clone()));
        }
        let max_position = MAX_INDEXED_POSITION + usize::from(anonymous);
        if let Some((&position, _)) =
            self.indexed.iter().find(|(position, _)| **position > max_position)
        {
            return Err(FeedError::InvalidIndexedPosition(position));
        }
        Ok(())
    }

    /// Builds the RPC log filter for this event.
    ///
    /// `selector` pins topic 0 and shifts indexed positions by one; `None` (anonymous events)
    /// leaves topic 0 to the first indexed parameter.
    pub(crate) fn to_log_filter(
        &self,
        selector: Option<B256>,
        address: Option<Address>,
    ) -> Filter {
        let mut filter = Filter::new();
        if let Some(selector) = selector {
            filter = filter.event_signature(selector);
        }
        if let Some(address) = address {
            filter = filter.address(address);
        }
        let first_indexed = usize::from(selector.is_some());
        for (position, values) in &self.indexed {
            if values.is_empty() {
                continue;
            }
            if let Some(topic) = filter.topics.get_mut(position + first_indexed) {
                *topic = values.clone().into();
            }
        }
        if let Some(from) = self.from_block {
            filter = filter.from_block(from);
        }
        if let Some(to) = self.to_block {
            filter = filter.to_block(to);
        }
        filter
    }
}

impl fmt::Display for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.event)?;
        if !self.indexed.is_empty() {
            let constrained: Vec<String> = self
                .indexed
                .iter()
                .map(|(position, values)| format!("#{position}:{}", values.len()))
                .collect();
            write!(f, "[{}]", constrained.join(","))?;
        }
        Ok(())
    }
}
