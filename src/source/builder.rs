use alloy::network::Network;

use crate::{
    FeedError,
    source::{IntoRootProvider, ProviderLogSource},
};

/// Default maximum number of blocks covered by a single `eth_getLogs` request.
pub const DEFAULT_MAX_BLOCK_RANGE: u64 = 1000;

/// Default number of live logs buffered per feed before the forwarder waits for the consumer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 50_000;

/// Builder/configuration for [`ProviderLogSource`].
#[derive(Clone, Debug)]
pub struct ProviderLogSourceBuilder {
    /// Maximum number of blocks per `eth_getLogs` request.
    pub max_block_range: u64,
    /// Capacity of each live feed's log channel.
    pub buffer_capacity: usize,
}

impl Default for ProviderLogSourceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderLogSourceBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self { max_block_range: DEFAULT_MAX_BLOCK_RANGE, buffer_capacity: DEFAULT_BUFFER_CAPACITY }
    }

    /// Sets the maximum number of blocks per `eth_getLogs` request.
    ///
    /// Historical queries wider than this are split into consecutive chunks. Must be greater
    /// than 0.
    #[must_use]
    pub fn max_block_range(mut self, max_block_range: u64) -> Self {
        self.max_block_range = max_block_range;
        self
    }

    /// Sets the live feed buffer capacity.
    ///
    /// Controls how many logs can wait in a live feed before the forwarder applies
    /// backpressure to the upstream subscription. Must be greater than 0.
    #[must_use]
    pub fn buffer_capacity(mut self, buffer_capacity: usize) -> Self {
        self.buffer_capacity = buffer_capacity;
        self
    }

    /// Validates the configuration and connects to `provider`.
    ///
    /// # Errors
    ///
    /// * [`FeedError::InvalidMaxBlockRange`] / [`FeedError::InvalidBufferCapacity`] for zero
    ///   values; the provider is not touched.
    /// * Any error raised while connecting.
    pub async fn connect<N: Network>(
        self,
        provider: impl IntoRootProvider<N>,
    ) -> Result<ProviderLogSource<N>, FeedError> {
        if self.max_block_range == 0 {
            return Err(FeedError::InvalidMaxBlockRange);
        }
        if self.buffer_capacity == 0 {
            return Err(FeedError::InvalidBufferCapacity);
        }
        let provider = provider.into_root_provider().await?;
        Ok(ProviderLogSource {
            provider,
            max_block_range: self.max_block_range,
            buffer_capacity: self.buffer_capacity,
        })
    }
}
