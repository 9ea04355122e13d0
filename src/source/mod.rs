//! [`LogSource`](crate::LogSource) backed by an Alloy provider.

mod builder;
mod chunks;
mod conversion;
mod provider;

pub use builder::{DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_BLOCK_RANGE, ProviderLogSourceBuilder};
pub use conversion::IntoRootProvider;
pub use provider::ProviderLogSource;
