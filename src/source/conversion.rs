use alloy::{
    network::{Ethereum, Network},
    providers::{DynProvider, Provider, RootProvider},
    transports::http::reqwest::Url,
};

use crate::FeedError;

/// Anything [`ProviderLogSourceBuilder::connect`](crate::ProviderLogSourceBuilder::connect)
/// can reach a node through: a connection string, a URL, or a provider that is already built.
///
/// Live feeds need a pubsub transport, so connection strings should use `ws://`, `wss://` or
/// an IPC path when `iter`/`watch` are used.
pub trait IntoRootProvider<N: Network = Ethereum> {
    /// # Errors
    ///
    /// Returns [`FeedError::RpcError`] if connecting fails.
    fn into_root_provider(self) -> impl Future<Output = Result<RootProvider<N>, FeedError>> + Send;
}

impl<N: Network> IntoRootProvider<N> for RootProvider<N> {
    async fn into_root_provider(self) -> Result<RootProvider<N>, FeedError> {
        Ok(self)
    }
}

impl<N: Network> IntoRootProvider<N> for &str {
    async fn into_root_provider(self) -> Result<RootProvider<N>, FeedError> {
        Ok(RootProvider::connect(self).await?)
    }
}

impl<N: Network> IntoRootProvider<N> for Url {
    async fn into_root_provider(self) -> Result<RootProvider<N>, FeedError> {
        self.as_str().into_root_provider().await
    }
}

/// Uses the type-erased provider's root; layers wrapped around it are bypassed.
impl<N: Network> IntoRootProvider<N> for DynProvider<N> {
    async fn into_root_provider(self) -> Result<RootProvider<N>, FeedError> {
        Ok(self.root().clone())
    }
}
