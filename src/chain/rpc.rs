//! JSON-RPC backed [`ChainReader`].

use alloy_primitives::{Address, Bytes};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use async_trait::async_trait;
use eyre::{eyre, Result};
use std::time::Duration;
use tracing::trace;

use super::ChainReader;
use crate::error::CallError;

pub struct RpcChainReader {
    provider: DynProvider,
    timeout: Duration,
}

impl RpcChainReader {
    /// Connect to `rpc_url`; every call is bounded by `timeout`.
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self> {
        let url = rpc_url
            .parse()
            .map_err(|e| eyre!("Invalid RPC URL '{}': {}", rpc_url, e))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();

        Ok(Self { provider, timeout })
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, CallError> {
        trace!("eth_call {} selector=0x{}", to, hex::encode(data.get(..4).unwrap_or_default()));

        let tx = TransactionRequest::default().to(to).input(data.into());

        match tokio::time::timeout(self.timeout, self.provider.call(tx)).await {
            Ok(result) => result.map_err(CallError::from),
            Err(_) => Err(CallError::Timeout(self.timeout)),
        }
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, CallError> {
        match tokio::time::timeout(self.timeout, self.provider.get_code_at(address)).await {
            Ok(result) => result.map_err(CallError::from),
            Err(_) => Err(CallError::Timeout(self.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_malformed_url() {
        assert!(RpcChainReader::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_reads_code_from_live_node() {
        // This test requires RPC_URL to be set
        let Ok(rpc_url) = std::env::var("RPC_URL") else {
            return;
        };

        let reader = RpcChainReader::new(&rpc_url, Duration::from_secs(10)).unwrap();
        let code = reader.get_code(crate::chain::MULTICALL3).await.unwrap();
        assert!(!code.is_empty());
    }
}
