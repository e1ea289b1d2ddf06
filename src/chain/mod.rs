//! Chain access
//!
//! Everything the engine needs from a node goes through [`ChainReader`]:
//! one read-only `eth_call` and one `eth_getCode`. The RPC implementation
//! lives in [`rpc`]; tests script a node in memory.

mod rpc;
mod types;

#[cfg(test)]
pub(crate) mod mock;

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;

use crate::error::CallError;

pub use rpc::RpcChainReader;
pub use types::{
    ICurveGauge, ICurveGaugeFactory, IMulticall3, CURVE_GAUGES_API, MAX_BOOST, MULTICALL3,
    PER_MAX_BOOST, PROVIDER_WALLETS, TRUSTED_FACTORIES,
};

/// Read-only view of a chain.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Execute `data` against `to` at the latest block and return the raw result.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, CallError>;

    /// Deployed bytecode at `address`; empty when nothing is deployed.
    async fn get_code(&self, address: Address) -> Result<Bytes, CallError>;
}
