//! Gauge Scope
//!
//! Read-only answers about Curve gauges: whether an address is a gauge
//! deployed by a trusted factory, what the Curve API knows about it, and
//! how boosted the big liquidity providers are on it.

pub mod api;
pub mod boost;
pub mod cache;
pub mod chain;
pub mod codec;
pub mod config;
pub mod error;
pub mod gauge_info;
pub mod metadata;
pub mod multicall;
pub mod verifier;

use std::sync::Arc;

use boost::BoostCalculator;
use cache::MetadataCache;
use chain::{ChainReader, RpcChainReader};
use codec::FunctionSchema;
use config::Config;
use gauge_info::GaugeInfoService;
use metadata::{LocalSnapshot, MetadataSource, RemoteApi};
use multicall::BatchAggregator;
use verifier::GaugeVerifier;

/// Wire the engines together against the configured node and metadata sources.
pub fn build_service(config: &Config) -> eyre::Result<GaugeInfoService> {
    let chain: Arc<dyn ChainReader> = Arc::new(RpcChainReader::new(&config.rpc_url, config.rpc_timeout())?);
    let aggregator = BatchAggregator::new(chain, FunctionSchema::curve_gauges(), config.multicall_address);

    let sources: Vec<Arc<dyn MetadataSource>> = vec![
        Arc::new(LocalSnapshot::new(config.gauge_snapshot_path.clone())),
        Arc::new(RemoteApi::new(config.gauge_api_url.clone(), config.gauge_api_timeout())?),
    ];

    Ok(GaugeInfoService::new(
        Arc::new(GaugeVerifier::new(aggregator.clone(), config.trusted_factories.clone())),
        Arc::new(BoostCalculator::new(aggregator)),
        Arc::new(MetadataCache::new(sources, config.cache_ttl())),
        config.provider_wallets.clone(),
    ))
}
