//! Gauge Info
//!
//! Merges the three engines into one answer for a gauge address: the
//! verification verdict, the pool record from the cached gauge list and the
//! boosts of the configured provider wallets.

use alloy_primitives::Address;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::boost::BoostCalculator;
use crate::cache::MetadataCache;
use crate::error::InputError;
use crate::metadata::PoolMetadata;
use crate::verifier::{parse_address, GaugeVerifier, VerificationOutcome};

pub const MSG_RETRIEVED: &str = "Gauge information retrieved successfully";
pub const MSG_NOT_FOUND: &str = "Gauge not found in Curve API";
pub const MSG_METADATA_UNAVAILABLE: &str = "Gauge metadata is currently unavailable";
pub const MSG_MISSING_GAUGE: &str = "Missing 'gauge' parameter";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderBoost {
    pub wallet: String,
    pub boost: Option<f64>,
    pub boost_formatted: String,
    pub pct_of_total_supply: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaugeInfoData {
    pub pool_name: String,
    pub gauge_address: String,
    pub pool_address: Option<String>,
    pub lp_token: Option<String>,
    pub blockchain: String,
    pub side_chain: bool,
    pub gauge_data: Value,
    pub gauge_controller: Value,
    pub gauge_relative_weight: Value,
    pub is_killed: bool,
    pub has_no_crv: bool,
    pub pool_type: Option<String>,
    pub factory: bool,
    pub provider_boosts: BTreeMap<String, ProviderBoost>,
}

impl GaugeInfoData {
    fn new(gauge: Address, pool: &PoolMetadata, provider_boosts: BTreeMap<String, ProviderBoost>) -> Self {
        Self {
            pool_name: pool.pool_name.clone(),
            gauge_address: gauge.to_checksum(None),
            pool_address: pool.pool_address(),
            lp_token: pool.lp_token(),
            blockchain: pool.blockchain(),
            side_chain: pool.side_chain(),
            gauge_data: json!({
                "inflation_rate": pool.gauge_data("inflation_rate"),
                "working_supply": pool.gauge_data("working_supply"),
            }),
            gauge_controller: pool.gauge_controller(),
            gauge_relative_weight: pool.gauge_relative_weight(),
            is_killed: pool.is_killed(),
            has_no_crv: pool.has_no_crv(),
            pool_type: pool.pool_type(),
            factory: pool.factory(),
            provider_boosts,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GaugeInfoResponse {
    pub success: bool,
    pub message: String,
    pub data: Option<GaugeInfoData>,
    pub verification: VerificationOutcome,
}

pub struct GaugeInfoService {
    verifier: Arc<GaugeVerifier>,
    boosts: Arc<BoostCalculator>,
    cache: Arc<MetadataCache>,
    provider_wallets: Vec<(String, Address)>,
}

impl GaugeInfoService {
    pub fn new(
        verifier: Arc<GaugeVerifier>,
        boosts: Arc<BoostCalculator>,
        cache: Arc<MetadataCache>,
        provider_wallets: Vec<(String, Address)>,
    ) -> Self {
        Self { verifier, boosts, cache, provider_wallets }
    }

    pub fn verifier(&self) -> &GaugeVerifier {
        &self.verifier
    }

    pub fn boosts(&self) -> &BoostCalculator {
        &self.boosts
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    /// Boosts of every provider wallet on `gauge`, keyed by provider name.
    pub async fn provider_boosts(&self, gauge: Address) -> BTreeMap<String, ProviderBoost> {
        let wallets: Vec<Address> = self.provider_wallets.iter().map(|(_, w)| *w).collect();
        let entries = self.boosts.compute_batch(&wallets, gauge).await;

        self.provider_wallets
            .iter()
            .map(|(name, wallet)| {
                let entry = entries.get(wallet);
                let boost = ProviderBoost {
                    wallet: wallet.to_checksum(None),
                    boost: entry.and_then(|e| e.boost),
                    boost_formatted: entry.map(|e| e.formatted()).unwrap_or_else(|| "N/A".to_string()),
                    pct_of_total_supply: entry.map(|e| e.pct_of_total_supply).unwrap_or(0.0),
                };
                (name.clone(), boost)
            })
            .collect()
    }

    /// Everything known about `gauge`. Only a missing parameter is an error.
    pub async fn gauge_info(&self, gauge: Option<&str>) -> Result<GaugeInfoResponse, InputError> {
        let raw = gauge
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .ok_or(InputError::MissingParameter("gauge"))?;

        let (verification, metadata) = tokio::join!(self.verifier.verify(Some(raw)), self.cache.get());

        let respond = |success: bool, message: &str, data: Option<GaugeInfoData>| GaugeInfoResponse {
            success,
            message: message.to_string(),
            data,
            verification: verification.clone(),
        };

        let Some(metadata) = metadata else {
            return Ok(respond(false, MSG_METADATA_UNAVAILABLE, None));
        };

        // An unparseable address cannot be in the list either
        let found = parse_address(raw)
            .ok()
            .and_then(|gauge| metadata.find(&gauge).map(|pool| (gauge, pool)));
        let Some((gauge, pool)) = found else {
            debug!("Gauge {} not in the gauge list", raw);
            return Ok(respond(false, MSG_NOT_FOUND, None));
        };

        let provider_boosts = self.provider_boosts(gauge).await;
        info!("Gauge info for {} ({})", gauge, pool.pool_name);

        Ok(respond(true, MSG_RETRIEVED, Some(GaugeInfoData::new(gauge, pool, provider_boosts))))
    }
}

// ============================================
// TESTS
// ============================================
