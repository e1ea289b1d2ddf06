//! Boost Calculator
//!
//! boost = working_balance / (0.4 * balance), clamped to [1.0, 2.5].
//!
//! All balances for a set of wallets plus the gauge's total supply come back
//! from a single aggregator round trip.

use alloy_primitives::{Address, U256};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::chain::{MAX_BOOST, PER_MAX_BOOST};
use crate::codec::{CallArg, CallSpec, DecodedValue};
use crate::error::CodecError;
use crate::multicall::BatchAggregator;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoostEntry {
    #[serde(serialize_with = "serialize_checksummed")]
    pub wallet: Address,
    pub boost: Option<f64>,
    #[serde(serialize_with = "serialize_decimal")]
    pub working_balance: Option<U256>,
    #[serde(serialize_with = "serialize_decimal")]
    pub gauge_balance: Option<U256>,
    pub pct_of_total_supply: f64,
}

impl BoostEntry {
    fn unknown(wallet: Address) -> Self {
        Self {
            wallet,
            boost: None,
            working_balance: None,
            gauge_balance: None,
            pct_of_total_supply: 0.0,
        }
    }

    /// Boost rendered with four decimals, or "N/A".
    pub fn formatted(&self) -> String {
        match self.boost {
            Some(boost) => format!("{:.4}", boost),
            None => "N/A".to_string(),
        }
    }
}

fn serialize_checksummed<S: Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&address.to_checksum(None))
}

fn serialize_decimal<S: Serializer>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.serialize_str(&v.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Boost for a wallet holding `balance` of which `working` counts.
pub fn boost_ratio(working: U256, balance: U256) -> f64 {
    if balance.is_zero() {
        return 1.0;
    }
    let boost = f64::from(working) / (PER_MAX_BOOST * f64::from(balance));
    boost.clamp(1.0, MAX_BOOST)
}

fn entry(wallet: Address, working: Option<U256>, balance: Option<U256>, total_supply: Option<U256>) -> BoostEntry {
    let (Some(working), Some(balance), Some(total_supply)) = (working, balance, total_supply) else {
        return BoostEntry::unknown(wallet);
    };
    if total_supply.is_zero() {
        return BoostEntry::unknown(wallet);
    }

    BoostEntry {
        wallet,
        boost: Some(boost_ratio(working, balance)),
        working_balance: Some(working),
        gauge_balance: Some(balance),
        pct_of_total_supply: f64::from(balance) / f64::from(total_supply) * 100.0,
    }
}

pub struct BoostCalculator {
    aggregator: BatchAggregator,
}

impl BoostCalculator {
    pub fn new(aggregator: BatchAggregator) -> Self {
        Self { aggregator }
    }

    /// Boost figures for every distinct wallet in `wallets` on `gauge`.
    pub async fn compute_batch(&self, wallets: &[Address], gauge: Address) -> BTreeMap<Address, BoostEntry> {
        let wallets: Vec<Address> = wallets.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();

        let results: Vec<Option<U256>> = match self.batch_calls(&wallets, gauge) {
            Ok(specs) => self
                .aggregator
                .execute(&specs)
                .await
                .into_iter()
                .map(|v| v.as_ref().and_then(DecodedValue::as_uint))
                .collect(),
            Err(e) => {
                warn!("Gauge schema cannot express boost reads: {}", e);
                Vec::new()
            }
        };
        let result = |i: usize| results.get(i).copied().flatten();

        let total_supply = result(0);
        debug!("Gauge {} total supply {:?}", gauge, total_supply);

        wallets
            .iter()
            .enumerate()
            .map(|(i, wallet)| {
                let working = result(1 + 2 * i);
                let balance = result(2 + 2 * i);
                (*wallet, entry(*wallet, working, balance, total_supply))
            })
            .collect()
    }

    /// `totalSupply` followed by a (working, balance) pair per wallet.
    fn batch_calls(&self, wallets: &[Address], gauge: Address) -> Result<Vec<CallSpec>, CodecError> {
        let schema = self.aggregator.schema();
        let mut calls = Vec::with_capacity(1 + 2 * wallets.len());
        calls.push(schema.call(gauge, "totalSupply", vec![])?);
        for wallet in wallets {
            let arg = vec![CallArg::Address(*wallet)];
            calls.push(schema.call(gauge, "working_balances", arg.clone())?);
            calls.push(schema.call(gauge, "balanceOf", arg)?);
        }
        Ok(calls)
    }

    /// Boost for a single wallet; `None` when it cannot be determined.
    pub async fn boost_for(&self, wallet: Address, gauge: Address) -> Option<f64> {
        self.compute_batch(&[wallet], gauge)
            .await
            .remove(&wallet)
            .and_then(|entry| entry.boost)
    }
}

// ============================================
// TESTS
// ============================================
