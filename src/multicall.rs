//! Batch Aggregator - MULTICALL3 Edition
//!
//! Folds every reliable read of a request into one `aggregate3` call and
//! probes the fragile ones (accessors that revert on some gauge shapes)
//! individually, so a single revert never costs the rest of the batch.

use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

use crate::chain::{ChainReader, IMulticall3};
use crate::codec::{self, CallSpec, DecodedValue, FunctionSchema};
use crate::error::CallError;

/// Result of a single probed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Value(DecodedValue),
    Reverted(String),
}

impl CallOutcome {
    pub fn value(self) -> Option<DecodedValue> {
        match self {
            CallOutcome::Value(v) => Some(v),
            CallOutcome::Reverted(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct BatchAggregator {
    chain: Arc<dyn ChainReader>,
    schema: Arc<FunctionSchema>,
    multicall: Address,
}

impl BatchAggregator {
    pub fn new(chain: Arc<dyn ChainReader>, schema: Arc<FunctionSchema>, multicall: Address) -> Self {
        Self { chain, schema, multicall }
    }

    pub fn schema(&self) -> &FunctionSchema {
        &self.schema
    }

    pub fn chain(&self) -> &Arc<dyn ChainReader> {
        &self.chain
    }

    /// Execute `calls` and return one decoded value per call, in order.
    ///
    /// Failed calls decode to `None`; nothing here returns an error.
    pub async fn execute(&self, calls: &[CallSpec]) -> Vec<Option<DecodedValue>> {
        let start = Instant::now();

        let (fragile, reliable): (Vec<usize>, Vec<usize>) =
            (0..calls.len()).partition(|&i| calls[i].is_fragile());

        let reliable_calls: Vec<&CallSpec> = reliable.iter().map(|&i| &calls[i]).collect();
        let probes = fragile.iter().map(|&i| self.probe(&calls[i]));

        let (batched, probed) = tokio::join!(self.execute_batch(&reliable_calls), join_all(probes));

        let mut results: Vec<Option<DecodedValue>> = vec![None; calls.len()];
        for (slot, value) in reliable.into_iter().zip(batched) {
            results[slot] = value;
        }
        for (slot, outcome) in fragile.into_iter().zip(probed) {
            results[slot] = outcome.value();
        }

        debug!(
            "Aggregated {} calls ({} batched, {} probed) in {:?}",
            calls.len(),
            reliable_calls.len(),
            calls.len() - reliable_calls.len(),
            start.elapsed()
        );

        results
    }

    /// Run one call on its own and report whether it produced a value.
    pub async fn probe(&self, call: &CallSpec) -> CallOutcome {
        match self.chain.call(call.target, codec::encode(call)).await {
            Ok(raw) => match codec::try_decode(&raw, call.output) {
                Ok(value) => CallOutcome::Value(value),
                Err(e) => {
                    debug!("{} returned unusable data: {}", call, e);
                    CallOutcome::Reverted(e.to_string())
                }
            },
            Err(e) => {
                debug!("{} reverted: {}", call, e);
                CallOutcome::Reverted(e.to_string())
            }
        }
    }

    /// Submit `calls` as a single `aggregate3`; every slot is `None` if it fails.
    async fn execute_batch(&self, calls: &[&CallSpec]) -> Vec<Option<DecodedValue>> {
        if calls.is_empty() {
            return Vec::new();
        }

        match self.submit_aggregate3(calls).await {
            Ok(returns) if returns.len() == calls.len() => calls
                .iter()
                .zip(returns)
                .map(|(call, ret)| {
                    if ret.success {
                        codec::decode(&ret.returnData, call.output)
                    } else {
                        trace!("{} failed inside multicall", call);
                        None
                    }
                })
                .collect(),
            Ok(returns) => {
                warn!(
                    "Multicall3 returned {} results for {} calls, discarding batch",
                    returns.len(),
                    calls.len()
                );
                vec![None; calls.len()]
            }
            Err(e) => {
                warn!("Multicall3 batch of {} calls failed: {}", calls.len(), e);
                vec![None; calls.len()]
            }
        }
    }

    async fn submit_aggregate3(&self, calls: &[&CallSpec]) -> Result<Vec<IMulticall3::Result>, CallError> {
        let batch: Vec<IMulticall3::Call3> = calls
            .iter()
            .map(|call| IMulticall3::Call3 {
                target: call.target,
                allowFailure: true,
                callData: codec::encode(call),
            })
            .collect();

        let calldata = IMulticall3::aggregate3Call { calls: batch }.abi_encode();
        let raw = self.chain.call(self.multicall, calldata.into()).await?;

        IMulticall3::aggregate3Call::abi_decode_returns(&raw)
            .map_err(|e| CallError::Reverted(format!("undecodable aggregate3 result: {}", e)))
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChain;
    use crate::chain::{ICurveGauge, MULTICALL3};
    use alloy_primitives::{address, U256};

    const GAUGE: Address = address!("09F62a6777032329C0d49F1FD4fBe9b3468CDa56");
    const OTHER_GAUGE: Address = address!("1111111111111111111111111111111111111111");
    const LP: Address = address!("2222222222222222222222222222222222222222");
    const WALLET: Address = address!("F147b8125d2ef93FB6965Db97D6746952a133934");

    fn aggregator(chain: &Arc<MockChain>) -> BatchAggregator {
        BatchAggregator::new(chain.clone(), FunctionSchema::curve_gauges(), MULTICALL3)
    }

    fn calls() -> Vec<CallSpec> {
        let schema = FunctionSchema::curve_gauges();
        vec![
            schema.call(GAUGE, "lp_token", vec![]).unwrap(),
            schema.call(GAUGE, "totalSupply", vec![]).unwrap(),
            schema.call(OTHER_GAUGE, "lp_token", vec![]).unwrap(),
            schema.call(GAUGE, "balanceOf", vec![WALLET.into()]).unwrap(),
        ]
    }

    #[tokio::test]
    async fn test_results_stay_aligned_with_calls() {
        let chain = Arc::new(MockChain::new());
        chain
            .respond_address(GAUGE, ICurveGauge::lp_tokenCall {}.abi_encode(), LP)
            .respond_uint(GAUGE, ICurveGauge::totalSupplyCall {}.abi_encode(), 1_000)
            .revert(OTHER_GAUGE, ICurveGauge::lp_tokenCall {}.abi_encode())
            .respond_uint(GAUGE, ICurveGauge::balanceOfCall { account: WALLET }.abi_encode(), 250);

        let results = aggregator(&chain).execute(&calls()).await;

        assert_eq!(results.len(), 4);
        assert_eq!(results[0], Some(DecodedValue::Address(LP)));
        assert_eq!(results[1], Some(DecodedValue::Uint(U256::from(1_000))));
        assert_eq!(results[2], None);
        assert_eq!(results[3], Some(DecodedValue::Uint(U256::from(250))));

        // Reliable calls share one round trip; each fragile call gets its own
        assert_eq!(chain.multicalls(), 1);
        assert_eq!(chain.rpc_calls(), 3);
    }

    #[tokio::test]
    async fn test_fragile_revert_does_not_null_reliable_results() {
        let chain = Arc::new(MockChain::new());
        chain
            .revert(GAUGE, ICurveGauge::lp_tokenCall {}.abi_encode())
            .revert(OTHER_GAUGE, ICurveGauge::lp_tokenCall {}.abi_encode())
            .respond_uint(GAUGE, ICurveGauge::totalSupplyCall {}.abi_encode(), 7)
            .respond_uint(GAUGE, ICurveGauge::balanceOfCall { account: WALLET }.abi_encode(), 3);

        let results = aggregator(&chain).execute(&calls()).await;

        assert_eq!(results[0], None);
        assert_eq!(results[2], None);
        assert_eq!(results[1].as_ref().and_then(|v| v.as_uint()), Some(U256::from(7)));
        assert_eq!(results[3].as_ref().and_then(|v| v.as_uint()), Some(U256::from(3)));
    }

    #[tokio::test]
    async fn test_failed_batch_nulls_only_reliable_positions() {
        let chain = Arc::new(MockChain::new());
        chain
            .respond_address(GAUGE, ICurveGauge::lp_tokenCall {}.abi_encode(), LP)
            .respond_uint(GAUGE, ICurveGauge::totalSupplyCall {}.abi_encode(), 7)
            .fail_multicall();

        let results = aggregator(&chain).execute(&calls()).await;

        assert_eq!(results.len(), 4);
        assert_eq!(results[0], Some(DecodedValue::Address(LP)));
        assert_eq!(results[1], None);
        assert_eq!(results[3], None);
    }

    #[tokio::test]
    async fn test_every_permutation_preserves_length_and_order() {
        let chain = Arc::new(MockChain::new());
        chain
            .respond_address(GAUGE, ICurveGauge::lp_tokenCall {}.abi_encode(), LP)
            .respond_uint(GAUGE, ICurveGauge::totalSupplyCall {}.abi_encode(), 1_000)
            .respond_uint(GAUGE, ICurveGauge::balanceOfCall { account: WALLET }.abi_encode(), 250);

        let base = calls();
        let expected = aggregator(&chain).execute(&base).await;

        let orders = permutations(base.len());
        assert_eq!(orders.len(), 24);
        for order in orders {
            let shuffled: Vec<CallSpec> = order.iter().map(|&i| base[i].clone()).collect();
            let want: Vec<_> = order.iter().map(|&i| expected[i].clone()).collect();
            assert_eq!(aggregator(&chain).execute(&shuffled).await, want, "order {:?}", order);
        }
    }

    /// Every ordering of `0..n`.
    fn permutations(n: usize) -> Vec<Vec<usize>> {
        if n == 0 {
            return vec![Vec::new()];
        }
        let mut out = Vec::new();
        for shorter in permutations(n - 1) {
            for slot in 0..n {
                let mut order = shorter.clone();
                order.insert(slot, n - 1);
                out.push(order);
            }
        }
        out
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_rpc_calls() {
        let chain = Arc::new(MockChain::new());
        assert!(aggregator(&chain).execute(&[]).await.is_empty());
        assert_eq!(chain.rpc_calls(), 0);
    }

    #[tokio::test]
    async fn test_probe_reports_revert_and_empty_data() {
        let chain = Arc::new(MockChain::new());
        chain.respond(GAUGE, ICurveGauge::factoryCall {}.abi_encode(), Vec::new());

        let schema = FunctionSchema::curve_gauges();
        let agg = aggregator(&chain);

        let factory = schema.call(GAUGE, "factory", vec![]).unwrap();
        assert!(matches!(agg.probe(&factory).await, CallOutcome::Reverted(_)));

        let lp = schema.call(GAUGE, "lp_token", vec![]).unwrap();
        assert!(matches!(agg.probe(&lp).await, CallOutcome::Reverted(_)));
    }
}
