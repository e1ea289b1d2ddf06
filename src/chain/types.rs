//! Curve Gauge Types, Addresses, and ABIs
//!
//! Contains the contract addresses, interface definitions, and constants
//! used for gauge verification and boost lookups.
//!
//! CRITICAL: All addresses are for Ethereum Mainnet.

use alloy_primitives::{address, Address};
use alloy_sol_types::sol;

// ============================================
// MULTICALL3 INTERFACE
// ============================================

sol! {
    /// Multicall3 - deployed at same address on all EVM chains
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls)
            external payable returns (Result[] memory returnData);
    }
}

// ============================================
// CURVE GAUGE INTERFACES
// ============================================

sol! {
    interface ICurveGauge {
        function factory() external view returns (address);
        function lp_token() external view returns (address);
        function totalSupply() external view returns (uint256);
        function working_supply() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function working_balances(address account) external view returns (uint256);
        function is_killed() external view returns (bool);
    }

    interface ICurveGaugeFactory {
        function get_gauge(address pool) external view returns (address);
        function is_valid_gauge(address gauge) external view returns (bool);
    }
}

// ============================================
// CONSTANTS
// ============================================

/// Multicall3 address (same on all EVM chains)
pub const MULTICALL3: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

/// Factories whose deployments are accepted as genuine gauges
pub const TRUSTED_FACTORIES: &[(Address, &str)] = &[
    (address!("6A8cbed756804B16E05E741eDaBd5cB544AE21bf"), "Regular"),
    (address!("abC000d88f23Bb45525E447528DBF656A9D55bf5"), "Bridge factory"),
    (address!("eF672bD94913CB6f1d2812a6e18c1fFdEd8eFf5c"), "Root/child gauge factory (fraxtal)"),
    (address!("98EE851a00abeE0d95D08cF4CA2BdCE32aeaAF7F"), "CurveTwocryptoFactory"),
    (address!("306A45a1478A000dC701A6e1f7a569afb8D9DCD6"), "Root liquidity gauge factory"),
];

/// Wallets whose boosts are reported on every gauge lookup
pub const PROVIDER_WALLETS: &[(&str, Address)] = &[
    ("yearn", address!("F147b8125d2ef93FB6965Db97D6746952a133934")),
    ("stakedao", address!("52f541764E6e90eeBc5c21Ff570De0e2D63766B6")),
    ("convex", address!("989AEb4d175e16225E39E87d0D97A3360524AD80")),
];

/// Maximum boost a veCRV holder can reach
pub const MAX_BOOST: f64 = 2.5;

/// Share of a deposit that counts as working without any boost
pub const PER_MAX_BOOST: f64 = 1.0 / MAX_BOOST;

/// Default source of gauge metadata
pub const CURVE_GAUGES_API: &str = "https://api.curve.fi/api/getAllGauges";
