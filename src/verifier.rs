//! Gauge Verification
//!
//! Walks the trust chain from a candidate address to one of the trusted
//! gauge factories:
//!
//! ```text
//! Start -> ContractCheck -> FactoryCheck -> LpBranch    -> Done
//!                                        \-> NonLpBranch -> Done
//! ```
//!
//! Every check that fails ends the walk with exactly one diagnostic. Whether
//! a gauge takes the LP branch is decided by probing `lp_token()`, not by any
//! prior classification.

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info};

use crate::codec::{CallArg, DecodedValue};
use crate::error::InputError;
use crate::multicall::{BatchAggregator, CallOutcome};

pub const MSG_NO_ADDRESS: &str = "No address parameter given.";
pub const MSG_INVALID_ADDRESS: &str = "Invalid Ethereum address.";
pub const MSG_NOT_CONTRACT: &str = "Supplied address is not a valid contract.";
pub const MSG_CODE_UNAVAILABLE: &str = "Unable to fetch contract code for supplied address.";
pub const MSG_FACTORY_REVERTED: &str =
    "Contract call to discover factory reverted. Ensure you provide a factory deployed gauge.";
pub const MSG_UNTRUSTED_FACTORY: &str = "Factory used to deploy this is not found on trusted list.";
pub const MSG_FACTORY_LOOKUP_REVERTED: &str = "Contract call reverted. This likely means that the supplied address is not a valid gauge from the latest factory.";
pub const MSG_VERIFIED: &str = "This is a verified factory deployed gauge.";
pub const MSG_FACTORY_REPORTS_INVALID: &str = "The factory reports this gauge as invalid.";

/// Final verdict for one address.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    pub is_valid: bool,
    pub message: String,
    pub elapsed_ms: u64,
    pub checked_at: DateTime<Utc>,
}

impl VerificationOutcome {
    /// Same verdict, ignoring timing.
    pub fn same_verdict(&self, other: &VerificationOutcome) -> bool {
        self.is_valid == other.is_valid && self.message == other.message
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Verdict {
    Valid,
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Start(Option<String>),
    ContractCheck { gauge: Address },
    FactoryCheck { gauge: Address },
    LpBranch { gauge: Address, factory: Address, lp_token: Address },
    NonLpBranch { gauge: Address, factory: Address },
    Done(Verdict),
}

impl State {
    fn invalid(message: impl Into<String>) -> Self {
        State::Done(Verdict::Invalid(message.into()))
    }
}

/// Parse an address the way wallets accept it: any all-lower or all-upper
/// hex is fine, mixed case must carry a valid checksum.
pub fn parse_address(raw: &str) -> Result<Address, InputError> {
    let trimmed = raw.trim();
    let hex = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let mixed_case = hex.chars().any(|c| c.is_ascii_lowercase()) && hex.chars().any(|c| c.is_ascii_uppercase());

    let parsed = if mixed_case {
        Address::parse_checksummed(trimmed, None).ok()
    } else {
        Address::from_str(trimmed).ok()
    };
    parsed.ok_or_else(|| InputError::InvalidAddress(raw.to_string()))
}

pub struct GaugeVerifier {
    aggregator: BatchAggregator,
    trusted_factories: Vec<Address>,
}

impl GaugeVerifier {
    pub fn new(aggregator: BatchAggregator, trusted_factories: Vec<Address>) -> Self {
        Self { aggregator, trusted_factories }
    }

    pub fn is_trusted_factory(&self, factory: &Address) -> bool {
        self.trusted_factories.contains(factory)
    }

    /// Run the full trust walk for `address`.
    pub async fn verify(&self, address: Option<&str>) -> VerificationOutcome {
        let start = Instant::now();
        let mut state = State::Start(address.map(str::to_string));

        let verdict = loop {
            state = match state {
                State::Done(verdict) => break verdict,
                current => {
                    let next = self.step(current).await;
                    debug!("verification -> {:?}", next);
                    next
                }
            };
        };

        let (is_valid, message) = match verdict {
            Verdict::Valid => (true, MSG_VERIFIED.to_string()),
            Verdict::Invalid(message) => (false, message),
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        info!(
            "Verified {}: valid={} ({}ms)",
            address.unwrap_or("<none>"),
            is_valid,
            elapsed_ms
        );

        VerificationOutcome {
            is_valid,
            message,
            elapsed_ms,
            checked_at: Utc::now(),
        }
    }

    async fn step(&self, state: State) -> State {
        match state {
            State::Start(raw) => match raw.as_deref().map(str::trim) {
                None | Some("") => State::invalid(MSG_NO_ADDRESS),
                Some(raw) => match parse_address(raw) {
                    Ok(gauge) => State::ContractCheck { gauge },
                    Err(_) => State::invalid(MSG_INVALID_ADDRESS),
                },
            },

            State::ContractCheck { gauge } => match self.aggregator.chain().get_code(gauge).await {
                Ok(code) if code.is_empty() => State::invalid(MSG_NOT_CONTRACT),
                Ok(_) => State::FactoryCheck { gauge },
                Err(e) => {
                    debug!("get_code({}) failed: {}", gauge, e);
                    State::invalid(MSG_CODE_UNAVAILABLE)
                }
            },

            State::FactoryCheck { gauge } => {
                let factory = match self.probe(gauge, "factory", None).await {
                    CallOutcome::Value(DecodedValue::Address(factory)) => factory,
                    _ => return State::invalid(MSG_FACTORY_REVERTED),
                };
                if !self.is_trusted_factory(&factory) {
                    return State::invalid(MSG_UNTRUSTED_FACTORY);
                }

                match self.probe(gauge, "lp_token", None).await {
                    CallOutcome::Value(DecodedValue::Address(lp_token)) => {
                        State::LpBranch { gauge, factory, lp_token }
                    }
                    _ => State::NonLpBranch { gauge, factory },
                }
            }

            State::LpBranch { gauge, factory, lp_token } => {
                match self.probe(factory, "get_gauge", Some(lp_token)).await {
                    // Parsed addresses compare byte-wise, so case never matters
                    CallOutcome::Value(DecodedValue::Address(deployed)) if deployed == gauge => {
                        State::Done(Verdict::Valid)
                    }
                    CallOutcome::Value(DecodedValue::Address(deployed)) => State::invalid(format!(
                        "Factory gauge {} for this pool does not match supplied address {}.",
                        deployed.to_checksum(None),
                        gauge.to_checksum(None)
                    )),
                    _ => State::invalid(MSG_FACTORY_LOOKUP_REVERTED),
                }
            }

            State::NonLpBranch { gauge, factory } => {
                match self.probe(factory, "is_valid_gauge", Some(gauge)).await {
                    CallOutcome::Value(DecodedValue::Bool(true)) => State::Done(Verdict::Valid),
                    CallOutcome::Value(DecodedValue::Bool(false)) => State::invalid(MSG_FACTORY_REPORTS_INVALID),
                    _ => State::invalid(MSG_FACTORY_LOOKUP_REVERTED),
                }
            }

            done @ State::Done(_) => done,
        }
    }

    async fn probe(&self, target: Address, function: &str, arg: Option<Address>) -> CallOutcome {
        let args: Vec<CallArg> = arg.map(CallArg::Address).into_iter().collect();
        match self.aggregator.schema().call(target, function, args) {
            Ok(call) => self.aggregator.probe(&call).await,
            Err(e) => CallOutcome::Reverted(e.to_string()),
        }
    }
}

// ============================================
// TESTS
// ============================================
