//! Call Codec
//!
//! Builds calldata from a small function schema and decodes raw return data
//! by hand for the three static types the gauge contracts return. Anything
//! else is carried through as opaque bytes.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::chain::{ICurveGauge, ICurveGaugeFactory};
use crate::error::{CodecError, DecodeError};

// ============================================
// SCHEMA TYPES
// ============================================

/// Static argument types a schema function can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Address,
    Uint256,
    Bool,
}

/// Declared output of a schema function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Uint256,
    Address,
    Bool,
    /// Anything without a manual decoder; passed through as raw bytes.
    Opaque,
}

/// Whether a function can legitimately revert for valid inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragility {
    /// Expected to succeed; safe to batch.
    Reliable,
    /// May revert (e.g. an accessor that only exists on one gauge shape).
    MayRevert,
}

#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub name: String,
    pub selector: [u8; 4],
    pub inputs: Vec<ArgKind>,
    pub output: OutputKind,
    pub fragility: Fragility,
}

impl FunctionSignature {
    /// Describe a `sol!` call type; name and selector come from its signature.
    pub fn of<C: SolCall>(inputs: &[ArgKind], output: OutputKind, fragility: Fragility) -> Self {
        let name = C::SIGNATURE.split('(').next().unwrap_or(C::SIGNATURE);
        Self {
            name: name.to_string(),
            selector: C::SELECTOR,
            inputs: inputs.to_vec(),
            output,
            fragility,
        }
    }
}

/// Function name -> signature lookup.
#[derive(Debug, Clone, Default)]
pub struct FunctionSchema {
    functions: HashMap<String, FunctionSignature>,
}

impl FunctionSchema {
    pub fn new(signatures: Vec<FunctionSignature>) -> Self {
        let functions = signatures
            .into_iter()
            .map(|sig| (sig.name.clone(), sig))
            .collect();
        Self { functions }
    }

    /// The gauge and gauge-factory functions this service reads.
    pub fn curve_gauges() -> Arc<FunctionSchema> {
        GAUGE_SCHEMA.clone()
    }

    pub fn get(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.get(name)
    }

    /// Build a [`CallSpec`], checking the arguments against the declaration.
    pub fn call(&self, target: Address, function: &str, args: Vec<CallArg>) -> Result<CallSpec, CodecError> {
        let sig = self
            .get(function)
            .ok_or_else(|| CodecError::UnknownFunction(function.to_string()))?;

        if sig.inputs.len() != args.len() {
            return Err(CodecError::ArgumentCount {
                function: sig.name.clone(),
                expected: sig.inputs.len(),
                got: args.len(),
            });
        }
        for (index, (kind, arg)) in sig.inputs.iter().zip(&args).enumerate() {
            if arg.kind() != *kind {
                return Err(CodecError::ArgumentType { function: sig.name.clone(), index });
            }
        }

        Ok(CallSpec {
            target,
            function: sig.name.clone(),
            selector: sig.selector,
            args,
            output: sig.output,
            fragility: sig.fragility,
        })
    }
}

lazy_static::lazy_static! {
    static ref GAUGE_SCHEMA: Arc<FunctionSchema> = Arc::new(FunctionSchema::new(vec![
        // Gauge accessors
        FunctionSignature::of::<ICurveGauge::factoryCall>(&[], OutputKind::Address, Fragility::MayRevert),
        FunctionSignature::of::<ICurveGauge::lp_tokenCall>(&[], OutputKind::Address, Fragility::MayRevert),
        FunctionSignature::of::<ICurveGauge::totalSupplyCall>(&[], OutputKind::Uint256, Fragility::Reliable),
        FunctionSignature::of::<ICurveGauge::working_supplyCall>(&[], OutputKind::Uint256, Fragility::Reliable),
        FunctionSignature::of::<ICurveGauge::balanceOfCall>(&[ArgKind::Address], OutputKind::Uint256, Fragility::Reliable),
        FunctionSignature::of::<ICurveGauge::working_balancesCall>(&[ArgKind::Address], OutputKind::Uint256, Fragility::Reliable),
        FunctionSignature::of::<ICurveGauge::is_killedCall>(&[], OutputKind::Bool, Fragility::Reliable),
        // Factory lookups
        FunctionSignature::of::<ICurveGaugeFactory::get_gaugeCall>(&[ArgKind::Address], OutputKind::Address, Fragility::MayRevert),
        FunctionSignature::of::<ICurveGaugeFactory::is_valid_gaugeCall>(&[ArgKind::Address], OutputKind::Bool, Fragility::MayRevert),
    ]));
}

// ============================================
// CALLS
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallArg {
    Address(Address),
    Uint256(U256),
    Bool(bool),
}

impl CallArg {
    pub fn kind(&self) -> ArgKind {
        match self {
            CallArg::Address(_) => ArgKind::Address,
            CallArg::Uint256(_) => ArgKind::Uint256,
            CallArg::Bool(_) => ArgKind::Bool,
        }
    }

    /// The 32-byte ABI head word for this argument.
    fn word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        match self {
            CallArg::Address(addr) => word[12..].copy_from_slice(addr.as_slice()),
            CallArg::Uint256(value) => word = value.to_be_bytes::<32>(),
            CallArg::Bool(flag) => word[31] = u8::from(*flag),
        }
        word
    }
}

impl From<Address> for CallArg {
    fn from(addr: Address) -> Self {
        CallArg::Address(addr)
    }
}

/// One contract read, already checked against the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSpec {
    pub target: Address,
    pub function: String,
    pub selector: [u8; 4],
    pub args: Vec<CallArg>,
    pub output: OutputKind,
    pub fragility: Fragility,
}

impl CallSpec {
    pub fn is_fragile(&self) -> bool {
        self.fragility == Fragility::MayRevert
    }
}

impl fmt::Display for CallSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}({} args)", self.target, self.function, self.args.len())
    }
}

/// Selector followed by one word per argument.
pub fn encode(call: &CallSpec) -> Bytes {
    let mut data = Vec::with_capacity(4 + 32 * call.args.len());
    data.extend_from_slice(&call.selector);
    for arg in &call.args {
        data.extend_from_slice(&arg.word());
    }
    data.into()
}

// ============================================
// DECODING
// ============================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedValue {
    Uint(U256),
    Address(Address),
    Bool(bool),
    Raw(Bytes),
}

impl DecodedValue {
    pub fn as_uint(&self) -> Option<U256> {
        match self {
            DecodedValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            DecodedValue::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DecodedValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedValue::Uint(v) => write!(f, "{}", v),
            DecodedValue::Address(a) => write!(f, "{}", a.to_checksum(None)),
            DecodedValue::Bool(b) => write!(f, "{}", b),
            DecodedValue::Raw(bytes) => write!(f, "{}", bytes),
        }
    }
}

impl Serialize for DecodedValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DecodedValue::Bool(b) => serializer.serialize_bool(*b),
            other => serializer.serialize_str(&other.to_string()),
        }
    }
}

/// First 32-byte word of `raw`.
fn head_word(raw: &[u8]) -> Result<&[u8], DecodeError> {
    match raw.len() {
        0 => Err(DecodeError::Empty),
        n if n < 32 => Err(DecodeError::Short(n)),
        _ => Ok(&raw[..32]),
    }
}

/// Decode `raw` as `output`, reporting why it did not fit.
pub fn try_decode(raw: &[u8], output: OutputKind) -> Result<DecodedValue, DecodeError> {
    match output {
        OutputKind::Uint256 => Ok(DecodedValue::Uint(U256::from_be_slice(head_word(raw)?))),
        OutputKind::Address => Ok(DecodedValue::Address(Address::from_slice(&head_word(raw)?[12..]))),
        OutputKind::Bool => Ok(DecodedValue::Bool(!U256::from_be_slice(head_word(raw)?).is_zero())),
        OutputKind::Opaque if raw.is_empty() => Err(DecodeError::Empty),
        OutputKind::Opaque => Ok(DecodedValue::Raw(Bytes::copy_from_slice(raw))),
    }
}

/// Decode `raw` as `output`; failures become `None` with a warning.
pub fn decode(raw: &[u8], output: OutputKind) -> Option<DecodedValue> {
    match try_decode(raw, output) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Failed to decode {:?} result: {}", output, e);
            None
        }
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use alloy_sol_types::SolValue;

    const GAUGE: Address = address!("09F62a6777032329C0d49F1FD4fBe9b3468CDa56");
    const WALLET: Address = address!("F147b8125d2ef93FB6965Db97D6746952a133934");

    #[test]
    fn test_encode_matches_sol_macro() {
        let schema = FunctionSchema::curve_gauges();

        let call = schema.call(GAUGE, "working_balances", vec![WALLET.into()]).unwrap();
        let expected = ICurveGauge::working_balancesCall { account: WALLET }.abi_encode();
        assert_eq!(encode(&call).to_vec(), expected);

        let call = schema.call(GAUGE, "totalSupply", vec![]).unwrap();
        assert_eq!(encode(&call).to_vec(), ICurveGauge::totalSupplyCall {}.abi_encode());

        let call = schema.call(GAUGE, "is_valid_gauge", vec![GAUGE.into()]).unwrap();
        let expected = ICurveGaugeFactory::is_valid_gaugeCall { gauge: GAUGE }.abi_encode();
        assert_eq!(encode(&call).to_vec(), expected);
    }

    #[test]
    fn test_schema_rejects_bad_calls() {
        let schema = FunctionSchema::curve_gauges();

        assert_eq!(
            schema.call(GAUGE, "transfer", vec![]),
            Err(CodecError::UnknownFunction("transfer".to_string()))
        );
        assert!(matches!(
            schema.call(GAUGE, "balanceOf", vec![]),
            Err(CodecError::ArgumentCount { expected: 1, got: 0, .. })
        ));
        assert!(matches!(
            schema.call(GAUGE, "balanceOf", vec![CallArg::Bool(true)]),
            Err(CodecError::ArgumentType { index: 0, .. })
        ));
    }

    #[test]
    fn test_fragile_functions() {
        let schema = FunctionSchema::curve_gauges();
        for name in ["lp_token", "factory", "get_gauge", "is_valid_gauge"] {
            assert_eq!(schema.get(name).unwrap().fragility, Fragility::MayRevert, "{}", name);
        }
        for name in ["totalSupply", "balanceOf", "working_balances"] {
            assert_eq!(schema.get(name).unwrap().fragility, Fragility::Reliable, "{}", name);
        }
    }

    #[test]
    fn test_decode_uint() {
        let raw = U256::from(123_456_789u64).abi_encode();
        assert_eq!(decode(&raw, OutputKind::Uint256), Some(DecodedValue::Uint(U256::from(123_456_789u64))));

        // Empty and short return data never raise
        assert_eq!(decode(&[], OutputKind::Uint256), None);
        assert_eq!(try_decode(&[0u8; 31], OutputKind::Uint256), Err(DecodeError::Short(31)));
    }

    #[test]
    fn test_decode_address_is_checksummed() {
        let raw = WALLET.abi_encode();
        let value = decode(&raw, OutputKind::Address).unwrap();
        assert_eq!(value.as_address(), Some(WALLET));
        assert_eq!(value.to_string(), "0xF147b8125d2ef93FB6965Db97D6746952a133934");
    }

    #[test]
    fn test_decode_bool() {
        assert_eq!(decode(&true.abi_encode(), OutputKind::Bool), Some(DecodedValue::Bool(true)));
        assert_eq!(decode(&false.abi_encode(), OutputKind::Bool), Some(DecodedValue::Bool(false)));

        // Any nonzero word counts as true
        let mut raw = [0u8; 32];
        raw[0] = 0x80;
        assert_eq!(decode(&raw, OutputKind::Bool), Some(DecodedValue::Bool(true)));
    }

    #[test]
    fn test_decode_opaque_passthrough() {
        let raw = String::from("gauge").abi_encode();
        assert_eq!(decode(&raw, OutputKind::Opaque), Some(DecodedValue::Raw(raw.clone().into())));
        assert_eq!(decode(&[], OutputKind::Opaque), None);
    }
}
