//! Scripted in-memory node for tests.
//!
//! Answers `eth_call` from a table keyed by (target, calldata) and emulates
//! Multicall3 `aggregate3` on top of the same table, so batched and single
//! calls see identical chain state.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{ChainReader, IMulticall3, MULTICALL3};
use crate::error::CallError;

#[derive(Default)]
pub(crate) struct MockChain {
    code: Mutex<HashMap<Address, Bytes>>,
    responses: Mutex<HashMap<(Address, Bytes), Option<Bytes>>>,
    fail_multicall: AtomicBool,
    fail_get_code: AtomicBool,
    rpc_calls: AtomicUsize,
    multicalls: AtomicUsize,
}

impl MockChain {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Deploy some bytecode at `address`.
    pub(crate) fn deploy(&self, address: Address) -> &Self {
        self.code
            .lock()
            .unwrap()
            .insert(address, Bytes::from_static(&[0x60, 0x80, 0x60, 0x40]));
        self
    }

    /// Script the raw return data of a call.
    pub(crate) fn respond(&self, target: Address, calldata: impl Into<Bytes>, ret: Vec<u8>) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .insert((target, calldata.into()), Some(ret.into()));
        self
    }

    pub(crate) fn respond_uint(&self, target: Address, calldata: impl Into<Bytes>, value: u64) -> &Self {
        self.respond(target, calldata, U256::from(value).abi_encode())
    }

    pub(crate) fn respond_address(&self, target: Address, calldata: impl Into<Bytes>, value: Address) -> &Self {
        self.respond(target, calldata, value.abi_encode())
    }

    pub(crate) fn respond_bool(&self, target: Address, calldata: impl Into<Bytes>, value: bool) -> &Self {
        self.respond(target, calldata, value.abi_encode())
    }

    /// Script a call to revert.
    pub(crate) fn revert(&self, target: Address, calldata: impl Into<Bytes>) -> &Self {
        self.responses.lock().unwrap().insert((target, calldata.into()), None);
        self
    }

    /// Make every Multicall3 submission fail at the transport level.
    pub(crate) fn fail_multicall(&self) -> &Self {
        self.fail_multicall.store(true, Ordering::SeqCst);
        self
    }

    /// Make `eth_getCode` time out for every address.
    pub(crate) fn fail_get_code(&self) -> &Self {
        self.fail_get_code.store(true, Ordering::SeqCst);
        self
    }

    /// Total `eth_call` round trips observed.
    pub(crate) fn rpc_calls(&self) -> usize {
        self.rpc_calls.load(Ordering::SeqCst)
    }

    /// `eth_call` round trips that went to Multicall3.
    pub(crate) fn multicalls(&self) -> usize {
        self.multicalls.load(Ordering::SeqCst)
    }

    fn lookup(&self, target: Address, data: &Bytes) -> Option<Bytes> {
        self.responses
            .lock()
            .unwrap()
            .get(&(target, data.clone()))
            .cloned()
            .flatten()
    }

    fn aggregate3(&self, data: &Bytes) -> Result<Bytes, CallError> {
        if self.fail_multicall.load(Ordering::SeqCst) {
            return Err(CallError::Transport("connection reset".to_string()));
        }

        let decoded = IMulticall3::aggregate3Call::abi_decode(data)
            .map_err(|e| CallError::Reverted(e.to_string()))?;

        let results: Vec<IMulticall3::Result> = decoded
            .calls
            .iter()
            .map(|call| match self.lookup(call.target, &call.callData) {
                Some(ret) => IMulticall3::Result { success: true, returnData: ret },
                None => IMulticall3::Result { success: false, returnData: Bytes::new() },
            })
            .collect();

        Ok((results,).abi_encode_params().into())
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, CallError> {
        self.rpc_calls.fetch_add(1, Ordering::SeqCst);

        if to == MULTICALL3 {
            self.multicalls.fetch_add(1, Ordering::SeqCst);
            return self.aggregate3(&data);
        }

        self.lookup(to, &data)
            .ok_or_else(|| CallError::Reverted("mock: no response scripted".to_string()))
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, CallError> {
        if self.fail_get_code.load(Ordering::SeqCst) {
            return Err(CallError::Timeout(std::time::Duration::from_secs(10)));
        }
        Ok(self.code.lock().unwrap().get(&address).cloned().unwrap_or_default())
    }
}
