//! Error taxonomy
//!
//! Every failure in the engine falls into one of these classes. Only
//! `InputError` ever reaches a caller as an error; the rest are absorbed into
//! null results, invalid verdicts or stale cache payloads.

use std::time::Duration;
use thiserror::Error;

/// Missing or malformed request input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("missing required parameter '{0}'")]
    MissingParameter(&'static str),

    #[error("'{0}' is not a valid address")]
    InvalidAddress(String),
}

/// A contract read that did not produce usable return data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("execution reverted: {0}")]
    Reverted(String),

    #[error("rpc transport error: {0}")]
    Transport(String),

    #[error("rpc call timed out after {0:?}")]
    Timeout(Duration),
}

impl From<alloy_transport::TransportError> for CallError {
    fn from(err: alloy_transport::TransportError) -> Self {
        match err {
            // The node answered with a JSON-RPC error: for eth_call that is a revert.
            alloy_transport::RpcError::ErrorResp(payload) => {
                CallError::Reverted(payload.message.to_string())
            }
            other => CallError::Transport(other.to_string()),
        }
    }
}

/// A gauge metadata source that could not produce a usable payload.
#[derive(Error, Debug)]
pub enum UpstreamFetchError {
    #[error("{source_name} is not configured")]
    NotConfigured { source_name: &'static str },

    #[error("failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed payload: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("upstream reported an unsuccessful response")]
    Unsuccessful,

    #[error("payload is missing its '{0}' section")]
    MissingField(&'static str),
}

/// Building calldata for a call the schema cannot express.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("function '{0}' is not declared in the schema")]
    UnknownFunction(String),

    #[error("{function} expects {expected} argument(s), got {got}")]
    ArgumentCount {
        function: String,
        expected: usize,
        got: usize,
    },

    #[error("{function} argument {index} has the wrong type")]
    ArgumentType { function: String, index: usize },
}

/// Return data that does not fit the declared output type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty return data")]
    Empty,

    #[error("return data too short: {0} bytes, need 32")]
    Short(usize),
}
