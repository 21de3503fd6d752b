use std::str::FromStr;
use std::time::Duration;

use alloy::dyn_abi::DynSolValue;
use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, U256};
use alloy::rpc::types::BlockId;
use eyre::eyre;
use thiserror::Error;
use tokio::time::timeout;
use tracing::debug;

use crate::rpc::{BoundContract, BoxError};

/// Upper bound for a single contract call, no retries on top of it
pub const CALL_TIMEOUT: Duration = Duration::from_secs(30);

const ERC20_ABI: &str = include_str!("abis/erc20.json");

/// Parses the embedded ERC20 interface every contract handle is bound with.
pub fn load_abi() -> serde_json::Result<JsonAbi> {
    serde_json::from_str(ERC20_ABI)
}

/// Kind of node the worker talks to, fixed for the process lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NodeMode {
    /// keeps full history, calls can be pinned to any block
    #[default]
    Archive,
    /// only serves head state, requested heights are ignored
    Recent,
}

impl FromStr for NodeMode {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "archive" => Ok(NodeMode::Archive),
            "recent" => Ok(NodeMode::Recent),
            other => Err(eyre!("unknown node mode {other:?}, expected archive or recent")),
        }
    }
}

/// Per-call parameters; `block: None` leaves the node default (latest)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    pub block: Option<BlockId>,
}

impl CallOptions {
    /// Height 0 means "not specified".
    pub fn new(mode: NodeMode, height: u64) -> Self {
        let block = match mode {
            NodeMode::Archive if height > 0 => Some(BlockId::number(height)),
            NodeMode::Archive => Some(BlockId::pending()),
            NodeMode::Recent => None,
        };
        Self { block }
    }
}

#[derive(Debug, Error)]
pub enum CallError {
    #[error("error calling {function} function: {source}")]
    Call {
        function: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("{function} call timed out")]
    Timeout { function: &'static str },

    #[error("{function} returned empty response (reverted 0x)")]
    EmptyResult { function: &'static str },

    #[error("{field} is not {expected} type, got {got}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
        got: String,
    },
}

impl CallError {
    /// Network-level failures a caller may choose to retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, CallError::Call { .. } | CallError::Timeout { .. })
    }
}

/// Dispatches ERC20 functions against bound contracts
#[derive(Debug, Clone, Copy)]
pub struct Erc20Caller {
    mode: NodeMode,
}

impl Erc20Caller {
    pub fn new(mode: NodeMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> NodeMode {
        self.mode
    }

    pub async fn total_supply(&self, bc: &dyn BoundContract, height: u64) -> Result<U256, CallError> {
        let value = self.invoke(bc, height, "totalSupply", &[]).await?;
        as_uint(value, "total supply")
    }

    pub async fn balance_of(
        &self,
        bc: &dyn BoundContract,
        holder: Address,
        height: u64,
    ) -> Result<U256, CallError> {
        let value = self
            .invoke(bc, height, "balanceOf", &[DynSolValue::Address(holder)])
            .await?;
        as_uint(value, "balance")
    }

    pub async fn name(&self, bc: &dyn BoundContract, height: u64) -> Result<String, CallError> {
        let value = self.invoke(bc, height, "name", &[]).await?;
        as_string(value, "name")
    }

    pub async fn symbol(&self, bc: &dyn BoundContract, height: u64) -> Result<String, CallError> {
        let value = self.invoke(bc, height, "symbol", &[]).await?;
        as_string(value, "symbol")
    }

    pub async fn decimals(&self, bc: &dyn BoundContract, height: u64) -> Result<u64, CallError> {
        let value = self.invoke(bc, height, "decimals", &[]).await?;
        match value {
            DynSolValue::Uint(v, _) => u8::try_from(v)
                .map(u64::from)
                .map_err(|_| CallError::TypeMismatch {
                    field: "decimals",
                    expected: "uint8",
                    got: v.to_string(),
                }),
            other => Err(mismatch("decimals", "uint8", &other)),
        }
    }

    async fn invoke(
        &self,
        bc: &dyn BoundContract,
        height: u64,
        function: &'static str,
        args: &[DynSolValue],
    ) -> Result<DynSolValue, CallError> {
        let opts = CallOptions::new(self.mode, height);
        debug!(contract = %bc.address(), function, block = ?opts.block, "calling contract");

        let results = timeout(CALL_TIMEOUT, bc.call(&opts, function, args))
            .await
            .map_err(|_| CallError::Timeout { function })?
            .map_err(|source| CallError::Call { function, source })?;

        results
            .into_iter()
            .next()
            .ok_or(CallError::EmptyResult { function })
    }
}

// Not on the serving path, kept as call primitives.
#[allow(dead_code)]
impl Erc20Caller {
    pub async fn allowance(
        &self,
        bc: &dyn BoundContract,
        height: u64,
        owner: Address,
        spender: Address,
    ) -> Result<U256, CallError> {
        let args = [DynSolValue::Address(owner), DynSolValue::Address(spender)];
        let value = self.invoke(bc, height, "allowance", &args).await?;
        as_uint(value, "allowance")
    }

    // State-mutating functions below go through the same eth_call path, so
    // they only simulate the outcome.

    pub async fn transfer(
        &self,
        bc: &dyn BoundContract,
        height: u64,
        recipient: Address,
        amount: U256,
    ) -> Result<bool, CallError> {
        let args = [DynSolValue::Address(recipient), DynSolValue::Uint(amount, 256)];
        let value = self.invoke(bc, height, "transfer", &args).await?;
        as_bool(value, "transfer result")
    }

    pub async fn approve(
        &self,
        bc: &dyn BoundContract,
        height: u64,
        spender: Address,
        amount: U256,
    ) -> Result<bool, CallError> {
        let args = [DynSolValue::Address(spender), DynSolValue::Uint(amount, 256)];
        let value = self.invoke(bc, height, "approve", &args).await?;
        as_bool(value, "approve result")
    }

    pub async fn transfer_from(
        &self,
        bc: &dyn BoundContract,
        height: u64,
        sender: Address,
        recipient: Address,
        amount: U256,
    ) -> Result<bool, CallError> {
        let args = [
            DynSolValue::Address(sender),
            DynSolValue::Address(recipient),
            DynSolValue::Uint(amount, 256),
        ];
        let value = self.invoke(bc, height, "transferFrom", &args).await?;
        as_bool(value, "transferFrom result")
    }
}

fn as_uint(value: DynSolValue, field: &'static str) -> Result<U256, CallError> {
    match value {
        DynSolValue::Uint(v, _) => Ok(v),
        other => Err(mismatch(field, "uint256", &other)),
    }
}

fn as_string(value: DynSolValue, field: &'static str) -> Result<String, CallError> {
    match value {
        DynSolValue::String(s) => Ok(s),
        other => Err(mismatch(field, "string", &other)),
    }
}

fn as_bool(value: DynSolValue, field: &'static str) -> Result<bool, CallError> {
    match value {
        DynSolValue::Bool(b) => Ok(b),
        other => Err(mismatch(field, "bool", &other)),
    }
}

fn mismatch(field: &'static str, expected: &'static str, got: &DynSolValue) -> CallError {
    CallError::TypeMismatch {
        field,
        expected,
        got: format!("{got:?}"),
    }
}
