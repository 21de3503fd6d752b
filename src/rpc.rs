// src/rpc.rs
use std::sync::Arc;

use alloy::contract::{ContractInstance, Interface};
use alloy::dyn_abi::DynSolValue;
use alloy::json_abi::JsonAbi;
use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use eyre::Result;
use tracing::info;

use crate::erc20::CallOptions;

/// Error type crossing the transport boundary
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A contract address bound to its ABI, able to issue read-only calls
#[async_trait]
pub trait BoundContract: Send + Sync {
    fn address(&self) -> Address;

    /// Calls `method` once and returns every decoded output value.
    async fn call(
        &self,
        opts: &CallOptions,
        method: &str,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>, BoxError>;
}

/// Connection to a chain node, shared across requests
#[async_trait]
pub trait ChainTransport: Send + Sync {
    fn bound_contract(&self, address: Address, abi: &JsonAbi) -> Arc<dyn BoundContract>;

    async fn block_number(&self) -> Result<u64, BoxError>;
}

/// HTTP JSON-RPC transport backed by an alloy provider
#[derive(Clone)]
pub struct AlloyTransport {
    provider: DynProvider,
}

impl AlloyTransport {
    pub fn connect(node_url: &str) -> Result<Self> {
        let url: Url = node_url.parse()?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        info!("📡 Ethereum transport ready → {}", node_url);
        Ok(Self { provider })
    }
}

#[async_trait]
impl ChainTransport for AlloyTransport {
    fn bound_contract(&self, address: Address, abi: &JsonAbi) -> Arc<dyn BoundContract> {
        // just a structure, nothing is sent to the node here
        let inner = ContractInstance::new(address, self.provider.clone(), Interface::new(abi.clone()));
        Arc::new(AlloyContract { inner })
    }

    async fn block_number(&self) -> Result<u64, BoxError> {
        Ok(self.provider.get_block_number().await?)
    }
}

struct AlloyContract {
    inner: ContractInstance<DynProvider>,
}

#[async_trait]
impl BoundContract for AlloyContract {
    fn address(&self) -> Address {
        *self.inner.address()
    }

    async fn call(
        &self,
        opts: &CallOptions,
        method: &str,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>, BoxError> {
        let mut call = self.inner.function(method, args)?;
        if let Some(block) = opts.block {
            call = call.block(block);
        }
        match call.call().await {
            Ok(values) => Ok(values),
            // node answered `0x`, let the caller classify it
            Err(alloy::contract::Error::ZeroData(..)) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::erc20::{CallError, Erc20Caller, NodeMode};
    use alloy::primitives::{address, Bytes};
    use alloy::transports::mock::Asserter;

    #[tokio::test]
    async fn bound_contract_keeps_its_address() {
        let abi = crate::erc20::load_abi().unwrap();
        let transport = AlloyTransport::connect("http://127.0.0.1:8545").unwrap();

        let token = address!("00c83aecc790e8a4453e5dd3b0b4b3680501a7a7");
        let contract = transport.bound_contract(token, &abi);
        assert_eq!(contract.address(), token);
    }

    #[tokio::test]
    async fn connect_rejects_malformed_url() {
        assert!(AlloyTransport::connect("not a url").is_err());
    }

    #[tokio::test]
    async fn empty_node_reply_is_an_empty_result() {
        let asserter = Asserter::new();
        let provider = ProviderBuilder::new()
            .connect_mocked_client(asserter.clone())
            .erased();
        let transport = AlloyTransport { provider };
        let abi = crate::erc20::load_abi().unwrap();
        let contract =
            transport.bound_contract(address!("00c83aecc790e8a4453e5dd3b0b4b3680501a7a7"), &abi);

        asserter.push_success(&Bytes::new());
        let err = Erc20Caller::new(NodeMode::Recent)
            .total_supply(contract.as_ref(), 0)
            .await
            .unwrap_err();

        assert!(matches!(err, CallError::EmptyResult { function: "totalSupply" }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn node_error_stays_a_call_error() {
        let asserter = Asserter::new();
        let provider = ProviderBuilder::new()
            .connect_mocked_client(asserter.clone())
            .erased();
        let transport = AlloyTransport { provider };
        let abi = crate::erc20::load_abi().unwrap();
        let contract =
            transport.bound_contract(address!("00c83aecc790e8a4453e5dd3b0b4b3680501a7a7"), &abi);

        asserter.push_failure_msg("header not found");
        let err = Erc20Caller::new(NodeMode::Recent)
            .total_supply(contract.as_ref(), 0)
            .await
            .unwrap_err();

        assert!(matches!(err, CallError::Call { function: "totalSupply", .. }));
    }
}
