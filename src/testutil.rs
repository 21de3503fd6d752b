// In-memory stand-ins for the chain node, shared by every test module.
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::dyn_abi::DynSolValue;
use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use crate::erc20::CallOptions;
use crate::rpc::{BoundContract, BoxError, ChainTransport};

#[derive(Debug, Clone)]
pub enum StubResponse {
    Values(Vec<DynSolValue>),
    Fail(String),
    /// never resolves
    Hang,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub opts: CallOptions,
    pub args: Vec<DynSolValue>,
}

pub struct StubContract {
    address: Address,
    responses: Mutex<HashMap<String, StubResponse>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl StubContract {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(&self, method: &str, response: StubResponse) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .insert(method.to_string(), response);
        self
    }

    pub fn returns(&self, method: &str, value: DynSolValue) -> &Self {
        self.respond(method, StubResponse::Values(vec![value]))
    }

    /// Canned `name`/`symbol`/`decimals` answers.
    pub fn token(&self, name: &str, symbol: &str, decimals: u8) -> &Self {
        self.returns("name", DynSolValue::String(name.into()))
            .returns("symbol", DynSolValue::String(symbol.into()))
            .returns("decimals", DynSolValue::Uint(U256::from(decimals), 8))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method)
            .count()
    }
}

#[async_trait]
impl BoundContract for StubContract {
    fn address(&self) -> Address {
        self.address
    }

    async fn call(
        &self,
        opts: &CallOptions,
        method: &str,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>, BoxError> {
        self.calls.lock().unwrap().push(RecordedCall {
            method: method.to_string(),
            opts: *opts,
            args: args.to_vec(),
        });

        let response = self.responses.lock().unwrap().get(method).cloned();
        match response {
            Some(StubResponse::Values(values)) => Ok(values),
            Some(StubResponse::Fail(msg)) => Err(msg.into()),
            Some(StubResponse::Hang) => std::future::pending().await,
            None => Err(format!("no stub response for {method}").into()),
        }
    }
}

#[derive(Default)]
pub struct StubTransport {
    contracts: Mutex<HashMap<Address, Arc<StubContract>>>,
    bindings: AtomicUsize,
    block: Mutex<Option<u64>>,
}

impl StubTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The stub behind `address`, created on first use.
    pub fn contract(&self, address: Address) -> Arc<StubContract> {
        self.contracts
            .lock()
            .unwrap()
            .entry(address)
            .or_insert_with(|| Arc::new(StubContract::new(address)))
            .clone()
    }

    pub fn bindings(&self) -> usize {
        self.bindings.load(Ordering::SeqCst)
    }

    /// `None` makes `block_number` fail.
    pub fn set_block_number(&self, block: Option<u64>) {
        *self.block.lock().unwrap() = block;
    }
}

#[async_trait]
impl ChainTransport for StubTransport {
    fn bound_contract(&self, address: Address, _abi: &JsonAbi) -> Arc<dyn BoundContract> {
        self.bindings.fetch_add(1, Ordering::SeqCst);
        self.contract(address)
    }

    async fn block_number(&self) -> Result<u64, BoxError> {
        let block = *self.block.lock().unwrap();
        block.ok_or_else(|| "node unreachable".into())
    }
}

pub fn uint(value: u64) -> DynSolValue {
    DynSolValue::Uint(U256::from(value), 256)
}
