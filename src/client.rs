use std::sync::Arc;

use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, U256};
use thiserror::Error;
use tracing::{debug, info};

use crate::cache::{ContractCache, ContractRecord};
use crate::erc20::{CallError, Erc20Caller};
use crate::metrics::Metrics;
use crate::models::{Balance, Details};
use crate::rpc::{BoundContract, ChainTransport};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network {0:?} is not registered and no contract address was given")]
    UnknownNetwork(String),

    #[error("chain call failed: {source}")]
    Call {
        operation: &'static str,
        #[source]
        source: CallError,
    },

    #[error("ERC20 metadata fetch failed: {source}")]
    Details {
        field: &'static str,
        #[source]
        source: CallError,
    },
}

impl ClientError {
    /// True when the underlying chain call failed at the network level.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::UnknownNetwork(_) => false,
            ClientError::Call { source, .. } | ClientError::Details { source, .. } => {
                source.is_transient()
            }
        }
    }
}

/// Contract resolved for one request
enum Resolved {
    Cached(Arc<ContractRecord>),
    /// not registered yet, metadata still to be fetched
    Fresh(Arc<dyn BoundContract>),
}

impl Resolved {
    fn contract(&self) -> &dyn BoundContract {
        match self {
            Resolved::Cached(record) => record.contract.as_ref(),
            Resolved::Fresh(contract) => contract.as_ref(),
        }
    }
}

/// Answers balance / total supply queries through the contract cache
pub struct Client {
    caller: Erc20Caller,
    transport: Arc<dyn ChainTransport>,
    cache: Arc<ContractCache>,
    erc20_abi: JsonAbi,
    metrics: Arc<Metrics>,
}

impl Client {
    pub fn new(
        caller: Erc20Caller,
        transport: Arc<dyn ChainTransport>,
        cache: Arc<ContractCache>,
        erc20_abi: JsonAbi,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            caller,
            transport,
            cache,
            erc20_abi,
            metrics,
        }
    }

    pub fn cache(&self) -> &ContractCache {
        &self.cache
    }

    /// Fetches metadata for `address` and registers it under both keys.
    pub async fn load_network(&self, name: &str, address: Address) -> Result<(), ClientError> {
        let contract = self.transport.bound_contract(address, &self.erc20_abi);
        let details = self.erc20_details(contract.as_ref(), 0).await?;
        info!(network = name, %address, symbol = %details.symbol, "registered network");

        self.cache
            .set(address, name, Arc::new(ContractRecord { contract, details }));
        Ok(())
    }

    pub async fn erc20_account_balance(
        &self,
        network: Option<&str>,
        contract: Option<Address>,
        account: Address,
        height: u64,
    ) -> Result<Vec<Balance>, ClientError> {
        let _timer = self.metrics.start_timer("getAccountBalance");
        let resolved = self.resolve(network, contract)?;

        let balance = self
            .caller
            .balance_of(resolved.contract(), account, height)
            .await
            .map_err(|source| ClientError::Call {
                operation: "balanceOf",
                source,
            })?;

        self.respond(resolved, balance, height).await
    }

    pub async fn erc20_total_supply(
        &self,
        network: Option<&str>,
        contract: Option<Address>,
        height: u64,
    ) -> Result<Vec<Balance>, ClientError> {
        let _timer = self.metrics.start_timer("getERC20TotalSupply");
        let resolved = self.resolve(network, contract)?;

        let supply = self
            .caller
            .total_supply(resolved.contract(), height)
            .await
            .map_err(|source| ClientError::Call {
                operation: "totalSupply",
                source,
            })?;

        self.respond(resolved, supply, height).await
    }

    // Alias first, then address, then a fresh unregistered handle.
    fn resolve(
        &self,
        network: Option<&str>,
        contract: Option<Address>,
    ) -> Result<Resolved, ClientError> {
        let network = network.filter(|n| !n.is_empty());

        let cached = network
            .and_then(|n| self.cache.get_by_network(n))
            .or_else(|| contract.and_then(|a| self.cache.get_by_address(&a)));
        if let Some(record) = cached {
            debug!(contract = %record.address(), "contract cache hit");
            return Ok(Resolved::Cached(record));
        }

        let address = contract
            .ok_or_else(|| ClientError::UnknownNetwork(network.unwrap_or_default().to_string()))?;
        debug!(%address, "contract cache miss");
        Ok(Resolved::Fresh(
            self.transport.bound_contract(address, &self.erc20_abi),
        ))
    }

    // Metadata is only fetched for contracts not seen before; a failure
    // drops the already fetched value and registers nothing. Aliases are
    // only written by `load_network`.
    async fn respond(
        &self,
        resolved: Resolved,
        value: U256,
        height: u64,
    ) -> Result<Vec<Balance>, ClientError> {
        let details = match resolved {
            Resolved::Cached(record) => record.details.clone(),
            Resolved::Fresh(contract) => {
                let details = self.erc20_details(contract.as_ref(), height).await?;
                let address = contract.address();
                let record = Arc::new(ContractRecord {
                    contract,
                    details: details.clone(),
                });
                self.cache.set(address, "", record);
                details
            }
        };

        Ok(vec![Balance::new(value, details)])
    }

    async fn erc20_details(
        &self,
        bc: &dyn BoundContract,
        height: u64,
    ) -> Result<Details, ClientError> {
        let name = self.caller.name(bc, height).await.map_err(details_err("name"))?;
        let symbol = self.caller.symbol(bc, height).await.map_err(details_err("symbol"))?;
        let decimals = self
            .caller
            .decimals(bc, height)
            .await
            .map_err(details_err("decimals"))?;

        Ok(Details {
            name,
            symbol,
            decimals,
        })
    }
}

fn details_err(field: &'static str) -> impl FnOnce(CallError) -> ClientError {
    move |source| ClientError::Details { field, source }
}
