use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use alloy::primitives::Address;

use crate::models::Details;
use crate::rpc::BoundContract;

/// A contract the worker has already seen, with its fetched metadata
pub struct ContractRecord {
    pub contract: Arc<dyn BoundContract>,
    pub details: Details,
}

impl ContractRecord {
    pub fn address(&self) -> Address {
        self.contract.address()
    }
}

#[derive(Default)]
struct Indexes {
    by_address: HashMap<Address, Arc<ContractRecord>>,
    by_network: HashMap<String, Arc<ContractRecord>>, // keys are lower-cased
}

/// Address and network-name index over cached contracts.
///
/// Entries are never evicted or refreshed. The lock is only held for map
/// operations; callers fetch metadata before `set`.
#[derive(Default)]
pub struct ContractCache {
    inner: RwLock<Indexes>,
}

impl ContractCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_by_address(&self, address: &Address) -> Option<Arc<ContractRecord>> {
        let idx = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        idx.by_address.get(address).cloned()
    }

    pub fn get_by_network(&self, network: &str) -> Option<Arc<ContractRecord>> {
        let idx = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        idx.by_network.get(&network.to_lowercase()).cloned()
    }

    /// Last write wins; an empty `network` only indexes the address.
    pub fn set(&self, address: Address, network: &str, record: Arc<ContractRecord>) {
        let mut idx = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if !network.is_empty() {
            idx.by_network.insert(network.to_lowercase(), Arc::clone(&record));
        }
        idx.by_address.insert(address, record);
    }

    pub fn len(&self) -> usize {
        let idx = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        idx.by_address.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::StubContract;
    use alloy::primitives::address;

    const SKL: Address = address!("00c83aecc790e8a4453e5dd3b0b4b3680501a7a7");

    fn record(address: Address, symbol: &str) -> Arc<ContractRecord> {
        Arc::new(ContractRecord {
            contract: Arc::new(StubContract::new(address)),
            details: Details {
                name: format!("{symbol} Token"),
                symbol: symbol.into(),
                decimals: 18,
            },
        })
    }

    #[test]
    fn network_lookup_ignores_case() {
        let cache = ContractCache::new();
        let skale = record(SKL, "SKL");
        cache.set(SKL, "Skale", Arc::clone(&skale));

        for name in ["skale", "SKALE", "Skale"] {
            let hit = cache.get_by_network(name).expect(name);
            assert!(Arc::ptr_eq(&hit, &skale));
        }
        assert!(Arc::ptr_eq(&cache.get_by_address(&SKL).unwrap(), &skale));
    }

    #[test]
    fn empty_network_indexes_address_only() {
        let cache = ContractCache::new();
        cache.set(SKL, "", record(SKL, "SKL"));

        assert!(cache.get_by_address(&SKL).is_some());
        assert!(cache.get_by_network("").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn lookups_never_create_entries() {
        let cache = ContractCache::new();
        assert!(cache.get_by_address(&SKL).is_none());
        assert!(cache.get_by_network("skale").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn set_overwrites_previous_record() {
        let cache = ContractCache::new();
        cache.set(SKL, "skale", record(SKL, "OLD"));
        cache.set(SKL, "skale", record(SKL, "NEW"));

        assert_eq!(cache.get_by_address(&SKL).unwrap().details.symbol, "NEW");
        assert_eq!(cache.get_by_network("Skale").unwrap().details.symbol, "NEW");
    }

    #[test]
    fn concurrent_readers_and_writers() {
        let cache = Arc::new(ContractCache::new());
        let handles: Vec<_> = (0u8..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    let addr = Address::repeat_byte(i + 1);
                    cache.set(addr, &format!("net{i}"), record(addr, "T"));
                    assert!(cache.get_by_network(&format!("NET{i}")).is_some());
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 8);
    }
}
