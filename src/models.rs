use alloy::primitives::U256;
use serde::{Serialize, Serializer};

/// One entry of a `/getBalance` or `/getTotalSupply` response
#[derive(Debug, Clone, Serialize)]
pub struct Balance {
    pub values: Values,
    pub details: Details,
}

/// ERC20 metadata, fetched once per contract and cached
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Details {
    pub name: String,
    pub symbol: String,
    pub decimals: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Values {
    #[serde(serialize_with = "as_decimal")]
    pub value: U256, // arbitrary precision, rendered as a decimal string
    #[serde(rename = "type")]
    pub kind: String, // always "" for ERC20 values
}

impl Balance {
    pub fn new(value: U256, details: Details) -> Self {
        Self {
            values: Values {
                value,
                kind: String::new(),
            },
            details,
        }
    }
}

fn as_decimal<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
