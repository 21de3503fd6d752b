use std::{env, fs, path::Path, str::FromStr, time::Duration};

use alloy::primitives::Address;
use dotenvy::dotenv;
use eyre::{eyre, Result, WrapErr};
use serde::Deserialize;

use crate::erc20::NodeMode;

const DEFAULT_NETWORKS: &str = "skale:0x00c83aeCC790e8a4453e5dD3B0B4b3680501a7A7";

#[derive(Debug, Clone)]
pub struct Config {
    pub app_env: String,
    pub address: String,
    pub http_port: u16,
    pub ethereum_address: String, // node RPC URL
    pub node_mode: NodeMode,
    pub networks: Vec<NetworkName>,
    pub health_check_interval: Duration,
}

impl Config {
    pub fn is_development(&self) -> bool {
        matches!(self.app_env.as_str(), "development" | "local")
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.address, self.http_port)
    }
}

/// A predefined `name:address` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkName {
    pub name: String,
    pub address: Address,
}

/// Settings as read from the environment or a JSON file, before validation
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub app_env: Option<String>,
    pub address: Option<String>,
    pub http_port: Option<String>,
    pub ethereum_address: Option<String>,
    pub node_mode: Option<String>,
    pub predefined_network_names: Option<String>,
    pub health_check_interval: Option<String>,
}

impl RawConfig {
    pub fn from_env() -> Self {
        let var = |key: &str| env::var(key).ok().filter(|v| !v.is_empty());
        Self {
            app_env: var("APP_ENV"),
            address: var("ADDRESS"),
            http_port: var("HTTP_PORT"),
            ethereum_address: var("ETHEREUM_ADDRESS"),
            node_mode: var("NODE_MODE"),
            predefined_network_names: var("PREDEFINED_NETWORK_NAMES"),
            health_check_interval: var("HEALTH_CHECK_INTERVAL"),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .wrap_err_with(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&data).wrap_err("parsing config file")
    }

    pub fn into_config(self) -> Result<Config> {
        let http_port: u16 = self
            .http_port
            .as_deref()
            .unwrap_or("8097")
            .parse()
            .wrap_err("invalid HTTP_PORT")?;

        let node_mode = match self.node_mode.as_deref() {
            Some(mode) => NodeMode::from_str(mode)?,
            None => NodeMode::default(),
        };

        let networks = parse_network_names(
            self.predefined_network_names
                .as_deref()
                .unwrap_or(DEFAULT_NETWORKS),
        )?;

        let health_check_interval = parse_duration(
            self.health_check_interval.as_deref().unwrap_or("10s"),
        )
        .wrap_err("invalid HEALTH_CHECK_INTERVAL")?;

        Ok(Config {
            app_env: self.app_env.unwrap_or_else(|| "development".to_string()),
            address: self.address.unwrap_or_else(|| "0.0.0.0".to_string()),
            http_port,
            ethereum_address: self
                .ethereum_address
                .unwrap_or_else(|| "http://host.docker.internal:8545".to_string()),
            node_mode,
            networks,
            health_check_interval,
        })
    }
}

/// Loads `.env`, then reads `CONFIG_PATH` if set, the environment otherwise.
pub fn load() -> Result<Config> {
    dotenv().ok();

    let raw = match env::var("CONFIG_PATH") {
        Ok(path) if !path.is_empty() => RawConfig::from_file(path)?,
        _ => RawConfig::from_env(),
    };
    raw.into_config()
}

/// Parses `name:address;name:address;...`
pub fn parse_network_names(s: &str) -> Result<Vec<NetworkName>> {
    s.split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| -> Result<NetworkName> {
            let (name, address) = pair.split_once(':').ok_or_else(|| {
                eyre!("PREDEFINED_NETWORK_NAMES has to be in name:address;name:address format, got {pair:?}")
            })?;
            let address = Address::from_str(address.trim())
                .wrap_err_with(|| format!("invalid address for network {name:?}"))?;
            Ok(NetworkName {
                name: name.trim().to_string(),
                address,
            })
        })
        .collect()
}

// Accepts `500ms`, `10s`, `2m` or bare seconds.
fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let (num, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(i) => s.split_at(i),
        None => (s, "s"),
    };
    let n: u64 = num.parse().wrap_err_with(|| format!("bad duration {s:?}"))?;
    if n == 0 {
        return Err(eyre!("duration {s:?} must be positive"));
    }
    match unit {
        "ms" => Ok(Duration::from_millis(n)),
        "s" => Ok(Duration::from_secs(n)),
        "m" => n
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| eyre!("duration {s:?} is too large")),
        other => Err(eyre!("unknown duration unit {other:?} in {s:?}")),
    }
}
