use fd_contract::PollPolicy;
use fd_types::{Address, TargetNetwork};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const CONTRACT_ADDRESS_VAR: &str = "FUNDER_CONTRACT_ADDRESS";
pub const RPC_URL_VAR: &str = "FUNDER_RPC_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    pub network: TargetNetwork,
    /// Unset means every bind fails with `NotConfigured`.
    pub contract_address: Option<Address>,
    pub confirmation_poll: PollPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            network: TargetNetwork::sepolia(),
            contract_address: None,
            confirmation_poll: PollPolicy::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Values baked in at compile time, for targets without a process
    /// environment (the browser build).
    pub fn from_build_env() -> Self {
        Self::from_lookup(|key| match key {
            CONTRACT_ADDRESS_VAR => option_env!("FUNDER_CONTRACT_ADDRESS").map(str::to_owned),
            RPC_URL_VAR => option_env!("FUNDER_RPC_URL").map(str::to_owned),
            _ => None,
        })
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup(RPC_URL_VAR).filter(|url| !url.trim().is_empty()) {
            info!("using rpc endpoint {url} for {}", config.network.display_name);
            config.network.rpc_url = url.trim().to_owned();
        }
        config.contract_address = lookup(CONTRACT_ADDRESS_VAR)
            .as_deref()
            .and_then(parse_contract_address);
        if config.contract_address.is_none() {
            warn!("{CONTRACT_ADDRESS_VAR} is not set; campaigns cannot be loaded");
        }
        config
    }

    pub fn with_contract_address(mut self, address: Address) -> Self {
        self.contract_address = Some(address);
        self
    }
}

fn parse_contract_address(raw: &str) -> Option<Address> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(address) => Some(address),
        Err(err) => {
            warn!("ignoring invalid {CONTRACT_ADDRESS_VAR} {raw:?}: {err}");
            None
        }
    }
}
