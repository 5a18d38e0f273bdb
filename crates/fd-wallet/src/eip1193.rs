use async_trait::async_trait;
use fd_types::{Address, NetworkId, TargetNetwork};
use serde_json::{Value, json};
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;

use crate::{EventHandler, ProviderEvent, Subscription, WalletError, WalletProvider};

/// The untyped `request({ method, params })` surface of an injected wallet
/// (or of anything that speaks the same JSON-RPC dialect).
#[async_trait(?Send)]
pub trait Eip1193Transport {
    fn is_available(&self) -> bool;
    async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError>;
    fn subscribe(&self, handler: EventHandler) -> Subscription;
    /// Suspends on the transport's own runtime; used between receipt polls.
    async fn sleep(&self, duration: Duration);
}

/// [`WalletProvider`] over a raw transport. Every returned field is validated
/// before it leaves this type.
pub struct Eip1193Wallet<T> {
    transport: Rc<T>,
}

impl<T> Eip1193Wallet<T> {
    pub fn new(transport: Rc<T>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> Rc<T> {
        self.transport.clone()
    }
}

#[async_trait(?Send)]
impl<T: Eip1193Transport> WalletProvider for Eip1193Wallet<T> {
    fn is_available(&self) -> bool {
        self.transport.is_available()
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let raw = self
            .transport
            .request("eth_requestAccounts", json!([]))
            .await?;
        parse_accounts(&raw)
    }

    async fn current_network_id(&self) -> Result<NetworkId, WalletError> {
        let raw = self.transport.request("eth_chainId", json!([])).await?;
        parse_network_id(&raw)
    }

    async fn request_network_switch(&self, target: NetworkId) -> Result<(), WalletError> {
        debug!("requesting switch to network {}", target);
        self.transport
            .request(
                "wallet_switchEthereumChain",
                json!([{ "chainId": target.to_hex() }]),
            )
            .await?;
        Ok(())
    }

    async fn request_add_network(&self, network: &TargetNetwork) -> Result<(), WalletError> {
        debug!("requesting wallet to add {}", network.display_name);
        self.transport
            .request("wallet_addEthereumChain", add_network_params(network))
            .await?;
        Ok(())
    }

    fn subscribe(&self, handler: EventHandler) -> Subscription {
        self.transport.subscribe(handler)
    }
}

pub fn add_network_params(network: &TargetNetwork) -> Value {
    json!([{
        "chainId": network.id.to_hex(),
        "chainName": network.display_name,
        "rpcUrls": [network.rpc_url],
        "nativeCurrency": {
            "name": network.native_currency.name,
            "symbol": network.native_currency.symbol,
            "decimals": network.native_currency.decimals,
        },
        "blockExplorerUrls": [network.explorer_url],
    }])
}

pub fn parse_accounts(raw: &Value) -> Result<Vec<Address>, WalletError> {
    let Some(items) = raw.as_array() else {
        return Err(WalletError::invalid("accounts", raw));
    };

    items
        .iter()
        .map(|item| {
            item.as_str()
                .and_then(|text| text.parse::<Address>().ok())
                .ok_or_else(|| WalletError::invalid("account", item))
        })
        .collect()
}

pub fn parse_network_id(raw: &Value) -> Result<NetworkId, WalletError> {
    raw.as_str()
        .and_then(NetworkId::from_hex)
        .ok_or_else(|| WalletError::invalid("chainId", raw))
}

/// Decodes a raw `accountsChanged` / `chainChanged` payload. Malformed
/// payloads are dropped rather than forwarded.
pub fn decode_event(name: &str, payload: &Value) -> Option<ProviderEvent> {
    match name {
        "accountsChanged" => parse_accounts(payload)
            .ok()
            .map(ProviderEvent::AccountsChanged),
        "chainChanged" => parse_network_id(payload)
            .ok()
            .map(ProviderEvent::NetworkChanged),
        _ => None,
    }
}
