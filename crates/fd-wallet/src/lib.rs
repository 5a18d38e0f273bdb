//! Typed boundary over the browser's injected wallet.
//!
//! Everything above this crate talks to a [`WalletProvider`]; the raw
//! `request(method, params)` surface lives behind [`Eip1193Transport`].

pub mod eip1193;
pub mod memory;

use async_trait::async_trait;
use fd_types::{Address, NetworkId, TargetNetwork};
use std::rc::Rc;
use thiserror::Error;

pub use eip1193::{Eip1193Transport, Eip1193Wallet};
pub use memory::{InMemoryWallet, REQUEST_PENDING_CODE, WalletCalls};

/// EIP-1193 "user rejected the request".
pub const USER_REJECTED_CODE: i64 = 4001;
/// Returned by `wallet_switchEthereumChain` for a chain the wallet has never seen.
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("no wallet provider is injected")]
    Unavailable,
    #[error("request rejected by the user")]
    UserRejected,
    #[error("target network is not recognized by the wallet")]
    UnrecognizedChain,
    #[error("wallet returned an invalid {field}: {value}")]
    InvalidResponse { field: &'static str, value: String },
    #[error("wallet request failed (code {code}): {message}")]
    Rpc { code: i64, message: String },
    #[error("wallet transport error: {0}")]
    Transport(String),
}

impl WalletError {
    pub fn from_rpc(code: i64, message: impl Into<String>) -> Self {
        match code {
            USER_REJECTED_CODE => Self::UserRejected,
            UNRECOGNIZED_CHAIN_CODE => Self::UnrecognizedChain,
            _ => Self::Rpc {
                code,
                message: message.into(),
            },
        }
    }

    pub(crate) fn invalid(field: &'static str, value: impl ToString) -> Self {
        Self::InvalidResponse {
            field,
            value: value.to_string(),
        }
    }
}

/// Environment-raised change, delivered outside any core-initiated call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<Address>),
    NetworkChanged(NetworkId),
}

pub type EventHandler = Rc<dyn Fn(ProviderEvent)>;

/// Registered event handlers. Dropping the value deregisters them.
#[must_use = "dropping a Subscription removes its handlers"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// For providers that never raise events.
    pub fn detached() -> Self {
        Self { release: None }
    }

    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

#[async_trait(?Send)]
pub trait WalletProvider {
    /// False when nothing is injected; never errors.
    fn is_available(&self) -> bool;
    /// Opens the wallet's permission prompt. Not retried on rejection.
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;
    async fn current_network_id(&self) -> Result<NetworkId, WalletError>;
    async fn request_network_switch(&self, target: NetworkId) -> Result<(), WalletError>;
    async fn request_add_network(&self, network: &TargetNetwork) -> Result<(), WalletError>;
    fn subscribe(&self, handler: EventHandler) -> Subscription;
}
