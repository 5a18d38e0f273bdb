use fd_contract::GatewayError;
use fd_types::{Alert, TargetNetwork, TxHash};
use fd_wallet::WalletError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no wallet provider is available")]
    NoWalletProvider,
    #[error("request rejected in the wallet")]
    UserRejected,
    #[error("wallet is not on the target network")]
    NetworkMismatch,
    #[error("contract address is not configured")]
    NotConfigured,
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("transaction {0} was reverted")]
    TransactionReverted(TxHash),
    #[error("result discarded: wallet state changed while it was in flight")]
    StaleRead,
    #[error("another action is still in progress")]
    Busy,
    #[error("wallet is not connected")]
    NotConnected,
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error(transparent)]
    Provider(WalletError),
    #[error(transparent)]
    Gateway(GatewayError),
}

impl From<WalletError> for SessionError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Unavailable => Self::NoWalletProvider,
            WalletError::UserRejected => Self::UserRejected,
            other => Self::Provider(other),
        }
    }
}

impl From<GatewayError> for SessionError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotConfigured => Self::NotConfigured,
            GatewayError::WrongNetwork => Self::NetworkMismatch,
            GatewayError::InvalidAmount(reason) => Self::InvalidAmount(reason),
            GatewayError::Reverted(tx_hash) => Self::TransactionReverted(tx_hash),
            GatewayError::Wallet(err) => err.into(),
            other => Self::Gateway(other),
        }
    }
}

impl SessionError {
    /// The single alert shown for this error. Interruptions are informational;
    /// everything else is an error.
    pub fn alert(&self, network: &TargetNetwork) -> Alert {
        let name = &network.short_name;
        match self {
            Self::NoWalletProvider => Alert::error("Error", "Please install MetaMask!"),
            Self::UserRejected => Alert::error("Error", "The request was rejected in your wallet."),
            Self::NetworkMismatch => Alert::error(
                "Error",
                format!("Failed to switch to {name} network. Please switch manually in MetaMask."),
            ),
            Self::NotConfigured => Alert::error(
                "Error",
                "Contract address is not defined. Please set FUNDER_CONTRACT_ADDRESS.",
            ),
            Self::InvalidAmount(reason) => {
                Alert::error("Error", format!("Please enter a valid amount ({reason})."))
            }
            Self::TransactionReverted(tx_hash) => {
                Alert::error("Error", format!("Transaction {tx_hash} was reverted."))
            }
            Self::StaleRead => Alert::info(
                "Wallet changed",
                "Your wallet changed while loading. Reloading campaigns.",
            ),
            Self::Busy => Alert::info("Please wait", "Another action is still in progress."),
            Self::NotConnected => {
                Alert::error("Error", format!("Please connect to the {name} network first."))
            }
            Self::MissingField(field) => Alert::error("Error", format!("Please enter a {field}.")),
            Self::Provider(err) => Alert::error("Error", err.to_string()),
            Self::Gateway(err) => Alert::error("Error", err.to_string()),
        }
    }
}
