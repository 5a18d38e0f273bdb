//! Reads and writes against the crowdfunding contract.
//!
//! The [`CampaignContract`] seam is what a bound handle talks to; the free
//! functions here implement the gateway operations on top of it, independent
//! of how the connection above was established.

pub mod abi;
pub mod memory;
pub mod rpc;

use alloy_primitives::utils::parse_ether;
use async_trait::async_trait;
use fd_types::{
    Address, Campaign, CampaignList, NetworkId, NetworkStatus, TransactionResult, TxHash, TxPhase,
    U256,
};
use fd_wallet::WalletError;
use std::rc::Rc;
use thiserror::Error;
use tracing::{info, warn};

pub use memory::{InMemoryLedger, LedgerCalls};
pub use rpc::{PollPolicy, RpcBinder, RpcCampaignContract};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("contract address is not configured")]
    NotConfigured,
    #[error("contract can only be bound on the target network")]
    WrongNetwork,
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("transaction {0} was reverted")]
    Reverted(TxHash),
    #[error("transaction {0} was not confirmed in time")]
    ConfirmationTimeout(TxHash),
    #[error("could not decode {0}")]
    Decode(String),
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

/// A state-changing call. The attached value is only non-zero for funding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    CreateCampaign {
        title: String,
        description: String,
        goal: U256,
    },
    FundCampaign {
        id: u64,
        amount: U256,
    },
    WithdrawFunds {
        id: u64,
    },
}

impl ContractCall {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateCampaign { .. } => "createCampaign",
            Self::FundCampaign { .. } => "fundCampaign",
            Self::WithdrawFunds { .. } => "withdrawFunds",
        }
    }

    pub fn value(&self) -> U256 {
        match self {
            Self::FundCampaign { amount, .. } => *amount,
            _ => U256::ZERO,
        }
    }
}

#[async_trait(?Send)]
pub trait CampaignContract {
    async fn campaign_count(&self) -> Result<u64, GatewayError>;
    /// Record by 1-based id.
    async fn campaign(&self, id: u64) -> Result<Campaign, GatewayError>;
    /// Broadcasts the call and returns once it is pending.
    async fn submit(&self, call: &ContractCall) -> Result<TxHash, GatewayError>;
    /// Waits for the transaction to leave the pending state; returns
    /// `Confirmed` or `Reverted`.
    async fn confirmation(&self, tx_hash: TxHash) -> Result<TxPhase, GatewayError>;
}

/// Produces contract clients signed by a given account.
pub trait ContractBinder {
    type Contract: CampaignContract;

    fn bind(&self, address: Address, account: Address) -> Self::Contract;
}

/// Contract client bound to one account on one network.
pub struct ContractHandle<C> {
    address: Address,
    account: Address,
    network: NetworkId,
    contract: Rc<C>,
}

impl<C> Clone for ContractHandle<C> {
    fn clone(&self) -> Self {
        Self {
            address: self.address,
            account: self.account,
            network: self.network,
            contract: self.contract.clone(),
        }
    }
}

impl<C> std::fmt::Debug for ContractHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractHandle")
            .field("address", &self.address)
            .field("account", &self.account)
            .field("network", &self.network)
            .finish()
    }
}

impl<C> ContractHandle<C> {
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn network(&self) -> NetworkId {
        self.network
    }

    pub fn contract(&self) -> &C {
        &self.contract
    }
}

pub fn bind<B: ContractBinder>(
    binder: &B,
    address: Option<Address>,
    account: Address,
    network: NetworkId,
    status: NetworkStatus,
) -> Result<ContractHandle<B::Contract>, GatewayError> {
    let Some(address) = address else {
        return Err(GatewayError::NotConfigured);
    };
    if status != NetworkStatus::Correct {
        return Err(GatewayError::WrongNetwork);
    }

    Ok(ContractHandle {
        address,
        account,
        network,
        contract: Rc::new(binder.bind(address, account)),
    })
}

/// Reads the count once, then every record from 1 to that count, and
/// returns them newest first. Records created after the count read are not
/// picked up until the next call.
pub async fn list_campaigns<C: CampaignContract>(
    handle: &ContractHandle<C>,
) -> Result<CampaignList, GatewayError> {
    let count = handle.contract.campaign_count().await?;
    let mut campaigns = Vec::with_capacity(count.min(1024) as usize);
    for id in 1..=count {
        campaigns.push(handle.contract.campaign(id).await?);
    }
    campaigns.reverse();
    Ok(campaigns)
}

pub async fn create_campaign<C: CampaignContract>(
    handle: &ContractHandle<C>,
    title: &str,
    description: &str,
    goal: U256,
    on_submitted: impl FnOnce(&TransactionResult),
) -> Result<TransactionResult, GatewayError> {
    execute(
        handle,
        ContractCall::CreateCampaign {
            title: title.to_owned(),
            description: description.to_owned(),
            goal,
        },
        on_submitted,
    )
    .await
}

/// `amount` is the user's decimal ether input; it is validated before
/// anything is sent to the wallet.
pub async fn fund_campaign<C: CampaignContract>(
    handle: &ContractHandle<C>,
    id: u64,
    amount: &str,
    on_submitted: impl FnOnce(&TransactionResult),
) -> Result<TransactionResult, GatewayError> {
    let amount = parse_amount(amount)?;
    execute(handle, ContractCall::FundCampaign { id, amount }, on_submitted).await
}

pub async fn withdraw_funds<C: CampaignContract>(
    handle: &ContractHandle<C>,
    id: u64,
    on_submitted: impl FnOnce(&TransactionResult),
) -> Result<TransactionResult, GatewayError> {
    execute(handle, ContractCall::WithdrawFunds { id }, on_submitted).await
}

/// Submits, hands the pending transaction to `on_submitted`, then waits for
/// the receipt.
async fn execute<C: CampaignContract>(
    handle: &ContractHandle<C>,
    call: ContractCall,
    on_submitted: impl FnOnce(&TransactionResult),
) -> Result<TransactionResult, GatewayError> {
    let tx_hash = handle.contract.submit(&call).await?;
    info!("{} submitted by {}: {}", call.name(), handle.account, tx_hash);
    on_submitted(&TransactionResult {
        tx_hash,
        phase: TxPhase::Submitted,
    });

    match handle.contract.confirmation(tx_hash).await? {
        TxPhase::Reverted => {
            warn!("{} reverted: {}", call.name(), tx_hash);
            Err(GatewayError::Reverted(tx_hash))
        }
        phase => {
            info!("{} confirmed: {}", call.name(), tx_hash);
            Ok(TransactionResult { tx_hash, phase })
        }
    }
}

/// Converts a decimal ether string into wei. Blank, negative, zero and
/// unparsable inputs are rejected.
pub fn parse_amount(input: &str) -> Result<U256, GatewayError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::InvalidAmount("amount is required".to_owned()));
    }
    if trimmed.starts_with('-') {
        return Err(GatewayError::InvalidAmount(format!("{trimmed} is negative")));
    }

    let wei = parse_ether(trimmed)
        .map_err(|err| GatewayError::InvalidAmount(format!("{trimmed}: {err}")))?;
    if wei.is_zero() {
        return Err(GatewayError::InvalidAmount("amount must be greater than zero".to_owned()));
    }
    Ok(wei)
}
