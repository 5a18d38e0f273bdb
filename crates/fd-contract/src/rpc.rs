use alloy_primitives::hex;
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use fd_types::{Address, Campaign, TxHash, TxPhase, U256};
use fd_wallet::Eip1193Transport;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;

use crate::{CampaignContract, ContractBinder, ContractCall, GatewayError, abi};

/// How long to keep asking for a receipt before giving up on a transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 2_000,
            max_attempts: 150,
        }
    }
}

pub struct RpcBinder<T> {
    transport: Rc<T>,
    poll: PollPolicy,
}

impl<T> RpcBinder<T> {
    pub fn new(transport: Rc<T>, poll: PollPolicy) -> Self {
        Self { transport, poll }
    }
}

impl<T: Eip1193Transport> ContractBinder for RpcBinder<T> {
    type Contract = RpcCampaignContract<T>;

    fn bind(&self, address: Address, account: Address) -> RpcCampaignContract<T> {
        RpcCampaignContract {
            transport: self.transport.clone(),
            address,
            from: account,
            poll: self.poll,
        }
    }
}

/// Contract client speaking JSON-RPC through the wallet's own transport, so
/// transactions are signed by the wallet.
pub struct RpcCampaignContract<T> {
    transport: Rc<T>,
    address: Address,
    from: Address,
    poll: PollPolicy,
}

impl<T: Eip1193Transport> RpcCampaignContract<T> {
    async fn read<C: SolCall>(&self, call: &C) -> Result<C::Return, GatewayError> {
        let raw = self
            .transport
            .request(
                "eth_call",
                json!([
                    { "to": self.address.to_string(), "data": hex::encode_prefixed(call.abi_encode()) },
                    "latest"
                ]),
            )
            .await?;

        let bytes = raw
            .as_str()
            .and_then(|text| hex::decode(text).ok())
            .ok_or_else(|| GatewayError::Decode(format!("{} result {raw}", C::SIGNATURE)))?;

        C::abi_decode_returns(&bytes)
            .map_err(|err| GatewayError::Decode(format!("{}: {err}", C::SIGNATURE)))
    }
}

#[async_trait(?Send)]
impl<T: Eip1193Transport> CampaignContract for RpcCampaignContract<T> {
    async fn campaign_count(&self) -> Result<u64, GatewayError> {
        let count = self.read(&abi::campaignCountCall {}).await?;
        u64::try_from(count).map_err(|_| GatewayError::Decode(format!("campaign count {count}")))
    }

    async fn campaign(&self, id: u64) -> Result<Campaign, GatewayError> {
        let record = self
            .read(&abi::campaignsCall { id: U256::from(id) })
            .await?;

        Ok(Campaign {
            id,
            owner: record.owner,
            title: record.title,
            description: record.description,
            goal: record.goal,
            funds_raised: record.fundsRaised,
            completed: record.completed,
        })
    }

    async fn submit(&self, call: &ContractCall) -> Result<TxHash, GatewayError> {
        let raw = self
            .transport
            .request(
                "eth_sendTransaction",
                json!([{
                    "from": self.from.to_string(),
                    "to": self.address.to_string(),
                    "data": hex::encode_prefixed(encode_call(call)),
                    "value": format!("{:#x}", call.value()),
                }]),
            )
            .await?;

        raw.as_str()
            .and_then(|text| text.parse::<TxHash>().ok())
            .ok_or_else(|| GatewayError::Decode(format!("transaction hash {raw}")))
    }

    async fn confirmation(&self, tx_hash: TxHash) -> Result<TxPhase, GatewayError> {
        let interval = Duration::from_millis(self.poll.interval_ms);
        for attempt in 0..self.poll.max_attempts {
            let receipt = self
                .transport
                .request("eth_getTransactionReceipt", json!([tx_hash.to_string()]))
                .await?;

            if !receipt.is_null() {
                return receipt_phase(&receipt);
            }
            debug!("no receipt yet for {} (attempt {})", tx_hash, attempt + 1);
            self.transport.sleep(interval).await;
        }

        Err(GatewayError::ConfirmationTimeout(tx_hash))
    }
}

fn encode_call(call: &ContractCall) -> Vec<u8> {
    match call {
        ContractCall::CreateCampaign {
            title,
            description,
            goal,
        } => abi::createCampaignCall {
            title: title.clone(),
            description: description.clone(),
            goal: *goal,
        }
        .abi_encode(),
        ContractCall::FundCampaign { id, .. } => abi::fundCampaignCall { id: U256::from(*id) }.abi_encode(),
        ContractCall::WithdrawFunds { id } => abi::withdrawFundsCall { id: U256::from(*id) }.abi_encode(),
    }
}

fn receipt_phase(receipt: &Value) -> Result<TxPhase, GatewayError> {
    match receipt.get("status").and_then(Value::as_str) {
        Some("0x1") => Ok(TxPhase::Confirmed),
        Some("0x0") => Ok(TxPhase::Reverted),
        _ => Err(GatewayError::Decode(format!("receipt status in {receipt}"))),
    }
}
