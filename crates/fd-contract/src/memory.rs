use async_trait::async_trait;
use fd_types::{Address, Campaign, TxHash, TxPhase, U256};
use fd_wallet::WalletError;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tokio::sync::Notify;

use crate::{CampaignContract, ContractBinder, ContractCall, GatewayError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerCalls {
    pub count_reads: usize,
    pub record_reads: usize,
    pub submissions: usize,
}

#[derive(Default)]
struct LedgerState {
    campaigns: Vec<Campaign>,
    receipts: HashMap<TxHash, TxPhase>,
    next_tx: u64,
    calls: LedgerCalls,
    read_hook: Option<Box<dyn FnOnce()>>,
    fail_reads: bool,
    gate: Option<Rc<Notify>>,
}

/// In-memory stand-in for the deployed contract, applying the same rules:
/// funding needs an open campaign, withdrawal needs the owner and a reached
/// goal. Rejected calls still produce a transaction, which confirms as
/// `Reverted`.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    state: Rc<RefCell<LedgerState>>,
}

impl InMemoryLedger {
    pub fn seed(
        &self,
        owner: Address,
        title: &str,
        description: &str,
        goal: U256,
        funds_raised: U256,
        completed: bool,
    ) -> u64 {
        let mut state = self.state.borrow_mut();
        let id = state.campaigns.len() as u64 + 1;
        state.campaigns.push(Campaign {
            id,
            owner,
            title: title.to_owned(),
            description: description.to_owned(),
            goal,
            funds_raised,
            completed,
        });
        id
    }

    /// Runs `hook` inside the next per-record read, while that read is in flight.
    pub fn on_next_read(&self, hook: impl FnOnce() + 'static) {
        self.state.borrow_mut().read_hook = Some(Box::new(hook));
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.borrow_mut().fail_reads = fail;
    }

    /// From now on confirmations wait for a permit on the returned `Notify`.
    pub fn gate_confirmations(&self) -> Rc<Notify> {
        let gate = Rc::new(Notify::new());
        self.state.borrow_mut().gate = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> LedgerCalls {
        self.state.borrow().calls
    }

    pub fn campaigns(&self) -> Vec<Campaign> {
        self.state.borrow().campaigns.clone()
    }
}

impl ContractBinder for InMemoryLedger {
    type Contract = LedgerContract;

    fn bind(&self, _address: Address, account: Address) -> LedgerContract {
        LedgerContract {
            state: self.state.clone(),
            account,
        }
    }
}

pub struct LedgerContract {
    state: Rc<RefCell<LedgerState>>,
    account: Address,
}

impl LedgerContract {
    fn ensure_readable(&self) -> Result<(), GatewayError> {
        if self.state.borrow().fail_reads {
            return Err(WalletError::Transport("ledger unavailable".to_owned()).into());
        }
        Ok(())
    }

    fn apply(&self, state: &mut LedgerState, call: &ContractCall) -> TxPhase {
        match call {
            ContractCall::CreateCampaign {
                title,
                description,
                goal,
            } => {
                let id = state.campaigns.len() as u64 + 1;
                state.campaigns.push(Campaign {
                    id,
                    owner: self.account,
                    title: title.clone(),
                    description: description.clone(),
                    goal: *goal,
                    funds_raised: U256::ZERO,
                    completed: false,
                });
                TxPhase::Confirmed
            }
            ContractCall::FundCampaign { id, amount } => match record_mut(state, *id) {
                Some(campaign) if !campaign.completed => {
                    campaign.funds_raised += *amount;
                    TxPhase::Confirmed
                }
                _ => TxPhase::Reverted,
            },
            ContractCall::WithdrawFunds { id } => match record_mut(state, *id) {
                Some(campaign)
                    if campaign.owner == self.account
                        && !campaign.completed
                        && campaign.funds_raised >= campaign.goal =>
                {
                    campaign.completed = true;
                    TxPhase::Confirmed
                }
                _ => TxPhase::Reverted,
            },
        }
    }
}

fn record_mut(state: &mut LedgerState, id: u64) -> Option<&mut Campaign> {
    state.campaigns.iter_mut().find(|campaign| campaign.id == id)
}

#[async_trait(?Send)]
impl CampaignContract for LedgerContract {
    async fn campaign_count(&self) -> Result<u64, GatewayError> {
        self.ensure_readable()?;
        let mut state = self.state.borrow_mut();
        state.calls.count_reads += 1;
        Ok(state.campaigns.len() as u64)
    }

    async fn campaign(&self, id: u64) -> Result<Campaign, GatewayError> {
        let hook = self.state.borrow_mut().read_hook.take();
        if let Some(hook) = hook {
            hook();
        }
        self.ensure_readable()?;

        let mut state = self.state.borrow_mut();
        state.calls.record_reads += 1;
        state
            .campaigns
            .iter()
            .find(|campaign| campaign.id == id)
            .cloned()
            .ok_or_else(|| GatewayError::Decode(format!("campaign {id}")))
    }

    async fn submit(&self, call: &ContractCall) -> Result<TxHash, GatewayError> {
        let mut state = self.state.borrow_mut();
        state.calls.submissions += 1;
        state.next_tx += 1;
        let tx_hash = TxHash::from(U256::from(state.next_tx).to_be_bytes::<32>());
        let phase = self.apply(&mut state, call);
        state.receipts.insert(tx_hash, phase);
        Ok(tx_hash)
    }

    async fn confirmation(&self, tx_hash: TxHash) -> Result<TxPhase, GatewayError> {
        let gate = self.state.borrow().gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.state
            .borrow()
            .receipts
            .get(&tx_hash)
            .copied()
            .ok_or_else(|| GatewayError::Decode(format!("receipt for {tx_hash}")))
    }
}
