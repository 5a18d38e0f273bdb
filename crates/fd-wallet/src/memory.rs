use async_trait::async_trait;
use fd_types::{Address, NetworkId, TargetNetwork};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tokio::sync::Notify;

use crate::{EventHandler, ProviderEvent, Subscription, WalletError, WalletProvider};

/// Counts of the calls a wallet has served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalletCalls {
    pub request_accounts: usize,
    pub network_queries: usize,
    pub switch_requests: usize,
    pub add_requests: usize,
}

/// What MetaMask answers while an account prompt is already open.
pub const REQUEST_PENDING_CODE: i64 = -32002;

struct WalletState {
    installed: bool,
    accounts: Vec<Address>,
    network: NetworkId,
    known_networks: Vec<NetworkId>,
    reject_accounts: bool,
    reject_switch: bool,
    reject_add: bool,
    emit_on_switch: bool,
    prompt_gate: Option<Rc<Notify>>,
    prompt_open: bool,
    calls: WalletCalls,
}

type HandlerList = Rc<RefCell<Vec<(u64, EventHandler)>>>;

/// Scriptable wallet held entirely in memory.
pub struct InMemoryWallet {
    state: RefCell<WalletState>,
    handlers: HandlerList,
    next_handler: Cell<u64>,
}

impl InMemoryWallet {
    pub fn new(network: NetworkId, accounts: Vec<Address>) -> Self {
        Self {
            state: RefCell::new(WalletState {
                installed: true,
                accounts,
                network,
                known_networks: vec![network],
                reject_accounts: false,
                reject_switch: false,
                reject_add: false,
                emit_on_switch: false,
                prompt_gate: None,
                prompt_open: false,
                calls: WalletCalls::default(),
            }),
            handlers: Rc::new(RefCell::new(Vec::new())),
            next_handler: Cell::new(0),
        }
    }

    /// A browser with no wallet extension.
    pub fn not_installed() -> Self {
        let wallet = Self::new(NetworkId(0), Vec::new());
        wallet.state.borrow_mut().installed = false;
        wallet
    }

    pub fn know_network(&self, id: NetworkId) {
        let mut state = self.state.borrow_mut();
        if !state.known_networks.contains(&id) {
            state.known_networks.push(id);
        }
    }

    pub fn reject_accounts(&self, reject: bool) {
        self.state.borrow_mut().reject_accounts = reject;
    }

    pub fn reject_switch(&self, reject: bool) {
        self.state.borrow_mut().reject_switch = reject;
    }

    pub fn reject_add(&self, reject: bool) {
        self.state.borrow_mut().reject_add = reject;
    }

    /// Raise `NetworkChanged` after a successful switch, like real wallets do.
    pub fn emit_on_switch(&self, emit: bool) {
        self.state.borrow_mut().emit_on_switch = emit;
    }

    /// From now on the account prompt stays open until a permit is stored on
    /// the returned `Notify`. A second request while it is open fails with
    /// [`REQUEST_PENDING_CODE`].
    pub fn gate_account_prompt(&self) -> Rc<Notify> {
        let gate = Rc::new(Notify::new());
        self.state.borrow_mut().prompt_gate = Some(gate.clone());
        gate
    }

    pub fn prompt_open(&self) -> bool {
        self.state.borrow().prompt_open
    }

    pub fn calls(&self) -> WalletCalls {
        self.state.borrow().calls
    }

    pub fn network(&self) -> NetworkId {
        self.state.borrow().network
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.borrow().len()
    }

    /// User picked another network in the wallet UI.
    pub fn set_network(&self, id: NetworkId) {
        self.know_network(id);
        self.state.borrow_mut().network = id;
        self.emit(ProviderEvent::NetworkChanged(id));
    }

    /// User switched or disconnected accounts in the wallet UI.
    pub fn set_accounts(&self, accounts: Vec<Address>) {
        self.state.borrow_mut().accounts = accounts.clone();
        self.emit(ProviderEvent::AccountsChanged(accounts));
    }

    pub fn emit(&self, event: ProviderEvent) {
        // Handlers may call back into the wallet, so no borrow is held while they run.
        let handlers: Vec<EventHandler> = self
            .handlers
            .borrow()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in handlers {
            handler(event.clone());
        }
    }
}

#[async_trait(?Send)]
impl WalletProvider for InMemoryWallet {
    fn is_available(&self) -> bool {
        self.state.borrow().installed
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let gate = {
            let mut state = self.state.borrow_mut();
            if !state.installed {
                return Err(WalletError::Unavailable);
            }
            state.calls.request_accounts += 1;
            if state.prompt_open {
                return Err(WalletError::from_rpc(
                    REQUEST_PENDING_CODE,
                    "Request of type 'wallet_requestPermissions' already pending",
                ));
            }
            state.prompt_gate.clone()
        };
        if let Some(gate) = gate {
            self.state.borrow_mut().prompt_open = true;
            gate.notified().await;
            self.state.borrow_mut().prompt_open = false;
        }

        let state = self.state.borrow();
        if state.reject_accounts {
            return Err(WalletError::UserRejected);
        }
        Ok(state.accounts.clone())
    }

    async fn current_network_id(&self) -> Result<NetworkId, WalletError> {
        let mut state = self.state.borrow_mut();
        if !state.installed {
            return Err(WalletError::Unavailable);
        }
        state.calls.network_queries += 1;
        Ok(state.network)
    }

    async fn request_network_switch(&self, target: NetworkId) -> Result<(), WalletError> {
        let switched = {
            let mut state = self.state.borrow_mut();
            if !state.installed {
                return Err(WalletError::Unavailable);
            }
            state.calls.switch_requests += 1;
            if state.reject_switch {
                return Err(WalletError::UserRejected);
            }
            if !state.known_networks.contains(&target) {
                return Err(WalletError::UnrecognizedChain);
            }
            let changed = state.network != target;
            state.network = target;
            changed && state.emit_on_switch
        };
        if switched {
            self.emit(ProviderEvent::NetworkChanged(target));
        }
        Ok(())
    }

    async fn request_add_network(&self, network: &TargetNetwork) -> Result<(), WalletError> {
        let mut state = self.state.borrow_mut();
        if !state.installed {
            return Err(WalletError::Unavailable);
        }
        state.calls.add_requests += 1;
        if state.reject_add {
            return Err(WalletError::UserRejected);
        }
        if !state.known_networks.contains(&network.id) {
            state.known_networks.push(network.id);
        }
        Ok(())
    }

    fn subscribe(&self, handler: EventHandler) -> Subscription {
        let id = self.next_handler.get();
        self.next_handler.set(id + 1);
        self.handlers.borrow_mut().push((id, handler));

        let handlers = Rc::downgrade(&self.handlers);
        Subscription::new(move || {
            if let Some(handlers) = handlers.upgrade() {
                handlers.borrow_mut().retain(|(existing, _)| *existing != id);
            }
        })
    }
}
