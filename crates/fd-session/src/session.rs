use fd_contract::{ContractBinder, ContractHandle};
use fd_network::NetworkGuard;
use fd_types::{Address, NetworkStatus, TargetNetwork};
use fd_wallet::{ProviderEvent, Subscription, WalletProvider};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, info, warn};

use crate::{AppConfig, SessionError};

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(tag = "state", content = "network", rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Disconnected,
    Connecting,
    Connected(NetworkStatus),
}

/// What the page has to do after a wallet event was applied to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Ignore,
    Rerender,
    /// Same network, new account: re-read campaigns.
    Refresh,
    /// Everything derived is invalid; rebuild the session from scratch.
    Reload,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub account: Option<Address>,
    pub network: NetworkStatus,
    pub contract_bound: bool,
    pub busy: bool,
}

/// Proof that a user-triggered operation holds the busy flag. Dropping it
/// clears the flag.
#[must_use = "the busy flag is released when the guard is dropped"]
pub struct UserOp {
    busy: Rc<Cell<bool>>,
}

impl Drop for UserOp {
    fn drop(&mut self) {
        self.busy.set(false);
    }
}

/// A contract handle and the epoch it was taken at. Results obtained through
/// the handle are only committed while [`Session::is_current`] holds for
/// that epoch.
pub struct Bound<C> {
    pub handle: ContractHandle<C>,
    pub epoch: u64,
}

/// Marks an establish as running for as long as it lives.
struct Establishing<'a>(&'a Cell<bool>);

impl<'a> Establishing<'a> {
    fn enter(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            return None;
        }
        Some(Self(flag))
    }
}

impl Drop for Establishing<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

struct SessionState<C> {
    phase: Phase,
    account: Option<Address>,
    handle: Option<ContractHandle<C>>,
    /// Bumped on every wallet event that invalidates in-flight work.
    epoch: u64,
    /// Account announced by the wallet while an establish was running.
    announced: Option<Address>,
}

impl<C> SessionState<C> {
    fn reset(&mut self, phase: Phase) {
        self.phase = phase;
        self.account = None;
        self.handle = None;
    }

    fn status(&self) -> NetworkStatus {
        match self.phase {
            Phase::Connected(status) => status,
            _ => NetworkStatus::Unknown,
        }
    }
}

struct Established<C> {
    account: Address,
    status: NetworkStatus,
    handle: Option<ContractHandle<C>>,
}

/// Connection state machine. Owns the account, the contract handle and the
/// busy flag; nothing else writes them.
pub struct Session<W, B: ContractBinder> {
    wallet: Rc<W>,
    binder: B,
    guard: NetworkGuard,
    contract_address: Option<Address>,
    state: RefCell<SessionState<B::Contract>>,
    busy: Rc<Cell<bool>>,
    establishing: Cell<bool>,
    subscription: RefCell<Option<Subscription>>,
}

impl<W, B> Session<W, B>
where
    W: WalletProvider + 'static,
    B: ContractBinder + 'static,
{
    pub fn new(wallet: Rc<W>, binder: B, config: &AppConfig) -> Self {
        Self {
            wallet,
            binder,
            guard: NetworkGuard::new(config.network.clone()),
            contract_address: config.contract_address,
            state: RefCell::new(SessionState {
                phase: Phase::Disconnected,
                account: None,
                handle: None,
                epoch: 0,
                announced: None,
            }),
            busy: Rc::new(Cell::new(false)),
            establishing: Cell::new(false),
            subscription: RefCell::new(None),
        }
    }

    /// Registers for wallet events. Each event is applied to the session and
    /// the resulting [`Reaction`] handed to `on_reaction`. A second call
    /// replaces the first registration.
    pub fn subscribe(self: &Rc<Self>, on_reaction: impl Fn(Reaction) + 'static) {
        let session = Rc::downgrade(self);
        let subscription = self.wallet.subscribe(Rc::new(move |event: ProviderEvent| {
            if let Some(session) = session.upgrade() {
                on_reaction(session.handle_event(event));
            }
        }));
        *self.subscription.borrow_mut() = Some(subscription);
    }

    pub fn unsubscribe(&self) {
        let released = self.subscription.borrow_mut().take();
        drop(released);
    }

    pub fn begin_user_op(&self) -> Result<UserOp, SessionError> {
        if self.busy.replace(true) {
            debug!("rejecting user operation while another is running");
            return Err(SessionError::Busy);
        }
        Ok(UserOp {
            busy: self.busy.clone(),
        })
    }

    /// User-initiated connect. Without a provider this fails before the
    /// session leaves its current phase.
    pub async fn connect(&self, _op: &UserOp) -> Result<NetworkStatus, SessionError> {
        if !self.wallet.is_available() {
            warn!("connect requested but no wallet provider is injected");
            return Err(SessionError::NoWalletProvider);
        }
        let Some(_running) = Establishing::enter(&self.establishing) else {
            debug!("connect requested while the session is being rebuilt");
            return Err(SessionError::Busy);
        };
        self.establish().await
    }

    /// Resets and rebuilds the session after an environment change. Does not
    /// take the busy flag. While a connect or another rebuild is running this
    /// returns [`SessionError::StaleRead`]; the running one absorbs the change.
    pub async fn reload(&self) -> Result<NetworkStatus, SessionError> {
        if !self.wallet.is_available() {
            self.state.borrow_mut().reset(Phase::Disconnected);
            return Err(SessionError::NoWalletProvider);
        }
        let Some(_running) = Establishing::enter(&self.establishing) else {
            debug!("rebuild already in flight");
            return Err(SessionError::StaleRead);
        };
        self.establish().await
    }

    /// Wallet events that land while this runs make it negotiate again
    /// instead of spawning a second, concurrent negotiation. Accounts the
    /// wallet already granted are reused, so the user is prompted once.
    async fn establish(&self) -> Result<NetworkStatus, SessionError> {
        let mut granted = None;
        self.state.borrow_mut().announced = None;

        let (outcome, mut state) = loop {
            let epoch = {
                let mut state = self.state.borrow_mut();
                state.reset(Phase::Connecting);
                state.epoch
            };
            info!("connecting to {}", self.guard.target().display_name);

            let outcome = self.negotiate(granted).await;

            let mut state = self.state.borrow_mut();
            if state.epoch == epoch {
                break (outcome, state);
            }
            if state.phase != Phase::Connecting {
                info!("wallet released its accounts during connect");
                return Err(SessionError::NotConnected);
            }
            if matches!(outcome, Err(SessionError::UserRejected)) {
                break (outcome, state);
            }
            granted = state
                .announced
                .take()
                .or_else(|| outcome.as_ref().ok().map(|established| established.account))
                .or(granted);
            info!("wallet changed during connect, negotiating again");
        };

        match outcome {
            Ok(established) => {
                state.phase = Phase::Connected(established.status);
                state.account = Some(established.account);
                state.handle = established.handle;
                if established.status == NetworkStatus::Correct {
                    info!("connected {} on {}", established.account, self.guard.target().display_name);
                    Ok(NetworkStatus::Correct)
                } else {
                    warn!("connected {} on the wrong network", established.account);
                    Err(SessionError::NetworkMismatch)
                }
            }
            Err(err) => {
                warn!("connect failed: {err}");
                state.reset(Phase::Disconnected);
                Err(err)
            }
        }
    }

    /// Network check, conditional switch, account request, then binding.
    /// A `granted` account skips the account request.
    async fn negotiate(
        &self,
        granted: Option<Address>,
    ) -> Result<Established<B::Contract>, SessionError> {
        let status = self.guard.ensure_correct_network(self.wallet.as_ref()).await?;

        let account = match granted {
            Some(account) => account,
            None => {
                let accounts = self.wallet.request_accounts().await?;
                accounts.first().copied().ok_or(SessionError::UserRejected)?
            }
        };

        let handle = if status == NetworkStatus::Correct {
            Some(self.bind(account)?)
        } else {
            None
        };

        Ok(Established {
            account,
            status,
            handle,
        })
    }

    fn bind(&self, account: Address) -> Result<ContractHandle<B::Contract>, SessionError> {
        let target = self.guard.target().id;
        Ok(fd_contract::bind(
            &self.binder,
            self.contract_address,
            account,
            target,
            NetworkStatus::Correct,
        )?)
    }

    /// Applies a wallet event. Anything that changes the session bumps the
    /// epoch, which turns every in-flight result stale. While an establish is
    /// running, changes are left to it and the page only re-renders.
    pub fn handle_event(&self, event: ProviderEvent) -> Reaction {
        let establishing = self.establishing.get();
        let mut state = self.state.borrow_mut();
        if state.phase == Phase::Disconnected {
            debug!("ignoring {event:?} while disconnected");
            return Reaction::Ignore;
        }

        match event {
            ProviderEvent::NetworkChanged(network) => {
                state.epoch += 1;
                state.reset(Phase::Connecting);
                if establishing {
                    info!("wallet moved to network {network} during connect");
                    return Reaction::Rerender;
                }
                info!("wallet moved to network {network}, reloading");
                Reaction::Reload
            }
            ProviderEvent::AccountsChanged(accounts) => {
                let next = accounts.first().copied();
                if next.is_some() && next == state.account {
                    return Reaction::Ignore;
                }
                state.epoch += 1;

                match (state.phase, next) {
                    (_, None) => {
                        info!("wallet released all accounts");
                        state.reset(Phase::Disconnected);
                        Reaction::Rerender
                    }
                    (Phase::Connected(status), Some(account)) => {
                        info!("active account is now {account}");
                        state.account = Some(account);
                        if status != NetworkStatus::Correct {
                            return Reaction::Rerender;
                        }
                        match self.bind(account) {
                            Ok(handle) => {
                                state.handle = Some(handle);
                                Reaction::Refresh
                            }
                            Err(err) => {
                                warn!("could not rebind contract for {account}: {err}");
                                state.handle = None;
                                Reaction::Rerender
                            }
                        }
                    }
                    (_, Some(account)) if establishing => {
                        state.announced = Some(account);
                        Reaction::Rerender
                    }
                    (_, Some(_)) => Reaction::Reload,
                }
            }
        }
    }

    /// The current handle, if the session may use it.
    pub fn bound(&self) -> Result<Bound<B::Contract>, SessionError> {
        let state = self.state.borrow();
        match (state.phase, &state.handle) {
            (Phase::Connected(NetworkStatus::Correct), Some(handle)) => Ok(Bound {
                handle: handle.clone(),
                epoch: state.epoch,
            }),
            (Phase::Connected(NetworkStatus::Incorrect), _) => Err(SessionError::NetworkMismatch),
            _ => Err(SessionError::NotConnected),
        }
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.state.borrow().epoch == epoch
    }

    pub fn phase(&self) -> Phase {
        self.state.borrow().phase
    }

    pub fn account(&self) -> Option<Address> {
        self.state.borrow().account
    }

    pub fn network_status(&self) -> NetworkStatus {
        self.state.borrow().status()
    }

    pub fn target(&self) -> &TargetNetwork {
        self.guard.target()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.borrow();
        SessionSnapshot {
            phase: state.phase,
            account: state.account,
            network: state.status(),
            contract_bound: state.handle.is_some(),
            busy: self.busy.get(),
        }
    }
}
