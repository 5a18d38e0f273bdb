use fd_contract::{
    ContractBinder, GatewayError, create_campaign, fund_campaign, list_campaigns, parse_amount, withdraw_funds,
};
use fd_projection::{CampaignView, network_label, project_all, project_owned};
use fd_types::{Alert, CampaignList, NetworkStatus, TransactionResult};
use fd_wallet::WalletProvider;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, warn};

use crate::{Phase, Reaction, Session, SessionError, SessionSnapshot, UserOp};

/// Everything the page renders, in one serializable value.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BoardSnapshot {
    pub session: SessionSnapshot,
    pub network_label: String,
    pub campaigns: Vec<CampaignView>,
    /// Submitted and waiting for its receipt.
    pub pending_transaction: Option<TransactionResult>,
    pub alert: Alert,
}

/// Page-level controller: owns the campaign list and the alert, and drives
/// the session for every user action.
pub struct Board<W, B: ContractBinder> {
    session: Rc<Session<W, B>>,
    campaigns: RefCell<CampaignList>,
    pending: RefCell<Option<TransactionResult>>,
    alert: RefCell<Alert>,
    on_change: RefCell<Option<Rc<dyn Fn()>>>,
}

impl<W, B> Board<W, B>
where
    W: WalletProvider + 'static,
    B: ContractBinder + 'static,
{
    pub fn new(session: Session<W, B>) -> Self {
        Self {
            session: Rc::new(session),
            campaigns: RefCell::new(Vec::new()),
            pending: RefCell::new(None),
            alert: RefCell::new(Alert::default()),
            on_change: RefCell::new(None),
        }
    }

    pub fn session(&self) -> &Session<W, B> {
        &self.session
    }

    /// See [`Session::subscribe`]. The listener decides when to run
    /// [`Board::react`].
    pub fn subscribe(&self, listener: impl Fn(Reaction) + 'static) {
        Session::subscribe(&self.session, listener);
    }

    /// Called whenever the board changes while an action is still running:
    /// when it takes the busy flag and when its transaction is submitted.
    pub fn on_change(&self, listener: impl Fn() + 'static) {
        *self.on_change.borrow_mut() = Some(Rc::new(listener));
    }

    pub fn campaigns(&self) -> CampaignList {
        self.campaigns.borrow().clone()
    }

    pub fn alert(&self) -> Alert {
        self.alert.borrow().clone()
    }

    pub fn dismiss_alert(&self) {
        self.alert.borrow_mut().dismiss();
    }

    pub fn views(&self) -> Vec<CampaignView> {
        project_all(&self.campaigns.borrow(), self.session.account().as_ref())
    }

    /// Cards for the campaigns the connected account owns.
    pub fn own_views(&self) -> Vec<CampaignView> {
        match self.session.account() {
            Some(account) => project_owned(&self.campaigns.borrow(), &account),
            None => Vec::new(),
        }
    }

    pub fn pending_transaction(&self) -> Option<TransactionResult> {
        self.pending.borrow().clone()
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        let session = self.session.snapshot();
        BoardSnapshot {
            network_label: network_label(session.network, self.session.target()),
            campaigns: self.views(),
            pending_transaction: self.pending_transaction(),
            alert: self.alert(),
            session,
        }
    }

    pub async fn connect(&self) -> Result<NetworkStatus, SessionError> {
        let result = self.run_connect().await;
        self.settle(result)
    }

    pub async fn refresh(&self) -> Result<(), SessionError> {
        let result = self.run_refresh().await;
        self.settle(result)
    }

    pub async fn create(
        &self,
        title: &str,
        description: &str,
        goal: &str,
    ) -> Result<TransactionResult, SessionError> {
        let result = self.run_create(title, description, goal).await;
        self.settle(result)
    }

    pub async fn fund(&self, id: u64, amount: &str) -> Result<TransactionResult, SessionError> {
        let result = self.run_fund(id, amount).await;
        self.settle(result)
    }

    pub async fn withdraw(&self, id: u64) -> Result<TransactionResult, SessionError> {
        let result = self.run_withdraw(id).await;
        self.settle(result)
    }

    /// Follow-up for a wallet event that the session has already applied.
    pub async fn react(&self, reaction: Reaction) {
        match reaction {
            Reaction::Ignore => {}
            Reaction::Rerender => {
                if self.session.phase() == Phase::Disconnected {
                    self.campaigns.borrow_mut().clear();
                }
            }
            Reaction::Refresh => {
                if let Err(err) = self.load().await {
                    self.report_background(err);
                }
            }
            Reaction::Reload => self.reload().await,
        }
    }

    /// Drops every derived value and rebuilds the session.
    pub async fn reload(&self) {
        self.campaigns.borrow_mut().clear();
        let result = match self.session.reload().await {
            Ok(_) => self.load().await,
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            self.report_background(err);
        }
    }

    async fn run_connect(&self) -> Result<NetworkStatus, SessionError> {
        let op = self.begin()?;
        let status = match self.session.connect(&op).await {
            Ok(status) => status,
            Err(err) => {
                if !matches!(err, SessionError::StaleRead | SessionError::Busy) {
                    self.campaigns.borrow_mut().clear();
                }
                return Err(err);
            }
        };
        self.load().await?;
        Ok(status)
    }

    async fn run_refresh(&self) -> Result<(), SessionError> {
        let _op = self.begin()?;
        self.load().await
    }

    async fn run_create(
        &self,
        title: &str,
        description: &str,
        goal: &str,
    ) -> Result<TransactionResult, SessionError> {
        let _op = self.begin()?;
        let bound = self.session.bound()?;
        let title = title.trim();
        if title.is_empty() {
            return Err(SessionError::MissingField("title"));
        }
        let goal = parse_amount(goal)?;

        let result = create_campaign(&bound.handle, title, description.trim(), goal, |pending| {
            self.submitted(pending)
        })
        .await;
        let result = self.settled_write(result)?;
        self.confirmed(bound.epoch, "Campaign created successfully!").await;
        Ok(result)
    }

    async fn run_fund(&self, id: u64, amount: &str) -> Result<TransactionResult, SessionError> {
        let _op = self.begin()?;
        let bound = self.session.bound()?;

        let result = fund_campaign(&bound.handle, id, amount, |pending| self.submitted(pending)).await;
        let result = self.settled_write(result)?;
        self.confirmed(bound.epoch, "Thank you for your donation!").await;
        Ok(result)
    }

    async fn run_withdraw(&self, id: u64) -> Result<TransactionResult, SessionError> {
        let _op = self.begin()?;
        let bound = self.session.bound()?;

        let result = withdraw_funds(&bound.handle, id, |pending| self.submitted(pending)).await;
        let result = self.settled_write(result)?;
        self.confirmed(bound.epoch, "Funds withdrawn successfully!").await;
        Ok(result)
    }

    fn begin(&self) -> Result<UserOp, SessionError> {
        let op = self.session.begin_user_op()?;
        self.changed();
        Ok(op)
    }

    fn submitted(&self, pending: &TransactionResult) {
        *self.pending.borrow_mut() = Some(pending.clone());
        self.changed();
    }

    fn settled_write(
        &self,
        result: Result<TransactionResult, GatewayError>,
    ) -> Result<TransactionResult, GatewayError> {
        self.pending.borrow_mut().take();
        result
    }

    fn changed(&self) {
        let listener = self.on_change.borrow().clone();
        if let Some(listener) = listener {
            listener();
        }
    }

    /// Success alert, then a fresh list unless the wallet changed meanwhile.
    async fn confirmed(&self, epoch: u64, message: &str) {
        *self.alert.borrow_mut() = Alert::info("Success", message);
        if !self.session.is_current(epoch) {
            debug!("wallet changed while the transaction confirmed, skipping refresh");
            return;
        }
        if let Err(err) = self.load().await {
            warn!("campaign refresh after transaction failed: {err}");
        }
    }

    /// Replaces the list on success. A failed read keeps the previous list;
    /// a read that outlived its epoch is dropped.
    async fn load(&self) -> Result<(), SessionError> {
        let bound = self.session.bound()?;
        let campaigns = list_campaigns(&bound.handle)
            .await
            .inspect_err(|err| warn!("could not fetch campaigns: {err}"))?;

        if !self.session.is_current(bound.epoch) {
            info!("discarding campaign list read before a wallet change");
            return Err(SessionError::StaleRead);
        }
        debug!("loaded {} campaigns", campaigns.len());
        *self.campaigns.borrow_mut() = campaigns;
        Ok(())
    }

    fn settle<T>(&self, result: Result<T, SessionError>) -> Result<T, SessionError> {
        if let Err(err) = &result {
            *self.alert.borrow_mut() = err.alert(self.session.target());
        }
        result
    }

    fn report_background(&self, err: SessionError) {
        if err == SessionError::StaleRead {
            debug!("background update superseded by a newer wallet event");
            return;
        }
        *self.alert.borrow_mut() = err.alert(self.session.target());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fixture, MAINNET, alice, bob, eth};
    use fd_projection::CardAction;
    use fd_types::{SEPOLIA, Severity, TxPhase};
    use fd_wallet::WalletError;

    type TestBoard = Board<fd_wallet::InMemoryWallet, fd_contract::InMemoryLedger>;

    fn record(board: &TestBoard) -> Rc<RefCell<Vec<Reaction>>> {
        let reactions = Rc::new(RefCell::new(Vec::new()));
        let sink = reactions.clone();
        board.subscribe(move |reaction| sink.borrow_mut().push(reaction));
        reactions
    }

    #[tokio::test]
    async fn connect_lists_newest_first() {
        let fx = Fixture::seeded(SEPOLIA);
        let board = fx.board();

        assert_eq!(board.connect().await, Ok(NetworkStatus::Correct));

        let campaigns = board.campaigns();
        let ids: Vec<u64> = campaigns.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(fx.ledger.calls().count_reads, 1);

        let snapshot = board.snapshot();
        assert_eq!(snapshot.network_label, "Sepolia Network");
        assert!(!snapshot.alert.open);
        assert!(snapshot.campaigns[0].goal_reached);
        assert!(!snapshot.campaigns[1].goal_reached);
        assert_eq!(snapshot.campaigns[0].action, CardAction::Completed);
        assert_eq!(snapshot.campaigns[1].action, CardAction::Withdraw { enabled: false });
        assert_eq!(snapshot.campaigns[1].progress_label, "50.00%");
    }

    #[tokio::test]
    async fn connect_without_wallet_raises_install_alert() {
        let fx = Fixture::seeded(SEPOLIA);
        let board = Board::new(crate::Session::new(
            Rc::new(fd_wallet::InMemoryWallet::not_installed()),
            fx.ledger.clone(),
            &crate::testing::config(),
        ));

        assert_eq!(board.connect().await, Err(SessionError::NoWalletProvider));
        let snapshot = board.snapshot();
        assert_eq!(snapshot.session.phase, Phase::Disconnected);
        assert_eq!(snapshot.alert.description, "Please install MetaMask!");
        assert!(snapshot.campaigns.is_empty());
    }

    #[tokio::test]
    async fn actions_require_a_connection() {
        let fx = Fixture::seeded(SEPOLIA);
        let board = fx.board();

        assert_eq!(board.fund(1, "1").await, Err(SessionError::NotConnected));
        assert_eq!(fx.ledger.calls().submissions, 0);
        assert_eq!(
            board.alert().description,
            "Please connect to the Sepolia network first."
        );
    }

    #[tokio::test]
    async fn empty_amount_is_rejected_before_submission() {
        let fx = Fixture::seeded(SEPOLIA);
        let board = fx.board();
        board.connect().await.unwrap();

        let err = board.fund(1, "").await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidAmount(_)));
        assert_eq!(fx.ledger.calls().submissions, 0);
        assert_eq!(board.alert().severity, Severity::Error);
    }

    #[tokio::test]
    async fn fund_then_withdraw_refreshes_after_each_confirmation() {
        let fx = Fixture::seeded(SEPOLIA);
        let board = fx.board();
        board.connect().await.unwrap();

        let funded = board.fund(1, "0.5").await.unwrap();
        assert_eq!(funded.phase, TxPhase::Confirmed);
        assert_eq!(board.alert().description, "Thank you for your donation!");
        assert_eq!(board.campaigns()[1].funds_raised, eth(1));
        assert_eq!(board.views()[1].action, CardAction::Withdraw { enabled: true });

        board.withdraw(1).await.unwrap();
        assert_eq!(board.alert().description, "Funds withdrawn successfully!");
        assert!(board.campaigns()[1].completed);
    }

    #[tokio::test]
    async fn reverted_withdrawal_is_surfaced() {
        let fx = Fixture::seeded(SEPOLIA);
        let board = fx.board();
        board.connect().await.unwrap();

        let err = board.withdraw(1).await.unwrap_err();
        assert!(matches!(err, SessionError::TransactionReverted(_)));
        assert_eq!(board.alert().severity, Severity::Error);
        assert!(!board.campaigns()[1].completed);
    }

    #[tokio::test]
    async fn create_needs_a_title_and_lists_the_new_campaign_first() {
        let fx = Fixture::seeded(SEPOLIA);
        let board = fx.board();
        board.connect().await.unwrap();

        assert_eq!(
            board.create("  ", "Books", "3").await,
            Err(SessionError::MissingField("title"))
        );
        assert!(matches!(
            board.create("Library", "Books", "0").await,
            Err(SessionError::InvalidAmount(_))
        ));
        assert_eq!(fx.ledger.calls().submissions, 0);

        board.create("Library", "Books", "3").await.unwrap();
        let newest = &board.campaigns()[0];
        assert_eq!(newest.id, 3);
        assert_eq!(newest.owner, alice());
        assert_eq!(newest.goal, eth(3));
        assert_eq!(board.alert().description, "Campaign created successfully!");
    }

    #[tokio::test]
    async fn network_change_during_list_discards_and_reloads() {
        let fx = Fixture::seeded(SEPOLIA);
        let board = fx.board();
        let reactions = record(&board);
        board.connect().await.unwrap();
        let before = board.campaigns();

        fx.wallet.reject_switch(true);
        let wallet = fx.wallet.clone();
        fx.ledger.on_next_read(move || wallet.set_network(MAINNET));

        assert_eq!(board.refresh().await, Err(SessionError::StaleRead));
        assert_eq!(*reactions.borrow(), vec![Reaction::Reload]);
        assert_eq!(board.campaigns(), before);
        assert_eq!(board.alert().severity, Severity::Info);

        board.react(Reaction::Reload).await;
        let snapshot = board.snapshot();
        assert_eq!(
            snapshot.session.phase,
            Phase::Connected(NetworkStatus::Incorrect)
        );
        assert!(snapshot.campaigns.is_empty());
        assert_eq!(snapshot.network_label, "Wrong Network");
        assert_eq!(snapshot.alert.severity, Severity::Error);
    }

    #[tokio::test]
    async fn second_action_while_busy_is_rejected() {
        let fx = Fixture::seeded(SEPOLIA);
        let board = Rc::new(fx.board());
        board.connect().await.unwrap();
        let before = board.campaigns();
        let gate = fx.ledger.gate_confirmations();

        let published = Rc::new(RefCell::new(Vec::new()));
        let sink = published.clone();
        let weak = Rc::downgrade(&board);
        board.on_change(move || {
            if let Some(board) = weak.upgrade() {
                sink.borrow_mut().push(board.snapshot());
            }
        });

        let (funded, second) = tokio::join!(board.fund(1, "0.1"), async {
            let snapshot = board.snapshot();
            assert!(snapshot.session.busy);
            let pending = snapshot.pending_transaction.unwrap();
            assert_eq!(pending.phase, TxPhase::Submitted);

            let second = board.withdraw(2).await;
            assert_eq!(board.campaigns(), before);
            assert_eq!(
                board.session().phase(),
                Phase::Connected(NetworkStatus::Correct)
            );
            gate.notify_one();
            (second, pending)
        });

        let funded = funded.unwrap();
        let (second, pending) = second;
        assert_eq!(second, Err(SessionError::Busy));
        assert_eq!(pending.tx_hash, funded.tx_hash);
        assert_eq!(fx.ledger.calls().submissions, 1);

        let published = published.borrow();
        assert_eq!(published.len(), 2);
        assert!(published.iter().all(|snapshot| snapshot.session.busy));
        assert_eq!(published[0].pending_transaction, None);
        assert_eq!(published[1].pending_transaction, Some(pending));

        let settled = board.snapshot();
        assert!(!settled.session.busy);
        assert_eq!(settled.pending_transaction, None);
    }

    #[tokio::test]
    async fn switch_during_connect_ends_connected_with_one_prompt() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let fx = Fixture::seeded(MAINNET);
                fx.wallet.know_network(SEPOLIA);
                fx.wallet.emit_on_switch(true);
                let prompt = fx.wallet.gate_account_prompt();

                let board = Rc::new(fx.board());
                let weak = Rc::downgrade(&board);
                board.subscribe(move |reaction| {
                    let weak = weak.clone();
                    tokio::task::spawn_local(async move {
                        if let Some(board) = weak.upgrade() {
                            board.react(reaction).await;
                        }
                    });
                });

                let connecting = tokio::task::spawn_local({
                    let board = board.clone();
                    async move { board.connect().await }
                });
                while !fx.wallet.prompt_open() {
                    tokio::task::yield_now().await;
                }
                // Queued reactions get their turn while the prompt is open.
                for _ in 0..8 {
                    tokio::task::yield_now().await;
                }
                assert_eq!(board.session().phase(), Phase::Connecting);
                prompt.notify_one();

                assert_eq!(connecting.await.unwrap(), Ok(NetworkStatus::Correct));
                for _ in 0..8 {
                    tokio::task::yield_now().await;
                }

                let snapshot = board.snapshot();
                assert_eq!(
                    snapshot.session.phase,
                    Phase::Connected(NetworkStatus::Correct)
                );
                assert_eq!(snapshot.session.account, Some(alice()));
                assert_eq!(snapshot.campaigns.len(), 2);
                assert!(!snapshot.alert.open);
                assert_eq!(fx.wallet.network(), SEPOLIA);
                assert_eq!(fx.wallet.calls().request_accounts, 1);
            })
            .await;
    }

    #[tokio::test]
    async fn own_campaigns_follow_the_account() {
        let fx = Fixture::seeded(SEPOLIA);
        let board = fx.board();
        let _reactions = record(&board);
        assert!(board.own_views().is_empty());

        board.connect().await.unwrap();
        let own: Vec<u64> = board.own_views().iter().map(|view| view.id).collect();
        assert_eq!(own, vec![1]);

        fx.wallet.set_accounts(vec![bob()]);
        let own: Vec<u64> = board.own_views().iter().map(|view| view.id).collect();
        assert_eq!(own, vec![2]);
    }

    #[tokio::test]
    async fn failed_read_keeps_previous_list() {
        let fx = Fixture::seeded(SEPOLIA);
        let board = fx.board();
        board.connect().await.unwrap();

        fx.ledger.fail_reads(true);
        let err = board.refresh().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Provider(WalletError::Transport(_))
        ));
        assert_eq!(board.campaigns().len(), 2);
    }

    #[tokio::test]
    async fn account_switch_refreshes_ownership() {
        let fx = Fixture::seeded(SEPOLIA);
        let board = fx.board();
        let reactions = record(&board);
        board.connect().await.unwrap();
        assert!(!board.views()[0].is_owner);

        fx.wallet.set_accounts(vec![bob()]);
        assert_eq!(*reactions.borrow(), vec![Reaction::Refresh]);
        board.react(Reaction::Refresh).await;

        assert_eq!(board.session().account(), Some(bob()));
        assert!(board.views()[0].is_owner);
        assert_eq!(fx.ledger.calls().count_reads, 2);
    }

    #[tokio::test]
    async fn releasing_all_accounts_clears_the_board() {
        let fx = Fixture::seeded(SEPOLIA);
        let board = fx.board();
        let reactions = record(&board);
        board.connect().await.unwrap();

        fx.wallet.set_accounts(Vec::new());
        let reaction = reactions.borrow()[0];
        board.react(reaction).await;

        let snapshot = board.snapshot();
        assert_eq!(snapshot.session.phase, Phase::Disconnected);
        assert_eq!(snapshot.session.account, None);
        assert!(snapshot.campaigns.is_empty());
    }

    #[tokio::test]
    async fn dismissing_closes_the_alert() {
        let fx = Fixture::seeded(SEPOLIA);
        let board = fx.board();
        board.refresh().await.unwrap_err();
        assert!(board.alert().open);

        board.dismiss_alert();
        assert!(!board.alert().open);
    }

    #[test]
    fn snapshot_serializes_for_the_page() {
        let fx = Fixture::seeded(SEPOLIA);
        let board = fx.board();
        let json = serde_json::to_value(board.snapshot()).unwrap();
        assert_eq!(json["session"]["phase"]["state"], "disconnected");
        assert_eq!(json["network_label"], "Checking Network");
    }
}
