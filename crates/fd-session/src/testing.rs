use fd_contract::InMemoryLedger;
use fd_types::{Address, NetworkId, U256};
use fd_wallet::InMemoryWallet;
use std::rc::Rc;

use crate::{AppConfig, Board, Session};

pub const MAINNET: NetworkId = NetworkId(1);

pub fn alice() -> Address {
    "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse().unwrap()
}

pub fn bob() -> Address {
    "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359".parse().unwrap()
}

pub fn eth(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
}

pub fn config() -> AppConfig {
    AppConfig::default()
        .with_contract_address("0x776D999Dc83b22261b841ff6cD173BBC01957806".parse().unwrap())
}

pub struct Fixture {
    pub wallet: Rc<InMemoryWallet>,
    pub ledger: InMemoryLedger,
}

impl Fixture {
    /// Alice's wallet on `network`, empty ledger.
    pub fn on(network: NetworkId) -> Self {
        Self {
            wallet: Rc::new(InMemoryWallet::new(network, vec![alice()])),
            ledger: InMemoryLedger::default(),
        }
    }

    /// Two campaigns: Alice's open one (1 ETH goal, 0.5 raised) and Bob's
    /// completed one (2 ETH goal, fully raised).
    pub fn seeded(network: NetworkId) -> Self {
        let fx = Self::on(network);
        fx.ledger
            .seed(alice(), "School roof", "Fix it", eth(1), eth(1) / U256::from(2u64), false);
        fx.ledger.seed(bob(), "Clinic", "Equipment", eth(2), eth(2), true);
        fx
    }

    pub fn session(&self) -> Session<InMemoryWallet, InMemoryLedger> {
        Session::new(self.wallet.clone(), self.ledger.clone(), &config())
    }

    pub fn board(&self) -> Board<InMemoryWallet, InMemoryLedger> {
        Board::new(self.session())
    }
}
