use fd_types::{NetworkStatus, TargetNetwork};
use fd_wallet::{WalletError, WalletProvider};
use tracing::{info, warn};

/// Keeps the wallet on the one network the client is built for.
#[derive(Debug, Clone)]
pub struct NetworkGuard {
    target: TargetNetwork,
}

impl NetworkGuard {
    pub fn new(target: TargetNetwork) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &TargetNetwork {
        &self.target
    }

    /// Asks the wallet which network it is on. Never mutates anything.
    pub async fn verify<W>(&self, wallet: &W) -> Result<NetworkStatus, WalletError>
    where
        W: WalletProvider + ?Sized,
    {
        let current = wallet.current_network_id().await?;
        if current == self.target.id {
            Ok(NetworkStatus::Correct)
        } else {
            Ok(NetworkStatus::Incorrect)
        }
    }

    /// Verifies, and on a mismatch makes one switch attempt followed by
    /// exactly one re-verification. A failed switch is logged, not returned:
    /// the caller learns about it through `Incorrect`.
    pub async fn ensure_correct_network<W>(&self, wallet: &W) -> Result<NetworkStatus, WalletError>
    where
        W: WalletProvider + ?Sized,
    {
        if self.verify(wallet).await? == NetworkStatus::Correct {
            return Ok(NetworkStatus::Correct);
        }

        info!("wallet is not on {}, requesting a switch", self.target.display_name);
        if let Err(err) = self.switch(wallet).await {
            warn!("failed to switch to {}: {}", self.target.display_name, err);
        }

        let status = self.verify(wallet).await?;
        if status != NetworkStatus::Correct {
            warn!("wallet still not on {} after switch attempt", self.target.display_name);
        }
        Ok(status)
    }

    /// One switch request. When the wallet does not know the network it is
    /// added with full metadata and the switch is retried once.
    async fn switch<W>(&self, wallet: &W) -> Result<(), WalletError>
    where
        W: WalletProvider + ?Sized,
    {
        match wallet.request_network_switch(self.target.id).await {
            Err(WalletError::UnrecognizedChain) => {
                info!("wallet does not know {}, adding it", self.target.display_name);
                wallet.request_add_network(&self.target).await?;
                wallet.request_network_switch(self.target.id).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fd_types::{Address, NetworkId, SEPOLIA};
    use fd_wallet::InMemoryWallet;

    const MAINNET: NetworkId = NetworkId(1);

    fn wallet_on(network: NetworkId) -> InMemoryWallet {
        let alice: Address = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse().unwrap();
        InMemoryWallet::new(network, vec![alice])
    }

    fn guard() -> NetworkGuard {
        NetworkGuard::new(TargetNetwork::sepolia())
    }

    #[tokio::test]
    async fn verify_compares_against_target() {
        assert_eq!(guard().verify(&wallet_on(SEPOLIA)).await, Ok(NetworkStatus::Correct));
        assert_eq!(guard().verify(&wallet_on(MAINNET)).await, Ok(NetworkStatus::Incorrect));
    }

    #[tokio::test]
    async fn correct_network_makes_no_switch() {
        let wallet = wallet_on(SEPOLIA);
        let status = guard().ensure_correct_network(&wallet).await.unwrap();
        assert_eq!(status, NetworkStatus::Correct);
        assert_eq!(wallet.calls().switch_requests, 0);
        assert_eq!(wallet.calls().network_queries, 1);
    }

    #[tokio::test]
    async fn successful_switch_is_verified_once() {
        let wallet = wallet_on(MAINNET);
        wallet.know_network(SEPOLIA);

        let status = guard().ensure_correct_network(&wallet).await.unwrap();

        assert_eq!(status, NetworkStatus::Correct);
        assert_eq!(wallet.calls().switch_requests, 1);
        assert_eq!(wallet.calls().network_queries, 2);
    }

    #[tokio::test]
    async fn failed_switch_is_not_retried() {
        let wallet = wallet_on(MAINNET);
        wallet.know_network(SEPOLIA);
        wallet.reject_switch(true);

        let status = guard().ensure_correct_network(&wallet).await.unwrap();

        assert_eq!(status, NetworkStatus::Incorrect);
        assert_eq!(wallet.calls().switch_requests, 1);
        assert_eq!(wallet.calls().network_queries, 2);
        assert_eq!(wallet.calls().add_requests, 0);
    }

    #[tokio::test]
    async fn unknown_network_is_added_then_switched_once() {
        let wallet = wallet_on(MAINNET);

        let status = guard().ensure_correct_network(&wallet).await.unwrap();

        assert_eq!(status, NetworkStatus::Correct);
        assert_eq!(wallet.calls().add_requests, 1);
        assert_eq!(wallet.calls().switch_requests, 2);
        assert_eq!(wallet.calls().network_queries, 2);
    }

    #[tokio::test]
    async fn rejected_add_leaves_network_incorrect() {
        let wallet = wallet_on(MAINNET);
        wallet.reject_add(true);

        let status = guard().ensure_correct_network(&wallet).await.unwrap();

        assert_eq!(status, NetworkStatus::Incorrect);
        assert_eq!(wallet.calls().add_requests, 1);
        assert_eq!(wallet.calls().switch_requests, 1);
    }
}
