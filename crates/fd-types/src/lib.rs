use serde::{Deserialize, Serialize};

pub use alloy_primitives::{Address, TxHash, U256};

/// Numeric chain identifier as reported by `eth_chainId`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NetworkId(pub u64);

pub const SEPOLIA: NetworkId = NetworkId(11_155_111);

impl NetworkId {
    pub fn to_hex(self) -> String {
        format!("{:#x}", self.0)
    }

    /// Parses the `0x`-prefixed quantity wallets use for chain ids.
    pub fn from_hex(value: &str) -> Option<Self> {
        let digits = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))?;
        if digits.is_empty() {
            return None;
        }
        u64::from_str_radix(digits, 16).ok().map(Self)
    }
}

impl std::fmt::Display for NetworkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NetworkStatus {
    #[default]
    Unknown,
    Correct,
    Incorrect,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Everything a wallet needs to add and select the network the client targets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetNetwork {
    pub id: NetworkId,
    pub short_name: String,
    pub display_name: String,
    pub rpc_url: String,
    pub explorer_url: String,
    pub native_currency: NativeCurrency,
}

impl TargetNetwork {
    pub fn sepolia() -> Self {
        Self {
            id: SEPOLIA,
            short_name: "Sepolia".to_owned(),
            display_name: "Sepolia Test Network".to_owned(),
            rpc_url: "https://rpc.sepolia.org/".to_owned(),
            explorer_url: "https://sepolia.etherscan.io".to_owned(),
            native_currency: NativeCurrency {
                name: "Sepolia ETH".to_owned(),
                symbol: "ETH".to_owned(),
                decimals: 18,
            },
        }
    }
}

/// One campaign record as stored on chain. Amounts are in wei.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Campaign {
    pub id: u64,
    pub owner: Address,
    pub title: String,
    pub description: String,
    pub goal: U256,
    pub funds_raised: U256,
    pub completed: bool,
}

/// Newest-created first.
pub type CampaignList = Vec<Campaign>;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Info,
    Error,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alert {
    pub open: bool,
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Alert {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            open: true,
            title: title.into(),
            description: description.into(),
            severity: Severity::Info,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            open: true,
            title: title.into(),
            description: description.into(),
            severity: Severity::Error,
        }
    }

    pub fn dismiss(&mut self) {
        self.open = false;
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TxPhase {
    Submitted,
    Confirmed,
    Reverted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionResult {
    pub tx_hash: TxHash,
    pub phase: TxPhase,
}
