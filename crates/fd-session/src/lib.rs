//! Connection session and page controller for the crowdfunding client.
//!
//! [`Session`] owns the wallet connection and applies wallet events;
//! [`Board`] owns what the page shows and turns every failure into a single
//! alert.

mod board;
mod config;
mod error;
mod session;
#[cfg(test)]
mod testing;

pub use board::{Board, BoardSnapshot};
pub use config::{AppConfig, CONTRACT_ADDRESS_VAR, RPC_URL_VAR};
pub use error::SessionError;
pub use session::{Bound, Phase, Reaction, Session, SessionSnapshot, UserOp};
