#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! Session and commitment state machine for Sui zkLogin.
//!
//! A [`Session`] walks a user from an anonymous start, through an OpenID
//! Connect redirect whose nonce commits to a fresh ephemeral key, to a
//! zero-knowledge proof from a remote prover and finally to a transfer signed
//! with a composite zkLogin signature.
//!
//! ```rust,ignore
//! let session = Session::restore(config, &provider, prover, ledger)?;
//! let url = session.begin_login().await?;
//! // navigate to `url`, then on the way back:
//! session.handle_redirect(&location).await?;
//! let digest = session.submit().await?;
//! ```
use strum::EnumString;

/// Sui network a session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Network {
    /// Developer network with the public development prover.
    Devnet,
    /// Test network.
    Testnet,
    /// Main network.
    Mainnet,
}

mod error;
pub use error::*;

mod u256;
pub use u256::*;

pub mod address;
pub mod config;
pub mod defaults;
pub mod ephemeral;
pub mod jwt;
pub mod ledger;
pub mod logger;
pub mod nonce;
pub mod prover;
pub mod redirect;
pub mod session;
pub mod storage;
pub mod transaction;

pub use config::Config;
pub use session::{Phase, Session, SessionSnapshot};

// private modules
mod http_request;
