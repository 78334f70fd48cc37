//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::address::SuiAddress;
use crate::error::ZkLoginError;

/// Epochs a committed key stays valid for, counted from the epoch at login.
pub const DEFAULT_MAX_EPOCH_LOOKAHEAD: u64 = 2;

/// Gas budget for the transfer, in MIST.
pub const DEFAULT_GAS_BUDGET: u64 = 10_000_000;

/// MIST per SUI.
pub const MIST_PER_SUI: u64 = 1_000_000_000;

/// Google's OAuth 2.0 authorization endpoint.
pub const GOOGLE_AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// The fixed transfer a ready session can submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Destination address.
    pub recipient: SuiAddress,
    /// Amount in MIST.
    pub amount_mist: u64,
}

/// Everything a [`crate::Session`] needs to reach its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// OAuth client id registered with the identity provider.
    pub client_id: String,
    /// Where the identity provider sends the user back.
    pub redirect_uri: String,
    /// Identity provider authorization endpoint.
    #[serde(default = "default_authorization_endpoint")]
    pub authorization_endpoint: String,
    /// Sui full node JSON-RPC URL.
    pub fullnode_url: String,
    /// zkLogin prover URL.
    pub prover_url: String,
    /// Epochs added to the current epoch to form the committed max epoch.
    #[serde(default = "default_lookahead")]
    pub max_epoch_lookahead: u64,
    /// The transfer submitted by [`crate::Session::submit`].
    pub transfer: TransferConfig,
    /// Gas budget in MIST.
    #[serde(default = "default_gas_budget")]
    pub gas_budget: u64,
    /// Optional timeout for every outbound request. Unset means wait indefinitely.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_authorization_endpoint() -> String {
    GOOGLE_AUTHORIZATION_ENDPOINT.to_string()
}

const fn default_lookahead() -> u64 {
    DEFAULT_MAX_EPOCH_LOOKAHEAD
}

const fn default_gas_budget() -> u64 {
    DEFAULT_GAS_BUDGET
}

impl Config {
    /// Parses a JSON config.
    ///
    /// # Errors
    /// Returns `ZkLoginError::InvalidInput` if the JSON is malformed or fails [`Self::validate`].
    pub fn from_json(json: &str) -> Result<Self, ZkLoginError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ZkLoginError::InvalidInput {
                attribute: "config".to_string(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes to JSON.
    ///
    /// # Errors
    /// Returns `ZkLoginError::SerializationError` if serialization fails.
    pub fn to_json(&self) -> Result<String, ZkLoginError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks the fields a session cannot work without.
    ///
    /// # Errors
    /// Returns `ZkLoginError::InvalidInput` naming the first offending field.
    pub fn validate(&self) -> Result<(), ZkLoginError> {
        let invalid = |attribute: &str, reason: &str| ZkLoginError::InvalidInput {
            attribute: attribute.to_string(),
            reason: reason.to_string(),
        };
        if self.client_id.trim().is_empty() {
            return Err(invalid("client_id", "must not be empty"));
        }
        for (attribute, value) in [
            ("redirect_uri", &self.redirect_uri),
            ("authorization_endpoint", &self.authorization_endpoint),
            ("fullnode_url", &self.fullnode_url),
            ("prover_url", &self.prover_url),
        ] {
            url::Url::parse(value).map_err(|e| invalid(attribute, &e.to_string()))?;
        }
        if self.max_epoch_lookahead == 0 {
            return Err(invalid("max_epoch_lookahead", "must be at least 1"));
        }
        if self.transfer.amount_mist == 0 {
            return Err(invalid("transfer.amount_mist", "must be positive"));
        }
        Ok(())
    }

    /// Request timeout, if configured.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
