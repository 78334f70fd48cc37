use thiserror::Error;

use crate::storage::StorageError;

/// Result type for zkLogin session operations.
pub type ZkLoginResult<T, E = ZkLoginError> = std::result::Result<T, E>;

/// Error outputs from the zkLogin session core.
#[derive(Debug, Error)]
pub enum ZkLoginError {
    /// A persisted ephemeral key could not be decoded. A fresh login is required.
    #[error("corrupt_key: {reason}")]
    CorruptKey {
        /// Why decoding failed.
        reason: String,
    },
    /// The prover answered with a non-success status.
    #[error("prover_unavailable: {status} {status_text}: {body}")]
    ProverUnavailable {
        /// HTTP status code.
        status: u16,
        /// Canonical reason phrase for the status.
        status_text: String,
        /// Response body, verbatim.
        body: String,
    },
    /// The identity token lacks a claim required to derive the address seed.
    #[error("missing_claim: identity token has no `{claim}` claim")]
    MissingClaim {
        /// Name of the missing claim.
        claim: &'static str,
    },
    /// The ledger rejected the transaction. Funds were not moved.
    #[error("submission_error: {reason}")]
    Submission {
        /// Rejection reason reported by the ledger.
        reason: String,
    },
    /// A persisted value is present but cannot be parsed.
    #[error("storage_corruption: `{key}`: {reason}")]
    StorageCorruption {
        /// Storage key holding the value.
        key: &'static str,
        /// Parse failure.
        reason: String,
    },
    /// The underlying store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The nonce echoed by the identity token does not match the committed nonce.
    #[error("nonce_mismatch: identity token was not issued for this session's key")]
    NonceMismatch,
    /// A token came back but the committed key, randomness or nonce did not survive the redirect.
    #[error("commitment_lost: session state did not survive the redirect, log in again")]
    CommitmentLost,
    /// The committed max epoch has passed on the ledger.
    #[error("session_expired: max epoch {max_epoch} is behind current epoch {current_epoch}")]
    SessionExpired {
        /// Epoch bound committed in the nonce.
        max_epoch: u64,
        /// Epoch reported by the ledger.
        current_epoch: u64,
    },
    /// The proof no longer matches its inputs and was discarded.
    #[error("stale_proof: proof inputs changed since the proof was obtained")]
    StaleProof,
    /// The requested transition is not available in the current phase.
    #[error("not_ready: operation not available in phase {phase}")]
    NotReady {
        /// Name of the current phase.
        phase: String,
    },
    /// Another external call is outstanding.
    #[error("transition_in_flight")]
    TransitionInFlight,
    /// The session was reset while the call was outstanding; its result was discarded.
    #[error("superseded: session was reset while the request was outstanding")]
    Superseded,
    /// The identity token is not a decodable JWT.
    #[error("invalid_token: {0}")]
    InvalidToken(String),
    /// The presented input is not valid for the requested operation.
    #[error("invalid_input: {attribute}: {reason}")]
    InvalidInput {
        /// Name of the offending input.
        attribute: String,
        /// Why it was rejected.
        reason: String,
    },
    /// Network connection error with details.
    #[error("network_error: {url} (status {status:?}): {error}")]
    NetworkError {
        /// Target URL.
        url: String,
        /// HTTP status, if a response arrived.
        status: Option<u16>,
        /// Error details.
        error: String,
    },
    /// Unexpected error serializing or deserializing information.
    #[error("serialization_error: {error}")]
    SerializationError {
        /// Error details.
        error: String,
    },
}

impl ZkLoginError {
    /// Whether the user can retry the failing transition without logging in again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProverUnavailable { .. }
                | Self::Submission { .. }
                | Self::NetworkError { .. }
                | Self::TransitionInFlight
        )
    }
}

impl From<reqwest::Error> for ZkLoginError {
    fn from(error: reqwest::Error) -> Self {
        Self::NetworkError {
            url: error
                .url()
                .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            status: error.status().map(|s| s.as_u16()),
            error: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for ZkLoginError {
    fn from(error: serde_json::Error) -> Self {
        Self::SerializationError {
            error: error.to_string(),
        }
    }
}
