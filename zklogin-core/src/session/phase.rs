use serde::Serialize;

use crate::ledger::TransactionDigest;

/// Where a session stands. Every state is reachable from and exits to a defined transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, strum::IntoStaticStr)]
#[serde(tag = "phase", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    /// Nothing committed.
    Anonymous,
    /// A key, randomness, epoch bound and nonce are fixed and persisted.
    KeyCommitted,
    /// The user was sent to the identity provider.
    AwaitingToken,
    /// An identity token matching the commitment was accepted.
    TokenReceived,
    /// The prover has been called and has not answered yet.
    ProofRequested,
    /// A proof matching the current inputs is held.
    Ready,
    /// A transfer is being built, signed and executed.
    Submitting,
    /// The transfer executed.
    Complete {
        /// Ledger digest of the executed transaction.
        digest: TransactionDigest,
    },
    /// The last transition failed. Completed inputs are kept.
    Error {
        /// Human-readable failure, including any status code and body.
        cause: String,
    },
}

impl Phase {
    /// Stable snake_case name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete { digest } => write!(f, "complete ({digest})"),
            Self::Error { cause } => write!(f, "error ({cause})"),
            other => f.write_str(other.name()),
        }
    }
}
