//! Persisted layout of a session.

use super::traits::Scope;

/// Every value a session persists, with its scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    /// Serialized ephemeral keypair.
    EphemeralKeyPair,
    /// Per-login randomness (decimal).
    Randomness,
    /// Nonce sent to the identity provider.
    Nonce,
    /// Epoch bound committed in the nonce.
    MaxEpoch,
    /// Long-lived per-user salt (decimal).
    Salt,
    /// Raw identity token.
    IdentityToken,
    /// Derived zkLogin address.
    Address,
}

impl StorageKey {
    /// All keys, in the order they are cleared on reset.
    pub const ALL: [Self; 7] = [
        Self::EphemeralKeyPair,
        Self::Randomness,
        Self::Nonce,
        Self::MaxEpoch,
        Self::Salt,
        Self::IdentityToken,
        Self::Address,
    ];

    /// Fields written together when a login commits to a key.
    pub const COMMITMENT: [Self; 4] = [
        Self::EphemeralKeyPair,
        Self::Randomness,
        Self::Nonce,
        Self::MaxEpoch,
    ];

    /// Name under which the value is stored.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::EphemeralKeyPair => "ephemeralKeyPair",
            Self::Randomness => "randomness",
            Self::Nonce => "zkloginNonce",
            Self::MaxEpoch => "zkloginMaxEpoch",
            Self::Salt => "zkloginSalt",
            Self::IdentityToken => "jwtString",
            Self::Address => "zkLoginAddress",
        }
    }

    /// Scope the value lives in.
    #[must_use]
    pub const fn scope(self) -> Scope {
        match self {
            Self::EphemeralKeyPair | Self::Randomness | Self::Nonce | Self::MaxEpoch => {
                Scope::Volatile
            }
            Self::Salt | Self::IdentityToken | Self::Address => Scope::Durable,
        }
    }

    /// Names of all keys living in `scope`.
    #[must_use]
    pub fn names_in(scope: Scope) -> Vec<&'static str> {
        Self::ALL
            .iter()
            .filter(|key| key.scope() == scope)
            .map(|key| key.name())
            .collect()
    }
}
