//! Commitment binding between the ephemeral key and the OpenID nonce.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::ephemeral::EphemeralPublicKey;
use crate::u256::U256Decimal;

const NONCE_DOMAIN: &[u8] = b"zklogin:nonce:v1";

/// Bytes of digest kept in the nonce. Encodes to 27 base64url characters.
const NONCE_BYTES: usize = 20;

/// The value sent to the identity provider as `nonce`, committing to a key and an epoch window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(String);

impl Nonce {
    /// Wraps a nonce read back from storage or a token.
    #[must_use]
    pub const fn new(value: String) -> Self {
        Self(value)
    }

    /// String form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against a nonce echoed by the identity provider.
    #[must_use]
    pub fn matches(&self, echoed: &str) -> bool {
        self.0.as_bytes().ct_eq(echoed.as_bytes()).into()
    }
}

impl std::fmt::Display for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fresh per-login randomness.
#[must_use]
pub fn generate_randomness() -> U256Decimal {
    U256Decimal::random_128()
}

/// Derives the nonce for `(public_key, max_epoch, randomness)`. Same inputs, same nonce.
#[must_use]
pub fn bind_nonce(
    public_key: &EphemeralPublicKey,
    max_epoch: u64,
    randomness: &U256Decimal,
) -> Nonce {
    let digest = Sha256::new()
        .chain_update(NONCE_DOMAIN)
        .chain_update(public_key.to_flagged_bytes())
        .chain_update(max_epoch.to_be_bytes())
        .chain_update(randomness.to_be_bytes())
        .finalize();
    Nonce(URL_SAFE_NO_PAD.encode(&digest[..NONCE_BYTES]))
}

/// Whether `nonce` commits to exactly `(public_key, max_epoch, randomness)`.
#[must_use]
pub fn verify_nonce(
    public_key: &EphemeralPublicKey,
    max_epoch: u64,
    randomness: &U256Decimal,
    nonce: &str,
) -> bool {
    bind_nonce(public_key, max_epoch, randomness).matches(nonce)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ephemeral::EphemeralKeyPair;
    use ruint::aliases::U256;

    fn fixed_randomness() -> U256Decimal {
        U256Decimal(U256::from(129_390_038_577_185_583_942_388_216_820_280_642_146u128))
    }

    #[test]
    fn test_nonce_is_deterministic() {
        let keypair = EphemeralKeyPair::from_secret_bytes(&[1u8; 32]);
        let a = bind_nonce(&keypair.public_key(), 12, &fixed_randomness());
        let b = bind_nonce(&keypair.public_key(), 12, &fixed_randomness());
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 27);
    }

    #[test]
    fn test_nonce_for_one_key_does_not_verify_for_another() {
        let k1 = EphemeralKeyPair::from_secret_bytes(&[1u8; 32]);
        let k2 = EphemeralKeyPair::from_secret_bytes(&[2u8; 32]);
        let nonce = bind_nonce(&k1.public_key(), 12, &fixed_randomness());

        assert!(verify_nonce(&k1.public_key(), 12, &fixed_randomness(), nonce.as_str()));
        assert!(!verify_nonce(&k2.public_key(), 12, &fixed_randomness(), nonce.as_str()));
    }

    #[test]
    fn test_every_input_changes_the_nonce() {
        let keypair = EphemeralKeyPair::from_secret_bytes(&[1u8; 32]);
        let base = bind_nonce(&keypair.public_key(), 12, &fixed_randomness());
        assert_ne!(base, bind_nonce(&keypair.public_key(), 13, &fixed_randomness()));
        assert_ne!(
            base,
            bind_nonce(&keypair.public_key(), 12, &U256Decimal(U256::from(1)))
        );
    }

    #[test]
    fn test_nonce_is_url_safe() {
        let nonce = bind_nonce(
            &EphemeralKeyPair::generate().public_key(),
            u64::MAX,
            &generate_randomness(),
        );
        assert!(nonce
            .as_str()
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
    }
}
