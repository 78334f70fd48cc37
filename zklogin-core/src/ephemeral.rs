//! Ephemeral signing keys.
//!
//! A fresh Ed25519 keypair is created for every login attempt. Its public half is committed
//! inside the OpenID nonce, its secret half signs exactly the transactions of that session.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use secrecy::SecretString;
use zeroize::Zeroizing;

use crate::error::ZkLoginError;

/// Signature scheme flag Sui prefixes to Ed25519 keys and signatures.
pub const ED25519_FLAG: u8 = 0x00;

/// Public half of an ephemeral keypair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EphemeralPublicKey(VerifyingKey);

impl EphemeralPublicKey {
    /// Raw 32-byte key.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// `flag || key` bytes, the form committed in the nonce and sent to the prover.
    #[must_use]
    pub fn to_flagged_bytes(&self) -> [u8; 33] {
        let mut out = [0u8; 33];
        out[0] = ED25519_FLAG;
        out[1..].copy_from_slice(self.0.as_bytes());
        out
    }

    /// Base64 of [`Self::to_flagged_bytes`], the "extended ephemeral public key".
    #[must_use]
    pub fn extended(&self) -> String {
        STANDARD.encode(self.to_flagged_bytes())
    }

    /// Verifies `signature` over `message`.
    #[must_use]
    pub fn verify(&self, message: &[u8], signature: &ed25519_dalek::Signature) -> bool {
        self.0.verify_strict(message, signature).is_ok()
    }
}

/// Ephemeral Ed25519 signing keypair. The secret is zeroized on drop.
#[derive(Clone)]
pub struct EphemeralKeyPair {
    signing_key: SigningKey,
}

impl EphemeralKeyPair {
    /// Creates a new keypair from OS randomness.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Builds a keypair from a raw 32-byte secret.
    #[must_use]
    pub fn from_secret_bytes(secret: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    /// Public half.
    #[must_use]
    pub fn public_key(&self) -> EphemeralPublicKey {
        EphemeralPublicKey(self.signing_key.verifying_key())
    }

    /// Serializes the keypair as base64 of `flag || secret`.
    #[must_use]
    pub fn serialize(&self) -> SecretString {
        let mut bytes = Zeroizing::new([0u8; SECRET_KEY_LENGTH + 1]);
        bytes[0] = ED25519_FLAG;
        bytes[1..].copy_from_slice(self.signing_key.as_bytes());
        SecretString::from(STANDARD.encode(bytes.as_slice()))
    }

    /// Parses the output of [`Self::serialize`].
    ///
    /// # Errors
    /// Returns `ZkLoginError::CorruptKey` when the input is not base64, has the wrong length or
    /// carries a flag other than Ed25519.
    pub fn deserialize(encoded: &str) -> Result<Self, ZkLoginError> {
        let bytes = Zeroizing::new(STANDARD.decode(encoded.trim()).map_err(|e| {
            ZkLoginError::CorruptKey {
                reason: format!("not base64: {e}"),
            }
        })?);
        if bytes.len() != SECRET_KEY_LENGTH + 1 {
            return Err(ZkLoginError::CorruptKey {
                reason: format!(
                    "expected {} bytes, got {}",
                    SECRET_KEY_LENGTH + 1,
                    bytes.len()
                ),
            });
        }
        if bytes[0] != ED25519_FLAG {
            return Err(ZkLoginError::CorruptKey {
                reason: format!("unsupported key scheme flag {:#04x}", bytes[0]),
            });
        }
        let mut secret = Zeroizing::new([0u8; SECRET_KEY_LENGTH]);
        secret.copy_from_slice(&bytes[1..]);
        Ok(Self::from_secret_bytes(&secret))
    }

    /// Signs `message`, returning the Sui serialized form `flag || signature || public key`.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> UserSignature {
        let signature = self.signing_key.sign(message);
        let mut bytes = Vec::with_capacity(1 + 64 + 32);
        bytes.push(ED25519_FLAG);
        bytes.extend_from_slice(&signature.to_bytes());
        bytes.extend_from_slice(self.signing_key.verifying_key().as_bytes());
        UserSignature(bytes)
    }
}

impl std::fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("public_key", &self.public_key().extended())
            .finish_non_exhaustive()
    }
}

/// Conventional (non-zk) signature by the ephemeral key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSignature(Vec<u8>);

impl UserSignature {
    /// Serialized `flag || signature || public key` bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Base64 form.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    /// The raw Ed25519 signature.
    #[must_use]
    pub fn signature(&self) -> Option<ed25519_dalek::Signature> {
        let raw: [u8; 64] = self.0.get(1..65)?.try_into().ok()?;
        Some(ed25519_dalek::Signature::from_bytes(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_serialized_key_reloads_to_same_public_key() {
        let keypair = EphemeralKeyPair::generate();
        let encoded = keypair.serialize();
        let reloaded = EphemeralKeyPair::deserialize(encoded.expose_secret()).unwrap();
        assert_eq!(reloaded.public_key(), keypair.public_key());
    }

    #[test]
    fn test_corrupt_inputs_are_reported_not_panicking() {
        let wrong_flag = STANDARD.encode([0x01u8; 33]);
        for input in ["", "@@@", "AAAA", wrong_flag.as_str()] {
            match EphemeralKeyPair::deserialize(input) {
                Err(ZkLoginError::CorruptKey { .. }) => {}
                other => panic!("expected CorruptKey for {input:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_extended_public_key_is_flagged() {
        let keypair = EphemeralKeyPair::from_secret_bytes(&[7u8; 32]);
        let extended = STANDARD.decode(keypair.public_key().extended()).unwrap();
        assert_eq!(extended.len(), 33);
        assert_eq!(extended[0], ED25519_FLAG);
        assert_eq!(&extended[1..], &keypair.public_key().to_bytes());
    }

    #[test]
    fn test_signature_layout_and_verification() {
        let keypair = EphemeralKeyPair::generate();
        let signature = keypair.sign(b"intent message");
        assert_eq!(signature.as_bytes().len(), 97);
        assert_eq!(signature.as_bytes()[0], ED25519_FLAG);
        assert_eq!(&signature.as_bytes()[65..], &keypair.public_key().to_bytes());

        let raw = signature.signature().unwrap();
        assert!(keypair.public_key().verify(b"intent message", &raw));
        assert!(!keypair.public_key().verify(b"other message", &raw));
    }
}
