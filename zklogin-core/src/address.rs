//! zkLogin address derivation.
//!
//! The address depends only on the identity token's stable claims and the user's salt, never on
//! the session's ephemeral material, so the same account maps to the same address across logins.

use std::str::FromStr;

use ruint::{aliases::U256, uint};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ZkLoginError;
use crate::jwt::IdentityToken;
use crate::u256::U256Decimal;

/// Signature scheme flag for zkLogin authenticators.
pub const ZKLOGIN_FLAG: u8 = 0x05;

/// Claim identifying the user inside the address seed.
pub const KEY_CLAIM_NAME: &str = "sub";

/// Order of the BN254 scalar field; address seeds are field elements.
const BN254_SCALAR_MODULUS: U256 =
    uint!(21888242871839275222246405745257275088548364400416034343698204186575808495617_U256);

const ADDRESS_SEED_DOMAIN: &[u8] = b"zklogin:address-seed:v1";

/// A 32-byte Sui address.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SuiAddress([u8; 32]);

impl SuiAddress {
    /// Wraps raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// `0x`-prefixed lowercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for SuiAddress {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Display for SuiAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for SuiAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SuiAddress({})", self.to_hex())
    }
}

impl FromStr for SuiAddress {
    type Err = ZkLoginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| ZkLoginError::InvalidInput {
            attribute: "address".to_string(),
            reason,
        };
        let digits = s.trim().trim_start_matches("0x");
        if digits.is_empty() || digits.len() > 64 {
            return Err(invalid(format!("`{s}` is not a 32-byte hex address")));
        }
        let padded = format!("{digits:0>64}");
        let bytes = hex::decode(padded).map_err(|e| invalid(e.to_string()))?;
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl Serialize for SuiAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SuiAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Derives the address seed from the salt and the identifying claims.
#[must_use]
pub fn address_seed(
    salt: &U256Decimal,
    claim_name: &str,
    claim_value: &str,
    audience: &str,
) -> U256Decimal {
    let mut hasher = Sha256::new();
    hasher.update(ADDRESS_SEED_DOMAIN);
    hasher.update(salt.to_be_bytes());
    for field in [claim_name, claim_value, audience] {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    let digest: [u8; 32] = hasher.finalize().into();
    U256Decimal(U256::from_be_bytes(digest) % BN254_SCALAR_MODULUS)
}

/// Address seed for `token` under `salt`, keyed on the `sub` claim.
///
/// # Errors
/// Returns `ZkLoginError::MissingClaim` when the token has no `sub` or `aud`.
pub fn address_seed_for_token(
    token: &IdentityToken,
    salt: &U256Decimal,
) -> Result<U256Decimal, ZkLoginError> {
    Ok(address_seed(
        salt,
        KEY_CLAIM_NAME,
        token.subject()?,
        token.audience()?,
    ))
}

/// Derives the zkLogin address for `token` under `salt`. Pure and deterministic.
///
/// # Errors
/// Returns `ZkLoginError::MissingClaim` when the token has no `iss`, `sub` or `aud`.
pub fn derive_address(token: &IdentityToken, salt: &U256Decimal) -> Result<SuiAddress, ZkLoginError> {
    let issuer = token.issuer()?;
    let seed = address_seed_for_token(token, salt)?;
    let issuer_len = u8::try_from(issuer.len()).map_err(|_| ZkLoginError::InvalidInput {
        attribute: "iss".to_string(),
        reason: "issuer longer than 255 bytes".to_string(),
    })?;

    let digest: [u8; 32] = Sha256::new()
        .chain_update([ZKLOGIN_FLAG, issuer_len])
        .chain_update(issuer.as_bytes())
        .chain_update(seed.to_be_bytes())
        .finalize()
        .into();
    Ok(SuiAddress(digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::encode_unsigned;
    use serde_json::json;

    fn token(sub: &str, aud: &str) -> IdentityToken {
        IdentityToken::parse(&encode_unsigned(&json!({
            "iss": "https://accounts.google.com",
            "sub": sub,
            "aud": aud,
            "nonce": "ignored-by-address",
        })))
        .unwrap()
    }

    #[test]
    fn test_address_is_deterministic() {
        let salt = U256Decimal(U256::from(42));
        let a = derive_address(&token("user-1", "client"), &salt).unwrap();
        let b = derive_address(&token("user-1", "client"), &salt).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_address_ignores_nonce_but_not_salt_or_subject() {
        let salt = U256Decimal(U256::from(42));
        let base = derive_address(&token("user-1", "client"), &salt).unwrap();

        let other_nonce = IdentityToken::parse(&encode_unsigned(&json!({
            "iss": "https://accounts.google.com",
            "sub": "user-1",
            "aud": "client",
            "nonce": "another-session",
        })))
        .unwrap();
        assert_eq!(derive_address(&other_nonce, &salt).unwrap(), base);

        assert_ne!(
            derive_address(&token("user-1", "client"), &U256Decimal(U256::from(43))).unwrap(),
            base
        );
        assert_ne!(derive_address(&token("user-2", "client"), &salt).unwrap(), base);
    }

    #[test]
    fn test_seed_is_a_field_element() {
        let seed = address_seed(&U256Decimal(U256::MAX), "sub", "x", "y");
        assert!(seed.0 < BN254_SCALAR_MODULUS);
    }

    #[test]
    fn test_missing_claims() {
        let salt = U256Decimal(U256::from(1));
        let no_sub = IdentityToken::parse(&encode_unsigned(&json!({
            "iss": "https://accounts.google.com",
            "aud": "client",
        })))
        .unwrap();
        assert!(matches!(
            derive_address(&no_sub, &salt),
            Err(ZkLoginError::MissingClaim { claim: "sub" })
        ));
    }

    #[test]
    fn test_address_hex_round_trip() {
        let address: SuiAddress =
            "0xfa0f8542f256e669694624aa3ee7bfbde5af54641646a3a05924cf9e329a8a36"
                .parse()
                .unwrap();
        assert_eq!(
            address.to_string(),
            "0xfa0f8542f256e669694624aa3ee7bfbde5af54641646a3a05924cf9e329a8a36"
        );
        let short: SuiAddress = "0x2".parse().unwrap();
        assert_eq!(short.as_bytes()[31], 2);
        assert!("0xzz".parse::<SuiAddress>().is_err());
    }
}
