use std::ops::Deref;

use rand::{rngs::OsRng, RngCore};
use ruint::aliases::U256;
use serde::{Deserialize, Serialize};

use crate::error::ZkLoginError;

/// A `U256` that travels as a base-10 string.
///
/// The prover and the ledger both expect zkLogin randomness, salts and address seeds as
/// decimal strings of big integers (e.g. `"129390038577185583942388216820280642146"`), so
/// this is the representation used on the wire and in persistent storage.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct U256Decimal(pub U256);

impl U256Decimal {
    /// Draws 128 bits from the OS RNG, the width zkLogin uses for randomness and salts.
    #[must_use]
    pub fn random_128() -> Self {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        Self(U256::from_be_slice(&bytes))
    }

    /// Outputs the decimal string representation.
    #[must_use]
    pub fn to_decimal_string(&self) -> String {
        self.0.to_string()
    }

    /// Attempts to parse a decimal string.
    ///
    /// # Errors
    /// Will return `ZkLoginError::InvalidInput` if the input is not a base-10 number of at most 256 bits.
    pub fn try_from_decimal_string(s: &str) -> Result<Self, ZkLoginError> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ZkLoginError::InvalidInput {
                attribute: "u256".to_string(),
                reason: format!("`{s}` is not a decimal number"),
            });
        }
        U256::from_str_radix(trimmed, 10)
            .map(Self)
            .map_err(|e| ZkLoginError::InvalidInput {
                attribute: "u256".to_string(),
                reason: e.to_string(),
            })
    }

    /// Big-endian bytes, left padded to 32.
    #[must_use]
    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0.to_be_bytes::<32>()
    }
}

impl From<U256> for U256Decimal {
    fn from(val: U256) -> Self {
        Self(val)
    }
}

impl From<U256Decimal> for U256 {
    fn from(val: U256Decimal) -> Self {
        val.0
    }
}

impl Deref for U256Decimal {
    type Target = U256;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for U256Decimal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for U256Decimal {
    type Err = ZkLoginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from_decimal_string(s)
    }
}

impl Serialize for U256Decimal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_decimal_string())
    }
}

impl<'de> Deserialize<'de> for U256Decimal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::try_from_decimal_string(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruint::uint;

    #[test]
    fn test_decimal_string_formatting() {
        assert_eq!(U256Decimal(U256::from(42)).to_decimal_string(), "42");
        assert_eq!(
            U256Decimal(uint!(
                129390038577185583942388216820280642146_U256
            ))
            .to_string(),
            "129390038577185583942388216820280642146"
        );
    }

    #[test]
    fn test_parse_rejects_hex_and_garbage() {
        assert!(U256Decimal::try_from_decimal_string("0x2a").is_err());
        assert!(U256Decimal::try_from_decimal_string("").is_err());
        assert!(U256Decimal::try_from_decimal_string("-1").is_err());
        assert_eq!(
            U256Decimal::try_from_decimal_string(" 42 ").unwrap(),
            U256Decimal(U256::from(42))
        );
    }

    #[test]
    fn test_random_128_fits_in_128_bits() {
        for _ in 0..32 {
            let value = U256Decimal::random_128();
            assert!(value.bit_len() <= 128);
        }
        assert_ne!(U256Decimal::random_128(), U256Decimal::random_128());
    }

    #[test]
    fn test_serde_uses_decimal_strings() {
        let value = U256Decimal(U256::from(1_000_000_007u64));
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"1000000007\"");
        let back: U256Decimal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
