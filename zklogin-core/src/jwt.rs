//! Identity tokens returned by the OpenID provider.
//!
//! Tokens are decoded, not verified: the prover checks the provider's signature as part of the
//! proof, so the session only needs the claims that feed the commitment and the address.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::ZkLoginError;

/// `aud` may be a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// Single audience.
    One(String),
    /// Several audiences; the first one is the client the token was issued to.
    Many(Vec<String>),
}

impl Audience {
    /// The audience used for address derivation.
    #[must_use]
    pub fn primary(&self) -> Option<&str> {
        match self {
            Self::One(aud) => Some(aud.as_str()),
            Self::Many(list) => list.first().map(String::as_str),
        }
    }
}

/// Claims the session reads from an identity token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Subject identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Audience (the OAuth client id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    /// Nonce echoed back from the authorization request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Expiry, seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
    /// Issued-at, seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
}

/// A raw JWT together with its decoded claims.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityToken {
    raw: String,
    claims: Claims,
}

impl IdentityToken {
    /// Decodes the payload segment of `raw`.
    ///
    /// # Errors
    /// Returns `ZkLoginError::InvalidToken` if `raw` is not three dot-separated segments or the
    /// payload is not base64url-encoded JSON.
    pub fn parse(raw: &str) -> Result<Self, ZkLoginError> {
        let raw = raw.trim();
        let mut segments = raw.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(ZkLoginError::InvalidToken(
                "expected three dot-separated segments".to_string(),
            ));
        };

        let payload = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| ZkLoginError::InvalidToken(format!("payload is not base64url: {e}")))?;
        let claims: Claims = serde_json::from_slice(&payload)
            .map_err(|e| ZkLoginError::InvalidToken(format!("payload is not JSON: {e}")))?;

        Ok(Self {
            raw: raw.to_string(),
            claims,
        })
    }

    /// The token exactly as issued.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Decoded claims.
    #[must_use]
    pub const fn claims(&self) -> &Claims {
        &self.claims
    }

    /// `sub`, or `MissingClaim`.
    ///
    /// # Errors
    /// Returns `ZkLoginError::MissingClaim` if the token has no subject.
    pub fn subject(&self) -> Result<&str, ZkLoginError> {
        self.claims
            .sub
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ZkLoginError::MissingClaim { claim: "sub" })
    }

    /// Primary `aud`, or `MissingClaim`.
    ///
    /// # Errors
    /// Returns `ZkLoginError::MissingClaim` if the token has no audience.
    pub fn audience(&self) -> Result<&str, ZkLoginError> {
        self.claims
            .aud
            .as_ref()
            .and_then(Audience::primary)
            .filter(|s| !s.is_empty())
            .ok_or(ZkLoginError::MissingClaim { claim: "aud" })
    }

    /// `iss`, or `MissingClaim`.
    ///
    /// # Errors
    /// Returns `ZkLoginError::MissingClaim` if the token has no issuer.
    pub fn issuer(&self) -> Result<&str, ZkLoginError> {
        self.claims
            .iss
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ZkLoginError::MissingClaim { claim: "iss" })
    }
}

impl std::fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityToken")
            .field("claims", &self.claims)
            .finish_non_exhaustive()
    }
}

/// Builds an unsigned token carrying `claims`. Test and tooling helper.
#[must_use]
pub fn encode_unsigned(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT","kid":"test"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}
