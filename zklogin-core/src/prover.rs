//! Remote zero-knowledge prover.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::address::KEY_CLAIM_NAME;
use crate::error::ZkLoginError;
use crate::http_request::Request;
use crate::u256::U256Decimal;

/// Everything a proof is bound to. Changing any field voids the proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofRequest {
    /// Raw identity token.
    pub jwt: String,
    /// Base64 `flag || public key` of the ephemeral key.
    pub extended_ephemeral_public_key: String,
    /// Epoch bound committed in the nonce.
    pub max_epoch: u64,
    /// Randomness committed in the nonce.
    pub jwt_randomness: U256Decimal,
    /// User salt.
    pub salt: U256Decimal,
    /// Claim the address is keyed on.
    pub key_claim_name: &'static str,
}

impl ProofRequest {
    /// Assembles a request keyed on the `sub` claim.
    #[must_use]
    pub fn new(
        jwt: String,
        extended_ephemeral_public_key: String,
        max_epoch: u64,
        jwt_randomness: U256Decimal,
        salt: U256Decimal,
    ) -> Self {
        Self {
            jwt,
            extended_ephemeral_public_key,
            max_epoch,
            jwt_randomness,
            salt,
            key_claim_name: KEY_CLAIM_NAME,
        }
    }

    /// SHA-256 over the five binding inputs, used to detect stale proofs.
    #[must_use]
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for field in [self.jwt.as_bytes(), self.extended_ephemeral_public_key.as_bytes()] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field);
        }
        hasher.update(self.max_epoch.to_be_bytes());
        hasher.update(self.jwt_randomness.to_be_bytes());
        hasher.update(self.salt.to_be_bytes());
        hasher.finalize().into()
    }
}

/// Opaque proof object, passed through exactly as the prover returned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZkProof(pub serde_json::Map<String, serde_json::Value>);

/// A service that turns a [`ProofRequest`] into a [`ZkProof`].
#[async_trait]
pub trait Prover: Send + Sync {
    /// Requests one proof. Implementations must not retry on their own.
    ///
    /// # Errors
    /// `ZkLoginError::ProverUnavailable` on a non-success response, `NetworkError` on transport
    /// failures, `SerializationError` when the body is not a JSON object.
    async fn request_proof(&self, request: &ProofRequest) -> Result<ZkProof, ZkLoginError>;
}

/// Prover reached over HTTP with a JSON `POST`.
#[derive(Debug, Clone)]
pub struct HttpProver {
    url: String,
    request: Request,
}

impl HttpProver {
    /// Creates a prover client for `url`.
    #[must_use]
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            url: url.into(),
            request: Request::new(timeout),
        }
    }

    /// Endpoint this client posts to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Prover for HttpProver {
    async fn request_proof(&self, request: &ProofRequest) -> Result<ZkProof, ZkLoginError> {
        log::debug!(
            "requesting zkLogin proof from {} for max epoch {}",
            self.url,
            request.max_epoch
        );
        let response = self
            .request
            .handle(self.request.post(&self.url).json(request))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = describe_body(response.text().await);
            log::warn!("prover answered {status}");
            return Err(ZkLoginError::ProverUnavailable {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                body,
            });
        }

        let body = response.text().await?;
        let proof = serde_json::from_str::<ZkProof>(&body).map_err(|e| {
            ZkLoginError::SerializationError {
                error: format!("prover response is not a JSON object: {e}"),
            }
        })?;
        Ok(proof)
    }
}

/// The response body, or why it could not be read.
fn describe_body<E: std::fmt::Display>(body: Result<String, E>) -> String {
    body.unwrap_or_else(|err| {
        log::warn!("failed to read prover response body: {err}");
        format!("<unreadable body: {err}>")
    })
}
