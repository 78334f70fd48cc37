//! Composing and submitting a zkLogin-authorized transfer.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::address::{address_seed_for_token, SuiAddress, ZKLOGIN_FLAG};
use crate::config::TransferConfig;
use crate::ephemeral::{EphemeralKeyPair, UserSignature};
use crate::error::ZkLoginError;
use crate::jwt::IdentityToken;
use crate::ledger::{Ledger, TransactionBytes, TransactionDigest};
use crate::prover::ZkProof;
use crate::u256::U256Decimal;

/// Intent prefix for user transaction data: scope, version, app id.
const TRANSACTION_INTENT: [u8; 3] = [0, 0, 0];

/// Digest the ephemeral key signs for `transaction`.
#[must_use]
pub fn signing_digest(transaction: &TransactionBytes) -> [u8; 32] {
    Sha256::new()
        .chain_update(TRANSACTION_INTENT)
        .chain_update(&transaction.0)
        .finalize()
        .into()
}

/// Composite authorization: proof, address seed, epoch bound and the ephemeral signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkLoginSignature {
    /// Prover output extended with `addressSeed`.
    pub inputs: serde_json::Map<String, serde_json::Value>,
    /// Epoch bound committed in the nonce.
    pub max_epoch: u64,
    /// Base64 ephemeral signature.
    pub user_signature: String,
}

impl ZkLoginSignature {
    /// Merges the pieces. `addressSeed` overrides any field of the same name in `proof`.
    #[must_use]
    pub fn new(
        proof: &ZkProof,
        address_seed: &U256Decimal,
        max_epoch: u64,
        user_signature: &UserSignature,
    ) -> Self {
        let mut inputs = proof.0.clone();
        inputs.insert(
            "addressSeed".to_string(),
            serde_json::Value::String(address_seed.to_decimal_string()),
        );
        Self {
            inputs,
            max_epoch,
            user_signature: user_signature.to_base64(),
        }
    }

    /// `flag || body`, base64 encoded, as submitted alongside the transaction.
    ///
    /// # Errors
    /// Returns `ZkLoginError::SerializationError` if the inputs cannot be serialized.
    pub fn serialize(&self) -> Result<String, ZkLoginError> {
        let mut bytes = vec![ZKLOGIN_FLAG];
        serde_json::to_writer(&mut bytes, self)?;
        Ok(STANDARD.encode(bytes))
    }
}

/// What a single submission consumes.
#[derive(Debug, Clone, Copy)]
pub struct ComposeRequest<'a> {
    /// zkLogin address paying for and sending the transfer.
    pub sender: &'a SuiAddress,
    /// Ephemeral key committed in the token's nonce.
    pub keypair: &'a EphemeralKeyPair,
    /// Proof for this session's inputs.
    pub proof: &'a ZkProof,
    /// Identity token the proof was made for.
    pub token: &'a IdentityToken,
    /// User salt.
    pub salt: &'a U256Decimal,
    /// Epoch bound committed in the nonce.
    pub max_epoch: u64,
}

/// Builds, signs and submits the configured transfer.
#[derive(Clone)]
pub struct TransactionComposer {
    ledger: Arc<dyn Ledger>,
    transfer: TransferConfig,
}

impl TransactionComposer {
    /// Creates a composer submitting `transfer` through `ledger`.
    #[must_use]
    pub fn new(ledger: Arc<dyn Ledger>, transfer: TransferConfig) -> Self {
        Self { ledger, transfer }
    }

    /// Runs the whole pipeline. Nothing is retained on failure.
    ///
    /// # Errors
    /// - `MissingClaim` if the token lacks `sub` or `aud`; nothing is sent to the ledger.
    /// - `SessionExpired` if the ledger has moved past `max_epoch`.
    /// - `Submission` if the ledger rejects the transaction.
    /// - Transport errors from the ledger.
    pub async fn compose_and_submit(
        &self,
        request: ComposeRequest<'_>,
    ) -> Result<TransactionDigest, ZkLoginError> {
        let seed = address_seed_for_token(request.token, request.salt)?;

        let current_epoch = self.ledger.current_epoch().await?;
        if current_epoch > request.max_epoch {
            return Err(ZkLoginError::SessionExpired {
                max_epoch: request.max_epoch,
                current_epoch,
            });
        }

        let transaction = self
            .ledger
            .build_transfer(
                request.sender,
                &self.transfer.recipient,
                self.transfer.amount_mist,
            )
            .await?;
        let user_signature = request.keypair.sign(&signing_digest(&transaction));
        let signature =
            ZkLoginSignature::new(request.proof, &seed, request.max_epoch, &user_signature)
                .serialize()?;

        log::info!(
            "submitting transfer of {} MIST from {} to {}",
            self.transfer.amount_mist,
            request.sender,
            self.transfer.recipient
        );
        let digest = self.ledger.execute(&transaction, &signature).await?;
        log::info!("transaction {digest} executed");
        Ok(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::encode_unsigned;
    use async_trait::async_trait;
    use ruint::aliases::U256;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLedger {
        epoch: u64,
        reject: Option<String>,
        executed: Mutex<Vec<String>>,
        built: Mutex<u32>,
    }

    #[async_trait]
    impl Ledger for RecordingLedger {
        async fn current_epoch(&self) -> Result<u64, ZkLoginError> {
            Ok(self.epoch)
        }

        async fn build_transfer(
            &self,
            _sender: &SuiAddress,
            _recipient: &SuiAddress,
            _amount: u64,
        ) -> Result<TransactionBytes, ZkLoginError> {
            *self.built.lock().unwrap() += 1;
            Ok(TransactionBytes(vec![9, 9, 9]))
        }

        async fn execute(
            &self,
            _transaction: &TransactionBytes,
            signature: &str,
        ) -> Result<TransactionDigest, ZkLoginError> {
            if let Some(reason) = &self.reject {
                return Err(ZkLoginError::Submission {
                    reason: reason.clone(),
                });
            }
            self.executed.lock().unwrap().push(signature.to_string());
            Ok(TransactionDigest("digest-1".to_string()))
        }
    }

    fn proof() -> ZkProof {
        ZkProof(
            json!({ "proofPoints": { "a": ["1"] }, "headerBase64": "h" })
                .as_object()
                .unwrap()
                .clone(),
        )
    }

    fn token(claims: &serde_json::Value) -> IdentityToken {
        IdentityToken::parse(&encode_unsigned(claims)).unwrap()
    }

    fn transfer() -> TransferConfig {
        TransferConfig {
            recipient: "0x2".parse().unwrap(),
            amount_mist: 1_000,
        }
    }

    #[tokio::test]
    async fn test_submission_carries_composite_signature() {
        let ledger = Arc::new(RecordingLedger {
            epoch: 10,
            ..Default::default()
        });
        let composer = TransactionComposer::new(ledger.clone(), transfer());
        let keypair = EphemeralKeyPair::from_secret_bytes(&[3u8; 32]);
        let token = token(&json!({ "iss": "https://accounts.google.com", "sub": "s", "aud": "a" }));
        let salt = U256Decimal(U256::from(5));

        let digest = composer
            .compose_and_submit(ComposeRequest {
                sender: &"0x1".parse().unwrap(),
                keypair: &keypair,
                proof: &proof(),
                token: &token,
                salt: &salt,
                max_epoch: 12,
            })
            .await
            .unwrap();
        assert_eq!(digest.0, "digest-1");

        let executed = ledger.executed.lock().unwrap();
        let bytes = STANDARD.decode(&executed[0]).unwrap();
        assert_eq!(bytes[0], ZKLOGIN_FLAG);
        let body: serde_json::Value = serde_json::from_slice(&bytes[1..]).unwrap();
        assert_eq!(body["maxEpoch"], json!(12));
        assert_eq!(body["inputs"]["headerBase64"], json!("h"));
        assert_eq!(
            body["inputs"]["addressSeed"],
            json!(address_seed_for_token(&token, &salt).unwrap().to_decimal_string())
        );

        let user_signature = STANDARD
            .decode(body["userSignature"].as_str().unwrap())
            .unwrap();
        let raw: [u8; 64] = user_signature[1..65].try_into().unwrap();
        assert!(keypair.public_key().verify(
            &signing_digest(&TransactionBytes(vec![9, 9, 9])),
            &ed25519_dalek::Signature::from_bytes(&raw)
        ));
    }

    #[tokio::test]
    async fn test_missing_subject_never_reaches_the_ledger() {
        let ledger = Arc::new(RecordingLedger {
            epoch: 10,
            ..Default::default()
        });
        let composer = TransactionComposer::new(ledger.clone(), transfer());
        let token = token(&json!({ "iss": "https://accounts.google.com", "aud": "a" }));

        let err = composer
            .compose_and_submit(ComposeRequest {
                sender: &"0x1".parse().unwrap(),
                keypair: &EphemeralKeyPair::generate(),
                proof: &proof(),
                token: &token,
                salt: &U256Decimal(U256::from(5)),
                max_epoch: 12,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ZkLoginError::MissingClaim { claim: "sub" }));
        assert_eq!(*ledger.built.lock().unwrap(), 0);
        assert!(ledger.executed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_session_is_refused() {
        let ledger = Arc::new(RecordingLedger {
            epoch: 13,
            ..Default::default()
        });
        let composer = TransactionComposer::new(ledger.clone(), transfer());
        let token = token(&json!({ "iss": "i", "sub": "s", "aud": "a" }));

        let err = composer
            .compose_and_submit(ComposeRequest {
                sender: &"0x1".parse().unwrap(),
                keypair: &EphemeralKeyPair::generate(),
                proof: &proof(),
                token: &token,
                salt: &U256Decimal(U256::from(5)),
                max_epoch: 12,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ZkLoginError::SessionExpired {
                max_epoch: 12,
                current_epoch: 13
            }
        ));
        assert_eq!(*ledger.built.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejection_reason_is_propagated() {
        let ledger = Arc::new(RecordingLedger {
            epoch: 10,
            reject: Some("InsufficientGas".to_string()),
            ..Default::default()
        });
        let composer = TransactionComposer::new(ledger, transfer());
        let token = token(&json!({ "iss": "i", "sub": "s", "aud": "a" }));

        let err = composer
            .compose_and_submit(ComposeRequest {
                sender: &"0x1".parse().unwrap(),
                keypair: &EphemeralKeyPair::generate(),
                proof: &proof(),
                token: &token,
                salt: &U256Decimal(U256::from(5)),
                max_epoch: 12,
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "submission_error: InsufficientGas");
    }

    #[test]
    fn test_address_seed_overrides_proof_field() {
        let mut proof = proof();
        proof
            .0
            .insert("addressSeed".to_string(), json!("stale"));
        let signature = ZkLoginSignature::new(
            &proof,
            &U256Decimal(U256::from(77)),
            3,
            &EphemeralKeyPair::generate().sign(b"m"),
        );
        assert_eq!(signature.inputs["addressSeed"], json!("77"));
    }
}
