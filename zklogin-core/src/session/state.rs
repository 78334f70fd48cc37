use crate::address::SuiAddress;
use crate::ephemeral::EphemeralKeyPair;
use crate::jwt::IdentityToken;
use crate::ledger::TransactionDigest;
use crate::nonce::Nonce;
use crate::prover::{ProofRequest, ZkProof};
use crate::u256::U256Decimal;

/// Values fixed when a login commits to an ephemeral key. Present all together or not at all.
#[derive(Debug, Clone)]
pub(crate) struct Commitment {
    pub(crate) keypair: EphemeralKeyPair,
    pub(crate) randomness: U256Decimal,
    pub(crate) max_epoch: u64,
    pub(crate) nonce: Nonce,
}

/// A proof together with the fingerprint of the inputs it was produced for.
#[derive(Debug, Clone)]
pub(crate) struct BoundProof {
    pub(crate) proof: ZkProof,
    pub(crate) fingerprint: [u8; 32],
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SessionState {
    pub(crate) commitment: Option<Commitment>,
    pub(crate) salt: Option<U256Decimal>,
    pub(crate) token: Option<IdentityToken>,
    pub(crate) address: Option<SuiAddress>,
    pub(crate) proof: Option<BoundProof>,
    pub(crate) digest: Option<TransactionDigest>,
}

impl SessionState {
    /// The prover inputs, once all of them are known.
    pub(crate) fn proof_request(&self) -> Option<ProofRequest> {
        let commitment = self.commitment.as_ref()?;
        let token = self.token.as_ref()?;
        let salt = self.salt?;
        Some(ProofRequest::new(
            token.raw().to_string(),
            commitment.keypair.public_key().extended(),
            commitment.max_epoch,
            commitment.randomness,
            salt,
        ))
    }

    /// The held proof, if it still matches the current inputs.
    pub(crate) fn current_proof(&self) -> Option<&ZkProof> {
        let bound = self.proof.as_ref()?;
        let request = self.proof_request()?;
        (bound.fingerprint == request.fingerprint()).then_some(&bound.proof)
    }
}
