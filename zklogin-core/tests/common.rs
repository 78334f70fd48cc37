#![allow(dead_code)]

//! Common test utilities shared across integration tests.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;
use zklogin_core::address::SuiAddress;
use zklogin_core::config::{Config, TransferConfig};
use zklogin_core::jwt::encode_unsigned;
use zklogin_core::ledger::{Ledger, TransactionBytes, TransactionDigest};
use zklogin_core::prover::{ProofRequest, Prover, ZkProof};
use zklogin_core::storage::StorageProvider;
use zklogin_core::{Phase, Session, ZkLoginResult};

pub const CLIENT_ID: &str = "client.apps.googleusercontent.com";
pub const REDIRECT_URI: &str = "http://localhost:5173";

pub fn config(prover_url: &str) -> Config {
    Config {
        client_id: CLIENT_ID.to_string(),
        redirect_uri: REDIRECT_URI.to_string(),
        authorization_endpoint: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
        fullnode_url: "http://fullnode.test".to_string(),
        prover_url: prover_url.to_string(),
        max_epoch_lookahead: 2,
        transfer: TransferConfig {
            recipient: "0xfa0f8542f256e669694624aa3ee7bfbde5af54641646a3a05924cf9e329a8a36"
                .parse()
                .expect("recipient"),
            amount_mist: 1_000_000_000,
        },
        gas_budget: 10_000_000,
        request_timeout_secs: Some(5),
    }
}

/// Prover answering with a fixed proof, optionally held until `gate` is notified.
#[derive(Default)]
pub struct StubProver {
    pub gate: Option<Arc<Notify>>,
    pub requests: Mutex<Vec<ProofRequest>>,
}

impl StubProver {
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("requests").len()
    }

    pub fn last_request(&self) -> ProofRequest {
        self.requests
            .lock()
            .expect("requests")
            .last()
            .cloned()
            .expect("a proof request")
    }
}

#[async_trait]
impl Prover for StubProver {
    async fn request_proof(&self, request: &ProofRequest) -> ZkLoginResult<ZkProof> {
        self.requests.lock().expect("requests").push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(sample_proof())
    }
}

pub fn sample_proof() -> ZkProof {
    ZkProof(
        json!({
            "proofPoints": { "a": ["1", "2"], "b": [["3"]], "c": ["4"] },
            "issBase64Details": { "value": "yJpc3MiOiJodHRwczovL2FjY291bnRzLmdvb2dsZS5jb20iLC", "indexMod4": 1 },
            "headerBase64": "eyJhbGciOiJSUzI1NiJ9",
        })
        .as_object()
        .expect("object")
        .clone(),
    )
}

/// Ledger at a settable epoch whose `execute` can be held until `gate` is notified.
pub struct StubLedger {
    pub epoch: AtomicU64,
    pub gate: Option<Arc<Notify>>,
    pub executed: AtomicU32,
    pub signatures: Mutex<Vec<String>>,
}

impl StubLedger {
    pub fn at_epoch(epoch: u64) -> Self {
        Self {
            epoch: AtomicU64::new(epoch),
            gate: None,
            executed: AtomicU32::new(0),
            signatures: Mutex::new(Vec::new()),
        }
    }

    pub fn gated(epoch: u64, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::at_epoch(epoch)
        }
    }

    pub fn set_epoch(&self, epoch: u64) {
        self.epoch.store(epoch, Ordering::SeqCst);
    }

    pub fn executions(&self) -> u32 {
        self.executed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Ledger for StubLedger {
    async fn current_epoch(&self) -> ZkLoginResult<u64> {
        Ok(self.epoch.load(Ordering::SeqCst))
    }

    async fn build_transfer(
        &self,
        _sender: &SuiAddress,
        _recipient: &SuiAddress,
        _amount: u64,
    ) -> ZkLoginResult<TransactionBytes> {
        Ok(TransactionBytes(vec![0, 1, 2, 3]))
    }

    async fn execute(
        &self,
        _transaction: &TransactionBytes,
        signature: &str,
    ) -> ZkLoginResult<TransactionDigest> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.executed.fetch_add(1, Ordering::SeqCst);
        self.signatures
            .lock()
            .expect("signatures")
            .push(signature.to_string());
        Ok(TransactionDigest(
            "8x2Q9ZbQxV4f1cX6YFJ3WmAvkFiAH1KiT8wLVhCVyR7D".to_string(),
        ))
    }
}

pub fn session(
    provider: &dyn StorageProvider,
    prover: Arc<dyn Prover>,
    ledger: Arc<dyn Ledger>,
) -> Session {
    Session::restore(config("http://prover.test/v1"), provider, prover, ledger).expect("session")
}

/// A Google-style identity token echoing `nonce`.
pub fn token_with_nonce(nonce: &str) -> String {
    encode_unsigned(&json!({
        "iss": "https://accounts.google.com",
        "aud": CLIENT_ID,
        "sub": "110463452167303598383",
        "nonce": nonce,
        "iat": 1_700_000_000,
        "exp": 1_700_003_600,
    }))
}

/// The location the identity provider redirects back to.
pub fn redirect_location(id_token: &str) -> String {
    format!("{REDIRECT_URI}/#id_token={id_token}&authuser=0&prompt=none")
}

/// Redirect for the session's current commitment.
pub fn redirect_for(session: &Session) -> String {
    let nonce = session.snapshot().nonce.expect("committed nonce");
    redirect_location(&token_with_nonce(&nonce))
}

pub async fn wait_for_phase(session: &Session, wanted: impl Fn(&Phase) -> bool) {
    let mut phases = session.subscribe();
    phases
        .wait_for(|phase| wanted(phase))
        .await
        .expect("phase channel open");
}
