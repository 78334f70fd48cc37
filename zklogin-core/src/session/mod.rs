//! The zkLogin session state machine.
//!
//! A [`Session`] owns the in-memory view of one login and mirrors every durable fact into the
//! host's [`StorageProvider`]. Methods take `&self`; share the session behind an `Arc` and call it
//! from anywhere. At most one external call (epoch read, proof, submission) is outstanding at a
//! time, and a [`Session::reset`] issued while one is in flight causes its result to be dropped.

mod persist;
mod phase;
mod state;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use url::Url;

pub use phase::Phase;

use self::persist::SessionStorage;
use self::state::{BoundProof, Commitment, SessionState};
use crate::address::{derive_address, SuiAddress};
use crate::config::Config;
use crate::ephemeral::EphemeralKeyPair;
use crate::error::{ZkLoginError, ZkLoginResult};
use crate::jwt::{Claims, IdentityToken};
use crate::ledger::{JsonRpcLedger, Ledger, TransactionDigest};
use crate::nonce::{bind_nonce, generate_randomness};
use crate::prover::{HttpProver, Prover, ZkProof};
use crate::redirect::{build_authorization_url, parse_returned_token};
use crate::storage::StorageProvider;
use crate::transaction::{ComposeRequest, TransactionComposer};
use crate::u256::U256Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outstanding {
    Commitment,
    Proof,
    Submission,
}

struct Inner {
    state: SessionState,
    phase: Phase,
    outstanding: Option<Outstanding>,
    /// Bumped whenever the session is reset or recommitted. Results of calls issued under an
    /// older generation are discarded.
    generation: u64,
}

/// Read-only view of a session for display and debugging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Current phase.
    pub phase: Phase,
    /// Derived zkLogin address.
    pub address: Option<SuiAddress>,
    /// Nonce sent to the identity provider.
    pub nonce: Option<String>,
    /// Epoch bound committed in the nonce.
    pub max_epoch: Option<u64>,
    /// Base64 `flag || public key` of the ephemeral key.
    pub extended_public_key: Option<String>,
    /// Randomness committed in the nonce.
    pub randomness: Option<U256Decimal>,
    /// User salt.
    pub salt: Option<U256Decimal>,
    /// Decoded identity token claims.
    pub claims: Option<Claims>,
    /// Proof held for the current inputs.
    pub proof: Option<ZkProof>,
    /// Digest of the executed transfer.
    pub digest: Option<TransactionDigest>,
}

/// Everything one submission needs, captured so the lock is not held across the ledger calls.
struct SubmitInputs {
    sender: SuiAddress,
    keypair: EphemeralKeyPair,
    proof: ZkProof,
    token: IdentityToken,
    salt: U256Decimal,
    max_epoch: u64,
}

impl SubmitInputs {
    fn capture(state: &SessionState) -> Option<Self> {
        let commitment = state.commitment.as_ref()?;
        Some(Self {
            sender: state.address?,
            keypair: commitment.keypair.clone(),
            proof: state.current_proof()?.clone(),
            token: state.token.clone()?,
            salt: state.salt?,
            max_epoch: commitment.max_epoch,
        })
    }

    const fn request(&self) -> ComposeRequest<'_> {
        ComposeRequest {
            sender: &self.sender,
            keypair: &self.keypair,
            proof: &self.proof,
            token: &self.token,
            salt: &self.salt,
            max_epoch: self.max_epoch,
        }
    }
}

/// A zkLogin session.
pub struct Session {
    config: Config,
    storage: SessionStorage,
    prover: Arc<dyn Prover>,
    ledger: Arc<dyn Ledger>,
    composer: TransactionComposer,
    inner: Mutex<Inner>,
    phase_tx: watch::Sender<Phase>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Rebuilds a session from whatever `provider` holds.
    ///
    /// Corrupt volatile values are dropped, which sends the user back to a fresh login. An
    /// unparseable durable value clears everything. A restored token resumes in
    /// [`Phase::TokenReceived`]; a restored commitment without a token resumes in
    /// [`Phase::AwaitingToken`].
    ///
    /// # Errors
    /// Returns `InvalidInput` for an invalid `config` and `Storage` if the stores cannot be read.
    pub fn restore(
        config: Config,
        provider: &dyn StorageProvider,
        prover: Arc<dyn Prover>,
        ledger: Arc<dyn Ledger>,
    ) -> ZkLoginResult<Self> {
        config.validate()?;
        let storage = SessionStorage::new(provider);
        let state = storage.load()?;

        let phase = if state.token.is_some() {
            Phase::TokenReceived
        } else if state.commitment.is_some() {
            Phase::AwaitingToken
        } else {
            Phase::Anonymous
        };
        log::info!("restored zkLogin session in phase {phase}");

        let composer = TransactionComposer::new(Arc::clone(&ledger), config.transfer.clone());
        let (phase_tx, _) = watch::channel(phase.clone());
        Ok(Self {
            config,
            storage,
            prover,
            ledger,
            composer,
            inner: Mutex::new(Inner {
                state,
                phase,
                outstanding: None,
                generation: 0,
            }),
            phase_tx,
        })
    }

    /// [`Self::restore`] with the HTTP prover and JSON-RPC ledger named in `config`.
    ///
    /// # Errors
    /// See [`Self::restore`].
    pub fn connect(config: Config, provider: &dyn StorageProvider) -> ZkLoginResult<Self> {
        let timeout = config.request_timeout();
        let prover = Arc::new(HttpProver::new(config.prover_url.clone(), timeout));
        let ledger = Arc::new(JsonRpcLedger::new(
            config.fullnode_url.clone(),
            config.gas_budget,
            timeout,
        ));
        Self::restore(config, provider, prover, ledger)
    }

    /// Configuration the session was built with.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.lock().phase.clone()
    }

    /// Receives every phase change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase_tx.subscribe()
    }

    /// Everything the session currently knows.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        let state = &inner.state;
        let commitment = state.commitment.as_ref();
        SessionSnapshot {
            phase: inner.phase.clone(),
            address: state.address,
            nonce: commitment.map(|c| c.nonce.as_str().to_string()),
            max_epoch: commitment.map(|c| c.max_epoch),
            extended_public_key: commitment.map(|c| c.keypair.public_key().extended()),
            randomness: commitment.map(|c| c.randomness),
            salt: state.salt,
            claims: state.token.as_ref().map(|t| t.claims().clone()),
            proof: state.current_proof().cloned(),
            digest: state.digest.clone(),
        }
    }

    /// Starts a login: commits to a fresh ephemeral key and returns the identity provider URL
    /// to send the user to.
    ///
    /// The commitment (key, randomness, epoch bound, nonce) is persisted in a single write
    /// before the URL is returned. Any previously accepted token, address and proof are dropped;
    /// the salt is kept, or generated if the user has none.
    ///
    /// # Errors
    /// - `TransitionInFlight` while another call is outstanding.
    /// - `Superseded` if the session was reset during the epoch read.
    /// - Ledger or storage failures, which also move the session to [`Phase::Error`].
    pub async fn begin_login(&self) -> ZkLoginResult<Url> {
        let generation = {
            let mut inner = self.lock();
            if inner.outstanding.is_some() {
                return Err(ZkLoginError::TransitionInFlight);
            }
            inner.outstanding = Some(Outstanding::Commitment);
            inner.generation += 1;
            inner.generation
        };

        let epoch = self.ledger.current_epoch().await;

        let mut inner = self.lock();
        if inner.generation != generation {
            log::info!("discarding epoch read issued before a reset");
            return Err(ZkLoginError::Superseded);
        }
        inner.outstanding = None;
        match epoch.and_then(|epoch| self.commit(&mut inner, epoch)) {
            Ok(url) => Ok(url),
            Err(err) => self.fail(&mut inner, err),
        }
    }

    fn commit(&self, inner: &mut Inner, current_epoch: u64) -> ZkLoginResult<Url> {
        let max_epoch = current_epoch
            .checked_add(self.config.max_epoch_lookahead)
            .ok_or_else(|| ZkLoginError::InvalidInput {
                attribute: "max_epoch_lookahead".to_string(),
                reason: format!("epoch {current_epoch} plus lookahead overflows"),
            })?;
        let keypair = EphemeralKeyPair::generate();
        let randomness = generate_randomness();
        let nonce = bind_nonce(&keypair.public_key(), max_epoch, &randomness);
        let url = build_authorization_url(
            &self.config.authorization_endpoint,
            &self.config.client_id,
            &self.config.redirect_uri,
            &nonce,
        )?;

        if inner.state.salt.is_none() {
            let salt = U256Decimal::random_128();
            self.storage.save_salt(&salt)?;
            inner.state.salt = Some(salt);
        }

        self.storage.clear_identity()?;
        inner.state.token = None;
        inner.state.address = None;
        inner.state.proof = None;
        inner.state.digest = None;

        let commitment = Commitment {
            keypair,
            randomness,
            max_epoch,
            nonce,
        };
        self.storage.save_commitment(&commitment)?;
        inner.state.commitment = Some(commitment);
        self.transition(inner, Phase::KeyCommitted);

        log::info!("committed ephemeral key until epoch {max_epoch}");
        self.transition(inner, Phase::AwaitingToken);
        Ok(url)
    }

    /// Handles the location the identity provider redirected back to.
    ///
    /// Returns the location with the token fragment stripped when a token was found and
    /// accepted, `None` when the location carries no token. Either way the session then
    /// advances as far as its inputs allow; failures past token acceptance are reported through
    /// [`Phase::Error`].
    ///
    /// A token arriving after one was already accepted for the same commitment is ignored.
    ///
    /// # Errors
    /// - `CommitmentLost` if the committed values did not survive the redirect.
    /// - `NonceMismatch` if the token was not issued for this session's commitment.
    /// - `InvalidToken` if the token cannot be decoded.
    /// - `TransitionInFlight` while another call is outstanding.
    pub async fn handle_redirect(&self, location: &str) -> ZkLoginResult<Option<String>> {
        let returned = parse_returned_token(location);
        if let Some(returned) = &returned {
            self.accept_token(&returned.id_token)?;
        }
        if let Err(err) = self.advance().await {
            log::debug!("session did not advance after redirect: {err}");
        }
        Ok(returned.map(|r| r.cleaned_location))
    }

    fn accept_token(&self, raw: &str) -> ZkLoginResult<()> {
        let mut inner = self.lock();
        if inner.outstanding.is_some() {
            return Err(ZkLoginError::TransitionInFlight);
        }

        let token = match IdentityToken::parse(raw) {
            Ok(token) => token,
            Err(err) => return self.fail(&mut inner, err),
        };
        let Some(expected) = inner.state.commitment.as_ref().map(|c| c.nonce.clone()) else {
            return self.lose_commitment(&mut inner);
        };
        if let Some(held) = &inner.state.token {
            if held.raw() != token.raw() {
                log::warn!("ignoring identity token: this commitment was already used");
            }
            return Ok(());
        }

        let echoed = token.claims().nonce.as_deref().unwrap_or_default();
        if !expected.matches(echoed) {
            return self.fail(&mut inner, ZkLoginError::NonceMismatch);
        }
        if let Err(err) = self.storage.save_token(&token) {
            return self.fail(&mut inner, err);
        }
        inner.state.token = Some(token);
        inner.state.proof = None;
        inner.state.digest = None;
        self.transition(&mut inner, Phase::TokenReceived);
        Ok(())
    }

    fn lose_commitment<T>(&self, inner: &mut Inner) -> ZkLoginResult<T> {
        if let Err(err) = self
            .storage
            .clear_commitment()
            .and_then(|()| self.storage.clear_identity())
        {
            log::warn!("failed to clear state after losing the commitment: {err}");
        }
        inner.state = SessionState {
            salt: inner.state.salt,
            ..SessionState::default()
        };
        self.fail(inner, ZkLoginError::CommitmentLost)
    }

    /// Moves the session forward from [`Phase::TokenReceived`], or retries from
    /// [`Phase::Error`] when a token is held but no valid proof is: derives the address and
    /// requests a proof. Any other phase is returned unchanged.
    ///
    /// With partial inputs, for example a token restored without its commitment, the session
    /// stays where it is.
    ///
    /// The ledger epoch is read first; once it has passed the committed bound no proof is
    /// requested.
    ///
    /// # Errors
    /// - `MissingClaim` if the token cannot key an address.
    /// - `SessionExpired` if the committed epoch bound has passed.
    /// - Prover failures, including `ProverUnavailable` with the status and body.
    /// - `Superseded` if the session was reset while the proof was outstanding.
    pub async fn advance(&self) -> ZkLoginResult<Phase> {
        let (request, fingerprint, generation) = {
            let mut inner = self.lock();
            if inner.outstanding.is_some() {
                return Ok(inner.phase.clone());
            }
            let retrying = matches!(inner.phase, Phase::Error { .. })
                && inner.state.token.is_some()
                && inner.state.current_proof().is_none();
            if inner.phase != Phase::TokenReceived && !retrying {
                return Ok(inner.phase.clone());
            }
            let Some(request) = inner.state.proof_request() else {
                log::info!("identity token held without its commitment or salt; waiting");
                return Ok(inner.phase.clone());
            };
            if let Err(err) = self.reconcile_address(&mut inner) {
                return self.fail(&mut inner, err);
            }

            inner.outstanding = Some(Outstanding::Proof);
            self.transition(&mut inner, Phase::ProofRequested);
            let fingerprint = request.fingerprint();
            (request, fingerprint, inner.generation)
        };

        let epoch = self.ledger.current_epoch().await;
        {
            let mut inner = self.lock();
            if inner.generation != generation {
                log::info!("discarding epoch read issued before a reset");
                return Err(ZkLoginError::Superseded);
            }
            let expired = match epoch {
                Ok(current_epoch) if current_epoch > request.max_epoch => {
                    Some(ZkLoginError::SessionExpired {
                        max_epoch: request.max_epoch,
                        current_epoch,
                    })
                }
                Ok(_) => None,
                Err(err) => Some(err),
            };
            if let Some(err) = expired {
                inner.outstanding = None;
                return self.fail(&mut inner, err);
            }
        }

        log::info!("requesting proof for max epoch {}", request.max_epoch);
        let result = self.prover.request_proof(&request).await;

        let mut inner = self.lock();
        if inner.generation != generation {
            log::info!("discarding proof issued before a reset");
            return Err(ZkLoginError::Superseded);
        }
        inner.outstanding = None;
        let proof = match result {
            Ok(proof) => proof,
            Err(err) => return self.fail(&mut inner, err),
        };
        if inner.state.proof_request().map(|r| r.fingerprint()) != Some(fingerprint) {
            return self.fail(&mut inner, ZkLoginError::StaleProof);
        }
        inner.state.proof = Some(BoundProof { proof, fingerprint });
        self.transition(&mut inner, Phase::Ready);
        Ok(Phase::Ready)
    }

    /// Derives the address and persists it if it differs from the stored one.
    fn reconcile_address(&self, inner: &mut Inner) -> ZkLoginResult<()> {
        let (Some(token), Some(salt)) = (&inner.state.token, inner.state.salt) else {
            return Ok(());
        };
        let derived = derive_address(token, &salt)?;
        match inner.state.address {
            Some(stored) if stored == derived => return Ok(()),
            Some(stored) => {
                log::warn!("stored address {stored} does not match derived {derived}; replacing it");
            }
            None => log::info!("derived zkLogin address {derived}"),
        }
        self.storage.save_address(&derived)?;
        inner.state.address = Some(derived);
        Ok(())
    }

    /// Builds, signs and submits the configured transfer.
    ///
    /// Returns `None` without doing anything when a submission is already outstanding.
    ///
    /// # Errors
    /// - `NotReady` unless the session is [`Phase::Ready`], or [`Phase::Error`] with a proof.
    /// - `StaleProof` if the held proof no longer matches its inputs; the proof is discarded.
    /// - `SessionExpired` if the committed epoch bound has passed.
    /// - `Submission` and transport failures from the ledger.
    pub async fn submit(&self) -> ZkLoginResult<Option<TransactionDigest>> {
        let (inputs, generation) = {
            let mut inner = self.lock();
            match inner.outstanding {
                Some(Outstanding::Submission) => return Ok(None),
                Some(_) => return Err(ZkLoginError::TransitionInFlight),
                None => {}
            }
            let eligible = inner.phase == Phase::Ready
                || (matches!(inner.phase, Phase::Error { .. }) && inner.state.proof.is_some());
            if !eligible {
                return Err(ZkLoginError::NotReady {
                    phase: inner.phase.name().to_string(),
                });
            }
            if inner.state.current_proof().is_none() {
                inner.state.proof = None;
                return self.fail(&mut inner, ZkLoginError::StaleProof);
            }
            if let Err(err) = self.reconcile_address(&mut inner) {
                return self.fail(&mut inner, err);
            }
            let Some(inputs) = SubmitInputs::capture(&inner.state) else {
                return Err(ZkLoginError::NotReady {
                    phase: inner.phase.name().to_string(),
                });
            };

            inner.outstanding = Some(Outstanding::Submission);
            self.transition(&mut inner, Phase::Submitting);
            (inputs, inner.generation)
        };

        let result = self.composer.compose_and_submit(inputs.request()).await;

        let mut inner = self.lock();
        if inner.generation != generation {
            return Err(ZkLoginError::Superseded);
        }
        inner.outstanding = None;
        match result {
            Ok(digest) => {
                inner.state.digest = Some(digest.clone());
                self.transition(
                    &mut inner,
                    Phase::Complete {
                        digest: digest.clone(),
                    },
                );
                Ok(Some(digest))
            }
            Err(err) => self.fail(&mut inner, err),
        }
    }

    /// Replaces the user salt, for example with one recovered from a salt service.
    ///
    /// The address and any held proof depend on the salt and are dropped. A session past
    /// token acceptance returns to [`Phase::TokenReceived`] so [`Self::advance`] can re-prove.
    ///
    /// # Errors
    /// `TransitionInFlight` while a call is outstanding, or a storage failure.
    pub fn import_salt(&self, salt: U256Decimal) -> ZkLoginResult<()> {
        let mut inner = self.lock();
        if inner.outstanding.is_some() {
            return Err(ZkLoginError::TransitionInFlight);
        }
        if inner.state.salt == Some(salt) {
            return Ok(());
        }
        if let Err(err) = self
            .storage
            .save_salt(&salt)
            .and_then(|()| self.storage.clear_address())
        {
            return self.fail(&mut inner, err);
        }

        inner.state.salt = Some(salt);
        inner.state.address = None;
        if inner.state.proof.take().is_some() {
            log::info!("salt replaced; discarding the held proof");
        }
        if inner.state.token.is_some() && matches!(inner.phase, Phase::Ready | Phase::Error { .. })
        {
            self.transition(&mut inner, Phase::TokenReceived);
        }
        Ok(())
    }

    /// Clears every persisted and in-memory value and returns to [`Phase::Anonymous`].
    /// Idempotent. An outstanding proof or epoch read is abandoned and its result dropped.
    ///
    /// # Errors
    /// `TransitionInFlight` during a submission, or a storage failure.
    pub fn reset(&self) -> ZkLoginResult<()> {
        let mut inner = self.lock();
        if inner.outstanding == Some(Outstanding::Submission) {
            return Err(ZkLoginError::TransitionInFlight);
        }
        inner.state = SessionState::default();
        inner.outstanding = None;
        inner.generation += 1;

        if let Err(err) = self.storage.clear_all() {
            return self.fail(&mut inner, err);
        }
        self.transition(&mut inner, Phase::Anonymous);
        log::info!("zkLogin session reset");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, inner: &mut Inner, phase: Phase) {
        log::debug!("zkLogin phase {} -> {phase}", inner.phase);
        inner.phase = phase.clone();
        self.phase_tx.send_replace(phase);
    }

    fn fail<T>(&self, inner: &mut Inner, error: ZkLoginError) -> ZkLoginResult<T> {
        log::warn!("zkLogin transition failed: {error}");
        self.transition(
            inner,
            Phase::Error {
                cause: error.to_string(),
            },
        );
        Err(error)
    }
}
