//! Mapping between [`SessionState`] and the two storage scopes.

use std::sync::Arc;

use secrecy::ExposeSecret;

use super::state::{Commitment, SessionState};
use crate::address::SuiAddress;
use crate::ephemeral::EphemeralKeyPair;
use crate::error::{ZkLoginError, ZkLoginResult};
use crate::jwt::IdentityToken;
use crate::nonce::Nonce;
use crate::storage::{KeyValueStore, Scope, StorageError, StorageKey, StorageProvider};
use crate::u256::U256Decimal;

pub(crate) struct SessionStorage {
    volatile: Arc<dyn KeyValueStore>,
    durable: Arc<dyn KeyValueStore>,
}

impl SessionStorage {
    pub(crate) fn new(provider: &dyn StorageProvider) -> Self {
        Self {
            volatile: provider.volatile(),
            durable: provider.durable(),
        }
    }

    fn store(&self, key: StorageKey) -> &dyn KeyValueStore {
        self.scope(key.scope())
    }

    fn scope(&self, scope: Scope) -> &dyn KeyValueStore {
        match scope {
            Scope::Volatile => self.volatile.as_ref(),
            Scope::Durable => self.durable.as_ref(),
        }
    }

    /// Reads one value. A store whose content cannot be parsed reports the key as corrupt.
    fn read(&self, key: StorageKey) -> ZkLoginResult<Option<String>> {
        match self.store(key).get(key.name()) {
            Ok(value) => Ok(value.filter(|value| !value.trim().is_empty())),
            Err(StorageError::Serialization(reason)) => Err(ZkLoginError::StorageCorruption {
                key: key.name(),
                reason,
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Removes `names` from `scope`, emptying the whole store if it is unreadable.
    fn discard(&self, scope: Scope, names: &[&str]) -> ZkLoginResult<()> {
        let store = self.scope(scope);
        match store.remove(names) {
            Err(StorageError::Serialization(reason)) => {
                log::warn!("{scope} store is unreadable ({reason}); clearing it");
                store.clear()?;
                Ok(())
            }
            other => Ok(other?),
        }
    }

    /// Loads everything persisted.
    ///
    /// Unusable volatile values drop the whole commitment. An unparseable durable value tears the
    /// session down entirely.
    pub(crate) fn load(&self) -> ZkLoginResult<SessionState> {
        let durable = match self.load_durable() {
            Ok(state) => state,
            Err(err @ ZkLoginError::StorageCorruption { .. }) => {
                log::warn!("{err}; clearing persisted session");
                self.clear_all()?;
                return Ok(SessionState::default());
            }
            Err(err) => return Err(err),
        };

        let commitment = match self.load_commitment() {
            Ok(commitment) => commitment,
            Err(err @ (ZkLoginError::StorageCorruption { .. } | ZkLoginError::CorruptKey { .. })) => {
                log::warn!("{err}; discarding the pending commitment");
                self.clear_commitment()?;
                None
            }
            Err(err) => return Err(err),
        };

        Ok(SessionState {
            commitment,
            ..durable
        })
    }

    fn load_durable(&self) -> ZkLoginResult<SessionState> {
        let salt = self
            .read(StorageKey::Salt)?
            .map(|raw| {
                U256Decimal::try_from_decimal_string(&raw)
                    .map_err(|e| corruption(StorageKey::Salt, &e))
            })
            .transpose()?;
        let token = self
            .read(StorageKey::IdentityToken)?
            .map(|raw| {
                IdentityToken::parse(&raw).map_err(|e| corruption(StorageKey::IdentityToken, &e))
            })
            .transpose()?;
        let address = self
            .read(StorageKey::Address)?
            .map(|raw| {
                raw.parse::<SuiAddress>()
                    .map_err(|e| corruption(StorageKey::Address, &e))
            })
            .transpose()?;

        Ok(SessionState {
            salt,
            token,
            address,
            ..SessionState::default()
        })
    }

    fn load_commitment(&self) -> ZkLoginResult<Option<Commitment>> {
        let values = [
            self.read(StorageKey::EphemeralKeyPair)?,
            self.read(StorageKey::Randomness)?,
            self.read(StorageKey::Nonce)?,
            self.read(StorageKey::MaxEpoch)?,
        ];
        let present = values.iter().filter(|value| value.is_some()).count();
        let [Some(key), Some(randomness), Some(nonce), Some(max_epoch)] = values else {
            if present > 0 {
                return Err(ZkLoginError::StorageCorruption {
                    key: StorageKey::EphemeralKeyPair.name(),
                    reason: "commitment is only partially persisted".to_string(),
                });
            }
            return Ok(None);
        };

        let keypair = EphemeralKeyPair::deserialize(&key)?;
        let randomness = U256Decimal::try_from_decimal_string(&randomness)
            .map_err(|e| corruption(StorageKey::Randomness, &e))?;
        let max_epoch = max_epoch.trim().parse::<u64>().map_err(|e| {
            ZkLoginError::StorageCorruption {
                key: StorageKey::MaxEpoch.name(),
                reason: e.to_string(),
            }
        })?;

        Ok(Some(Commitment {
            keypair,
            randomness,
            max_epoch,
            nonce: Nonce::new(nonce.trim().to_string()),
        }))
    }

    /// Writes all commitment fields in one batch.
    pub(crate) fn save_commitment(&self, commitment: &Commitment) -> ZkLoginResult<()> {
        let key = commitment.keypair.serialize();
        self.volatile.put_batch(&[
            (
                StorageKey::EphemeralKeyPair.name(),
                key.expose_secret().to_string(),
            ),
            (
                StorageKey::Randomness.name(),
                commitment.randomness.to_decimal_string(),
            ),
            (StorageKey::Nonce.name(), commitment.nonce.as_str().to_string()),
            (StorageKey::MaxEpoch.name(), commitment.max_epoch.to_string()),
        ])?;
        Ok(())
    }

    pub(crate) fn save_salt(&self, salt: &U256Decimal) -> ZkLoginResult<()> {
        self.durable
            .put(StorageKey::Salt.name(), salt.to_decimal_string())?;
        Ok(())
    }

    pub(crate) fn save_token(&self, token: &IdentityToken) -> ZkLoginResult<()> {
        self.durable
            .put(StorageKey::IdentityToken.name(), token.raw().to_string())?;
        Ok(())
    }

    pub(crate) fn save_address(&self, address: &SuiAddress) -> ZkLoginResult<()> {
        self.durable.put(StorageKey::Address.name(), address.to_hex())?;
        Ok(())
    }

    pub(crate) fn clear_address(&self) -> ZkLoginResult<()> {
        self.durable.remove(&[StorageKey::Address.name()])?;
        Ok(())
    }

    pub(crate) fn clear_identity(&self) -> ZkLoginResult<()> {
        self.durable.remove(&[
            StorageKey::IdentityToken.name(),
            StorageKey::Address.name(),
        ])?;
        Ok(())
    }

    pub(crate) fn clear_commitment(&self) -> ZkLoginResult<()> {
        let names: Vec<&str> = StorageKey::COMMITMENT.iter().map(|k| k.name()).collect();
        self.discard(Scope::Volatile, &names)
    }

    pub(crate) fn clear_all(&self) -> ZkLoginResult<()> {
        self.discard(Scope::Volatile, &StorageKey::names_in(Scope::Volatile))?;
        self.discard(Scope::Durable, &StorageKey::names_in(Scope::Durable))
    }
}

fn corruption(key: StorageKey, error: &ZkLoginError) -> ZkLoginError {
    ZkLoginError::StorageCorruption {
        key: key.name(),
        reason: error.to_string(),
    }
}
