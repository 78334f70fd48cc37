//! Ledger client: epoch reads, transfer construction and submission.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::address::SuiAddress;
use crate::error::ZkLoginError;
use crate::http_request::Request;

/// Unsigned transaction bytes as produced by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionBytes(pub Vec<u8>);

impl TransactionBytes {
    /// Base64 form expected by the submission endpoint.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }
}

/// Identifier of an executed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionDigest(pub String);

impl std::fmt::Display for TransactionDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The blockchain client the session relies on.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Current ledger epoch.
    ///
    /// # Errors
    /// Transport or protocol failures.
    async fn current_epoch(&self) -> Result<u64, ZkLoginError>;

    /// Builds a transfer of `amount` MIST from `sender` to `recipient`, gas paid by `sender`.
    ///
    /// # Errors
    /// Transport or protocol failures, or `Submission` when the ledger refuses to build it.
    async fn build_transfer(
        &self,
        sender: &SuiAddress,
        recipient: &SuiAddress,
        amount: u64,
    ) -> Result<TransactionBytes, ZkLoginError>;

    /// Submits signed transaction bytes.
    ///
    /// # Errors
    /// `Submission` carrying the ledger's reason when the transaction is rejected.
    async fn execute(
        &self,
        transaction: &TransactionBytes,
        signature: &str,
    ) -> Result<TransactionDigest, ZkLoginError>;
}

/// Sui full node reached over JSON-RPC 2.0.
#[derive(Debug)]
pub struct JsonRpcLedger {
    url: String,
    gas_budget: u64,
    request: Request,
    next_id: AtomicU64,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SystemState {
    epoch: String,
}

#[derive(Deserialize)]
struct CoinPage {
    data: Vec<Coin>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Coin {
    coin_object_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionBlockBytes {
    tx_bytes: String,
}

#[derive(Deserialize)]
struct ExecuteResponse {
    digest: String,
    #[serde(default)]
    effects: Option<Effects>,
}

#[derive(Deserialize)]
struct Effects {
    status: ExecutionStatus,
}

#[derive(Deserialize)]
struct ExecutionStatus {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

/// Failure of a JSON-RPC call, before it is mapped onto a [`ZkLoginError`].
enum CallError {
    Rpc(RpcError),
    Other(ZkLoginError),
}

impl JsonRpcLedger {
    /// Creates a client for the full node at `url`.
    #[must_use]
    pub fn new(url: impl Into<String>, gas_budget: u64, timeout: Option<Duration>) -> Self {
        Self {
            url: url.into(),
            gas_budget,
            request: Request::new(timeout),
            next_id: AtomicU64::new(1),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, CallError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        log::trace!("json-rpc {method} #{id}");

        let response = self
            .request
            .handle(self.request.post(&self.url).json(&body))
            .await
            .map_err(CallError::Other)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CallError::Other(ZkLoginError::NetworkError {
                url: self.url.clone(),
                status: Some(status.as_u16()),
                error: format!("{method}: {body}"),
            }));
        }

        let text = response
            .text()
            .await
            .map_err(|e| CallError::Other(e.into()))?;
        let parsed: RpcResponse<T> = serde_json::from_str(&text).map_err(|e| {
            CallError::Other(ZkLoginError::SerializationError {
                error: format!("{method} response: {e}"),
            })
        })?;
        match (parsed.result, parsed.error) {
            (_, Some(error)) => Err(CallError::Rpc(error)),
            (Some(result), None) => Ok(result),
            (None, None) => Err(CallError::Other(ZkLoginError::SerializationError {
                error: format!("{method} response has neither result nor error"),
            })),
        }
    }

    fn protocol_error(&self, method: &str, error: CallError) -> ZkLoginError {
        match error {
            CallError::Rpc(RpcError { code, message }) => ZkLoginError::NetworkError {
                url: self.url.clone(),
                status: None,
                error: format!("{method} failed with code {code}: {message}"),
            },
            CallError::Other(error) => error,
        }
    }
}

#[async_trait]
impl Ledger for JsonRpcLedger {
    async fn current_epoch(&self) -> Result<u64, ZkLoginError> {
        const METHOD: &str = "suix_getLatestSuiSystemState";
        let state: SystemState = self
            .call(METHOD, json!([]))
            .await
            .map_err(|e| self.protocol_error(METHOD, e))?;
        state
            .epoch
            .parse()
            .map_err(|e| ZkLoginError::SerializationError {
                error: format!("epoch `{}` is not a number: {e}", state.epoch),
            })
    }

    async fn build_transfer(
        &self,
        sender: &SuiAddress,
        recipient: &SuiAddress,
        amount: u64,
    ) -> Result<TransactionBytes, ZkLoginError> {
        const COINS: &str = "suix_getCoins";
        const PAY: &str = "unsafe_paySui";

        let coins: CoinPage = self
            .call(COINS, json!([sender.to_hex(), "0x2::sui::SUI", null, null]))
            .await
            .map_err(|e| self.protocol_error(COINS, e))?;
        if coins.data.is_empty() {
            return Err(ZkLoginError::Submission {
                reason: format!("{sender} owns no SUI coins to pay with"),
            });
        }
        let coin_ids: Vec<String> = coins.data.into_iter().map(|c| c.coin_object_id).collect();

        let block: TransactionBlockBytes = self
            .call(
                PAY,
                json!([
                    sender.to_hex(),
                    coin_ids,
                    [recipient.to_hex()],
                    [amount.to_string()],
                    self.gas_budget.to_string(),
                ]),
            )
            .await
            .map_err(|e| match e {
                CallError::Rpc(RpcError { message, .. }) => ZkLoginError::Submission { reason: message },
                CallError::Other(error) => error,
            })?;

        STANDARD
            .decode(&block.tx_bytes)
            .map(TransactionBytes)
            .map_err(|e| ZkLoginError::SerializationError {
                error: format!("txBytes is not base64: {e}"),
            })
    }

    async fn execute(
        &self,
        transaction: &TransactionBytes,
        signature: &str,
    ) -> Result<TransactionDigest, ZkLoginError> {
        const METHOD: &str = "sui_executeTransactionBlock";
        let response: ExecuteResponse = self
            .call(
                METHOD,
                json!([
                    transaction.to_base64(),
                    [signature],
                    { "showEffects": true },
                    "WaitForLocalExecution",
                ]),
            )
            .await
            .map_err(|e| match e {
                CallError::Rpc(RpcError { message, .. }) => ZkLoginError::Submission { reason: message },
                CallError::Other(error) => error,
            })?;

        if let Some(effects) = response.effects {
            if effects.status.status != "success" {
                return Err(ZkLoginError::Submission {
                    reason: effects
                        .status
                        .error
                        .unwrap_or_else(|| format!("execution status {}", effects.status.status)),
                });
            }
        }
        Ok(TransactionDigest(response.digest))
    }
}
