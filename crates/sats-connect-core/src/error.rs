//! Connector error taxonomy and external error normalisation.

use serde_json::Value;

use crate::timeout::Elapsed;

/// Message used when a wallet error carries nothing readable.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Message used when a structured wallet error cannot be serialised.
pub const UNSERIALIZABLE_ERROR: &str = "Error object could not be serialized";

/// A failure reported by (or while talking to) the wallet extension.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WalletError {
    /// The wallet rejected the call. The payload is whatever the
    /// extension threw, kept as-is.
    #[error("{}", normalize_external_error(.0))]
    Rejected(Value),
    #[error(transparent)]
    Timeout(#[from] Elapsed),
    /// The wallet answered with something that does not fit the contract.
    #[error("Invalid response from {operation}: {message}")]
    InvalidResponse {
        operation: &'static str,
        message: String,
    },
}

impl WalletError {
    pub fn rejected(message: impl Into<String>) -> Self {
        WalletError::Rejected(Value::String(message.into()))
    }

    /// The human-readable message for this failure.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Why a `connect()` attempt could not complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectFailure {
    #[error("Failed to get accounts from {wallet} wallet: {message}")]
    NoAccountsReturned { wallet: String, message: String },
    #[error("Failed to get public key from {wallet} wallet: {message}")]
    NoPublicKeyReturned { wallet: String, message: String },
}

/// Errors surfaced by a connector to its callers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectorError {
    #[error("{wallet} wallet not installed. Please install {wallet} browser extension from {homepage}")]
    WalletNotInstalled { wallet: String, homepage: String },
    #[error("Failed to connect to {wallet} wallet: {reason}")]
    ConnectionFailed { wallet: String, reason: ConnectFailure },
    #[error("{wallet} wallet is not connected")]
    NotConnected { wallet: String },
    /// The wallet rejected a delegated call. Never retried.
    #[error(transparent)]
    Delegation(#[from] WalletError),
}

pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Reduce an arbitrary error payload thrown by a wallet to one line.
///
/// Priority: a bare string, then the `message`, `error` and `reason`
/// string fields of an object, then the JSON serialisation of the value.
/// Never fails; `null` and empty payloads yield [`UNKNOWN_ERROR`].
pub fn normalize_external_error(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => UNKNOWN_ERROR.to_string(),
        Value::Object(map) => ["message", "error", "reason"]
            .iter()
            .find_map(|field| map.get(*field).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| serialize_or_placeholder(value)),
        other => serialize_or_placeholder(other),
    }
}

fn serialize_or_placeholder(value: &Value) -> String {
    match serde_json::to_string(value) {
        Ok(s) if s != "{}" => s,
        Ok(_) => UNKNOWN_ERROR.to_string(),
        Err(_) => UNSERIALIZABLE_ERROR.to_string(),
    }
}
