//! Connector contract for browser-injected Bitcoin wallets.
//!
//! This crate provides:
//! - Network mapping between wallet ids and canonical networks
//! - Address script-type detection (P2PKH, P2SH, P2WPKH, P2WSH, P2TR)
//! - The [`WalletBridge`] capability trait and subscription handles
//! - The [`Connector`] connection lifecycle with bounded waits
//! - Balance query descriptors and a minimal polling cache

pub mod address;
pub mod bridge;
pub mod connector;
pub mod error;
pub mod events;
pub mod network;
pub mod query;
pub mod runtime;
pub mod timeout;

#[cfg(test)]
mod testing;

pub use address::{classify_address, AddressClassifier, AddressType, ScriptTypeClassifier};
pub use bridge::{
    FeeOptions, Inscription, InscriptionPage, MessageSigningKind, SendInscriptionResult,
    SignPsbtOptions, ToSignInput, WalletBalance, WalletBridge, WalletResult,
};
pub use connector::{
    ConnectionState, Connector, ConnectorConfig, PsbtInputAccounts, WalletInfo, ACCOUNTS_TIMEOUT,
    NETWORK_TIMEOUT,
};
pub use error::{normalize_external_error, ConnectFailure, ConnectorError, ConnectorResult, WalletError};
pub use events::{EventHandler, EventHub, Subscription, WalletEvent, WalletEventKind};
pub use network::{to_canonical, to_native, Network, WalletNetwork};
pub use query::{
    use_balance, AccountContext, Balance, BalanceSource, QueryCache, QueryError, QueryKey,
    QueryOptions, RawBalance,
};
pub use runtime::Runtime;
pub use timeout::{with_timeout, Elapsed};
