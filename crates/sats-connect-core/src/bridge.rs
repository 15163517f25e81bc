//! The capability contract an injected wallet extension must satisfy.
//!
//! Every call is a single asynchronous request/response against the
//! extension. Types serialise in the camelCase JSON the extension uses.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WalletError;
use crate::events::{EventHandler, Subscription, WalletEventKind};
use crate::network::WalletNetwork;

pub type WalletResult<T> = Result<T, WalletError>;

/// Balance as reported by the wallet, in satoshis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WalletBalance {
    pub confirmed: u64,
    pub unconfirmed: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inscription {
    pub inscription_id: String,
    pub inscription_number: String,
    pub address: String,
    pub output_value: String,
    pub content: String,
    pub content_length: String,
    pub content_type: String,
    pub preview: String,
    pub timestamp: u64,
    pub offset: u64,
    pub genesis_transaction: String,
    pub location: String,
}

/// One page of [`WalletBridge::get_inscriptions`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InscriptionPage {
    pub total: u64,
    pub list: Vec<Inscription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendInscriptionResult {
    pub txid: String,
}

/// Signature scheme for message signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageSigningKind {
    #[serde(rename = "ecdsa")]
    Ecdsa,
    #[serde(rename = "bip322-simple")]
    Bip322Simple,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeOptions {
    /// sat/vB
    pub fee_rate: f64,
}

/// Signer selection for one PSBT input.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToSignInput {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sighash_types: Option<Vec<u8>>,
    /// Sign with the untweaked key; only taproot inputs want the tweak.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_tweak_signer: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignPsbtOptions {
    pub auto_finalized: bool,
    pub to_sign_inputs: Vec<ToSignInput>,
}

#[async_trait(?Send)]
pub trait WalletBridge {
    /// Whether the extension is still reachable.
    fn is_available(&self) -> bool {
        true
    }

    /// Prompt the user for account access.
    async fn request_accounts(&self) -> WalletResult<Vec<String>>;

    async fn get_accounts(&self) -> WalletResult<Vec<String>>;

    async fn get_network(&self) -> WalletResult<WalletNetwork>;

    async fn switch_network(&self, network: WalletNetwork) -> WalletResult<()>;

    async fn get_public_key(&self) -> WalletResult<String>;

    async fn get_balance(&self) -> WalletResult<WalletBalance>;

    async fn sign_message(
        &self,
        message: &str,
        kind: Option<MessageSigningKind>,
    ) -> WalletResult<String>;

    async fn sign_psbt(
        &self,
        psbt_hex: &str,
        options: Option<SignPsbtOptions>,
    ) -> WalletResult<String>;

    /// Sign several PSBTs; `options` is positional, one entry per PSBT.
    async fn sign_psbts(
        &self,
        psbt_hexs: Vec<String>,
        options: Option<Vec<SignPsbtOptions>>,
    ) -> WalletResult<Vec<String>>;

    async fn send_bitcoin(
        &self,
        to_address: &str,
        satoshis: u64,
        options: Option<FeeOptions>,
    ) -> WalletResult<String>;

    /// Broadcast a raw transaction, returning its txid.
    async fn push_tx(&self, raw_tx: &str) -> WalletResult<String>;

    /// Broadcast a finalized PSBT, returning its txid.
    async fn push_psbt(&self, psbt_hex: &str) -> WalletResult<String>;

    async fn get_inscriptions(&self, cursor: u32, size: u32) -> WalletResult<InscriptionPage>;

    async fn send_inscription(
        &self,
        address: &str,
        inscription_id: &str,
        options: Option<FeeOptions>,
    ) -> WalletResult<SendInscriptionResult>;

    async fn add_accounts(&self, count: u32) -> WalletResult<()>;

    /// Register `handler` for `kind`; the returned handle removes it again.
    fn subscribe(&self, kind: WalletEventKind, handler: EventHandler) -> Subscription;
}
