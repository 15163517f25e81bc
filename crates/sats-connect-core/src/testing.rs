//! Test doubles: a tokio-backed runtime and a scriptable wallet.

use std::cell::RefCell;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{self, LocalBoxFuture};

use crate::bridge::*;
use crate::error::WalletError;
use crate::events::{EventHandler, EventHub, Subscription, WalletEvent, WalletEventKind};
use crate::network::WalletNetwork;
use crate::runtime::Runtime;

/// Requires a tokio `LocalSet` for `spawn_local`.
pub struct TokioRuntime;

impl Runtime for TokioRuntime {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }

    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
        tokio::task::spawn_local(task);
    }
}

#[derive(Debug, Clone)]
pub enum Reply<T> {
    Value(T),
    Fail(WalletError),
    Hang,
}

impl<T> Reply<T> {
    async fn resolve(self) -> Result<T, WalletError> {
        match self {
            Reply::Value(value) => Ok(value),
            Reply::Fail(err) => Err(err),
            Reply::Hang => future::pending().await,
        }
    }
}

pub struct FakeWallet {
    pub network: RefCell<Reply<WalletNetwork>>,
    pub switch: RefCell<Reply<()>>,
    pub accounts: RefCell<Reply<Vec<String>>>,
    pub public_key: RefCell<Reply<String>>,
    pub sign_message: RefCell<Reply<String>>,
    pub last_sign_options: RefCell<Option<SignPsbtOptions>>,
    pub events: EventHub,
    calls: RefCell<Vec<&'static str>>,
}

impl FakeWallet {
    pub fn new() -> Self {
        Self {
            network: RefCell::new(Reply::Value(WalletNetwork::Livenet)),
            switch: RefCell::new(Reply::Value(())),
            accounts: RefCell::new(Reply::Value(vec!["addrA".into(), "addrB".into()])),
            public_key: RefCell::new(Reply::Value("pkX".into())),
            sign_message: RefCell::new(Reply::Value("signature".into())),
            last_sign_options: RefCell::new(None),
            events: EventHub::new(),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    pub fn emit(&self, event: WalletEvent) {
        self.events.emit(&event);
    }

    fn record(&self, call: &'static str) {
        self.calls.borrow_mut().push(call);
    }
}

#[async_trait(?Send)]
impl WalletBridge for FakeWallet {
    async fn request_accounts(&self) -> WalletResult<Vec<String>> {
        self.record("request_accounts");
        let reply = self.accounts.borrow().clone();
        reply.resolve().await
    }

    async fn get_accounts(&self) -> WalletResult<Vec<String>> {
        self.record("get_accounts");
        let reply = self.accounts.borrow().clone();
        reply.resolve().await
    }

    async fn get_network(&self) -> WalletResult<WalletNetwork> {
        self.record("get_network");
        let reply = self.network.borrow().clone();
        reply.resolve().await
    }

    async fn switch_network(&self, network: WalletNetwork) -> WalletResult<()> {
        self.record("switch_network");
        let reply = self.switch.borrow().clone();
        reply.resolve().await?;
        *self.network.borrow_mut() = Reply::Value(network);
        Ok(())
    }

    async fn get_public_key(&self) -> WalletResult<String> {
        self.record("get_public_key");
        let reply = self.public_key.borrow().clone();
        reply.resolve().await
    }

    async fn get_balance(&self) -> WalletResult<WalletBalance> {
        self.record("get_balance");
        Ok(WalletBalance {
            confirmed: 1_000,
            unconfirmed: 500,
            total: 1_500,
        })
    }

    async fn sign_message(
        &self,
        _message: &str,
        _kind: Option<MessageSigningKind>,
    ) -> WalletResult<String> {
        self.record("sign_message");
        let reply = self.sign_message.borrow().clone();
        reply.resolve().await
    }

    async fn sign_psbt(
        &self,
        psbt_hex: &str,
        options: Option<SignPsbtOptions>,
    ) -> WalletResult<String> {
        self.record("sign_psbt");
        *self.last_sign_options.borrow_mut() = options;
        Ok(format!("signed:{psbt_hex}"))
    }

    async fn sign_psbts(
        &self,
        psbt_hexs: Vec<String>,
        _options: Option<Vec<SignPsbtOptions>>,
    ) -> WalletResult<Vec<String>> {
        self.record("sign_psbts");
        Ok(psbt_hexs.iter().map(|hex| format!("signed:{hex}")).collect())
    }

    async fn send_bitcoin(
        &self,
        to_address: &str,
        satoshis: u64,
        _options: Option<FeeOptions>,
    ) -> WalletResult<String> {
        self.record("send_bitcoin");
        Ok(format!("{to_address}:{satoshis}"))
    }

    async fn push_tx(&self, _raw_tx: &str) -> WalletResult<String> {
        self.record("push_tx");
        Ok("txid".into())
    }

    async fn push_psbt(&self, _psbt_hex: &str) -> WalletResult<String> {
        self.record("push_psbt");
        Ok("txid".into())
    }

    async fn get_inscriptions(&self, _cursor: u32, _size: u32) -> WalletResult<InscriptionPage> {
        self.record("get_inscriptions");
        Ok(InscriptionPage::default())
    }

    async fn send_inscription(
        &self,
        _address: &str,
        _inscription_id: &str,
        _options: Option<FeeOptions>,
    ) -> WalletResult<SendInscriptionResult> {
        self.record("send_inscription");
        Ok(SendInscriptionResult { txid: "txid".into() })
    }

    async fn add_accounts(&self, _count: u32) -> WalletResult<()> {
        self.record("add_accounts");
        Ok(())
    }

    fn subscribe(&self, kind: WalletEventKind, handler: EventHandler) -> Subscription {
        self.events.subscribe(kind, handler)
    }
}
