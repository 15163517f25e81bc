//! JavaScript surface of the SAT20 connector.

use std::rc::Rc;

use futures::future::{abortable, AbortHandle};
use js_sys::Function;
use sats_connect_core::query::MAX_SAFE_INTEGER;
use sats_connect_core::{
    use_balance, Balance, Connector, ConnectorConfig, FeeOptions, Network, PsbtInputAccounts,
    QueryCache, QueryOptions, SignPsbtOptions, Subscription, WalletInfo, WalletNetwork,
};
use tracing::warn;
use wasm_bindgen::prelude::*;

use crate::api::EsploraClient;
use crate::runtime::BrowserRuntime;
use crate::sat20::Sat20Bridge;
use crate::state::{from_js, js_error, js_message, required_js, to_js, ConnectorSnapshot};

/// Connector for the SAT20 browser extension.
#[wasm_bindgen]
pub struct Sat20Connector {
    inner: Connector<Sat20Bridge>,
    esplora: Rc<EsploraClient>,
}

#[wasm_bindgen]
impl Sat20Connector {
    /// `config` is an optional `{ networkTimeoutMs, accountsTimeoutMs }`
    /// object. The `network` argument always wins over `config.network`.
    #[wasm_bindgen(constructor)]
    pub fn new(network: &str, config: JsValue) -> Result<Sat20Connector, JsValue> {
        let network = Network::from_str(network)
            .ok_or_else(|| JsValue::from_str(&format!("Unknown network: {}", network)))?;
        let mut config: ConnectorConfig = from_js(config)?.unwrap_or_default();
        config.network = network;

        let inner = Connector::new(
            WalletInfo::sat20(),
            config,
            Sat20Bridge::detect().map(Rc::new),
            Rc::new(BrowserRuntime),
        );

        Ok(Sat20Connector {
            inner,
            esplora: Rc::new(EsploraClient::new()),
        })
    }

    /// Query balances from a custom Esplora host instead of mempool.space.
    #[wasm_bindgen(js_name = setEsploraUrl)]
    pub fn set_esplora_url(&mut self, base_url: &str) {
        self.esplora = Rc::new(EsploraClient::with_base_url(base_url));
    }

    #[wasm_bindgen(getter)]
    pub fn id(&self) -> String {
        self.inner.info().id.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn name(&self) -> String {
        self.inner.info().name.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn homepage(&self) -> String {
        self.inner.info().homepage.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn network(&self) -> String {
        self.inner.network().name().to_string()
    }

    /// Human-readable network label, e.g. "Bitcoin Mainnet".
    #[wasm_bindgen(getter, js_name = networkDisplayName)]
    pub fn network_display_name(&self) -> String {
        self.inner.network().display_name().to_string()
    }

    #[wasm_bindgen(getter, js_name = paymentAddress)]
    pub fn payment_address(&self) -> Option<String> {
        self.inner.payment_address()
    }

    #[wasm_bindgen(getter, js_name = ordinalsAddress)]
    pub fn ordinals_address(&self) -> Option<String> {
        self.inner.ordinals_address()
    }

    #[wasm_bindgen(getter, js_name = publicKey)]
    pub fn public_key(&self) -> Option<String> {
        self.inner.public_key()
    }

    #[wasm_bindgen(getter)]
    pub fn connected(&self) -> bool {
        self.inner.is_connected()
    }

    /// Current state as a plain object.
    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        ConnectorSnapshot::of(&self.inner).to_js()
    }

    /// Whether the extension is installed right now.
    #[wasm_bindgen(js_name = isReady)]
    pub fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    pub async fn connect(&self) -> Result<(), JsValue> {
        self.inner.connect().await.map_err(js_error)
    }

    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    #[wasm_bindgen(js_name = changeAccount)]
    pub async fn change_account(&self, account: String) {
        self.inner.change_account(&account).await;
    }

    /// Adopt a network reported by the wallet (`livenet`/`testnet`).
    #[wasm_bindgen(js_name = changeNetwork)]
    pub fn change_network(&self, network: &str) {
        self.inner.change_network(WalletNetwork::parse(network));
    }

    #[wasm_bindgen(js_name = signMessage)]
    pub async fn sign_message(&self, message: String) -> Result<String, JsValue> {
        self.inner.sign_message(&message).await.map_err(js_error)
    }

    /// `input_accounts` is `[{ address, signingIndexes }]`.
    #[wasm_bindgen(js_name = signPsbt)]
    pub async fn sign_psbt(&self, psbt_hex: String, input_accounts: JsValue) -> Result<String, JsValue> {
        let accounts: Vec<PsbtInputAccounts> = required_js("inputAccounts", input_accounts)?;
        self.inner
            .sign_psbt(&psbt_hex, &accounts)
            .await
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = signPsbts)]
    pub async fn sign_psbts(&self, psbt_hexs: JsValue, options: JsValue) -> Result<JsValue, JsValue> {
        let psbt_hexs: Vec<String> = from_js(psbt_hexs)?.unwrap_or_default();
        let options: Option<Vec<SignPsbtOptions>> = from_js(options)?;
        let signed = self
            .inner
            .sign_psbts(psbt_hexs, options)
            .await
            .map_err(js_error)?;
        to_js(&signed)
    }

    #[wasm_bindgen(js_name = sendToAddress)]
    pub async fn send_to_address(&self, to_address: String, amount: f64) -> Result<String, JsValue> {
        let satoshis = satoshis(amount)?;
        self.inner
            .send_to_address(&to_address, satoshis)
            .await
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = pushTx)]
    pub async fn push_tx(&self, raw_tx: String) -> Result<String, JsValue> {
        self.inner.push_tx(&raw_tx).await.map_err(js_error)
    }

    #[wasm_bindgen(js_name = pushPsbt)]
    pub async fn push_psbt(&self, psbt_hex: String) -> Result<String, JsValue> {
        self.inner.push_psbt(&psbt_hex).await.map_err(js_error)
    }

    /// The wallet's own `{ confirmed, unconfirmed, total }` balance.
    #[wasm_bindgen(js_name = getBalance)]
    pub async fn get_balance(&self) -> Result<JsValue, JsValue> {
        let balance = self.inner.get_balance().await.map_err(js_error)?;
        to_js(&balance)
    }

    #[wasm_bindgen(js_name = getInscriptions)]
    pub async fn get_inscriptions(&self, cursor: u32, size: u32) -> Result<JsValue, JsValue> {
        let page = self
            .inner
            .get_inscriptions(cursor, size)
            .await
            .map_err(js_error)?;
        to_js(&page)
    }

    #[wasm_bindgen(js_name = sendInscription)]
    pub async fn send_inscription(
        &self,
        address: String,
        inscription_id: String,
        fee_rate: Option<f64>,
    ) -> Result<String, JsValue> {
        let options = fee_rate.map(|fee_rate| FeeOptions { fee_rate });
        let result = self
            .inner
            .send_inscription(&address, &inscription_id, options)
            .await
            .map_err(js_error)?;
        Ok(result.txid)
    }

    #[wasm_bindgen(js_name = addAccounts)]
    pub async fn add_accounts(&self, count: u32) -> Result<(), JsValue> {
        self.inner.add_accounts(count).await.map_err(js_error)
    }

    /// Call `callback(address)` whenever the wallet switches accounts.
    pub fn on(&self, callback: Function) -> AccountSubscription {
        let subscription = self.inner.on_account_change(move |address| {
            if let Err(err) = callback.call1(&JsValue::NULL, &JsValue::from_str(address)) {
                warn!(error = %js_message(&err), "account change callback threw");
            }
        });
        AccountSubscription {
            inner: Some(subscription),
        }
    }

    /// Same as `subscription.unsubscribe()`.
    #[wasm_bindgen(js_name = removeListener)]
    pub fn remove_listener(&self, subscription: &mut AccountSubscription) {
        subscription.unsubscribe();
    }

    /// Balance query for the current payment address.
    ///
    /// The descriptor captures the address at call time; request a new one
    /// after the account changes.
    #[wasm_bindgen(js_name = balanceQuery)]
    pub fn balance_query(&self) -> BalanceQuery {
        BalanceQuery {
            options: use_balance(&self.inner, Rc::clone(&self.esplora)),
        }
    }
}

/// Validate a JS number as a satoshi amount.
pub fn satoshis(amount: f64) -> Result<u64, JsValue> {
    let valid = amount.is_finite()
        && amount >= 0.0
        && amount.fract() == 0.0
        && amount <= MAX_SAFE_INTEGER as f64;
    if valid {
        Ok(amount as u64)
    } else {
        Err(JsValue::from_str(&format!("Invalid satoshi amount: {}", amount)))
    }
}

/// Handle returned by [`Sat20Connector::on`].
#[wasm_bindgen]
pub struct AccountSubscription {
    inner: Option<Subscription>,
}

#[wasm_bindgen]
impl AccountSubscription {
    /// Stop delivering account changes. Later calls do nothing.
    pub fn unsubscribe(&mut self) {
        if let Some(subscription) = self.inner.take() {
            subscription.unsubscribe();
        }
    }

    #[wasm_bindgen(getter)]
    pub fn active(&self) -> bool {
        self.inner.is_some()
    }
}

/// Query descriptor shaped for JS cache libraries.
#[wasm_bindgen]
pub struct BalanceQuery {
    options: QueryOptions<Balance>,
}

#[wasm_bindgen]
impl BalanceQuery {
    /// `["sats-balance", network, address]`.
    #[wasm_bindgen(js_name = queryKey)]
    pub fn query_key(&self) -> Result<JsValue, JsValue> {
        to_js(&self.options.key)
    }

    #[wasm_bindgen(getter)]
    pub fn enabled(&self) -> bool {
        self.options.enabled
    }

    /// Milliseconds between refetches, `undefined` for one-shot queries.
    #[wasm_bindgen(getter, js_name = refetchInterval)]
    pub fn refetch_interval(&self) -> Option<f64> {
        self.options
            .refetch_interval
            .map(|interval| interval.as_millis() as f64)
    }

    #[wasm_bindgen(getter, js_name = structuralSharing)]
    pub fn structural_sharing(&self) -> bool {
        self.options.structural_sharing
    }

    /// Resolve to `{ confirmed, unconfirmed, total }` once.
    pub async fn fetch(&self) -> Result<JsValue, JsValue> {
        let balance = self
            .options
            .fetch()
            .await
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        to_js(&balance)
    }

    /// Poll in the background and call `callback(balance)` after each
    /// fetch until `stop()` is called.
    pub fn watch(&self, callback: Function) -> BalanceWatch {
        let options = self.options.clone();
        let (task, handle) = abortable(async move {
            let cache = QueryCache::new();
            cache
                .poll(&options, &BrowserRuntime, |balance: Rc<Balance>| {
                    let value = match to_js(balance.as_ref()) {
                        Ok(value) => value,
                        Err(err) => {
                            warn!(error = %js_message(&err), "failed to convert balance");
                            return;
                        }
                    };
                    if let Err(err) = callback.call1(&JsValue::NULL, &value) {
                        warn!(error = %js_message(&err), "balance callback threw");
                    }
                })
                .await;
        });
        wasm_bindgen_futures::spawn_local(async move {
            let _ = task.await;
        });
        BalanceWatch { handle }
    }
}

/// Background poll started by [`BalanceQuery::watch`].
#[wasm_bindgen]
pub struct BalanceWatch {
    handle: AbortHandle,
}

#[wasm_bindgen]
impl BalanceWatch {
    pub fn stop(&self) {
        self.handle.abort();
    }

    #[wasm_bindgen(getter)]
    pub fn stopped(&self) -> bool {
        self.handle.is_aborted()
    }
}

impl Drop for BalanceWatch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
