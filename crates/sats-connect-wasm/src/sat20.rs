//! [`WalletBridge`] over the `window.sat20` object injected by the SAT20
//! extension.

use async_trait::async_trait;
use js_sys::{Array, Function, Object, Promise, Reflect};
use sats_connect_core::bridge::WalletResult;
use sats_connect_core::{
    EventHandler, FeeOptions, InscriptionPage, MessageSigningKind, SendInscriptionResult,
    SignPsbtOptions, Subscription, WalletBalance, WalletBridge, WalletError, WalletEvent,
    WalletEventKind, WalletNetwork,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use crate::state::{js_message, rejection, to_js};

/// Global property the extension installs itself under.
pub const SAT20_GLOBAL: &str = "sat20";

#[derive(Serialize)]
struct RawTx<'a> {
    rawtx: &'a str,
}

/// Handle to the injected SAT20 provider.
#[derive(Clone)]
pub struct Sat20Bridge {
    wallet: Object,
}

impl Sat20Bridge {
    /// Look the provider up once. `None` when the extension is absent.
    pub fn detect() -> Option<Self> {
        lookup().map(|wallet| Self { wallet })
    }

    async fn call(&self, method: &'static str, args: &[JsValue]) -> WalletResult<JsValue> {
        let function = Reflect::get(&self.wallet, &JsValue::from_str(method))
            .map_err(rejection)?
            .dyn_into::<Function>()
            .map_err(|_| WalletError::InvalidResponse {
                operation: method,
                message: "method not provided by wallet".into(),
            })?;

        let args: Array = args.iter().collect();
        let result = function.apply(&self.wallet, &args).map_err(rejection)?;
        if result.has_type::<Promise>() {
            JsFuture::from(result.unchecked_into::<Promise>())
                .await
                .map_err(rejection)
        } else {
            Ok(result)
        }
    }

    async fn call_as<T: DeserializeOwned>(
        &self,
        method: &'static str,
        args: &[JsValue],
    ) -> WalletResult<T> {
        let value = self.call(method, args).await?;
        serde_wasm_bindgen::from_value(value).map_err(|e| WalletError::InvalidResponse {
            operation: method,
            message: e.to_string(),
        })
    }

    fn listener(&self, method: &str, kind: WalletEventKind, f: &Function) -> Result<(), JsValue> {
        let register: Function = Reflect::get(&self.wallet, &JsValue::from_str(method))?.dyn_into()?;
        register.call2(&self.wallet, &JsValue::from_str(kind.name()), f)?;
        Ok(())
    }
}

fn lookup() -> Option<Object> {
    let value = Reflect::get(&js_sys::global(), &JsValue::from_str(SAT20_GLOBAL)).ok()?;
    if value.is_undefined() || value.is_null() {
        return None;
    }
    value.dyn_into::<Object>().ok()
}

fn arg<T: Serialize + ?Sized>(operation: &'static str, value: &T) -> WalletResult<JsValue> {
    to_js(value).map_err(|e| WalletError::InvalidResponse {
        operation,
        message: js_message(&e),
    })
}

fn optional_arg<T: Serialize>(operation: &'static str, value: Option<&T>) -> WalletResult<JsValue> {
    match value {
        Some(value) => arg(operation, value),
        None => Ok(JsValue::UNDEFINED),
    }
}

fn decode_event(kind: WalletEventKind, payload: JsValue) -> Option<WalletEvent> {
    match kind {
        WalletEventKind::AccountsChanged => serde_wasm_bindgen::from_value::<Vec<String>>(payload)
            .ok()
            .map(WalletEvent::AccountsChanged),
        WalletEventKind::NetworkChanged => payload
            .as_string()
            .map(|name| WalletEvent::NetworkChanged(WalletNetwork::parse(&name))),
        WalletEventKind::EnvironmentChanged => {
            Some(WalletEvent::EnvironmentChanged(payload.as_string().unwrap_or_default()))
        }
    }
}

#[async_trait(?Send)]
impl WalletBridge for Sat20Bridge {
    fn is_available(&self) -> bool {
        lookup().is_some()
    }

    async fn request_accounts(&self) -> WalletResult<Vec<String>> {
        self.call_as("requestAccounts", &[]).await
    }

    async fn get_accounts(&self) -> WalletResult<Vec<String>> {
        self.call_as("getAccounts", &[]).await
    }

    async fn get_network(&self) -> WalletResult<WalletNetwork> {
        self.call_as("getNetwork", &[]).await
    }

    async fn switch_network(&self, network: WalletNetwork) -> WalletResult<()> {
        self.call("switchNetwork", &[JsValue::from_str(network.as_str())])
            .await
            .map(|_| ())
    }

    async fn get_public_key(&self) -> WalletResult<String> {
        self.call_as("getPublicKey", &[]).await
    }

    async fn get_balance(&self) -> WalletResult<WalletBalance> {
        self.call_as("getBalance", &[]).await
    }

    async fn sign_message(
        &self,
        message: &str,
        kind: Option<MessageSigningKind>,
    ) -> WalletResult<String> {
        let kind = optional_arg("signMessage", kind.as_ref())?;
        self.call_as("signMessage", &[JsValue::from_str(message), kind]).await
    }

    async fn sign_psbt(
        &self,
        psbt_hex: &str,
        options: Option<SignPsbtOptions>,
    ) -> WalletResult<String> {
        let options = optional_arg("signPsbt", options.as_ref())?;
        self.call_as("signPsbt", &[JsValue::from_str(psbt_hex), options]).await
    }

    async fn sign_psbts(
        &self,
        psbt_hexs: Vec<String>,
        options: Option<Vec<SignPsbtOptions>>,
    ) -> WalletResult<Vec<String>> {
        let hexs = arg("signPsbts", &psbt_hexs)?;
        let options = optional_arg("signPsbts", options.as_ref())?;
        self.call_as("signPsbts", &[hexs, options]).await
    }

    async fn send_bitcoin(
        &self,
        to_address: &str,
        satoshis: u64,
        options: Option<FeeOptions>,
    ) -> WalletResult<String> {
        let options = optional_arg("sendBitcoin", options.as_ref())?;
        let amount = JsValue::from_f64(satoshis as f64);
        self.call_as("sendBitcoin", &[JsValue::from_str(to_address), amount, options])
            .await
    }

    async fn push_tx(&self, raw_tx: &str) -> WalletResult<String> {
        let payload = arg("pushTx", &RawTx { rawtx: raw_tx })?;
        self.call_as("pushTx", &[payload]).await
    }

    async fn push_psbt(&self, psbt_hex: &str) -> WalletResult<String> {
        self.call_as("pushPsbt", &[JsValue::from_str(psbt_hex)]).await
    }

    async fn get_inscriptions(&self, cursor: u32, size: u32) -> WalletResult<InscriptionPage> {
        self.call_as("getInscriptions", &[JsValue::from(cursor), JsValue::from(size)])
            .await
    }

    async fn send_inscription(
        &self,
        address: &str,
        inscription_id: &str,
        options: Option<FeeOptions>,
    ) -> WalletResult<SendInscriptionResult> {
        let options = optional_arg("sendInscription", options.as_ref())?;
        self.call_as(
            "sendInscription",
            &[JsValue::from_str(address), JsValue::from_str(inscription_id), options],
        )
        .await
    }

    async fn add_accounts(&self, count: u32) -> WalletResult<()> {
        self.call("addAccounts", &[JsValue::from(count)])
            .await
            .map(|_| ())
    }

    fn subscribe(&self, kind: WalletEventKind, handler: EventHandler) -> Subscription {
        let closure = Closure::<dyn FnMut(JsValue)>::new(move |payload: JsValue| {
            match decode_event(kind, payload) {
                Some(event) => handler(&event),
                None => debug!(event = kind.name(), "ignoring malformed wallet event"),
            }
        });
        let function: Function = closure.as_ref().unchecked_ref::<Function>().clone();

        if let Err(err) = self.listener("on", kind, &function) {
            warn!(event = kind.name(), error = %js_message(&err), "wallet refused listener");
            return Subscription::noop();
        }

        let bridge = self.clone();
        Subscription::new(move || {
            if let Err(err) = bridge.listener("removeListener", kind, &function) {
                warn!(event = kind.name(), error = %js_message(&err), "failed to remove listener");
            }
            drop(closure);
        })
    }
}
