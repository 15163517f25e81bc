//! Conversions between connector values and JS values.

use sats_connect_core::{
    normalize_external_error, ConnectionState, Connector, ConnectorError, Network, WalletBridge,
    WalletError,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use wasm_bindgen::prelude::*;

/// A read-only view of a connector for UI rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorSnapshot {
    pub id: String,
    pub name: String,
    pub network: Network,
    pub state: ConnectionState,
    pub payment_address: Option<String>,
    pub ordinals_address: Option<String>,
    pub public_key: Option<String>,
    pub ready: bool,
}

impl ConnectorSnapshot {
    pub fn of<B: WalletBridge + 'static>(connector: &Connector<B>) -> Self {
        Self {
            id: connector.info().id.clone(),
            name: connector.info().name.clone(),
            network: connector.network(),
            state: connector.state(),
            payment_address: connector.payment_address(),
            ordinals_address: connector.ordinals_address(),
            public_key: connector.public_key(),
            ready: connector.ready(),
        }
    }

    pub fn to_js(&self) -> Result<JsValue, JsValue> {
        to_js(self)
    }
}

/// Serialize to a plain JS value: objects rather than `Map`s, `null` for
/// missing optionals.
pub fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Deserialize an optional JS argument. `undefined` and `null` become `None`.
pub fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<Option<T>, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(None);
    }
    serde_wasm_bindgen::from_value(value)
        .map(Some)
        .map_err(|e| JsValue::from_str(&format!("Invalid argument: {}", e)))
}

/// Capture whatever a wallet threw as JSON.
///
/// Strings stay strings and `Error` objects keep their message. Anything
/// that cannot be read becomes `null`.
pub fn js_to_json(value: &JsValue) -> Value {
    if let Some(s) = value.as_string() {
        return Value::String(s);
    }
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return json!({ "message": String::from(err.message()) });
    }
    serde_wasm_bindgen::from_value(value.clone()).unwrap_or(Value::Null)
}

/// Deserialize a JS argument that must be present.
pub fn required_js<T: DeserializeOwned>(name: &str, value: JsValue) -> Result<T, JsValue> {
    from_js(value)?.ok_or_else(|| JsValue::from_str(&format!("Invalid argument: {} is required", name)))
}

/// One-line message for a thrown JS value.
pub fn js_message(value: &JsValue) -> String {
    normalize_external_error(&js_to_json(value))
}

pub fn rejection(value: JsValue) -> WalletError {
    WalletError::Rejected(js_to_json(&value))
}

/// Errors cross into JS as their display message.
pub fn js_error(err: ConnectorError) -> JsValue {
    JsValue::from_str(&err.to_string())
}
