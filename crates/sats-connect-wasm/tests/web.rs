//! Browser-side checks for the JS surface.

use js_sys::{Array, Object, Reflect};
use sats_connect_wasm::connector::satoshis;
use sats_connect_wasm::state::{js_message, js_to_json};
use sats_connect_wasm::Sat20Connector;
use serde_json::json;
use wasm_bindgen::prelude::*;
use wasm_bindgen_test::*;

#[wasm_bindgen_test]
fn thrown_values_are_normalized() {
    assert_eq!(js_message(&JsValue::from_str("User rejected")), "User rejected");

    let error: JsValue = js_sys::Error::new("locked").into();
    assert_eq!(js_to_json(&error), json!({ "message": "locked" }));
    assert_eq!(js_message(&error), "locked");

    let object = Object::new();
    Reflect::set(&object, &"reason".into(), &"denied".into()).unwrap();
    Reflect::set(&object, &"code".into(), &JsValue::from(4001)).unwrap();
    assert_eq!(js_message(&object.into()), "denied");

    assert_eq!(js_message(&JsValue::UNDEFINED), "Unknown error");
}

#[wasm_bindgen_test]
fn satoshi_amounts_are_validated() {
    assert_eq!(satoshis(1000.0).unwrap(), 1000);
    assert_eq!(satoshis(0.0).unwrap(), 0);
    assert!(satoshis(-1.0).is_err());
    assert!(satoshis(1.5).is_err());
    assert!(satoshis(f64::NAN).is_err());
    assert!(satoshis(9_007_199_254_740_992.0).is_err());
}

#[wasm_bindgen_test]
fn unknown_network_is_rejected() {
    assert!(Sat20Connector::new("signet", JsValue::UNDEFINED).is_err());
}

#[wasm_bindgen_test]
fn connector_without_extension() {
    let connector = Sat20Connector::new("testnet", JsValue::UNDEFINED).unwrap();
    assert_eq!(connector.id(), "sat20");
    assert_eq!(connector.network(), "testnet");
    assert_eq!(connector.network_display_name(), "Bitcoin Testnet");
    assert!(!connector.is_ready());
    assert!(!connector.connected());
    assert_eq!(connector.payment_address(), None);
}

#[wasm_bindgen_test]
async fn connect_without_extension_fails() {
    let connector = Sat20Connector::new("mainnet", JsValue::UNDEFINED).unwrap();
    let err = connector.connect().await.unwrap_err();
    assert_eq!(
        err.as_string().unwrap(),
        "SAT20 wallet not installed. Please install SAT20 browser extension from https://sat20.org/"
    );
}

#[wasm_bindgen_test]
async fn sign_psbt_requires_input_accounts() {
    let connector = Sat20Connector::new("mainnet", JsValue::UNDEFINED).unwrap();
    for missing in [JsValue::UNDEFINED, JsValue::NULL] {
        let err = connector.sign_psbt("70736274ff".into(), missing).await.unwrap_err();
        assert_eq!(
            err.as_string().unwrap(),
            "Invalid argument: inputAccounts is required"
        );
    }
}

#[wasm_bindgen_test]
fn balance_query_waits_for_an_address() {
    let connector = Sat20Connector::new("mainnet", JsValue::UNDEFINED).unwrap();
    let query = connector.balance_query();
    assert!(!query.enabled());
    assert!(!query.structural_sharing());
    assert_eq!(query.refetch_interval(), Some(30_000.0));

    let key: Array = query.query_key().unwrap().dyn_into().unwrap();
    assert_eq!(key.length(), 3);
    assert_eq!(key.get(0).as_string().unwrap(), "sats-balance");
    assert_eq!(key.get(1).as_string().unwrap(), "mainnet");
    assert!(key.get(2).is_null());
}

#[wasm_bindgen_test]
fn account_subscription_is_inert_without_extension() {
    let connector = Sat20Connector::new("mainnet", JsValue::UNDEFINED).unwrap();
    let callback = js_sys::Function::new_no_args("");
    let mut subscription = connector.on(callback);
    assert!(subscription.active());
    connector.remove_listener(&mut subscription);
    assert!(!subscription.active());
}
