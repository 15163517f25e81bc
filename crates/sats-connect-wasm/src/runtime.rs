//! Browser event-loop runtime.

use std::time::Duration;

use futures::future::LocalBoxFuture;
use js_sys::{Function, Promise, Reflect};
use sats_connect_core::Runtime;
use tracing::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

/// Timers via the global `setTimeout`, tasks via the microtask queue.
///
/// Works in windows and workers alike since it never touches `window`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserRuntime;

impl Runtime for BrowserRuntime {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        let millis = duration.as_millis().min(i32::MAX as u128) as i32;
        let promise = Promise::new(&mut |resolve, _reject| {
            if let Err(err) = set_timeout(&resolve, millis) {
                warn!(?err, "setTimeout unavailable, timer will never fire");
            }
        });
        Box::pin(async move {
            let _ = JsFuture::from(promise).await;
        })
    }

    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }
}

fn set_timeout(callback: &Function, millis: i32) -> Result<JsValue, JsValue> {
    let global = js_sys::global();
    let set_timeout: Function = Reflect::get(&global, &JsValue::from_str("setTimeout"))?.dyn_into()?;
    set_timeout.call2(&global, callback, &JsValue::from(millis))
}
