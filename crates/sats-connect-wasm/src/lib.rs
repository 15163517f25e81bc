//! WebAssembly bindings for the SAT20 browser wallet connector.
//!
//! This crate provides JavaScript-accessible APIs for:
//! - Connecting to the injected `window.sat20` provider
//! - Signing and broadcasting through the connected wallet
//! - Polling an address balance from an Esplora endpoint

use wasm_bindgen::prelude::*;

pub mod api;
pub mod connector;
pub mod logging;
pub mod runtime;
pub mod sat20;
pub mod state;

// Re-export main types for JS access
pub use api::EsploraClient;
pub use connector::{AccountSubscription, BalanceQuery, BalanceWatch, Sat20Connector};
pub use logging::init_logging;
pub use runtime::BrowserRuntime;
pub use sat20::Sat20Bridge;

/// Initialize the WASM module with better panic messages.
///
/// Logging stays off until `initLogging()` is called.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
