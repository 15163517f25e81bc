//! Esplora-compatible REST client used as the balance source.

use async_trait::async_trait;
use sats_connect_core::query::AddressStats;
use sats_connect_core::{BalanceSource, Network, QueryError, RawBalance};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, RequestMode, Response};

use crate::state::js_message;

/// Address statistics from mempool.space or a custom Esplora host.
#[derive(Debug, Clone, Default)]
pub struct EsploraClient {
    /// Overrides the per-network mempool.space endpoint.
    base_url: Option<String>,
}

impl EsploraClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: Some(base_url.trim_end_matches('/').to_string()),
        }
    }

    pub fn base_url(&self, network: Network) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| network.mempool_api_url().to_string())
    }

    /// `GET {base}/address/{address}`.
    pub async fn address_stats(
        &self,
        network: Network,
        address: &str,
    ) -> Result<AddressStats, JsValue> {
        let url = format!("{}/address/{}", self.base_url(network), address);
        let json = fetch_json(&url).await?;
        serde_wasm_bindgen::from_value(json)
            .map_err(|e| JsValue::from_str(&format!("Failed to parse address stats: {}", e)))
    }
}

#[async_trait(?Send)]
impl BalanceSource for EsploraClient {
    async fn balance(&self, network: Network, address: &str) -> Result<RawBalance, QueryError> {
        self.address_stats(network, address)
            .await
            .map(RawBalance::from)
            .map_err(|e| QueryError::Source(js_message(&e)))
    }
}

async fn fetch_json(url: &str) -> Result<JsValue, JsValue> {
    let opts = RequestInit::new();
    opts.set_method("GET");
    opts.set_mode(RequestMode::Cors);

    let request = Request::new_with_str_and_init(url, &opts)?;

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
    let resp_value = JsFuture::from(window.fetch_with_request(&request)).await?;
    let resp: Response = resp_value.dyn_into()?;

    if !resp.ok() {
        return Err(JsValue::from_str(&format!("HTTP error: {}", resp.status())));
    }

    JsFuture::from(resp.json()?).await
}
