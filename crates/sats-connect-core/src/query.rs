//! Cache-keyed, polling balance reads.
//!
//! [`use_balance`] describes a query: key, enablement, refetch interval and
//! fetch function. Any keyed/polling cache can execute it; [`QueryCache`] is
//! a minimal one for hosts that do not bring their own.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::network::Network;
use crate::runtime::Runtime;

/// Fixed tag leading every balance query key.
pub const BALANCE_QUERY_TAG: &str = "sats-balance";

pub const BALANCE_REFETCH_INTERVAL: Duration = Duration::from_secs(30);

/// Largest integer a JS number holds exactly (2^53 - 1).
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

/// Where queries read the active network and address from.
pub trait AccountContext {
    fn network(&self) -> Network;
    fn address(&self) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("no active address")]
    NoAddress,
    #[error("{field} balance {value} exceeds the safe integer range")]
    OutOfRange { field: &'static str, value: i128 },
    #[error("{0}")]
    Source(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct QueryKey(Vec<Option<String>>);

impl QueryKey {
    pub fn new(parts: Vec<Option<String>>) -> Self {
        Self(parts)
    }

    /// `["sats-balance", network, address]`
    pub fn balance(network: Network, address: Option<&str>) -> Self {
        Self(vec![
            Some(BALANCE_QUERY_TAG.to_string()),
            Some(network.name().to_string()),
            address.map(str::to_string),
        ])
    }

    pub fn parts(&self) -> &[Option<String>] {
        &self.0
    }
}

pub type Fetcher<T> = Rc<dyn Fn() -> LocalBoxFuture<'static, Result<T, QueryError>>>;

/// Everything a cache layer needs to run one query.
pub struct QueryOptions<T> {
    pub key: QueryKey,
    pub enabled: bool,
    pub refetch_interval: Option<Duration>,
    /// Keep the previous value when a refetch returns an equal one.
    pub structural_sharing: bool,
    pub fetcher: Fetcher<T>,
}

impl<T> QueryOptions<T> {
    pub fn fetch(&self) -> LocalBoxFuture<'static, Result<T, QueryError>> {
        (self.fetcher)()
    }
}

impl<T> Clone for QueryOptions<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            enabled: self.enabled,
            refetch_interval: self.refetch_interval,
            structural_sharing: self.structural_sharing,
            fetcher: Rc::clone(&self.fetcher),
        }
    }
}

/// Balance as delivered by a source, in satoshis.
///
/// Unconfirmed amounts can be negative while spends sit in the mempool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawBalance {
    pub confirmed: i128,
    pub unconfirmed: i128,
    pub total: i128,
}

/// Balance safe to hand to JS caches: every field fits a JS number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balance {
    pub confirmed: i64,
    pub unconfirmed: i64,
    pub total: i64,
}

impl TryFrom<RawBalance> for Balance {
    type Error = QueryError;

    fn try_from(raw: RawBalance) -> Result<Self, Self::Error> {
        let safe = |field: &'static str, value: i128| -> Result<i64, QueryError> {
            i64::try_from(value)
                .ok()
                .filter(|v| v.unsigned_abs() <= MAX_SAFE_INTEGER as u64)
                .ok_or(QueryError::OutOfRange { field, value })
        };

        Ok(Balance {
            confirmed: safe("confirmed", raw.confirmed)?,
            unconfirmed: safe("unconfirmed", raw.unconfirmed)?,
            total: safe("total", raw.total)?,
        })
    }
}

/// Esplora `GET /address/{address}` response, the parts we read.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressStats {
    pub chain_stats: TxoStats,
    pub mempool_stats: TxoStats,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TxoStats {
    pub funded_txo_sum: u64,
    pub spent_txo_sum: u64,
}

impl TxoStats {
    fn net(&self) -> i128 {
        i128::from(self.funded_txo_sum) - i128::from(self.spent_txo_sum)
    }
}

impl From<AddressStats> for RawBalance {
    fn from(stats: AddressStats) -> Self {
        let confirmed = stats.chain_stats.net();
        let unconfirmed = stats.mempool_stats.net();
        RawBalance {
            confirmed,
            unconfirmed,
            total: confirmed + unconfirmed,
        }
    }
}

#[async_trait(?Send)]
pub trait BalanceSource {
    async fn balance(&self, network: Network, address: &str) -> Result<RawBalance, QueryError>;
}

/// Balance query for the context's active address.
///
/// Disabled until an address is known; refetches every 30 seconds.
/// Structural sharing is off so every refetch hands out a fresh value.
pub fn use_balance<C, S>(context: &C, source: Rc<S>) -> QueryOptions<Balance>
where
    C: AccountContext + ?Sized,
    S: BalanceSource + 'static,
{
    let network = context.network();
    let address = context.address();

    let fetcher: Fetcher<Balance> = {
        let address = address.clone();
        Rc::new(move || -> LocalBoxFuture<'static, Result<Balance, QueryError>> {
            let source = Rc::clone(&source);
            let address = address.clone();
            Box::pin(async move {
                let address = address.ok_or(QueryError::NoAddress)?;
                let raw = source.balance(network, &address).await?;
                Balance::try_from(raw)
            })
        })
    };

    QueryOptions {
        key: QueryKey::balance(network, address.as_deref()),
        enabled: address.is_some(),
        refetch_interval: Some(BALANCE_REFETCH_INTERVAL),
        structural_sharing: false,
        fetcher,
    }
}

struct Entry<T> {
    data: Rc<T>,
    updates: u64,
}

/// In-memory query results keyed by [`QueryKey`].
pub struct QueryCache<T> {
    entries: RefCell<HashMap<QueryKey, Entry<T>>>,
}

impl<T> Default for QueryCache<T> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
        }
    }
}

impl<T: PartialEq> QueryCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &QueryKey) -> Option<Rc<T>> {
        self.entries.borrow().get(key).map(|entry| Rc::clone(&entry.data))
    }

    /// How many times the value under `key` has been replaced.
    pub fn updates(&self, key: &QueryKey) -> u64 {
        self.entries.borrow().get(key).map_or(0, |entry| entry.updates)
    }

    pub fn invalidate(&self, key: &QueryKey) {
        self.entries.borrow_mut().remove(key);
    }

    /// Run the query once. Disabled queries do not fetch and yield `None`.
    pub async fn fetch(&self, options: &QueryOptions<T>) -> Result<Option<Rc<T>>, QueryError> {
        if !options.enabled {
            return Ok(None);
        }
        let value = options.fetch().await?;
        Ok(Some(self.store(&options.key, value, options.structural_sharing)))
    }

    /// Fetch now and again after every refetch interval, handing each new
    /// value to `on_data`.
    ///
    /// Returns immediately for disabled queries and after one fetch for
    /// queries without an interval. Failed fetches are logged and retried on
    /// the next tick.
    pub async fn poll<F>(&self, options: &QueryOptions<T>, runtime: &dyn Runtime, mut on_data: F)
    where
        F: FnMut(Rc<T>),
    {
        if !options.enabled {
            debug!(key = ?options.key, "query disabled");
            return;
        }

        loop {
            let before = self.updates(&options.key);
            match self.fetch(options).await {
                Ok(Some(data)) if self.updates(&options.key) != before => on_data(data),
                Ok(_) => {}
                Err(err) => warn!(key = ?options.key, %err, "query fetch failed"),
            }
            match options.refetch_interval {
                Some(interval) => runtime.sleep(interval).await,
                None => return,
            }
        }
    }

    fn store(&self, key: &QueryKey, value: T, structural_sharing: bool) -> Rc<T> {
        let mut entries = self.entries.borrow_mut();
        match entries.get_mut(key) {
            Some(entry) if structural_sharing && *entry.data == value => Rc::clone(&entry.data),
            Some(entry) => {
                entry.data = Rc::new(value);
                entry.updates += 1;
                Rc::clone(&entry.data)
            }
            None => {
                let data = Rc::new(value);
                entries.insert(
                    key.clone(),
                    Entry {
                        data: Rc::clone(&data),
                        updates: 1,
                    },
                );
                data
            }
        }
    }
}
