//! Connection lifecycle for one injected wallet.
//!
//! A [`Connector`] caches the last-known session of a [`WalletBridge`]:
//! network, payment/ordinals address and public key. `connect()` negotiates
//! that session and registers listeners so later account or network changes
//! made inside the extension are mirrored without reconnecting.
//!
//! Connection steps:
//! 1. read the wallet network (bounded, soft; falls back to the target)
//! 2. switch to the target network when they differ (bounded, soft)
//! 3. request accounts (bounded, fatal when empty)
//! 4. read the public key (bounded, fatal when empty)

use std::cell::RefCell;
use std::future::Future;
use std::rc::{Rc, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::address::{AddressClassifier, AddressType, ScriptTypeClassifier};
use crate::bridge::*;
use crate::error::{ConnectFailure, ConnectorError, ConnectorResult, WalletError};
use crate::events::{EventHandler, Subscription, WalletEvent, WalletEventKind};
use crate::network::{to_canonical, to_native, Network, WalletNetwork};
use crate::query::AccountContext;
use crate::runtime::Runtime;
use crate::timeout::with_timeout;

/// Budget for reading or switching the wallet network.
pub const NETWORK_TIMEOUT: Duration = Duration::from_secs(5);

/// Budget for account access and public key retrieval.
pub const ACCOUNTS_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity metadata shown by wallet pickers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletInfo {
    pub id: String,
    pub name: String,
    pub homepage: String,
    pub icon: Option<String>,
}

impl WalletInfo {
    pub fn sat20() -> Self {
        Self {
            id: "sat20".into(),
            name: "SAT20".into(),
            homepage: "https://sat20.org/".into(),
            icon: None,
        }
    }
}

/// Connector settings supplied by the host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectorConfig {
    /// Network the application wants the wallet on.
    pub network: Network,
    #[serde(rename = "networkTimeoutMs", with = "millis")]
    pub network_timeout: Duration,
    #[serde(rename = "accountsTimeoutMs", with = "millis")]
    pub accounts_timeout: Duration,
}

impl ConnectorConfig {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            ..Self::default()
        }
    }
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            network_timeout: NETWORK_TIMEOUT,
            accounts_timeout: ACCOUNTS_TIMEOUT,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Inputs of a PSBT that belong to one account.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PsbtInputAccounts {
    #[serde(default)]
    pub address: String,
    pub signing_indexes: Vec<u32>,
}

#[derive(Debug, Default)]
struct Session {
    network: Network,
    state: ConnectionState,
    payment_address: Option<String>,
    ordinals_address: Option<String>,
    public_key: Option<String>,
    ready: bool,
    /// Bumped whenever the active account changes; a public key fetched for
    /// an older epoch is discarded.
    epoch: u64,
}

impl Session {
    fn adopt_account(&mut self, account: String) -> u64 {
        self.payment_address = Some(account.clone());
        // single address space: ordinals live on the payment address
        self.ordinals_address = Some(account);
        self.epoch += 1;
        self.epoch
    }

    fn clear(&mut self) {
        self.payment_address = None;
        self.ordinals_address = None;
        self.public_key = None;
        self.state = ConnectionState::Disconnected;
        self.epoch += 1;
    }
}

struct Established {
    network: Network,
    account: String,
    public_key: String,
}

/// Bridge between an application and one wallet extension.
pub struct Connector<B: WalletBridge + 'static> {
    info: WalletInfo,
    config: ConnectorConfig,
    bridge: Option<Rc<B>>,
    runtime: Rc<dyn Runtime>,
    classifier: Rc<dyn AddressClassifier>,
    session: Rc<RefCell<Session>>,
    listeners: RefCell<Vec<Subscription>>,
}

impl<B: WalletBridge + 'static> Connector<B> {
    /// `bridge` is `None` when the extension is not installed.
    pub fn new(
        info: WalletInfo,
        config: ConnectorConfig,
        bridge: Option<Rc<B>>,
        runtime: Rc<dyn Runtime>,
    ) -> Self {
        let session = Session {
            network: config.network,
            ready: bridge.is_some(),
            ..Session::default()
        };

        Self {
            info,
            config,
            bridge,
            runtime,
            classifier: Rc::new(ScriptTypeClassifier),
            session: Rc::new(RefCell::new(session)),
            listeners: RefCell::new(Vec::new()),
        }
    }

    pub fn with_classifier(mut self, classifier: impl AddressClassifier + 'static) -> Self {
        self.classifier = Rc::new(classifier);
        self
    }

    pub fn info(&self) -> &WalletInfo {
        &self.info
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn network(&self) -> Network {
        self.session.borrow().network
    }

    pub fn payment_address(&self) -> Option<String> {
        self.session.borrow().payment_address.clone()
    }

    pub fn ordinals_address(&self) -> Option<String> {
        self.session.borrow().ordinals_address.clone()
    }

    pub fn public_key(&self) -> Option<String> {
        self.session.borrow().public_key.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.session.borrow().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Reachability as of the last [`Connector::is_ready`] check.
    pub fn ready(&self) -> bool {
        self.session.borrow().ready
    }

    /// Re-check whether the extension is reachable. Never fails.
    pub fn is_ready(&self) -> bool {
        let ready = self.bridge.as_ref().is_some_and(|bridge| bridge.is_available());
        self.session.borrow_mut().ready = ready;
        if !ready {
            debug!(wallet = %self.info.name, "wallet not detected");
        }
        ready
    }

    /// Negotiate a session with the wallet.
    ///
    /// Concurrent calls are not serialised; callers await one `connect()`
    /// before issuing the next.
    pub async fn connect(&self) -> ConnectorResult<()> {
        let bridge = self.bridge()?;

        let previous = {
            let mut session = self.session.borrow_mut();
            std::mem::replace(&mut session.state, ConnectionState::Connecting)
        };
        debug!(wallet = %self.info.name, target = %self.config.network, "connecting");

        let established = match self.negotiate(&bridge).await {
            Ok(established) => established,
            Err(reason) => {
                self.session.borrow_mut().state = previous;
                warn!(wallet = %self.info.name, %reason, "connection failed");
                return Err(ConnectorError::ConnectionFailed {
                    wallet: self.info.name.clone(),
                    reason,
                });
            }
        };

        self.listen(&bridge);

        let mut session = self.session.borrow_mut();
        session.network = established.network;
        session.adopt_account(established.account);
        session.public_key = Some(established.public_key);
        session.state = ConnectionState::Connected;
        info!(
            wallet = %self.info.name,
            network = %session.network,
            address = session.payment_address.as_deref().unwrap_or_default(),
            "connected"
        );
        Ok(())
    }

    /// Drop the cached session and stop mirroring wallet events.
    pub fn disconnect(&self) {
        self.listeners.borrow_mut().clear();
        self.session.borrow_mut().clear();
        info!(wallet = %self.info.name, "disconnected");
    }

    /// Adopt `account` as the active address and refresh the public key.
    ///
    /// A failed refresh is logged; the address change stands.
    pub async fn change_account(&self, account: &str) {
        let epoch = self.session.borrow_mut().adopt_account(account.to_string());
        if let Some(bridge) = &self.bridge {
            refresh_public_key(Rc::downgrade(&self.session), Rc::clone(bridge), epoch).await;
        }
    }

    pub fn change_network(&self, network: WalletNetwork) {
        self.session.borrow_mut().network = to_canonical(network);
    }

    pub async fn sign_message(&self, message: &str) -> ConnectorResult<String> {
        let bridge = self.bridge()?;
        Ok(bridge.sign_message(message, None).await?)
    }

    /// Sign the inputs listed in `input_accounts` with the connected key.
    ///
    /// The PSBT is left unfinalized.
    pub async fn sign_psbt(
        &self,
        psbt_hex: &str,
        input_accounts: &[PsbtInputAccounts],
    ) -> ConnectorResult<String> {
        let bridge = self.bridge()?;

        let (public_key, payment_address) = {
            let session = self.session.borrow();
            match (&session.public_key, &session.payment_address) {
                (Some(key), Some(address)) => (key.clone(), address.clone()),
                _ => {
                    return Err(ConnectorError::NotConnected {
                        wallet: self.info.name.clone(),
                    })
                }
            }
        };

        let payment_type = self.classifier.address_type(&payment_address);
        let options = SignPsbtOptions {
            auto_finalized: false,
            to_sign_inputs: signer_inputs(input_accounts, &public_key, payment_type),
        };

        Ok(bridge.sign_psbt(psbt_hex, Some(options)).await?)
    }

    pub async fn sign_psbts(
        &self,
        psbt_hexs: Vec<String>,
        options: Option<Vec<SignPsbtOptions>>,
    ) -> ConnectorResult<Vec<String>> {
        let bridge = self.bridge()?;
        Ok(bridge.sign_psbts(psbt_hexs, options).await?)
    }

    pub async fn send_to_address(&self, to_address: &str, satoshis: u64) -> ConnectorResult<String> {
        let bridge = self.bridge()?;
        Ok(bridge.send_bitcoin(to_address, satoshis, None).await?)
    }

    pub async fn push_tx(&self, raw_tx: &str) -> ConnectorResult<String> {
        let bridge = self.bridge()?;
        Ok(bridge.push_tx(raw_tx).await?)
    }

    pub async fn push_psbt(&self, psbt_hex: &str) -> ConnectorResult<String> {
        let bridge = self.bridge()?;
        Ok(bridge.push_psbt(psbt_hex).await?)
    }

    pub async fn get_balance(&self) -> ConnectorResult<WalletBalance> {
        let bridge = self.bridge()?;
        Ok(bridge.get_balance().await?)
    }

    pub async fn get_inscriptions(&self, cursor: u32, size: u32) -> ConnectorResult<InscriptionPage> {
        let bridge = self.bridge()?;
        Ok(bridge.get_inscriptions(cursor, size).await?)
    }

    pub async fn send_inscription(
        &self,
        address: &str,
        inscription_id: &str,
        options: Option<FeeOptions>,
    ) -> ConnectorResult<SendInscriptionResult> {
        let bridge = self.bridge()?;
        Ok(bridge.send_inscription(address, inscription_id, options).await?)
    }

    pub async fn add_accounts(&self, count: u32) -> ConnectorResult<()> {
        let bridge = self.bridge()?;
        Ok(bridge.add_accounts(count).await?)
    }

    /// Call `callback` with the new active address whenever the wallet
    /// switches accounts. The connector's own session follows while
    /// connected.
    ///
    /// Without an installed wallet the returned handle is inert.
    pub fn on_account_change(&self, callback: impl Fn(&str) + 'static) -> Subscription {
        let Some(bridge) = &self.bridge else {
            return Subscription::noop();
        };

        let session = Rc::downgrade(&self.session);
        let weak_bridge = Rc::downgrade(bridge);
        let runtime = Rc::clone(&self.runtime);
        let handler: EventHandler = Rc::new(move |event: &WalletEvent| {
            let WalletEvent::AccountsChanged(accounts) = event else {
                return;
            };
            if let Some(account) = accounts.first() {
                callback(account);
                follow_account(&session, &weak_bridge, runtime.as_ref(), account);
            }
        });

        bridge.subscribe(WalletEventKind::AccountsChanged, handler)
    }

    fn bridge(&self) -> ConnectorResult<Rc<B>> {
        self.bridge
            .clone()
            .ok_or_else(|| ConnectorError::WalletNotInstalled {
                wallet: self.info.name.clone(),
                homepage: self.info.homepage.clone(),
            })
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        duration: Duration,
        call: impl Future<Output = WalletResult<T>>,
    ) -> WalletResult<T> {
        match with_timeout(self.runtime.as_ref(), operation, duration, call).await {
            Ok(result) => result,
            Err(elapsed) => Err(WalletError::Timeout(elapsed)),
        }
    }

    async fn negotiate(&self, bridge: &B) -> Result<Established, ConnectFailure> {
        let wallet = &self.info.name;
        let target = self.config.network;

        let reported = match self
            .bounded("Get network", self.config.network_timeout, bridge.get_network())
            .await
        {
            Ok(network) => network,
            Err(err) => {
                warn!(wallet = %wallet, %err, "failed to get network, assuming target");
                to_native(target)
            }
        };

        let mut network = to_canonical(reported);
        if network != target {
            debug!(wallet = %wallet, from = %network, to = %target, "switching network");
            match self
                .bounded(
                    "Switch network",
                    self.config.network_timeout,
                    bridge.switch_network(to_native(target)),
                )
                .await
            {
                Ok(()) => network = target,
                Err(err) => {
                    warn!(wallet = %wallet, %err, "failed to switch network, continuing on wallet network")
                }
            }
        }

        let accounts = self
            .bounded("Request accounts", self.config.accounts_timeout, bridge.request_accounts())
            .await
            .map_err(|err| ConnectFailure::NoAccountsReturned {
                wallet: wallet.clone(),
                message: err.message(),
            })?;
        let account = accounts
            .into_iter()
            .next()
            .ok_or_else(|| ConnectFailure::NoAccountsReturned {
                wallet: wallet.clone(),
                message: format!("No accounts returned from {wallet} wallet"),
            })?;

        let public_key = self
            .bounded("Get public key", self.config.accounts_timeout, bridge.get_public_key())
            .await
            .map_err(|err| ConnectFailure::NoPublicKeyReturned {
                wallet: wallet.clone(),
                message: err.message(),
            })?;
        if public_key.is_empty() {
            return Err(ConnectFailure::NoPublicKeyReturned {
                wallet: wallet.clone(),
                message: format!("No public key returned from {wallet} wallet"),
            });
        }

        Ok(Established {
            network,
            account,
            public_key,
        })
    }

    /// Replace the persistent account/network listeners.
    fn listen(&self, bridge: &Rc<B>) {
        let accounts = {
            let session = Rc::downgrade(&self.session);
            let weak_bridge = Rc::downgrade(bridge);
            let runtime = Rc::clone(&self.runtime);
            let handler: EventHandler = Rc::new(move |event: &WalletEvent| {
                if let WalletEvent::AccountsChanged(accounts) = event {
                    if let Some(account) = accounts.first() {
                        follow_account(&session, &weak_bridge, runtime.as_ref(), account);
                    }
                }
            });
            bridge.subscribe(WalletEventKind::AccountsChanged, handler)
        };

        let network = {
            let session = Rc::downgrade(&self.session);
            let handler: EventHandler = Rc::new(move |event: &WalletEvent| {
                if let (WalletEvent::NetworkChanged(network), Some(session)) = (event, session.upgrade()) {
                    session.borrow_mut().network = to_canonical(*network);
                    debug!(network = %network, "wallet network changed");
                }
            });
            bridge.subscribe(WalletEventKind::NetworkChanged, handler)
        };

        let mut listeners = self.listeners.borrow_mut();
        listeners.clear();
        listeners.push(accounts);
        listeners.push(network);
    }
}

impl<B: WalletBridge + 'static> AccountContext for Connector<B> {
    fn network(&self) -> Network {
        Connector::network(self)
    }

    fn address(&self) -> Option<String> {
        self.payment_address()
    }
}

/// Flatten per-account signing indexes into one signer descriptor per input.
///
/// The tweak signer stays enabled only for taproot payment addresses.
pub fn signer_inputs(
    input_accounts: &[PsbtInputAccounts],
    public_key: &str,
    payment_type: Option<AddressType>,
) -> Vec<ToSignInput> {
    let disable_tweak_signer = !payment_type.is_some_and(|t| t.is_taproot());

    input_accounts
        .iter()
        .flat_map(|account| account.signing_indexes.iter().copied())
        .map(|index| ToSignInput {
            index,
            public_key: Some(public_key.to_string()),
            disable_tweak_signer: Some(disable_tweak_signer),
            ..Default::default()
        })
        .collect()
}

/// Event-handler side of an account switch: update now, refresh the key later.
///
/// Ignored unless the session is connected.
fn follow_account<B: WalletBridge + 'static>(
    session: &Weak<RefCell<Session>>,
    bridge: &Weak<B>,
    runtime: &dyn Runtime,
    account: &str,
) {
    let (Some(strong), Some(bridge)) = (session.upgrade(), bridge.upgrade()) else {
        return;
    };
    let epoch = {
        let mut session = strong.borrow_mut();
        if session.state != ConnectionState::Connected {
            debug!(account, "ignoring account change while not connected");
            return;
        }
        session.adopt_account(account.to_string())
    };
    debug!(account, "wallet account changed");

    let session = session.clone();
    runtime.spawn_local(Box::pin(async move {
        refresh_public_key(session, bridge, epoch).await;
    }));
}

async fn refresh_public_key<B: WalletBridge + ?Sized>(
    session: Weak<RefCell<Session>>,
    bridge: Rc<B>,
    epoch: u64,
) {
    match bridge.get_public_key().await {
        Ok(public_key) => {
            let Some(session) = session.upgrade() else {
                return;
            };
            let mut session = session.borrow_mut();
            if session.epoch == epoch {
                session.public_key = Some(public_key);
            } else {
                debug!("discarding public key fetched for a previous account");
            }
        }
        Err(err) => warn!(%err, "failed to refresh public key after account change"),
    }
}
