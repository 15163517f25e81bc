//! Wallet notifications and subscription handles.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::network::WalletNetwork;

/// Notification kinds a wallet can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalletEventKind {
    AccountsChanged,
    NetworkChanged,
    EnvironmentChanged,
}

impl WalletEventKind {
    /// Event name used by injected wallet objects.
    pub fn name(&self) -> &'static str {
        match self {
            WalletEventKind::AccountsChanged => "accountsChanged",
            WalletEventKind::NetworkChanged => "networkChanged",
            WalletEventKind::EnvironmentChanged => "environmentChanged",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<String>),
    NetworkChanged(WalletNetwork),
    EnvironmentChanged(String),
}

impl WalletEvent {
    pub fn kind(&self) -> WalletEventKind {
        match self {
            WalletEvent::AccountsChanged(_) => WalletEventKind::AccountsChanged,
            WalletEvent::NetworkChanged(_) => WalletEventKind::NetworkChanged,
            WalletEvent::EnvironmentChanged(_) => WalletEventKind::EnvironmentChanged,
        }
    }
}

pub type EventHandler = Rc<dyn Fn(&WalletEvent)>;

/// Registration handle for an event handler.
///
/// Calling [`Subscription::unsubscribe`] or dropping the handle removes the
/// exact handler it was created for.
#[must_use = "dropping a Subscription unregisters its handler"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to unregister.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: Vec<(u64, WalletEventKind, EventHandler)>,
}

/// Single-threaded handler registry keyed by event kind.
#[derive(Clone, Default)]
pub struct EventHub {
    registry: Rc<RefCell<Registry>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, kind: WalletEventKind, handler: EventHandler) -> Subscription {
        let id = {
            let mut registry = self.registry.borrow_mut();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.handlers.push((id, kind, handler));
            id
        };

        let registry: Weak<RefCell<Registry>> = Rc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.borrow_mut().handlers.retain(|(entry, _, _)| *entry != id);
            }
        })
    }

    /// Deliver `event` to every handler registered for its kind.
    pub fn emit(&self, event: &WalletEvent) {
        let kind = event.kind();
        // Handlers may (un)subscribe while running.
        let targets: Vec<EventHandler> = self
            .registry
            .borrow()
            .handlers
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, handler)| Rc::clone(handler))
            .collect();

        for handler in targets {
            handler(event);
        }
    }

    pub fn listener_count(&self, kind: WalletEventKind) -> usize {
        self.registry
            .borrow()
            .handlers
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .count()
    }
}
