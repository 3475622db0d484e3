use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};

/// The authenticated user, as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Principal {
    /// Uppercased first character of the display name, else the email, else `?`.
    pub fn initial(&self) -> char {
        [self.display_name.as_deref(), self.email.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|value| value.trim().chars().next())
            .map(|ch| ch.to_uppercase().next().unwrap_or(ch))
            .unwrap_or('?')
    }

    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(self.id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEvent {
    Changed(Option<Principal>),
    Error(String),
}

pub type IdentityListener = Box<dyn FnMut(&IdentityEvent) + Send>;

/// The identity provider as seen by the application.
pub trait IdentityGateway {
    fn current_principal(&self) -> Option<Principal>;
    fn sign_in(&mut self, email: &str, display_name: Option<&str>) -> anyhow::Result<Principal>;
    fn sign_out(&mut self) -> anyhow::Result<()>;
    fn update_display_name(&mut self, name: &str) -> anyhow::Result<Principal>;
    /// Registers a listener. Implementations deliver the current state right away.
    fn subscribe(&mut self, listener: IdentityListener) -> Subscription;
}

/// A slot is empty while its listener runs.
type ListenerMap = BTreeMap<u64, Option<IdentityListener>>;

#[derive(Default)]
struct ListenerSetInner {
    next_id: u64,
    listeners: ListenerMap,
}

/// Registry of identity listeners shared between a gateway and its subscriptions.
#[derive(Clone, Default)]
pub struct ListenerSet {
    inner: Arc<Mutex<ListenerSetInner>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: IdentityListener) -> Subscription {
        let id = match self.inner.lock() {
            Ok(mut guard) => {
                let id = guard.next_id;
                guard.next_id += 1;
                guard.listeners.insert(id, Some(listener));
                id
            }
            Err(_) => u64::MAX,
        };
        Subscription {
            id,
            set: Arc::downgrade(&self.inner),
        }
    }

    /// Listeners run without the registry lock held, so they may subscribe or
    /// drop subscriptions. A listener that is already running is skipped.
    pub fn notify(&self, event: &IdentityEvent) {
        let taken = self.take(None);
        self.run(taken, event);
    }

    /// Delivers an event to a single listener.
    pub fn notify_one(&self, subscription: &Subscription, event: &IdentityEvent) {
        let taken = self.take(Some(subscription.id));
        self.run(taken, event);
    }

    fn take(&self, only: Option<u64>) -> Vec<(u64, IdentityListener)> {
        let Ok(mut guard) = self.inner.lock() else {
            return Vec::new();
        };
        guard
            .listeners
            .iter_mut()
            .filter(|(id, _)| only.map_or(true, |only| only == **id))
            .filter_map(|(id, slot)| slot.take().map(|listener| (*id, listener)))
            .collect()
    }

    fn run(&self, taken: Vec<(u64, IdentityListener)>, event: &IdentityEvent) {
        for (id, mut listener) in taken {
            if !self.is_registered(id) {
                continue;
            }
            listener(event);
            if let Ok(mut guard) = self.inner.lock() {
                if let Some(slot) = guard.listeners.get_mut(&id) {
                    *slot = Some(listener);
                }
            }
        }
    }

    fn is_registered(&self, id: u64) -> bool {
        self.inner
            .lock()
            .map(|guard| guard.listeners.contains_key(&id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .map(|guard| guard.listeners.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle returned by [`IdentityGateway::subscribe`]. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    set: Weak<Mutex<ListenerSetInner>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}

    fn detach(&mut self) {
        if let Some(set) = self.set.upgrade() {
            if let Ok(mut guard) = set.lock() {
                guard.listeners.remove(&self.id);
            }
        }
        self.set = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}
