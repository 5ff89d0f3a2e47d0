//! In-process change broadcast.
//!
//! A [`ChangeNotifier`] is a cheap, cloneable handle; every clone shares the
//! same subscriber table. Handlers receive no payload and are expected to
//! re-read whatever state they display.
//!
//! Invariants:
//!
//! 1. Handlers for a topic run in registration order.
//! 2. `publish` works from a snapshot of the handler list taken when it
//!    starts; subscribing or unsubscribing from inside a handler only
//!    affects later publishes.
//! 3. Unsubscribing an unknown or already removed id is a no-op.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    LedgerChanged,
    PointsChanged,
    CookiesChanged,
}

impl Topic {
    pub fn name(self) -> &'static str {
        match self {
            Self::LedgerChanged => "ledger changed",
            Self::PointsChanged => "points changed",
            Self::CookiesChanged => "cookie list changed",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Rc<dyn Fn()>;

struct Registration {
    id: SubscriptionId,
    topic: Topic,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    registrations: Vec<Registration>,
}

#[derive(Clone, Default)]
pub struct ChangeNotifier {
    inner: Rc<RefCell<Registry>>,
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: Fn() + 'static,
    {
        let mut registry = self.inner.borrow_mut();
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry.registrations.push(Registration {
            id,
            topic,
            handler: Rc::new(handler),
        });
        id
    }

    /// Like [`subscribe`](Self::subscribe) but released when the returned
    /// guard is dropped.
    pub fn subscribe_scoped<F>(&self, topic: Topic, handler: F) -> Subscription
    where
        F: Fn() + 'static,
    {
        let id = self.subscribe(topic, handler);
        Subscription {
            registry: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Returns `false` when the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        remove_registration(&self.inner, id)
    }

    pub fn publish(&self, topic: Topic) {
        let dispatch: Vec<Handler> = self
            .inner
            .borrow()
            .registrations
            .iter()
            .filter(|registration| registration.topic == topic)
            .map(|registration| Rc::clone(&registration.handler))
            .collect();

        trace!(topic = %topic, handlers = dispatch.len(), "publishing");
        for handler in dispatch {
            handler();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().registrations.len()
    }

}

fn remove_registration(registry: &RefCell<Registry>, id: SubscriptionId) -> bool {
    let mut registry = registry.borrow_mut();
    match registry
        .registrations
        .iter()
        .position(|registration| registration.id == id)
    {
        Some(index) => {
            registry.registrations.remove(index);
            true
        }
        None => false,
    }
}

/// Registration guard; unsubscribes on drop.
#[must_use = "dropping a Subscription unsubscribes it immediately"]
pub struct Subscription {
    registry: Weak<RefCell<Registry>>,
    id: SubscriptionId,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            remove_registration(&registry, self.id);
        }
    }
}
