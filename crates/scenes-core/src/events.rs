//! Listener tables, typed event buses and subscription handles
//!
//! Every scene node owns an [`EventBus`] and every object base owns a state
//! listener table. Both hand out [`Subscription`] handles that detach the
//! listener when dropped. Notification always runs on a snapshot of the
//! listener list so callbacks may subscribe or unsubscribe re-entrantly.

use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Marker for events published on scene nodes
pub trait SceneEvent: Any + Send + Sync + fmt::Debug {
    /// Stable event type name used in logs
    fn event_type(&self) -> &'static str;
}

/// Listener callback
pub type Callback<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// Anything a [`Subscription`] can detach from
pub(crate) trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

/// Ordered table of listeners
pub struct ListenerTable<A: ?Sized + 'static> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Callback<A>)>>,
}

impl<A: ?Sized + 'static> ListenerTable<A> {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        })
    }

    /// Register a listener
    pub fn add(self: &Arc<Self>, callback: Callback<A>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().push((id, callback));
        let target: Weak<dyn Detach> = Arc::downgrade(self) as Weak<dyn Detach>;
        Subscription {
            inner: SubscriptionInner::Listener { target, id },
        }
    }

    /// Invoke every listener registered at call time, in registration order
    pub fn notify(&self, arg: &A) {
        let snapshot: Vec<Callback<A>> = self
            .entries
            .lock()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in snapshot {
            callback(arg);
        }
    }

    /// Drop every listener
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of registered listeners
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if no listener is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<A: ?Sized + 'static> Detach for ListenerTable<A> {
    fn detach(&self, id: u64) {
        self.entries.lock().retain(|(entry, _)| *entry != id);
    }
}

impl<A: ?Sized + 'static> fmt::Debug for ListenerTable<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerTable")
            .field("listeners", &self.len())
            .finish()
    }
}

type AnyEvent = dyn Any + Send + Sync;

/// Typed event bus keyed by event type
#[derive(Default)]
pub struct EventBus {
    tables: Mutex<HashMap<TypeId, Arc<ListenerTable<AnyEvent>>>>,
}

impl EventBus {
    /// Create an empty bus
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for events of type `E`
    pub fn subscribe<E, F>(&self, handler: F) -> Subscription
    where
        E: SceneEvent,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let table = Arc::clone(
            self.tables
                .lock()
                .entry(TypeId::of::<E>())
                .or_insert_with(ListenerTable::new),
        );
        table.add(Arc::new(move |event: &AnyEvent| {
            if let Some(event) = event.downcast_ref::<E>() {
                handler(event);
            }
        }))
    }

    /// Deliver an event to the listeners of its type
    pub fn publish<E: SceneEvent>(&self, event: &E) {
        let table = self.tables.lock().get(&TypeId::of::<E>()).cloned();
        if let Some(table) = table {
            table.notify(event);
        }
    }

    /// Drop every listener of every type
    pub fn clear(&self) {
        let tables: Vec<_> = self.tables.lock().values().cloned().collect();
        for table in tables {
            table.clear();
        }
    }

    /// Total number of listeners
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.tables.lock().values().map(|t| t.len()).sum()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

enum SubscriptionInner {
    Empty,
    Listener { target: Weak<dyn Detach>, id: u64 },
    Teardown(Box<dyn FnOnce() + Send>),
    Group(Vec<Subscription>),
}

/// Handle to a registered listener or teardown routine
///
/// Dropping the handle releases it. Releasing twice is a no-op.
#[must_use = "dropping a Subscription releases it immediately"]
pub struct Subscription {
    inner: SubscriptionInner,
}

impl Subscription {
    /// Subscription that owns nothing
    #[inline]
    pub fn empty() -> Self {
        Self {
            inner: SubscriptionInner::Empty,
        }
    }

    /// Run `teardown` when released
    #[inline]
    pub fn from_fn(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            inner: SubscriptionInner::Teardown(Box::new(teardown)),
        }
    }

    /// Release several subscriptions together
    #[inline]
    pub fn group(subscriptions: Vec<Subscription>) -> Self {
        Self {
            inner: SubscriptionInner::Group(subscriptions),
        }
    }

    /// Release now
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        match std::mem::replace(&mut self.inner, SubscriptionInner::Empty) {
            SubscriptionInner::Empty => {}
            SubscriptionInner::Listener { target, id } => {
                if let Some(target) = target.upgrade() {
                    target.detach(id);
                }
            }
            SubscriptionInner::Teardown(teardown) => teardown(),
            SubscriptionInner::Group(subscriptions) => drop(subscriptions),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.inner {
            SubscriptionInner::Empty => "empty",
            SubscriptionInner::Listener { .. } => "listener",
            SubscriptionInner::Teardown(_) => "teardown",
            SubscriptionInner::Group(_) => "group",
        };
        f.debug_tuple("Subscription").field(&kind).finish()
    }
}
