//! Listener registries: ordered callbacks per event category.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::router::FeedEvent;
use super::types::FeedDomain;

/// Shared callback invoked for every event of one category.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entry<T> {
    id: u64,
    listener: Listener<T>,
}

struct Slots<T> {
    next_id: u64,
    entries: Vec<Entry<T>>,
}

trait Unregister: Send + Sync {
    fn unregister(&self, id: u64) -> bool;
}

impl<T: 'static> Unregister for Mutex<Slots<T>> {
    fn unregister(&self, id: u64) -> bool {
        let mut slots = self.lock();
        match slots.entries.iter().position(|e| e.id == id) {
            Some(index) => {
                slots.entries.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Handle returned by every registration.
///
/// Dropping the handle does not unregister; call [`Subscription::unsubscribe`] (or let a
/// `FeedScope` do it) to remove the callback.
pub struct Subscription {
    id: u64,
    registry: Weak<dyn Unregister>,
}

impl Subscription {
    /// Remove exactly this registration. Returns `false` when it was already gone.
    pub fn unsubscribe(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.unregister(self.id),
            None => false,
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Ordered set of listeners for one event category.
///
/// Fan-out follows insertion order. Callbacks run outside the lock, so a listener may
/// register or unsubscribe other listeners while being invoked.
pub struct ListenerRegistry<T> {
    slots: Arc<Mutex<Slots<T>>>,
}

impl<T> Clone for ListenerRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<T: 'static> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> ListenerRegistry<T> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub fn add<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.add_listener(Arc::new(callback))
    }

    pub fn add_listener(&self, listener: Listener<T>) -> Subscription {
        let id = {
            let mut slots = self.slots.lock();
            let id = slots.next_id;
            slots.next_id = slots.next_id.wrapping_add(1);
            slots.entries.push(Entry { id, listener });
            id
        };
        let slots: Arc<Mutex<Slots<T>>> = Arc::clone(&self.slots);
        let registry: Weak<dyn Unregister> = Arc::downgrade(&slots) as Weak<dyn Unregister>;
        Subscription { id, registry }
    }

    /// Remove the first registration of this exact callback (pointer identity).
    pub fn remove_listener(&self, listener: &Listener<T>) -> bool {
        let mut slots = self.slots.lock();
        match slots
            .entries
            .iter()
            .position(|e| Arc::ptr_eq(&e.listener, listener))
        {
            Some(index) => {
                slots.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Whether this exact callback (pointer identity) is registered.
    pub fn contains(&self, listener: &Listener<T>) -> bool {
        self.slots
            .lock()
            .entries
            .iter()
            .any(|e| Arc::ptr_eq(&e.listener, listener))
    }

    /// Invoke every listener with `value`; returns how many were called.
    pub fn dispatch(&self, value: &T) -> usize {
        let listeners: Vec<Listener<T>> = self
            .slots
            .lock()
            .entries
            .iter()
            .map(|e| Arc::clone(&e.listener))
            .collect();
        for listener in &listeners {
            listener(value);
        }
        listeners.len()
    }

    pub fn clear(&self) {
        self.slots.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The four listener categories of one feed.
pub struct FeedListeners<D: FeedDomain> {
    pub updates: ListenerRegistry<D::Entity>,
    pub stats: ListenerRegistry<D::Stats>,
    pub alerts: ListenerRegistry<D::Alert>,
    pub logs: ListenerRegistry<D::Log>,
}

impl<D: FeedDomain> Clone for FeedListeners<D> {
    fn clone(&self) -> Self {
        Self {
            updates: self.updates.clone(),
            stats: self.stats.clone(),
            alerts: self.alerts.clone(),
            logs: self.logs.clone(),
        }
    }
}

impl<D: FeedDomain> Default for FeedListeners<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: FeedDomain> FeedListeners<D> {
    pub fn new() -> Self {
        Self {
            updates: ListenerRegistry::new(),
            stats: ListenerRegistry::new(),
            alerts: ListenerRegistry::new(),
            logs: ListenerRegistry::new(),
        }
    }

    /// Fan an event out to its category; returns the number of callbacks invoked.
    pub fn dispatch(&self, event: &FeedEvent<D>) -> usize {
        match event {
            FeedEvent::Update(entity) => self.updates.dispatch(entity),
            FeedEvent::Stats(stats) => self.stats.dispatch(stats),
            FeedEvent::Alert(alert) => self.alerts.dispatch(alert),
            FeedEvent::Log(entry) => self.logs.dispatch(entry),
        }
    }

    pub fn clear_all(&self) {
        self.updates.clear();
        self.stats.clear();
        self.alerts.clear();
        self.logs.clear();
    }

    pub fn len(&self) -> usize {
        self.updates.len() + self.stats.len() + self.alerts.len() + self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&u32) + Send + Sync + 'static) {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_cb = Arc::clone(&hits);
        (hits, move |_: &u32| {
            hits_cb.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn unsubscribe_removes_exactly_one_and_is_idempotent() {
        let registry = ListenerRegistry::<u32>::new();
        let (first_hits, first) = counter();
        let (second_hits, second) = counter();
        let sub = registry.add(first);
        let _keep = registry.add(second);

        assert!(sub.unsubscribe());
        assert!(!sub.unsubscribe());
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.dispatch(&7), 1);
        assert_eq!(first_hits.load(Ordering::SeqCst), 0);
        assert_eq!(second_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispatch_follows_insertion_order() {
        let registry = ListenerRegistry::<u32>::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let order = Arc::clone(&order);
            let _ = registry.add(move |_| order.lock().push(tag));
        }
        registry.dispatch(&1);
        assert_eq!(*order.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn remove_listener_by_identity_removes_first_match_only() {
        let registry = ListenerRegistry::<u32>::new();
        let (hits, cb) = counter();
        let shared: Listener<u32> = Arc::new(cb);
        let _ = registry.add_listener(Arc::clone(&shared));
        let _ = registry.add_listener(Arc::clone(&shared));

        assert!(registry.remove_listener(&shared));
        assert_eq!(registry.len(), 1);
        registry.dispatch(&1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(registry.remove_listener(&shared));
        assert!(!registry.remove_listener(&shared));
        assert!(!registry.contains(&shared));
    }

    #[test]
    fn contains_tracks_identity_not_shape() {
        let registry = ListenerRegistry::<u32>::new();
        let registered: Listener<u32> = Arc::new(|_: &u32| {});
        let lookalike: Listener<u32> = Arc::new(|_: &u32| {});
        let _ = registry.add_listener(Arc::clone(&registered));

        assert!(registry.contains(&registered));
        assert!(!registry.contains(&lookalike));
        registry.clear();
        assert!(!registry.contains(&registered));
    }

    #[test]
    fn clear_drops_every_listener() {
        let registry = ListenerRegistry::<u32>::new();
        let (hits, cb) = counter();
        let sub = registry.add(cb);
        registry.clear();
        assert_eq!(registry.dispatch(&1), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn listener_may_unsubscribe_itself_during_dispatch() {
        let registry = ListenerRegistry::<u32>::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot_cb = Arc::clone(&slot);
        let sub = registry.add(move |_| {
            if let Some(sub) = slot_cb.lock().as_ref() {
                sub.unsubscribe();
            }
        });
        *slot.lock() = Some(sub);

        assert_eq!(registry.dispatch(&1), 1);
        assert_eq!(registry.dispatch(&2), 0);
    }

    #[test]
    fn subscription_outliving_registry_is_harmless() {
        let sub = {
            let registry = ListenerRegistry::<u32>::new();
            registry.add(|_| {})
        };
        assert!(!sub.unsubscribe());
    }
}
