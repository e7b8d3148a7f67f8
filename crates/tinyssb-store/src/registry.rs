//! Feed registry (§4.D): classification of known feeds and activation
//! lifecycle.
//!
//! The registry only tracks classification and activation state; it holds
//! no back-pointers into the engine or transport layers. Interested parties
//! subscribe to lifecycle events instead (§9 design notes).

use std::collections::HashMap;
use std::sync::Mutex;

use tinyssb_types::FeedId;

/// How a feed relates to this node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeedKind {
    /// A feed whose signing key this node holds.
    Private,
    /// A feed this node only replicates, but has chosen to actively fetch.
    PublicLocal,
    /// A feed known to exist (e.g. from a GOset digest) but not yet
    /// actively replicated.
    PublicRemote,
}

/// A lifecycle transition the registry reports to subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    Activated(FeedId),
    Deactivated(FeedId),
}

type Subscriber = Box<dyn FnMut(LifecycleEvent) + Send>;

#[derive(Default)]
struct Inner {
    kinds: HashMap<FeedId, FeedKind>,
    active: HashMap<FeedId, bool>,
    subscribers: Vec<Subscriber>,
}

/// The set of feeds this node knows about, with their classification and
/// activation state.
pub struct FeedRegistry {
    inner: Mutex<Inner>,
}

impl Default for FeedRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Register a feed with its kind, defaulting to inactive.
    pub fn register(&self, fid: FeedId, kind: FeedKind) {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        inner.kinds.entry(fid).or_insert(kind);
        inner.active.entry(fid).or_insert(false);
    }

    pub fn kind_of(&self, fid: &FeedId) -> Option<FeedKind> {
        self.inner
            .lock()
            .expect("registry mutex poisoned")
            .kinds
            .get(fid)
            .copied()
    }

    pub fn is_active(&self, fid: &FeedId) -> bool {
        self.inner
            .lock()
            .expect("registry mutex poisoned")
            .active
            .get(fid)
            .copied()
            .unwrap_or(false)
    }

    /// Subscribe to future activation/deactivation events.
    pub fn subscribe(&self, cb: Subscriber) {
        self.inner
            .lock()
            .expect("registry mutex poisoned")
            .subscribers
            .push(cb);
    }

    /// Mark a feed as actively replicated, notifying subscribers. A no-op
    /// if the feed was already active.
    pub fn activate(&self, fid: FeedId) {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        let was_active = inner.active.insert(fid, true).unwrap_or(false);
        if !was_active {
            for sub in inner.subscribers.iter_mut() {
                sub(LifecycleEvent::Activated(fid));
            }
        }
    }

    pub fn deactivate(&self, fid: FeedId) {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        let was_active = inner.active.insert(fid, false).unwrap_or(false);
        if was_active {
            for sub in inner.subscribers.iter_mut() {
                sub(LifecycleEvent::Deactivated(fid));
            }
        }
    }

    /// All currently-active feed IDs.
    pub fn active_feeds(&self) -> Vec<FeedId> {
        self.inner
            .lock()
            .expect("registry mutex poisoned")
            .active
            .iter()
            .filter(|(_, active)| **active)
            .map(|(fid, _)| *fid)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_activation_notifies_subscribers_once() {
        let registry = FeedRegistry::new();
        let fid = FeedId([1u8; 32]);
        registry.register(fid, FeedKind::PublicLocal);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        registry.subscribe(Box::new(move |ev| seen2.lock().expect("lock").push(ev)));

        registry.activate(fid);
        registry.activate(fid); // no-op, already active
        registry.deactivate(fid);

        let events = seen.lock().expect("lock").clone();
        assert_eq!(
            events,
            vec![
                LifecycleEvent::Activated(fid),
                LifecycleEvent::Deactivated(fid),
            ]
        );
    }

    #[test]
    fn test_unregistered_feed_is_inactive() {
        let registry = FeedRegistry::new();
        assert!(!registry.is_active(&FeedId([2u8; 32])));
        assert_eq!(registry.kind_of(&FeedId([2u8; 32])), None);
    }

    #[test]
    fn test_active_feeds_lists_only_active() {
        let registry = FeedRegistry::new();
        let a = FeedId([1u8; 32]);
        let b = FeedId([2u8; 32]);
        registry.register(a, FeedKind::Private);
        registry.register(b, FeedKind::PublicRemote);
        registry.activate(a);
        assert_eq!(registry.active_feeds(), vec![a]);
    }
}
