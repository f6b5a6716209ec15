//! Snapshot subscribers.
//!
//! The view layer registers a subscriber on a [`FormSession`](super::FormSession)
//! and is called with every snapshot the session emits.

use std::sync::atomic::{AtomicU64, Ordering};

use super::coordinator::Snapshot;

/// Handle returned by [`FormSession::subscribe`](super::FormSession::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

static NEXT_SUBSCRIBER: AtomicU64 = AtomicU64::new(1);

impl SubscriberId {
    fn next() -> Self {
        Self(NEXT_SUBSCRIBER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

pub struct Subscriber {
    id: SubscriberId,
    notify: Box<dyn Fn(&Snapshot) + Send + Sync>,
}

impl Subscriber {
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        Self {
            id: SubscriberId::next(),
            notify: Box::new(notify),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn notify(&self, snapshot: &Snapshot) {
        (self.notify)(snapshot);
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish()
    }
}
