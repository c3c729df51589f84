use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::{gateway::MediaUploadGateway, MediaEventSink, ObserverId, PostId};

/// Outcome of [`ObserverRegistry::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// A new gateway subscription was created
    New(ObserverId),
    /// The post was already observed; nothing changed
    Existing(ObserverId),
}

impl Registration {
    pub fn observer_id(&self) -> ObserverId {
        match self {
            Self::New(id) | Self::Existing(id) => *id,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::New(_))
    }
}

/// Post id to live media subscription, at most one per post.
///
/// Every operation runs under one mutex so that register, unregister and
/// lookups from the caller and from the event worker observe a single
/// total order. The gateway's `subscribe`/`unsubscribe` are called while
/// the lock is held and must not block.
pub struct ObserverRegistry {
    gateway: Arc<dyn MediaUploadGateway>,
    observers: Mutex<HashMap<PostId, ObserverId>>,
}

impl ObserverRegistry {
    pub fn new(gateway: Arc<dyn MediaUploadGateway>) -> Self {
        Self {
            gateway,
            observers: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to the post's media unless a subscription already exists
    pub fn register(&self, post_id: &PostId, sink: MediaEventSink) -> Registration {
        let mut observers = self.observers.lock();
        if let Some(existing) = observers.get(post_id) {
            return Registration::Existing(*existing);
        }

        let observer_id = self.gateway.subscribe(post_id, sink);
        observers.insert(post_id.clone(), observer_id);
        debug!("Observing media of post {} ({})", post_id, observer_id);
        Registration::New(observer_id)
    }

    /// Drop the post's subscription. Returns the removed id, `None` if the
    /// post was not observed.
    pub fn unregister(&self, post_id: &PostId) -> Option<ObserverId> {
        let mut observers = self.observers.lock();
        let removed = observers.remove(post_id);
        if let Some(observer_id) = removed {
            self.gateway.unsubscribe(observer_id);
            debug!("Stopped observing media of post {} ({})", post_id, observer_id);
        }
        removed
    }

    pub fn is_registered(&self, post_id: &PostId) -> bool {
        self.observers.lock().contains_key(post_id)
    }

    /// Live subscription of the post, if any
    pub fn observer_for(&self, post_id: &PostId) -> Option<ObserverId> {
        self.observers.lock().get(post_id).copied()
    }

    /// Number of observed posts
    pub fn len(&self) -> usize {
        self.observers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
