#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Session-scoped publish/subscribe for entity lifecycle events.
//!
//! The bus is owned by the session that drives the game loop and handed to
//! objectives and coordinators as a cheap clonable handle. Subscribing
//! returns a [`Subscription`] guard: the registration lives exactly as long as
//! the guard, so a dropped objective can never be reached by a later publish.
//! Delivery is queued rather than re-entrant. Each subscriber drains its
//! mailbox at the top of its own update, which guarantees that events seen
//! during a tick are processed before the subscriber's polled update logic.

use std::{
    cell::RefCell,
    collections::{BTreeMap, VecDeque},
    rc::{Rc, Weak},
};

use questline_core::{WorldEvent, WorldEventKind};

/// Set of event kinds a subscriber wants delivered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Interest {
    killed: bool,
    spawned: bool,
    removed: bool,
}

impl Interest {
    /// Interest in every event kind.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            killed: true,
            spawned: true,
            removed: true,
        }
    }

    /// Interest in the listed event kinds only.
    #[must_use]
    pub fn only(kinds: &[WorldEventKind]) -> Self {
        kinds.iter().fold(Self::default(), |interest, kind| interest.with(*kind))
    }

    /// Adds an event kind to the interest set.
    #[must_use]
    pub fn with(mut self, kind: WorldEventKind) -> Self {
        match kind {
            WorldEventKind::Killed => self.killed = true,
            WorldEventKind::Spawned => self.spawned = true,
            WorldEventKind::Removed => self.removed = true,
        }
        self
    }

    /// Reports whether the set contains the event kind.
    #[must_use]
    pub const fn contains(&self, kind: WorldEventKind) -> bool {
        match kind {
            WorldEventKind::Killed => self.killed,
            WorldEventKind::Spawned => self.spawned,
            WorldEventKind::Removed => self.removed,
        }
    }
}

type Mailbox = Rc<RefCell<VecDeque<WorldEvent>>>;

#[derive(Debug)]
struct Subscriber {
    interest: Interest,
    mailbox: Mailbox,
}

impl Subscriber {
    /// Reports whether the guard went away without unregistering.
    fn is_orphaned(&self) -> bool {
        Rc::strong_count(&self.mailbox) == 1
    }
}

#[derive(Debug, Default)]
struct Registry {
    next_id: u64,
    subscribers: BTreeMap<u64, Subscriber>,
}

/// Owned dispatcher for [`WorldEvent`] values.
///
/// Cloning the bus produces another handle to the same dispatcher. The
/// dispatcher is torn down when the last handle is dropped. Outstanding
/// subscriptions then stay valid but never receive anything again.
#[derive(Clone, Debug, Default)]
pub struct EventBus {
    registry: Rc<RefCell<Registry>>,
}

impl EventBus {
    /// Creates a dispatcher with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest in the provided event kinds.
    #[must_use = "dropping the subscription unregisters it immediately"]
    pub fn subscribe(&self, interest: Interest) -> Subscription {
        let mailbox: Mailbox = Rc::default();
        let mut registry = self.registry.borrow_mut();
        registry.subscribers.retain(|_, subscriber| !subscriber.is_orphaned());
        let id = registry.next_id;
        registry.next_id += 1;
        let _ = registry.subscribers.insert(
            id,
            Subscriber {
                interest,
                mailbox: Rc::clone(&mailbox),
            },
        );
        log::trace!("event subscription {id} registered");
        Subscription {
            id,
            registry: Rc::downgrade(&self.registry),
            mailbox,
        }
    }

    /// Delivers the event to every interested subscriber in registration order.
    ///
    /// Returns the number of subscribers that received the event.
    pub fn publish(&self, event: WorldEvent) -> usize {
        let registry = self.registry.borrow();
        let kind = event.kind();
        let mut delivered = 0;
        for subscriber in registry.subscribers.values() {
            if subscriber.interest.contains(kind) && !subscriber.is_orphaned() {
                subscriber.mailbox.borrow_mut().push_back(event);
                delivered += 1;
            }
        }
        delivered
    }

    /// Publishes every event of the batch in order.
    pub fn publish_all(&self, events: &[WorldEvent]) {
        for event in events {
            let _ = self.publish(*event);
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry
            .borrow()
            .subscribers
            .values()
            .filter(|subscriber| !subscriber.is_orphaned())
            .count()
    }
}

/// Scoped registration on an [`EventBus`].
///
/// The subscription is removed from the bus when the guard is dropped.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<RefCell<Registry>>,
    mailbox: Mailbox,
}

impl Subscription {
    /// Removes and returns every queued event in delivery order.
    pub fn drain(&mut self) -> Vec<WorldEvent> {
        self.mailbox.borrow_mut().drain(..).collect()
    }

    /// Number of queued events.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.mailbox.borrow().len()
    }

    /// Reports whether the owning bus still exists.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.registry.strong_count() > 0
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let Ok(mut entries) = registry.try_borrow_mut() else {
            log::warn!(
                "event subscription {} released while the bus was busy; it is swept later",
                self.id
            );
            return;
        };
        let _ = entries.subscribers.remove(&self.id);
        log::trace!("event subscription {} released", self.id);
    }
}
