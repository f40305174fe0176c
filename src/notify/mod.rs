//! # Notification pipeline
//!
//! Mutations never call observers directly. They return their result
//! wrapped in [`Pending`], together with the notifications the mutation
//! produced, in production order. The traversal layer commits the
//! transaction and only then hands the notifications to the [`Notifier`].
//!
//! Commit and publication run under the notifier's gate, so observers see
//! events in the order the producing transactions committed. Delivery is
//! in-process and best effort: nothing is queued durably.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{trace, warn};

use crate::model::{ElementKind, Entity, Relationship};

/// Lifecycle action an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Created,
    Updated,
    Deleted,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Created => "created",
            Action::Updated => "updated",
            Action::Deleted => "deleted",
        })
    }
}

/// Subscription key: which element kind, which action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interest {
    pub kind: ElementKind,
    pub action: Action,
}

impl Interest {
    pub fn new(kind: impl Into<ElementKind>, action: Action) -> Self {
        Self { kind: kind.into(), action }
    }

    pub fn relationships(action: Action) -> Self {
        Self { kind: ElementKind::Relationship, action }
    }
}

impl fmt::Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.action)
    }
}

/// A committed lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "element", rename_all = "lowercase")]
pub enum Notification {
    Entity { action: Action, entity: Entity },
    Relationship { action: Action, relationship: Relationship },
}

impl Notification {
    pub fn entity(action: Action, entity: Entity) -> Self {
        Notification::Entity { action, entity }
    }

    pub fn relationship(action: Action, relationship: Relationship) -> Self {
        Notification::Relationship { action, relationship }
    }

    pub fn action(&self) -> Action {
        match self {
            Notification::Entity { action, .. } | Notification::Relationship { action, .. } => *action,
        }
    }

    pub fn interest(&self) -> Interest {
        match self {
            Notification::Entity { action, entity } => Interest::new(entity.kind(), *action),
            Notification::Relationship { action, .. } => Interest::relationships(*action),
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Notification::Entity { entity, .. } => Some(entity),
            Notification::Relationship { .. } => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&Relationship> {
        match self {
            Notification::Relationship { relationship, .. } => Some(relationship),
            Notification::Entity { .. } => None,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Entity { action, entity } => {
                write!(f, "{} {} {}", entity.kind(), entity.path(), action)
            }
            Notification::Relationship { action, relationship } => {
                write!(f, "relationship {relationship} {action}")
            }
        }
    }
}

// ============================================================================
// Pending
// ============================================================================

/// A mutation result whose notifications await a successful commit.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "pending notifications are lost unless published"]
pub struct Pending<T> {
    pub value: T,
    pub notifications: Vec<Notification>,
}

impl<T> Pending<T> {
    pub fn new(value: T) -> Self {
        Self { value, notifications: Vec::new() }
    }

    pub fn with(mut self, notification: Notification) -> Self {
        self.notifications.push(notification);
        self
    }

    pub fn push(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Pending<U> {
        Pending { value: f(self.value), notifications: self.notifications }
    }

    /// Deliver the notifications and hand back the value.
    pub fn publish(self, notifier: &Notifier) -> T {
        notifier.publish(&self.notifications);
        self.value
    }
}

// ============================================================================
// Notifier
// ============================================================================

/// Handle returned by [`Notifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Observer callback. It runs after commit, on the committing task.
pub type Observer = Arc<dyn Fn(&Notification) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    interest: Interest,
    callback: Observer,
}

/// In-process pub/sub of committed events.
pub struct Notifier {
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
    gate: Mutex<()>,
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            gate: Mutex::new(()),
        }
    }

    pub fn subscribe<F>(&self, interest: Interest, callback: F) -> SubscriptionId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.write().push(Subscription { id, interest, callback: Arc::new(callback) });
        trace!(%id, %interest, "subscribed");
        id
    }

    /// Returns whether the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscriptions.write();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        before != subs.len()
    }

    pub fn is_observed(&self, interest: &Interest) -> bool {
        self.subscriptions.read().iter().any(|s| s.interest == *interest)
    }

    /// Serializes commit-then-publish sections.
    ///
    /// Hold the guard from before the backend commit until [`publish`]
    /// returns.
    ///
    /// [`publish`]: Self::publish
    pub async fn gate(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    /// Deliver `notifications`, in order, to every matching observer.
    ///
    /// A panicking observer is logged and skipped; it never affects other
    /// observers or the already committed mutation.
    pub fn publish(&self, notifications: &[Notification]) {
        for notification in notifications {
            let interest = notification.interest();
            // Callbacks run outside the lock so they may (un)subscribe.
            let targets: Vec<Observer> = self
                .subscriptions
                .read()
                .iter()
                .filter(|s| s.interest == interest)
                .map(|s| Arc::clone(&s.callback))
                .collect();
            if targets.is_empty() {
                continue;
            }
            trace!(%notification, observers = targets.len(), "publishing");
            for callback in targets {
                if panic::catch_unwind(AssertUnwindSafe(|| callback(notification))).is_err() {
                    warn!(%notification, "error while sending inventory event");
                }
            }
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
