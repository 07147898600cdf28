//! Rule-set change notifications

use super::Ability;
use crate::rule::RawRule;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};

/// Lifecycle events fired by [`Ability::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbilityEvent {
    /// Before the new rules are installed
    Update,
    /// After the new rules are installed
    Updated,
}

/// Payload handed to event handlers
pub struct UpdateEvent<'a> {
    /// Ability being updated
    pub ability: &'a Ability,

    /// Incoming rule list
    pub rules: &'a [RawRule],
}

/// Event handler
pub type Handler = Arc<dyn Fn(&UpdateEvent<'_>) + Send + Sync>;

#[derive(Default)]
struct HandlerList {
    next_id: u64,
    update: Vec<(u64, Handler)>,
    updated: Vec<(u64, Handler)>,
}

impl HandlerList {
    fn for_event(&mut self, event: AbilityEvent) -> &mut Vec<(u64, Handler)> {
        match event {
            AbilityEvent::Update => &mut self.update,
            AbilityEvent::Updated => &mut self.updated,
        }
    }
}

/// Per-ability observer list
#[derive(Default)]
pub(crate) struct EventEmitter {
    handlers: Arc<Mutex<HandlerList>>,
}

impl EventEmitter {
    /// Register a handler and return its detach handle
    pub(crate) fn subscribe(&self, event: AbilityEvent, handler: Handler) -> Subscription {
        let mut handlers = self.handlers.lock();
        let id = handlers.next_id;
        handlers.next_id += 1;
        handlers.for_event(event).push((id, handler));

        Subscription {
            id,
            event,
            handlers: Arc::downgrade(&self.handlers),
        }
    }

    /// Invoke the handlers registered for `event`
    ///
    /// Handlers run on a snapshot taken before the first call, so they may
    /// subscribe or unsubscribe freely.
    pub(crate) fn emit(&self, event: AbilityEvent, payload: &UpdateEvent<'_>) {
        let snapshot: Vec<Handler> = self
            .handlers
            .lock()
            .for_event(event)
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in snapshot {
            handler(payload);
        }
    }

    /// Number of handlers registered for `event`
    pub(crate) fn len(&self, event: AbilityEvent) -> usize {
        self.handlers.lock().for_event(event).len()
    }
}

/// Detach handle returned by [`Ability::on`]
///
/// Dropping the handle keeps the handler registered; call
/// [`Subscription::unsubscribe`] to remove it. Unsubscribing more than once
/// is a no-op.
#[derive(Clone)]
pub struct Subscription {
    id: u64,
    event: AbilityEvent,
    handlers: Weak<Mutex<HandlerList>>,
}

impl Subscription {
    /// Remove the handler this handle was created for
    pub fn unsubscribe(&self) {
        if let Some(handlers) = self.handlers.upgrade() {
            handlers
                .lock()
                .for_event(self.event)
                .retain(|(id, _)| *id != self.id);
        }
    }

    /// Event the handler listens to
    pub fn event(&self) -> AbilityEvent {
        self.event
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event", &self.event)
            .finish()
    }
}
