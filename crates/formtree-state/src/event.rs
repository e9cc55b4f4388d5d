//! # Node Events
//!
//! Every node owns an [`EventBus`]. Event kinds are bit flags, so a
//! listener checks what happened with one `contains` test, and several
//! events raised in the same tick are delivered as one merged
//! [`NodeEvent`].
//!
//! ## Merging
//!
//! Given an ordered list of `(kind, payload, options)` triples, the merged
//! event's kind is the union of all kinds, and payloads/options are kept
//! per individual flag so every kind's data survives. A later payload for
//! the same flag replaces an earlier one, except for `CHANGE`, where the
//! merged payload keeps the first `previous` and the last `current`.
//!
//! ## Delivery
//!
//! Listeners run synchronously in registration order. The listener list
//! is snapshotted before delivery, so subscribing or unsubscribing from
//! inside a listener only affects later events.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use bitflags::bitflags;
use serde_json::Value;

use formtree_schema::JsonSchemaError;

use crate::tree::ComputedState;

bitflags! {
    /// Kinds of node events.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventType: u32 {
        /// The node's value changed.
        const CHANGE = 1 << 0;
        /// The node should re-read all of its state.
        const REFRESH = 1 << 1;
        /// A renderer should redraw the node.
        const REQUEST_REDRAW = 1 << 2;
        /// A renderer should focus the node's input.
        const REQUEST_FOCUS = 1 << 3;
        /// A renderer should select the node's input contents.
        const REQUEST_SELECT = 1 << 4;
        /// The node's validation errors changed.
        const UPDATE_ERROR = 1 << 5;
        /// `visible` / `readOnly` / `disabled` / `required` / watch values changed.
        const UPDATE_COMPUTED_PROPERTIES = 1 << 6;
        /// The node's live children changed.
        const UPDATE_CHILDREN = 1 << 7;
    }
}

/// Data attached to one event flag.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// `CHANGE`: value before and after. `None` is undefined.
    Change {
        /// Value before the tick.
        previous: Option<Value>,
        /// Value after the tick.
        current: Option<Value>,
    },
    /// `UPDATE_ERROR`: the node's new error list.
    Errors(Vec<JsonSchemaError>),
    /// `UPDATE_COMPUTED_PROPERTIES`: the new computed state.
    Computed(ComputedState),
    /// `UPDATE_CHILDREN`: the new live child count.
    Children(usize),
}

/// A (possibly merged) notification delivered to listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeEvent {
    /// Union of every merged kind.
    pub kind: EventType,
    /// Payloads keyed by individual flag.
    pub payload: HashMap<EventType, EventPayload>,
    /// Options keyed by individual flag.
    pub options: HashMap<EventType, Value>,
}

impl NodeEvent {
    /// A single-kind event.
    pub fn new(kind: EventType) -> Self {
        Self {
            kind,
            payload: HashMap::new(),
            options: HashMap::new(),
        }
    }

    /// Attach a payload for `kind`'s flag.
    pub fn with_payload(mut self, payload: EventPayload) -> Self {
        self.payload.insert(self.kind, payload);
        self
    }

    /// Whether `flag` is set.
    pub fn has(&self, flag: EventType) -> bool {
        self.kind.contains(flag)
    }

    /// The payload stored for `flag`.
    pub fn payload(&self, flag: EventType) -> Option<&EventPayload> {
        self.payload.get(&flag)
    }

    /// The options stored for `flag`.
    pub fn option(&self, flag: EventType) -> Option<&Value> {
        self.options.get(&flag)
    }
}

/// One raised-but-undelivered event.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    /// A single flag.
    pub kind: EventType,
    /// Data for the flag.
    pub payload: Option<EventPayload>,
    /// Options for the flag.
    pub options: Option<Value>,
}

impl RawEvent {
    /// An event with neither payload nor options.
    pub fn bare(kind: EventType) -> Self {
        Self {
            kind,
            payload: None,
            options: None,
        }
    }
}

/// Merge same-tick events. Returns `None` for an empty list.
pub fn merge_events(events: impl IntoIterator<Item = RawEvent>) -> Option<NodeEvent> {
    let mut merged: Option<NodeEvent> = None;
    for event in events {
        let target = merged.get_or_insert_with(|| NodeEvent::new(EventType::empty()));
        target.kind |= event.kind;
        if let Some(payload) = event.payload {
            let payload = match (target.payload.remove(&event.kind), payload) {
                (
                    Some(EventPayload::Change { previous, .. }),
                    EventPayload::Change { current, .. },
                ) => EventPayload::Change { previous, current },
                (_, payload) => payload,
            };
            target.payload.insert(event.kind, payload);
        }
        if let Some(options) = event.options {
            target.options.insert(event.kind, options);
        }
    }
    merged
}

type Listener = Rc<RefCell<dyn FnMut(&NodeEvent)>>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// Per-node publish/subscribe channel.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Rc<RefCell<Listeners>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl EventBus {
    /// Create a bus with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Dropping the handle does not unsubscribe.
    pub fn subscribe(&self, listener: impl FnMut(&NodeEvent) + 'static) -> Unsubscribe {
        let mut listeners = self.listeners.borrow_mut();
        let id = listeners.next_id;
        listeners.next_id += 1;
        let listener: Listener = Rc::new(RefCell::new(listener));
        listeners.entries.push((id, listener));
        Unsubscribe {
            listeners: Rc::downgrade(&self.listeners),
            id,
        }
    }

    /// Deliver `event` to a snapshot of the current listeners.
    ///
    /// A listener that publishes to its own bus does not receive the
    /// nested event.
    pub fn publish(&self, event: &NodeEvent) {
        let snapshot: Vec<Listener> = self
            .listeners
            .borrow()
            .entries
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in snapshot {
            match listener.try_borrow_mut() {
                Ok(mut call) => (&mut *call)(event),
                Err(_) => tracing::trace!("skipping re-entrant listener"),
            }
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().entries.len()
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug)]
pub struct Unsubscribe {
    listeners: Weak<RefCell<Listeners>>,
    id: u64,
}

impl Unsubscribe {
    /// Remove the listener. Safe to call during delivery and after the
    /// bus is gone.
    pub fn unsubscribe(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.borrow_mut().entries.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn change(previous: Value, current: Value) -> RawEvent {
        RawEvent {
            kind: EventType::CHANGE,
            payload: Some(EventPayload::Change {
                previous: Some(previous),
                current: Some(current),
            }),
            options: None,
        }
    }

    #[test]
    fn test_merge_keeps_every_kind() {
        let merged = merge_events([
            change(json!(1), json!(2)),
            RawEvent {
                kind: EventType::UPDATE_ERROR,
                payload: Some(EventPayload::Errors(vec![])),
                options: None,
            },
        ])
        .unwrap();
        assert_eq!(merged.kind, EventType::CHANGE | EventType::UPDATE_ERROR);
        assert!(merged.payload(EventType::CHANGE).is_some());
        assert_eq!(
            merged.payload(EventType::UPDATE_ERROR),
            Some(&EventPayload::Errors(vec![]))
        );
    }

    #[test]
    fn test_merge_change_spans_tick() {
        let merged = merge_events([change(json!("a"), json!("b")), change(json!("b"), json!("c"))]).unwrap();
        assert_eq!(
            merged.payload(EventType::CHANGE),
            Some(&EventPayload::Change {
                previous: Some(json!("a")),
                current: Some(json!("c")),
            })
        );
    }

    #[test]
    fn test_merge_options_by_flag() {
        let merged = merge_events([
            RawEvent {
                kind: EventType::REQUEST_FOCUS,
                payload: None,
                options: Some(json!({"scroll": true})),
            },
            RawEvent::bare(EventType::REQUEST_REDRAW),
        ])
        .unwrap();
        assert_eq!(merged.option(EventType::REQUEST_FOCUS), Some(&json!({"scroll": true})));
        assert_eq!(merged.option(EventType::REQUEST_REDRAW), None);
        assert!(merge_events(Vec::new()).is_none());
    }

    #[test]
    fn test_listeners_in_registration_order() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for name in ["first", "second"] {
            let log = Rc::clone(&log);
            bus.subscribe(move |_| log.borrow_mut().push(name));
        }
        bus.publish(&NodeEvent::new(EventType::REFRESH));
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_unsubscribe_during_delivery_keeps_pass_intact() {
        let bus = EventBus::new();
        let hits = Rc::new(RefCell::new(0));
        let handle: Rc<RefCell<Option<Unsubscribe>>> = Rc::new(RefCell::new(None));

        let h = Rc::clone(&handle);
        bus.subscribe(move |_| {
            if let Some(u) = h.borrow_mut().take() {
                u.unsubscribe();
            }
        });
        let counter = Rc::clone(&hits);
        *handle.borrow_mut() = Some(bus.subscribe(move |_| *counter.borrow_mut() += 1));

        bus.publish(&NodeEvent::new(EventType::CHANGE));
        assert_eq!(*hits.borrow(), 1, "snapshot still delivers to the removed listener");
        bus.publish(&NodeEvent::new(EventType::CHANGE));
        assert_eq!(*hits.borrow(), 1);
        assert_eq!(bus.listener_count(), 1);
    }

    #[test]
    fn test_unsubscribe_after_bus_dropped() {
        let bus = EventBus::new();
        let handle = bus.subscribe(|_| {});
        drop(bus);
        handle.unsubscribe();
    }
}
