//! Event Bus - listener registry and tiered dispatch
//!
//! Owns every registered listener and raises [`FormEvent`]s to them.
//!
//! # API
//!
//! - `register(form, listener, filters)` - Register under one fresh id
//! - `unregister(id)` - Remove every entry with that id
//! - `raise(event)` - Walk the tiers, stop at the first `false`
//!
//! # Dispatch order
//!
//! For the event's type, entries are visited tier by tier:
//!
//! ```text
//! Field -> Block -> Form -> App -> Unfiltered
//! ```
//!
//! and in registration order within a tier. A listener id is invoked at most
//! once per raise even when several of its filters match.
//!
//! The walk runs over a snapshot taken when `raise` starts. Listeners may
//! register or unregister from inside a callback; the change applies to the
//! next raise.
//!
//! # Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use spark_forms::events::{EventBus, EventFilter, EventType, Listener};
//!
//! let bus = Rc::new(EventBus::new());
//!
//! let id = bus.register(
//!     None,
//!     Listener::new("check_amount", |event| event.field_name() != Some("amount")),
//!     vec![EventFilter::new(EventType::PreField).block("orders").field("amount")],
//! );
//!
//! bus.unregister(id);
//! ```

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use super::event_type::EventType;
use super::filter::{matches, EventFilter, Tier};
use super::form_event::FormEvent;
use super::listener::{Listener, ListenerEntry};
use crate::error::DispatchError;
use crate::types::{FormId, ListenerId};

// =============================================================================
// REGISTRY
// =============================================================================

type TierMap = HashMap<EventType, Vec<ListenerEntry>>;

#[derive(Default)]
struct Registry {
    unfiltered: Vec<ListenerEntry>,
    app: TierMap,
    form: TierMap,
    block: TierMap,
    field: TierMap,
    next_id: u64,
}

impl Registry {
    fn next_id(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }

    fn tier_map(&mut self, tier: Tier) -> Option<&mut TierMap> {
        match tier {
            Tier::Field => Some(&mut self.field),
            Tier::Block => Some(&mut self.block),
            Tier::Form => Some(&mut self.form),
            Tier::App => Some(&mut self.app),
            Tier::Unfiltered => None,
        }
    }

    fn entries(&self, tier: Tier, event_type: EventType) -> &[ListenerEntry] {
        let map = match tier {
            Tier::Field => &self.field,
            Tier::Block => &self.block,
            Tier::Form => &self.form,
            Tier::App => &self.app,
            Tier::Unfiltered => return &self.unfiltered,
        };
        map.get(&event_type).map(Vec::as_slice).unwrap_or(&[])
    }

    fn insert(&mut self, entry: ListenerEntry) -> Tier {
        let tier = Tier::classify(entry.form, entry.filter.as_ref());
        let Some(event_type) = entry.filter.as_ref().map(|filter| filter.event_type) else {
            self.unfiltered.push(entry);
            return tier;
        };

        match self.tier_map(tier) {
            Some(map) => map.entry(event_type).or_default().push(entry),
            None => self.unfiltered.push(entry),
        }
        tier
    }

    fn remove(&mut self, id: ListenerId) -> usize {
        let before = self.len();

        self.unfiltered.retain(|entry| entry.id != id);
        for map in [&mut self.field, &mut self.block, &mut self.form, &mut self.app] {
            map.retain(|_, entries| {
                entries.retain(|entry| entry.id != id);
                !entries.is_empty()
            });
        }

        before - self.len()
    }

    fn len(&self) -> usize {
        let tiered: usize = [&self.field, &self.block, &self.form, &self.app]
            .into_iter()
            .flat_map(|map| map.values())
            .map(Vec::len)
            .sum();
        self.unfiltered.len() + tiered
    }
}

// =============================================================================
// EVENT BUS
// =============================================================================

/// The dispatch bus.
///
/// Construct one per form tree and share it by `Rc`; listeners that register
/// other listeners capture a clone.
#[derive(Default)]
pub struct EventBus {
    registry: RefCell<Registry>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    ///
    /// No filters registers one unfiltered entry. Each filter registers one
    /// entry in the tier its scope selects. All entries share the returned id.
    pub fn register(
        &self,
        form: Option<FormId>,
        listener: Listener,
        filters: impl IntoIterator<Item = EventFilter>,
    ) -> ListenerId {
        let listener = Rc::new(listener);
        let mut reg = self.registry.borrow_mut();
        let id = reg.next_id();

        let filters: Vec<EventFilter> = filters.into_iter().collect();
        if filters.is_empty() {
            let tier = reg.insert(ListenerEntry {
                id,
                form,
                filter: None,
                listener: listener.clone(),
            });
            tracing::debug!(%id, method = listener.method(), ?tier, "registered listener");
            return id;
        }

        for mut filter in filters {
            filter.normalize();
            let tier = reg.insert(ListenerEntry {
                id,
                form,
                filter: Some(filter),
                listener: listener.clone(),
            });
            tracing::debug!(%id, method = listener.method(), ?tier, "registered listener");
        }

        id
    }

    /// Register an unfiltered listener that sees every event.
    pub fn on(&self, listener: Listener) -> ListenerId {
        self.register(None, listener, None::<EventFilter>)
    }

    /// Register for one event filter, application-wide.
    pub fn on_event(&self, filter: impl Into<EventFilter>, listener: Listener) -> ListenerId {
        self.register(None, listener, Some(filter.into()))
    }

    /// Register for one event filter on one form.
    pub fn on_form_event(
        &self,
        form: FormId,
        filter: impl Into<EventFilter>,
        listener: Listener,
    ) -> ListenerId {
        self.register(Some(form), listener, Some(filter.into()))
    }

    /// Remove every entry registered under `id`.
    ///
    /// Unknown ids are ignored. Returns whether anything was removed.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let removed = self.registry.borrow_mut().remove(id);
        if removed > 0 {
            tracing::debug!(%id, removed, "unregistered listener");
        }
        removed > 0
    }

    /// Cleanup closure that unregisters `id` when called.
    ///
    /// Holds the bus weakly; calling it after the bus is gone does nothing.
    pub fn remover(self: &Rc<Self>, id: ListenerId) -> impl FnOnce() + 'static {
        let bus: Weak<EventBus> = Rc::downgrade(self);
        move || {
            if let Some(bus) = bus.upgrade() {
                bus.unregister(id);
            }
        }
    }

    /// Number of registered entries across all tiers.
    pub fn len(&self) -> usize {
        self.registry.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every listener.
    pub fn clear(&self) {
        let mut reg = self.registry.borrow_mut();
        let next_id = reg.next_id;
        *reg = Registry {
            next_id,
            ..Registry::default()
        };
    }

    /// Raise an event.
    ///
    /// Returns `Ok(false)` as soon as a listener vetoes, `Ok(true)` when every
    /// invoked listener continued. A failing listener ends the walk with `Err`.
    pub async fn raise(&self, mut event: FormEvent) -> Result<bool, DispatchError> {
        event.normalize();

        let candidates = self.snapshot(&event);
        let mut done: HashSet<ListenerId> = HashSet::new();

        for (id, listener) in candidates {
            if !done.insert(id) {
                continue;
            }

            tracing::trace!(%id, method = listener.method(), event = %event, "invoking listener");

            if !listener.invoke(&event).await? {
                tracing::debug!(
                    event = %event,
                    method = listener.method(),
                    "raise stopped by listener"
                );
                return Ok(false);
            }
        }

        tracing::debug!(event = %event, invoked = done.len(), "raise completed");
        Ok(true)
    }

    /// Matching entries for `event`, in dispatch order.
    fn snapshot(&self, event: &FormEvent) -> Vec<(ListenerId, Rc<Listener>)> {
        let reg = self.registry.borrow();
        Tier::PRECEDENCE
            .iter()
            .flat_map(|tier| reg.entries(*tier, event.event_type()))
            .filter(|entry| matches(event, entry.form, entry.filter.as_ref()))
            .map(|entry| (entry.id, entry.listener.clone()))
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ListenerError;
    use futures::executor::block_on;
    use std::cell::Cell;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    fn setup() -> (Rc<EventBus>, Log) {
        (Rc::new(EventBus::new()), Rc::new(RefCell::new(Vec::new())))
    }

    fn logging(log: &Log, name: &'static str, verdict: bool) -> Listener {
        let log = log.clone();
        Listener::new(name, move |_| {
            log.borrow_mut().push(name);
            verdict
        })
    }

    fn field_event(form: FormId) -> FormEvent {
        FormEvent::field(EventType::PreField, form, "orders", "amount")
    }

    #[test]
    fn test_dedup_across_filters() {
        let (bus, _) = setup();
        let form = FormId::next();
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();

        bus.register(
            None,
            Listener::new("count", move |_| {
                count_clone.set(count_clone.get() + 1);
                true
            }),
            vec![
                EventFilter::new(EventType::PreField).field("amount"),
                EventFilter::new(EventType::PreField).block("orders"),
                EventFilter::new(EventType::PreField),
            ],
        );
        assert_eq!(bus.len(), 3);

        assert!(block_on(bus.raise(field_event(form))).unwrap());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_tier_precedence() {
        let (bus, log) = setup();
        let form = FormId::next();

        // Registered in reverse precedence order on purpose
        bus.on(logging(&log, "unfiltered", true));
        bus.on_event(EventType::PreField, logging(&log, "app", true));
        bus.on_form_event(form, EventType::PreField, logging(&log, "form", true));
        bus.on_event(
            EventFilter::new(EventType::PreField).block("orders"),
            logging(&log, "block", true),
        );
        bus.on_event(
            EventFilter::new(EventType::PreField).field("amount"),
            logging(&log, "field", true),
        );

        assert!(block_on(bus.raise(field_event(form))).unwrap());
        assert_eq!(*log.borrow(), vec!["field", "block", "form", "app", "unfiltered"]);
    }

    #[test]
    fn test_registration_order_within_tier() {
        let (bus, log) = setup();
        let form = FormId::next();
        bus.on_event(EventType::PreField, logging(&log, "first", true));
        bus.on_event(EventType::PreField, logging(&log, "second", true));

        block_on(bus.raise(field_event(form))).unwrap();
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_short_circuit() {
        let (bus, log) = setup();
        let form = FormId::next();
        bus.on_event(EventType::PreField, logging(&log, "one", true));
        bus.on_event(EventType::PreField, logging(&log, "two", false));
        bus.on_event(EventType::PreField, logging(&log, "three", true));

        assert!(!block_on(bus.raise(field_event(form))).unwrap());
        assert_eq!(*log.borrow(), vec!["one", "two"]);
    }

    #[test]
    fn test_other_event_types_not_invoked() {
        let (bus, log) = setup();
        let form = FormId::next();
        bus.on_event(EventType::PostField, logging(&log, "post", false));

        assert!(block_on(bus.raise(field_event(form))).unwrap());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_form_scope() {
        let (bus, log) = setup();
        let mine = FormId::next();
        let other = FormId::next();
        bus.on_form_event(mine, EventType::PreField, logging(&log, "mine", true));
        bus.register(Some(mine), logging(&log, "mine-unfiltered", true), None::<EventFilter>);

        block_on(bus.raise(field_event(other))).unwrap();
        assert!(log.borrow().is_empty());

        block_on(bus.raise(field_event(mine))).unwrap();
        assert_eq!(*log.borrow(), vec!["mine", "mine-unfiltered"]);
    }

    #[test]
    fn test_unregister_across_tiers() {
        let (bus, log) = setup();
        let form = FormId::next();
        let id = bus.register(
            None,
            logging(&log, "x", true),
            vec![
                EventFilter::new(EventType::PreField).field("amount"),
                EventFilter::new(EventType::PreField).block("orders"),
            ],
        );

        assert!(bus.unregister(id));
        assert!(bus.is_empty());

        block_on(bus.raise(field_event(form))).unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let (bus, log) = setup();
        let id = bus.on(logging(&log, "kept", true));
        bus.unregister(id);

        assert!(!bus.unregister(id));
        assert!(!bus.unregister(ListenerId(999)));
    }

    #[test]
    fn test_unregister_keeps_other_listeners() {
        let (bus, log) = setup();
        let form = FormId::next();
        let gone = bus.on_event(EventType::PreField, logging(&log, "gone", true));
        bus.on_event(EventType::PreField, logging(&log, "kept", true));

        bus.unregister(gone);
        block_on(bus.raise(field_event(form))).unwrap();
        assert_eq!(*log.borrow(), vec!["kept"]);
    }

    #[test]
    fn test_remover_closure() {
        let (bus, log) = setup();
        let form = FormId::next();
        let id = bus.on(logging(&log, "temp", true));
        let cleanup = bus.remover(id);

        cleanup();
        block_on(bus.raise(field_event(form))).unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_listener_error_aborts_walk() {
        let (bus, log) = setup();
        let form = FormId::next();
        bus.on_event(
            EventType::PreField,
            Listener::fallible("explode", |_| Err(ListenerError::new("boom"))),
        );
        bus.on_event(EventType::PreField, logging(&log, "after", true));

        let err = block_on(bus.raise(field_event(form))).unwrap_err();
        assert_eq!(err.method(), "explode");
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_async_listeners_run_in_order() {
        let (bus, log) = setup();
        let form = FormId::next();
        let log_clone = log.clone();
        bus.on_event(
            EventType::PreField,
            Listener::future("slow", move |_| {
                let log = log_clone.clone();
                async move {
                    futures::future::ready(()).await;
                    log.borrow_mut().push("slow");
                    Ok::<_, ListenerError>(Some(true))
                }
            }),
        );
        bus.on_event(EventType::PreField, logging(&log, "fast", true));

        assert!(block_on(bus.raise(field_event(form))).unwrap());
        assert_eq!(*log.borrow(), vec!["slow", "fast"]);
    }

    #[test]
    fn test_register_during_raise_applies_next_time() {
        let (bus, log) = setup();
        let form = FormId::next();
        let bus_clone = bus.clone();
        let log_clone = log.clone();

        bus.on_event(
            EventType::PreField,
            Listener::new("installer", move |_| {
                let log = log_clone.clone();
                bus_clone.on_event(
                    EventType::PreField,
                    Listener::new("installed", move |_| {
                        log.borrow_mut().push("installed");
                        true
                    }),
                );
                true
            }),
        );

        block_on(bus.raise(field_event(form))).unwrap();
        assert!(log.borrow().is_empty());

        block_on(bus.raise(field_event(form))).unwrap();
        assert_eq!(*log.borrow(), vec!["installed"]);
    }

    #[test]
    fn test_unregister_during_raise_does_not_crash() {
        let (bus, log) = setup();
        let form = FormId::next();
        let victim = bus.on_event(EventType::PreField, logging(&log, "victim", true));
        let bus_clone = bus.clone();

        // Field tier runs first and removes the app-tier victim
        bus.on_event(
            EventFilter::new(EventType::PreField).field("amount"),
            Listener::new("remover", move |_| {
                bus_clone.unregister(victim);
                true
            }),
        );

        assert!(block_on(bus.raise(field_event(form))).unwrap());
        assert_eq!(*log.borrow(), vec!["victim"]);

        log.borrow_mut().clear();
        block_on(bus.raise(field_event(form))).unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_clear_keeps_ids_fresh() {
        let (bus, log) = setup();
        let first = bus.on(logging(&log, "a", true));
        bus.clear();
        let second = bus.on(logging(&log, "b", true));
        assert_ne!(first, second);
        assert_eq!(bus.len(), 1);
    }
}
