//! Event filters and the matcher that decides whether a listener applies.
//!
//! A filter always names an event type and may narrow it to a block, or to a
//! field within a block. The presence of a form and of the block/field scope
//! decides which dispatch tier the listener lands in:
//!
//! ```text
//! form?  block?  field?   tier
//! no     no      no       App
//! yes    no      no       Form
//! any    yes     no       Block
//! any    any     yes      Field
//! (no filter at all)      Unfiltered
//! ```

use super::event_type::EventType;
use super::form_event::FormEvent;
use crate::types::FormId;

// =============================================================================
// FILTER
// =============================================================================

/// Narrows a listener to one event type and optionally a block and field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub event_type: EventType,
    pub block: Option<String>,
    pub field: Option<String>,
}

impl EventFilter {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            block: None,
            field: None,
        }
    }

    /// Narrow to a block. Stored lower-case.
    pub fn block(mut self, block: &str) -> Self {
        self.block = Some(block.to_lowercase());
        self
    }

    /// Narrow to a field. Stored lower-case.
    pub fn field(mut self, field: &str) -> Self {
        self.field = Some(field.to_lowercase());
        self
    }

    pub(crate) fn normalize(&mut self) {
        if let Some(block) = self.block.as_mut() {
            *block = block.to_lowercase();
        }
        if let Some(field) = self.field.as_mut() {
            *field = field.to_lowercase();
        }
    }
}

impl From<EventType> for EventFilter {
    fn from(event_type: EventType) -> Self {
        EventFilter::new(event_type)
    }
}

// =============================================================================
// TIERS
// =============================================================================

/// Dispatch tiers, in raise precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Field,
    Block,
    Form,
    App,
    Unfiltered,
}

impl Tier {
    /// Tiers in the order `raise` walks them.
    pub const PRECEDENCE: [Tier; 5] = [
        Tier::Field,
        Tier::Block,
        Tier::Form,
        Tier::App,
        Tier::Unfiltered,
    ];

    /// Classify a registration.
    pub fn classify(form: Option<FormId>, filter: Option<&EventFilter>) -> Tier {
        match filter {
            None => Tier::Unfiltered,
            Some(filter) if filter.field.is_some() => Tier::Field,
            Some(filter) if filter.block.is_some() => Tier::Block,
            Some(_) if form.is_some() => Tier::Form,
            Some(_) => Tier::App,
        }
    }
}

// =============================================================================
// MATCHER
// =============================================================================

/// Check whether a listener scoped by `form` and `filter` applies to `event`.
///
/// The event type itself is not checked here; the bus only offers entries
/// registered for the event's type. Names compare exactly, both sides being
/// lower-case already.
pub fn matches(event: &FormEvent, form: Option<FormId>, filter: Option<&EventFilter>) -> bool {
    if let Some(form) = form {
        if form != event.form_id() {
            return false;
        }
    }

    if let Some(filter) = filter {
        if let Some(block) = filter.block.as_deref() {
            if event.block_name() != Some(block) {
                return false;
            }
        }
        if let Some(field) = filter.field.as_deref() {
            if event.field_name() != Some(field) {
                return false;
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let form = Some(FormId::next());
        let plain = EventFilter::new(EventType::PreField);
        let block = EventFilter::new(EventType::PreField).block("emp");
        let field = EventFilter::new(EventType::PreField).field("name");

        assert_eq!(Tier::classify(None, None), Tier::Unfiltered);
        assert_eq!(Tier::classify(form, None), Tier::Unfiltered);
        assert_eq!(Tier::classify(None, Some(&plain)), Tier::App);
        assert_eq!(Tier::classify(form, Some(&plain)), Tier::Form);
        assert_eq!(Tier::classify(None, Some(&block)), Tier::Block);
        assert_eq!(Tier::classify(form, Some(&block)), Tier::Block);
        assert_eq!(Tier::classify(None, Some(&field)), Tier::Field);
        assert_eq!(Tier::classify(form, Some(&field.clone().block("emp"))), Tier::Field);
    }

    #[test]
    fn test_filter_names_lowercased() {
        let filter = EventFilter::new(EventType::PreField).block("Emp").field("NAME");
        assert_eq!(filter.block.as_deref(), Some("emp"));
        assert_eq!(filter.field.as_deref(), Some("name"));
    }

    #[test]
    fn test_match_form_scope() {
        let mine = FormId::next();
        let other = FormId::next();
        let event = FormEvent::form(EventType::PreForm, mine);

        assert!(matches(&event, None, None));
        assert!(matches(&event, Some(mine), None));
        assert!(!matches(&event, Some(other), None));
    }

    #[test]
    fn test_match_block_and_field() {
        let form = FormId::next();
        let event = FormEvent::field(EventType::PreField, form, "EMP", "Name");

        let by_block = EventFilter::new(EventType::PreField).block("emp");
        let by_field = EventFilter::new(EventType::PreField).field("name");
        let wrong_block = EventFilter::new(EventType::PreField).block("dept");
        let wrong_field = EventFilter::new(EventType::PreField).block("emp").field("salary");

        assert!(matches(&event, None, Some(&by_block)));
        assert!(matches(&event, None, Some(&by_field)));
        assert!(!matches(&event, None, Some(&wrong_block)));
        assert!(!matches(&event, None, Some(&wrong_field)));
    }

    #[test]
    fn test_block_filter_rejects_form_level_event() {
        let form = FormId::next();
        let event = FormEvent::form(EventType::PreForm, form);
        let filter = EventFilter::new(EventType::PreForm).block("emp");
        assert!(!matches(&event, None, Some(&filter)));
    }
}
