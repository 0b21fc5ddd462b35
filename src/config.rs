//! Navigation configuration.
//!
//! ```ignore
//! use spark_forms::{EventType, NavigationConfig};
//!
//! let config = NavigationConfig::default()
//!     .blocking(EventType::PreRecord, true)
//!     .validate_on_leave(false);
//! ```

use std::collections::HashSet;

use crate::events::EventType;

/// Knobs for a [`crate::NavigationSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationConfig {
    /// Event types whose transactions refuse writes to blocks that did not
    /// join them.
    pub blocking_events: HashSet<EventType>,
    /// Refresh the view row when a phase transaction is applied.
    pub apply_to_view: bool,
    /// Validate the block being left before leaving a form, block or record.
    pub validate_on_leave: bool,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            blocking_events: EventType::ALL
                .into_iter()
                .filter(|event_type| event_type.is_form_level())
                .collect(),
            apply_to_view: true,
            validate_on_leave: true,
        }
    }
}

impl NavigationConfig {
    /// Turn blocking on or off for one event type.
    pub fn blocking(mut self, event_type: EventType, blocked: bool) -> Self {
        if blocked {
            self.blocking_events.insert(event_type);
        } else {
            self.blocking_events.remove(&event_type);
        }
        self
    }

    pub fn apply_to_view(mut self, apply: bool) -> Self {
        self.apply_to_view = apply;
        self
    }

    pub fn validate_on_leave(mut self, validate: bool) -> Self {
        self.validate_on_leave = validate;
        self
    }

    pub fn is_blocking(&self, event_type: EventType) -> bool {
        self.blocking_events.contains(&event_type)
    }
}
