//! Form events - what gets raised on the bus.
//!
//! A `FormEvent` is constructed, raised, and dropped. Block and field names are
//! lower-cased on construction so listener filters can compare them exactly.

use std::fmt;

use super::event_type::EventType;
use super::key_map::KeyMap;
use crate::model::Transaction;
use crate::types::FormId;

/// The user action that triggered an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    /// Focus moved into a field instance.
    Focus,
    /// Focus left a field instance.
    Blur,
    /// A key stroke.
    Key(KeyMap),
    /// The user edited a value.
    Change,
}

/// An event raised on the [`crate::EventBus`].
#[derive(Clone)]
pub struct FormEvent {
    event_type: EventType,
    form: FormId,
    cause: Option<Cause>,
    block: Option<String>,
    field: Option<String>,
    key: Option<KeyMap>,
    transaction: Option<Transaction>,
}

impl FormEvent {
    /// Form-level event (no block or field scope).
    pub fn form(event_type: EventType, form: FormId) -> Self {
        Self {
            event_type,
            form,
            cause: None,
            block: None,
            field: None,
            key: None,
            transaction: None,
        }
    }

    /// Block-level event.
    pub fn block(event_type: EventType, form: FormId, block: &str) -> Self {
        Self {
            block: Some(block.to_lowercase()),
            ..Self::form(event_type, form)
        }
    }

    /// Field-level event.
    pub fn field(event_type: EventType, form: FormId, block: &str, field: &str) -> Self {
        Self {
            field: Some(field.to_lowercase()),
            ..Self::block(event_type, form, block)
        }
    }

    /// `Key` event, optionally scoped to a block and field.
    pub fn key(form: FormId, key: KeyMap, block: Option<&str>, field: Option<&str>) -> Self {
        Self {
            block: block.map(str::to_lowercase),
            field: field.map(str::to_lowercase),
            key: Some(key),
            cause: Some(Cause::Key(key)),
            ..Self::form(EventType::Key, form)
        }
    }

    pub fn with_cause(mut self, cause: Cause) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn with_transaction(mut self, transaction: Transaction) -> Self {
        self.transaction = Some(transaction);
        self
    }

    /// Lower-case block and field names in place.
    pub(crate) fn normalize(&mut self) {
        if let Some(block) = self.block.as_mut() {
            *block = block.to_lowercase();
        }
        if let Some(field) = self.field.as_mut() {
            *field = field.to_lowercase();
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn form_id(&self) -> FormId {
        self.form
    }

    pub fn cause(&self) -> Option<Cause> {
        self.cause
    }

    pub fn block_name(&self) -> Option<&str> {
        self.block.as_deref()
    }

    pub fn field_name(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn key_map(&self) -> Option<KeyMap> {
        self.key
    }

    /// The value transaction governing this event, if it runs inside one.
    ///
    /// Listeners read and write field values through it; writes become visible
    /// in the records only if the governing phase succeeds.
    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }
}

impl fmt::Display for FormEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.event_type)?;
        if let Some(block) = &self.block {
            write!(f, " block: {}", block)?;
        }
        if let Some(field) = &self.field {
            write!(f, " field: {}", field)?;
        }
        if let Some(key) = &self.key {
            write!(f, " key: {}", key)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FormEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormEvent")
            .field("event_type", &self.event_type)
            .field("form", &self.form)
            .field("cause", &self.cause)
            .field("block", &self.block)
            .field("field", &self.field)
            .field("key", &self.key)
            .field("transaction", &self.transaction.is_some())
            .finish()
    }
}
