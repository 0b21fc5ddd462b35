//! Blocks - a named set of records shown through one view.
//!
//! The block is the collaborator navigation and transactions work against:
//! it hands out records by offset from its current row, validates its current
//! record, and forwards refreshes to its view. Rendering lives behind the
//! [`BlockView`] trait.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::record::{Record, RecordRef};
use crate::types::Value;

/// Shared handle to a block.
pub type BlockRef = Rc<Block>;

/// Record validator. Returns `true` when the record may be left.
pub type Validator = Box<dyn Fn(&Record) -> bool>;

// =============================================================================
// VIEW
// =============================================================================

/// The rendering side of a block.
pub trait BlockView {
    /// Row the view currently treats as current.
    fn row(&self) -> usize;

    /// Redraw `row` from committed record values.
    fn refresh(&self, row: usize, record: &Record);

    /// Value currently held by the field's widget, if it has one.
    ///
    /// Widgets can hold edits not yet written to the record.
    fn field_value(&self, _field: &str) -> Option<Value> {
        None
    }

    /// Mark `row` as current.
    fn set_current_row(&self, _row: usize) {}
}

// =============================================================================
// BLOCK
// =============================================================================

pub struct Block {
    name: String,
    records: RefCell<Vec<RecordRef>>,
    current: Cell<usize>,
    view: RefCell<Option<Rc<dyn BlockView>>>,
    validator: RefCell<Option<Validator>>,
    validated: Cell<bool>,
}

impl Block {
    /// Create an empty block. The name is stored lower-case.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_lowercase(),
            records: RefCell::new(Vec::new()),
            current: Cell::new(0),
            view: RefCell::new(None),
            validator: RefCell::new(None),
            validated: Cell::new(true),
        }
    }

    pub fn with_records(self, records: impl IntoIterator<Item = Record>) -> Self {
        self.records
            .borrow_mut()
            .extend(records.into_iter().map(Record::into_ref));
        self
    }

    pub fn with_view(self, view: Rc<dyn BlockView>) -> Self {
        *self.view.borrow_mut() = Some(view);
        self
    }

    pub fn with_validator<F>(self, validator: F) -> Self
    where
        F: Fn(&Record) -> bool + 'static,
    {
        *self.validator.borrow_mut() = Some(Box::new(validator));
        self
    }

    pub fn into_ref(self) -> BlockRef {
        Rc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn view(&self) -> Option<Rc<dyn BlockView>> {
        self.view.borrow().clone()
    }

    pub fn set_view(&self, view: Option<Rc<dyn BlockView>>) {
        *self.view.borrow_mut() = view;
    }

    pub fn set_validator<F>(&self, validator: F)
    where
        F: Fn(&Record) -> bool + 'static,
    {
        *self.validator.borrow_mut() = Some(Box::new(validator));
    }

    // -------------------------------------------------------------------------
    // Records
    // -------------------------------------------------------------------------

    /// Record at `offset` from the current row.
    pub fn record(&self, offset: isize) -> Option<RecordRef> {
        let index = self.current.get().checked_add_signed(offset)?;
        self.records.borrow().get(index).cloned()
    }

    pub fn current_record(&self) -> Option<RecordRef> {
        self.record(0)
    }

    /// Append a record and return its row.
    pub fn push_record(&self, record: Record) -> usize {
        let mut records = self.records.borrow_mut();
        records.push(record.into_ref());
        records.len() - 1
    }

    pub fn row_count(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn current_row(&self) -> usize {
        self.current.get()
    }

    /// Move the current row. The view is told as well.
    pub fn set_current_row(&self, row: usize) {
        if row != self.current.get() {
            self.validated.set(true);
        }
        self.current.set(row);
        if let Some(view) = self.view() {
            view.set_current_row(row);
        }
    }

    /// Offset of `row` relative to the current row.
    pub fn offset_of(&self, row: usize) -> isize {
        row as isize - self.current.get() as isize
    }

    // -------------------------------------------------------------------------
    // Values
    // -------------------------------------------------------------------------

    /// Value of `field` on the current record.
    pub fn get_value(&self, field: &str) -> Option<Value> {
        let record = self.current_record()?;
        let value = record.borrow().get_value(field).cloned();
        value
    }

    /// Write `field` on the current record, bypassing any transaction.
    ///
    /// Returns `false` when the block has no current record.
    pub fn set_value(&self, field: &str, value: impl Into<Value>) -> bool {
        let Some(record) = self.current_record() else {
            return false;
        };
        record.borrow_mut().set_value(field, value);
        self.validated.set(false);
        true
    }

    /// Widget value if the view holds one, else the record value.
    pub fn displayed_value(&self, field: &str) -> Option<Value> {
        self.view()
            .and_then(|view| view.field_value(field))
            .or_else(|| self.get_value(field))
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    /// Run the validator over the current record.
    ///
    /// A block without a validator, or without a current record, is valid.
    pub fn validate(&self) -> bool {
        let valid = match (self.validator.borrow().as_ref(), self.current_record()) {
            (Some(validator), Some(record)) => validator(&record.borrow()),
            _ => true,
        };
        self.validated.set(valid);
        tracing::debug!(block = %self.name, valid, "validated current record");
        valid
    }

    /// Result of the last validation; `false` after an unvalidated write.
    pub fn validated(&self) -> bool {
        self.validated.get()
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("name", &self.name)
            .field("rows", &self.row_count())
            .field("current", &self.current.get())
            .field("validated", &self.validated.get())
            .finish()
    }
}
