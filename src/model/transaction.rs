//! Event Transactions - copy-on-write value overlays for one governing event
//!
//! While listeners for an event run, field writes land in an overlay instead
//! of the records. The overlay is applied when the event succeeds and
//! discarded when it fails, so a vetoed event leaves records and views exactly
//! as they were.
//!
//! Each participating block gets a scope: its base record plus a lazily
//! created working copy. Reads prefer the working copy; the first write
//! snapshots the whole base record into it.
//!
//! A *blocked* transaction refuses writes to blocks that did not join it.
//! Joins without a block are counted (the anonymous counter) and keep the
//! transaction open until each is removed.
//!
//! # API
//!
//! - `Transaction::open(join, blocked)` - Start a transaction
//! - `join(join)` - Add a block, or an anonymous participant
//! - `get_value` / `set_value` - Overlay-aware field access
//! - `apply(block)` - Commit a scope (or all) into the records
//! - `remove(block)` - Drop a scope (or one anonymous join) without committing
//! - `done()` - No scopes and no anonymous joins remain
//!
//! # Example
//!
//! ```ignore
//! use spark_forms::model::{Join, Transaction};
//!
//! let tx = Transaction::open(Some(Join::new(block.clone())), false);
//! tx.set_value(&block, "amount", 42);
//!
//! assert_eq!(tx.get_value(&block, "amount"), Some(42.into()));
//! assert_eq!(block.get_value("amount"), Some(10.into())); // untouched
//!
//! tx.apply(Some(&block));
//! assert_eq!(block.get_value("amount"), Some(42.into()));
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use super::block::BlockRef;
use super::record::{Record, RecordRef};
use crate::types::Value;

// =============================================================================
// JOIN REQUEST
// =============================================================================

/// Request to bring a block into a transaction.
///
/// Defaults: record at `offset` from the block's current row, offset 0,
/// view refreshed on apply.
#[derive(Clone)]
pub struct Join {
    block: BlockRef,
    record: Option<RecordRef>,
    offset: isize,
    apply_view: bool,
}

impl Join {
    pub fn new(block: BlockRef) -> Self {
        Self {
            block,
            record: None,
            offset: 0,
            apply_view: true,
        }
    }

    /// Use this record instead of looking one up by offset.
    pub fn record(mut self, record: RecordRef) -> Self {
        self.record = Some(record);
        self
    }

    pub fn offset(mut self, offset: isize) -> Self {
        self.offset = offset;
        self
    }

    pub fn apply_view(mut self, apply_view: bool) -> Self {
        self.apply_view = apply_view;
        self
    }

    /// Build the scope. A missing record still yields a scope, one that
    /// refuses writes, so the block cannot fall back to its current row.
    fn resolve(self) -> BlockScope {
        let record = self.record.or_else(|| self.block.record(self.offset));
        if record.is_none() {
            tracing::warn!(
                block = self.block.name(),
                offset = self.offset,
                "no record at offset, writes to this block will be refused"
            );
        }

        BlockScope {
            block: self.block,
            record,
            offset: self.offset,
            apply_view: self.apply_view,
            working: None,
        }
    }
}

// =============================================================================
// BLOCK SCOPE
// =============================================================================

struct BlockScope {
    block: BlockRef,
    record: Option<RecordRef>,
    offset: isize,
    apply_view: bool,
    working: Option<Record>,
}

impl BlockScope {
    fn get_value(&self, field: &str) -> Option<Value> {
        match (&self.working, &self.record) {
            (Some(working), _) => working.get_value(field).cloned(),
            (None, Some(record)) => record.borrow().get_value(field).cloned(),
            (None, None) => None,
        }
    }

    /// `false` when the scope has no record to write against.
    fn set_value(&mut self, field: &str, value: Value) -> bool {
        let Some(record) = &self.record else {
            tracing::warn!(
                block = self.block.name(),
                field,
                offset = self.offset,
                "no record to write to"
            );
            return false;
        };
        self.working
            .get_or_insert_with(|| record.borrow().snapshot())
            .set_value(field, value);
        true
    }

    fn apply(self) {
        let (Some(working), Some(record)) = (self.working, self.record) else {
            return;
        };

        {
            let mut record = record.borrow_mut();
            for (name, value) in working.values() {
                record.set_value(name, value.clone());
            }
        }

        if self.apply_view {
            if let Some(view) = self.block.view() {
                match view.row().checked_add_signed(self.offset) {
                    Some(row) => view.refresh(row, &record.borrow()),
                    None => tracing::warn!(
                        block = self.block.name(),
                        offset = self.offset,
                        "applied row is above the view, not refreshed"
                    ),
                }
            }
        }

        tracing::debug!(block = self.block.name(), offset = self.offset, "applied working copy");
    }
}

// =============================================================================
// EVENT TRANSACTION
// =============================================================================

/// Overlay state for one governing event.
#[derive(Default)]
pub struct EventTransaction {
    anonymous: usize,
    blocked: bool,
    refused: bool,
    scopes: BTreeMap<String, BlockScope>,
}

impl EventTransaction {
    /// Start a transaction with one participant.
    ///
    /// `None` counts an anonymous join. A join whose record cannot be
    /// resolved still joins its block; writes to it are refused.
    pub fn open(join: Option<Join>, blocked: bool) -> Self {
        let mut trx = Self {
            blocked,
            ..Self::default()
        };
        trx.join(join);
        trx
    }

    pub fn blocked(&self) -> bool {
        self.blocked
    }

    /// Whether a write was refused because of the blocked flag.
    pub fn refused(&self) -> bool {
        self.refused
    }

    /// Add a participant. Joining a block again replaces its scope.
    pub fn join(&mut self, join: Option<Join>) {
        match join {
            None => self.anonymous += 1,
            Some(join) => {
                let name = join.block.name().to_string();
                self.scopes.insert(name, join.resolve());
            }
        }
    }

    pub fn is_joined(&self, block: &BlockRef) -> bool {
        self.scopes.contains_key(block.name())
    }

    /// Overlay-aware read.
    ///
    /// Blocks outside the transaction are read directly: the widget value if
    /// the view holds one, else the current record.
    pub fn get_value(&self, block: &BlockRef, field: &str) -> Option<Value> {
        match self.scopes.get(block.name()) {
            Some(scope) => scope.get_value(field),
            None => block.displayed_value(field),
        }
    }

    /// Overlay write. Never touches the record.
    ///
    /// Returns `false` when the transaction is blocked and `block` did not
    /// join it, or when the joined row has no record. Only blocks nobody
    /// joined fall back to their current row.
    pub fn set_value(&mut self, block: &BlockRef, field: &str, value: Value) -> bool {
        if !self.scopes.contains_key(block.name()) {
            if self.blocked {
                tracing::warn!(
                    block = block.name(),
                    field,
                    "changes are not allowed to this block while in a blocking event"
                );
                self.refused = true;
                return false;
            }

            self.scopes
                .insert(block.name().to_string(), Join::new(block.clone()).resolve());
        }

        match self.scopes.get_mut(block.name()) {
            Some(scope) => scope.set_value(field, value),
            None => false,
        }
    }

    /// Commit one scope, or every scope when `block` is `None`.
    pub fn apply(&mut self, block: Option<&BlockRef>) {
        for scope in self.detach(block) {
            scope.apply();
        }
    }

    /// Drop one scope without committing, or one anonymous join when `block`
    /// is `None`.
    pub fn remove(&mut self, block: Option<&BlockRef>) {
        match block {
            Some(block) => {
                self.scopes.remove(block.name());
            }
            None if self.anonymous > 0 => self.anonymous -= 1,
            None => tracing::warn!("anonymous remove without a matching join"),
        }
    }

    /// Drop every scope and anonymous join without committing.
    pub fn discard(&mut self) {
        self.scopes.clear();
        self.anonymous = 0;
    }

    /// `true` once no scope and no anonymous join remains.
    pub fn done(&self) -> bool {
        self.scopes.is_empty() && self.anonymous == 0
    }

    fn detach(&mut self, block: Option<&BlockRef>) -> Vec<BlockScope> {
        match block {
            Some(block) => self.scopes.remove(block.name()).into_iter().collect(),
            None => std::mem::take(&mut self.scopes).into_values().collect(),
        }
    }
}

impl fmt::Debug for EventTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTransaction")
            .field("anonymous", &self.anonymous)
            .field("blocked", &self.blocked)
            .field("refused", &self.refused)
            .field("blocks", &self.scopes.keys().collect::<Vec<_>>())
            .finish()
    }
}

// =============================================================================
// SHARED HANDLE
// =============================================================================

/// Shared handle to an [`EventTransaction`].
///
/// Carried by [`crate::events::FormEvent`] so listeners can read and write
/// through the overlay. Every method borrows only for its own duration.
#[derive(Clone, Default)]
pub struct Transaction(Rc<RefCell<EventTransaction>>);

impl Transaction {
    pub fn open(join: Option<Join>, blocked: bool) -> Self {
        Self(Rc::new(RefCell::new(EventTransaction::open(join, blocked))))
    }

    pub fn join(&self, join: Option<Join>) {
        self.0.borrow_mut().join(join);
    }

    pub fn get_value(&self, block: &BlockRef, field: &str) -> Option<Value> {
        self.0.borrow().get_value(block, field)
    }

    pub fn set_value(&self, block: &BlockRef, field: &str, value: impl Into<Value>) -> bool {
        self.0.borrow_mut().set_value(block, field, value.into())
    }

    /// Commit. Views are refreshed after the transaction borrow is released.
    pub fn apply(&self, block: Option<&BlockRef>) {
        let scopes = self.0.borrow_mut().detach(block);
        for scope in scopes {
            scope.apply();
        }
    }

    pub fn remove(&self, block: Option<&BlockRef>) {
        self.0.borrow_mut().remove(block);
    }

    pub fn discard(&self) {
        self.0.borrow_mut().discard();
    }

    pub fn done(&self) -> bool {
        self.0.borrow().done()
    }

    pub fn blocked(&self) -> bool {
        self.0.borrow().blocked()
    }

    pub fn refused(&self) -> bool {
        self.0.borrow().refused()
    }

    pub fn is_joined(&self, block: &BlockRef) -> bool {
        self.0.borrow().is_joined(block)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0.borrow(), f)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Block, BlockView};
    use std::cell::Cell;

    #[derive(Default)]
    struct RecordingView {
        row: Cell<usize>,
        refreshed: RefCell<Vec<(usize, String)>>,
    }

    impl BlockView for RecordingView {
        fn row(&self) -> usize {
            self.row.get()
        }

        fn refresh(&self, row: usize, record: &Record) {
            self.refreshed.borrow_mut().push((row, record.to_string()));
        }
    }

    fn setup(name: &str) -> (BlockRef, Rc<RecordingView>) {
        let view = Rc::new(RecordingView::default());
        let block = Block::new(name)
            .with_records([
                Record::fetched([("id", Value::from(1)), ("amount", Value::from(10))]),
                Record::fetched([("id", Value::from(2)), ("amount", Value::from(20))]),
            ])
            .with_view(view.clone())
            .into_ref();
        (block, view)
    }

    #[test]
    fn test_overlay_isolation() {
        let (block, view) = setup("orders");
        let tx = Transaction::open(Some(Join::new(block.clone())), false);

        assert!(tx.set_value(&block, "amount", 99));
        assert_eq!(tx.get_value(&block, "amount"), Some(Value::Int(99)));
        assert_eq!(block.get_value("amount"), Some(Value::Int(10)));
        assert!(view.refreshed.borrow().is_empty());

        tx.apply(None);
        assert_eq!(block.get_value("amount"), Some(Value::Int(99)));
        assert_eq!(*view.refreshed.borrow(), vec![(0, "id=1, amount=99".to_string())]);
        assert!(tx.done());
    }

    #[test]
    fn test_reads_fall_through_before_first_write() {
        let (block, _) = setup("orders");
        let tx = Transaction::open(Some(Join::new(block.clone())), false);

        block.set_value("amount", 11);
        assert_eq!(tx.get_value(&block, "amount"), Some(Value::Int(11)));

        tx.set_value(&block, "id", 5);
        block.set_value("amount", 12);
        // Working copy was snapshotted at the first write
        assert_eq!(tx.get_value(&block, "amount"), Some(Value::Int(11)));
    }

    #[test]
    fn test_offset_scope() {
        let (block, view) = setup("orders");
        let tx = Transaction::open(Some(Join::new(block.clone()).offset(1)), false);

        assert_eq!(tx.get_value(&block, "id"), Some(Value::Int(2)));
        tx.set_value(&block, "amount", 21);
        tx.apply(Some(&block));

        let second = block.record(1).unwrap();
        assert_eq!(second.borrow().get_value("amount"), Some(&Value::Int(21)));
        assert_eq!(block.get_value("amount"), Some(Value::Int(10)));
        assert_eq!(view.refreshed.borrow()[0].0, 1);
    }

    #[test]
    fn test_apply_without_view_refresh() {
        let (block, view) = setup("orders");
        let tx = Transaction::open(Some(Join::new(block.clone()).apply_view(false)), false);
        tx.set_value(&block, "amount", 1);
        tx.apply(None);

        assert_eq!(block.get_value("amount"), Some(Value::Int(1)));
        assert!(view.refreshed.borrow().is_empty());
    }

    #[test]
    fn test_apply_without_writes_is_noop() {
        let (block, view) = setup("orders");
        let tx = Transaction::open(Some(Join::new(block.clone())), false);
        tx.apply(Some(&block));

        assert!(view.refreshed.borrow().is_empty());
        assert_eq!(
            block.current_record().unwrap().borrow().status(),
            crate::model::RecordStatus::Query
        );
        assert!(tx.done());
    }

    #[test]
    fn test_remove_discards_writes() {
        let (block, view) = setup("orders");
        let tx = Transaction::open(Some(Join::new(block.clone())), false);
        tx.set_value(&block, "amount", 77);
        tx.remove(Some(&block));
        tx.apply(None);

        assert_eq!(block.get_value("amount"), Some(Value::Int(10)));
        assert!(view.refreshed.borrow().is_empty());
        assert!(tx.done());
    }

    #[test]
    fn test_blocked_refuses_foreign_block() {
        let (joined, _) = setup("a");
        let (foreign, _) = setup("c");
        let tx = Transaction::open(Some(Join::new(joined.clone())), true);

        assert!(!tx.set_value(&foreign, "amount", 5));
        assert!(tx.refused());
        assert!(!tx.is_joined(&foreign));

        tx.apply(None);
        assert_eq!(foreign.get_value("amount"), Some(Value::Int(10)));

        // The joined block still accepts writes
        let tx = Transaction::open(Some(Join::new(joined.clone())), true);
        assert!(tx.set_value(&joined, "amount", 5));
        assert!(!tx.refused());
    }

    #[test]
    fn test_unblocked_joins_foreign_block_lazily() {
        let (joined, _) = setup("a");
        let (other, _) = setup("b");
        let tx = Transaction::open(Some(Join::new(joined)), false);

        assert!(tx.set_value(&other, "amount", 3));
        assert!(tx.is_joined(&other));
        assert_eq!(other.get_value("amount"), Some(Value::Int(10)));

        tx.apply(None);
        assert_eq!(other.get_value("amount"), Some(Value::Int(3)));
    }

    #[test]
    fn test_unjoined_read_prefers_widget_value() {
        struct WidgetView;
        impl BlockView for WidgetView {
            fn row(&self) -> usize {
                0
            }
            fn refresh(&self, _row: usize, _record: &Record) {}
            fn field_value(&self, field: &str) -> Option<Value> {
                (field == "amount").then(|| Value::Int(500))
            }
        }

        let block = Block::new("w")
            .with_records([Record::fetched([("amount", 1)])])
            .with_view(Rc::new(WidgetView))
            .into_ref();
        let tx = Transaction::open(None, false);

        assert_eq!(tx.get_value(&block, "amount"), Some(Value::Int(500)));
        tx.join(Some(Join::new(block.clone())));
        assert_eq!(tx.get_value(&block, "amount"), Some(Value::Int(1)));
    }

    #[test]
    fn test_rejoin_replaces_scope() {
        let (block, _) = setup("orders");
        let tx = Transaction::open(Some(Join::new(block.clone())), false);
        tx.set_value(&block, "amount", 50);

        tx.join(Some(Join::new(block.clone()).offset(1)));
        assert_eq!(tx.get_value(&block, "amount"), Some(Value::Int(20)));
    }

    #[test]
    fn test_anonymous_join_balance() {
        let tx = Transaction::open(None, false);
        tx.join(None);
        tx.join(None);

        tx.remove(None);
        tx.remove(None);
        assert!(!tx.done());

        tx.remove(None);
        assert!(tx.done());

        // Unbalanced remove stays at zero
        tx.remove(None);
        assert!(tx.done());
    }

    #[test]
    fn test_done_requires_scopes_and_counter_empty() {
        let (block, _) = setup("orders");
        let tx = Transaction::open(None, false);
        tx.join(Some(Join::new(block.clone())));

        tx.remove(None);
        assert!(!tx.done());
        tx.remove(Some(&block));
        assert!(tx.done());
    }

    #[test]
    fn test_missing_record_refuses_writes() {
        let (block, view) = setup("orders");
        let tx = Transaction::open(Some(Join::new(block.clone()).offset(5)), false);
        assert!(tx.is_joined(&block));
        assert_eq!(tx.get_value(&block, "amount"), None);

        // Must not fall back to the current row
        assert!(!tx.set_value(&block, "amount", 777));
        tx.apply(None);
        assert_eq!(block.get_value("amount"), Some(Value::Int(10)));
        assert!(view.refreshed.borrow().is_empty());
        assert!(tx.done());

        let empty = Block::new("empty").into_ref();
        assert!(!tx.set_value(&empty, "x", 1));
    }
}
