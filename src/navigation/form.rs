//! Forms and field instances.
//!
//! A form groups blocks and remembers which field instance was last current
//! in it. A field instance is one widget: a field of a block, shown on a row.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::model::BlockRef;
use crate::types::{FormId, InstanceId};

/// Shared handle to a form.
pub type FormRef = Rc<Form>;

// =============================================================================
// FIELD INSTANCE
// =============================================================================

/// One widget bound to a field on a row.
///
/// Identity is the instance id; two instances of the same field on the same
/// row are still different widgets.
#[derive(Clone)]
pub struct FieldInstance {
    id: InstanceId,
    form: FormId,
    block: BlockRef,
    field: String,
    row: usize,
}

impl FieldInstance {
    pub fn new(form: &Form, block: &BlockRef, field: &str, row: usize) -> Self {
        Self {
            id: InstanceId::next(),
            form: form.id(),
            block: block.clone(),
            field: field.to_lowercase(),
            row,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn form_id(&self) -> FormId {
        self.form
    }

    pub fn block(&self) -> &BlockRef {
        &self.block
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn row(&self) -> usize {
        self.row
    }

    /// Offset of this instance's row from its block's current row.
    pub fn offset(&self) -> isize {
        self.block.offset_of(self.row)
    }
}

impl PartialEq for FieldInstance {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FieldInstance {}

impl fmt::Debug for FieldInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldInstance")
            .field("id", &self.id)
            .field("form", &self.form)
            .field("block", &self.block.name())
            .field("field", &self.field)
            .field("row", &self.row)
            .finish()
    }
}

impl fmt::Display for FieldInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}[{}]", self.block.name(), self.field, self.row)
    }
}

// =============================================================================
// FORM
// =============================================================================

pub struct Form {
    id: FormId,
    name: String,
    blocks: RefCell<Vec<BlockRef>>,
    current: RefCell<Option<FieldInstance>>,
}

impl Form {
    pub fn new(name: &str) -> Self {
        Self {
            id: FormId::next(),
            name: name.to_string(),
            blocks: RefCell::new(Vec::new()),
            current: RefCell::new(None),
        }
    }

    pub fn with_block(self, block: BlockRef) -> Self {
        self.add_block(block);
        self
    }

    pub fn into_ref(self) -> FormRef {
        Rc::new(self)
    }

    pub fn id(&self) -> FormId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a block, replacing one with the same name.
    pub fn add_block(&self, block: BlockRef) {
        let mut blocks = self.blocks.borrow_mut();
        blocks.retain(|existing| existing.name() != block.name());
        tracing::debug!(form = %self.name, block = block.name(), "added block");
        blocks.push(block);
    }

    pub fn block(&self, name: &str) -> Option<BlockRef> {
        let name = name.to_lowercase();
        self.blocks
            .borrow()
            .iter()
            .find(|block| block.name() == name)
            .cloned()
    }

    pub fn blocks(&self) -> Vec<BlockRef> {
        self.blocks.borrow().clone()
    }

    /// Create an instance of `field` in block `block` on `row`.
    pub fn instance(&self, block: &str, field: &str, row: usize) -> Option<FieldInstance> {
        let block = self.block(block)?;
        Some(FieldInstance::new(self, &block, field, row))
    }

    /// Field instance last entered successfully in this form.
    pub fn current_instance(&self) -> Option<FieldInstance> {
        self.current.borrow().clone()
    }

    pub fn current_block(&self) -> Option<BlockRef> {
        self.current.borrow().as_ref().map(|inst| inst.block().clone())
    }

    pub(crate) fn set_current_instance(&self, inst: Option<FieldInstance>) {
        *self.current.borrow_mut() = inst;
    }

    /// Validate the current block's current record.
    ///
    /// A form nobody has entered yet is valid.
    pub fn validate(&self) -> bool {
        match self.current_block() {
            Some(block) => block.validate(),
            None => true,
        }
    }
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Form")
            .field("id", &self.id)
            .field("name", &self.name)
            .field(
                "blocks",
                &self
                    .blocks
                    .borrow()
                    .iter()
                    .map(|b| b.name().to_string())
                    .collect::<Vec<_>>(),
            )
            .field("current", &self.current.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Block, Record};

    fn form() -> Form {
        Form::new("orders").with_block(
            Block::new("Lines")
                .with_records([Record::fetched([("qty", 1)]), Record::fetched([("qty", 0)])])
                .with_validator(|r| {
                    r.get_value("qty").and_then(|v| v.as_f64()).unwrap_or(0.0) > 0.0
                })
                .into_ref(),
        )
    }

    #[test]
    fn test_block_lookup_case_insensitive() {
        let form = form();
        assert!(form.block("LINES").is_some());
        assert!(form.block("missing").is_none());
        assert!(form.instance("missing", "qty", 0).is_none());
    }

    #[test]
    fn test_add_block_replaces_same_name() {
        let form = form();
        form.add_block(Block::new("lines").into_ref());
        assert_eq!(form.blocks().len(), 1);
        assert_eq!(form.block("lines").unwrap().row_count(), 0);
    }

    #[test]
    fn test_instances_are_distinct() {
        let form = form();
        let a = form.instance("lines", "QTY", 1).unwrap();
        let b = form.instance("lines", "qty", 1).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.field(), "qty");
        assert_eq!(a.offset(), 1);
        assert_eq!(a.form_id(), form.id());
        assert_eq!(a.to_string(), "lines.qty[1]");
    }

    #[test]
    fn test_validate_uses_current_block() {
        let form = form();
        assert!(form.validate());

        let inst = form.instance("lines", "qty", 1).unwrap();
        inst.block().set_current_row(1);
        form.set_current_instance(Some(inst));
        assert!(!form.validate());
    }
}
