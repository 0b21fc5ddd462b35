//! Records - ordered name/value rows.
//!
//! Column names are case-insensitive and stored lower-case. Writing a column
//! that does not exist yet appends it.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::types::Value;

/// Shared handle to a record.
///
/// Blocks own their records; transactions and views hold clones of the handle.
pub type RecordRef = Rc<RefCell<Record>>;

/// Lifecycle state of a record relative to its data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordStatus {
    /// Fetched and unchanged.
    #[default]
    Query,
    /// Created locally, not yet stored.
    Insert,
    /// Fetched and modified.
    Update,
    /// Marked for deletion.
    Delete,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: Vec<(String, Value)>,
    status: RecordStatus,
}

impl Record {
    /// Empty record, as created for a new row.
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            status: RecordStatus::Insert,
        }
    }

    /// Record as fetched from a data source.
    pub fn fetched<K, V>(columns: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut record = Self::default();
        for (name, value) in columns {
            record.put(name.as_ref(), value.into());
        }
        record
    }

    /// Wrap in a shared handle.
    pub fn into_ref(self) -> RecordRef {
        Rc::new(RefCell::new(self))
    }

    pub fn status(&self) -> RecordStatus {
        self.status
    }

    pub fn set_status(&mut self, status: RecordStatus) {
        self.status = status;
    }

    /// Value of a column, `None` if the column does not exist.
    pub fn get_value(&self, column: &str) -> Option<&Value> {
        let column = column.to_lowercase();
        self.columns
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    /// Write a column. A fetched record becomes `Update`.
    pub fn set_value(&mut self, column: &str, value: impl Into<Value>) {
        if self.status == RecordStatus::Query {
            self.status = RecordStatus::Update;
        }
        self.put(column, value.into());
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// `(name, value)` pairs in column order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Detached copy of every name/value pair.
    ///
    /// The copy is a new `Insert` record; it shares nothing with `self`.
    pub fn snapshot(&self) -> Record {
        Record {
            columns: self.columns.clone(),
            status: RecordStatus::Insert,
        }
    }

    fn put(&mut self, column: &str, value: Value) {
        let column = column.to_lowercase();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.columns.push((column, value)),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_case_insensitive() {
        let mut record = Record::fetched([("Name", Value::from("Ada"))]);
        assert_eq!(record.get_value("NAME"), Some(&Value::from("Ada")));

        record.set_value("name", "Grace");
        assert_eq!(record.len(), 1);
        assert_eq!(record.get_value("Name"), Some(&Value::from("Grace")));
    }

    #[test]
    fn test_status_transitions() {
        let mut fetched = Record::fetched([("id", 1)]);
        assert_eq!(fetched.status(), RecordStatus::Query);
        fetched.set_value("id", 2);
        assert_eq!(fetched.status(), RecordStatus::Update);

        let mut fresh = Record::new();
        fresh.set_value("id", 3);
        assert_eq!(fresh.status(), RecordStatus::Insert);
    }

    #[test]
    fn test_new_columns_append_in_order() {
        let mut record = Record::new();
        record.set_value("b", 1);
        record.set_value("a", 2);
        assert_eq!(record.columns().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(record.get_value("missing"), None);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let original = Record::fetched([("qty", 1)]);
        let mut copy = original.snapshot();
        copy.set_value("qty", 5);

        assert_eq!(original.get_value("qty"), Some(&Value::Int(1)));
        assert_eq!(copy.get_value("qty"), Some(&Value::Int(5)));
    }

    #[test]
    fn test_display() {
        let record = Record::fetched([("id", Value::from(7)), ("name", Value::from("x"))]);
        assert_eq!(record.to_string(), "id=7, name=x");
    }
}
