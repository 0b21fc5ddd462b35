//! # spark-forms
//!
//! Form events, navigation and event-scoped value transactions for Rust.
//!
//! Built on [spark-signals](https://github.com/RLabs-Inc/spark-signals) for the
//! reactive focus and current-form pointers.
//!
//! ## Architecture
//!
//! Application code registers listeners on an [`EventBus`], scoped to a form,
//! a block, a field, or nothing at all. A [`NavigationSession`] turns focus
//! moves into a sequence of lifecycle events (`PostRecord`, `PreBlock`,
//! `PreField`, ...) and raises each one inside a [`Transaction`]:
//!
//! ```text
//! focus move → phase → Transaction::open → EventBus::raise → apply | discard
//! ```
//!
//! Any listener can veto a phase by returning `false`. The transition stops,
//! focus goes back to where it was, and writes made during the vetoed phase
//! never reach the records.
//!
//! ## Modules
//!
//! - [`types`] - Core types (Value, FormId, InstanceId, ListenerId)
//! - [`events`] - Event types, filters, listeners, key maps and the bus
//! - [`model`] - Records, blocks and transactions
//! - [`navigation`] - Forms, field instances and the navigation session
//! - [`config`] - Navigation configuration
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod navigation;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use config::NavigationConfig;

pub use error::{DispatchError, ListenerError, NavigationError};

pub use events::{
    Cause, EventBus, EventFilter, EventType, FormEvent, KeyMap, KeyMapError, KeyMapping,
    KeyModifiers, Listener, ListenerFuture, ListenerResult, Tier,
};

pub use model::{
    Block, BlockRef, BlockView, EventTransaction, Join, Record, RecordRef, RecordStatus,
    Transaction,
};

pub use navigation::{FieldInstance, Form, FormRef, NavigationSession};
