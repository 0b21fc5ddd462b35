//! Navigation Module - forms, field instances and focus transitions
//!
//! - **Form** - Named set of blocks remembering its current field instance
//! - **FieldInstance** - One widget: a block field on a row
//! - **NavigationSession** - Runs the phase sequence when focus moves

mod form;
mod session;

pub use form::*;
pub use session::*;
