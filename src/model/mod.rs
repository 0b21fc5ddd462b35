//! Model Module - records, blocks and event-scoped transactions
//!
//! - **Record** - Ordered name/value row with a status
//! - **Block** - Records plus current row, validator and view hook
//! - **Transaction** - Copy-on-write overlay isolating listener writes

mod block;
mod record;
mod transaction;

pub use block::*;
pub use record::*;
pub use transaction::*;
