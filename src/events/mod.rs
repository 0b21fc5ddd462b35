//! Events Module - lifecycle events, listeners and the dispatch bus
//!
//! - **EventType** - What happened (PreField, PostRecord, Key, ...)
//! - **FormEvent** - A raised event with its form, block, field and key scope
//! - **EventFilter** - Narrows a listener to one type and optionally a block/field
//! - **Listener** - A stored callable, sync or async
//! - **EventBus** - Tiered registry and the raise algorithm
//! - **KeyMap** - Key strokes carried by `Key` events

mod bus;
mod event_type;
mod filter;
mod form_event;
mod key_map;
mod listener;

pub use bus::*;
pub use event_type::*;
pub use filter::*;
pub use form_event::*;
pub use key_map::*;
pub use listener::*;
