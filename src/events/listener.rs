//! Listeners - stored callables and their registry entries.
//!
//! A listener answers "continue?" for each event it receives:
//! - `Some(true)` or `None` (no opinion) continues the walk
//! - `Some(false)` stops it and makes `raise` return `false`
//! - `Err(_)` stops it and makes `raise` fail
//!
//! Callables are synchronous closures or closures returning a local future.
//! The `dynamic` constructors bridge callables producing an untyped [`Value`]
//! and enforce the boolean contract at runtime.

use std::future::Future;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};

use super::filter::EventFilter;
use super::form_event::FormEvent;
use crate::error::{DispatchError, ListenerError};
use crate::types::{FormId, ListenerId, Value};

/// What a listener returns. `None` means no opinion.
pub type ListenerResult = Result<Option<bool>, ListenerError>;

/// Future returned by asynchronous listeners.
pub type ListenerFuture = LocalBoxFuture<'static, ListenerResult>;

type DynamicFuture = LocalBoxFuture<'static, Result<Value, ListenerError>>;

enum Callback {
    Sync(Box<dyn Fn(&FormEvent) -> ListenerResult>),
    Async(Box<dyn Fn(FormEvent) -> ListenerFuture>),
    Dynamic(Box<dyn Fn(&FormEvent) -> Result<Value, ListenerError>>),
    DynamicAsync(Box<dyn Fn(FormEvent) -> DynamicFuture>),
}

// =============================================================================
// LISTENER
// =============================================================================

/// A callable plus the method label used in diagnostics.
pub struct Listener {
    method: String,
    callback: Callback,
}

impl Listener {
    /// Synchronous listener returning a plain verdict.
    pub fn new<F>(method: impl Into<String>, f: F) -> Self
    where
        F: Fn(&FormEvent) -> bool + 'static,
    {
        Self {
            method: method.into(),
            callback: Callback::Sync(Box::new(move |event| Ok(Some(f(event))))),
        }
    }

    /// Synchronous listener that may fail or abstain.
    pub fn fallible<F>(method: impl Into<String>, f: F) -> Self
    where
        F: Fn(&FormEvent) -> ListenerResult + 'static,
    {
        Self {
            method: method.into(),
            callback: Callback::Sync(Box::new(f)),
        }
    }

    /// Listener that only observes. Never stops the walk.
    pub fn observer<F>(method: impl Into<String>, f: F) -> Self
    where
        F: Fn(&FormEvent) + 'static,
    {
        Self {
            method: method.into(),
            callback: Callback::Sync(Box::new(move |event| {
                f(event);
                Ok(None)
            })),
        }
    }

    /// Asynchronous listener. The raise walk awaits it before moving on.
    pub fn future<F, Fut>(method: impl Into<String>, f: F) -> Self
    where
        F: Fn(FormEvent) -> Fut + 'static,
        Fut: Future<Output = ListenerResult> + 'static,
    {
        Self {
            method: method.into(),
            callback: Callback::Async(Box::new(move |event| f(event).boxed_local())),
        }
    }

    /// Untyped synchronous listener.
    ///
    /// `Bool` is the verdict, `Null` abstains, anything else is a contract
    /// violation reported by `raise`.
    pub fn dynamic<F>(method: impl Into<String>, f: F) -> Self
    where
        F: Fn(&FormEvent) -> Result<Value, ListenerError> + 'static,
    {
        Self {
            method: method.into(),
            callback: Callback::Dynamic(Box::new(f)),
        }
    }

    /// Untyped asynchronous listener.
    ///
    /// `Bool` is the verdict; any other resolved value continues the walk.
    pub fn dynamic_async<F, Fut>(method: impl Into<String>, f: F) -> Self
    where
        F: Fn(FormEvent) -> Fut + 'static,
        Fut: Future<Output = Result<Value, ListenerError>> + 'static,
    {
        Self {
            method: method.into(),
            callback: Callback::DynamicAsync(Box::new(move |event| f(event).boxed_local())),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Invoke and resolve to "continue?".
    pub(crate) async fn invoke(&self, event: &FormEvent) -> Result<bool, DispatchError> {
        match &self.callback {
            Callback::Sync(f) => self.verdict(f(event)),
            Callback::Async(f) => self.verdict(f(event.clone()).await),
            Callback::Dynamic(f) => match f(event) {
                Ok(Value::Bool(cont)) => Ok(cont),
                Ok(Value::Null) => Ok(true),
                Ok(returned) => Err(DispatchError::ContractViolation {
                    method: self.method.clone(),
                    returned,
                }),
                Err(source) => Err(self.failed(source)),
            },
            Callback::DynamicAsync(f) => match f(event.clone()).await {
                Ok(Value::Bool(cont)) => Ok(cont),
                Ok(Value::Null) => Ok(true),
                Ok(returned) => {
                    tracing::warn!(
                        method = %self.method,
                        returned = returned.kind(),
                        "async listener resolved to a non-boolean, continuing"
                    );
                    Ok(true)
                }
                Err(source) => Err(self.failed(source)),
            },
        }
    }

    fn verdict(&self, result: ListenerResult) -> Result<bool, DispatchError> {
        match result {
            Ok(verdict) => Ok(verdict.unwrap_or(true)),
            Err(source) => Err(self.failed(source)),
        }
    }

    fn failed(&self, source: ListenerError) -> DispatchError {
        DispatchError::Listener {
            method: self.method.clone(),
            source,
        }
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener").field("method", &self.method).finish()
    }
}

// =============================================================================
// ENTRY
// =============================================================================

/// One registered (listener, scope) pair.
///
/// Entries from one registration share `id` and the same `Rc<Listener>`.
#[derive(Debug, Clone)]
pub struct ListenerEntry {
    pub id: ListenerId,
    pub form: Option<FormId>,
    pub filter: Option<EventFilter>,
    pub listener: Rc<Listener>,
}
