//! Error types.
//!
//! A listener veto (`false`) is not an error; it is the normal abort signal.
//! Errors here are the failures that must not be swallowed: a listener that
//! failed, or one that broke the boolean result contract.

use thiserror::Error;

use crate::types::{FormId, Value};

/// Failure reported by a listener callable.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ListenerError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + 'static>>,
}

impl ListenerError {
    /// Create an error from a plain message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error.
    pub fn from_error<E>(error: E) -> Self
    where
        E: std::error::Error + 'static,
    {
        Self {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors returned by [`crate::EventBus::raise`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A listener failed. The walk stopped at it.
    #[error("listener '{method}' failed: {source}")]
    Listener {
        method: String,
        #[source]
        source: ListenerError,
    },

    /// A listener returned a value that is neither a boolean nor absent.
    #[error("listener '{method}' did not return boolean (returned {})", returned.kind())]
    ContractViolation { method: String, returned: Value },
}

impl DispatchError {
    /// Label of the listener that caused the error.
    pub fn method(&self) -> &str {
        match self {
            DispatchError::Listener { method, .. } => method,
            DispatchError::ContractViolation { method, .. } => method,
        }
    }
}

/// Errors returned by navigation operations.
///
/// By the time one of these reaches the caller the transition has already been
/// aborted: focus is restored and the phase overlay discarded.
#[derive(Debug, Error)]
pub enum NavigationError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The field instance belongs to a form that was never opened in this
    /// session, or has been closed.
    #[error("{0} is not open in this session")]
    UnknownForm(FormId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_error_names_method() {
        let err = DispatchError::ContractViolation {
            method: "on_amount".to_string(),
            returned: Value::Int(1),
        };
        assert_eq!(err.method(), "on_amount");
        assert_eq!(
            err.to_string(),
            "listener 'on_amount' did not return boolean (returned int)"
        );

        let err = DispatchError::Listener {
            method: "check".to_string(),
            source: ListenerError::new("boom"),
        };
        assert_eq!(err.to_string(), "listener 'check' failed: boom");
    }

    #[test]
    fn test_listener_error_wraps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        let err = ListenerError::from_error(io);
        assert_eq!(err.message(), "disk");
        assert!(std::error::Error::source(&err).is_some());
    }
}
