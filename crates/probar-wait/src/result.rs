//! Result and error types for Probar waits.
//!
//! Two layers live here. [`DriverError`] is what a session query raises while a
//! condition is being evaluated; its [`ErrorKind`] is the tag a wait can choose
//! to ignore. [`ProbarError`] is what a wait call hands back to its caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for Probar operations
pub type ProbarResult<T> = Result<T, ProbarError>;

/// Result type for session queries
pub type DriverResult<T> = Result<T, DriverError>;

/// Closed set of failure categories a session query can raise.
///
/// Whether a kind is transient is decided per wait through
/// [`WaitBuilder::ignoring`](crate::WaitBuilder::ignoring), never here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Element could not be located
    NoSuchElement,
    /// Element reference is no longer attached to the DOM
    StaleElementReference,
    /// Element exists but cannot be interacted with
    ElementNotInteractable,
    /// Another element would receive the click
    ElementClickIntercepted,
    /// Frame could not be located
    NoSuchFrame,
    /// Window could not be located
    NoSuchWindow,
    /// No alert is open
    NoAlertPresent,
    /// Script evaluation failed
    JavaScript,
    /// Locator could not be parsed
    InvalidSelector,
    /// The session is gone
    SessionClosed,
    /// Anything the driver could not classify
    Unknown,
}

impl ErrorKind {
    /// All kinds, in declaration order
    pub const ALL: [Self; 11] = [
        Self::NoSuchElement,
        Self::StaleElementReference,
        Self::ElementNotInteractable,
        Self::ElementClickIntercepted,
        Self::NoSuchFrame,
        Self::NoSuchWindow,
        Self::NoAlertPresent,
        Self::JavaScript,
        Self::InvalidSelector,
        Self::SessionClosed,
        Self::Unknown,
    ];

    /// Get the wire-style name of this kind
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoSuchElement => "no such element",
            Self::StaleElementReference => "stale element reference",
            Self::ElementNotInteractable => "element not interactable",
            Self::ElementClickIntercepted => "element click intercepted",
            Self::NoSuchFrame => "no such frame",
            Self::NoSuchWindow => "no such window",
            Self::NoAlertPresent => "no such alert",
            Self::JavaScript => "javascript error",
            Self::InvalidSelector => "invalid selector",
            Self::SessionClosed => "invalid session id",
            Self::Unknown => "unknown error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised by a session query during condition evaluation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct DriverError {
    /// Failure category
    pub kind: ErrorKind,
    /// Driver-supplied detail
    pub message: String,
}

impl DriverError {
    /// Create a new driver error
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for [`ErrorKind::NoSuchElement`]
    #[must_use]
    pub fn no_such_element(locator: &str) -> Self {
        Self::new(
            ErrorKind::NoSuchElement,
            format!("unable to locate element: {locator}"),
        )
    }

    /// Shorthand for [`ErrorKind::StaleElementReference`]
    #[must_use]
    pub fn stale(locator: &str) -> Self {
        Self::new(
            ErrorKind::StaleElementReference,
            format!("element is not attached to the page document: {locator}"),
        )
    }

    /// Check the failure category
    #[must_use]
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

/// Errors that can occur in Probar waits
#[derive(Debug, Error)]
pub enum ProbarError {
    /// Null or malformed session, element or argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// Condition never became satisfied before the deadline
    #[error("{message}")]
    WaitTimeout {
        /// Human-readable condition description
        condition: String,
        /// Folded diagnostic message
        message: String,
        /// Time actually spent waiting
        elapsed: Duration,
        /// Configured timeout
        timeout: Duration,
        /// Configured polling interval
        poll_interval: Duration,
        /// Session-observable snapshot taken at timeout
        context: String,
        /// Number of evaluations performed
        attempts: u32,
    },

    /// Unexpected error raised while evaluating a condition
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Configuration value could not be interpreted
    #[error("Invalid configuration value for '{key}': {message}")]
    Config {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProbarError {
    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Check if this is a wait timeout
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::WaitTimeout { .. })
    }

    /// Get the driver error kind, if this error came from condition evaluation
    #[must_use]
    pub const fn driver_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Driver(err) => Some(err.kind),
            _ => None,
        }
    }
}
