//! Session collaborator contract.
//!
//! A [`Session`] is one live connection to a browser or mobile-app automation
//! target. This crate never creates or tears one down; it only asks it
//! synchronous questions while polling a condition.

use crate::result::DriverResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of one automation connection.
///
/// Two sessions with identical observable state are still distinct
/// connections, so identity is a minted UUID rather than anything derived from
/// the session's state. The nil UUID stands for "no session".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Mint a fresh identity
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The null session identity
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Check whether this is the null session
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Get the underlying UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical element handle understood by the session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef {
    locator: String,
}

impl ElementRef {
    /// Create a reference from a locator (CSS selector, accessibility id, ...)
    #[must_use]
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
        }
    }

    /// Get the locator
    #[must_use]
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// A blank locator does not refer to anything
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.locator.trim().is_empty()
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.locator)
    }
}

impl From<&str> for ElementRef {
    fn from(locator: &str) -> Self {
        Self::new(locator)
    }
}

/// Synchronous queries over one automation session.
///
/// Every query either answers, or fails with a [`DriverError`](crate::DriverError)
/// whose kind the wait engine may be told to ignore.
pub trait Session: Send + Sync + fmt::Debug {
    /// Identity used as the registry key
    fn id(&self) -> SessionId;

    /// Current page URL
    fn current_url(&self) -> DriverResult<String>;

    /// Current page title
    fn title(&self) -> DriverResult<String>;

    /// Number of open windows or tabs
    fn window_count(&self) -> DriverResult<usize>;

    /// Whether a JavaScript alert is open
    fn alert_present(&self) -> DriverResult<bool>;

    /// Evaluate a script in the page and return its JSON result
    fn execute_script(&self, script: &str) -> DriverResult<serde_json::Value>;

    /// Whether the element is rendered and visible
    fn is_displayed(&self, element: &ElementRef) -> DriverResult<bool>;

    /// Whether the element accepts input
    fn is_enabled(&self, element: &ElementRef) -> DriverResult<bool>;

    /// Whether a checkbox, radio button or option is selected
    fn is_selected(&self, element: &ElementRef) -> DriverResult<bool>;

    /// Rendered text of the element
    fn text(&self, element: &ElementRef) -> DriverResult<String>;

    /// Attribute value, `None` when the attribute is absent
    fn attribute(&self, element: &ElementRef, name: &str) -> DriverResult<Option<String>>;

    /// Tag name of the element
    fn tag_name(&self, element: &ElementRef) -> DriverResult<String>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    mod session_id_tests {
        use super::*;

        #[test]
        fn test_new_ids_are_distinct() {
            let a = SessionId::new();
            let b = SessionId::new();
            assert_ne!(a, b);
            assert!(!a.is_nil());
        }

        #[test]
        fn test_nil_id() {
            assert!(SessionId::nil().is_nil());
            assert_eq!(SessionId::from(Uuid::nil()), SessionId::nil());
        }

        #[test]
        fn test_display_is_uuid() {
            let id = SessionId::new();
            assert_eq!(id.to_string(), id.as_uuid().to_string());
        }
    }

    mod element_ref_tests {
        use super::*;

        #[test]
        fn test_valid_locator() {
            let el = ElementRef::new("#submit");
            assert!(el.is_valid());
            assert_eq!(el.locator(), "#submit");
            assert_eq!(el.to_string(), "#submit");
        }

        #[test]
        fn test_blank_locator_is_invalid() {
            assert!(!ElementRef::new("").is_valid());
            assert!(!ElementRef::new("   ").is_valid());
        }

        #[test]
        fn test_from_str() {
            let el: ElementRef = "button.primary".into();
            assert_eq!(el, ElementRef::new("button.primary"));
        }
    }
}
