//! Mock session for unit testing.
//!
//! [`MockSession`] answers every [`Session`] query from in-memory state that a
//! test can change from another thread while a wait is polling.

use crate::result::{DriverError, DriverResult};
use crate::session::{ElementRef, Session, SessionId};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Scripted element state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    /// Tag name
    pub tag: String,
    /// Rendered and visible
    pub displayed: bool,
    /// Accepts input
    pub enabled: bool,
    /// Checked or selected
    pub selected: bool,
    /// Rendered text
    pub text: String,
    /// Attribute values
    pub attributes: HashMap<String, String>,
}

impl MockElement {
    /// Create a visible, enabled, empty element
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            displayed: true,
            enabled: true,
            selected: false,
            text: String::new(),
            attributes: HashMap::new(),
        }
    }

    /// Mark as not displayed
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    /// Mark as disabled
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Mark as selected
    #[must_use]
    pub fn selected(mut self) -> Self {
        self.selected = true;
        self
    }

    /// Set rendered text
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug)]
struct MockState {
    url: String,
    title: String,
    window_count: usize,
    alert_present: bool,
    ready_state: String,
    scripts: HashMap<String, serde_json::Value>,
    elements: HashMap<String, MockElement>,
    detached: HashMap<String, MockElement>,
    pending_error: Option<DriverError>,
    call_history: Vec<String>,
}

/// In-memory [`Session`] double
#[derive(Debug)]
pub struct MockSession {
    id: SessionId,
    state: Mutex<MockState>,
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSession {
    /// Create a session on `about:blank` with one window and a loaded document
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(SessionId::new())
    }

    /// Create a session with a fixed identity
    #[must_use]
    pub fn with_id(id: SessionId) -> Self {
        Self {
            id,
            state: Mutex::new(MockState {
                url: "about:blank".to_string(),
                title: "Mock Page".to_string(),
                window_count: 1,
                alert_present: false,
                ready_state: "complete".to_string(),
                scripts: HashMap::new(),
                elements: HashMap::new(),
                detached: HashMap::new(),
                pending_error: None,
                call_history: Vec::new(),
            }),
        }
    }

    /// Set the current URL
    pub fn set_url(&self, url: impl Into<String>) {
        self.state.lock().url = url.into();
    }

    /// Set the page title
    pub fn set_title(&self, title: impl Into<String>) {
        self.state.lock().title = title.into();
    }

    /// Set the number of open windows
    pub fn set_window_count(&self, count: usize) {
        self.state.lock().window_count = count;
    }

    /// Open or dismiss the alert
    pub fn set_alert_present(&self, present: bool) {
        self.state.lock().alert_present = present;
    }

    /// Set `document.readyState`
    pub fn set_ready_state(&self, state: impl Into<String>) {
        self.state.lock().ready_state = state.into();
    }

    /// Answer `script` with `result` instead of the built-in behavior
    pub fn set_script_result(&self, script: impl Into<String>, result: serde_json::Value) {
        self.state.lock().scripts.insert(script.into(), result);
    }

    /// Attach or replace an element
    pub fn set_element(&self, locator: impl Into<String>, element: MockElement) {
        let locator = locator.into();
        let mut state = self.state.lock();
        state.detached.remove(&locator);
        state.elements.insert(locator, element);
    }

    /// Remove an element; later queries see `NoSuchElement`
    pub fn remove_element(&self, locator: &str) {
        let mut state = self.state.lock();
        state.elements.remove(locator);
        state.detached.remove(locator);
    }

    /// Detach an element from the page; later queries see `StaleElementReference`
    pub fn detach_element(&self, locator: &str) {
        let mut state = self.state.lock();
        if let Some(element) = state.elements.remove(locator) {
            state.detached.insert(locator.to_string(), element);
        }
    }

    /// Fail the next query of any kind with `error`
    pub fn fail_next(&self, error: DriverError) {
        self.state.lock().pending_error = Some(error);
    }

    /// Queries made so far, as `method` or `method:argument`
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.state.lock().call_history.clone()
    }

    /// Check if a query method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.state
            .lock()
            .call_history
            .iter()
            .any(|c| c.starts_with(method))
    }

    /// Number of recorded queries
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state.lock().call_history.len()
    }

    fn query<T>(
        &self,
        call: String,
        answer: impl FnOnce(&MockState) -> DriverResult<T>,
    ) -> DriverResult<T> {
        let mut state = self.state.lock();
        state.call_history.push(call);
        if let Some(err) = state.pending_error.take() {
            return Err(err);
        }
        answer(&*state)
    }

    fn element_query<T>(
        &self,
        method: &str,
        element: &ElementRef,
        answer: impl FnOnce(&MockElement) -> T,
    ) -> DriverResult<T> {
        self.query(format!("{method}:{element}"), |state| {
            let locator = element.locator();
            match state.elements.get(locator) {
                Some(found) => Ok(answer(found)),
                None if state.detached.contains_key(locator) => Err(DriverError::stale(locator)),
                None => Err(DriverError::no_such_element(locator)),
            }
        })
    }
}

impl Session for MockSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn current_url(&self) -> DriverResult<String> {
        self.query("current_url".into(), |s| Ok(s.url.clone()))
    }

    fn title(&self) -> DriverResult<String> {
        self.query("title".into(), |s| Ok(s.title.clone()))
    }

    fn window_count(&self) -> DriverResult<usize> {
        self.query("window_count".into(), |s| Ok(s.window_count))
    }

    fn alert_present(&self) -> DriverResult<bool> {
        self.query("alert_present".into(), |s| Ok(s.alert_present))
    }

    fn execute_script(&self, script: &str) -> DriverResult<serde_json::Value> {
        self.query(format!("execute_script:{script}"), |s| {
            if let Some(result) = s.scripts.get(script) {
                return Ok(result.clone());
            }
            // Behaves like a page without jQuery or Angular loaded.
            if script.contains("document.readyState") {
                Ok(serde_json::Value::String(s.ready_state.clone()))
            } else if script.contains("typeof jQuery") || script.contains("typeof angular") {
                Ok(serde_json::Value::Bool(true))
            } else {
                Ok(serde_json::Value::Null)
            }
        })
    }

    fn is_displayed(&self, element: &ElementRef) -> DriverResult<bool> {
        self.element_query("is_displayed", element, |e| e.displayed)
    }

    fn is_enabled(&self, element: &ElementRef) -> DriverResult<bool> {
        self.element_query("is_enabled", element, |e| e.enabled)
    }

    fn is_selected(&self, element: &ElementRef) -> DriverResult<bool> {
        self.element_query("is_selected", element, |e| e.selected)
    }

    fn text(&self, element: &ElementRef) -> DriverResult<String> {
        self.element_query("text", element, |e| e.text.clone())
    }

    fn attribute(&self, element: &ElementRef, name: &str) -> DriverResult<Option<String>> {
        self.element_query("attribute", element, |e| e.attributes.get(name).cloned())
    }

    fn tag_name(&self, element: &ElementRef) -> DriverResult<String> {
        self.element_query("tag_name", element, |e| e.tag.clone())
    }
}
