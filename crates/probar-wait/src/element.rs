//! Element waits.
//!
//! ```ignore
//! manager
//!     .wait_for("button#login")?
//!     .with_timeout_secs(10)
//!     .to_be_clickable()?;
//! ```

use crate::result::{DriverResult, ErrorKind, ProbarResult};
use crate::session::{ElementRef, Session};
use crate::wait::{Probe, WaitBuilder, WaitConfig, WaitCore};

/// Fluent builder for waits on one element
#[derive(Debug, Clone)]
pub struct ElementWait {
    core: WaitCore,
    element: ElementRef,
}

impl ElementWait {
    pub(crate) fn new(core: WaitCore, element: ElementRef) -> Self {
        tracing::debug!(element = %element, "element wait created");
        Self { core, element }
    }

    /// Element this builder waits on
    #[must_use]
    pub fn element(&self) -> &ElementRef {
        &self.element
    }

    fn execute<F>(self, condition: &str, evaluate: F) -> ProbarResult<Self>
    where
        F: FnMut(&dyn Session, &ElementRef) -> DriverResult<bool>,
    {
        let mut evaluate = evaluate;
        let element = &self.element;
        self.core.run(
            &Probe {
                metric: condition,
                subject: condition,
            },
            |session| evaluate(session, element),
            |session| {
                let tag = session
                    .tag_name(element)
                    .unwrap_or_else(|_| "<unavailable>".to_string());
                format!("element: {tag}, locator: {element}")
            },
        )?;
        Ok(self)
    }

    /// Wait until the element is displayed
    pub fn to_be_visible(self) -> ProbarResult<Self> {
        self.execute("element to be visible", |s, el| s.is_displayed(el))
    }

    /// Wait until the element is hidden or gone from the page
    pub fn to_be_invisible(self) -> ProbarResult<Self> {
        self.execute("element to be invisible", |s, el| {
            match s.is_displayed(el) {
                Ok(displayed) => Ok(!displayed),
                Err(err)
                    if err.is(ErrorKind::NoSuchElement)
                        || err.is(ErrorKind::StaleElementReference) =>
                {
                    Ok(true)
                }
                Err(err) => Err(err),
            }
        })
    }

    /// Wait until the element is displayed and enabled
    pub fn to_be_clickable(self) -> ProbarResult<Self> {
        self.execute("element to be clickable", |s, el| {
            Ok(s.is_displayed(el)? && s.is_enabled(el)?)
        })
    }

    /// Wait until the element is selected
    pub fn to_be_selected(self) -> ProbarResult<Self> {
        self.execute("element to be selected", |s, el| s.is_selected(el))
    }

    /// Wait until the element is detached from the page
    pub fn to_be_stale(self) -> ProbarResult<Self> {
        self.execute("element to become stale", |s, el| match s.is_enabled(el) {
            Ok(_) => Ok(false),
            Err(err) if err.is(ErrorKind::StaleElementReference) => Ok(true),
            Err(err) => Err(err),
        })
    }

    /// Wait until the element's text equals `text`
    pub fn to_have_text(self, text: &str) -> ProbarResult<Self> {
        let condition = format!("element to have text '{text}'");
        self.execute(&condition, |s, el| Ok(s.text(el)? == text))
    }

    /// Wait until the element's text contains `partial`
    pub fn to_contain_text(self, partial: &str) -> ProbarResult<Self> {
        let condition = format!("element to contain text '{partial}'");
        self.execute(&condition, |s, el| Ok(s.text(el)?.contains(partial)))
    }

    /// Wait until `attribute` has exactly `value`
    pub fn to_have_attribute(self, attribute: &str, value: &str) -> ProbarResult<Self> {
        let condition = format!("element to have attribute '{attribute}' with value '{value}'");
        self.execute(&condition, |s, el| {
            Ok(s.attribute(el, attribute)?.as_deref() == Some(value))
        })
    }
}

impl WaitBuilder for ElementWait {
    fn config(&self) -> &WaitConfig {
        &self.core.config
    }

    fn config_mut(&mut self) -> &mut WaitConfig {
        &mut self.core.config
    }
}
