//! Page Waits
//!
//! Waits on whole-page state: document readiness, URL, title, windows and
//! alerts. Metrics for these waits are bucketed under a `page-` prefix so they
//! never collide with element conditions of the same name.

use crate::result::{DriverResult, ProbarError, ProbarResult};
use crate::session::Session;
use crate::wait::{Probe, WaitBuilder, WaitConfig, WaitCore};
use regex::Regex;
use std::fmt;

/// Prefix for page-level metric names
pub const PAGE_METRIC_PREFIX: &str = "page-";

const READY_STATE_SCRIPT: &str = "return document.readyState";
const JQUERY_IDLE_SCRIPT: &str =
    "return typeof jQuery !== 'undefined' ? jQuery.active === 0 : true";
const ANGULAR_IDLE_SCRIPT: &str = "return typeof angular !== 'undefined' ? \
     angular.element(document).injector().get('$http').pendingRequests.length === 0 : true";

// =============================================================================
// URL PATTERN
// =============================================================================

/// URL matcher for navigation waits
#[derive(Debug, Clone)]
pub enum UrlPattern {
    /// Exact URL match
    Exact(String),
    /// Prefix match
    Prefix(String),
    /// Contains substring
    Contains(String),
    /// Regex match (unanchored)
    Regex(Regex),
    /// Glob pattern (e.g., "**/api/users/*")
    Glob(String),
    /// Match any URL
    Any,
}

impl UrlPattern {
    /// Compile a regex pattern
    pub fn regex(pattern: &str) -> ProbarResult<Self> {
        Regex::new(pattern)
            .map(Self::Regex)
            .map_err(|e| ProbarError::invalid_argument(format!("invalid URL pattern '{pattern}': {e}")))
    }

    /// Check if a URL matches this pattern
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Exact(pattern) => url == pattern,
            Self::Prefix(pattern) => url.starts_with(pattern.as_str()),
            Self::Contains(pattern) => url.contains(pattern.as_str()),
            Self::Regex(re) => re.is_match(url),
            Self::Glob(pattern) => Self::glob_matches(pattern, url),
            Self::Any => true,
        }
    }

    /// Glob matching for URLs; `*` spans any run of characters.
    ///
    /// The leading literal anchors at the start and the trailing literal at
    /// the end, so a suffix that also occurs earlier in the URL still matches.
    fn glob_matches(pattern: &str, url: &str) -> bool {
        let parts: Vec<&str> = pattern.split('*').collect();
        let (first, last) = match parts.as_slice() {
            [only] => return *only == url,
            [first, .., last] => (*first, *last),
            [] => return false,
        };
        let Some(rest) = url.strip_prefix(first) else {
            return false;
        };
        let Some(mut middle) = rest.strip_suffix(last) else {
            return false;
        };
        for part in &parts[1..parts.len() - 1] {
            if part.is_empty() {
                continue;
            }
            match middle.find(part) {
                Some(found) => middle = &middle[found + part.len()..],
                None => return false,
            }
        }
        true
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(p) => write!(f, "be '{p}'"),
            Self::Prefix(p) => write!(f, "start with '{p}'"),
            Self::Contains(p) => write!(f, "contain '{p}'"),
            Self::Regex(re) => write!(f, "match pattern '{}'", re.as_str()),
            Self::Glob(p) => write!(f, "match glob '{p}'"),
            Self::Any => write!(f, "be anything"),
        }
    }
}

// =============================================================================
// PAGE WAIT
// =============================================================================

/// Fluent builder for page-level waits
#[derive(Debug, Clone)]
pub struct PageWait {
    core: WaitCore,
}

impl PageWait {
    pub(crate) fn new(core: WaitCore) -> Self {
        tracing::debug!(session = %core.session.id(), "page wait created");
        Self { core }
    }

    fn execute<T, F>(self, condition: &str, evaluate: F) -> ProbarResult<Self>
    where
        T: crate::wait::Satisfies,
        F: FnMut(&dyn Session) -> DriverResult<T>,
    {
        let metric = format!("{PAGE_METRIC_PREFIX}{condition}");
        let subject = format!("page {condition}");
        self.core.run(
            &Probe {
                metric: &metric,
                subject: &subject,
            },
            evaluate,
            page_context,
        )?;
        Ok(self)
    }

    /// Wait for `document.readyState` to be `complete` with no active jQuery requests
    pub fn to_load(self) -> ProbarResult<Self> {
        self.execute("page to load completely", |s| {
            let ready = s.execute_script(READY_STATE_SCRIPT)?;
            let jquery_idle = s.execute_script(JQUERY_IDLE_SCRIPT)?;
            let loaded = ready.as_str() == Some("complete") && jquery_idle.as_bool() == Some(true);
            tracing::trace!(ready_state = %ready, jquery_idle = %jquery_idle, loaded, "page load check");
            Ok(loaded)
        })
    }

    /// Wait for the document, jQuery and Angular to all be idle
    pub fn for_javascript_to_complete(self) -> ProbarResult<Self> {
        self.execute("JavaScript execution to complete", |s| {
            let document = s.execute_script(READY_STATE_SCRIPT)?.as_str() == Some("complete");
            let jquery = s.execute_script(JQUERY_IDLE_SCRIPT)?.as_bool() == Some(true);
            let angular = s.execute_script(ANGULAR_IDLE_SCRIPT)?.as_bool() == Some(true);
            Ok(document && jquery && angular)
        })
    }

    /// Wait for the URL to contain a substring
    pub fn url_to_contain(self, fragment: &str) -> ProbarResult<Self> {
        self.url_to_match_pattern(&UrlPattern::Contains(fragment.to_string()))
    }

    /// Wait for the URL to equal `url`
    pub fn url_to_be(self, url: &str) -> ProbarResult<Self> {
        self.url_to_match_pattern(&UrlPattern::Exact(url.to_string()))
    }

    /// Wait for the URL to match a regular expression.
    ///
    /// An invalid expression fails with `InvalidArgument` before any polling.
    pub fn url_to_match(self, pattern: &str) -> ProbarResult<Self> {
        let pattern = UrlPattern::regex(pattern)?;
        self.url_to_match_pattern(&pattern)
    }

    /// Wait for the URL to satisfy a [`UrlPattern`]
    pub fn url_to_match_pattern(self, pattern: &UrlPattern) -> ProbarResult<Self> {
        let condition = format!("URL to {pattern}");
        self.execute(&condition, |s| Ok(pattern.matches(&s.current_url()?)))
    }

    /// Wait for the title to contain a substring
    pub fn title_to_contain(self, fragment: &str) -> ProbarResult<Self> {
        let condition = format!("page title to contain '{fragment}'");
        self.execute(&condition, |s| Ok(s.title()?.contains(fragment)))
    }

    /// Wait for the title to equal `title`
    pub fn title_to_be(self, title: &str) -> ProbarResult<Self> {
        let condition = format!("page title to be '{title}'");
        self.execute(&condition, |s| Ok(s.title()? == title))
    }

    /// Wait for exactly `count` windows
    pub fn number_of_windows_to_be(self, count: usize) -> ProbarResult<Self> {
        let condition = format!("number of windows to be {count}");
        self.execute(&condition, |s| Ok(s.window_count()? == count))
    }

    /// Wait for one more window than `current`
    pub fn new_window_to_appear(self, current: usize) -> ProbarResult<Self> {
        let expected = current.saturating_add(1);
        self.execute("new window to appear", |s| Ok(s.window_count()? == expected))
    }

    /// Wait for a JavaScript alert
    pub fn alert_to_be_present(self) -> ProbarResult<Self> {
        self.execute("alert to be present", |s| s.alert_present())
    }
}

impl WaitBuilder for PageWait {
    fn config(&self) -> &WaitConfig {
        &self.core.config
    }

    fn config_mut(&mut self) -> &mut WaitConfig {
        &mut self.core.config
    }
}

fn page_context(session: &dyn Session) -> String {
    let url = session
        .current_url()
        .unwrap_or_else(|_| "<unavailable>".to_string());
    let title = session
        .title()
        .unwrap_or_else(|_| "<unavailable>".to_string());
    format!("current URL: {url}, page title: '{title}'")
}
