//! Session Registry
//!
//! One [`WaitManager`] per live session, created on first use and dropped
//! when the session is torn down. The registry is an ordinary value: test
//! harnesses own it (usually behind an `Arc`) and pass it to whoever needs it.

use crate::config::WaitDefaults;
use crate::element::ElementWait;
use crate::metrics::{WaitMetrics, DEFAULT_HISTORY_CAPACITY};
use crate::page::PageWait;
use crate::result::{ProbarError, ProbarResult};
use crate::session::{ElementRef, Session, SessionId};
use crate::wait::{Wait, WaitConfig, WaitCore};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

// =============================================================================
// WAIT MANAGER
// =============================================================================

/// Wait builder factory bound to one session and its metrics
#[derive(Debug)]
pub struct WaitManager {
    session: Arc<dyn Session>,
    metrics: Arc<WaitMetrics>,
    defaults: WaitDefaults,
}

impl WaitManager {
    /// Create a manager with fresh metrics
    #[must_use]
    pub fn new(session: Arc<dyn Session>, defaults: WaitDefaults) -> Self {
        Self::with_metrics(session, defaults, Arc::new(WaitMetrics::new()))
    }

    /// Create a manager recording into existing metrics
    #[must_use]
    pub fn with_metrics(
        session: Arc<dyn Session>,
        defaults: WaitDefaults,
        metrics: Arc<WaitMetrics>,
    ) -> Self {
        debug!(session = %session.id(), "wait manager created");
        Self {
            session,
            metrics,
            defaults,
        }
    }

    fn core(&self, timeout: Duration, poll_interval: Duration) -> WaitCore {
        WaitCore::new(
            Arc::clone(&self.session),
            Arc::clone(&self.metrics),
            WaitConfig::new(timeout, poll_interval),
        )
    }

    /// Start an element wait using the element timeout.
    ///
    /// A blank locator is rejected before any session query.
    pub fn wait_for(&self, element: impl Into<ElementRef>) -> ProbarResult<ElementWait> {
        let element = element.into();
        if !element.is_valid() {
            return Err(ProbarError::invalid_argument("element locator cannot be empty"));
        }
        Ok(ElementWait::new(
            self.core(self.defaults.element_timeout, self.defaults.poll_interval),
            element,
        ))
    }

    /// Start a page wait using the page timeout
    #[must_use]
    pub fn wait_for_page(&self) -> PageWait {
        PageWait::new(self.core(self.defaults.page_timeout, self.defaults.poll_interval))
    }

    /// Start a custom-condition wait using the default timeout
    #[must_use]
    pub fn wait(&self) -> Wait {
        Wait::new(self.core(self.defaults.default_timeout, self.defaults.poll_interval))
    }

    /// Start a custom-condition wait with explicit timings
    #[must_use]
    pub fn fluent(&self, timeout: Duration, poll_interval: Duration) -> Wait {
        Wait::new(self.core(timeout, poll_interval))
    }

    /// Metrics for this session
    #[must_use]
    pub fn metrics(&self) -> &Arc<WaitMetrics> {
        &self.metrics
    }

    /// The session being waited on
    #[must_use]
    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    /// Defaults applied to new builders
    #[must_use]
    pub const fn defaults(&self) -> &WaitDefaults {
        &self.defaults
    }

    /// Reset this session's metrics
    pub fn clear_metrics(&self) {
        self.metrics.clear();
    }
}

// =============================================================================
// SESSION REGISTRY
// =============================================================================

/// Concurrent map from session identity to its [`WaitManager`]
#[derive(Debug)]
pub struct SessionRegistry {
    managers: DashMap<SessionId, Arc<WaitManager>>,
    defaults: WaitDefaults,
    history_capacity: usize,
    detailed: bool,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(WaitDefaults::default())
    }
}

impl SessionRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new(defaults: WaitDefaults) -> Self {
        Self {
            managers: DashMap::new(),
            defaults,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            detailed: true,
        }
    }

    /// Set the history settings used for metrics created from now on
    #[must_use]
    pub fn with_metrics_history(mut self, capacity: usize, detailed: bool) -> Self {
        self.history_capacity = capacity;
        self.detailed = detailed;
        self
    }

    /// Defaults every new manager is built with
    #[must_use]
    pub const fn defaults(&self) -> &WaitDefaults {
        &self.defaults
    }

    /// Get the session's manager, creating it on first access.
    ///
    /// Concurrent first callers for one session all receive the same instance.
    pub fn get_or_create(&self, session: &Arc<dyn Session>) -> ProbarResult<Arc<WaitManager>> {
        let id = session.id();
        if id.is_nil() {
            return Err(ProbarError::invalid_argument("session cannot be null"));
        }
        let manager = self
            .managers
            .entry(id)
            .or_insert_with(|| {
                info!(session = %id, "registering wait manager");
                Arc::new(WaitManager::with_metrics(
                    Arc::clone(session),
                    self.defaults,
                    Arc::new(WaitMetrics::with_history(self.history_capacity, self.detailed)),
                ))
            })
            .value()
            .clone();
        Ok(manager)
    }

    /// Look up an existing manager
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<Arc<WaitManager>> {
        self.managers.get(&id).map(|entry| entry.value().clone())
    }

    /// Drop the session's manager; handles already given out keep working
    pub fn remove(&self, id: SessionId) -> Option<Arc<WaitManager>> {
        let removed = self.managers.remove(&id).map(|(_, manager)| manager);
        if removed.is_some() {
            info!(session = %id, "wait manager removed");
        }
        removed
    }

    /// Check whether a session has a manager
    #[must_use]
    pub fn contains(&self, id: SessionId) -> bool {
        self.managers.contains_key(&id)
    }

    /// Number of registered sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.managers.len()
    }

    /// Check whether no sessions are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    /// Registered session ids, sorted
    #[must_use]
    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.managers.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    /// Summary report per registered session, ordered by session id
    #[must_use]
    pub fn summary_reports(&self) -> Vec<(SessionId, String)> {
        self.session_ids()
            .into_iter()
            .filter_map(|id| self.get(id).map(|m| (id, m.metrics().summary_report())))
            .collect()
    }
}
