//! Wait Mechanisms
//!
//! The poll-until-condition loop shared by element, page and ad-hoc waits.
//!
//! A wait evaluates its condition, sleeps for the polling interval, and tries
//! again until the condition is satisfied, the timeout passes, or the
//! condition raises an error the caller did not declare as ignorable. Every
//! outcome, including hard errors, is reported to the session's
//! [`WaitMetrics`] before the call returns.

use crate::metrics::WaitMetrics;
use crate::result::{DriverError, DriverResult, ErrorKind, ProbarError, ProbarResult};
use crate::session::Session;
use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Floor applied to every polling interval so a wait cannot busy-spin the
/// session's command channel
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

// =============================================================================
// WAIT CONFIG
// =============================================================================

/// Settings for one wait invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitConfig {
    /// Give up once this much time has passed
    pub timeout: Duration,
    /// Requested pause between evaluations (clamped at run time)
    pub poll_interval: Duration,
    /// Error kinds treated as "not yet satisfied"
    pub ignored: BTreeSet<ErrorKind>,
    /// Replaces the default timeout message
    pub message: Option<String>,
}

impl WaitConfig {
    /// Create a config with no ignored errors and no custom message
    #[must_use]
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
            ignored: BTreeSet::new(),
            message: None,
        }
    }

    /// Polling interval actually used, never below [`MIN_POLL_INTERVAL`]
    #[must_use]
    pub fn effective_poll_interval(&self) -> Duration {
        self.poll_interval.max(MIN_POLL_INTERVAL)
    }

    /// Whether errors of this kind keep the loop going
    #[must_use]
    pub fn ignores(&self, kind: ErrorKind) -> bool {
        self.ignored.contains(&kind)
    }

    fn custom_message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.trim().is_empty())
    }
}

/// Render a duration the way timeout messages show it
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    if duration.subsec_nanos() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

// =============================================================================
// SATISFACTION
// =============================================================================

/// Whether a condition's answer means "done".
///
/// `false`, `None`, and empty strings or collections mean "keep polling".
pub trait Satisfies {
    /// Check the answer
    fn is_satisfied(&self) -> bool;
}

impl Satisfies for bool {
    fn is_satisfied(&self) -> bool {
        *self
    }
}

impl<T> Satisfies for Option<T> {
    fn is_satisfied(&self) -> bool {
        self.is_some()
    }
}

impl Satisfies for String {
    fn is_satisfied(&self) -> bool {
        !self.is_empty()
    }
}

impl<T> Satisfies for Vec<T> {
    fn is_satisfied(&self) -> bool {
        !self.is_empty()
    }
}

impl Satisfies for serde_json::Value {
    fn is_satisfied(&self) -> bool {
        match self {
            Self::Null | Self::Bool(false) => false,
            Self::String(s) => !s.is_empty(),
            Self::Array(items) => !items.is_empty(),
            _ => true,
        }
    }
}

// =============================================================================
// WAIT CONDITION TRAIT
// =============================================================================

/// A question asked of a session on every poll
pub trait WaitCondition: Send + Sync {
    /// Answer type; see [`Satisfies`]
    type Output: Satisfies;

    /// Evaluate against current session state
    fn evaluate(&self, session: &dyn Session) -> DriverResult<Self::Output>;

    /// Human-readable description, also the metrics bucket name
    fn description(&self) -> String;
}

/// A closure-based wait condition
pub struct FnCondition<F, T> {
    func: F,
    description: String,
    _output: PhantomData<fn() -> T>,
}

impl<F, T> fmt::Debug for FnCondition<F, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCondition")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<F, T> FnCondition<F, T>
where
    F: Fn(&dyn Session) -> DriverResult<T> + Send + Sync,
    T: Satisfies,
{
    /// Create a new function condition
    pub fn new(func: F, description: impl Into<String>) -> Self {
        Self {
            func,
            description: description.into(),
            _output: PhantomData,
        }
    }
}

impl<F, T> WaitCondition for FnCondition<F, T>
where
    F: Fn(&dyn Session) -> DriverResult<T> + Send + Sync,
    T: Satisfies,
{
    type Output = T;

    fn evaluate(&self, session: &dyn Session) -> DriverResult<T> {
        (self.func)(session)
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

// =============================================================================
// WAIT BUILDER TRAIT
// =============================================================================

/// Fluent configuration shared by every wait builder.
///
/// These methods only change the pending [`WaitConfig`]; nothing talks to the
/// session until a condition method runs.
pub trait WaitBuilder: Sized {
    /// Pending configuration
    fn config(&self) -> &WaitConfig;

    /// Pending configuration, mutably
    fn config_mut(&mut self) -> &mut WaitConfig;

    /// Set the timeout
    #[must_use]
    fn with_timeout(mut self, timeout: Duration) -> Self {
        debug!(timeout_ms = timeout.as_millis() as u64, "wait timeout configured");
        self.config_mut().timeout = timeout;
        self
    }

    /// Set the timeout in whole seconds
    #[must_use]
    fn with_timeout_secs(self, seconds: u64) -> Self {
        self.with_timeout(Duration::from_secs(seconds))
    }

    /// Set the polling interval (clamped to [`MIN_POLL_INTERVAL`] when run)
    #[must_use]
    fn with_poll_interval(mut self, interval: Duration) -> Self {
        debug!(
            poll_interval_ms = interval.as_millis() as u64,
            "wait polling interval configured"
        );
        self.config_mut().poll_interval = interval;
        self
    }

    /// Replace the default timeout message
    #[must_use]
    fn with_message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        debug!(message = %message, "custom wait message configured");
        self.config_mut().message = Some(message);
        self
    }

    /// Treat these error kinds as "not yet satisfied"
    #[must_use]
    fn ignoring(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        let config = self.config_mut();
        config.ignored.extend(kinds);
        debug!(ignored = ?config.ignored, "wait configured to ignore errors");
        self
    }
}

// =============================================================================
// POLL LOOP
// =============================================================================

/// How the loop ended, before metrics and error mapping
enum Outcome<T> {
    Satisfied(T),
    TimedOut {
        attempts: u32,
        last_ignored: Option<DriverError>,
    },
    Failed(DriverError),
}

/// Session, metrics and configuration bound together for one builder
#[derive(Debug, Clone)]
pub(crate) struct WaitCore {
    pub(crate) session: Arc<dyn Session>,
    pub(crate) metrics: Arc<WaitMetrics>,
    pub(crate) config: WaitConfig,
}

/// Labels for one condition execution
pub(crate) struct Probe<'a> {
    /// Metrics bucket name
    pub(crate) metric: &'a str,
    /// Subject used in the default timeout message
    pub(crate) subject: &'a str,
}

impl WaitCore {
    pub(crate) fn new(
        session: Arc<dyn Session>,
        metrics: Arc<WaitMetrics>,
        config: WaitConfig,
    ) -> Self {
        Self {
            session,
            metrics,
            config,
        }
    }

    /// Run the loop, report the outcome, and map it to the caller's result.
    ///
    /// `context` is only invoked on timeout, to snapshot session state for the
    /// error message.
    pub(crate) fn run<T, F, C>(&self, probe: &Probe<'_>, evaluate: F, context: C) -> ProbarResult<T>
    where
        T: Satisfies,
        F: FnMut(&dyn Session) -> DriverResult<T>,
        C: FnOnce(&dyn Session) -> String,
    {
        let config = &self.config;
        let poll_interval = config.effective_poll_interval();
        debug!(
            condition = probe.metric,
            timeout_ms = config.timeout.as_millis() as u64,
            poll_interval_ms = poll_interval.as_millis() as u64,
            "starting wait"
        );

        let start = Instant::now();
        let outcome = poll(self.session.as_ref(), config, poll_interval, start, evaluate);
        let elapsed = start.elapsed();

        match outcome {
            Outcome::Satisfied(value) => {
                debug!(
                    condition = probe.metric,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "wait completed"
                );
                self.metrics.record_success(probe.metric, elapsed);
                Ok(value)
            }
            Outcome::TimedOut {
                attempts,
                last_ignored,
            } => {
                let context = context(self.session.as_ref());
                let mut message = match config.custom_message() {
                    Some(custom) => custom.to_string(),
                    None => format!("Timed out waiting for {}", probe.subject),
                };
                message.push_str(&format!(
                    " ({}, timeout: {}, polling: {}ms, elapsed: {}ms, attempts: {})",
                    context,
                    format_duration(config.timeout),
                    poll_interval.as_millis(),
                    elapsed.as_millis(),
                    attempts
                ));
                if let Some(err) = &last_ignored {
                    message.push_str(&format!("; last ignored error: {err}"));
                }

                warn!(
                    condition = probe.metric,
                    elapsed_ms = elapsed.as_millis() as u64,
                    message = %message,
                    "wait timed out"
                );
                self.metrics.record_failure(probe.metric, elapsed, &message);

                Err(ProbarError::WaitTimeout {
                    condition: probe.metric.to_string(),
                    message,
                    elapsed,
                    timeout: config.timeout,
                    poll_interval,
                    context,
                    attempts,
                })
            }
            Outcome::Failed(err) => {
                error!(
                    condition = probe.metric,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %err,
                    "unexpected error during wait"
                );
                self.metrics
                    .record_failure(probe.metric, elapsed, &err.to_string());
                Err(ProbarError::Driver(err))
            }
        }
    }
}

fn poll<T, F>(
    session: &dyn Session,
    config: &WaitConfig,
    poll_interval: Duration,
    start: Instant,
    mut evaluate: F,
) -> Outcome<T>
where
    T: Satisfies,
    F: FnMut(&dyn Session) -> DriverResult<T>,
{
    let mut attempts = 0u32;
    let mut last_ignored = None;

    loop {
        attempts = attempts.saturating_add(1);
        match evaluate(session) {
            Ok(value) if value.is_satisfied() => return Outcome::Satisfied(value),
            Ok(_) => {}
            Err(err) if config.ignores(err.kind) => {
                trace!(attempt = attempts, error = %err, "ignoring error while polling");
                last_ignored = Some(err);
            }
            Err(err) => return Outcome::Failed(err),
        }

        // Checked after evaluating, so a zero timeout still gets one attempt.
        let elapsed = start.elapsed();
        if elapsed >= config.timeout {
            return Outcome::TimedOut {
                attempts,
                last_ignored,
            };
        }
        std::thread::sleep(poll_interval.min(config.timeout - elapsed));
    }
}

// =============================================================================
// AD-HOC WAIT
// =============================================================================

/// Wait builder for caller-supplied conditions
#[derive(Debug, Clone)]
pub struct Wait {
    core: WaitCore,
}

impl Wait {
    pub(crate) fn new(core: WaitCore) -> Self {
        Self { core }
    }

    /// Poll a condition and return its first satisfying answer
    pub fn until<C: WaitCondition>(&self, condition: &C) -> ProbarResult<C::Output> {
        let description = condition.description();
        self.core.run(
            &Probe {
                metric: &description,
                subject: &description,
            },
            |session| condition.evaluate(session),
            session_context,
        )
    }

    /// Poll a closure and return its first satisfying answer
    pub fn until_fn<T, F>(&self, description: &str, func: F) -> ProbarResult<T>
    where
        T: Satisfies,
        F: FnMut(&dyn Session) -> DriverResult<T>,
    {
        self.core.run(
            &Probe {
                metric: description,
                subject: description,
            },
            func,
            session_context,
        )
    }
}

impl WaitBuilder for Wait {
    fn config(&self) -> &WaitConfig {
        &self.core.config
    }

    fn config_mut(&mut self) -> &mut WaitConfig {
        &mut self.core.config
    }
}

fn session_context(session: &dyn Session) -> String {
    let url = session
        .current_url()
        .unwrap_or_else(|_| "<unavailable>".to_string());
    format!("session: {}, current URL: {}", session.id(), url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::mock::MockSession;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn wait_with(timeout_ms: u64, poll_ms: u64) -> (Wait, Arc<WaitMetrics>) {
        let session: Arc<dyn Session> = Arc::new(MockSession::new());
        let metrics = Arc::new(WaitMetrics::new());
        let config = WaitConfig::new(
            Duration::from_millis(timeout_ms),
            Duration::from_millis(poll_ms),
        );
        (
            Wait::new(WaitCore::new(session, Arc::clone(&metrics), config)),
            metrics,
        )
    }

    mod config_tests {
        use super::*;

        #[test]
        fn test_poll_interval_is_clamped() {
            let config = WaitConfig::new(Duration::from_secs(1), Duration::ZERO);
            assert_eq!(config.effective_poll_interval(), MIN_POLL_INTERVAL);
            let config = WaitConfig::new(Duration::from_secs(1), Duration::from_millis(250));
            assert_eq!(config.effective_poll_interval(), Duration::from_millis(250));
        }

        #[test]
        fn test_blank_custom_message_is_ignored() {
            let mut config = WaitConfig::new(Duration::ZERO, Duration::ZERO);
            config.message = Some("   ".into());
            assert!(config.custom_message().is_none());
        }

        #[test]
        fn test_format_duration() {
            assert_eq!(format_duration(Duration::from_secs(8)), "8s");
            assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
            assert_eq!(format_duration(Duration::ZERO), "0s");
        }

        #[test]
        fn test_builder_methods() {
            let (wait, _) = wait_with(100, 10);
            let wait = wait
                .with_timeout_secs(3)
                .with_poll_interval(Duration::from_millis(40))
                .with_message("custom")
                .ignoring([ErrorKind::NoSuchElement])
                .ignoring(vec![ErrorKind::StaleElementReference, ErrorKind::NoSuchElement]);
            let config = wait.config();
            assert_eq!(config.timeout, Duration::from_secs(3));
            assert_eq!(config.poll_interval, Duration::from_millis(40));
            assert_eq!(config.message.as_deref(), Some("custom"));
            assert_eq!(config.ignored.len(), 2);
            assert!(config.ignores(ErrorKind::StaleElementReference));
        }
    }

    mod satisfies_tests {
        use super::*;

        #[test]
        fn test_satisfaction_rules() {
            assert!(true.is_satisfied());
            assert!(!false.is_satisfied());
            assert!(Some(0).is_satisfied());
            assert!(!None::<u8>.is_satisfied());
            assert!(!String::new().is_satisfied());
            assert!("x".to_string().is_satisfied());
            assert!(!Vec::<u8>::new().is_satisfied());
            assert!(!serde_json::Value::Null.is_satisfied());
            assert!(!serde_json::json!(false).is_satisfied());
            assert!(serde_json::json!(0).is_satisfied());
            assert!(serde_json::json!("complete").is_satisfied());
        }
    }

    mod loop_tests {
        use super::*;

        #[test]
        fn test_immediate_success_records_metric() {
            let (wait, metrics) = wait_with(100, 10);
            let value = wait.until_fn("always", |_| Ok(Some(7))).unwrap();
            assert_eq!(value, Some(7));
            assert_eq!(metrics.stats_for("always").successes, 1);
        }

        #[test]
        fn test_timeout_records_failure() {
            let (wait, metrics) = wait_with(100, 10);
            let start = Instant::now();
            let err = wait.until_fn("never", |_| Ok(false)).unwrap_err();
            let elapsed = start.elapsed();
            assert!(elapsed >= Duration::from_millis(100));
            assert!(elapsed < Duration::from_millis(100 + 10 + 200));
            match err {
                ProbarError::WaitTimeout {
                    condition,
                    message,
                    timeout,
                    attempts,
                    ..
                } => {
                    assert_eq!(condition, "never");
                    assert!(message.starts_with("Timed out waiting for never ("));
                    assert!(message.contains("polling: 10ms"));
                    assert_eq!(timeout, Duration::from_millis(100));
                    assert!(attempts >= 2);
                }
                other => panic!("expected WaitTimeout, got {other:?}"),
            }
            assert_eq!(metrics.stats_for("never").failures, 1);
        }

        #[test]
        fn test_zero_timeout_evaluates_exactly_once() {
            let (wait, metrics) = wait_with(0, 10);
            let calls = AtomicU32::new(0);
            let err = wait
                .until_fn("once", |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(false)
                })
                .unwrap_err();
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert!(err.is_timeout());
            assert_eq!(metrics.total_failed(), 1);
        }

        #[test]
        fn test_zero_timeout_success_on_first_attempt() {
            let (wait, _) = wait_with(0, 10);
            assert!(wait.until_fn("ready", |_| Ok(true)).unwrap());
        }

        #[test]
        fn test_ignored_errors_keep_polling() {
            let (wait, metrics) = wait_with(1_000, 20);
            let wait = wait.ignoring([ErrorKind::NoSuchElement]);
            let calls = AtomicU32::new(0);
            let start = Instant::now();
            let result = wait.until_fn("appears", |_| {
                if calls.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err(DriverError::no_such_element("#late"))
                } else {
                    Ok(true)
                }
            });
            assert!(result.unwrap());
            assert_eq!(calls.load(Ordering::SeqCst), 4);
            assert!(start.elapsed() >= Duration::from_millis(60));
            assert_eq!(metrics.success_rate_for("appears"), 100.0);
        }

        #[test]
        fn test_unlisted_error_fails_immediately() {
            let (wait, metrics) = wait_with(5_000, 10);
            let wait = wait.ignoring([ErrorKind::NoSuchElement]);
            let start = Instant::now();
            let err = wait
                .until_fn("broken", |_| -> DriverResult<bool> {
                    Err(DriverError::new(ErrorKind::JavaScript, "boom"))
                })
                .unwrap_err();
            assert!(start.elapsed() < Duration::from_secs(1));
            match err {
                ProbarError::Driver(inner) => {
                    assert_eq!(inner, DriverError::new(ErrorKind::JavaScript, "boom"));
                }
                other => panic!("expected Driver error, got {other:?}"),
            }
            let failures = metrics.recent_failures(1);
            assert_eq!(failures[0].condition, "broken");
            assert_eq!(
                failures[0].error_message.as_deref(),
                Some("javascript error: boom")
            );
        }

        #[test]
        fn test_timeout_mentions_last_ignored_error() {
            let (wait, _) = wait_with(50, 10);
            let err = wait
                .ignoring([ErrorKind::StaleElementReference])
                .with_message("row never settled")
                .until_fn("settled", |_| -> DriverResult<bool> {
                    Err(DriverError::stale("tr.row"))
                })
                .unwrap_err();
            let text = err.to_string();
            assert!(text.starts_with("row never settled ("));
            assert!(text.contains("last ignored error: stale element reference"));
        }

        #[test]
        fn test_until_with_condition_trait() {
            let (wait, metrics) = wait_with(100, 10);
            let condition = FnCondition::new(|s: &dyn Session| s.title(), "title to be non-empty");
            let title = wait.until(&condition).unwrap();
            assert_eq!(title, "Mock Page");
            assert_eq!(condition.description(), "title to be non-empty");
            assert_eq!(metrics.stats_for("title to be non-empty").successes, 1);
        }

        #[test]
        fn test_timeout_context_names_session() {
            let (wait, _) = wait_with(0, 10);
            let err = wait.until_fn("never", |_| Ok(false)).unwrap_err();
            match err {
                ProbarError::WaitTimeout { context, .. } => {
                    assert!(context.starts_with("session: "));
                    assert!(context.contains("current URL: about:blank"));
                }
                other => panic!("expected WaitTimeout, got {other:?}"),
            }
        }
    }
}
