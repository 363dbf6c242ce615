//! Probar Wait: Per-Session Polling Waits with Outcome Metrics
//!
//! Browser and mobile-app tests constantly wait for something: an element to
//! appear, a page to finish loading, a URL to change. This crate runs those
//! waits as a bounded poll loop against a [`Session`], and records every
//! outcome in a per-session [`WaitMetrics`] store for suite-level reporting.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   get_or_create   ┌──────────────┐
//! │ SessionRegistry  │──────────────────►│ WaitManager  │
//! └──────────────────┘                   └──────┬───────┘
//!                                               │ wait_for / wait_for_page / wait
//!                                               ▼
//!        ┌──────────────┐  poll   ┌─────────────────────────┐  record  ┌─────────────┐
//!        │   Session    │◄────────│ ElementWait / PageWait  │─────────►│ WaitMetrics │
//!        └──────────────┘         └─────────────────────────┘          └─────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use probar_wait::prelude::*;
//! use std::sync::Arc;
//!
//! let session = Arc::new(MockSession::new());
//! session.set_element("#login", MockElement::new("button"));
//! let session: Arc<dyn Session> = session;
//!
//! let registry = SessionRegistry::new(WaitDefaults::default());
//! let manager = registry.get_or_create(&session)?;
//! manager.wait_for("#login")?.with_timeout_secs(2).to_be_clickable()?;
//! manager.wait_for_page().to_load()?;
//!
//! assert_eq!(manager.metrics().total_successful(), 2);
//! # Ok::<(), ProbarError>(())
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod config;
mod element;
mod logging;
mod metrics;
mod page;
mod registry;
mod result;
mod session;
mod wait;

/// In-memory session double for tests
pub mod mock;

pub use config::{
    ConfigSource, EnvSource, LayeredSource, PropertiesSource, WaitDefaults, YamlSource,
    DEFAULT_ELEMENT_TIMEOUT_SECS, DEFAULT_ENV_PREFIX, DEFAULT_PAGE_TIMEOUT_SECS,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_TIMEOUT_SECS, KEY_DEFAULT_TIMEOUT, KEY_ELEMENT_TIMEOUT,
    KEY_PAGE_TIMEOUT, KEY_POLL_INTERVAL,
};
pub use element::ElementWait;
pub use logging::{init_json_logging, init_logging};
pub use metrics::{
    ConditionStats, MetricsSnapshot, WaitMetrics, WaitRecord, DEFAULT_HISTORY_CAPACITY,
};
pub use page::{PageWait, UrlPattern, PAGE_METRIC_PREFIX};
pub use registry::{SessionRegistry, WaitManager};
pub use result::{DriverError, DriverResult, ErrorKind, ProbarError, ProbarResult};
pub use session::{ElementRef, Session, SessionId};
pub use wait::{
    format_duration, FnCondition, Satisfies, Wait, WaitBuilder, WaitCondition, WaitConfig,
    MIN_POLL_INTERVAL,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::mock::{MockElement, MockSession};
    pub use super::{
        DriverError, DriverResult, ElementRef, ElementWait, ErrorKind, FnCondition, PageWait,
        ProbarError, ProbarResult, Satisfies, Session, SessionId, SessionRegistry, UrlPattern,
        Wait, WaitBuilder, WaitCondition, WaitConfig, WaitDefaults, WaitManager, WaitMetrics,
    };
}
