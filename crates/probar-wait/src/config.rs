//! Wait defaults and the key/value sources they are read from.
//!
//! Values are resolved once, when a [`SessionRegistry`](crate::SessionRegistry)
//! is built. Environment variables take precedence over a static properties
//! or YAML file; anything missing falls back to the documented defaults.

use crate::result::{ProbarError, ProbarResult};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Fallback overall timeout (10 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Fallback element wait timeout (8 seconds)
pub const DEFAULT_ELEMENT_TIMEOUT_SECS: u64 = 8;

/// Fallback page wait timeout (8 seconds)
pub const DEFAULT_PAGE_TIMEOUT_SECS: u64 = 8;

/// Fallback polling interval (500ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Key for the overall timeout, in seconds
pub const KEY_DEFAULT_TIMEOUT: &str = "default.timeout";
/// Key for the element timeout, in seconds
pub const KEY_ELEMENT_TIMEOUT: &str = "element.timeout";
/// Key for the page timeout, in seconds
pub const KEY_PAGE_TIMEOUT: &str = "page.timeout";
/// Key for the polling interval, in milliseconds
pub const KEY_POLL_INTERVAL: &str = "polling.interval";

/// Default environment variable prefix
pub const DEFAULT_ENV_PREFIX: &str = "PROBAR";

// =============================================================================
// SOURCES
// =============================================================================

/// A flat key/value configuration source
pub trait ConfigSource: fmt::Debug + Send + Sync {
    /// Look up a raw value
    fn get(&self, key: &str) -> Option<String>;
}

/// Environment variables: `element.timeout` becomes `PROBAR_ELEMENT_TIMEOUT`
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
}

impl Default for EnvSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvSource {
    /// Use the default `PROBAR` prefix
    #[must_use]
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Use a custom prefix (empty for none)
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Environment variable name for a key
    #[must_use]
    pub fn var_name(&self, key: &str) -> String {
        let suffix: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        if self.prefix.is_empty() {
            suffix
        } else {
            format!("{}_{}", self.prefix, suffix)
        }
    }
}

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(self.var_name(key)).ok()
    }
}

/// In-memory values, parsed from a Java-style `.properties` file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertiesSource {
    values: HashMap<String, String>,
}

impl PropertiesSource {
    /// Create an empty source
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.values.insert(key.into(), value.into());
        self
    }

    /// Parse `key=value` or `key: value` lines; `#` and `!` start comments
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let values = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
            .filter_map(|line| {
                let split = line.find(['=', ':'])?;
                let key = line[..split].trim();
                let value = line[split + 1..].trim();
                (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
            })
            .collect();
        Self { values }
    }

    /// Load a properties file
    pub fn from_file(path: impl AsRef<Path>) -> ProbarResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let source = Self::parse(&text);
        debug!(path = %path.display(), keys = source.len(), "loaded properties file");
        Ok(source)
    }

    /// Number of keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if there are no keys
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ConfigSource for PropertiesSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Flat YAML mapping of keys to scalar values
#[derive(Debug, Clone, Default)]
pub struct YamlSource {
    inner: PropertiesSource,
}

impl YamlSource {
    /// Parse a YAML document
    pub fn parse(yaml: &str) -> ProbarResult<Self> {
        let mapping: HashMap<String, serde_yaml_ng::Value> = serde_yaml_ng::from_str(yaml)?;
        let mut inner = PropertiesSource::new();
        for (key, value) in mapping {
            let text = match value {
                serde_yaml_ng::Value::String(s) => s,
                serde_yaml_ng::Value::Number(n) => n.to_string(),
                serde_yaml_ng::Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            inner = inner.with(key, text);
        }
        Ok(Self { inner })
    }

    /// Load a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> ProbarResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }
}

impl ConfigSource for YamlSource {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }
}

/// Ordered sources; the first non-blank value wins
#[derive(Debug, Default)]
pub struct LayeredSource {
    layers: Vec<Box<dyn ConfigSource>>,
}

impl LayeredSource {
    /// Create with no layers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a lower-precedence layer
    #[must_use]
    pub fn with_layer(mut self, source: impl ConfigSource + 'static) -> Self {
        self.layers.push(Box::new(source));
        self
    }
}

impl ConfigSource for LayeredSource {
    fn get(&self, key: &str) -> Option<String> {
        self.layers
            .iter()
            .filter_map(|layer| layer.get(key))
            .find(|value| !value.trim().is_empty())
    }
}

// =============================================================================
// WAIT DEFAULTS
// =============================================================================

/// Default timings handed to every wait builder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitDefaults {
    /// Timeout for ad-hoc waits
    pub default_timeout: Duration,
    /// Timeout for element waits
    pub element_timeout: Duration,
    /// Timeout for page waits
    pub page_timeout: Duration,
    /// Interval between condition evaluations
    pub poll_interval: Duration,
}

impl Default for WaitDefaults {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            element_timeout: Duration::from_secs(DEFAULT_ELEMENT_TIMEOUT_SECS),
            page_timeout: Duration::from_secs(DEFAULT_PAGE_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl WaitDefaults {
    /// Create with the documented fallbacks
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve from a source, falling back per key
    pub fn from_source(source: &dyn ConfigSource) -> ProbarResult<Self> {
        let defaults = Self {
            default_timeout: Duration::from_secs(read_u64(
                source,
                KEY_DEFAULT_TIMEOUT,
                DEFAULT_TIMEOUT_SECS,
            )?),
            element_timeout: Duration::from_secs(read_u64(
                source,
                KEY_ELEMENT_TIMEOUT,
                DEFAULT_ELEMENT_TIMEOUT_SECS,
            )?),
            page_timeout: Duration::from_secs(read_u64(
                source,
                KEY_PAGE_TIMEOUT,
                DEFAULT_PAGE_TIMEOUT_SECS,
            )?),
            poll_interval: Duration::from_millis(read_u64(
                source,
                KEY_POLL_INTERVAL,
                DEFAULT_POLL_INTERVAL_MS,
            )?),
        };
        debug!(
            element_timeout_s = defaults.element_timeout.as_secs(),
            page_timeout_s = defaults.page_timeout.as_secs(),
            poll_interval_ms = defaults.poll_interval.as_millis() as u64,
            "resolved wait defaults"
        );
        Ok(defaults)
    }

    /// Resolve from `PROBAR_*` environment variables only
    pub fn from_env() -> ProbarResult<Self> {
        Self::from_source(&EnvSource::new())
    }

    /// Resolve from environment variables layered over a properties file
    pub fn from_env_and_file(path: impl AsRef<Path>) -> ProbarResult<Self> {
        let layered = LayeredSource::new()
            .with_layer(EnvSource::new())
            .with_layer(PropertiesSource::from_file(path)?);
        Self::from_source(&layered)
    }

    /// Override the element timeout
    #[must_use]
    pub const fn with_element_timeout(mut self, timeout: Duration) -> Self {
        self.element_timeout = timeout;
        self
    }

    /// Override the page timeout
    #[must_use]
    pub const fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    /// Override the ad-hoc timeout
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Override the polling interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

fn read_u64(source: &dyn ConfigSource, key: &str, fallback: u64) -> ProbarResult<u64> {
    match source.get(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse::<u64>()
                .map_err(|e| ProbarError::Config {
                    key: key.to_string(),
                    message: format!("'{}' is not a non-negative integer ({e})", raw.trim()),
                })
        }
        _ => Ok(fallback),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use std::io::Write;

    mod properties_tests {
        use super::*;

        #[test]
        fn test_parse_properties() {
            let source = PropertiesSource::parse(
                "# comment\n! also comment\nurl=https://example.com\nelement.timeout = 12\npage.timeout: 20\n\nbad line\n",
            );
            assert_eq!(source.len(), 3);
            assert_eq!(source.get("url").as_deref(), Some("https://example.com"));
            assert_eq!(source.get("element.timeout").as_deref(), Some("12"));
            assert_eq!(source.get("page.timeout").as_deref(), Some("20"));
            assert!(source.get("bad line").is_none());
        }

        #[test]
        fn test_properties_from_file() {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "polling.interval=250").unwrap();
            let source = PropertiesSource::from_file(file.path()).unwrap();
            assert_eq!(source.get(KEY_POLL_INTERVAL).as_deref(), Some("250"));
        }

        #[test]
        fn test_missing_file_is_io_error() {
            let err = PropertiesSource::from_file("/nonexistent/event.properties").unwrap_err();
            assert!(matches!(err, ProbarError::Io(_)));
        }
    }

    mod env_tests {
        use super::*;

        #[test]
        fn test_var_name() {
            assert_eq!(
                EnvSource::new().var_name("element.timeout"),
                "PROBAR_ELEMENT_TIMEOUT"
            );
            assert_eq!(
                EnvSource::with_prefix("").var_name("polling.interval"),
                "POLLING_INTERVAL"
            );
        }

        #[test]
        fn test_env_lookup() {
            let source = EnvSource::with_prefix("PROBAR_WAIT_CONFIG_TEST");
            std::env::set_var("PROBAR_WAIT_CONFIG_TEST_PAGE_TIMEOUT", "42");
            assert_eq!(source.get(KEY_PAGE_TIMEOUT).as_deref(), Some("42"));
            std::env::remove_var("PROBAR_WAIT_CONFIG_TEST_PAGE_TIMEOUT");
            assert!(source.get(KEY_PAGE_TIMEOUT).is_none());
        }
    }

    mod yaml_tests {
        use super::*;

        #[test]
        fn test_parse_yaml() {
            let source = YamlSource::parse(
                "element.timeout: 15\npolling.interval: \"100\"\nheadless: true\nnested: [1, 2]\n",
            )
            .unwrap();
            assert_eq!(source.get(KEY_ELEMENT_TIMEOUT).as_deref(), Some("15"));
            assert_eq!(source.get(KEY_POLL_INTERVAL).as_deref(), Some("100"));
            assert_eq!(source.get("headless").as_deref(), Some("true"));
            assert!(source.get("nested").is_none());
        }

        #[test]
        fn test_invalid_yaml() {
            assert!(matches!(
                YamlSource::parse("- just\n- a list\n"),
                Err(ProbarError::Yaml(_))
            ));
        }
    }

    mod layered_tests {
        use super::*;

        #[test]
        fn test_first_non_blank_wins() {
            let layered = LayeredSource::new()
                .with_layer(PropertiesSource::new().with(KEY_PAGE_TIMEOUT, "  "))
                .with_layer(PropertiesSource::new().with(KEY_PAGE_TIMEOUT, "30"))
                .with_layer(PropertiesSource::new().with(KEY_PAGE_TIMEOUT, "99"));
            assert_eq!(layered.get(KEY_PAGE_TIMEOUT).as_deref(), Some("30"));
            assert!(layered.get("absent").is_none());
        }
    }

    mod defaults_tests {
        use super::*;

        #[test]
        fn test_fallbacks() {
            let defaults = WaitDefaults::from_source(&PropertiesSource::new()).unwrap();
            assert_eq!(defaults, WaitDefaults::default());
            assert_eq!(defaults.element_timeout, Duration::from_secs(8));
            assert_eq!(defaults.page_timeout, Duration::from_secs(8));
            assert_eq!(defaults.default_timeout, Duration::from_secs(10));
            assert_eq!(defaults.poll_interval, Duration::from_millis(500));
        }

        #[test]
        fn test_values_from_source() {
            let source = PropertiesSource::new()
                .with(KEY_ELEMENT_TIMEOUT, "3")
                .with(KEY_PAGE_TIMEOUT, "30")
                .with(KEY_POLL_INTERVAL, "50");
            let defaults = WaitDefaults::from_source(&source).unwrap();
            assert_eq!(defaults.element_timeout, Duration::from_secs(3));
            assert_eq!(defaults.page_timeout, Duration::from_secs(30));
            assert_eq!(defaults.poll_interval, Duration::from_millis(50));
            assert_eq!(defaults.default_timeout, Duration::from_secs(10));
        }

        #[test]
        fn test_unparsable_value() {
            let source = PropertiesSource::new().with(KEY_ELEMENT_TIMEOUT, "soon");
            match WaitDefaults::from_source(&source) {
                Err(ProbarError::Config { key, .. }) => assert_eq!(key, KEY_ELEMENT_TIMEOUT),
                other => panic!("expected Config error, got {other:?}"),
            }
        }

        #[test]
        fn test_env_overrides_file() {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "page.timeout=12\nelement.timeout=4").unwrap();
            let layered = LayeredSource::new()
                .with_layer(PropertiesSource::new().with(KEY_PAGE_TIMEOUT, "60"))
                .with_layer(PropertiesSource::from_file(file.path()).unwrap());
            let defaults = WaitDefaults::from_source(&layered).unwrap();
            assert_eq!(defaults.page_timeout, Duration::from_secs(60));
            assert_eq!(defaults.element_timeout, Duration::from_secs(4));
        }

        #[test]
        fn test_builder_overrides() {
            let defaults = WaitDefaults::new()
                .with_element_timeout(Duration::from_secs(1))
                .with_page_timeout(Duration::from_secs(2))
                .with_default_timeout(Duration::from_secs(3))
                .with_poll_interval(Duration::from_millis(20));
            assert_eq!(defaults.element_timeout, Duration::from_secs(1));
            assert_eq!(defaults.page_timeout, Duration::from_secs(2));
            assert_eq!(defaults.default_timeout, Duration::from_secs(3));
            assert_eq!(defaults.poll_interval, Duration::from_millis(20));
        }
    }
}
