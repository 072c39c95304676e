//! # Supervision tree configuration.
//!
//! Provides [`Config`], the settings a [`Root`](crate::Root) shares with every scope below it.
//!
//! Config is used in two ways:
//! 1. **Root creation**: `Root::builder(config)`
//! 2. **Runtime updates**: `Root::update_config(key, value)` with a typed [`ConfigValue`]
//!
//! ## Recognized keys
//! | key                | value kind                 |
//! |--------------------|----------------------------|
//! | `shutdown_timeout` | [`ConfigValue::Duration`]  |
//! | `max_tasks`        | [`ConfigValue::Int`] (`0` clears the limit) |
//! | `metrics`          | [`ConfigValue::Metrics`]   |
//! | `metrics.enabled`  | [`ConfigValue::Bool`]      |
//! | `metrics.sink_url` | [`ConfigValue::Str`]       |
//! | `metrics.interval` | [`ConfigValue::Duration`]  |
//!
//! ## Sentinel values
//! - `max_tasks = None` → no declared limit.
//! - `shutdown_timeout = 0s` → graceful phases time out immediately and escalate to forced cancel.

use std::time::Duration;

use crate::error::RuntimeError;

/// Settings for an optional metrics exporter subscriber.
///
/// The runtime only carries these values; exporting is the job of a
/// [`Subscribe`](crate::Subscribe) implementation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Whether metrics export is enabled.
    pub enabled: bool,
    /// Where the exporter should push/serve metrics.
    pub sink_url: String,
    /// How often the exporter should flush.
    pub interval: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sink_url: String::new(),
            interval: Duration::from_secs(15),
        }
    }
}

/// Global configuration for a supervision tree.
///
/// ## Field semantics
/// - `shutdown_timeout`: bound for each graceful wait (per label drain, per scope drain,
///   per cascade level) before escalating to forced cancellation
/// - `max_tasks`: declared task limit, **advisory only**: spawn never consults it
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `metrics`: exporter settings for subscribers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Maximum time a graceful wait may take before forcing cancellation.
    pub shutdown_timeout: Duration,

    /// Declared maximum number of tasks.
    ///
    /// Not enforced: it is unresolved whether a limit should reject, block or warn, so
    /// spawning ignores it.
    pub max_tasks: Option<usize>,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Metrics exporter settings.
    pub metrics: MetricsConfig,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Applies one key-based update.
    ///
    /// Returns [`RuntimeError::Configuration`] when the key is unknown or the value has the
    /// wrong kind; the config is left untouched in that case.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use scopevisor::{Config, ConfigValue};
    ///
    /// let mut cfg = Config::default();
    /// cfg.update("shutdown_timeout", ConfigValue::Duration(Duration::from_secs(3))).unwrap();
    /// assert_eq!(cfg.shutdown_timeout, Duration::from_secs(3));
    ///
    /// assert!(cfg.update("max_tasks", ConfigValue::Bool(true)).is_err());
    /// ```
    pub fn update(&mut self, key: &str, value: ConfigValue) -> Result<(), RuntimeError> {
        match (key, value) {
            ("shutdown_timeout", ConfigValue::Duration(d)) => self.shutdown_timeout = d,
            ("max_tasks", ConfigValue::Int(n)) => {
                if n < 0 {
                    return Err(RuntimeError::config(key, "expected a non-negative int"));
                }
                let n = usize::try_from(n)
                    .map_err(|_| RuntimeError::config(key, format!("{n} does not fit in usize")))?;
                self.max_tasks = (n > 0).then_some(n);
            }
            ("metrics", ConfigValue::Metrics(m)) => self.metrics = m,
            ("metrics.enabled", ConfigValue::Bool(b)) => self.metrics.enabled = b,
            ("metrics.sink_url", ConfigValue::Str(url)) => self.metrics.sink_url = url,
            ("metrics.interval", ConfigValue::Duration(d)) => self.metrics.interval = d,
            (
                "shutdown_timeout" | "max_tasks" | "metrics" | "metrics.enabled"
                | "metrics.sink_url" | "metrics.interval",
                other,
            ) => {
                return Err(RuntimeError::config(
                    key,
                    format!("expected {}, got {}", expected_kind(key), other.kind()),
                ));
            }
            (_, _) => return Err(RuntimeError::config(key, "unknown key")),
        }
        Ok(())
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `shutdown_timeout = 30s`
    /// - `max_tasks = None`
    /// - `bus_capacity = 1024`
    /// - `metrics = MetricsConfig::default()` (disabled)
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
            max_tasks: None,
            bus_capacity: 1024,
            metrics: MetricsConfig::default(),
        }
    }
}

/// Typed value for [`Config::update`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigValue {
    /// A duration.
    Duration(Duration),
    /// An integer.
    Int(i64),
    /// A boolean.
    Bool(bool),
    /// A string.
    Str(String),
    /// A whole metrics block.
    Metrics(MetricsConfig),
}

impl ConfigValue {
    /// Returns the kind name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigValue::Duration(_) => "duration",
            ConfigValue::Int(_) => "int",
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Str(_) => "string",
            ConfigValue::Metrics(_) => "metrics",
        }
    }
}

fn expected_kind(key: &str) -> &'static str {
    match key {
        "shutdown_timeout" | "metrics.interval" => "duration",
        "max_tasks" => "int",
        "metrics" => "metrics",
        "metrics.enabled" => "bool",
        "metrics.sink_url" => "string",
        _ => "nothing",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_kind_is_rejected_and_leaves_config_untouched() {
        let mut cfg = Config::default();
        let err = cfg
            .update("shutdown_timeout", ConfigValue::Int(5))
            .unwrap_err();
        assert_eq!(
            err,
            RuntimeError::Configuration {
                key: "shutdown_timeout".into(),
                reason: "expected duration, got int".into(),
            }
        );
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn test_unknown_key() {
        let mut cfg = Config::default();
        let err = cfg.update("bus_capacity", ConfigValue::Int(8)).unwrap_err();
        assert_eq!(err.as_label(), "runtime_configuration");
    }

    #[test]
    fn test_max_tasks_zero_clears() {
        let mut cfg = Config::default();
        cfg.update("max_tasks", ConfigValue::Int(10)).unwrap();
        assert_eq!(cfg.max_tasks, Some(10));
        cfg.update("max_tasks", ConfigValue::Int(0)).unwrap();
        assert_eq!(cfg.max_tasks, None);
        assert!(cfg.update("max_tasks", ConfigValue::Int(-1)).is_err());
    }

    #[test]
    fn test_max_tasks_is_never_truncated() {
        let mut cfg = Config::default();
        let res = cfg.update("max_tasks", ConfigValue::Int(i64::MAX));
        match usize::try_from(i64::MAX) {
            Ok(n) => {
                res.unwrap();
                assert_eq!(cfg.max_tasks, Some(n));
            }
            Err(_) => {
                let err = res.unwrap_err();
                assert!(err.as_message().contains("does not fit in usize"));
                assert_eq!(cfg.max_tasks, None);
            }
        }
    }

    #[test]
    fn test_metrics_fields() {
        let mut cfg = Config::default();
        cfg.update("metrics.enabled", ConfigValue::Bool(true)).unwrap();
        cfg.update(
            "metrics.sink_url",
            ConfigValue::Str("http://collector:9091".into()),
        )
        .unwrap();
        cfg.update(
            "metrics.interval",
            ConfigValue::Duration(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(
            cfg.metrics,
            MetricsConfig {
                enabled: true,
                sink_url: "http://collector:9091".into(),
                interval: Duration::from_secs(5),
            }
        );

        cfg.update("metrics", ConfigValue::Metrics(MetricsConfig::default()))
            .unwrap();
        assert!(!cfg.metrics.enabled);
    }

    #[test]
    fn test_bus_capacity_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
