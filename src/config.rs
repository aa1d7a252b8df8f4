//! Layered settings for the `vmwatch` binary.
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML
//! file, then `VMWATCH_` environment variables (`__` separates sections, e.g.
//! `VMWATCH_PROMETHEUS__ENDPOINT`). Command-line flags are applied on top by
//! the binary.
//!
//! ```toml
//! [prometheus]
//! endpoint = "http://prometheus:9090"
//! timeout = "10s"
//!
//! [monitor]
//! range = "6h"
//! step = "5m"
//! refresh = "30s"
//! synthetic_fallback = false
//!
//! [log]
//! filter = "vmwatch=debug"
//!
//! [[catalog]]
//! key = "instanceMonitor.probe"
//! queries = ['up{instance_id="$instance"}']
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::catalog::MetricCatalog;
use crate::dashboard::RangeSelection;
use crate::data::duration::parse_duration;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub prometheus: PrometheusSettings,
    pub monitor: MonitorSettings,
    pub log: LogSettings,
    #[serde(default)]
    pub catalog: Vec<CatalogOverride>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PrometheusSettings {
    pub endpoint: String,
    pub timeout: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MonitorSettings {
    pub range: String,
    pub step: String,
    pub refresh: String,
    pub synthetic_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogSettings {
    pub filter: String,
}

/// Replacement templates for one catalog key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogOverride {
    pub key: String,
    pub queries: Vec<String>,
}

impl Settings {
    /// Load settings from defaults, an optional file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("prometheus.endpoint", "http://localhost:9090")?
            .set_default("prometheus.timeout", "10s")?
            .set_default("monitor.range", "1h")?
            .set_default("monitor.step", "60s")?
            .set_default("monitor.refresh", "30s")?
            .set_default("monitor.synthetic_fallback", false)?
            .set_default("log.filter", "info")?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("VMWATCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to load configuration")?;

        config
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(&self.prometheus.timeout).context("prometheus.timeout")
    }

    pub fn refresh_interval(&self) -> Result<Duration> {
        parse_duration(&self.monitor.refresh).context("monitor.refresh")
    }

    /// Trend window and step.
    pub fn range_selection(&self) -> Result<RangeSelection> {
        Ok(RangeSelection {
            window: parse_duration(&self.monitor.range).context("monitor.range")?,
            step: parse_duration(&self.monitor.step).context("monitor.step")?,
        })
    }

    /// The built-in catalog with the configured overrides applied.
    pub fn catalog(&self) -> Result<MetricCatalog> {
        let overrides = self
            .catalog
            .iter()
            .map(|o| (o.key.clone(), o.queries.clone()));
        MetricCatalog::builtin()
            .with_overrides(overrides)
            .context("Invalid catalog override")
    }
}
