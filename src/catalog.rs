//! Metric catalog: logical metric names mapped to backend query templates.
//!
//! A template is a query expression with `$name` placeholders. Rendering
//! substitutes each placeholder with the matching query parameter, quoted so
//! it is safe inside a label matcher:
//!
//! ```
//! use vmwatch::catalog::{keys, MetricCatalog, QuerySpec};
//!
//! let catalog = MetricCatalog::builtin();
//! let spec = QuerySpec::new(keys::OPENSTACK_INFO).param("instance", "abc");
//!
//! let queries = catalog.render(&spec).unwrap();
//! assert_eq!(queries, vec![r#"libvirt_domain_openstack_info{instance_id="abc"}"#]);
//! ```
//!
//! The catalog is built once at startup and shared by reference; it has no
//! mutation API.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Filter parameters substituted into a template.
pub type QueryParams = BTreeMap<String, String>;

/// Well-known catalog keys.
pub mod keys {
    /// CPU usage as a 0..1 fraction of the allotted vCPUs.
    pub const CPU: &str = "instanceMonitor.cpu";
    /// Memory usage in percent.
    pub const MEM_USAGE: &str = "instanceMonitor.memUsage";
    /// Total disk operations per second.
    pub const DISK_IOPS: &str = "instanceMonitor.disk_iops";
    /// Used and free memory in bytes.
    pub const MEMORY: &str = "instanceMonitor.memory";
    /// Received and transmitted bytes per second, per interface.
    pub const NETWORK: &str = "instanceMonitor.network";
    /// Read and written bytes per second, per disk.
    pub const DISK: &str = "instanceMonitor.disk";
    /// Nova-to-libvirt mapping, carrying the `domain` label.
    pub const OPENSTACK_INFO: &str = "instanceMonitor.openstackinfo";
    /// Lightweight availability probe keyed by instance id.
    pub const PROBE: &str = "instanceMonitor.probe";
    /// Disk byte counters used to discover device labels.
    pub const DEVICES: &str = "instanceMonitor.devices";
}

/// Errors raised by catalog construction and rendering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// No entry for the requested key.
    #[error("Unknown metric key: {0}")]
    UnknownMetricKey(String),

    /// A key that is not a dotted `category.metric` identifier.
    #[error("Invalid metric key {0:?}: expected category.metric")]
    InvalidKey(String),

    /// A template references a placeholder the catalog does not know.
    #[error("Unknown placeholder ${name} in template {template:?}")]
    UnknownPlaceholder { template: String, name: String },

    /// A placeholder without a default was not supplied.
    #[error("Missing query parameter {name:?} for {key}")]
    MissingParameter { key: String, name: String },

    /// A key mapped to no templates.
    #[error("Metric key {0} has no query templates")]
    Empty(String),
}

/// Dotted `category.metric` identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct MetricKey(String);

impl MetricKey {
    /// Create a key without validation.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the `category.metric` shape: two or more non-empty segments.
    pub fn is_well_formed(&self) -> bool {
        let mut segments = self.0.split('.');
        let first = segments.next().is_some_and(|s| !s.is_empty());
        let mut rest = 0;
        for segment in segments {
            if segment.is_empty() {
                return false;
            }
            rest += 1;
        }
        first && rest > 0
    }
}

impl From<&str> for MetricKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Placeholders a template may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// Libvirt domain name.
    Domain,
    /// Disk device; matched with `=~`, defaults to every device.
    Device,
    /// Nova instance id.
    Instance,
}

impl Placeholder {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "domain" => Some(Placeholder::Domain),
            "device" => Some(Placeholder::Device),
            "instance" => Some(Placeholder::Instance),
            _ => None,
        }
    }

    /// Parameter name, as used in [`QueryParams`].
    pub fn name(&self) -> &'static str {
        match self {
            Placeholder::Domain => "domain",
            Placeholder::Device => "device",
            Placeholder::Instance => "instance",
        }
    }

    /// Escape a caller-supplied value for this slot.
    ///
    /// Device values land in a regex matcher, so they are matched literally.
    fn escape(&self, value: &str) -> String {
        match self {
            Placeholder::Device => escape_label_value(&escape_regex(value)),
            Placeholder::Domain | Placeholder::Instance => escape_label_value(value),
        }
    }

    fn default_value(&self) -> Option<&'static str> {
        match self {
            Placeholder::Device => Some(".*"),
            Placeholder::Domain | Placeholder::Instance => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(String),
}

/// A query expression with `$name` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl QueryTemplate {
    /// Split a template into literal text and placeholders.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let mut segments = Vec::new();
        let mut rest = raw.as_str();

        while let Some(pos) = rest.find('$') {
            if pos > 0 {
                segments.push(Segment::Literal(rest[..pos].to_string()));
            }
            let after = &rest[pos + 1..];
            let len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            segments.push(Segment::Slot(after[..len].to_string()));
            rest = &after[len..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Self { raw, segments }
    }

    /// The template text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Names of all placeholders, in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Slot(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Check that every placeholder is known.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for name in self.placeholders() {
            if Placeholder::from_name(name).is_none() {
                return Err(CatalogError::UnknownPlaceholder {
                    template: self.raw.clone(),
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Substitute parameters into the template.
    ///
    /// `key` is only used for error messages.
    pub fn render(&self, key: &str, params: &QueryParams) -> Result<String, CatalogError> {
        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(name) => {
                    let placeholder = Placeholder::from_name(name).ok_or_else(|| {
                        CatalogError::UnknownPlaceholder {
                            template: self.raw.clone(),
                            name: name.clone(),
                        }
                    })?;
                    match params.get(name.as_str()) {
                        Some(value) => out.push_str(&placeholder.escape(value)),
                        None => {
                            let default = placeholder.default_value().ok_or_else(|| {
                                CatalogError::MissingParameter {
                                    key: key.to_string(),
                                    name: name.clone(),
                                }
                            })?;
                            out.push_str(default);
                        }
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Escape a label value for use inside double quotes.
/// Backslash, double-quote, and newline must be escaped.
pub fn escape_label_value(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Backslash-escape RE2 metacharacters so `s` matches only itself.
pub fn escape_regex(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(
            c,
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// The metric key and parameters for one card's queries.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct QuerySpec {
    /// Catalog key.
    pub metric_key: MetricKey,
    /// Parameters substituted into every template of the key.
    pub params: QueryParams,
}

impl QuerySpec {
    /// Create a spec with no parameters.
    pub fn new(metric_key: impl Into<MetricKey>) -> Self {
        Self {
            metric_key: metric_key.into(),
            params: QueryParams::new(),
        }
    }

    /// Add a parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// A copy with `extra` merged in; `extra` wins on conflicts.
    pub fn with_params(&self, extra: &QueryParams) -> Self {
        let mut spec = self.clone();
        spec.params.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        spec
    }
}

/// Immutable mapping from metric keys to query templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricCatalog {
    entries: BTreeMap<MetricKey, Vec<QueryTemplate>>,
}

impl Default for MetricCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl MetricCatalog {
    /// Create a builder for a custom catalog.
    pub fn builder() -> MetricCatalogBuilder {
        MetricCatalogBuilder::default()
    }

    /// The catalog for libvirt exporter metrics of OpenStack instances.
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|(key, templates)| {
                (
                    MetricKey::new(*key),
                    templates.iter().map(|t| QueryTemplate::new(*t)).collect(),
                )
            })
            .collect();
        Self { entries }
    }

    /// A copy of this catalog with some keys replaced (or added).
    pub fn with_overrides<I, K, T>(&self, overrides: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (K, Vec<T>)>,
        K: Into<String>,
        T: Into<String>,
    {
        let mut builder = MetricCatalogBuilder {
            entries: self.entries.clone(),
        };
        for (key, templates) in overrides {
            builder = builder.entry(key, templates);
        }
        builder.build()
    }

    /// Look up the templates for a key.
    pub fn resolve(&self, key: &str) -> Result<&[QueryTemplate], CatalogError> {
        self.entries
            .get(&MetricKey::new(key))
            .map(Vec::as_slice)
            .ok_or_else(|| CatalogError::UnknownMetricKey(key.to_string()))
    }

    /// Render every template of a spec's key with the spec's parameters.
    pub fn render(&self, spec: &QuerySpec) -> Result<Vec<String>, CatalogError> {
        let key = spec.metric_key.as_str();
        self.resolve(key)?
            .iter()
            .map(|t| t.render(key, &spec.params))
            .collect()
    }

    /// Render only the first template of a spec's key.
    pub fn render_first(&self, spec: &QuerySpec) -> Result<String, CatalogError> {
        let key = spec.metric_key.as_str();
        let template = self
            .resolve(key)?
            .first()
            .ok_or_else(|| CatalogError::Empty(key.to_string()))?;
        template.render(key, &spec.params)
    }

    /// All keys, in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &MetricKey> {
        self.entries.keys()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the catalog has no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check every key and template.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for (key, templates) in &self.entries {
            if !key.is_well_formed() {
                return Err(CatalogError::InvalidKey(key.to_string()));
            }
            if templates.is_empty() {
                return Err(CatalogError::Empty(key.to_string()));
            }
            for template in templates {
                template.validate()?;
            }
        }
        Ok(())
    }
}

/// Builder for `MetricCatalog`.
#[derive(Debug, Default)]
pub struct MetricCatalogBuilder {
    entries: BTreeMap<MetricKey, Vec<QueryTemplate>>,
}

impl MetricCatalogBuilder {
    /// Set the templates for a key.
    pub fn entry<K, T>(mut self, key: K, templates: Vec<T>) -> Self
    where
        K: Into<String>,
        T: Into<String>,
    {
        self.entries.insert(
            MetricKey::new(key),
            templates.into_iter().map(QueryTemplate::new).collect(),
        );
        self
    }

    /// Build and validate the catalog.
    pub fn build(self) -> Result<MetricCatalog, CatalogError> {
        let catalog = MetricCatalog {
            entries: self.entries,
        };
        catalog.validate()?;
        Ok(catalog)
    }
}

const BUILTIN: &[(&str, &[&str])] = &[
    (
        keys::CPU,
        &[r#"rate(libvirt_domain_info_cpu_time_seconds_total{domain="$domain"}[5m]) / on(domain) libvirt_domain_info_virtual_cpus{domain="$domain"}"#],
    ),
    (
        keys::MEM_USAGE,
        &[r#"(1 - libvirt_domain_memory_stats_usable_bytes{domain="$domain"} / libvirt_domain_memory_stats_available_bytes{domain="$domain"}) * 100"#],
    ),
    (
        keys::DISK_IOPS,
        &[r#"sum(rate(libvirt_domain_block_stats_read_requests_total{domain="$domain",device=~"$device"}[5m]) + rate(libvirt_domain_block_stats_write_requests_total{domain="$domain",device=~"$device"}[5m]))"#],
    ),
    (
        keys::MEMORY,
        &[
            r#"libvirt_domain_memory_stats_available_bytes{domain="$domain"} - libvirt_domain_memory_stats_usable_bytes{domain="$domain"}"#,
            r#"libvirt_domain_memory_stats_usable_bytes{domain="$domain"}"#,
        ],
    ),
    (
        keys::NETWORK,
        &[
            r#"rate(libvirt_domain_interface_stats_receive_bytes_total{domain="$domain"}[5m])"#,
            r#"rate(libvirt_domain_interface_stats_transmit_bytes_total{domain="$domain"}[5m])"#,
        ],
    ),
    (
        keys::DISK,
        &[
            r#"rate(libvirt_domain_block_stats_read_bytes_total{domain="$domain",device=~"$device"}[5m])"#,
            r#"rate(libvirt_domain_block_stats_write_bytes_total{domain="$domain",device=~"$device"}[5m])"#,
        ],
    ),
    (
        keys::OPENSTACK_INFO,
        &[r#"libvirt_domain_openstack_info{instance_id="$instance"}"#],
    ),
    (
        keys::PROBE,
        &[r#"count(libvirt_domain_openstack_info{instance_id="$instance"})"#],
    ),
    (
        keys::DEVICES,
        &[r#"libvirt_domain_block_stats_read_bytes_total{domain="$domain"}"#],
    ),
];
