//! Device discovery and the per-dashboard device filter.

use serde::Serialize;
use tracing::{debug, instrument, warn};
use vmwatch_adapters::MetricsBackend;
use vmwatch_types::{DeviceSet, QueryMode, RawResponse};

use crate::catalog::{keys, MetricCatalog, QueryParams, QuerySpec};
use crate::error::MonitorError;

/// Label carrying the disk device name in block stats.
pub const DEVICE_LABEL: &str = "device";

/// Filter value that selects every device.
pub const ALL_DEVICES: &str = "all";

/// Find the disk devices attached to a domain.
///
/// Failures are logged and yield an empty set; a dashboard without a device
/// list still works.
#[instrument(skip(backend, catalog))]
pub async fn discover_devices(
    backend: &dyn MetricsBackend,
    catalog: &MetricCatalog,
    domain: &str,
) -> DeviceSet {
    let spec = QuerySpec::new(keys::DEVICES).param("domain", domain);
    let query = match catalog.render_first(&spec) {
        Ok(query) => query,
        Err(e) => {
            warn!(error = %MonitorError::from(e), "Cannot build device query");
            return DeviceSet::new();
        }
    };

    match backend.fetch(&query, QueryMode::Current).await {
        Ok(response) => {
            let devices = extract_devices(&response, DEVICE_LABEL);
            debug!(count = devices.len(), "Discovered devices");
            devices
        }
        Err(e) => {
            warn!(error = %MonitorError::DeviceDiscovery(e), "Device discovery failed");
            DeviceSet::new()
        }
    }
}

/// Distinct non-empty values of `label` across a response.
pub fn extract_devices(response: &RawResponse, label: &str) -> DeviceSet {
    response
        .iter()
        .filter_map(|sample| sample.label(label))
        .filter(|device| !device.is_empty())
        .map(str::to_string)
        .collect()
}

/// Which devices the dashboard shows.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceFilter {
    #[default]
    All,
    Device(String),
}

impl DeviceFilter {
    /// Parse a selector value; `"all"` and the empty string select everything.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "" | ALL_DEVICES => DeviceFilter::All,
            device => DeviceFilter::Device(device.to_string()),
        }
    }

    /// The selected device, if any.
    pub fn device(&self) -> Option<&str> {
        match self {
            DeviceFilter::All => None,
            DeviceFilter::Device(name) => Some(name),
        }
    }
}

/// Device list plus the current selection.
#[derive(Debug, Clone, Default)]
pub struct DeviceSelector {
    devices: DeviceSet,
    filter: DeviceFilter,
}

impl DeviceSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the device list.
    ///
    /// A selection that no longer exists is reset to all devices.
    pub fn refresh(&mut self, devices: DeviceSet) {
        if let Some(device) = self.filter.device() {
            if !devices.contains(device) {
                debug!(device, "Selected device disappeared, showing all");
                self.filter = DeviceFilter::All;
            }
        }
        self.devices = devices;
    }

    /// Change the selection. Returns `true` if it changed.
    pub fn select(&mut self, value: &str) -> bool {
        let filter = DeviceFilter::parse(value);
        if filter == self.filter {
            return false;
        }
        self.filter = filter;
        true
    }

    /// The selector is only shown when there is something to pick.
    pub fn is_visible(&self) -> bool {
        !self.devices.is_empty()
    }

    pub fn devices(&self) -> &DeviceSet {
        &self.devices
    }

    pub fn filter(&self) -> &DeviceFilter {
        &self.filter
    }

    /// Add the `device` query parameter for the current selection.
    pub fn apply(&self, params: &mut QueryParams) {
        match self.filter.device() {
            Some(device) => {
                params.insert(DEVICE_LABEL.to_string(), device.to_string());
            }
            None => {
                params.remove(DEVICE_LABEL);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmwatch_adapters::ReplayBackend;
    use vmwatch_types::{RawSample, SampleTuple};

    fn block_sample(device: &str) -> RawSample {
        RawSample::instant(
            [("domain", "d1"), ("device", device)],
            SampleTuple::new(1.0, "1024"),
        )
    }

    #[test]
    fn test_extract_dedups() {
        let response = RawResponse::new(vec![
            block_sample("vda"),
            block_sample("vdb"),
            block_sample("vda"),
            block_sample(""),
        ]);
        let devices = extract_devices(&response, DEVICE_LABEL);
        let devices: Vec<&str> = devices.iter().map(String::as_str).collect();
        assert_eq!(devices, vec!["vda", "vdb"]);
    }

    #[tokio::test]
    async fn test_discover_devices() {
        let backend = ReplayBackend::new().with_response(
            r#"libvirt_domain_block_stats_read_bytes_total{domain="d1"}"#,
            RawResponse::new(vec![block_sample("vdb"), block_sample("vda")]),
        );
        let devices = discover_devices(&backend, &MetricCatalog::builtin(), "d1").await;
        assert_eq!(devices.len(), 2);
        assert!(devices.contains("vda"));
    }

    #[tokio::test]
    async fn test_discover_failure_is_empty() {
        let backend = ReplayBackend::new();
        let devices = discover_devices(&backend, &MetricCatalog::builtin(), "d1").await;
        assert!(devices.is_empty());
    }

    #[test]
    fn test_filter_parse() {
        assert_eq!(DeviceFilter::parse("all"), DeviceFilter::All);
        assert_eq!(DeviceFilter::parse(""), DeviceFilter::All);
        assert_eq!(DeviceFilter::parse("vda"), DeviceFilter::Device("vda".into()));
    }

    #[test]
    fn test_selector() {
        let mut selector = DeviceSelector::new();
        assert!(!selector.is_visible());

        selector.refresh(["vda".to_string(), "vdb".to_string()].into_iter().collect());
        assert!(selector.is_visible());

        assert!(selector.select("vda"));
        assert!(!selector.select("vda"));

        let mut params = QueryParams::new();
        selector.apply(&mut params);
        assert_eq!(params.get("device").map(String::as_str), Some("vda"));

        assert!(selector.select("all"));
        selector.apply(&mut params);
        assert!(!params.contains_key("device"));
    }

    #[test]
    fn test_selection_reset_when_device_disappears() {
        let mut selector = DeviceSelector::new();
        selector.refresh(["vda".to_string()].into_iter().collect());
        selector.select("vda");
        selector.refresh(["vdb".to_string()].into_iter().collect());
        assert_eq!(selector.filter(), &DeviceFilter::All);
    }
}
