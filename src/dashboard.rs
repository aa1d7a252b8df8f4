//! Dashboard state: ties the lifecycle controller, card configs, device
//! selector and poller together.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};
use vmwatch_adapters::MetricsBackend;
use vmwatch_types::{DeviceSet, MonitorState, TimeRange};

use crate::cards::{build_card_configs, CardConfigs};
use crate::catalog::{MetricCatalog, QueryParams};
use crate::data::duration::format_duration;
use crate::devices::{discover_devices, DeviceFilter, DeviceSelector};
use crate::lifecycle::{InstanceIdentity, MonitorController};
use crate::poll::{CardResult, Poller};

/// Time window and step for trend cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSelection {
    pub window: Duration,
    pub step: Duration,
}

impl Default for RangeSelection {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(3_600),
            step: Duration::from_secs(60),
        }
    }
}

impl RangeSelection {
    /// The range ending now.
    pub fn to_range(&self) -> TimeRange {
        TimeRange::last(self.window, self.step)
    }

    pub fn label(&self) -> String {
        format!("last {} every {}", format_duration(self.window), format_duration(self.step))
    }
}

/// Everything one refresh produced. Serializable for export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardData {
    pub state: MonitorState,
    pub devices: DeviceSet,
    pub device_selector_visible: bool,
    pub selected_device: DeviceFilter,
    pub range: TimeRange,
    pub top_cards: Vec<CardResult>,
    pub trend_cards: Vec<CardResult>,
}

impl DashboardData {
    /// One line describing this refresh, for watch mode.
    pub fn summary_line(&self) -> String {
        if let Some(msg) = self.state.error_message.as_deref().filter(|_| self.state.is_error()) {
            return format!("error: {msg}");
        }
        let values: Vec<String> = self
            .top_cards
            .iter()
            .map(|card| {
                let value = card.display.as_deref().unwrap_or("-");
                format!("{}={}", card.title, value)
            })
            .collect();
        let failed = self
            .top_cards
            .iter()
            .chain(self.trend_cards.iter())
            .filter(|card| card.error.is_some())
            .count();
        let mut line = format!(
            "{} [{}] {}",
            self.state.domain.as_deref().unwrap_or("?"),
            self.devices.len(),
            values.join(" ")
        );
        if failed > 0 {
            line.push_str(&format!(" ({failed} card(s) failed)"));
        }
        line
    }

    /// Write this snapshot to a file as pretty JSON.
    pub fn export(&self, path: &Path) -> Result<()> {
        use std::io::Write;

        let json = serde_json::to_string_pretty(self)?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

/// Dashboard for one instance.
pub struct Dashboard {
    controller: MonitorController,
    poller: Poller,
    devices: DeviceSelector,
    range: RangeSelection,
    cards: Option<CardConfigs>,
}

impl Dashboard {
    /// Create a new dashboard against a backend.
    pub fn new(backend: Arc<dyn MetricsBackend>, catalog: Arc<MetricCatalog>) -> Self {
        Self {
            controller: MonitorController::new(Arc::clone(&backend), Arc::clone(&catalog)),
            poller: Poller::new(backend, catalog),
            devices: DeviceSelector::new(),
            range: RangeSelection::default(),
            cards: None,
        }
    }

    /// Allow the CPU trend to show placeholder data when the backend has none.
    pub fn allow_synthetic(mut self, allow: bool) -> Self {
        self.poller = self.poller.allow_synthetic(allow);
        self
    }

    pub fn with_range(mut self, range: RangeSelection) -> Self {
        self.range = range;
        self
    }

    /// Returns a description of the metrics backend.
    pub fn source_description(&self) -> &str {
        self.controller.backend().description()
    }

    pub fn controller(&self) -> &MonitorController {
        &self.controller
    }

    /// Point the dashboard at an instance.
    ///
    /// Does nothing when the identity has not changed since the last call.
    pub fn open(&self, identity: &InstanceIdentity) -> bool {
        self.controller.update_identity(identity)
    }

    pub fn state(&self) -> MonitorState {
        self.controller.state()
    }

    /// Device-change callback. `"all"` clears the filter.
    pub fn select_device(&mut self, value: &str) -> bool {
        let changed = self.devices.select(value);
        if changed {
            info!(device = value, "Device filter changed");
        }
        changed
    }

    pub fn set_range(&mut self, range: RangeSelection) {
        self.range = range;
    }

    pub fn range(&self) -> RangeSelection {
        self.range
    }

    pub fn devices(&self) -> &DeviceSelector {
        &self.devices
    }

    /// Wait for the monitor to settle, then poll every card.
    ///
    /// Cards and device discovery are only queried once a domain is known.
    pub async fn refresh(&mut self) -> DashboardData {
        let state = self.controller.wait_settled().await;
        let range = self.range.to_range();

        let ready = match (&state.instance_id, &state.domain) {
            (Some(id), Some(domain)) if state.is_ready() => Some((id.clone(), domain.clone())),
            _ => None,
        };
        let Some((instance_id, domain)) = ready else {
            debug!(status = ?state.status, "Monitor not ready, skipping poll");
            return DashboardData {
                device_selector_visible: self.devices.is_visible(),
                devices: self.devices.devices().clone(),
                selected_device: self.devices.filter().clone(),
                state,
                range,
                top_cards: Vec::new(),
                trend_cards: Vec::new(),
            };
        };

        let fresh = build_card_configs(&instance_id, &domain);
        if self.cards.as_ref() != Some(&fresh) {
            debug!(domain = %domain, "Card configuration changed");
        }
        let cards = self.cards.insert(fresh);

        let mut params = QueryParams::new();
        self.devices.apply(&mut params);

        let backend = self.controller.backend().as_ref();
        let catalog = self.controller.catalog().as_ref();
        let (devices, top_cards, trend_cards) = tokio::join!(
            discover_devices(backend, catalog, &domain),
            self.poller.fetch_all(&cards.top_cards, &params, range),
            self.poller.fetch_all(&cards.trend_cards, &params, range),
        );
        self.devices.refresh(devices);

        DashboardData {
            device_selector_visible: self.devices.is_visible(),
            devices: self.devices.devices().clone(),
            selected_device: self.devices.filter().clone(),
            state,
            range,
            top_cards,
            trend_cards,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_label() {
        assert_eq!(RangeSelection::default().label(), "last 1h every 1m");
    }

    #[test]
    fn test_summary_line_error() {
        let data = DashboardData {
            state: MonitorState::error(None, "Instance ID is required for monitoring", true),
            devices: DeviceSet::new(),
            device_selector_visible: false,
            selected_device: DeviceFilter::All,
            range: TimeRange::new(0, 3600, 60),
            top_cards: Vec::new(),
            trend_cards: Vec::new(),
        };
        assert_eq!(data.summary_line(), "error: Instance ID is required for monitoring");
    }

    #[test]
    fn test_export_writes_json() {
        let data = DashboardData {
            state: MonitorState::ready("abc".into(), "d1".into(), None),
            devices: ["vda".to_string()].into_iter().collect(),
            device_selector_visible: true,
            selected_device: DeviceFilter::Device("vda".into()),
            range: TimeRange::new(0, 3600, 60),
            top_cards: Vec::new(),
            trend_cards: Vec::new(),
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        data.export(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["state"]["domain"], "d1");
        assert_eq!(value["devices"][0], "vda");
        assert_eq!(value["selected_device"]["device"], "vda");
    }

    #[tokio::test]
    async fn test_refresh_before_open_is_not_ready() {
        let backend = Arc::new(vmwatch_adapters::ReplayBackend::new());
        let mut dashboard = Dashboard::new(backend, Arc::new(MetricCatalog::builtin()));

        let data = tokio::time::timeout(Duration::from_secs(1), dashboard.refresh())
            .await
            .unwrap();
        assert!(data.state.is_loading());
        assert!(data.top_cards.is_empty());
        assert!(data.trend_cards.is_empty());
    }
}
