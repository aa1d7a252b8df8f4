//! Error types for the monitoring pipeline.

use thiserror::Error;
use vmwatch_adapters::AdapterError;
use vmwatch_types::SampleDefect;

use crate::catalog::CatalogError;

/// Errors raised while bringing up or polling an instance monitor.
///
/// [`MissingInstanceId`](MonitorError::MissingInstanceId),
/// [`BackendUnavailable`](MonitorError::BackendUnavailable) and catalog
/// errors stop the monitor. The rest degrade locally: a fallback domain, an
/// empty device list or a skipped sample.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Instance ID is required for monitoring")]
    MissingInstanceId,

    #[error("Metrics backend is unavailable or instance metrics not found: {0}")]
    BackendUnavailable(#[source] AdapterError),

    #[error("Failed to get domain from metrics: {0}")]
    DomainResolution(String),

    #[error("Device discovery failed: {0}")]
    DeviceDiscovery(#[source] AdapterError),

    #[error("Malformed sample: {0}")]
    MalformedSample(#[from] SampleDefect),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl MonitorError {
    /// Whether the monitor cannot continue after this error.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            MonitorError::MissingInstanceId
                | MonitorError::BackendUnavailable(_)
                | MonitorError::Catalog(_)
        )
    }
}
