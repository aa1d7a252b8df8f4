//! # vmwatch
//!
//! Instance monitoring for libvirt-backed cloud instances.
//!
//! Given an instance id, vmwatch resolves the libvirt domain behind it, then
//! polls a metrics backend (Prometheus fed by the libvirt exporter) for CPU,
//! memory, network and disk metrics and turns the answers into chart-ready
//! points and series.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Dashboard                             │
//! │  ┌───────────┐   ┌─────────┐   ┌────────┐   ┌──────────────────┐ │
//! │  │ lifecycle │──▶│  cards  │──▶│  poll  │──▶│ data::normalize  │ │
//! │  │ (domain)  │   │ (specs) │   │        │   │ (points, series) │ │
//! │  └─────┬─────┘   └─────────┘   └───┬────┘   └──────────────────┘ │
//! │        │                           │                             │
//! │        ▼                           ▼                             │
//! │  ┌──────────────────────────────────────┐     ┌──────────────┐   │
//! │  │ MetricsBackend (Prometheus | Replay) │◀────│   catalog    │   │
//! │  └──────────────────────────────────────┘     └──────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`catalog`]**: Metric keys mapped to query templates ([`MetricCatalog`])
//! - **[`data`]**: Normalization of raw responses and value formatting
//! - **[`cards`]**: Pure card configuration ([`build_card_configs`])
//! - **[`devices`]**: Disk device discovery and the device filter
//! - **[`lifecycle`]**: The [`MonitorController`] state machine
//! - **[`poll`]**: Concurrent card fetching
//! - **[`dashboard`]**: Everything above, wired together
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # One-shot: print the dashboard for an instance as JSON
//! vmwatch --instance 6f1c... --endpoint http://prometheus:9090
//!
//! # Keep polling every 30 seconds
//! vmwatch --instance 6f1c... --watch --refresh 30s
//!
//! # Offline, from a fixture file
//! vmwatch --instance abc --replay fixtures.json --export dashboard.json
//! ```
//!
//! ### As a library
//!
//! ```
//! use std::sync::Arc;
//! use vmwatch::{Dashboard, InstanceIdentity, MetricCatalog, ReplayBackend};
//!
//! # tokio_test::block_on(async {
//! let backend = Arc::new(ReplayBackend::new());
//! let mut dashboard = Dashboard::new(backend, Arc::new(MetricCatalog::builtin()));
//!
//! dashboard.open(&InstanceIdentity::new("abc"));
//! let data = dashboard.refresh().await;
//!
//! // The empty replay backend fails the probe
//! assert!(data.state.is_error());
//! assert!(!data.state.backend_available);
//! # });
//! ```

pub mod cards;
pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod data;
pub mod devices;
pub mod error;
pub mod lifecycle;
pub mod poll;

// Re-export main types for convenience
pub use cards::{build_card_configs, CardConfigs, CardSpec, ChartType, Presentation};
pub use catalog::{CatalogError, MetricCatalog, QuerySpec};
pub use dashboard::{Dashboard, DashboardData, RangeSelection};
pub use data::{CardData, ValueFormat};
pub use devices::{discover_devices, DeviceFilter, DeviceSelector};
pub use error::MonitorError;
pub use lifecycle::{InstanceIdentity, MonitorController};
pub use poll::{CardResult, Poller};
pub use vmwatch_adapters::{AdapterError, MetricsBackend, ReplayBackend};
pub use vmwatch_types::{
    DeviceSet, MonitorState, MonitorStatus, Point, Provenance, RawResponse, RawSample, Series,
    SeriesSet, TimeRange,
};
