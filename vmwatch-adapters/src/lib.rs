//! # vmwatch-adapters
//!
//! Metrics backend adapters for vmwatch.
//!
//! This crate defines the [`MetricsBackend`] capability (evaluate a query,
//! either at the current instant or over a time range) and ready-to-use
//! implementations of it.
//!
//! ## Supported Backends
//!
//! - **Prometheus** (`prometheus` feature, default) - Evaluates queries via the
//!   Prometheus HTTP API (`/api/v1/query` and `/api/v1/query_range`)
//! - **Replay** - Answers queries from a JSON fixture file, for offline use
//!
//! ## Quick Start (Prometheus)
//!
//! ```rust,no_run
//! use vmwatch_adapters::prometheus::PrometheusAdapter;
//! use vmwatch_adapters::MetricsBackend;
//! use vmwatch_types::QueryMode;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = PrometheusAdapter::builder()
//!         .endpoint("http://localhost:9090")
//!         .timeout(Duration::from_secs(5))
//!         .build()?;
//!
//!     let response = adapter.fetch("libvirt_up", QueryMode::Current).await?;
//!
//!     println!("Got {} series", response.len());
//!     Ok(())
//! }
//! ```

mod backend;
pub mod error;
mod replay;
pub mod wire;

#[cfg(feature = "prometheus")]
pub mod prometheus;

pub use backend::MetricsBackend;
pub use error::AdapterError;
pub use replay::ReplayBackend;

// Re-export types for convenience
pub use vmwatch_types::{QueryMode, RawResponse, RawSample, SampleTuple, TimeRange};
