//! The query capability every metrics backend provides.

use std::fmt::Debug;

use async_trait::async_trait;
use vmwatch_types::{QueryMode, RawResponse};

use crate::AdapterError;

/// Trait for evaluating queries against a metrics backend.
///
/// Implementations receive a fully rendered query (placeholders already
/// substituted) and return the decoded result entries. Label matchers are
/// passed through untouched, so `metric_name{label="value"}` reaches the
/// backend exactly as written.
///
/// # Example
///
/// ```
/// use vmwatch_adapters::{MetricsBackend, ReplayBackend};
/// use vmwatch_types::QueryMode;
///
/// # tokio_test::block_on(async {
/// let backend = ReplayBackend::from_json(r#"{
///     "up": {"status": "success", "data": {"resultType": "vector", "result": []}}
/// }"#).unwrap();
///
/// let response = backend.fetch("up", QueryMode::Current).await.unwrap();
/// assert!(response.is_empty());
/// # });
/// ```
#[async_trait]
pub trait MetricsBackend: Send + Sync + Debug {
    /// Evaluate a query.
    async fn fetch(&self, query: &str, mode: QueryMode) -> Result<RawResponse, AdapterError>;

    /// Returns a human-readable description of the backend.
    fn description(&self) -> &str;
}
