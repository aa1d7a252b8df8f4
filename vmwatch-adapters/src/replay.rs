//! Fixture-replay backend.
//!
//! Answers queries from a JSON document mapping query strings to Prometheus
//! API response bodies. Useful for offline demos and tests:
//!
//! ```json
//! {
//!   "libvirt_domain_openstack_info{instance_id=\"abc\"}": {
//!     "status": "success",
//!     "data": {"resultType": "vector", "result": [
//!       {"metric": {"domain": "instance-0000002a"}, "value": [1700000000, "1"]}
//!     ]}
//!   }
//! }
//! ```
//!
//! The same body answers both current and range evaluation of a query.
//! Queries without a fixture fail with [`AdapterError::Query`].

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use vmwatch_types::{QueryMode, RawResponse};

use crate::wire::decode_value;
use crate::{AdapterError, MetricsBackend};

/// A backend that replays canned responses.
#[derive(Debug, Clone)]
pub struct ReplayBackend {
    fixtures: BTreeMap<String, RawResponse>,
    description: String,
}

impl Default for ReplayBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayBackend {
    /// Create an empty replay backend (every query fails).
    pub fn new() -> Self {
        Self {
            fixtures: BTreeMap::new(),
            description: "replay: <empty>".to_string(),
        }
    }

    /// Load fixtures from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AdapterError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut backend = Self::from_json(&content)?;
        backend.description = format!("replay: {}", path.display());
        Ok(backend)
    }

    /// Parse fixtures from a JSON string.
    pub fn from_json(content: &str) -> Result<Self, AdapterError> {
        let raw: BTreeMap<String, Value> = serde_json::from_str(content)?;
        let mut fixtures = BTreeMap::new();
        for (query, body) in raw {
            let response = decode_value(body)?;
            fixtures.insert(query, response);
        }
        Ok(Self {
            fixtures,
            description: "replay: <inline>".to_string(),
        })
    }

    /// Add or replace the response for a query.
    pub fn with_response(mut self, query: impl Into<String>, response: RawResponse) -> Self {
        self.fixtures.insert(query.into(), response);
        self
    }

    /// Number of fixtures loaded.
    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    /// Check if no fixtures are loaded.
    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }
}

#[async_trait]
impl MetricsBackend for ReplayBackend {
    async fn fetch(&self, query: &str, _mode: QueryMode) -> Result<RawResponse, AdapterError> {
        self.fixtures
            .get(query)
            .cloned()
            .ok_or_else(|| AdapterError::Query(format!("no fixture for query {}", query)))
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use vmwatch_types::{RawSample, SampleTuple};

    fn sample_json() -> &'static str {
        r#"{
            "libvirt_domain_openstack_info{instance_id=\"abc\"}": {
                "status": "success",
                "data": {"resultType": "vector", "result": [
                    {"metric": {"domain": "instance-0000002a"}, "value": [1700000000, "1"]}
                ]}
            }
        }"#
    }

    #[tokio::test]
    async fn test_replay_known_query() {
        let backend = ReplayBackend::from_json(sample_json()).unwrap();
        let response = backend
            .fetch(
                r#"libvirt_domain_openstack_info{instance_id="abc"}"#,
                QueryMode::Current,
            )
            .await
            .unwrap();
        assert_eq!(response.results[0].label("domain"), Some("instance-0000002a"));
    }

    #[tokio::test]
    async fn test_replay_unknown_query() {
        let backend = ReplayBackend::new();
        let err = backend.fetch("up", QueryMode::Current).await.unwrap_err();
        assert!(matches!(err, AdapterError::Query(_)));
    }

    #[tokio::test]
    async fn test_with_response() {
        let backend = ReplayBackend::new().with_response(
            "up",
            RawResponse::new(vec![RawSample::instant(
                [("job", "libvirt")],
                SampleTuple::new(1.0, "1"),
            )]),
        );
        assert_eq!(backend.len(), 1);
        let response = backend.fetch("up", QueryMode::Current).await.unwrap();
        assert_eq!(response.len(), 1);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(sample_json().as_bytes()).unwrap();

        let backend = ReplayBackend::load(file.path()).unwrap();
        assert_eq!(backend.len(), 1);
        assert!(backend.description().starts_with("replay: "));
    }

    #[test]
    fn test_load_rejects_error_fixture() {
        let err = ReplayBackend::from_json(r#"{"up": {"status": "error", "error": "boom"}}"#)
            .unwrap_err();
        assert!(matches!(err, AdapterError::Query(_)));
    }
}
