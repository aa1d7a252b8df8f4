//! Prometheus adapter using the HTTP query API.
//!
//! Current queries go to `/api/v1/query`, range queries to
//! `/api/v1/query_range` with `start`, `end` and `step` in unix seconds.
//!
//! ## Example
//!
//! ```rust,no_run
//! use vmwatch_adapters::prometheus::PrometheusAdapter;
//! use vmwatch_adapters::MetricsBackend;
//! use vmwatch_types::QueryMode;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let adapter = PrometheusAdapter::builder()
//!         .endpoint("http://localhost:9090")
//!         .build()?;
//!
//!     let response = adapter
//!         .fetch(r#"libvirt_domain_openstack_info{instance_id="abc"}"#, QueryMode::Current)
//!         .await?;
//!
//!     for sample in response.iter() {
//!         println!("domain: {:?}", sample.label("domain"));
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::debug;
use vmwatch_types::{QueryMode, RawResponse};

use crate::wire::{decode_response, error_message};
use crate::{AdapterError, MetricsBackend};

/// Prometheus adapter for evaluating queries.
#[derive(Debug, Clone)]
pub struct PrometheusAdapter {
    client: Client,
    endpoint: String,
    username: Option<String>,
    password: Option<String>,
    description: String,
}

impl PrometheusAdapter {
    /// Create a new builder for configuring the adapter.
    pub fn builder() -> PrometheusAdapterBuilder {
        PrometheusAdapterBuilder::default()
    }

    /// The base URL queries are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.endpoint, path);
        let request = self.client.get(url);
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_ref()),
            None => request,
        }
    }
}

#[async_trait]
impl MetricsBackend for PrometheusAdapter {
    async fn fetch(&self, query: &str, mode: QueryMode) -> Result<RawResponse, AdapterError> {
        debug!(query, mode = mode.as_str(), "querying prometheus");

        let request = match mode {
            QueryMode::Current => self.request("/api/v1/query").query(&[("query", query)]),
            QueryMode::Range(range) => self.request("/api/v1/query_range").query(&[
                ("query", query.to_string()),
                ("start", range.start.to_string()),
                ("end", range.end.to_string()),
                ("step", range.step.to_string()),
            ]),
        };

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AdapterError::Auth(format!("API returned status {}", status)));
        }

        let body = response.bytes().await?;

        if !status.is_success() {
            // Prometheus reports query errors (400/422/503) with a JSON body.
            return Err(match error_message(&body) {
                Some(msg) => AdapterError::Query(msg),
                None => AdapterError::Http(format!("API returned status {}", status)),
            });
        }

        decode_response(&body)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Builder for PrometheusAdapter.
#[derive(Debug, Default)]
pub struct PrometheusAdapterBuilder {
    endpoint: Option<String>,
    username: Option<String>,
    password: Option<String>,
    timeout: Option<Duration>,
}

impl PrometheusAdapterBuilder {
    /// Set the API endpoint (e.g., "http://localhost:9090").
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set a username and password for basic authentication.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the adapter.
    pub fn build(self) -> Result<PrometheusAdapter, AdapterError> {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdapterError::Http(format!("Failed to build HTTP client: {}", e)))?;

        let endpoint = self
            .endpoint
            .unwrap_or_else(|| "http://localhost:9090".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(PrometheusAdapter {
            client,
            description: format!("prometheus: {}", endpoint),
            endpoint,
            username: self.username,
            password: self.password,
        })
    }
}
