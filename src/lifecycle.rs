//! Monitor lifecycle: resolve an instance to its libvirt domain.
//!
//! The controller publishes a [`MonitorState`] through a `watch` channel.
//! Every (re)initialization runs as its own task; a newer call aborts the
//! older task, and a generation check drops any result that still slips
//! through, so the last call always wins.
//!
//! ```text
//!   reinitialize()
//!        │  Loading
//!        ▼
//!   instance id? ──no──▶ Error("Instance ID is required for monitoring")
//!        │
//!        ▼
//!   probe ──fail──▶ Error (backend_available = false)
//!        │
//!        ▼
//!   resolve domain ──fail──▶ Ready (domain = instance id, advisory)
//!        │
//!        ▼
//!   Ready (domain)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use vmwatch_adapters::MetricsBackend;
use vmwatch_types::{MonitorState, QueryMode};

use crate::catalog::{keys, MetricCatalog, QuerySpec};
use crate::error::MonitorError;

/// Where the instance id comes from.
///
/// An explicit `instance_id` wins over the id taken from the route. Empty
/// strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceIdentity {
    pub instance_id: Option<String>,
    pub route_id: Option<String>,
    /// Bumped whenever the instance detail record is reloaded.
    pub detail_revision: u64,
}

impl InstanceIdentity {
    /// Identity for a known instance id.
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: Some(instance_id.into()),
            ..Self::default()
        }
    }

    pub fn with_route_id(mut self, route_id: impl Into<String>) -> Self {
        self.route_id = Some(route_id.into());
        self
    }

    pub fn with_revision(mut self, revision: u64) -> Self {
        self.detail_revision = revision;
        self
    }

    /// The effective instance id.
    pub fn resolved_id(&self) -> Option<&str> {
        let explicit = self.instance_id.as_deref().filter(|id| !id.is_empty());
        explicit.or_else(|| self.route_id.as_deref().filter(|id| !id.is_empty()))
    }

    fn change_key(&self) -> (Option<String>, u64) {
        (self.resolved_id().map(str::to_string), self.detail_revision)
    }
}

/// Drives a [`MonitorState`] through Loading, Ready and Error.
pub struct MonitorController {
    backend: Arc<dyn MetricsBackend>,
    catalog: Arc<MetricCatalog>,
    state: Arc<watch::Sender<MonitorState>>,
    generation: Arc<AtomicU64>,
    task: Mutex<Option<JoinHandle<()>>>,
    identity: Mutex<Option<(Option<String>, u64)>>,
}

impl std::fmt::Debug for MonitorController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorController")
            .field("backend", &self.backend.description())
            .field("state", &*self.state.borrow())
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish()
    }
}

impl MonitorController {
    /// Create a controller in the `Loading` state. Nothing runs until
    /// [`reinitialize`](Self::reinitialize) is called.
    pub fn new(backend: Arc<dyn MetricsBackend>, catalog: Arc<MetricCatalog>) -> Self {
        let (state, _) = watch::channel(MonitorState::default());
        Self {
            backend,
            catalog,
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
            task: Mutex::new(None),
            identity: Mutex::new(None),
        }
    }

    pub fn backend(&self) -> &Arc<dyn MetricsBackend> {
        &self.backend
    }

    pub fn catalog(&self) -> &Arc<MetricCatalog> {
        &self.catalog
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<MonitorState> {
        self.state.subscribe()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> MonitorState {
        self.state.borrow().clone()
    }

    /// Start over for `identity`.
    ///
    /// The state switches to `Loading` immediately; the work itself starts on
    /// the next scheduling turn. Must be called from within a Tokio runtime.
    pub fn reinitialize(&self, identity: &InstanceIdentity) {
        *self.identity.lock() = Some(identity.change_key());

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = self.task.lock().take() {
            previous.abort();
        }

        let instance_id = identity.resolved_id().map(str::to_string);
        debug!(generation, instance_id = ?instance_id, "Reinitializing monitor");
        self.state.send_replace(MonitorState::loading(instance_id.clone()));

        let backend = Arc::clone(&self.backend);
        let catalog = Arc::clone(&self.catalog);
        let state = Arc::clone(&self.state);
        let current = Arc::clone(&self.generation);

        let handle = tokio::spawn(async move {
            tokio::task::yield_now().await;
            let next = initialize(backend.as_ref(), &catalog, instance_id.as_deref()).await;
            let published = state.send_if_modified(|slot| {
                if current.load(Ordering::SeqCst) != generation {
                    return false;
                }
                *slot = next;
                true
            });
            if !published {
                debug!(generation, "Discarding superseded result");
            }
        });
        *self.task.lock() = Some(handle);
    }

    /// Reinitialize only if the resolved id or the detail revision changed.
    ///
    /// Returns `true` if a reinitialization was started.
    pub fn update_identity(&self, identity: &InstanceIdentity) -> bool {
        let key = identity.change_key();
        if self.identity.lock().as_ref() == Some(&key) {
            return false;
        }
        self.reinitialize(identity);
        true
    }

    /// Wait until the current initialization has finished.
    ///
    /// Returns the current state straight away if no run was ever started.
    pub async fn wait_settled(&self) -> MonitorState {
        if self.task.lock().is_none() {
            return self.state();
        }
        let mut rx = self.state.subscribe();
        let settled = match rx.wait_for(|state| !state.is_loading()).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        settled
    }
}

impl Drop for MonitorController {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

/// Run one initialization and return the state it ends in.
///
/// Never fails: every error is folded into the returned state.
#[instrument(skip(backend, catalog))]
pub async fn initialize(
    backend: &dyn MetricsBackend,
    catalog: &MetricCatalog,
    instance_id: Option<&str>,
) -> MonitorState {
    let Some(id) = instance_id.filter(|id| !id.is_empty()) else {
        let err = MonitorError::MissingInstanceId;
        warn!(%err, "Cannot start monitor");
        return MonitorState::error(None, err.to_string(), true);
    };

    if let Err(err) = probe(backend, catalog, id).await {
        warn!(%err, "Probe failed");
        let available = !matches!(err, MonitorError::BackendUnavailable(_));
        return MonitorState::error(Some(id.to_string()), err.to_string(), available);
    }

    match resolve_domain(backend, catalog, id).await {
        Ok(domain) => {
            info!(domain = %domain, "Monitor ready");
            MonitorState::ready(id.to_string(), domain, None)
        }
        Err(err) if err.is_blocking() => {
            warn!(%err, "Domain resolution failed");
            MonitorState::error(Some(id.to_string()), err.to_string(), true)
        }
        Err(err) => {
            warn!(%err, "Falling back to instance id as domain");
            MonitorState::ready(id.to_string(), id.to_string(), Some(err.to_string()))
        }
    }
}

/// Check that the backend answers queries about this instance.
pub async fn probe(
    backend: &dyn MetricsBackend,
    catalog: &MetricCatalog,
    instance_id: &str,
) -> Result<(), MonitorError> {
    let spec = QuerySpec::new(keys::PROBE).param("instance", instance_id);
    let query = catalog.render_first(&spec)?;
    backend
        .fetch(&query, QueryMode::Current)
        .await
        .map_err(MonitorError::BackendUnavailable)?;
    Ok(())
}

/// Look up the libvirt domain of an instance.
pub async fn resolve_domain(
    backend: &dyn MetricsBackend,
    catalog: &MetricCatalog,
    instance_id: &str,
) -> Result<String, MonitorError> {
    let spec = QuerySpec::new(keys::OPENSTACK_INFO).param("instance", instance_id);
    let query = catalog.render_first(&spec)?;
    let response = backend
        .fetch(&query, QueryMode::Current)
        .await
        .map_err(|e| MonitorError::DomainResolution(e.to_string()))?;

    let sample = response
        .results
        .first()
        .ok_or_else(|| MonitorError::DomainResolution("no openstack info series".to_string()))?;

    sample
        .label("domain")
        .filter(|domain| !domain.is_empty())
        .map(str::to_string)
        .ok_or_else(|| MonitorError::DomainResolution("series has no domain label".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vmwatch_adapters::ReplayBackend;
    use vmwatch_types::{MonitorStatus, RawResponse, RawSample, SampleTuple};

    const PROBE_ABC: &str = r#"count(libvirt_domain_openstack_info{instance_id="abc"})"#;
    const INFO_ABC: &str = r#"libvirt_domain_openstack_info{instance_id="abc"}"#;

    fn info(domain: &str) -> RawResponse {
        RawResponse::new(vec![RawSample::instant(
            [("instance_id", "abc"), ("domain", domain)],
            SampleTuple::new(1.0, "1"),
        )])
    }

    fn probe_ok() -> RawResponse {
        RawResponse::new(vec![RawSample::instant(
            Vec::<(String, String)>::new(),
            SampleTuple::new(1.0, "1"),
        )])
    }

    fn new_controller(backend: ReplayBackend) -> MonitorController {
        MonitorController::new(Arc::new(backend), Arc::new(MetricCatalog::builtin()))
    }

    #[test]
    fn test_resolved_id_prefers_explicit() {
        let identity = InstanceIdentity::new("abc").with_route_id("route");
        assert_eq!(identity.resolved_id(), Some("abc"));

        let identity = InstanceIdentity::new("").with_route_id("route");
        assert_eq!(identity.resolved_id(), Some("route"));

        assert_eq!(InstanceIdentity::default().resolved_id(), None);
    }

    #[tokio::test]
    async fn test_missing_instance_id() {
        let backend = ReplayBackend::new();
        let state = initialize(&backend, &MetricCatalog::builtin(), None).await;
        assert_eq!(state.status, MonitorStatus::Error);
        assert_eq!(
            state.error_message.as_deref(),
            Some("Instance ID is required for monitoring")
        );
        assert!(state.backend_available);

        let state = initialize(&backend, &MetricCatalog::builtin(), Some("")).await;
        assert!(state.is_error());
    }

    #[tokio::test]
    async fn test_probe_failure_marks_backend_unavailable() {
        let backend = ReplayBackend::new();
        let state = initialize(&backend, &MetricCatalog::builtin(), Some("abc")).await;
        assert!(state.is_error());
        assert!(!state.backend_available);
        assert_eq!(state.instance_id.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_resolves_domain() {
        let backend = ReplayBackend::new()
            .with_response(PROBE_ABC, probe_ok())
            .with_response(INFO_ABC, info("instance-0000002a"));
        let state = initialize(&backend, &MetricCatalog::builtin(), Some("abc")).await;
        assert!(state.is_ready());
        assert_eq!(state.domain.as_deref(), Some("instance-0000002a"));
        assert_eq!(state.advisory(), None);
    }

    #[tokio::test]
    async fn test_missing_domain_label_falls_back() {
        let backend = ReplayBackend::new()
            .with_response(PROBE_ABC, probe_ok())
            .with_response(INFO_ABC, info(""));
        let state = initialize(&backend, &MetricCatalog::builtin(), Some("abc")).await;
        assert!(state.is_ready());
        assert_eq!(state.domain.as_deref(), Some("abc"));
        assert!(state.advisory().is_some());
    }

    #[tokio::test]
    async fn test_resolution_error_falls_back() {
        let backend = ReplayBackend::new().with_response(PROBE_ABC, probe_ok());
        let state = initialize(&backend, &MetricCatalog::builtin(), Some("abc")).await;
        assert!(state.is_ready());
        assert_eq!(state.domain.as_deref(), Some("abc"));
        assert!(state
            .advisory()
            .is_some_and(|msg| msg.starts_with("Failed to get domain from metrics")));
    }

    #[tokio::test]
    async fn test_controller_publishes_ready() {
        let backend = ReplayBackend::new()
            .with_response(PROBE_ABC, probe_ok())
            .with_response(INFO_ABC, info("instance-0000002a"));
        let controller = new_controller(backend);
        assert!(controller.state().is_loading());

        controller.reinitialize(&InstanceIdentity::new("abc"));
        assert!(controller.state().is_loading());

        let state = controller.wait_settled().await;
        assert_eq!(state.domain.as_deref(), Some("instance-0000002a"));
    }

    #[tokio::test]
    async fn test_update_identity_skips_unchanged() {
        let backend = ReplayBackend::new()
            .with_response(PROBE_ABC, probe_ok())
            .with_response(INFO_ABC, info("d1"));
        let controller = new_controller(backend);

        let identity = InstanceIdentity::new("abc");
        assert!(controller.update_identity(&identity));
        controller.wait_settled().await;

        assert!(!controller.update_identity(&identity));
        assert!(!controller.update_identity(&InstanceIdentity::default().with_route_id("abc")));
        assert!(controller.state().is_ready());

        assert!(controller.update_identity(&identity.clone().with_revision(1)));
        assert!(controller.state().is_loading());
        controller.wait_settled().await;
    }

    #[tokio::test]
    async fn test_wait_settled_without_run() {
        let controller = new_controller(ReplayBackend::new());
        let state = tokio::time::timeout(Duration::from_secs(1), controller.wait_settled())
            .await
            .unwrap();
        assert!(state.is_loading());
    }
}
