//! Monitor lifecycle state, as read by the rendering layer.

use alloc::string::String;

/// Lifecycle phase of an instance monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MonitorStatus {
    /// Initialization is in progress.
    #[default]
    Loading,
    /// Backend reachable and domain known; charts can be fetched.
    Ready,
    /// Monitoring cannot proceed for this instance.
    Error,
}

/// Snapshot of a monitor's lifecycle.
///
/// In `Ready`, `error_message` is an advisory (e.g. the domain fell back to
/// the instance id); in `Error` it is the blocking reason.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MonitorState {
    /// Current phase.
    pub status: MonitorStatus,

    /// The instance this state belongs to.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub instance_id: Option<String>,

    /// Resolved (or fallback) virtualization domain.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub domain: Option<String>,

    /// Blocking error or advisory message.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub error_message: Option<String>,

    /// Whether the metrics backend answered the availability probe.
    pub backend_available: bool,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::loading(None)
    }
}

impl MonitorState {
    /// A fresh state for an instance whose initialization just started.
    pub fn loading(instance_id: Option<String>) -> Self {
        Self {
            status: MonitorStatus::Loading,
            instance_id,
            domain: None,
            error_message: None,
            backend_available: true,
        }
    }

    /// A ready state with an optional advisory.
    pub fn ready(instance_id: String, domain: String, advisory: Option<String>) -> Self {
        Self {
            status: MonitorStatus::Ready,
            instance_id: Some(instance_id),
            domain: Some(domain),
            error_message: advisory,
            backend_available: true,
        }
    }

    /// A blocking error state.
    pub fn error(
        instance_id: Option<String>,
        message: impl Into<String>,
        backend_available: bool,
    ) -> Self {
        Self {
            status: MonitorStatus::Error,
            instance_id,
            domain: None,
            error_message: Some(message.into()),
            backend_available,
        }
    }

    /// Check if initialization is still running.
    pub fn is_loading(&self) -> bool {
        self.status == MonitorStatus::Loading
    }

    /// Check if charts can be fetched.
    pub fn is_ready(&self) -> bool {
        self.status == MonitorStatus::Ready
    }

    /// Check if monitoring is blocked.
    pub fn is_error(&self) -> bool {
        self.status == MonitorStatus::Error
    }

    /// The advisory message of a ready state.
    pub fn advisory(&self) -> Option<&str> {
        match self.status {
            MonitorStatus::Ready => self.error_message.as_deref(),
            _ => None,
        }
    }
}
