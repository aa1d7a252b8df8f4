//! Query modes and time ranges.

use core::time::Duration;

/// A closed time window sampled at a fixed step, all in unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeRange {
    /// Window start (inclusive).
    pub start: u64,
    /// Window end (inclusive).
    pub end: u64,
    /// Resolution step in seconds, never zero.
    pub step: u64,
}

impl TimeRange {
    /// Create a range. A zero step is raised to one second and an inverted
    /// window is collapsed to its end.
    pub fn new(start: u64, end: u64, step: u64) -> Self {
        Self {
            start: start.min(end),
            end,
            step: step.max(1),
        }
    }

    /// The window ending at `end` and reaching `window` back.
    pub fn ending_at(end: u64, window: Duration, step: Duration) -> Self {
        Self::new(end.saturating_sub(window.as_secs()), end, step.as_secs())
    }

    /// The window ending now.
    #[cfg(feature = "std")]
    pub fn last(window: Duration, step: Duration) -> Self {
        Self::ending_at(unix_now(), window, step)
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.end - self.start)
    }

    /// Expected number of samples a backend returns for this range.
    pub fn sample_count(&self) -> u64 {
        (self.end - self.start) / self.step + 1
    }
}

/// Commonly used windows for trend charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RangePreset {
    /// Last hour at one-minute resolution.
    #[default]
    LastHour,
    /// Last day at five-minute resolution.
    LastDay,
    /// Last week at one-hour resolution.
    LastWeek,
}

impl RangePreset {
    /// Length of the window.
    pub fn window(&self) -> Duration {
        match self {
            RangePreset::LastHour => Duration::from_secs(3_600),
            RangePreset::LastDay => Duration::from_secs(86_400),
            RangePreset::LastWeek => Duration::from_secs(7 * 86_400),
        }
    }

    /// Default resolution for the window.
    pub fn step(&self) -> Duration {
        match self {
            RangePreset::LastHour => Duration::from_secs(60),
            RangePreset::LastDay => Duration::from_secs(300),
            RangePreset::LastWeek => Duration::from_secs(3_600),
        }
    }

    /// Concrete range ending at `end`.
    pub fn ending_at(&self, end: u64) -> TimeRange {
        TimeRange::ending_at(end, self.window(), self.step())
    }

    /// Concrete range ending now.
    #[cfg(feature = "std")]
    pub fn to_range(&self) -> TimeRange {
        TimeRange::last(self.window(), self.step())
    }
}

/// How a query is evaluated by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum QueryMode {
    /// Single value per series at evaluation time.
    Current,
    /// Values over a time range.
    Range(TimeRange),
}

impl QueryMode {
    /// Short name, as used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::Current => "current",
            QueryMode::Range(_) => "range",
        }
    }
}

/// Current unix time in whole seconds.
#[cfg(feature = "std")]
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
