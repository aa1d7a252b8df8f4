//! Chart-ready points and series.

use alloc::string::String;
use alloc::vec::Vec;

/// A single chart point.
///
/// `x` is the source sample time in unix seconds, `y` is always finite.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    /// Unix timestamp in seconds.
    pub x: f64,
    /// Sample value after any scaling.
    pub y: f64,
}

impl Point {
    /// Create a new point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Where the points of a [`SeriesSet`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Provenance {
    /// Points were read from the metrics backend.
    #[default]
    Observed,
    /// Points were generated locally because the backend had no data.
    ///
    /// Synthetic series are placeholders for display only. They must never be
    /// persisted or compared against observed data.
    Synthetic,
}

/// A named sequence of points.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Series {
    /// Display name (e.g. `Used`, `read-vda`).
    pub name: String,
    /// Points in source order.
    pub points: Vec<Point>,
}

impl Series {
    /// Create an empty series.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: Vec::new(),
        }
    }

    /// Create a series from points.
    pub fn with_points(name: impl Into<String>, points: Vec<Point>) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the series has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The most recent point, if any.
    pub fn latest(&self) -> Option<&Point> {
        self.points.last()
    }
}

/// Ordered collection of named series produced from one chart query.
///
/// Series keep the order in which their names were first seen, so a
/// caller-supplied rename list lines up positionally.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeriesSet {
    /// Whether the points are real or placeholders.
    pub provenance: Provenance,
    /// Series in first-seen order.
    pub series: Vec<Series>,
}

impl SeriesSet {
    /// Create an empty, observed series set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a synthetic series set.
    pub fn synthetic(series: Vec<Series>) -> Self {
        Self {
            provenance: Provenance::Synthetic,
            series,
        }
    }

    /// Check if this set holds placeholder data.
    pub fn is_synthetic(&self) -> bool {
        self.provenance == Provenance::Synthetic
    }

    /// Check if no series holds any point.
    pub fn is_empty(&self) -> bool {
        self.series.iter().all(Series::is_empty)
    }

    /// Number of series.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Total number of points across all series.
    pub fn total_points(&self) -> usize {
        self.series.iter().map(Series::len).sum()
    }

    /// Look up a series by name.
    pub fn get(&self, name: &str) -> Option<&Series> {
        self.series.iter().find(|s| s.name == name)
    }

    /// Series names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|s| s.name.as_str())
    }

    /// Get the named series, appending an empty one if it does not exist yet.
    pub fn series_mut(&mut self, name: &str) -> &mut Series {
        let idx = match self.series.iter().position(|s| s.name == name) {
            Some(idx) => idx,
            None => {
                self.series.push(Series::new(name));
                self.series.len() - 1
            }
        };
        &mut self.series[idx]
    }

    /// Append a point to the named series.
    pub fn push(&mut self, name: &str, point: Point) {
        self.series_mut(name).points.push(point);
    }
}
