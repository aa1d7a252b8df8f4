//! Backend-native samples, tagged by shape at ingestion.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::Point;

/// A single `[timestamp, "value"]` tuple as reported by the backend.
///
/// Either half may be missing when the backend (or a proxy in front of it)
/// returns a short or mangled tuple. Such tuples are kept until
/// normalization so that one bad entry never poisons a whole response.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleTuple {
    /// Unix timestamp in seconds.
    #[cfg_attr(feature = "serde", serde(default))]
    pub timestamp: Option<f64>,

    /// The sample value, still in the backend's string encoding.
    #[cfg_attr(feature = "serde", serde(default))]
    pub value: Option<String>,
}

impl SampleTuple {
    /// Create a well-formed tuple.
    pub fn new(timestamp: f64, value: impl Into<String>) -> Self {
        Self {
            timestamp: Some(timestamp),
            value: Some(value.into()),
        }
    }

    /// Create a tuple with no content, as produced by an empty `[]` entry.
    pub fn malformed() -> Self {
        Self::default()
    }

    /// Parse the tuple into a chart point.
    ///
    /// Fails when either half is missing, the value is not a number, or the
    /// parsed value is not finite (`NaN`, `+Inf`, `-Inf`).
    pub fn to_point(&self) -> Result<Point, SampleDefect> {
        let x = self.timestamp.ok_or(SampleDefect::MissingTimestamp)?;
        if !x.is_finite() {
            return Err(SampleDefect::NotFinite);
        }
        let raw = self.value.as_deref().ok_or(SampleDefect::MissingValue)?;
        let y: f64 = raw.trim().parse().map_err(|_| SampleDefect::NotANumber)?;
        if !y.is_finite() {
            return Err(SampleDefect::NotFinite);
        }
        Ok(Point { x, y })
    }
}

/// Why a sample tuple could not be turned into a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleDefect {
    /// The tuple had no timestamp.
    MissingTimestamp,
    /// The tuple had no value.
    MissingValue,
    /// The value did not parse as a number.
    NotANumber,
    /// The timestamp or value was NaN or infinite.
    NotFinite,
}

impl fmt::Display for SampleDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleDefect::MissingTimestamp => f.write_str("sample has no timestamp"),
            SampleDefect::MissingValue => f.write_str("sample has no value"),
            SampleDefect::NotANumber => f.write_str("sample value is not a number"),
            SampleDefect::NotFinite => f.write_str("sample is not finite"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SampleDefect {}

/// One result entry of a backend response.
///
/// The shape is decided once, when the response is decoded: an instant
/// query yields a single value per series, a range query yields a list.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "shape", rename_all = "snake_case"))]
pub enum RawSample {
    /// Result of an instantaneous ("current") query.
    Instant {
        /// Series labels.
        metric: BTreeMap<String, String>,
        /// The single sample.
        value: SampleTuple,
    },
    /// Result of a range query.
    Range {
        /// Series labels.
        metric: BTreeMap<String, String>,
        /// Samples in backend order (ascending time).
        values: Vec<SampleTuple>,
    },
}

impl RawSample {
    /// Create an instant sample from label pairs.
    pub fn instant<K, V>(labels: impl IntoIterator<Item = (K, V)>, value: SampleTuple) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        RawSample::Instant {
            metric: collect_labels(labels),
            value,
        }
    }

    /// Create a range sample from label pairs.
    pub fn range<K, V>(labels: impl IntoIterator<Item = (K, V)>, values: Vec<SampleTuple>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        RawSample::Range {
            metric: collect_labels(labels),
            values,
        }
    }

    /// The series labels.
    pub fn metric(&self) -> &BTreeMap<String, String> {
        match self {
            RawSample::Instant { metric, .. } | RawSample::Range { metric, .. } => metric,
        }
    }

    /// Look up a single label value.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.metric().get(key).map(String::as_str)
    }

    /// All sample tuples, in backend order.
    pub fn tuples(&self) -> core::slice::Iter<'_, SampleTuple> {
        match self {
            RawSample::Instant { value, .. } => core::slice::from_ref(value).iter(),
            RawSample::Range { values, .. } => values.iter(),
        }
    }

    /// The most recent sample tuple, if any.
    pub fn latest(&self) -> Option<&SampleTuple> {
        match self {
            RawSample::Instant { value, .. } => Some(value),
            RawSample::Range { values, .. } => values.last(),
        }
    }
}

fn collect_labels<K, V>(labels: impl IntoIterator<Item = (K, V)>) -> BTreeMap<String, String>
where
    K: Into<String>,
    V: Into<String>,
{
    labels
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// A decoded backend response: the list of result entries.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawResponse {
    /// Result entries in backend order.
    pub results: Vec<RawSample>,
}

impl RawResponse {
    /// Create a response from result entries.
    pub fn new(results: Vec<RawSample>) -> Self {
        Self { results }
    }

    /// A response with no results.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check if the response has no results.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of result entries.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Iterate over result entries.
    pub fn iter(&self) -> impl Iterator<Item = &RawSample> {
        self.results.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn tuple_parses_to_point() {
        let p = SampleTuple::new(1_700_000_000.0, "0.3456").to_point().unwrap();
        assert_eq!(p.x, 1_700_000_000.0);
        assert!((p.y - 0.3456).abs() < 1e-12);
    }

    #[test]
    fn tuple_defects() {
        assert_eq!(
            SampleTuple::malformed().to_point(),
            Err(SampleDefect::MissingTimestamp)
        );
        let no_value = SampleTuple {
            timestamp: Some(1.0),
            value: None,
        };
        assert_eq!(no_value.to_point(), Err(SampleDefect::MissingValue));
        assert_eq!(
            SampleTuple::new(1.0, "abc").to_point(),
            Err(SampleDefect::NotANumber)
        );
        assert_eq!(
            SampleTuple::new(1.0, "NaN").to_point(),
            Err(SampleDefect::NotFinite)
        );
        assert_eq!(
            SampleTuple::new(1.0, "+Inf").to_point(),
            Err(SampleDefect::NotFinite)
        );
    }

    #[test]
    fn instant_tuples_and_latest() {
        let s = RawSample::instant([("device", "vda")], SampleTuple::new(5.0, "1"));
        assert_eq!(s.tuples().count(), 1);
        assert_eq!(s.latest(), Some(&SampleTuple::new(5.0, "1")));
        assert_eq!(s.label("device"), Some("vda"));
        assert_eq!(s.label("domain"), None);
    }

    #[test]
    fn range_latest_is_last() {
        let s = RawSample::range(
            [("domain", "d1")],
            vec![SampleTuple::new(1.0, "1"), SampleTuple::new(2.0, "2")],
        );
        assert_eq!(s.latest(), Some(&SampleTuple::new(2.0, "2")));

        let empty = RawSample::range([("domain", "d1")], vec![]);
        assert!(empty.latest().is_none());
        assert_eq!(empty.tuples().count(), 0);
    }

    #[test]
    fn empty_response() {
        let r = RawResponse::empty();
        assert!(r.is_empty());
        assert_eq!(r.len(), 0);
    }
}
