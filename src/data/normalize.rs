//! Conversion of raw backend responses into chart-ready data.
//!
//! All functions here are pure: they never fail and never touch the network.
//! Malformed tuples are skipped (and counted at `debug` level); an empty input
//! yields an empty output.

use std::slice;

use serde::Serialize;
use tracing::debug;
use vmwatch_types::{Point, RawResponse, RawSample, SampleDefect, SampleTuple, Series, SeriesSet};

use crate::error::MonitorError;

/// Number of points in a synthetic placeholder series.
pub const SYNTHETIC_POINTS: usize = 61;

/// Spacing of synthetic points, in seconds.
pub const SYNTHETIC_STEP_SECS: u64 = 60;

/// Picks one value out of an instant response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InstantSelector {
    /// Index of the result within the first response.
    pub index: usize,
    /// Multiplier applied to the value.
    pub scale: f64,
}

impl Default for InstantSelector {
    fn default() -> Self {
        Self {
            index: 0,
            scale: 1.0,
        }
    }
}

impl InstantSelector {
    /// Select the first result, scaled.
    pub fn scaled(scale: f64) -> Self {
        Self { index: 0, scale }
    }
}

/// Take the latest sample of the selected result of the first response.
///
/// Returns zero or one point.
pub fn normalize_instant(responses: &[RawResponse], selector: &InstantSelector) -> Vec<Point> {
    let Some(sample) = responses
        .first()
        .and_then(|response| response.results.get(selector.index))
    else {
        return Vec::new();
    };

    let Some(tuple) = sample.latest() else {
        return Vec::new();
    };

    match transformed(tuple, |y| y * selector.scale) {
        Ok(point) => vec![point],
        Err(defect) => {
            debug!(error = %MonitorError::from(defect), "Skipping instant sample");
            Vec::new()
        }
    }
}

/// How to turn a set of responses into named series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesOptions {
    /// Series base names, one per response. Missing entries fall back to the
    /// response index.
    pub rename: Vec<String>,
    /// Label that splits a response into one series per value (e.g.
    /// `target_device`).
    pub device_label_key: Option<String>,
    /// Multiplier applied to every value.
    pub scale: f64,
    /// Decimal places to round to.
    pub precision: Option<u32>,
    /// Whether this card may show placeholder data when nothing came back.
    pub synthetic_fallback: bool,
}

impl Default for SeriesOptions {
    fn default() -> Self {
        Self {
            rename: Vec::new(),
            device_label_key: None,
            scale: 1.0,
            precision: None,
            synthetic_fallback: false,
        }
    }
}

impl SeriesOptions {
    /// Set the series base names.
    pub fn rename<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rename = names.into_iter().map(Into::into).collect();
        self
    }

    /// Split series by the given label.
    pub fn split_by(mut self, label: impl Into<String>) -> Self {
        self.device_label_key = Some(label.into());
        self
    }

    /// Multiply values by `scale`.
    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Round values to `digits` decimal places.
    pub fn precision(mut self, digits: u32) -> Self {
        self.precision = Some(digits);
        self
    }

    /// Mark the card as eligible for synthetic fallback.
    pub fn synthetic_fallback(mut self) -> Self {
        self.synthetic_fallback = true;
        self
    }

    fn base_name(&self, index: usize) -> String {
        self.rename
            .get(index)
            .cloned()
            .unwrap_or_else(|| index.to_string())
    }

    fn transform(&self, y: f64) -> f64 {
        let y = y * self.scale;
        match self.precision {
            Some(digits) => round_to(y, digits),
            None => y,
        }
    }
}

/// Turn every result of every response into named series.
///
/// Series appear in first-seen order. A series is created by its first valid
/// point, so a result made only of malformed tuples produces nothing.
pub fn normalize_series(responses: &[RawResponse], options: &SeriesOptions) -> SeriesSet {
    let mut set = SeriesSet::new();
    let mut skipped = 0usize;

    for (index, response) in responses.iter().enumerate() {
        let base = options.base_name(index);

        for sample in &response.results {
            let name = match options
                .device_label_key
                .as_deref()
                .and_then(|key| sample.label(key))
            {
                Some(device) => format!("{base}-{device}"),
                None => base.clone(),
            };

            let tuples: &[SampleTuple] = match sample {
                RawSample::Instant { value, .. } => slice::from_ref(value),
                RawSample::Range { values, .. } => values,
            };

            for tuple in tuples {
                match transformed(tuple, |y| options.transform(y)) {
                    Ok(point) => set.push(&name, point),
                    Err(_) => skipped += 1,
                }
            }
        }
    }

    if skipped > 0 {
        debug!(skipped, "Skipped malformed samples");
    }
    set
}

/// Parse a tuple and map its value, rejecting results that overflow.
fn transformed(tuple: &SampleTuple, f: impl Fn(f64) -> f64) -> Result<Point, SampleDefect> {
    let point = tuple.to_point()?;
    let y = f(point.y);
    if !y.is_finite() {
        return Err(SampleDefect::NotFinite);
    }
    Ok(Point::new(point.x, y))
}

/// Placeholder series for a card that received no data.
///
/// 61 points one minute apart, ending at `now`, with values between 30 and 70.
/// The shape is deterministic so repeated renders do not flicker.
pub fn synthetic_series(name: &str, now: u64) -> SeriesSet {
    let start = now.saturating_sub(SYNTHETIC_STEP_SECS * (SYNTHETIC_POINTS as u64 - 1));
    let points = (0..SYNTHETIC_POINTS)
        .map(|i| {
            let x = (start + i as u64 * SYNTHETIC_STEP_SECS) as f64;
            let y = round_to(50.0 + 20.0 * (i as f64 * 0.3).sin(), 2);
            Point::new(x, y)
        })
        .collect();
    SeriesSet::synthetic(vec![Series::with_points(name, points)])
}

/// Round to a number of decimal places.
pub fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

/// Normalization recipe attached to a card.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Normalize {
    /// A single current value.
    Instant(InstantSelector),
    /// One or more time series.
    Series(SeriesOptions),
}

/// Deployment-level inputs to normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeContext {
    /// Whether placeholder data may be shown at all.
    pub allow_synthetic: bool,
    /// Current unix time, in seconds.
    pub now: u64,
}

/// Normalized data for one card.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardData {
    /// Zero or one current value.
    Value(Vec<Point>),
    /// Time series.
    Series(SeriesSet),
}

impl CardData {
    /// Check if the card has nothing to show.
    pub fn is_empty(&self) -> bool {
        match self {
            CardData::Value(points) => points.is_empty(),
            CardData::Series(set) => set.is_empty(),
        }
    }

    /// Check if the card shows placeholder data.
    pub fn is_synthetic(&self) -> bool {
        match self {
            CardData::Value(_) => false,
            CardData::Series(set) => set.is_synthetic(),
        }
    }
}

impl Normalize {
    /// Apply the recipe to a card's responses.
    pub fn apply(&self, responses: &[RawResponse], ctx: &NormalizeContext) -> CardData {
        match self {
            Normalize::Instant(selector) => CardData::Value(normalize_instant(responses, selector)),
            Normalize::Series(options) => {
                let set = normalize_series(responses, options);
                if set.is_empty() && options.synthetic_fallback && ctx.allow_synthetic {
                    let name = options.rename.first().map(String::as_str).unwrap_or("0");
                    debug!(series = name, "No data, using synthetic series");
                    CardData::Series(synthetic_series(name, ctx.now))
                } else {
                    CardData::Series(set)
                }
            }
        }
    }
}
