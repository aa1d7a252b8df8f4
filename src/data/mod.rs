//! Data processing for backend responses.
//!
//! This module turns raw backend responses into chart-ready points and
//! series, and formats values for display.
//!
//! ## Submodules
//!
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "60s", "1h")
//! - [`normalize`]: Instant and series normalization, synthetic fallback
//! - [`units`]: Human-readable value formatting ([`ValueFormat`])
//!
//! ## Data Flow
//!
//! ```text
//! RawResponse (per query template)
//!        │
//!        ▼
//! Normalize::apply()
//!        │
//!        ├──▶ CardData::Value  (normalize_instant, top cards)
//!        │
//!        └──▶ CardData::Series (normalize_series, trend cards)
//! ```

pub mod duration;
pub mod normalize;
pub mod units;

pub use normalize::{
    normalize_instant, normalize_series, synthetic_series, CardData, InstantSelector, Normalize,
    NormalizeContext, SeriesOptions,
};
pub use units::ValueFormat;
