//! # vmwatch-types
//!
//! Core types for instance monitoring. This crate defines the shapes that flow
//! between a metrics backend, the response normalizer and whatever renders
//! the charts.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable the `serde` feature to export chart data as JSON
//! - **Tagged shapes**: Backend samples are either [`RawSample::Instant`] or
//!   [`RawSample::Range`], decided once when a response is ingested
//! - **Honest data**: Chart series carry a [`Provenance`] so synthetic
//!   placeholder data can never be mistaken for observed samples
//!
//! ## Features
//!
//! - `std` (default): Standard library support (wall-clock time ranges)
//! - `serde`: JSON/etc. serialization via serde
//!
//! ## Example
//!
//! ```rust
//! use vmwatch_types::{RawResponse, RawSample, SampleTuple};
//!
//! let response = RawResponse::new(vec![RawSample::range(
//!     [("domain", "instance-0000002a")],
//!     vec![SampleTuple::new(1_700_000_000.0, "0.25"), SampleTuple::new(1_700_000_060.0, "0.5")],
//! )]);
//!
//! assert_eq!(response.len(), 1);
//! assert_eq!(response.results[0].tuples().count(), 2);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod point;
mod range;
mod sample;
mod state;

pub use point::*;
pub use range::*;
pub use sample::*;
pub use state::*;

/// Set of device labels (e.g. `vda`, `vdb`) discovered for a domain.
pub type DeviceSet = alloc::collections::BTreeSet<alloc::string::String>;
