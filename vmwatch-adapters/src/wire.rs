//! Decoding of the Prometheus HTTP API response format.
//!
//! ```json
//! {"status": "success",
//!  "data": {"resultType": "matrix",
//!           "result": [{"metric": {"domain": "d1"}, "values": [[1700000000, "0.5"]]}]}}
//! ```
//!
//! Each result entry is classified once here: entries carrying `values` (or a
//! `value` whose first element is itself a tuple) become
//! [`RawSample::Range`], entries carrying a single `value` become
//! [`RawSample::Instant`]. Entries carrying neither are dropped.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use vmwatch_types::{RawResponse, RawSample, SampleTuple};

use crate::AdapterError;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    data: Option<ApiData>,
    #[serde(default, rename = "errorType")]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    #[serde(default, rename = "resultType")]
    result_type: String,
    #[serde(default)]
    result: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResult {
    #[serde(default)]
    metric: BTreeMap<String, Value>,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    values: Option<Vec<Value>>,
}

/// Decode a raw response body.
pub fn decode_response(body: &[u8]) -> Result<RawResponse, AdapterError> {
    let response: ApiResponse = serde_json::from_slice(body)?;
    from_api(response)
}

/// Decode an already-parsed JSON value.
pub fn decode_value(value: Value) -> Result<RawResponse, AdapterError> {
    let response: ApiResponse = serde_json::from_value(value)?;
    from_api(response)
}

/// Extract the backend's error message from a non-success body, if it has one.
pub(crate) fn error_message(body: &[u8]) -> Option<String> {
    let response: ApiResponse = serde_json::from_slice(body).ok()?;
    if response.status == "success" {
        return None;
    }
    Some(describe_error(&response))
}

fn describe_error(response: &ApiResponse) -> String {
    match (&response.error_type, &response.error) {
        (Some(kind), Some(msg)) => format!("{}: {}", kind, msg),
        (None, Some(msg)) => msg.clone(),
        (Some(kind), None) => kind.clone(),
        (None, None) => format!("backend returned status {}", response.status),
    }
}

fn from_api(response: ApiResponse) -> Result<RawResponse, AdapterError> {
    if response.status != "success" {
        return Err(AdapterError::Query(describe_error(&response)));
    }

    let Some(data) = response.data else {
        return Ok(RawResponse::empty());
    };

    match data.result_type.as_str() {
        // Scalars and strings are a bare [ts, "v"] tuple with no labels.
        "scalar" | "string" => Ok(RawResponse::new(vec![RawSample::Instant {
            metric: BTreeMap::new(),
            value: to_tuple(&data.result),
        }])),
        _ => {
            let entries = match data.result {
                Value::Array(entries) => entries,
                Value::Null => Vec::new(),
                other => {
                    return Err(AdapterError::Parse(format!(
                        "expected result list, got {}",
                        other
                    )))
                }
            };

            let mut results = Vec::with_capacity(entries.len());
            for entry in entries {
                match serde_json::from_value::<ApiResult>(entry) {
                    Ok(result) => {
                        if let Some(sample) = classify(result) {
                            results.push(sample);
                        }
                    }
                    Err(e) => debug!("dropping undecodable result entry: {}", e),
                }
            }
            Ok(RawResponse::new(results))
        }
    }
}

fn classify(result: ApiResult) -> Option<RawSample> {
    let metric = result
        .metric
        .into_iter()
        .map(|(k, v)| {
            let v = match v {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (k, v)
        })
        .collect();

    if let Some(values) = result.values {
        return Some(RawSample::Range {
            metric,
            values: values.iter().map(to_tuple).collect(),
        });
    }

    match result.value {
        Some(Value::Array(items)) if items.first().is_some_and(Value::is_array) => {
            Some(RawSample::Range {
                metric,
                values: items.iter().map(to_tuple).collect(),
            })
        }
        Some(value) => Some(RawSample::Instant {
            metric,
            value: to_tuple(&value),
        }),
        None => {
            debug!("dropping result entry with neither value nor values");
            None
        }
    }
}

fn to_tuple(value: &Value) -> SampleTuple {
    let Value::Array(items) = value else {
        return SampleTuple::malformed();
    };

    let timestamp = items.first().and_then(|t| match t {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    });
    let value = items.get(1).and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });

    SampleTuple { timestamp, value }
}
