//! Named-operation dispatch.
//!
//! External callers invoke operations by name with an optional JSON payload and get a
//! JSON value back. The set of operations is a fixed table; an unknown name produces
//! an error object instead of a panic or a missing response.

use crate::error::{AppResult, DaqError};
use crate::poller::SensorPoller;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Operations exposed to external callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Run one poll cycle and return the record.
    ReadSensors,
    /// Store ambient pressure offsets.
    ZeroPressure,
    /// Open the test valve.
    OpenValve,
    /// Close the test valve.
    CloseValve,
}

/// Name table, in the order operations are listed to callers.
pub const OPERATIONS: &[(&str, Operation)] = &[
    ("read_sensors", Operation::ReadSensors),
    ("zero_pressure", Operation::ZeroPressure),
    ("open_valve", Operation::OpenValve),
    ("close_valve", Operation::CloseValve),
];

impl Operation {
    /// Wire name.
    pub fn name(self) -> &'static str {
        OPERATIONS
            .iter()
            .find(|(_, op)| *op == self)
            .map_or("unknown", |(name, _)| name)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = DaqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OPERATIONS
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, op)| *op)
            .ok_or_else(|| DaqError::OperationNotFound(s.to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ZeroPayload {
    Bare(Vec<f64>),
    Wrapped { pressure: Vec<f64> },
}

impl ZeroPayload {
    fn into_samples(self) -> Vec<f64> {
        match self {
            Self::Bare(samples) | Self::Wrapped { pressure: samples } => samples,
        }
    }
}

fn zero_samples(payload: Option<Value>) -> AppResult<Vec<f64>> {
    let payload = payload.ok_or_else(|| {
        DaqError::InvalidPayload("zero_pressure requires a list of pressure samples".into())
    })?;
    let parsed: ZeroPayload = serde_json::from_value(payload)
        .map_err(|e| DaqError::InvalidPayload(format!("zero_pressure: {e}")))?;
    Ok(parsed.into_samples())
}

fn error_response(e: &DaqError) -> Value {
    json!({ "error": e.to_string() })
}

/// Run operation `name` against `poller` and build its JSON response.
///
/// Responses:
/// - `read_sensors`: the serialized record
/// - `zero_pressure`: `{"success": bool}`
/// - `open_valve` / `close_valve`: `{"valve_open": bool}`
/// - failures: `{"error": "..."}`
pub async fn dispatch(poller: &mut SensorPoller, name: &str, payload: Option<Value>) -> Value {
    let operation = match name.parse::<Operation>() {
        Ok(op) => op,
        Err(e) => {
            tracing::warn!(operation = name, "unknown operation requested");
            return error_response(&e);
        }
    };
    tracing::debug!(%operation, "dispatching");

    match operation {
        Operation::ReadSensors => {
            let record = poller.read_sensors().await;
            serde_json::to_value(&record).unwrap_or_else(|e| error_response(&DaqError::from(e)))
        }
        Operation::ZeroPressure => match zero_samples(payload) {
            Ok(samples) => json!({ "success": poller.zero_pressure(&samples) }),
            Err(e) => error_response(&e),
        },
        Operation::OpenValve => match poller.open_valve().await {
            Ok(open) => json!({ "valve_open": open }),
            Err(e) => error_response(&e),
        },
        Operation::CloseValve => match poller.close_valve().await {
            Ok(open) => json!({ "valve_open": open }),
            Err(e) => error_response(&e),
        },
    }
}
