//! Boundary between the wire and the trackers.
//!
//! Every queue message is decoded here. Anything that is not a well-formed
//! reading is turned into a [`RejectReason`] so trackers only ever see finite
//! temperatures.

use crate::reading::{Reading, TIMESTAMP_CAPACITY, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON envelope published once per reading per stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub timestamp: String,
    pub value: f64,
}

impl Envelope {
    pub fn new(timestamp: impl Into<String>, value: f64) -> Self {
        Self {
            timestamp: timestamp.into(),
            value,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

// Inbound shape is looser than what we publish: older producers sent the
// temperature as a string and some omit it entirely.
#[derive(Deserialize)]
struct InboundEnvelope {
    timestamp: String,
    #[serde(default)]
    value: Option<InboundValue>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InboundValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectReason {
    #[error("undecodable envelope: {0}")]
    Undecodable(String),
    #[error("envelope has no temperature value")]
    MissingValue,
    #[error("temperature `{0}` is not a number")]
    NonNumeric(String),
    #[error("temperature {0} is not finite")]
    NonFinite(f64),
    #[error("timestamp is longer than {} bytes", TIMESTAMP_CAPACITY)]
    TimestampTooLong,
}

/// Outcome of decoding one queue message.
#[derive(Debug, Clone, PartialEq)]
pub enum Ingress {
    Accepted(Reading),
    Rejected(RejectReason),
}

impl Ingress {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Ingress::Accepted(_))
    }
}

pub fn decode(payload: &[u8]) -> Ingress {
    match parse(payload) {
        Ok(reading) => Ingress::Accepted(reading),
        Err(reason) => Ingress::Rejected(reason),
    }
}

fn parse(payload: &[u8]) -> Result<Reading, RejectReason> {
    let envelope: InboundEnvelope =
        serde_json::from_slice(payload).map_err(|e| RejectReason::Undecodable(e.to_string()))?;

    let temperature = match envelope.value.ok_or(RejectReason::MissingValue)? {
        InboundValue::Number(v) => v,
        InboundValue::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| RejectReason::NonNumeric(text.clone()))?,
    };
    if !temperature.is_finite() {
        return Err(RejectReason::NonFinite(temperature));
    }

    let timestamp = Timestamp::new(envelope.timestamp.trim()).ok_or(RejectReason::TimestampTooLong)?;
    Ok(Reading::new(timestamp, temperature))
}
