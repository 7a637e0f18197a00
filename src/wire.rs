// src/wire.rs
//! Wire schema for readings travelling over a source queue.
//!
//! Readings are MessagePack maps (via `rmp-serde`) with named fields, so the
//! encoding is self-describing and keeps the field types: `Name` is a string,
//! `Value` a 64-bit float and `Timestamp` an RFC 3339 instant with nanosecond
//! precision. `v` pins the schema version; anything else fails to decode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::types::{Reading, SourceId};

pub const WIRE_SCHEMA_VERSION: u16 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SensorMessage {
    v: u16,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Value")]
    value: f64,
    #[serde(rename = "Timestamp")]
    timestamp: DateTime<Utc>,
}

/// Encode a reading for publication on its source queue.
pub fn encode_reading(reading: &Reading) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    let msg = SensorMessage {
        v: WIRE_SCHEMA_VERSION,
        name: reading.source.as_str().to_string(),
        value: reading.value,
        timestamp: reading.timestamp,
    };
    rmp_serde::to_vec_named(&msg)
}

/// Decode one queue message into a reading.
pub fn decode_reading(bytes: &[u8]) -> Result<Reading, DecodeError> {
    let msg: SensorMessage = rmp_serde::from_slice(bytes)?;
    if msg.v != WIRE_SCHEMA_VERSION {
        return Err(DecodeError::SchemaMismatch {
            expected: WIRE_SCHEMA_VERSION,
            found: msg.v,
        });
    }
    Ok(Reading {
        source: SourceId::new(msg.name),
        value: msg.value,
        timestamp: msg.timestamp,
    })
}
