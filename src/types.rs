// src/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of the aggregator topic a source's readings are published on.
pub const READING_TOPIC_PREFIX: &str = "reading_";

/// Unique source identifier. Doubles as the name of the source's data queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse an announcement payload. Empty, padded or non UTF-8 bodies are
    /// not identifiers: the payload must name the source queue exactly.
    pub fn from_announcement(body: &[u8]) -> Option<Self> {
        let s = std::str::from_utf8(body).ok()?;
        if s.is_empty() || s.trim() != s {
            None
        } else {
            Some(Self(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Aggregator topic for this source's readings.
    pub fn reading_topic(&self) -> String {
        format!("{READING_TOPIC_PREFIX}{}", self.0)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One decoded sensor reading.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub source: SourceId,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    pub fn new(source: SourceId, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            source,
            value,
            timestamp,
        }
    }
}

/// What a source broadcasts at startup and on every discovery request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryAnnouncement {
    pub source: SourceId,
}

impl DiscoveryAnnouncement {
    pub fn new(source: SourceId) -> Self {
        Self { source }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.source.as_str().as_bytes().to_vec()
    }
}
