//! Session identifiers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique session identifier.
///
/// Format: `sess_{timestamp_ms}_{random_hex}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId {
    timestamp: DateTime<Utc>,
    random: [u8; 8],
}

impl SessionId {
    /// Generate a new session ID.
    pub fn new() -> Self {
        let mut random = [0u8; 8];
        random.copy_from_slice(&Uuid::new_v4().as_bytes()[..8]);

        // Millisecond precision so the string form round-trips
        let now = Utc::now();
        let timestamp = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);

        Self { timestamp, random }
    }

    /// When the session was created.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Parse a session ID from its string form.
    pub fn parse(s: &str) -> Option<Self> {
        let rest = s.strip_prefix("sess_")?;
        let (millis, random_hex) = rest.split_once('_')?;

        let timestamp = DateTime::from_timestamp_millis(millis.parse().ok()?)?;
        let bytes = hex::decode(random_hex).ok()?;
        let random: [u8; 8] = bytes.try_into().ok()?;

        Some(Self { timestamp, random })
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sess_{}_{}",
            self.timestamp.timestamp_millis(),
            hex::encode(self.random)
        )
    }
}

// Stored as the plain string form
impl Serialize for SessionId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SessionId::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid session id '{}'", s)))
    }
}
