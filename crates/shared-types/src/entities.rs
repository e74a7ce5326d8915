//! # Core Domain Entities
//!
//! Defines the telemetry ledger entities.
//!
//! ## Clusters
//!
//! - **Inbound**: `Reading`, `DeviceId`, `TrustTier`
//! - **Device State**: `DeviceState` (sticky-merged snapshot)
//! - **Ledger**: `Block`, `GENESIS_HASH`
//! - **Anti-Replay**: `SequenceRecord`

use crate::canonical::{normalize_measurement, CanonicalEncoder};
use crate::errors::EncodingError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// CLUSTER A: INBOUND
// =============================================================================

/// Identity of a field device. Also the `location` tag of its ledger blocks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// How much a channel's readings are trusted.
///
/// Recorded in every block and covered by its content hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrustTier {
    /// HMAC and sequence number verified before commit.
    #[default]
    Authenticated,
    /// Explicit opt-in: committed without verification.
    Unauthenticated,
}

impl TrustTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustTier::Authenticated => "authenticated",
            TrustTier::Unauthenticated => "unauthenticated",
        }
    }
}

impl fmt::Display for TrustTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single reading published by a device.
///
/// Every field is optional: absent or `null` means "no update". Unknown
/// status flags are kept in `extra` so they are both authenticated and
/// merged into the device snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_temp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_hum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lora_status: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dht_status: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_synced: Option<bool>,
    /// Anti-replay sequence number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    /// Hex HMAC-SHA256 tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmac: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Reading {
    /// Build a typed reading from a parsed payload object.
    ///
    /// # Errors
    ///
    /// - `EncodingError::InvalidPayload` if a known field has the wrong type
    /// - `EncodingError::ReservedField` if an unknown field is named like a
    ///   snapshot field (`remoteTemp`, `lastUpdate`, ...)
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self, EncodingError> {
        let reading: Reading = serde_json::from_value(Value::Object(payload.clone()))?;
        reading.check_extras()?;
        Ok(reading)
    }

    /// Unknown fields must not shadow a snapshot field: the flattened
    /// `DeviceState` would serialize the key twice.
    fn check_extras(&self) -> Result<(), EncodingError> {
        match self.extra.keys().find(|key| SNAPSHOT_FIELDS.contains(&key.as_str())) {
            Some(field) => Err(EncodingError::ReservedField {
                field: field.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Parse raw transport bytes into a payload object.
    pub fn parse_payload(bytes: &[u8]) -> Result<Map<String, Value>, EncodingError> {
        match serde_json::from_slice::<Value>(bytes)? {
            Value::Object(map) => Ok(map),
            _ => Err(EncodingError::NotAnObject),
        }
    }

    /// Whether the reading carries both anti-replay credentials.
    pub fn has_credentials(&self) -> bool {
        self.seq.is_some() && self.hmac.is_some()
    }
}

// =============================================================================
// CLUSTER B: DEVICE STATE
// =============================================================================

/// Serialized names of `DeviceState`'s own fields.
pub const SNAPSHOT_FIELDS: &[&str] = &[
    "remoteTemp",
    "remoteHum",
    "localTemp",
    "localHum",
    "loraStatus",
    "dhtStatus",
    "timeSynced",
    "lastUpdate",
];

/// Last-known values for one device, stored as the `data` of each block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_temp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_hum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_temp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_hum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lora_status: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dht_status: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_synced: Option<bool>,
    /// ISO-8601 time of the last accepted reading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl DeviceState {
    /// Sticky merge: present fields override, absent fields keep their
    /// previous value. Measurements are normalized on the way in, including
    /// those nested inside unknown fields, so the stored snapshot is exactly
    /// what gets hashed.
    ///
    /// # Errors
    ///
    /// - `EncodingError::ReservedField` if an unknown field shadows a
    ///   snapshot field
    /// - `EncodingError::NonNumericMeasurement` from normalizing extras
    pub fn merge(
        &self,
        encoder: &CanonicalEncoder,
        reading: &Reading,
        at: DateTime<Utc>,
    ) -> Result<DeviceState, EncodingError> {
        reading.check_extras()?;
        let mut next = self.clone();

        if let Some(v) = reading.temperature {
            next.remote_temp = Some(normalize_measurement(v));
        }
        if let Some(v) = reading.humidity {
            next.remote_hum = Some(normalize_measurement(v));
        }
        if let Some(v) = reading.local_temp {
            next.local_temp = Some(normalize_measurement(v));
        }
        if let Some(v) = reading.local_hum {
            next.local_hum = Some(normalize_measurement(v));
        }
        if reading.lora_status.is_some() {
            next.lora_status = reading.lora_status;
        }
        if reading.dht_status.is_some() {
            next.dht_status = reading.dht_status;
        }
        if reading.time_synced.is_some() {
            next.time_synced = reading.time_synced;
        }
        let present: Map<String, Value> = reading
            .extra
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        next.extra.extend(encoder.normalized(&present)?);

        next.last_update = Some(format_timestamp(&at));
        Ok(next)
    }

    /// Snapshot as a JSON object, the form that is canonically encoded.
    pub fn to_object(&self) -> Result<Map<String, Value>, EncodingError> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(EncodingError::NotAnObject),
        }
    }
}

// =============================================================================
// CLUSTER C: LEDGER
// =============================================================================

/// `previousHash` of block 0. No SHA-256 output is expected to equal it.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// One entry of the hash-linked ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    #[serde(with = "timestamp_millis")]
    pub timestamp: DateTime<Utc>,
    pub location: DeviceId,
    #[serde(default)]
    pub trust: TrustTier,
    pub data: DeviceState,
    pub previous_hash: String,
    pub hash: String,
}

impl Block {
    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }
}

/// RFC 3339 with millisecond precision and a `Z` suffix.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time truncated to what `format_timestamp` keeps, so a block
/// read back from storage hashes exactly as it did when created.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

mod timestamp_millis {
    use super::format_timestamp;
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(D::Error::custom)
    }
}

// =============================================================================
// CLUSTER D: ANTI-REPLAY
// =============================================================================

/// Next expected sequence number for every known device.
///
/// Persisted wholesale as `{ "<deviceId>": <nextExpectedSeq>, ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceRecord(pub BTreeMap<DeviceId, u64>);

impl SequenceRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next expected sequence number; 0 for a device never accepted.
    pub fn expected(&self, device: &DeviceId) -> u64 {
        self.0.get(device).copied().unwrap_or(0)
    }

    pub fn contains(&self, device: &DeviceId) -> bool {
        self.0.contains_key(device)
    }

    /// Record acceptance of `seq`. Never moves a device backwards.
    /// Returns the previous entry so a failed persist can revert it.
    ///
    /// Callers keep `seq` below `u64::MAX`; at the ceiling the expected
    /// value cannot move past the accepted one.
    pub fn advance(&mut self, device: &DeviceId, seq: u64) -> Option<u64> {
        let next = seq.saturating_add(1);
        let previous = self.0.get(device).copied();
        let value = previous.map_or(next, |p| p.max(next));
        self.0.insert(device.clone(), value);
        previous
    }

    /// Undo an `advance` using the value it returned.
    pub fn restore(&mut self, device: &DeviceId, previous: Option<u64>) {
        match previous {
            Some(value) => {
                self.0.insert(device.clone(), value);
            }
            None => {
                self.0.remove(device);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
