//! # Canonical Encoder
//!
//! Deterministic, order-independent serialization of structured readings.
//! The output is the input to both the device HMAC tag and the ledger
//! content hash.
//!
//! ## Encoding Rules
//!
//! - Objects are emitted as compact JSON with keys in byte-wise sorted order,
//!   recursively.
//! - Declared measurement fields are normalized to `MEASUREMENT_DECIMALS`
//!   decimal places and always printed with exactly that many digits, so
//!   `21.95`, `21.950000001` and `22` from a device all encode alike when
//!   they normalize to the same value.
//! - Integers are printed as integers; other floats use the shortest
//!   round-trip representation.
//! - Strings and keys use JSON escaping.
//!
//! Equal logical content therefore yields byte-identical output regardless
//! of field insertion order.

use crate::errors::EncodingError;
use serde_json::{Map, Number, Value};
use std::collections::BTreeSet;
use std::fmt::Write;

/// Decimal places kept for physical measurements.
pub const MEASUREMENT_DECIMALS: u32 = 1;

/// Measurement keys known to the telemetry pipeline, both inbound
/// (`temperature`, `humidity`) and in device snapshots (`remoteTemp`, ...).
pub const TELEMETRY_MEASUREMENT_FIELDS: &[&str] = &[
    "temperature",
    "humidity",
    "localTemp",
    "localHum",
    "remoteTemp",
    "remoteHum",
];

/// Round a measurement to `MEASUREMENT_DECIMALS` places, half away from zero.
///
/// Non-finite intermediate results leave the value untouched. Negative zero
/// collapses to zero so it cannot produce a distinct encoding.
pub fn normalize_measurement(value: f64) -> f64 {
    let scale = 10f64.powi(MEASUREMENT_DECIMALS as i32);
    let scaled = value * scale;
    if !scaled.is_finite() {
        return value;
    }
    (scaled.round() / scale) + 0.0
}

/// Canonical encoder with a declared set of measurement fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalEncoder {
    measurement_fields: BTreeSet<String>,
}

impl CanonicalEncoder {
    /// Create an encoder that normalizes the given keys wherever they appear.
    pub fn new<I, S>(measurement_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            measurement_fields: measurement_fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Encoder for the telemetry field set.
    pub fn telemetry() -> Self {
        Self::new(TELEMETRY_MEASUREMENT_FIELDS.iter().copied())
    }

    /// Whether `key` is normalized as a measurement.
    pub fn is_measurement(&self, key: &str) -> bool {
        self.measurement_fields.contains(key)
    }

    /// Encode a key/value object.
    ///
    /// # Errors
    ///
    /// `EncodingError::NonNumericMeasurement` if a declared measurement key
    /// holds anything but a number or `null`.
    pub fn encode_object(&self, object: &Map<String, Value>) -> Result<Vec<u8>, EncodingError> {
        let mut out = String::with_capacity(64);
        self.write_object(object, &mut out)?;
        Ok(out.into_bytes())
    }

    /// Encode any JSON value. Only objects get measurement normalization of
    /// their members; a bare number is encoded as-is.
    pub fn encode_value(&self, value: &Value) -> Result<Vec<u8>, EncodingError> {
        let mut out = String::with_capacity(64);
        self.write_value(value, &mut out)?;
        Ok(out.into_bytes())
    }

    /// Check that every measurement in `object` (recursively) is already in
    /// normal form. Stored data that fails this check could be altered
    /// without changing its encoding.
    pub fn is_normalized(&self, object: &Map<String, Value>) -> bool {
        object.iter().all(|(key, value)| match value {
            Value::Number(n) if self.is_measurement(key) => n
                .as_f64()
                .map(|v| normalize_measurement(v) == v)
                .unwrap_or(false),
            Value::Number(_) => true,
            other => self.is_normalized_value(other),
        })
    }

    fn is_normalized_value(&self, value: &Value) -> bool {
        match value {
            Value::Object(inner) => self.is_normalized(inner),
            Value::Array(items) => items.iter().all(|item| self.is_normalized_value(item)),
            _ => true,
        }
    }

    /// Return a copy of `object` with every measurement normalized, at any
    /// depth of nested objects and arrays.
    pub fn normalized(&self, object: &Map<String, Value>) -> Result<Map<String, Value>, EncodingError> {
        let mut out = Map::new();
        for (key, value) in object {
            let value = match value {
                Value::Number(n) if self.is_measurement(key) => {
                    let v = n.as_f64().ok_or_else(|| EncodingError::NonNumericMeasurement {
                        field: key.clone(),
                    })?;
                    Number::from_f64(normalize_measurement(v))
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
                Value::Null => Value::Null,
                _ if self.is_measurement(key) => {
                    return Err(EncodingError::NonNumericMeasurement { field: key.clone() })
                }
                other => self.normalized_value(other)?,
            };
            out.insert(key.clone(), value);
        }
        Ok(out)
    }

    fn normalized_value(&self, value: &Value) -> Result<Value, EncodingError> {
        match value {
            Value::Object(inner) => Ok(Value::Object(self.normalized(inner)?)),
            Value::Array(items) => items
                .iter()
                .map(|item| self.normalized_value(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    fn write_object(&self, object: &Map<String, Value>, out: &mut String) -> Result<(), EncodingError> {
        let mut keys: Vec<&String> = object.keys().collect();
        keys.sort_unstable();

        out.push('{');
        for (i, key) in keys.into_iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write_string(key, out);
            out.push(':');

            let value = &object[key.as_str()];
            if self.is_measurement(key) {
                match value {
                    Value::Number(n) => write_measurement(n, out),
                    Value::Null => out.push_str("null"),
                    _ => {
                        return Err(EncodingError::NonNumericMeasurement { field: key.clone() })
                    }
                }
            } else {
                self.write_value(value, out)?;
            }
        }
        out.push('}');
        Ok(())
    }

    fn write_value(&self, value: &Value, out: &mut String) -> Result<(), EncodingError> {
        match value {
            Value::Null => out.push_str("null"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Number(n) => write_number(n, out),
            Value::String(s) => write_string(s, out),
            Value::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    self.write_value(item, out)?;
                }
                out.push(']');
            }
            Value::Object(object) => self.write_object(object, out)?,
        }
        Ok(())
    }
}

impl Default for CanonicalEncoder {
    fn default() -> Self {
        Self::telemetry()
    }
}

fn write_measurement(n: &Number, out: &mut String) {
    // as_f64 is always Some for serde_json numbers without arbitrary_precision
    let v = normalize_measurement(n.as_f64().unwrap_or(0.0));
    let _ = write!(out, "{:.*}", MEASUREMENT_DECIMALS as usize, v);
}

fn write_number(n: &Number, out: &mut String) {
    if let Some(u) = n.as_u64() {
        let _ = write!(out, "{}", u);
    } else if let Some(i) = n.as_i64() {
        let _ = write!(out, "{}", i);
    } else {
        let _ = write!(out, "{}", n);
    }
}

fn write_string(s: &str, out: &mut String) {
    // serde_json string escaping cannot fail for &str
    match serde_json::to_string(s) {
        Ok(escaped) => out.push_str(&escaped),
        Err(_) => out.push_str("\"\""),
    }
}
