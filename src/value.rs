//! Scalar values accepted by the instrumented cache
//!
//! Values are written to the store the way a Redis client would write them:
//! text as UTF-8, bytes unchanged, numbers as their decimal text. Reading
//! therefore always yields raw bytes and the caller picks a decoder.
//!
//! Floats always keep a float marker (`1.0`, `1e-9`, `NaN`, `inf`), so a
//! stored float never reads back as an integer.

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// One of the four value kinds the cache stores
///
/// Serializes as a bare JSON value. JSON has no NaN or infinity, so those
/// floats render as the strings `"NaN"`, `"inf"` and `"-inf"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Integer(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Scalar {
    /// Name of the kind, for logs and errors
    pub fn kind(&self) -> &'static str {
        match self {
            Scalar::Text(_) => "text",
            Scalar::Bytes(_) => "bytes",
            Scalar::Integer(_) => "integer",
            Scalar::Float(_) => "float",
        }
    }

    /// Encode into the store's native byte representation
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Scalar::Text(s) => s.as_bytes().to_vec(),
            Scalar::Bytes(b) => b.clone(),
            Scalar::Integer(i) => i.to_string().into_bytes(),
            Scalar::Float(f) => format!("{:?}", f).into_bytes(),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Scalar::Integer(i) => serializer.serialize_i64(*i),
            Scalar::Float(f) if f.is_nan() => serializer.serialize_str("NaN"),
            Scalar::Float(f) if f.is_infinite() => {
                serializer.serialize_str(if *f > 0.0 { "inf" } else { "-inf" })
            }
            Scalar::Float(f) => serializer.serialize_f64(*f),
            Scalar::Text(s) => serializer.serialize_str(s),
            Scalar::Bytes(b) => b.serialize(serializer),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(s) => write!(f, "{}", s),
            Scalar::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{:?}", x),
        }
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Scalar {
    fn from(b: Vec<u8>) -> Self {
        Scalar::Bytes(b)
    }
}

impl From<&[u8]> for Scalar {
    fn from(b: &[u8]) -> Self {
        Scalar::Bytes(b.to_vec())
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Integer(i)
    }
}

impl From<i32> for Scalar {
    fn from(i: i32) -> Self {
        Scalar::Integer(i64::from(i))
    }
}

impl From<f64> for Scalar {
    fn from(f: f64) -> Self {
        Scalar::Float(f)
    }
}

/// Decode raw bytes as UTF-8 text
pub fn decode_text(raw: Vec<u8>) -> Result<String> {
    String::from_utf8(raw).map_err(|e| CacheError::decode("text", e))
}

/// Decode raw bytes as a base-10 integer
pub fn decode_integer(raw: Vec<u8>) -> Result<i64> {
    let text = std::str::from_utf8(&raw).map_err(|e| CacheError::decode("integer", e))?;
    text.trim()
        .parse::<i64>()
        .map_err(|e| CacheError::decode("integer", e))
}

/// Decode raw bytes as a floating-point number
pub fn decode_float(raw: Vec<u8>) -> Result<f64> {
    let text = std::str::from_utf8(&raw).map_err(|e| CacheError::decode("float", e))?;
    text.trim()
        .parse::<f64>()
        .map_err(|e| CacheError::decode("float", e))
}
