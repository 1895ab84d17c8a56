use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DpidError {
    #[error("empty dpid")]
    Empty,
    #[error("invalid dpid {0:?}: expected hexadecimal")]
    NotHex(String),
}

/// Strip leading zeros for display. An all-zero string collapses to `""`.
pub fn trim_zero(s: &str) -> &str {
    s.trim_start_matches('0')
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Parse a hex device id into its integer form (the key used by the
/// flow-statistics endpoint).
pub fn dpid_to_int(dpid: &str) -> Result<u64, DpidError> {
    let s = dpid.trim();
    if s.is_empty() {
        return Err(DpidError::Empty);
    }
    let digits = strip_hex_prefix(s);
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) || digits.is_empty() {
        return Err(DpidError::NotHex(dpid.to_string()));
    }
    // Fixed-width dpids are 16 hex digits; longer zero padding is still fine.
    let significant = trim_zero(digits);
    if significant.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(significant, 16).map_err(|_| DpidError::NotHex(dpid.to_string()))
}

/// Datapath identifier.
///
/// Keeps the text exactly as the backend sent it (labels and replies echo it)
/// while equality, hashing and ordering use the parsed numeric value, so
/// `"0000000000000001"` and `"1"` name the same device.
#[derive(Clone)]
pub struct Dpid {
    raw: String,
    value: u64,
}

impl Dpid {
    /// A `0x` prefix is accepted and dropped from the kept text.
    pub fn parse(raw: &str) -> Result<Self, DpidError> {
        let value = dpid_to_int(raw)?;
        Ok(Self {
            raw: strip_hex_prefix(raw.trim()).to_string(),
            value,
        })
    }

    pub fn from_int(value: u64) -> Self {
        Self {
            raw: format!("{:016x}", value),
            value,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    /// Display label without padding zeros.
    pub fn trimmed(&self) -> &str {
        trim_zero(&self.raw)
    }
}

impl PartialEq for Dpid {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Dpid {}

impl Hash for Dpid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl PartialOrd for Dpid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Dpid {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl fmt::Debug for Dpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dpid({})", self.raw)
    }
}

impl fmt::Display for Dpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for Dpid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Dpid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Dpid::parse(&raw).map_err(serde::de::Error::custom)
    }
}
