use bytemuck::{Pod, Zeroable};
use std::fmt;

/// Longest timestamp, in bytes, a [`Reading`] can carry inline.
pub const TIMESTAMP_CAPACITY: usize = 47;

/// An opaque timestamp stored inline so readings stay `Copy`.
///
/// The core never interprets it; it is carried through to alert messages and
/// logs exactly as the producer sent it.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, PartialEq, Eq)]
pub struct Timestamp {
    len: u8,
    bytes: [u8; TIMESTAMP_CAPACITY],
}

impl Timestamp {
    /// Returns `None` when `value` does not fit inline.
    pub fn new(value: &str) -> Option<Self> {
        if value.len() > TIMESTAMP_CAPACITY {
            return None;
        }
        let mut bytes = [0u8; TIMESTAMP_CAPACITY];
        bytes[..value.len()].copy_from_slice(value.as_bytes());
        Some(Self {
            len: value.len() as u8,
            bytes,
        })
    }

    pub fn as_str(&self) -> &str {
        let len = (self.len as usize).min(TIMESTAMP_CAPACITY);
        std::str::from_utf8(&self.bytes[..len]).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single temperature sample in degrees Fahrenheit.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable, PartialEq)]
pub struct Reading {
    pub temperature: f64,
    pub timestamp: Timestamp,
}

impl Reading {
    pub fn new(timestamp: Timestamp, temperature: f64) -> Self {
        Self {
            temperature,
            timestamp,
        }
    }

    /// Reading without a timestamp, mostly useful in tests and benches.
    pub fn untimed(temperature: f64) -> Self {
        Self {
            temperature,
            timestamp: Timestamp::default(),
        }
    }
}
