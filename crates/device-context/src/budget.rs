// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Device memory budget configuration and parsing.
//!
//! A [`MemoryBudget`] caps the total size of live buffers on a
//! [`HeadlessDevice`](crate::HeadlessDevice).

use std::fmt;

use crate::DeviceError;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;

/// Suffixes checked longest-first so `"MB"` wins over `"B"`.
const SUFFIXES: [(&str, u64); 7] = [
    ("GB", GIB),
    ("MB", MIB),
    ("KB", KIB),
    ("G", GIB),
    ("M", MIB),
    ("K", KIB),
    ("B", 1),
];

/// A hard ceiling on device buffer memory.
///
/// # Parsing
/// - `"512M"` or `"512MB"` → 512 × 1024² bytes
/// - `"1G"` or `"1GB"` → 1 × 1024³ bytes
/// - `"2048K"` or `"2048KB"` → 2048 × 1024 bytes
/// - `"1073741824"` → raw byte count
///
/// # Examples
/// ```
/// use device_context::MemoryBudget;
///
/// let b = MemoryBudget::parse("1G").unwrap();
/// assert_eq!(b.as_mb(), 1024);
/// assert_eq!(b.to_string(), "1 GB");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MemoryBudget {
    bytes: u64,
}

impl MemoryBudget {
    pub fn from_bytes(bytes: u64) -> Self {
        Self { bytes }
    }

    pub fn from_mb(mb: u64) -> Self {
        Self { bytes: mb * MIB }
    }

    pub fn from_gb(gb: u64) -> Self {
        Self { bytes: gb * GIB }
    }

    pub fn as_bytes(&self) -> u64 {
        self.bytes
    }

    /// Returns the budget in megabytes (truncated).
    pub fn as_mb(&self) -> u64 {
        self.bytes / MIB
    }

    /// Parses a human-readable budget string. Case-insensitive; zero is
    /// rejected.
    pub fn parse(s: &str) -> Result<Self, DeviceError> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();
        let (digits, multiplier) = SUFFIXES
            .iter()
            .find_map(|&(suffix, mult)| upper.strip_suffix(suffix).map(|rest| (rest, mult)))
            .unwrap_or((upper.as_str(), 1));

        let value: u64 = digits
            .trim()
            .parse()
            .map_err(|_| DeviceError::InvalidBudget(s.to_string()))?;
        match value.checked_mul(multiplier) {
            Some(bytes) if bytes > 0 => Ok(Self { bytes }),
            _ => Err(DeviceError::InvalidBudget(s.to_string())),
        }
    }
}

impl fmt::Display for MemoryBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.bytes;
        if b >= GIB && b % GIB == 0 {
            write!(f, "{} GB", b / GIB)
        } else if b >= MIB && b % MIB == 0 {
            write!(f, "{} MB", b / MIB)
        } else if b >= KIB && b % KIB == 0 {
            write!(f, "{} KB", b / KIB)
        } else {
            write!(f, "{b} B")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_suffixes() {
        assert_eq!(MemoryBudget::parse("512M").unwrap().as_mb(), 512);
        assert_eq!(MemoryBudget::parse("512mb").unwrap().as_mb(), 512);
        assert_eq!(MemoryBudget::parse("1G").unwrap().as_mb(), 1024);
        assert_eq!(MemoryBudget::parse("2gb").unwrap().as_mb(), 2048);
        assert_eq!(MemoryBudget::parse("1024K").unwrap().as_bytes(), 1024 * 1024);
        assert_eq!(MemoryBudget::parse("64B").unwrap().as_bytes(), 64);
        assert_eq!(MemoryBudget::parse("1048576").unwrap().as_mb(), 1);
        assert_eq!(MemoryBudget::parse("  8M ").unwrap().as_mb(), 8);
    }

    #[test]
    fn test_parse_invalid() {
        for bad in ["", "abc", "0M", "M", "99999999999999999999G"] {
            assert!(
                matches!(MemoryBudget::parse(bad), Err(DeviceError::InvalidBudget(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(MemoryBudget::from_gb(1).to_string(), "1 GB");
        assert_eq!(MemoryBudget::from_mb(512).to_string(), "512 MB");
        assert_eq!(MemoryBudget::from_bytes(2048).to_string(), "2 KB");
        assert_eq!(MemoryBudget::from_bytes(100).to_string(), "100 B");
    }

    #[test]
    fn test_serde_roundtrip() {
        let b = MemoryBudget::from_mb(256);
        let json = serde_json::to_string(&b).unwrap();
        let back: MemoryBudget = serde_json::from_str(&json).unwrap();
        assert_eq!(b, back);
    }
}
