// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Fixed-size container header.
//!
//! ```text
//! offset  size  field
//!      0     4  magic "DGCF"
//!      4     2  major version (u16, must be 1)
//!      6     2  minor version (u16)
//!      8    16  modules   (u64 offset, u64 size)
//!     24    16  resources (u64 offset, u64 size)
//!     40    16  sequence  (u64 offset, u64 size)
//!     56    16  constants (u64 offset, u64 size)
//! ```

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

use crate::ContainerError;

/// Magic bytes at the start of every container.
pub const MAGIC: [u8; 4] = *b"DGCF";

/// Supported major version.
pub const VERSION_MAJOR: u16 = 1;

/// Current minor version written by [`crate::ContainerBuilder`].
pub const VERSION_MINOR: u16 = 0;

/// Size of the header in bytes.
pub const HEADER_SIZE: usize = 72;

/// The four sections of a container, in header order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum Section {
    Header,
    Modules,
    Resources,
    Sequence,
    Constants,
}

impl Section {
    /// Sections that carry a `(offset, size)` record, in header order.
    pub const TABLES: [Section; 4] = [
        Section::Modules,
        Section::Resources,
        Section::Sequence,
        Section::Constants,
    ];
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Header => "header",
            Section::Modules => "module",
            Section::Resources => "resource",
            Section::Sequence => "sequence",
            Section::Constants => "constant",
        };
        f.write_str(name)
    }
}

/// A section's byte range, relative to the start of the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SectionRange {
    pub offset: u64,
    pub size: u64,
}

/// The decoded, bounds-checked header.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Header {
    pub major: u16,
    pub minor: u16,
    /// Ranges for modules, resources, sequence and constants.
    pub sections: [SectionRange; 4],
}

impl Header {
    /// Parses the header and checks every section range against `len`.
    ///
    /// Fails closed: any mismatch returns an error and nothing else is
    /// decoded.
    pub fn parse(bytes: &[u8]) -> Result<Self, ContainerError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ContainerError::InvalidHeader(format!(
                "container is {} bytes, shorter than the {HEADER_SIZE}-byte header",
                bytes.len()
            )));
        }
        if bytes[0..4] != MAGIC {
            return Err(ContainerError::InvalidHeader(format!(
                "bad magic {:02x?}",
                &bytes[0..4]
            )));
        }

        let major = LittleEndian::read_u16(&bytes[4..6]);
        let minor = LittleEndian::read_u16(&bytes[6..8]);
        if major != VERSION_MAJOR {
            return Err(ContainerError::IncompatibleVersion {
                major,
                minor,
                supported: VERSION_MAJOR,
            });
        }

        let mut sections = [SectionRange { offset: 0, size: 0 }; 4];
        for (i, section) in Section::TABLES.iter().enumerate() {
            let base = 8 + i * 16;
            let range = SectionRange {
                offset: LittleEndian::read_u64(&bytes[base..base + 8]),
                size: LittleEndian::read_u64(&bytes[base + 8..base + 16]),
            };
            let in_bounds = range
                .offset
                .checked_add(range.size)
                .is_some_and(|end| end <= bytes.len() as u64);
            if !in_bounds {
                return Err(ContainerError::SectionOutOfBounds {
                    section: *section,
                    offset: range.offset,
                    size: range.size,
                    len: bytes.len(),
                });
            }
            sections[i] = range;
        }

        Ok(Self {
            major,
            minor,
            sections,
        })
    }

    /// Returns the range of one table section.
    pub fn range(&self, section: Section) -> SectionRange {
        match section {
            Section::Header => SectionRange {
                offset: 0,
                size: HEADER_SIZE as u64,
            },
            Section::Modules => self.sections[0],
            Section::Resources => self.sections[1],
            Section::Sequence => self.sections[2],
            Section::Constants => self.sections[3],
        }
    }

    /// Serialises the header.
    pub fn write(&self, out: &mut [u8; HEADER_SIZE]) {
        out[0..4].copy_from_slice(&MAGIC);
        LittleEndian::write_u16(&mut out[4..6], self.major);
        LittleEndian::write_u16(&mut out[6..8], self.minor);
        for (i, range) in self.sections.iter().enumerate() {
            let base = 8 + i * 16;
            LittleEndian::write_u64(&mut out[base..base + 8], range.offset);
            LittleEndian::write_u64(&mut out[base + 8..base + 16], range.size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(major: u16, sections: [(u64, u64); 4], total: usize) -> Vec<u8> {
        let header = Header {
            major,
            minor: 3,
            sections: sections.map(|(offset, size)| SectionRange { offset, size }),
        };
        let mut out = [0u8; HEADER_SIZE];
        header.write(&mut out);
        let mut bytes = out.to_vec();
        bytes.resize(total, 0);
        bytes
    }

    #[test]
    fn test_parse_valid() {
        let bytes = header_bytes(1, [(72, 4), (76, 4), (80, 4), (84, 4)], 88);
        let header = Header::parse(&bytes).unwrap();
        assert_eq!(header.minor, 3);
        assert_eq!(header.range(Section::Sequence), SectionRange { offset: 80, size: 4 });
    }

    #[test]
    fn test_short_buffer_is_invalid() {
        let err = Header::parse(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, ContainerError::InvalidHeader(_)));
    }

    #[test]
    fn test_bad_magic_is_invalid() {
        let mut bytes = header_bytes(1, [(72, 0); 4], 72);
        bytes[0] = b'X';
        assert!(matches!(
            Header::parse(&bytes),
            Err(ContainerError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_wrong_major_is_incompatible() {
        let bytes = header_bytes(2, [(72, 0); 4], 72);
        assert!(matches!(
            Header::parse(&bytes),
            Err(ContainerError::IncompatibleVersion { major: 2, .. })
        ));
    }

    #[test]
    fn test_section_past_end_rejected() {
        let bytes = header_bytes(1, [(72, 4), (76, 4), (80, 100), (84, 4)], 88);
        let err = Header::parse(&bytes).unwrap_err();
        assert!(matches!(
            err,
            ContainerError::SectionOutOfBounds {
                section: Section::Sequence,
                ..
            }
        ));
    }

    #[test]
    fn test_section_overflow_rejected() {
        let bytes = header_bytes(1, [(u64::MAX, 2), (72, 0), (72, 0), (72, 0)], 72);
        assert!(matches!(
            Header::parse(&bytes),
            Err(ContainerError::SectionOutOfBounds {
                section: Section::Modules,
                ..
            })
        ));
    }
}
