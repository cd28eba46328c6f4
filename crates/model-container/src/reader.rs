// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Bounds-checked little-endian cursor over one section.

use byteorder::{ByteOrder, LittleEndian};

use crate::{ByteView, ContainerError, Section};

/// Reads primitive fields from a single section.
///
/// Every read is checked against the section's end, so a truncated table
/// surfaces as [`ContainerError::Truncated`] rather than a panic.
pub(crate) struct SectionReader<'a> {
    container: &'a ByteView,
    section: Section,
    /// Absolute offset of the section start within the container.
    base: usize,
    data: &'a [u8],
    pos: usize,
}

impl<'a> SectionReader<'a> {
    pub(crate) fn new(container: &'a ByteView, section: Section, base: usize, size: usize) -> Self {
        Self {
            container,
            section,
            base,
            data: &container.as_slice()[base..base + size],
            pos: 0,
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ContainerError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or(ContainerError::Truncated {
                section: self.section,
                offset: self.base + self.pos,
                needed: n,
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn u32(&mut self) -> Result<u32, ContainerError> {
        self.take(4).map(LittleEndian::read_u32)
    }

    pub(crate) fn u64(&mut self) -> Result<u64, ContainerError> {
        self.take(8).map(LittleEndian::read_u64)
    }

    pub(crate) fn i64(&mut self) -> Result<i64, ContainerError> {
        self.take(8).map(LittleEndian::read_i64)
    }

    /// Reads a `u32` count, rejecting counts that could not possibly fit in
    /// the rest of the section given the minimum entry size.
    pub(crate) fn count(&mut self, min_entry_size: usize) -> Result<usize, ContainerError> {
        let offset = self.base + self.pos;
        let count = self.u32()? as usize;
        let remaining = self.data.len() - self.pos;
        if count.saturating_mul(min_entry_size.max(1)) > remaining {
            return Err(ContainerError::Truncated {
                section: self.section,
                offset,
                needed: count.saturating_mul(min_entry_size),
            });
        }
        Ok(count)
    }

    pub(crate) fn i64_list(&mut self) -> Result<Vec<i64>, ContainerError> {
        let n = self.count(8)?;
        (0..n).map(|_| self.i64()).collect()
    }

    pub(crate) fn u32_list(&mut self) -> Result<Vec<u32>, ContainerError> {
        let n = self.count(4)?;
        (0..n).map(|_| self.u32()).collect()
    }

    pub(crate) fn string(&mut self) -> Result<String, ContainerError> {
        let len = self.u32()? as usize;
        let offset = self.base + self.pos;
        let raw = self.take(len)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| ContainerError::InvalidString {
                section: self.section,
                offset,
            })
    }

    /// Reads `len` raw bytes and returns them as a view into the container.
    pub(crate) fn bytes(&mut self, len: usize) -> Result<ByteView, ContainerError> {
        let offset = self.base + self.pos;
        self.take(len)?;
        self.container.slice(offset, len)
    }
}
