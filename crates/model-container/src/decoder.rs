// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The container decoder: header validation plus one indexing pass over the
//! four tables.

use std::path::Path;

use crate::header::{Header, Section};
use crate::reader::SectionReader;
use crate::tables::{self, ConstantEntry, ModuleEntry, ResourceEntry, SegmentEntry, SequenceTable};
use crate::{ByteView, ContainerError, SharedBytes};

/// Read-only, validated view of a model container.
///
/// Construction fails closed: either every section decodes, or an error is
/// returned and no tables are exposed. Variable-length entries are indexed
/// once; kernel code and constant payloads stay as [`ByteView`]s into the
/// original bytes.
///
/// # Example
/// ```
/// use model_container::{ContainerBuilder, ContainerDecoder};
///
/// let bytes = ContainerBuilder::new().build();
/// let decoder = ContainerDecoder::new(bytes.into()).unwrap();
/// assert_eq!(decoder.segments().len(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct ContainerDecoder {
    bytes: ByteView,
    header: Header,
    modules: Vec<ModuleEntry>,
    resources: Vec<ResourceEntry>,
    sequence: SequenceTable,
    constants: Vec<ConstantEntry>,
}

impl ContainerDecoder {
    /// Decodes a container held in `bytes`.
    pub fn new(bytes: ByteView) -> Result<Self, ContainerError> {
        let header = Header::parse(bytes.as_slice())?;

        let reader = |section: Section| {
            let range = header.range(section);
            // Ranges are already bounds-checked against the buffer length.
            SectionReader::new(&bytes, section, range.offset as usize, range.size as usize)
        };

        let modules = tables::decode_modules(&mut reader(Section::Modules))?;
        let resources = tables::decode_resources(&mut reader(Section::Resources))?;
        let sequence = tables::decode_sequence(&mut reader(Section::Sequence))?;
        let constants = tables::decode_constants(&mut reader(Section::Constants))?;

        tracing::debug!(
            major = header.major,
            minor = header.minor,
            modules = modules.len(),
            resources = resources.len(),
            segments = sequence.segments.len(),
            constants = constants.len(),
            "Decoded container"
        );

        Ok(Self {
            bytes,
            header,
            modules,
            resources,
            sequence,
            constants,
        })
    }

    /// Memory-maps and decodes a container file.
    pub fn open(path: &Path) -> Result<Self, ContainerError> {
        Self::new(SharedBytes::map_file(path)?.view())
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The bytes this decoder reads from.
    pub fn bytes(&self) -> &ByteView {
        &self.bytes
    }

    pub fn modules(&self) -> &[ModuleEntry] {
        &self.modules
    }

    pub fn resources(&self) -> &[ResourceEntry] {
        &self.resources
    }

    pub fn sequence(&self) -> &SequenceTable {
        &self.sequence
    }

    pub fn segments(&self) -> &[SegmentEntry] {
        &self.sequence.segments
    }

    pub fn constants(&self) -> &[ConstantEntry] {
        &self.constants
    }

    /// Looks up a module entry by index.
    pub fn module(&self, index: u32) -> Result<&ModuleEntry, ContainerError> {
        self.modules
            .get(index as usize)
            .ok_or(ContainerError::ModuleIndexOutOfBounds {
                index,
                count: self.modules.len(),
            })
    }

    /// Looks up a resource entry by index.
    pub fn resource(&self, index: u32) -> Result<&ResourceEntry, ContainerError> {
        self.resources
            .get(index as usize)
            .ok_or(ContainerError::ResourceIndexOutOfBounds {
                index,
                count: self.resources.len(),
            })
    }

    /// Looks up a constant entry by index.
    pub fn constant(&self, index: u32) -> Result<&ConstantEntry, ContainerError> {
        self.constants
            .get(index as usize)
            .ok_or(ContainerError::ConstantIndexOutOfBounds {
                index,
                count: self.constants.len(),
            })
    }
}
