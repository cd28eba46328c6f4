// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Container authoring.

use byteorder::{LittleEndian, WriteBytesExt};
use tensor_core::TensorFormat;

use crate::header::{Header, SectionRange, HEADER_SIZE, VERSION_MAJOR, VERSION_MINOR};
use crate::tables::{BindingSlot, ModuleKind, ResourceCategory, SegmentEntry};

struct PendingModule {
    kind: ModuleKind,
    entry_point: String,
    code: Vec<u8>,
}

struct PendingResource {
    category: ResourceCategory,
    format: TensorFormat,
    dims: Vec<i64>,
    strides: Vec<i64>,
}

/// Builds a container byte image.
///
/// The builder does not validate semantics; it happily writes containers
/// that the runtime will reject, which is what rejection tests need.
pub struct ContainerBuilder {
    major: u16,
    minor: u16,
    modules: Vec<PendingModule>,
    resources: Vec<PendingResource>,
    model_inputs: Vec<BindingSlot>,
    model_outputs: Vec<BindingSlot>,
    segments: Vec<SegmentEntry>,
    constants: Vec<(u32, Vec<u8>)>,
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self {
            major: VERSION_MAJOR,
            minor: VERSION_MINOR,
            modules: Vec::new(),
            resources: Vec::new(),
            model_inputs: Vec::new(),
            model_outputs: Vec::new(),
            segments: Vec::new(),
            constants: Vec::new(),
        }
    }

    /// Overrides the header version.
    pub fn version(mut self, major: u16, minor: u16) -> Self {
        self.major = major;
        self.minor = minor;
        self
    }

    /// Adds a module and returns its index.
    pub fn add_module(&mut self, kind: ModuleKind, entry_point: &str, code: Vec<u8>) -> u32 {
        self.modules.push(PendingModule {
            kind,
            entry_point: entry_point.to_string(),
            code,
        });
        (self.modules.len() - 1) as u32
    }

    /// Adds a densely packed resource and returns its index.
    pub fn add_resource(
        &mut self,
        category: ResourceCategory,
        format: TensorFormat,
        dims: Vec<i64>,
    ) -> u32 {
        self.add_strided_resource(category, format, dims, Vec::new())
    }

    /// Adds a resource with explicit strides and returns its index.
    pub fn add_strided_resource(
        &mut self,
        category: ResourceCategory,
        format: TensorFormat,
        dims: Vec<i64>,
        strides: Vec<i64>,
    ) -> u32 {
        self.resources.push(PendingResource {
            category,
            format,
            dims,
            strides,
        });
        (self.resources.len() - 1) as u32
    }

    pub fn add_model_input(&mut self, slot: BindingSlot) {
        self.model_inputs.push(slot);
    }

    pub fn add_model_output(&mut self, slot: BindingSlot) {
        self.model_outputs.push(slot);
    }

    /// Appends a segment; segments run in the order they are added.
    pub fn add_segment(&mut self, segment: SegmentEntry) -> u32 {
        self.segments.push(segment);
        (self.segments.len() - 1) as u32
    }

    /// Adds a constant payload for `resource` and returns its index.
    pub fn add_constant(&mut self, resource: u32, data: Vec<u8>) -> u32 {
        self.constants.push((resource, data));
        (self.constants.len() - 1) as u32
    }

    /// Serialises the container.
    pub fn build(&self) -> Vec<u8> {
        let sections = [
            self.module_section(),
            self.resource_section(),
            self.sequence_section(),
            self.constant_section(),
        ];

        let mut ranges = [SectionRange { offset: 0, size: 0 }; 4];
        let mut offset = HEADER_SIZE as u64;
        for (range, section) in ranges.iter_mut().zip(&sections) {
            *range = SectionRange {
                offset,
                size: section.len() as u64,
            };
            offset += section.len() as u64;
        }

        let header = Header {
            major: self.major,
            minor: self.minor,
            sections: ranges,
        };
        let mut head = [0u8; HEADER_SIZE];
        header.write(&mut head);

        let mut out = Vec::with_capacity(offset as usize);
        out.extend_from_slice(&head);
        for section in &sections {
            out.extend_from_slice(section);
        }
        out
    }

    fn module_section(&self) -> Vec<u8> {
        let mut w = Vec::new();
        put_u32(&mut w, self.modules.len() as u32);
        for m in &self.modules {
            put_u32(&mut w, m.kind.code());
            put_str(&mut w, &m.entry_point);
            put_u32(&mut w, m.code.len() as u32);
            w.extend_from_slice(&m.code);
        }
        w
    }

    fn resource_section(&self) -> Vec<u8> {
        let mut w = Vec::new();
        put_u32(&mut w, self.resources.len() as u32);
        for r in &self.resources {
            put_u32(&mut w, r.category.code());
            put_u32(&mut w, r.format.code());
            put_i64_list(&mut w, &r.dims);
            put_i64_list(&mut w, &r.strides);
        }
        w
    }

    fn sequence_section(&self) -> Vec<u8> {
        let mut w = Vec::new();
        put_slots(&mut w, &self.model_inputs);
        put_slots(&mut w, &self.model_outputs);
        put_u32(&mut w, self.segments.len() as u32);
        for s in &self.segments {
            put_str(&mut w, &s.name);
            put_u32(&mut w, s.module_index);
            put_u32(&mut w, s.kind.code());
            put_slots(&mut w, &s.inputs);
            put_slots(&mut w, &s.outputs);
            put_u32(&mut w, s.descriptor_sets.len() as u32);
            for set in &s.descriptor_sets {
                put_slots(&mut w, set);
            }
            put_u32(&mut w, s.push_constants.len() as u32);
            for pc in &s.push_constants {
                put_u32(&mut w, pc.stages);
                put_u32(&mut w, pc.offset);
                put_u32(&mut w, pc.size);
            }
            put_u32(&mut w, s.constants.len() as u32);
            for &c in &s.constants {
                put_u32(&mut w, c);
            }
        }
        w
    }

    fn constant_section(&self) -> Vec<u8> {
        let mut w = Vec::new();
        put_u32(&mut w, self.constants.len() as u32);
        for (resource, data) in &self.constants {
            put_u32(&mut w, *resource);
            // Writing into a Vec cannot fail.
            let _ = w.write_u64::<LittleEndian>(data.len() as u64);
            w.extend_from_slice(data);
        }
        w
    }
}

fn put_u32(w: &mut Vec<u8>, value: u32) {
    let _ = w.write_u32::<LittleEndian>(value);
}

fn put_str(w: &mut Vec<u8>, value: &str) {
    put_u32(w, value.len() as u32);
    w.extend_from_slice(value.as_bytes());
}

fn put_i64_list(w: &mut Vec<u8>, values: &[i64]) {
    put_u32(w, values.len() as u32);
    for &v in values {
        let _ = w.write_i64::<LittleEndian>(v);
    }
}

fn put_slots(w: &mut Vec<u8>, slots: &[BindingSlot]) {
    put_u32(w, slots.len() as u32);
    for slot in slots {
        put_u32(w, slot.binding);
        put_u32(w, slot.resource);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContainerDecoder, ContainerError, PushConstantRange};

    #[test]
    fn test_empty_container_layout() {
        let bytes = ContainerBuilder::new().build();
        // Header + 4 (modules) + 4 (resources) + 4 + 4 + 4 (sequence) + 4 (constants)
        assert_eq!(bytes.len(), HEADER_SIZE + 24);
        assert_eq!(&bytes[0..4], b"DGCF");
        assert!(ContainerDecoder::new(bytes.into()).is_ok());
    }

    #[test]
    fn test_version_override() {
        let bytes = ContainerBuilder::new().version(3, 0).build();
        assert!(matches!(
            ContainerDecoder::new(bytes.into()),
            Err(ContainerError::IncompatibleVersion { major: 3, .. })
        ));
    }

    #[test]
    fn test_segment_fields_survive() {
        let mut b = ContainerBuilder::new();
        let mut seg = SegmentEntry::graph("s", 0, vec![], vec![]).with_constants(vec![4, 5]);
        seg.kind = ModuleKind::Compute;
        seg.descriptor_sets.push(vec![BindingSlot::new(9, 1)]);
        seg.push_constants.push(PushConstantRange {
            stages: 1,
            offset: 0,
            size: 16,
        });
        b.add_segment(seg.clone());
        b.add_strided_resource(ResourceCategory::Other(42), TensorFormat(7), vec![2], vec![1]);

        let decoder = ContainerDecoder::new(b.build().into()).unwrap();
        assert_eq!(decoder.segments()[0], seg);
        let res = decoder.resource(0).unwrap();
        assert_eq!(res.category, ResourceCategory::Other(42));
        assert_eq!(res.strides, vec![1]);
    }
}
