// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Entry types of the four container tables and their decoders.

use std::fmt;

use tensor_core::{SymbolicShape, TensorFormat};

use crate::reader::SectionReader;
use crate::{ByteView, ContainerError};

// ── Modules ────────────────────────────────────────────────────────

/// Kind of a kernel module or of the segment that runs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ModuleKind {
    /// A classic compute shader.
    Compute,
    /// A data-graph kernel.
    Graph,
}

impl ModuleKind {
    pub fn from_code(code: u32) -> Result<Self, ContainerError> {
        match code {
            0 => Ok(ModuleKind::Compute),
            1 => Ok(ModuleKind::Graph),
            other => Err(ContainerError::UnknownModuleKind(other)),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            ModuleKind::Compute => 0,
            ModuleKind::Graph => 1,
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleKind::Compute => write!(f, "compute"),
            ModuleKind::Graph => write!(f, "graph"),
        }
    }
}

/// One module-table entry.
#[derive(Debug, Clone)]
pub struct ModuleEntry {
    pub kind: ModuleKind,
    pub entry_point: String,
    /// Kernel code; a view into the container bytes.
    pub code: ByteView,
}

pub(crate) fn decode_modules(r: &mut SectionReader<'_>) -> Result<Vec<ModuleEntry>, ContainerError> {
    let count = r.count(12)?;
    let mut modules = Vec::with_capacity(count);
    for _ in 0..count {
        let kind = ModuleKind::from_code(r.u32()?)?;
        let entry_point = r.string()?;
        let code_len = r.u32()? as usize;
        let code = r.bytes(code_len)?;
        modules.push(ModuleEntry {
            kind,
            entry_point,
            code,
        });
    }
    Ok(modules)
}

// ── Resources ──────────────────────────────────────────────────────

/// Role of a resource-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ResourceCategory {
    Input,
    Output,
    Intermediate,
    Constant,
    Other(u32),
}

impl ResourceCategory {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => ResourceCategory::Input,
            1 => ResourceCategory::Output,
            2 => ResourceCategory::Intermediate,
            3 => ResourceCategory::Constant,
            other => ResourceCategory::Other(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            ResourceCategory::Input => 0,
            ResourceCategory::Output => 1,
            ResourceCategory::Intermediate => 2,
            ResourceCategory::Constant => 3,
            ResourceCategory::Other(code) => code,
        }
    }

    /// Returns `true` for categories that become runtime tensors
    /// (inputs, outputs and intermediates).
    pub fn is_tensor(self) -> bool {
        matches!(
            self,
            ResourceCategory::Input | ResourceCategory::Output | ResourceCategory::Intermediate
        )
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceCategory::Input => write!(f, "input"),
            ResourceCategory::Output => write!(f, "output"),
            ResourceCategory::Intermediate => write!(f, "intermediate"),
            ResourceCategory::Constant => write!(f, "constant"),
            ResourceCategory::Other(code) => write!(f, "other({code})"),
        }
    }
}

/// One resource-table entry, as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    pub category: ResourceCategory,
    pub format: TensorFormat,
    /// Raw dimensions; non-positive values mean "unspecified".
    pub dims: Vec<i64>,
    pub strides: Vec<i64>,
}

impl ResourceEntry {
    /// Declared shape with unspecified dimensions normalised to -1.
    pub fn shape(&self) -> SymbolicShape {
        SymbolicShape::new(self.dims.clone())
    }
}

pub(crate) fn decode_resources(
    r: &mut SectionReader<'_>,
) -> Result<Vec<ResourceEntry>, ContainerError> {
    let count = r.count(16)?;
    let mut resources = Vec::with_capacity(count);
    for _ in 0..count {
        let category = ResourceCategory::from_code(r.u32()?);
        let format = TensorFormat(r.u32()?);
        let dims = r.i64_list()?;
        let strides = r.i64_list()?;
        resources.push(ResourceEntry {
            category,
            format,
            dims,
            strides,
        });
    }
    Ok(resources)
}

// ── Sequence ───────────────────────────────────────────────────────

/// A `(binding id, resource index)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct BindingSlot {
    pub binding: u32,
    pub resource: u32,
}

impl BindingSlot {
    pub fn new(binding: u32, resource: u32) -> Self {
        Self { binding, resource }
    }
}

/// A push-constant range declared by a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PushConstantRange {
    pub stages: u32,
    pub offset: u32,
    pub size: u32,
}

/// One segment of the sequence table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentEntry {
    pub name: String,
    pub module_index: u32,
    pub kind: ModuleKind,
    pub inputs: Vec<BindingSlot>,
    pub outputs: Vec<BindingSlot>,
    /// Binding slots per descriptor set.
    pub descriptor_sets: Vec<Vec<BindingSlot>>,
    pub push_constants: Vec<PushConstantRange>,
    /// Indices into the constant table.
    pub constants: Vec<u32>,
}

impl SegmentEntry {
    /// A graph segment with a single descriptor set covering its inputs
    /// followed by its outputs.
    pub fn graph(
        name: impl Into<String>,
        module_index: u32,
        inputs: Vec<BindingSlot>,
        outputs: Vec<BindingSlot>,
    ) -> Self {
        let set = inputs.iter().chain(outputs.iter()).copied().collect();
        Self {
            name: name.into(),
            module_index,
            kind: ModuleKind::Graph,
            inputs,
            outputs,
            descriptor_sets: vec![set],
            push_constants: Vec::new(),
            constants: Vec::new(),
        }
    }

    pub fn with_constants(mut self, constants: Vec<u32>) -> Self {
        self.constants = constants;
        self
    }
}

/// The decoded sequence table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceTable {
    pub model_inputs: Vec<BindingSlot>,
    pub model_outputs: Vec<BindingSlot>,
    pub segments: Vec<SegmentEntry>,
}

fn slot_list(r: &mut SectionReader<'_>) -> Result<Vec<BindingSlot>, ContainerError> {
    let n = r.count(8)?;
    let mut slots = Vec::with_capacity(n);
    for _ in 0..n {
        let binding = r.u32()?;
        let resource = r.u32()?;
        slots.push(BindingSlot::new(binding, resource));
    }
    Ok(slots)
}

pub(crate) fn decode_sequence(r: &mut SectionReader<'_>) -> Result<SequenceTable, ContainerError> {
    let model_inputs = slot_list(r)?;
    let model_outputs = slot_list(r)?;
    let count = r.count(32)?;
    let mut segments = Vec::with_capacity(count);
    for _ in 0..count {
        let name = r.string()?;
        let module_index = r.u32()?;
        let kind = ModuleKind::from_code(r.u32()?)?;
        let inputs = slot_list(r)?;
        let outputs = slot_list(r)?;
        let set_count = r.count(4)?;
        let descriptor_sets = (0..set_count)
            .map(|_| slot_list(r))
            .collect::<Result<Vec<_>, _>>()?;
        let push_count = r.count(12)?;
        let mut push_constants = Vec::with_capacity(push_count);
        for _ in 0..push_count {
            push_constants.push(PushConstantRange {
                stages: r.u32()?,
                offset: r.u32()?,
                size: r.u32()?,
            });
        }
        let constants = r.u32_list()?;
        segments.push(SegmentEntry {
            name,
            module_index,
            kind,
            inputs,
            outputs,
            descriptor_sets,
            push_constants,
            constants,
        });
    }
    Ok(SequenceTable {
        model_inputs,
        model_outputs,
        segments,
    })
}

// ── Constants ──────────────────────────────────────────────────────

/// One constant-table entry.
#[derive(Debug, Clone)]
pub struct ConstantEntry {
    pub resource_index: u32,
    /// Raw constant payload; a view into the container bytes.
    pub data: ByteView,
}

pub(crate) fn decode_constants(
    r: &mut SectionReader<'_>,
) -> Result<Vec<ConstantEntry>, ContainerError> {
    let count = r.count(12)?;
    let mut constants = Vec::with_capacity(count);
    for _ in 0..count {
        let resource_index = r.u32()?;
        // An unrepresentable length cannot fit the section either.
        let len = usize::try_from(r.u64()?).unwrap_or(usize::MAX);
        let data = r.bytes(len)?;
        constants.push(ConstantEntry {
            resource_index,
            data,
        });
    }
    Ok(constants)
}
