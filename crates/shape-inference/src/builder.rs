// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Assembles small data-graph kernel modules.
//!
//! Used to author fixtures and demo containers. The generated module holds
//! exactly what the shape pass and the extractor look at: tensor types with
//! constant shapes, and decorated tensor variables.

use tensor_core::DType;

use crate::spirv::{self, decoration, head, op};

/// Incrementally builds a SPIR-V module declaring tensor variables.
///
/// # Example
/// ```
/// use shape_inference::ModuleBuilder;
/// use tensor_core::DType;
///
/// let mut b = ModuleBuilder::new();
/// let t = b.tensor_type(DType::F32, &[-1, 4]);
/// b.variable(t, 0, 0);
/// b.variable(t, 0, 1);
/// let words = b.build();
/// assert_eq!(words[0], 0x0723_0203);
/// ```
#[derive(Debug, Clone)]
pub struct ModuleBuilder {
    next_id: u32,
    annotations: Vec<u32>,
    globals: Vec<u32>,
    uint32: Option<u32>,
    float32: Option<u32>,
    int8: Option<u32>,
}

impl Default for ModuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            annotations: Vec::new(),
            globals: Vec::new(),
            uint32: None,
            float32: None,
            int8: None,
        }
    }

    fn fresh_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn emit(&mut self, opcode: u16, operands: &[u32]) {
        self.globals.push(head(opcode, operands.len() + 1));
        self.globals.extend_from_slice(operands);
    }

    fn uint32_type(&mut self) -> u32 {
        if let Some(id) = self.uint32 {
            return id;
        }
        let id = self.fresh_id();
        self.emit(op::TYPE_INT, &[id, 32, 0]);
        self.uint32 = Some(id);
        id
    }

    fn element_type(&mut self, dtype: DType) -> u32 {
        match dtype {
            DType::F32 => {
                if let Some(id) = self.float32 {
                    return id;
                }
                let id = self.fresh_id();
                self.emit(op::TYPE_FLOAT, &[id, 32]);
                self.float32 = Some(id);
                id
            }
            DType::I8 => {
                if let Some(id) = self.int8 {
                    return id;
                }
                let id = self.fresh_id();
                self.emit(op::TYPE_INT, &[id, 8, 1]);
                self.int8 = Some(id);
                id
            }
        }
    }

    /// Declares a 32-bit unsigned integer constant and returns its id.
    pub fn constant(&mut self, value: u32) -> u32 {
        let ty = self.uint32_type();
        let id = self.fresh_id();
        self.emit(op::CONSTANT, &[ty, id, value]);
        id
    }

    /// Declares a ranked tensor type with a constant shape. Non-positive
    /// dimensions are written as 0 (unknown).
    pub fn tensor_type(&mut self, dtype: DType, dims: &[i64]) -> u32 {
        let elem = self.element_type(dtype);
        let uint = self.uint32_type();
        let rank = self.constant(dims.len() as u32);
        let dim_ids: Vec<u32> = dims
            .iter()
            .map(|&d| self.constant(u32::try_from(d.max(0)).unwrap_or(u32::MAX)))
            .collect();
        let array = self.fresh_id();
        self.emit(op::TYPE_ARRAY, &[array, uint, rank]);
        let shape = self.fresh_id();
        let mut operands = vec![array, shape];
        operands.extend_from_slice(&dim_ids);
        self.emit(op::CONSTANT_COMPOSITE, &operands);
        let id = self.fresh_id();
        self.emit(op::TYPE_TENSOR_ARM, &[id, elem, rank, shape]);
        id
    }

    /// Declares a tensor type with a known rank but no shape operand.
    pub fn ranked_tensor_type(&mut self, dtype: DType, rank: u32) -> u32 {
        let elem = self.element_type(dtype);
        let rank = self.constant(rank);
        let id = self.fresh_id();
        self.emit(op::TYPE_TENSOR_ARM, &[id, elem, rank]);
        id
    }

    /// Declares a tensor variable at `(set, binding)` and returns its id.
    pub fn variable(&mut self, tensor_type: u32, set: u32, binding: u32) -> u32 {
        let ptr = self.fresh_id();
        self.emit(op::TYPE_POINTER, &[ptr, spirv::STORAGE_UNIFORM_CONSTANT, tensor_type]);
        let var = self.fresh_id();
        self.emit(op::VARIABLE, &[ptr, var, spirv::STORAGE_UNIFORM_CONSTANT]);
        self.decorate(var, decoration::DESCRIPTOR_SET, set);
        self.decorate(var, decoration::BINDING, binding);
        var
    }

    /// Adds a raw `OpDecorate`.
    pub fn decorate(&mut self, target: u32, kind: u32, value: u32) {
        self.annotations
            .extend_from_slice(&[head(op::DECORATE, 4), target, kind, value]);
    }

    /// Assembles the module words.
    pub fn build(&self) -> Vec<u32> {
        // Capability TensorsARM (4174), Logical addressing, Vulkan memory model.
        let preamble = [head(op::CAPABILITY, 2), 4174, head(op::MEMORY_MODEL, 3), 0, 3];
        let mut words = vec![spirv::MAGIC, 0x0001_0600, 0, self.next_id, 0];
        words.extend_from_slice(&preamble);
        words.extend_from_slice(&self.annotations);
        words.extend_from_slice(&self.globals);
        words
    }

    /// Assembles the module as little-endian bytes.
    pub fn build_bytes(&self) -> Vec<u8> {
        spirv::words_to_bytes(&self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spirv::ModuleIndex;

    #[test]
    fn test_types_are_deduplicated() {
        let mut b = ModuleBuilder::new();
        let a = b.tensor_type(DType::F32, &[1]);
        let c = b.tensor_type(DType::F32, &[2]);
        assert_ne!(a, c);
        let words = b.build();
        let index = ModuleIndex::new(&words).unwrap();
        let floats = index
            .instructions
            .iter()
            .filter(|i| i.opcode == op::TYPE_FLOAT)
            .count();
        assert_eq!(floats, 1);
    }

    #[test]
    fn test_id_bound_covers_all_ids() {
        let mut b = ModuleBuilder::new();
        let t = b.tensor_type(DType::I8, &[-1, 3]);
        let v = b.variable(t, 0, 2);
        let words = b.build();
        assert!(words[spirv::ID_BOUND_WORD] > v);
        let index = ModuleIndex::new(&words).unwrap();
        assert_eq!(index.decoration(v, decoration::BINDING), Some(2));
        assert_eq!(index.decoration(v, decoration::DESCRIPTOR_SET), Some(0));
        let var = index.def(v).unwrap();
        let tensor = index.tensor_type_of(var).unwrap().unwrap();
        assert_eq!(tensor.operand(0), Some(t));
    }
}
