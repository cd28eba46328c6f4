// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Minimal SPIR-V word-stream reader.
//!
//! Only the handful of instructions needed to find tensor variables and
//! their shapes are understood; everything else is skipped by word count.
//!
//! ```text
//! word 0..5   header: magic, version, generator, id bound, schema
//! word 5..    instructions: (word_count << 16 | opcode), operands...
//! ```

use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};

use crate::ShapeInferenceError;

pub const MAGIC: u32 = 0x0723_0203;
pub const HEADER_WORDS: usize = 5;
/// Index of the id-bound word in the header.
pub const ID_BOUND_WORD: usize = 3;

/// Opcodes this crate reads or writes.
pub mod op {
    pub const CAPABILITY: u16 = 17;
    pub const MEMORY_MODEL: u16 = 14;
    pub const TYPE_INT: u16 = 21;
    pub const TYPE_FLOAT: u16 = 22;
    pub const TYPE_ARRAY: u16 = 28;
    pub const TYPE_POINTER: u16 = 32;
    pub const CONSTANT: u16 = 43;
    pub const CONSTANT_COMPOSITE: u16 = 44;
    pub const SPEC_CONSTANT: u16 = 50;
    pub const VARIABLE: u16 = 59;
    pub const DECORATE: u16 = 71;
    pub const TYPE_TENSOR_ARM: u16 = 4163;
}

/// Decorations this crate reads.
pub mod decoration {
    pub const BINDING: u32 = 33;
    pub const DESCRIPTOR_SET: u32 = 34;
}

/// Storage class used for tensor variables.
pub const STORAGE_UNIFORM_CONSTANT: u32 = 0;

/// Converts little-endian code bytes into words.
pub fn words_from_bytes(bytes: &[u8]) -> Result<Vec<u32>, ShapeInferenceError> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return Err(ShapeInferenceError::MalformedCode(format!(
            "code length {} is not a positive multiple of 4",
            bytes.len()
        )));
    }
    let mut words = vec![0u32; bytes.len() / 4];
    LittleEndian::read_u32_into(bytes, &mut words);
    Ok(words)
}

/// Converts words into little-endian code bytes.
pub fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    let mut bytes = vec![0u8; words.len() * 4];
    LittleEndian::write_u32_into(words, &mut bytes);
    bytes
}

/// One decoded instruction, borrowing its words.
#[derive(Debug, Clone, Copy)]
pub struct Instruction<'a> {
    /// Word offset of this instruction in the module.
    pub offset: usize,
    pub opcode: u16,
    /// Operand words (excluding the leading opcode word).
    pub operands: &'a [u32],
}

impl<'a> Instruction<'a> {
    pub fn operand(&self, index: usize) -> Option<u32> {
        self.operands.get(index).copied()
    }

    pub fn word_count(&self) -> usize {
        self.operands.len() + 1
    }

    /// The id this instruction declares, if any.
    pub fn result_id(&self) -> Option<u32> {
        match self.opcode {
            op::TYPE_INT | op::TYPE_FLOAT | op::TYPE_ARRAY | op::TYPE_POINTER | op::TYPE_TENSOR_ARM => {
                self.operand(0)
            }
            op::CONSTANT | op::CONSTANT_COMPOSITE | op::SPEC_CONSTANT | op::VARIABLE => {
                self.operand(1)
            }
            _ => None,
        }
    }
}

/// Splits `words` into instructions after validating the header.
pub fn instructions(words: &[u32]) -> Result<Vec<Instruction<'_>>, ShapeInferenceError> {
    if words.len() < HEADER_WORDS || words[0] != MAGIC {
        return Err(ShapeInferenceError::MalformedCode(
            "missing SPIR-V header".into(),
        ));
    }
    let mut out = Vec::new();
    let mut offset = HEADER_WORDS;
    while offset < words.len() {
        let head = words[offset];
        let count = (head >> 16) as usize;
        let opcode = (head & 0xffff) as u16;
        if count == 0 || offset + count > words.len() {
            return Err(ShapeInferenceError::MalformedCode(format!(
                "instruction at word {offset} has bad word count {count}"
            )));
        }
        out.push(Instruction {
            offset,
            opcode,
            operands: &words[offset + 1..offset + count],
        });
        offset += count;
    }
    Ok(out)
}

/// Encodes an instruction's first word.
pub fn head(opcode: u16, word_count: usize) -> u32 {
    ((word_count as u32) << 16) | u32::from(opcode)
}

/// Declarations and decorations of a module, indexed by id.
pub struct ModuleIndex<'a> {
    pub instructions: Vec<Instruction<'a>>,
    defs: HashMap<u32, usize>,
    decorations: HashMap<(u32, u32), u32>,
}

impl<'a> ModuleIndex<'a> {
    pub fn new(words: &'a [u32]) -> Result<Self, ShapeInferenceError> {
        let instructions = instructions(words)?;
        let mut defs = HashMap::new();
        let mut decorations = HashMap::new();
        for (i, inst) in instructions.iter().enumerate() {
            if let Some(id) = inst.result_id() {
                defs.insert(id, i);
            }
            if inst.opcode == op::DECORATE && inst.operands.len() >= 3 {
                let kind = inst.operands[1];
                if kind == decoration::BINDING || kind == decoration::DESCRIPTOR_SET {
                    decorations.insert((inst.operands[0], kind), inst.operands[2]);
                }
            }
        }
        Ok(Self {
            instructions,
            defs,
            decorations,
        })
    }

    /// Returns the instruction declaring `id`.
    pub fn def(&self, id: u32) -> Result<&Instruction<'a>, ShapeInferenceError> {
        self.defs
            .get(&id)
            .map(|&i| &self.instructions[i])
            .ok_or(ShapeInferenceError::UndeclaredId(id))
    }

    /// Position of the declaring instruction in [`Self::instructions`].
    pub fn def_position(&self, id: u32) -> Option<usize> {
        self.defs.get(&id).copied()
    }

    pub fn decoration(&self, id: u32, kind: u32) -> Option<u32> {
        self.decorations.get(&(id, kind)).copied()
    }

    /// All `OpVariable` instructions, in module order.
    pub fn variables(&self) -> impl Iterator<Item = &Instruction<'a>> {
        self.instructions.iter().filter(|i| i.opcode == op::VARIABLE)
    }

    /// Follows a variable to its tensor type through its pointer type.
    /// Returns `None` if the pointee is not a tensor.
    pub fn tensor_type_of(&self, variable: &Instruction<'a>) -> Result<Option<&Instruction<'a>>, ShapeInferenceError> {
        let ptr_id = variable
            .operand(0)
            .ok_or_else(|| ShapeInferenceError::MalformedCode("OpVariable without type".into()))?;
        let ptr = self.def(ptr_id)?;
        if ptr.opcode != op::TYPE_POINTER {
            return Ok(None);
        }
        let pointee_id = ptr
            .operand(2)
            .ok_or_else(|| ShapeInferenceError::MalformedCode("OpTypePointer without pointee".into()))?;
        let pointee = self.def(pointee_id)?;
        if pointee.opcode != op::TYPE_TENSOR_ARM {
            return Ok(None);
        }
        if pointee.operands.len() < 2 {
            return Err(ShapeInferenceError::MalformedCode(format!(
                "OpTypeTensorARM %{pointee_id} has no element type"
            )));
        }
        Ok(Some(pointee))
    }

    /// Reads an `OpConstant` value, or `None` if `id` is not one.
    pub fn constant_value(&self, id: u32) -> Result<Option<u32>, ShapeInferenceError> {
        let def = self.def(id)?;
        Ok((def.opcode == op::CONSTANT).then(|| def.operand(2)).flatten())
    }
}
