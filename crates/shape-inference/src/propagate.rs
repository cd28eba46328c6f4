// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Shape-propagation passes.
//!
//! A [`ShapePropagator`] rewrites kernel code so that tensor types carry
//! the concrete shapes implied by a set of input shapes. Full propagation
//! through graph operations is the job of an external optimizer; the
//! built-in [`InputShapeSeeder`] handles the common case where outputs share
//! a tensor type with an input or already declare a concrete shape.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tensor_core::TensorShape;

use crate::spirv::{self, decoration, head, op, Instruction, ModuleIndex};
use crate::ShapeInferenceError;

/// Descriptor coordinates of a tensor variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingKey {
    pub set: u32,
    pub binding: u32,
}

impl BindingKey {
    pub fn new(set: u32, binding: u32) -> Self {
        Self { set, binding }
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(set {}, binding {})", self.set, self.binding)
    }
}

/// Concrete input shapes keyed by binding.
pub type InputShapeMap = BTreeMap<BindingKey, TensorShape>;

/// A pass that rewrites kernel code given concrete input shapes.
///
/// Implementations must be deterministic: the same code and shapes always
/// produce the same output.
pub trait ShapePropagator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Returns the rewritten code, or an error if the shapes are rejected.
    fn propagate(&self, code: &[u32], inputs: &InputShapeMap) -> Result<Vec<u32>, ShapeInferenceError>;
}

/// Writes the supplied input shapes into the tensor types of the bound
/// variables.
///
/// For every seeded binding, fresh dimension constants and a fresh shape
/// composite are inserted right before the variable's tensor type, and the
/// type's shape operand is repointed at them. Variables sharing that type
/// see the new shape as well.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputShapeSeeder;

/// Per-tensor-type rewrite plan.
struct Seed {
    type_id: u32,
    shape: TensorShape,
}

impl ShapePropagator for InputShapeSeeder {
    fn name(&self) -> &str {
        "input-shape-seeder"
    }

    fn propagate(&self, code: &[u32], inputs: &InputShapeMap) -> Result<Vec<u32>, ShapeInferenceError> {
        let index = ModuleIndex::new(code)?;

        let mut by_binding: HashMap<BindingKey, &Instruction<'_>> = HashMap::new();
        for var in index.variables() {
            let Some(id) = var.result_id() else { continue };
            if let (Some(set), Some(binding)) = (
                index.decoration(id, decoration::DESCRIPTOR_SET),
                index.decoration(id, decoration::BINDING),
            ) {
                by_binding.insert(BindingKey::new(set, binding), var);
            }
        }

        let mut seeds: Vec<Seed> = Vec::new();
        for (key, shape) in inputs {
            let var = by_binding
                .get(key)
                .ok_or_else(|| ShapeInferenceError::Rejected(format!("no variable bound at {key}")))?;
            let tensor = index.tensor_type_of(var)?.ok_or_else(|| {
                ShapeInferenceError::Rejected(format!("variable at {key} is not a tensor"))
            })?;
            let type_id = tensor
                .result_id()
                .ok_or_else(|| ShapeInferenceError::MalformedCode("tensor type without id".into()))?;

            check_declared(&index, tensor, key, shape)?;

            match seeds.iter().find(|s| s.type_id == type_id) {
                Some(existing) if existing.shape != *shape => {
                    return Err(ShapeInferenceError::Rejected(format!(
                        "conflicting shapes {} and {shape} for tensor type %{type_id}",
                        existing.shape
                    )));
                }
                Some(_) => {}
                None => seeds.push(Seed {
                    type_id,
                    shape: shape.clone(),
                }),
            }
        }

        if seeds.is_empty() {
            return Ok(code.to_vec());
        }
        rewrite(code, &index, &seeds)
    }
}

/// Rejects a seed whose rank or fixed dimensions contradict the declaration.
fn check_declared(
    index: &ModuleIndex<'_>,
    tensor: &Instruction<'_>,
    key: &BindingKey,
    shape: &TensorShape,
) -> Result<(), ShapeInferenceError> {
    if let Some(rank_id) = tensor.operand(2) {
        let rank = index.constant_value(rank_id)?.ok_or_else(|| {
            ShapeInferenceError::Rejected(format!("tensor rank at {key} is not a constant"))
        })?;
        if rank as usize != shape.rank() {
            return Err(ShapeInferenceError::Rejected(format!(
                "rank mismatch at {key}: declared {rank}, got {}",
                shape.rank()
            )));
        }
    }
    if let Some(shape_id) = tensor.operand(3) {
        let composite = index.def(shape_id)?;
        if composite.opcode == op::CONSTANT_COMPOSITE {
            let declared = &composite.operands[2..];
            if declared.len() != shape.rank() {
                return Err(ShapeInferenceError::Rejected(format!(
                    "rank mismatch at {key}: declared {}, got {}",
                    declared.len(),
                    shape.rank()
                )));
            }
            for (&dim_id, &actual) in declared.iter().zip(shape.dims()) {
                if let Some(value) = index.constant_value(dim_id)? {
                    if (value as i32) > 0 && value != actual {
                        return Err(ShapeInferenceError::Rejected(format!(
                            "shape {shape} at {key} contradicts declared dimension {value}"
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}

fn find_uint32(index: &ModuleIndex<'_>) -> Option<u32> {
    index
        .instructions
        .iter()
        .find(|i| i.opcode == op::TYPE_INT && i.operand(1) == Some(32) && i.operand(2) == Some(0))
        .and_then(|i| i.result_id())
}

fn rewrite(code: &[u32], index: &ModuleIndex<'_>, seeds: &[Seed]) -> Result<Vec<u32>, ShapeInferenceError> {
    let mut next_id = code[spirv::ID_BOUND_WORD];
    let mut fresh = || {
        let id = next_id;
        next_id = next_id
            .checked_add(1)
            .ok_or_else(|| ShapeInferenceError::MalformedCode("id bound exhausted".into()))?;
        Ok::<u32, ShapeInferenceError>(id)
    };

    let existing_uint = find_uint32(index);
    let uint32 = match existing_uint {
        Some(id) => id,
        None => fresh()?,
    };

    // Positions of the tensor types being rewritten, and their seeds.
    let mut plan: HashMap<usize, &Seed> = HashMap::new();
    for seed in seeds {
        let pos = index
            .def_position(seed.type_id)
            .ok_or(ShapeInferenceError::UndeclaredId(seed.type_id))?;
        plan.insert(pos, seed);
    }
    let first_rewrite = plan.keys().copied().min().unwrap_or(0);

    let mut out = Vec::with_capacity(code.len() + seeds.len() * 16);
    out.extend_from_slice(&code[..spirv::HEADER_WORDS]);

    for (pos, inst) in index.instructions.iter().enumerate() {
        if pos == first_rewrite && existing_uint.is_none() {
            out.extend_from_slice(&[head(op::TYPE_INT, 4), uint32, 32, 0]);
        }
        let raw = &code[inst.offset..inst.offset + inst.word_count()];
        let Some(seed) = plan.get(&pos) else {
            out.extend_from_slice(raw);
            continue;
        };

        let dims = seed.shape.dims();
        let mut dim_ids = Vec::with_capacity(dims.len());
        for &d in dims {
            let id = fresh()?;
            out.extend_from_slice(&[head(op::CONSTANT, 4), uint32, id, d]);
            dim_ids.push(id);
        }
        let rank = fresh()?;
        out.extend_from_slice(&[head(op::CONSTANT, 4), uint32, rank, dims.len() as u32]);
        let array = fresh()?;
        out.extend_from_slice(&[head(op::TYPE_ARRAY, 4), array, uint32, rank]);
        let composite = fresh()?;
        out.push(head(op::CONSTANT_COMPOSITE, 3 + dim_ids.len()));
        out.extend_from_slice(&[array, composite]);
        out.extend_from_slice(&dim_ids);

        // OpTypeTensorARM %id %elem [%rank [%shape]]
        let (Some(type_id), Some(elem)) = (inst.operand(0), inst.operand(1)) else {
            return Err(ShapeInferenceError::MalformedCode(format!(
                "tensor type at word {} has no element type",
                inst.offset
            )));
        };
        let rank_operand = inst.operand(2).unwrap_or(rank);
        out.extend_from_slice(&[head(op::TYPE_TENSOR_ARM, 5), type_id, elem, rank_operand, composite]);
    }

    out[spirv::ID_BOUND_WORD] = next_id;
    tracing::trace!(
        seeded = seeds.len(),
        words_before = code.len(),
        words_after = out.len(),
        "Seeded tensor shapes"
    );
    Ok(out)
}
