// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The shape-inference entry point.
//!
//! ```text
//!   code ──► ShapePropagator ──► rewritten code ──► extract ──► (set, binding) → dims
//!             (seeded with input shapes)
//! ```

use std::collections::BTreeMap;

use tensor_core::SymbolicShape;

use crate::propagate::{BindingKey, InputShapeMap, ShapePropagator};
use crate::spirv::{decoration, op, ModuleIndex};
use crate::ShapeInferenceError;

/// Resolved shapes for every tensor variable found in the rewritten code.
pub type BindingShapeMap = BTreeMap<BindingKey, SymbolicShape>;

/// Result of a successful inference run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceOutput {
    /// The rewritten kernel code.
    pub code: Vec<u32>,
    pub shapes: BindingShapeMap,
}

/// Runs `propagator` over `code` seeded with `inputs`, then reads back the
/// shape of every tensor variable.
///
/// Pure: the same arguments always yield the same output. Any failure
/// returns an error and no partial shapes.
pub fn infer(
    code: &[u32],
    inputs: &InputShapeMap,
    propagator: &dyn ShapePropagator,
) -> Result<InferenceOutput, ShapeInferenceError> {
    let rewritten = propagator.propagate(code, inputs).map_err(|e| {
        tracing::debug!(pass = propagator.name(), error = %e, "Shape propagation failed");
        e
    })?;
    let shapes = extract_shapes(&rewritten)?;
    tracing::debug!(
        pass = propagator.name(),
        inputs = inputs.len(),
        tensors = shapes.len(),
        "Shape inference complete"
    );
    Ok(InferenceOutput {
        code: rewritten,
        shapes,
    })
}

/// Reads `(set, binding) → shape` for every tensor variable with a
/// constant shape.
///
/// Non-tensor variables and tensor types without a constant-composite
/// shape are skipped. Dimensions `<= 0` (as signed 32-bit) become unknown.
pub fn extract_shapes(code: &[u32]) -> Result<BindingShapeMap, ShapeInferenceError> {
    let index = ModuleIndex::new(code)?;
    let mut shapes = BindingShapeMap::new();

    for var in index.variables() {
        let Some(tensor) = index.tensor_type_of(var)? else {
            continue;
        };
        let Some(shape_id) = tensor.operand(3) else {
            continue;
        };
        let composite = index.def(shape_id)?;
        if composite.opcode != op::CONSTANT_COMPOSITE {
            continue;
        }

        let var_id = var
            .result_id()
            .ok_or_else(|| ShapeInferenceError::MalformedCode("OpVariable without id".into()))?;
        let set = index
            .decoration(var_id, decoration::DESCRIPTOR_SET)
            .ok_or(ShapeInferenceError::MissingDecoration {
                variable: var_id,
                decoration: "DescriptorSet",
            })?;
        let binding = index
            .decoration(var_id, decoration::BINDING)
            .ok_or(ShapeInferenceError::MissingDecoration {
                variable: var_id,
                decoration: "Binding",
            })?;
        let key = BindingKey::new(set, binding);

        let dims = composite.operands[2..]
            .iter()
            .map(|&dim| {
                index
                    .constant_value(dim)?
                    .map(|value| i64::from(value as i32))
                    .ok_or(ShapeInferenceError::NonConstantDimension { key, dim })
            })
            .collect::<Result<Vec<_>, _>>()?;
        shapes.insert(key, SymbolicShape::new(dims));
    }

    Ok(shapes)
}
