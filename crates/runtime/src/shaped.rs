// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The shaped model: one concrete input-shape tuple applied to an
//! [`UnshapedModel`].
//!
//! ```text
//!  input shapes ──► seed model inputs
//!                    │
//!   for each segment, in sequence order:
//!     input bindings ──► infer(code) ──► output shapes written back
//!                                    └─► shader module + pipeline
//!                    │
//!  output shapes, per-tensor byte sizes
//! ```
//!
//! Segment order is the only producer-before-consumer guarantee. A segment
//! reading a tensor nothing has produced yet is rejected.

use std::sync::Arc;

use device_context::{Handle, ObjectDesc, PipelineConstant, PipelineDesc, PipelineResource};
use shape_inference::{spirv, BindingKey, InputShapeMap, ShapeInferenceError};
use tensor_core::{SymbolicShape, TensorShape};

use crate::objects::DeviceObjects;
use crate::unshaped::{ShapeList, UnshapedSegment};
use crate::{RuntimeError, UnshapedModel};

/// Resolved shape and size of one tensor id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapedTensor {
    pub shape: TensorShape,
    pub num_bytes: u64,
}

#[derive(Debug)]
pub(crate) struct ShapedSegment {
    pub(crate) pipeline: Handle,
}

/// A model specialised to one input-shape tuple, with compiled pipelines.
///
/// Shared by every instance bound to the same shapes; the parent's cache
/// only holds a weak reference to it.
pub struct ShapedModel {
    input_shapes: Vec<TensorShape>,
    output_shapes: Vec<TensorShape>,
    tensors: Vec<ShapedTensor>,
    segments: Vec<ShapedSegment>,
    // Pipelines go before the parent's layouts.
    objects: DeviceObjects,
    parent: Arc<UnshapedModel>,
}

impl ShapedModel {
    pub(crate) fn build(
        parent: Arc<UnshapedModel>,
        input_shapes: &[TensorShape],
    ) -> Result<Self, RuntimeError> {
        let expected = parent.input_descs().len();
        if input_shapes.len() != expected {
            return Err(RuntimeError::Usage(format!(
                "model has {expected} inputs, {} shapes given",
                input_shapes.len()
            )));
        }

        let mut resolved: Vec<Option<SymbolicShape>> = vec![None; parent.tensors().len()];
        for (&tensor, shape) in parent.input_tensors().iter().zip(input_shapes) {
            resolved[tensor as usize] = Some(shape.to_symbolic());
        }

        let mut objects = DeviceObjects::new(parent.context().clone());
        let mut segments = Vec::with_capacity(parent.segments().len());
        for segment in parent.segments() {
            let pipeline = build_segment(&parent, segment, &mut resolved, &mut objects)?;
            segments.push(ShapedSegment { pipeline });
        }

        let mut tensors = Vec::with_capacity(resolved.len());
        for (id, (shape, info)) in resolved.iter().zip(parent.tensors()).enumerate() {
            let tensor = id as u32;
            let shape = concrete(tensor, shape.as_ref().unwrap_or(&info.declared))?;
            let element_size = info.format.element_size();
            if element_size == 0 {
                return Err(RuntimeError::UnsupportedFormat {
                    tensor,
                    format: info.format,
                });
            }
            let num_bytes = shape
                .size_bytes(element_size)
                .ok_or_else(|| RuntimeError::ShapeTooLarge {
                    tensor,
                    shape: shape.clone(),
                })?;
            tensors.push(ShapedTensor { shape, num_bytes });
        }

        let output_shapes: Vec<TensorShape> = parent
            .output_tensors()
            .iter()
            .map(|&t| tensors[t as usize].shape.clone())
            .collect();

        tracing::info!(
            inputs = %ShapeList(input_shapes),
            outputs = %ShapeList(&output_shapes),
            segments = segments.len(),
            "Shaped model built"
        );

        Ok(Self {
            input_shapes: input_shapes.to_vec(),
            output_shapes,
            tensors,
            segments,
            objects,
            parent,
        })
    }

    pub fn input_shapes(&self) -> &[TensorShape] {
        &self.input_shapes
    }

    pub fn output_shapes(&self) -> &[TensorShape] {
        &self.output_shapes
    }

    /// Shapes and sizes of every tensor id.
    pub fn tensors(&self) -> &[ShapedTensor] {
        &self.tensors
    }

    pub fn unshaped(&self) -> &Arc<UnshapedModel> {
        &self.parent
    }

    /// Device objects owned by this shaped model.
    pub fn num_device_objects(&self) -> usize {
        self.objects.len()
    }

    pub(crate) fn segments(&self) -> &[ShapedSegment] {
        &self.segments
    }
}

impl std::fmt::Debug for ShapedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapedModel")
            .field("input_shapes", &self.input_shapes)
            .field("output_shapes", &self.output_shapes)
            .field("segments", &self.segments.len())
            .finish()
    }
}

fn concrete(tensor: u32, shape: &SymbolicShape) -> Result<TensorShape, RuntimeError> {
    shape.to_concrete().ok_or_else(|| RuntimeError::UnresolvedShape {
        tensor,
        shape: shape.clone(),
    })
}

/// Infers one segment's output shapes and creates its pipeline.
fn build_segment(
    parent: &UnshapedModel,
    segment: &UnshapedSegment,
    resolved: &mut [Option<SymbolicShape>],
    objects: &mut DeviceObjects,
) -> Result<Handle, RuntimeError> {
    let inference_error = |source: ShapeInferenceError| {
        tracing::error!(segment = %segment.name, error = %source, "Shape inference failed");
        RuntimeError::ShapeInference {
            segment: segment.name.clone(),
            source,
        }
    };

    let mut seeds = InputShapeMap::new();
    for input in segment.inputs() {
        let shape = resolved[input.tensor as usize]
            .as_ref()
            .ok_or_else(|| RuntimeError::SegmentOrder {
                segment: segment.name.clone(),
                tensor: input.tensor,
            })?;
        seeds.insert(BindingKey::new(0, input.binding), concrete(input.tensor, shape)?);
    }

    let code = spirv::words_from_bytes(segment.code.as_slice()).map_err(inference_error)?;
    let inferred =
        shape_inference::infer(&code, &seeds, parent.propagator()).map_err(inference_error)?;

    for output in segment.outputs() {
        let shape = inferred
            .shapes
            .get(&BindingKey::new(0, output.binding))
            .ok_or_else(|| {
                inference_error(ShapeInferenceError::Rejected(format!(
                    "no shape for output binding {}",
                    output.binding
                )))
            })?;
        let declared = &parent.tensors()[output.tensor as usize].declared;
        if let Some(concrete) = shape.to_concrete() {
            if !declared.accepts(&concrete) {
                tracing::warn!(
                    segment = %segment.name,
                    tensor = output.tensor,
                    %declared,
                    inferred = %concrete,
                    "Inferred shape differs from declaration"
                );
            }
        }
        resolved[output.tensor as usize] = Some(shape.clone());
    }

    let mut resources = Vec::with_capacity(segment.bindings.len());
    for binding in &segment.bindings {
        let info = &parent.tensors()[binding.tensor as usize];
        if info.format.element_size() == 0 {
            return Err(RuntimeError::UnsupportedFormat {
                tensor: binding.tensor,
                format: info.format,
            });
        }
        let shape = match &resolved[binding.tensor as usize] {
            Some(shape) => concrete(binding.tensor, shape)?,
            None => {
                return Err(RuntimeError::SegmentOrder {
                    segment: segment.name.clone(),
                    tensor: binding.tensor,
                })
            }
        };
        resources.push(PipelineResource {
            set: 0,
            binding: binding.binding,
            format: info.format,
            dims: shape.dims().to_vec(),
        });
    }

    let constants = segment
        .constants
        .iter()
        .map(|c| PipelineConstant {
            id: c.id,
            format: c.format,
            dims: c.dims.clone(),
            data: c.data.clone(),
        })
        .collect();

    tracing::debug!(
        segment = %segment.name,
        seeds = seeds.len(),
        resources = resources.len(),
        "Creating segment pipeline"
    );
    let module = objects.create(ObjectDesc::ShaderModule {
        code: inferred.code,
    })?;
    objects.create(ObjectDesc::Pipeline(PipelineDesc {
        layout: segment.pipeline_layout,
        module,
        entry_point: segment.entry_point.clone(),
        constants,
        resources,
    }))
}
