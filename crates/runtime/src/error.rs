// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the runtime.

use tensor_core::{SymbolicShape, TensorFormat, TensorShape};

/// Errors that can occur while loading, shaping or executing a model.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The container is malformed or uses an unsupported feature.
    #[error("container error: {0}")]
    Container(#[from] model_container::ContainerError),

    /// A device call failed.
    #[error("device error: {0}")]
    Device(#[from] device_context::DeviceError),

    /// Shape inference rejected a segment's kernel.
    #[error("shape inference failed for segment '{segment}': {source}")]
    ShapeInference {
        segment: String,
        #[source]
        source: shape_inference::ShapeInferenceError,
    },

    /// A segment consumes a tensor no earlier segment or model input produced.
    #[error("segment '{segment}' reads tensor {tensor} before any shape is known for it")]
    SegmentOrder { segment: String, tensor: u32 },

    /// A tensor still has unknown dimensions after shape inference.
    #[error("tensor {tensor} has unresolved shape {shape}")]
    UnresolvedShape { tensor: u32, shape: SymbolicShape },

    /// A tensor's element format has no known size.
    #[error("tensor {tensor} has unsupported element format {format}")]
    UnsupportedFormat { tensor: u32, format: TensorFormat },

    /// A tensor's byte size does not fit in a `u64`.
    #[error("tensor {tensor} with shape {shape} is too large")]
    ShapeTooLarge { tensor: u32, shape: TensorShape },

    /// A caller-supplied buffer is smaller than its tensor.
    #[error("buffer for {name} too small: {actual} bytes, need {required}")]
    BufferTooSmall {
        name: String,
        required: u64,
        actual: u64,
    },

    /// Wrapped model data failed validation.
    #[error("invalid model data: {0}")]
    ModelData(String),

    /// The device cannot run data-graph models.
    #[error("inference not supported: {0}")]
    Unsupported(String),

    /// An operation was called with bad arguments or in the wrong state.
    #[error("usage error: {0}")]
    Usage(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
