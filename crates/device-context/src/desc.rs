// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Object creation descriptions.

use model_container::ByteView;
use tensor_core::TensorFormat;

use crate::{Handle, ObjectKind};

/// One binding slot of a binding layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutBinding {
    pub binding: u32,
    pub descriptor_count: u32,
}

/// A constant tensor embedded in a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConstant {
    /// Position of the constant among the segment's constants.
    pub id: u32,
    pub format: TensorFormat,
    pub dims: Vec<i64>,
    pub data: ByteView,
}

/// Resolved description of one tensor bound to a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineResource {
    pub set: u32,
    pub binding: u32,
    pub format: TensorFormat,
    pub dims: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct PipelineDesc {
    pub layout: Handle,
    pub module: Handle,
    pub entry_point: String,
    pub constants: Vec<PipelineConstant>,
    pub resources: Vec<PipelineResource>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorObjectDesc {
    pub format: TensorFormat,
    pub dims: Vec<u32>,
}

impl TensorObjectDesc {
    /// Dense byte size, or 0 for an unsupported format.
    pub fn size_bytes(&self) -> u64 {
        self.dims
            .iter()
            .fold(self.format.element_size() as u64, |acc, &d| {
                acc.saturating_mul(u64::from(d))
            })
    }
}

/// What to create with [`Device::create_object`](crate::Device::create_object).
#[derive(Debug, Clone)]
pub enum ObjectDesc {
    BindingLayout { bindings: Vec<LayoutBinding> },
    PipelineLayout { binding_layout: Handle },
    ShaderModule { code: Vec<u32> },
    Pipeline(PipelineDesc),
    PipelineSession { pipeline: Handle },
    DescriptorPool { max_sets: u32, descriptor_count: u32 },
    Buffer { size: u64, name: String },
    Tensor(TensorObjectDesc),
    TensorView { tensor: Handle },
    Fence,
}

impl ObjectDesc {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::BindingLayout { .. } => ObjectKind::BindingLayout,
            Self::PipelineLayout { .. } => ObjectKind::PipelineLayout,
            Self::ShaderModule { .. } => ObjectKind::ShaderModule,
            Self::Pipeline(_) => ObjectKind::Pipeline,
            Self::PipelineSession { .. } => ObjectKind::PipelineSession,
            Self::DescriptorPool { .. } => ObjectKind::DescriptorPool,
            Self::Buffer { .. } => ObjectKind::Buffer,
            Self::Tensor(_) => ObjectKind::Tensor,
            Self::TensorView { .. } => ObjectKind::TensorView,
            Self::Fence => ObjectKind::Fence,
        }
    }
}
