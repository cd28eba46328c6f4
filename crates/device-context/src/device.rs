// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The device trait consumed by the runtime.

use crate::{DeviceError, Handle, ObjectDesc};

/// Features a device reports once at startup.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Capabilities {
    pub device_name: String,
    pub tensors: bool,
    pub data_graph: bool,
}

/// A range of a buffer backing a tensor or a pipeline session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBinding {
    pub buffer: Handle,
    pub offset: u64,
}

impl MemoryBinding {
    pub fn whole(buffer: Handle) -> Self {
        Self { buffer, offset: 0 }
    }
}

/// Points a descriptor binding at a tensor view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorWrite {
    pub binding: u32,
    pub view: Handle,
}

/// A recorded command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    BindDescriptorSet { layout: Handle, set: Handle },
    BindPipeline(Handle),
    DispatchGraph { session: Handle },
}

/// A compute device able to run data-graph pipelines.
///
/// Implementations take `&self` and use interior mutability; callers are
/// expected to confine all calls to one thread through a
/// [`DeviceContext`](crate::DeviceContext).
pub trait Device: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    fn create_object(&self, desc: &ObjectDesc) -> Result<Handle, DeviceError>;

    /// Destroys any object except descriptor sets, which go back to their
    /// pool through [`Device::free_descriptor_sets`].
    fn destroy_object(&self, handle: Handle) -> Result<(), DeviceError>;

    /// Working-memory bytes a pipeline session needs.
    fn memory_requirement(&self, session: Handle) -> Result<u64, DeviceError>;

    /// Backs a tensor or pipeline session with buffer memory.
    fn bind_memory(&self, target: Handle, memory: MemoryBinding) -> Result<(), DeviceError>;

    fn allocate_descriptor_set(&self, pool: Handle, layout: Handle) -> Result<Handle, DeviceError>;

    fn write_descriptor_set(&self, set: Handle, writes: &[DescriptorWrite]) -> Result<(), DeviceError>;

    fn free_descriptor_sets(&self, pool: Handle, sets: &[Handle]) -> Result<(), DeviceError>;

    fn record(&self, command: Command) -> Result<(), DeviceError>;

    /// Submits recorded work with `fence` signaled on completion.
    fn write_fence(&self, fence: Handle) -> Result<(), DeviceError>;

    fn is_fence_signaled(&self, fence: Handle) -> Result<bool, DeviceError>;

    /// Pushes pending submissions toward completion.
    fn flush(&self) -> Result<(), DeviceError>;
}
