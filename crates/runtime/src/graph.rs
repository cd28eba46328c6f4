// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Host graph-builder interface.
//!
//! The runtime does not own a frame graph. It declares buffers and a pass
//! on whatever [`GraphBuilder`] the host hands it, and does its device work
//! inside the pass callback once the host has backed every buffer with
//! memory.
//!
//! ```text
//!   enqueue ──► create_buffer / register_external ──► add_pass(fn)
//!                                                        │
//!   host executes graph ──► fn(&PassResources) ──► record dispatches
//! ```
//!
//! [`LocalGraph`] is a minimal host that runs passes in declaration order.

use std::collections::HashMap;

use device_context::{DeviceContext, Handle, MemoryBinding, ObjectDesc};

use crate::RuntimeError;

/// A buffer declared on a [`GraphBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphBuffer(u32);

impl GraphBuffer {
    pub fn index(&self) -> u32 {
        self.0
    }
}

/// A device buffer owned by the caller and lent to a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalBuffer {
    pub name: String,
    pub buffer: Handle,
    pub size: u64,
}

impl ExternalBuffer {
    /// Allocates a device buffer for the caller to own.
    pub fn allocate(ctx: &DeviceContext, size: u64, name: &str) -> Result<Self, RuntimeError> {
        let buffer = ctx.create(ObjectDesc::Buffer {
            size,
            name: name.to_string(),
        })?;
        Ok(Self {
            name: name.to_string(),
            buffer,
            size,
        })
    }

    /// Destroys the device buffer.
    pub fn release(self, ctx: &DeviceContext) -> Result<(), RuntimeError> {
        ctx.destroy(self.buffer)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

/// How a pass uses a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferAccess {
    pub buffer: GraphBuffer,
    pub access: Access,
}

impl BufferAccess {
    pub fn new(buffer: GraphBuffer, access: Access) -> Self {
        Self { buffer, access }
    }
}

/// Memory backing each buffer, handed to a pass when it runs.
#[derive(Debug, Default)]
pub struct PassResources {
    memory: HashMap<GraphBuffer, MemoryBinding>,
}

impl PassResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, buffer: GraphBuffer, memory: MemoryBinding) {
        self.memory.insert(buffer, memory);
    }

    pub fn memory(&self, buffer: GraphBuffer) -> Result<MemoryBinding, RuntimeError> {
        self.memory.get(&buffer).copied().ok_or_else(|| {
            RuntimeError::Usage(format!("graph buffer {} has no memory", buffer.0))
        })
    }
}

/// The body of a pass.
pub type PassFn = Box<dyn FnOnce(&PassResources) -> Result<(), RuntimeError> + Send>;

/// The host-side graph the runtime declares its work on.
pub trait GraphBuilder {
    /// Declares a transient buffer the graph allocates.
    fn create_buffer(&mut self, size: u64, name: &str) -> GraphBuffer;

    /// Brings a caller-owned buffer into the graph.
    fn register_external(&mut self, buffer: ExternalBuffer) -> GraphBuffer;

    fn buffer_size(&self, buffer: GraphBuffer) -> Option<u64>;

    fn add_pass(&mut self, name: &str, accesses: Vec<BufferAccess>, pass: PassFn);
}

#[derive(Debug)]
enum LocalBuffer {
    Transient { size: u64, name: String },
    External(ExternalBuffer),
}

impl LocalBuffer {
    fn size(&self) -> u64 {
        match self {
            Self::Transient { size, .. } => *size,
            Self::External(buffer) => buffer.size,
        }
    }
}

struct Pass {
    name: String,
    accesses: Vec<BufferAccess>,
    run: PassFn,
}

/// A [`GraphBuilder`] that executes its passes in order on the calling
/// thread.
///
/// Transient buffers are created when [`LocalGraph::execute`] starts and
/// destroyed once every pass has been recorded.
pub struct LocalGraph {
    ctx: DeviceContext,
    buffers: Vec<LocalBuffer>,
    passes: Vec<Pass>,
}

impl LocalGraph {
    pub fn new(ctx: DeviceContext) -> Self {
        Self {
            ctx,
            buffers: Vec::new(),
            passes: Vec::new(),
        }
    }

    pub fn num_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn num_transient_buffers(&self) -> usize {
        self.buffers
            .iter()
            .filter(|b| matches!(b, LocalBuffer::Transient { .. }))
            .count()
    }

    pub fn num_passes(&self) -> usize {
        self.passes.len()
    }

    /// Runs every pass in declaration order.
    ///
    /// Stops at the first failing pass. Transients are destroyed either way.
    pub fn execute(self) -> Result<(), RuntimeError> {
        let mut resources = PassResources::new();
        let mut transients = Vec::new();

        let mut result = Ok(());
        for (index, buffer) in self.buffers.iter().enumerate() {
            let graph_buffer = GraphBuffer(index as u32);
            let memory = match buffer {
                LocalBuffer::External(external) => MemoryBinding::whole(external.buffer),
                LocalBuffer::Transient { size, name } => {
                    match self.ctx.create(ObjectDesc::Buffer {
                        size: *size,
                        name: name.clone(),
                    }) {
                        Ok(handle) => {
                            transients.push(handle);
                            MemoryBinding::whole(handle)
                        }
                        Err(e) => {
                            result = Err(e.into());
                            break;
                        }
                    }
                }
            };
            resources.insert(graph_buffer, memory);
        }

        if result.is_ok() {
            for pass in self.passes {
                tracing::debug!(pass = %pass.name, accesses = pass.accesses.len(), "Executing pass");
                if let Err(e) = (pass.run)(&resources) {
                    tracing::error!(pass = %pass.name, error = %e, "Pass failed");
                    result = Err(e);
                    break;
                }
            }
        }

        if !transients.is_empty() {
            let released = self.ctx.call(move |device| {
                for handle in transients {
                    device.destroy_object(handle)?;
                }
                Ok(())
            });
            if let Err(e) = released {
                tracing::error!(error = %e, "Failed to release transient buffers");
                result = result.and(Err(e.into()));
            }
        }
        result
    }
}

impl GraphBuilder for LocalGraph {
    fn create_buffer(&mut self, size: u64, name: &str) -> GraphBuffer {
        self.buffers.push(LocalBuffer::Transient {
            size,
            name: name.to_string(),
        });
        GraphBuffer((self.buffers.len() - 1) as u32)
    }

    fn register_external(&mut self, buffer: ExternalBuffer) -> GraphBuffer {
        self.buffers.push(LocalBuffer::External(buffer));
        GraphBuffer((self.buffers.len() - 1) as u32)
    }

    fn buffer_size(&self, buffer: GraphBuffer) -> Option<u64> {
        self.buffers.get(buffer.0 as usize).map(LocalBuffer::size)
    }

    fn add_pass(&mut self, name: &str, accesses: Vec<BufferAccess>, pass: PassFn) {
        self.passes.push(Pass {
            name: name.to_string(),
            accesses,
            run: pass,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_context::{HeadlessDevice, ObjectKind};
    use std::sync::{Arc, Mutex};

    fn context(device: &HeadlessDevice) -> DeviceContext {
        DeviceContext::spawn(device.clone(), "graph-test").unwrap()
    }

    #[test]
    fn test_passes_run_in_order_with_memory() {
        let device = HeadlessDevice::new();
        let ctx = context(&device);
        let external = ExternalBuffer::allocate(&ctx, 32, "ext").unwrap();
        let ext_handle = external.buffer;

        let mut graph = LocalGraph::new(ctx.clone());
        let t = graph.create_buffer(64, "transient");
        let e = graph.register_external(external.clone());
        assert_eq!(graph.buffer_size(t), Some(64));
        assert_eq!(graph.buffer_size(e), Some(32));
        assert_eq!(graph.buffer_size(GraphBuffer(9)), None);

        let order = Arc::new(Mutex::new(Vec::new()));
        for label in ["first", "second"] {
            let order = Arc::clone(&order);
            graph.add_pass(
                label,
                vec![BufferAccess::new(t, Access::Write), BufferAccess::new(e, Access::Read)],
                Box::new(move |res: &PassResources| {
                    assert_eq!(res.memory(e)?.buffer, ext_handle);
                    assert_eq!(res.memory(t)?.buffer.kind(), ObjectKind::Buffer);
                    order.lock().unwrap().push(label);
                    Ok(())
                }),
            );
        }
        assert_eq!(graph.num_passes(), 2);
        assert_eq!(graph.num_transient_buffers(), 1);
        graph.execute().unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
        // Only the external buffer survives.
        assert_eq!(device.live_objects(ObjectKind::Buffer), 1);
        external.release(&ctx).unwrap();
        assert_eq!(device.live_objects(ObjectKind::Buffer), 0);
    }

    #[test]
    fn test_failed_pass_stops_and_frees_transients() {
        let device = HeadlessDevice::new();
        let ctx = context(&device);
        let mut graph = LocalGraph::new(ctx);
        graph.create_buffer(8, "t");
        let ran = Arc::new(Mutex::new(false));
        graph.add_pass("fail", vec![], Box::new(|_: &PassResources| Err(RuntimeError::Usage("boom".into()))));
        let ran2 = Arc::clone(&ran);
        graph.add_pass(
            "after",
            vec![],
            Box::new(move |_: &PassResources| {
                *ran2.lock().unwrap() = true;
                Ok(())
            }),
        );
        assert!(matches!(graph.execute(), Err(RuntimeError::Usage(_))));
        assert!(!*ran.lock().unwrap());
        assert_eq!(device.live_objects(ObjectKind::Buffer), 0);
    }

    #[test]
    fn test_missing_memory_is_usage_error() {
        let res = PassResources::new();
        assert!(matches!(res.memory(GraphBuffer(0)), Err(RuntimeError::Usage(_))));
    }
}
