// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Model instances: the executable tier.
//!
//! ```text
//!  Unbound ──set_input_shapes──► Bound { shaped model, sessions + memory }
//!     ▲                              │
//!     └──── unbind_shapes / drop ◄───┘   (waits for in-flight work)
//! ```
//!
//! Every method blocks on device-thread round trips; call them from a plain
//! thread (or `spawn_blocking`), never from inside an async task.

use std::sync::{Arc, Mutex, MutexGuard};

use device_context::{Handle, MemoryBinding, ObjectDesc, TensorObjectDesc};
use tensor_core::{TensorDesc, TensorShape};

use crate::graph::{Access, BufferAccess, ExternalBuffer, GraphBuffer, GraphBuilder, PassResources};
use crate::metrics::InstanceStats;
use crate::objects::DeviceObjects;
use crate::queue::{DispatchPlan, ExecutionQueue, SegmentDispatch};
use crate::{RuntimeError, ShapedModel, UnshapedModel};

/// Name of the pass an instance adds on every enqueue.
pub const ENQUEUE_PASS_NAME: &str = "dgrt.enqueue";

struct SessionMemory {
    name: String,
    buffer: Handle,
    size: u64,
}

struct BoundState {
    shaped: Arc<ShapedModel>,
    plan: Arc<DispatchPlan>,
    sessions: Vec<SessionMemory>,
    // Sessions and their memory; dropped before `shaped` releases pipelines.
    _objects: DeviceObjects,
}

/// An executable instance of a model.
///
/// Owns a descriptor pool sized for `segments × max_concurrent_executions`
/// sets and, while bound, one pipeline session with backing memory per
/// segment.
pub struct ModelInstance {
    bound: Option<BoundState>,
    queue: Arc<Mutex<ExecutionQueue>>,
    pool: Handle,
    // The pool; dropped after `bound`.
    _objects: DeviceObjects,
    model: Arc<UnshapedModel>,
}

impl ModelInstance {
    pub(crate) fn new(model: Arc<UnshapedModel>) -> Result<Self, RuntimeError> {
        let config = model.config();
        let per_execution_sets = model.segments().len() as u32;
        let per_execution_descriptors: u32 = model
            .segments()
            .iter()
            .map(|s| s.bindings.len() as u32)
            .sum();
        let concurrency = config.max_concurrent_executions as u32;

        let mut objects = DeviceObjects::new(model.context().clone());
        let pool = objects.create(ObjectDesc::DescriptorPool {
            max_sets: (per_execution_sets * concurrency).max(1),
            descriptor_count: per_execution_descriptors * concurrency,
        })?;
        let queue = ExecutionQueue::new(
            model.context().clone(),
            pool,
            config.max_concurrent_executions,
            config.enable_metrics,
        );
        tracing::debug!(
            sets = per_execution_sets * concurrency,
            descriptors = per_execution_descriptors * concurrency,
            "Instance created"
        );

        Ok(Self {
            bound: None,
            queue: Arc::new(Mutex::new(queue)),
            pool,
            _objects: objects,
            model,
        })
    }

    pub fn input_descs(&self) -> &[TensorDesc] {
        self.model.input_descs()
    }

    pub fn output_descs(&self) -> &[TensorDesc] {
        self.model.output_descs()
    }

    /// Binds the instance to concrete input shapes.
    ///
    /// Always unbinds first. On failure the instance stays unbound.
    pub fn set_input_shapes(&mut self, shapes: &[TensorShape]) -> Result<(), RuntimeError> {
        self.unbind_shapes()?;

        let descs = self.model.input_descs();
        if shapes.len() != descs.len() {
            return Err(RuntimeError::Usage(format!(
                "model has {} inputs, {} shapes given",
                descs.len(),
                shapes.len()
            )));
        }
        for (desc, shape) in descs.iter().zip(shapes) {
            if !desc.shape.accepts(shape) {
                return Err(RuntimeError::Usage(format!(
                    "shape {shape} does not fit {} declared as {}",
                    desc.name, desc.shape
                )));
            }
        }

        let shaped = self.model.find_or_create_shaped(shapes)?;
        let ctx = self.model.context().clone();
        let mut objects = DeviceObjects::new(ctx.clone());
        let mut sessions = Vec::with_capacity(shaped.segments().len());
        let mut segments = Vec::with_capacity(shaped.segments().len());

        for (segment, shaped_segment) in self.model.segments().iter().zip(shaped.segments()) {
            let pipeline = shaped_segment.pipeline;
            let session = objects.create(ObjectDesc::PipelineSession { pipeline })?;
            let size = ctx.call(move |device| device.memory_requirement(session))?;
            let name = format!("{}.session", segment.name);
            let buffer = objects.create(ObjectDesc::Buffer {
                size,
                name: name.clone(),
            })?;
            ctx.call(move |device| device.bind_memory(session, MemoryBinding::whole(buffer)))?;

            sessions.push(SessionMemory { name, buffer, size });
            segments.push(SegmentDispatch {
                name: segment.name.clone(),
                binding_layout: segment.binding_layout,
                pipeline_layout: segment.pipeline_layout,
                pipeline,
                session,
                bindings: segment.bindings.iter().map(|b| (b.binding, b.tensor)).collect(),
            });
        }

        let tensors = shaped
            .tensors()
            .iter()
            .zip(self.model.tensors())
            .map(|(tensor, info)| TensorObjectDesc {
                format: info.format,
                dims: tensor.shape.dims().to_vec(),
            })
            .collect();

        tracing::info!(
            segments = segments.len(),
            session_bytes = sessions.iter().map(|s| s.size).sum::<u64>(),
            "Instance bound"
        );
        self.bound = Some(BoundState {
            shaped,
            plan: Arc::new(DispatchPlan {
                pool: self.pool,
                tensors,
                segments,
            }),
            sessions,
            _objects: objects,
        });
        Ok(())
    }

    /// Waits for every in-flight execution, then releases the per-shape
    /// resources. A no-op when unbound.
    pub fn unbind_shapes(&mut self) -> Result<(), RuntimeError> {
        if self.bound.is_none() {
            return Ok(());
        }
        {
            let mut queue = lock(&self.queue);
            queue.drain()?;
            queue.advance_generation();
        }
        self.bound = None;
        tracing::debug!("Instance unbound");
        Ok(())
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    pub fn input_shapes(&self) -> Option<&[TensorShape]> {
        self.bound.as_ref().map(|b| b.shaped.input_shapes())
    }

    pub fn output_shapes(&self) -> Option<&[TensorShape]> {
        self.bound.as_ref().map(|b| b.shaped.output_shapes())
    }

    /// The shaped model this instance is bound to.
    pub fn shaped_model(&self) -> Option<&Arc<ShapedModel>> {
        self.bound.as_ref().map(|b| &b.shaped)
    }

    /// Declares one inference on `graph`.
    ///
    /// Intermediate tensors become transient graph buffers; `inputs` and
    /// `outputs` must be at least as large as their tensors. Nothing is
    /// declared if validation fails. The device work is recorded when the
    /// host executes the added pass.
    pub fn enqueue(
        &mut self,
        graph: &mut dyn GraphBuilder,
        inputs: &[GraphBuffer],
        outputs: &[GraphBuffer],
    ) -> Result<(), RuntimeError> {
        let bound = self.bound.as_ref().ok_or_else(|| {
            RuntimeError::Usage("enqueue called before input shapes were set".into())
        })?;
        let model = &self.model;
        check_count("inputs", model.input_descs().len(), inputs.len())?;
        check_count("outputs", model.output_descs().len(), outputs.len())?;

        let tensors = bound.shaped.tensors();
        let endpoints = [
            (inputs, model.input_tensors(), model.input_descs()),
            (outputs, model.output_tensors(), model.output_descs()),
        ];
        for (buffers, ids, descs) in endpoints {
            for ((&buffer, &tensor), desc) in buffers.iter().zip(ids).zip(descs) {
                let required = tensors[tensor as usize].num_bytes;
                let actual = graph.buffer_size(buffer).ok_or_else(|| {
                    RuntimeError::Usage(format!(
                        "graph buffer {} for {} is not declared",
                        buffer.index(),
                        desc.name
                    ))
                })?;
                if actual < required {
                    return Err(RuntimeError::BufferTooSmall {
                        name: desc.name.clone(),
                        required,
                        actual,
                    });
                }
            }
        }

        let mut accesses = Vec::with_capacity(tensors.len() + bound.sessions.len());
        let mut tensor_buffers: Vec<Option<GraphBuffer>> = vec![None; tensors.len()];
        for (&buffer, &tensor) in inputs.iter().zip(model.input_tensors()) {
            tensor_buffers[tensor as usize] = Some(buffer);
            accesses.push(BufferAccess::new(buffer, Access::Read));
        }
        for (&buffer, &tensor) in outputs.iter().zip(model.output_tensors()) {
            tensor_buffers[tensor as usize].get_or_insert(buffer);
            accesses.push(BufferAccess::new(buffer, Access::Write));
        }
        let tensor_buffers: Vec<GraphBuffer> = tensor_buffers
            .into_iter()
            .zip(tensors)
            .enumerate()
            .map(|(id, (buffer, tensor))| {
                buffer.unwrap_or_else(|| {
                    let transient = graph.create_buffer(tensor.num_bytes, &format!("dgrt.tensor{id}"));
                    accesses.push(BufferAccess::new(transient, Access::ReadWrite));
                    transient
                })
            })
            .collect();
        for session in &bound.sessions {
            let buffer = graph.register_external(ExternalBuffer {
                name: session.name.clone(),
                buffer: session.buffer,
                size: session.size,
            });
            accesses.push(BufferAccess::new(buffer, Access::ReadWrite));
        }

        let queue = Arc::clone(&self.queue);
        let plan = Arc::clone(&bound.plan);
        let generation = lock(&queue).generation();
        graph.add_pass(
            ENQUEUE_PASS_NAME,
            accesses,
            Box::new(move |resources: &PassResources| {
                let memory = tensor_buffers
                    .iter()
                    .map(|&buffer| resources.memory(buffer))
                    .collect::<Result<Vec<_>, _>>()?;
                let mut queue = lock(&queue);
                if queue.generation() != generation {
                    return Err(RuntimeError::Usage(
                        "instance was rebound after this inference was enqueued".into(),
                    ));
                }
                queue.submit(plan, memory)
            }),
        );
        Ok(())
    }

    /// Executions submitted and not yet reclaimed.
    pub fn in_flight(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Reclaims finished executions without waiting.
    pub fn reclaim(&self) -> Result<usize, RuntimeError> {
        lock(&self.queue).reclaim()
    }

    pub fn stats(&self) -> InstanceStats {
        lock(&self.queue).stats().clone()
    }

    pub fn model(&self) -> &Arc<UnshapedModel> {
        &self.model
    }
}

impl Drop for ModelInstance {
    fn drop(&mut self) {
        if let Err(e) = self.unbind_shapes() {
            tracing::error!(error = %e, "Failed to drain instance on drop");
        }
    }
}

impl std::fmt::Debug for ModelInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelInstance")
            .field("bound", &self.input_shapes())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

fn check_count(what: &str, expected: usize, actual: usize) -> Result<(), RuntimeError> {
    if expected != actual {
        return Err(RuntimeError::Usage(format!(
            "model has {expected} {what}, {actual} given"
        )));
    }
    Ok(())
}

fn lock(queue: &Mutex<ExecutionQueue>) -> MutexGuard<'_, ExecutionQueue> {
    queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
