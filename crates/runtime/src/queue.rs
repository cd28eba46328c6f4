// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-instance in-flight execution queue.
//!
//! ```text
//!  submit ──► reclaim signaled ──► wait for a slot ──► record ──► push_back
//!                 ▲                  (flush, poll, yield)
//!                 └── oldest first, stops at the first unsignaled fence
//! ```
//!
//! An execution's tensors, views and descriptor sets stay alive until its
//! fence signals. The queue is only touched by the instance's owner, behind
//! the instance's mutex.

use std::collections::VecDeque;
use std::sync::Arc;

use device_context::{
    Command, DescriptorWrite, Device, DeviceContext, DeviceError, Handle, MemoryBinding,
    ObjectDesc, TensorObjectDesc,
};

use crate::metrics::InstanceStats;
use crate::RuntimeError;

/// Everything needed to record one execution of a bound instance.
#[derive(Debug)]
pub(crate) struct DispatchPlan {
    pub(crate) pool: Handle,
    /// Device tensor description per tensor id.
    pub(crate) tensors: Vec<TensorObjectDesc>,
    pub(crate) segments: Vec<SegmentDispatch>,
}

#[derive(Debug)]
pub(crate) struct SegmentDispatch {
    pub(crate) name: String,
    pub(crate) binding_layout: Handle,
    pub(crate) pipeline_layout: Handle,
    pub(crate) pipeline: Handle,
    pub(crate) session: Handle,
    /// `(binding, tensor id)` pairs.
    pub(crate) bindings: Vec<(u32, u32)>,
}

impl DispatchPlan {
    /// Records every segment in order, then a fence. Objects are pushed
    /// into `execution` as soon as they exist so a failure can roll back.
    fn record(
        &self,
        device: &dyn Device,
        memory: &[MemoryBinding],
        execution: &mut Execution,
    ) -> Result<(), DeviceError> {
        for (desc, binding) in self.tensors.iter().zip(memory) {
            let tensor = device.create_object(&ObjectDesc::Tensor(desc.clone()))?;
            execution.tensors.push(tensor);
            device.bind_memory(tensor, *binding)?;
            execution
                .views
                .push(device.create_object(&ObjectDesc::TensorView { tensor })?);
        }

        for segment in &self.segments {
            let set = device.allocate_descriptor_set(self.pool, segment.binding_layout)?;
            execution.sets.push(set);
            let writes: Vec<DescriptorWrite> = segment
                .bindings
                .iter()
                .map(|&(binding, tensor)| DescriptorWrite {
                    binding,
                    view: execution.views[tensor as usize],
                })
                .collect();
            device.write_descriptor_set(set, &writes)?;
            device.record(Command::BindDescriptorSet {
                layout: segment.pipeline_layout,
                set,
            })?;
            device.record(Command::BindPipeline(segment.pipeline))?;
            device.record(Command::DispatchGraph {
                session: segment.session,
            })?;
            tracing::trace!(segment = %segment.name, "Dispatch recorded");
        }

        let fence = device.create_object(&ObjectDesc::Fence)?;
        execution.fence = Some(fence);
        device.write_fence(fence)
    }
}

/// Device objects of one in-flight execution.
#[derive(Debug, Default)]
pub(crate) struct Execution {
    tensors: Vec<Handle>,
    views: Vec<Handle>,
    sets: Vec<Handle>,
    fence: Option<Handle>,
}

impl Execution {
    /// Destroys every object, carrying on past failures. Returns the first
    /// error.
    fn release(self, device: &dyn Device, pool: Handle) -> Result<(), DeviceError> {
        let mut first_error = None;
        let mut check = |result: Result<(), DeviceError>| {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to release execution object");
                first_error.get_or_insert(e);
            }
        };
        if !self.sets.is_empty() {
            check(device.free_descriptor_sets(pool, &self.sets));
        }
        for view in self.views {
            check(device.destroy_object(view));
        }
        for tensor in self.tensors {
            check(device.destroy_object(tensor));
        }
        if let Some(fence) = self.fence {
            check(device.destroy_object(fence));
        }
        first_error.map_or(Ok(()), Err)
    }
}

pub(crate) struct ExecutionQueue {
    ctx: DeviceContext,
    pool: Handle,
    in_flight: VecDeque<Execution>,
    capacity: usize,
    /// Bumped on every unbind; passes enqueued under an older generation
    /// refuse to run.
    generation: u64,
    stats: InstanceStats,
    metrics: bool,
}

impl ExecutionQueue {
    pub(crate) fn new(ctx: DeviceContext, pool: Handle, capacity: usize, metrics: bool) -> Self {
        Self {
            ctx,
            pool,
            in_flight: VecDeque::with_capacity(capacity),
            capacity,
            generation: 0,
            stats: InstanceStats::default(),
            metrics,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn advance_generation(&mut self) {
        self.generation += 1;
    }

    pub(crate) fn stats(&self) -> &InstanceStats {
        &self.stats
    }

    /// Records one execution of `plan` once a slot is free.
    pub(crate) fn submit(
        &mut self,
        plan: Arc<DispatchPlan>,
        memory: Vec<MemoryBinding>,
    ) -> Result<(), RuntimeError> {
        self.reclaim()?;
        self.wait_for_slot()?;

        let execution = self.ctx.call(move |device| {
            let mut execution = Execution::default();
            match plan.record(device, &memory, &mut execution) {
                Ok(()) => Ok(execution),
                Err(e) => {
                    if let Err(cleanup) = execution.release(device, plan.pool) {
                        tracing::error!(error = %cleanup, "Failed to roll back execution");
                    }
                    Err(e)
                }
            }
        })?;

        self.in_flight.push_back(execution);
        if self.metrics {
            self.stats.record_enqueue(self.in_flight.len());
        }
        tracing::debug!(in_flight = self.in_flight.len(), "Execution submitted");
        Ok(())
    }

    /// Releases executions whose fence has signaled, oldest first.
    /// Returns how many were released.
    pub(crate) fn reclaim(&mut self) -> Result<usize, RuntimeError> {
        if self.in_flight.is_empty() {
            return Ok(0);
        }
        let fences: Vec<Handle> = self.in_flight.iter().filter_map(|e| e.fence).collect();
        let signaled = self.ctx.call(move |device| {
            let mut signaled = 0usize;
            for fence in fences {
                if !device.is_fence_signaled(fence)? {
                    break;
                }
                signaled += 1;
            }
            Ok(signaled)
        })?;
        if signaled == 0 {
            return Ok(0);
        }

        let done: Vec<Execution> = self.in_flight.drain(..signaled).collect();
        let pool = self.pool;
        let released = self.ctx.call(move |device| {
            let mut first_error = None;
            for execution in done {
                if let Err(e) = execution.release(device, pool) {
                    first_error.get_or_insert(e);
                }
            }
            first_error.map_or(Ok(()), Err)
        });
        if self.metrics {
            self.stats.record_reclaimed(signaled);
        }
        released?;
        tracing::trace!(reclaimed = signaled, remaining = self.in_flight.len(), "Executions reclaimed");
        Ok(signaled)
    }

    /// Blocks until fewer than `capacity` executions are in flight.
    fn wait_for_slot(&mut self) -> Result<(), RuntimeError> {
        if self.in_flight.len() < self.capacity {
            return Ok(());
        }
        if self.metrics {
            self.stats.record_slot_wait();
        }
        tracing::debug!(in_flight = self.in_flight.len(), "Execution queue full, waiting");
        while self.in_flight.len() >= self.capacity {
            self.poll()?;
        }
        Ok(())
    }

    /// Blocks until every execution has been reclaimed.
    pub(crate) fn drain(&mut self) -> Result<(), RuntimeError> {
        if !self.in_flight.is_empty() {
            tracing::debug!(in_flight = self.in_flight.len(), "Draining executions");
        }
        while !self.in_flight.is_empty() {
            self.poll()?;
        }
        Ok(())
    }

    fn poll(&mut self) -> Result<(), RuntimeError> {
        // Pending device work must be pushed out before any fence can signal.
        self.ctx.flush()?;
        if self.reclaim()? == 0 {
            if self.metrics {
                self.stats.record_poll();
            }
            std::thread::yield_now();
        }
        Ok(())
    }
}
