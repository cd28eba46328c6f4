// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! In-process reference device.
//!
//! [`HeadlessDevice`] executes nothing, but it checks every call the way a
//! validation layer would: handle kinds and liveness, memory bindings,
//! descriptor pool capacity, command ordering, and that nothing referenced
//! by a submission is destroyed before its fence signals.
//!
//! Submissions complete after `fence_latency` calls to [`Device::flush`].
//! [`HeadlessDevice::hold_fences`] freezes completion entirely.

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    Capabilities, Command, DescriptorWrite, Device, DeviceError, DeviceStats, Handle,
    LayoutBinding, MemoryBinding, MemoryBudget, ObjectDesc, ObjectKind,
};

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Session working memory: a fixed base plus a slice per bound resource.
const SESSION_MEMORY_BASE: u64 = 4096;
const SESSION_MEMORY_PER_RESOURCE: u64 = 256;

#[derive(Debug)]
enum FenceState {
    Unsignaled,
    Pending { remaining: u32, refs: Vec<Handle> },
    Signaled,
}

#[derive(Debug)]
enum Object {
    BindingLayout {
        bindings: Vec<LayoutBinding>,
    },
    PipelineLayout {
        binding_layout: Handle,
    },
    ShaderModule,
    Pipeline {
        layout: Handle,
        resources: usize,
    },
    Session {
        pipeline: Handle,
        memory: Option<MemoryBinding>,
    },
    DescriptorPool {
        max_sets: u32,
        capacity: u32,
        sets: u32,
        descriptors: u32,
    },
    DescriptorSet {
        pool: Handle,
        layout: Handle,
        descriptors: u32,
        views: Vec<DescriptorWrite>,
    },
    Buffer {
        size: u64,
    },
    Tensor {
        size: u64,
        memory: Option<MemoryBinding>,
    },
    TensorView {
        tensor: Handle,
    },
    Fence(FenceState),
}

struct State {
    next_id: u64,
    objects: HashMap<Handle, Object>,
    capabilities: Capabilities,
    budget: Option<MemoryBudget>,
    fence_latency: u32,
    holding: bool,
    bound_pipeline: Option<Handle>,
    bound_set: Option<(Handle, Handle)>,
    /// Objects referenced by commands recorded since the last fence.
    recorded: Vec<Handle>,
    stats: DeviceStats,
}

impl State {
    fn insert(&mut self, kind: ObjectKind, object: Object) -> Handle {
        self.next_id += 1;
        let raw = NonZeroU64::new(self.next_id).unwrap_or(NonZeroU64::MIN);
        let handle = Handle::new(kind, raw);
        self.objects.insert(handle, object);
        self.stats.record_create(kind);
        handle
    }

    fn get(&self, handle: Handle, expected: ObjectKind) -> Result<&Object, DeviceError> {
        if handle.kind() != expected {
            return Err(DeviceError::WrongKind {
                handle,
                expected,
                actual: handle.kind(),
            });
        }
        self.objects
            .get(&handle)
            .ok_or(DeviceError::InvalidHandle(handle))
    }

    fn get_mut(&mut self, handle: Handle, expected: ObjectKind) -> Result<&mut Object, DeviceError> {
        self.get(handle, expected)?;
        self.objects
            .get_mut(&handle)
            .ok_or(DeviceError::InvalidHandle(handle))
    }

    fn layout_bindings(&self, layout: Handle) -> Result<&[LayoutBinding], DeviceError> {
        match self.get(layout, ObjectKind::BindingLayout)? {
            Object::BindingLayout { bindings } => Ok(bindings),
            _ => Err(DeviceError::InvalidHandle(layout)),
        }
    }

    fn binding_layout_of(&self, pipeline_layout: Handle) -> Result<Handle, DeviceError> {
        match self.get(pipeline_layout, ObjectKind::PipelineLayout)? {
            Object::PipelineLayout { binding_layout } => Ok(*binding_layout),
            _ => Err(DeviceError::InvalidHandle(pipeline_layout)),
        }
    }

    fn session_requirement(&self, session: Handle) -> Result<u64, DeviceError> {
        let pipeline = match self.get(session, ObjectKind::PipelineSession)? {
            Object::Session { pipeline, .. } => *pipeline,
            _ => return Err(DeviceError::InvalidHandle(session)),
        };
        match self.get(pipeline, ObjectKind::Pipeline)? {
            Object::Pipeline { resources, .. } => {
                Ok(SESSION_MEMORY_BASE + SESSION_MEMORY_PER_RESOURCE * *resources as u64)
            }
            _ => Err(DeviceError::InvalidHandle(pipeline)),
        }
    }

    fn in_use(&self, handle: Handle) -> bool {
        self.objects.values().any(|object| match object {
            Object::Fence(FenceState::Pending { refs, .. }) => refs.contains(&handle),
            _ => false,
        })
    }

    fn invalid(kind: ObjectKind, detail: impl Into<String>) -> DeviceError {
        DeviceError::InvalidDescription {
            kind,
            detail: detail.into(),
        }
    }

    fn create(&mut self, desc: &ObjectDesc) -> Result<Handle, DeviceError> {
        let kind = desc.kind();
        let object = match desc {
            ObjectDesc::BindingLayout { bindings } => {
                if bindings.iter().any(|b| b.descriptor_count == 0) {
                    return Err(Self::invalid(kind, "binding with zero descriptors"));
                }
                Object::BindingLayout {
                    bindings: bindings.clone(),
                }
            }
            ObjectDesc::PipelineLayout { binding_layout } => {
                self.layout_bindings(*binding_layout)?;
                Object::PipelineLayout {
                    binding_layout: *binding_layout,
                }
            }
            ObjectDesc::ShaderModule { code } => {
                if code.first() != Some(&SPIRV_MAGIC) {
                    return Err(Self::invalid(kind, "code is not a SPIR-V module"));
                }
                Object::ShaderModule
            }
            ObjectDesc::Pipeline(pipeline) => {
                let bindings = self.layout_bindings(self.binding_layout_of(pipeline.layout)?)?;
                for resource in &pipeline.resources {
                    if !bindings.iter().any(|b| b.binding == resource.binding) {
                        return Err(Self::invalid(
                            kind,
                            format!("resource binding {} not in layout", resource.binding),
                        ));
                    }
                    if resource.format.element_size() == 0 {
                        return Err(Self::invalid(
                            kind,
                            format!("binding {} has {}", resource.binding, resource.format),
                        ));
                    }
                }
                self.get(pipeline.module, ObjectKind::ShaderModule)?;
                if pipeline.entry_point.is_empty() {
                    return Err(Self::invalid(kind, "empty entry point"));
                }
                Object::Pipeline {
                    layout: pipeline.layout,
                    resources: pipeline.resources.len(),
                }
            }
            ObjectDesc::PipelineSession { pipeline } => {
                self.get(*pipeline, ObjectKind::Pipeline)?;
                Object::Session {
                    pipeline: *pipeline,
                    memory: None,
                }
            }
            ObjectDesc::DescriptorPool {
                max_sets,
                descriptor_count,
            } => {
                if *max_sets == 0 {
                    return Err(Self::invalid(kind, "pool with zero sets"));
                }
                Object::DescriptorPool {
                    max_sets: *max_sets,
                    capacity: *descriptor_count,
                    sets: 0,
                    descriptors: 0,
                }
            }
            ObjectDesc::Buffer { size, name } => {
                if let Some(budget) = self.budget {
                    let available = budget.as_bytes().saturating_sub(self.stats.allocated_bytes);
                    if *size > available {
                        self.stats.record_oom();
                        tracing::warn!(buffer = %name, size, available, "Buffer exceeds memory budget");
                        return Err(DeviceError::OutOfMemory {
                            requested_bytes: *size,
                            available_bytes: available,
                            budget_bytes: budget.as_bytes(),
                        });
                    }
                }
                self.stats.record_alloc(*size);
                Object::Buffer { size: *size }
            }
            ObjectDesc::Tensor(tensor) => {
                if tensor.format.element_size() == 0 {
                    return Err(Self::invalid(kind, tensor.format.to_string()));
                }
                Object::Tensor {
                    size: tensor.size_bytes(),
                    memory: None,
                }
            }
            ObjectDesc::TensorView { tensor } => match self.get(*tensor, ObjectKind::Tensor)? {
                Object::Tensor { memory: Some(_), .. } => Object::TensorView { tensor: *tensor },
                _ => return Err(Self::invalid(kind, format!("{tensor} has no memory bound"))),
            },
            ObjectDesc::Fence => Object::Fence(FenceState::Unsignaled),
        };
        Ok(self.insert(kind, object))
    }

    fn destroy(&mut self, handle: Handle) -> Result<(), DeviceError> {
        if handle.kind() == ObjectKind::DescriptorSet {
            return Err(DeviceError::InvalidCommand(format!(
                "{handle} must be freed through its pool"
            )));
        }
        let pending = matches!(
            self.get(handle, handle.kind())?,
            Object::Fence(FenceState::Pending { .. })
        );
        if pending || self.in_use(handle) {
            return Err(DeviceError::InUse(handle));
        }
        match self.objects.remove(&handle) {
            Some(Object::Buffer { size }) => self.stats.record_free(size),
            Some(Object::DescriptorPool { .. }) => {
                let owned: Vec<Handle> = self
                    .objects
                    .iter()
                    .filter_map(|(h, o)| match o {
                        Object::DescriptorSet { pool, .. } if *pool == handle => Some(*h),
                        _ => None,
                    })
                    .collect();
                for set in owned {
                    self.objects.remove(&set);
                    self.stats.descriptor_sets_freed += 1;
                    self.stats.record_destroy(ObjectKind::DescriptorSet);
                }
            }
            _ => {}
        }
        self.stats.record_destroy(handle.kind());
        Ok(())
    }

    fn bind_memory(&mut self, target: Handle, memory: MemoryBinding) -> Result<(), DeviceError> {
        let available = match self.get(memory.buffer, ObjectKind::Buffer)? {
            Object::Buffer { size } => *size,
            _ => return Err(DeviceError::InvalidHandle(memory.buffer)),
        };
        let required = match target.kind() {
            ObjectKind::Tensor => match self.get(target, ObjectKind::Tensor)? {
                Object::Tensor { size, .. } => *size,
                _ => return Err(DeviceError::InvalidHandle(target)),
            },
            ObjectKind::PipelineSession => self.session_requirement(target)?,
            other => {
                return Err(DeviceError::WrongKind {
                    handle: target,
                    expected: ObjectKind::Tensor,
                    actual: other,
                })
            }
        };
        if memory.offset.checked_add(required).map_or(true, |end| end > available) {
            return Err(DeviceError::MemoryTooSmall {
                target,
                required,
                offset: memory.offset,
                available,
            });
        }
        match self.get_mut(target, target.kind())? {
            Object::Tensor { memory: slot, .. } | Object::Session { memory: slot, .. } => {
                if slot.is_some() {
                    return Err(DeviceError::InvalidCommand(format!(
                        "{target} already has memory bound"
                    )));
                }
                *slot = Some(memory);
                Ok(())
            }
            _ => Err(DeviceError::InvalidHandle(target)),
        }
    }

    fn allocate_set(&mut self, pool: Handle, layout: Handle) -> Result<Handle, DeviceError> {
        let needed: u32 = self
            .layout_bindings(layout)?
            .iter()
            .map(|b| b.descriptor_count)
            .sum();
        match self.get_mut(pool, ObjectKind::DescriptorPool)? {
            Object::DescriptorPool {
                max_sets,
                capacity,
                sets,
                descriptors,
            } => {
                if *sets >= *max_sets {
                    return Err(DeviceError::PoolExhausted {
                        pool,
                        detail: format!("all {max_sets} sets allocated"),
                    });
                }
                if *descriptors + needed > *capacity {
                    return Err(DeviceError::PoolExhausted {
                        pool,
                        detail: format!(
                            "{needed} descriptors requested, {} of {capacity} free",
                            *capacity - *descriptors
                        ),
                    });
                }
                *sets += 1;
                *descriptors += needed;
            }
            _ => return Err(DeviceError::InvalidHandle(pool)),
        }
        self.stats.descriptor_sets_allocated += 1;
        Ok(self.insert(
            ObjectKind::DescriptorSet,
            Object::DescriptorSet {
                pool,
                layout,
                descriptors: needed,
                views: Vec::new(),
            },
        ))
    }

    fn write_set(&mut self, set: Handle, writes: &[DescriptorWrite]) -> Result<(), DeviceError> {
        let layout = match self.get(set, ObjectKind::DescriptorSet)? {
            Object::DescriptorSet { layout, .. } => *layout,
            _ => return Err(DeviceError::InvalidHandle(set)),
        };
        let bindings = self.layout_bindings(layout)?;
        for write in writes {
            if !bindings.iter().any(|b| b.binding == write.binding) {
                return Err(DeviceError::InvalidCommand(format!(
                    "binding {} not in layout of {set}",
                    write.binding
                )));
            }
            self.get(write.view, ObjectKind::TensorView)?;
        }
        if let Object::DescriptorSet { views, .. } = self.get_mut(set, ObjectKind::DescriptorSet)? {
            for write in writes {
                views.retain(|w| w.binding != write.binding);
                views.push(*write);
            }
        }
        Ok(())
    }

    fn free_sets(&mut self, pool: Handle, sets: &[Handle]) -> Result<(), DeviceError> {
        self.get(pool, ObjectKind::DescriptorPool)?;
        let mut released = 0u32;
        let mut count = 0u32;
        for &set in sets {
            match self.get(set, ObjectKind::DescriptorSet)? {
                Object::DescriptorSet { pool: owner, descriptors, .. } if *owner == pool => {
                    released += *descriptors;
                    count += 1;
                }
                _ => {
                    return Err(DeviceError::InvalidCommand(format!(
                        "{set} was not allocated from {pool}"
                    )))
                }
            }
            if self.in_use(set) {
                return Err(DeviceError::InUse(set));
            }
        }
        for &set in sets {
            self.objects.remove(&set);
            self.stats.descriptor_sets_freed += 1;
            self.stats.record_destroy(ObjectKind::DescriptorSet);
        }
        if let Object::DescriptorPool { sets, descriptors, .. } =
            self.get_mut(pool, ObjectKind::DescriptorPool)?
        {
            *sets -= count;
            *descriptors -= released;
        }
        Ok(())
    }

    fn record(&mut self, command: Command) -> Result<(), DeviceError> {
        match command {
            Command::BindPipeline(pipeline) => {
                self.get(pipeline, ObjectKind::Pipeline)?;
                self.bound_pipeline = Some(pipeline);
                self.recorded.push(pipeline);
            }
            Command::BindDescriptorSet { layout, set } => {
                let expected = self.binding_layout_of(layout)?;
                let (set_layout, views) = match self.get(set, ObjectKind::DescriptorSet)? {
                    Object::DescriptorSet { layout, views, .. } => (*layout, views.clone()),
                    _ => return Err(DeviceError::InvalidHandle(set)),
                };
                if set_layout != expected {
                    return Err(DeviceError::InvalidCommand(format!(
                        "{set} does not match pipeline layout {layout}"
                    )));
                }
                let unwritten = self
                    .layout_bindings(set_layout)?
                    .iter()
                    .find(|b| !views.iter().any(|w| w.binding == b.binding));
                if let Some(b) = unwritten {
                    return Err(DeviceError::InvalidCommand(format!(
                        "binding {} of {set} was never written",
                        b.binding
                    )));
                }
                self.recorded.push(set);
                for write in &views {
                    self.recorded.push(write.view);
                    if let Object::TensorView { tensor } = self.get(write.view, ObjectKind::TensorView)? {
                        let tensor = *tensor;
                        self.recorded.push(tensor);
                    }
                }
                self.bound_set = Some((layout, set));
            }
            Command::DispatchGraph { session } => {
                let (pipeline, memory) = match self.get(session, ObjectKind::PipelineSession)? {
                    Object::Session { pipeline, memory } => (*pipeline, *memory),
                    _ => return Err(DeviceError::InvalidHandle(session)),
                };
                let Some(memory) = memory else {
                    return Err(DeviceError::InvalidCommand(format!(
                        "{session} has no memory bound"
                    )));
                };
                if self.bound_pipeline != Some(pipeline) {
                    return Err(DeviceError::InvalidCommand(format!(
                        "{session} dispatched without its pipeline bound"
                    )));
                }
                let pipeline_layout = match self.get(pipeline, ObjectKind::Pipeline)? {
                    Object::Pipeline { layout, .. } => *layout,
                    _ => return Err(DeviceError::InvalidHandle(pipeline)),
                };
                if !matches!(self.bound_set, Some((layout, _)) if layout == pipeline_layout) {
                    return Err(DeviceError::InvalidCommand(format!(
                        "{session} dispatched without a matching descriptor set"
                    )));
                }
                self.recorded.push(session);
                self.recorded.push(memory.buffer);
                self.stats.dispatches += 1;
            }
        }
        Ok(())
    }

    fn write_fence(&mut self, fence: Handle) -> Result<(), DeviceError> {
        let latency = self.fence_latency;
        let immediate = latency == 0 && !self.holding;
        let refs = std::mem::take(&mut self.recorded);
        match self.get_mut(fence, ObjectKind::Fence)? {
            Object::Fence(state @ FenceState::Unsignaled) => {
                *state = if immediate {
                    FenceState::Signaled
                } else {
                    FenceState::Pending {
                        remaining: latency.max(1),
                        refs,
                    }
                };
            }
            _ => {
                return Err(DeviceError::InvalidCommand(format!(
                    "{fence} was already submitted"
                )))
            }
        }
        self.bound_pipeline = None;
        self.bound_set = None;
        self.stats.fences_written += 1;
        if immediate {
            self.stats.fences_signaled += 1;
        }
        Ok(())
    }

    fn flush(&mut self) {
        self.stats.flushes += 1;
        if self.holding {
            return;
        }
        let mut signaled = 0;
        for object in self.objects.values_mut() {
            if let Object::Fence(state) = object {
                if let FenceState::Pending { remaining, .. } = state {
                    *remaining = remaining.saturating_sub(1);
                    if *remaining == 0 {
                        *state = FenceState::Signaled;
                        signaled += 1;
                    }
                }
            }
        }
        if signaled > 0 {
            tracing::trace!(signaled, "Fences signaled");
        }
        self.stats.fences_signaled += signaled;
    }
}

/// A validating device that completes work on flush.
///
/// Clones share state, so a test can keep one clone for inspection after
/// moving another into a [`DeviceContext`](crate::DeviceContext).
///
/// # Example
/// ```
/// use device_context::{Device, HeadlessDevice, ObjectDesc};
///
/// let device = HeadlessDevice::new();
/// let fence = device.create_object(&ObjectDesc::Fence).unwrap();
/// device.write_fence(fence).unwrap();
/// assert!(!device.is_fence_signaled(fence).unwrap());
/// device.flush().unwrap();
/// assert!(device.is_fence_signaled(fence).unwrap());
/// ```
#[derive(Clone)]
pub struct HeadlessDevice {
    state: Arc<Mutex<State>>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                next_id: 0,
                objects: HashMap::new(),
                capabilities: Capabilities {
                    device_name: "headless".to_string(),
                    tensors: true,
                    data_graph: true,
                },
                budget: None,
                fence_latency: 1,
                holding: false,
                bound_pipeline: None,
                bound_set: None,
                recorded: Vec::new(),
                stats: DeviceStats::default(),
            })),
        }
    }

    pub fn with_memory_budget(self, budget: MemoryBudget) -> Self {
        self.lock().budget = Some(budget);
        self
    }

    /// Number of flushes after which a submitted fence signals. Zero
    /// signals at submission.
    pub fn with_fence_latency(self, flushes: u32) -> Self {
        self.lock().fence_latency = flushes;
        self
    }

    /// Reports no data-graph support.
    pub fn without_data_graph(self) -> Self {
        self.lock().capabilities.data_graph = false;
        self
    }

    /// Stops fences from signaling until [`Self::release_fences`].
    pub fn hold_fences(&self) {
        self.lock().holding = true;
    }

    /// Lets fences count down again on the next flush.
    pub fn release_fences(&self) {
        self.lock().holding = false;
    }

    pub fn stats(&self) -> DeviceStats {
        self.lock().stats.clone()
    }

    pub fn live_objects(&self, kind: ObjectKind) -> u64 {
        self.lock().stats.live(kind)
    }

    /// Fences submitted but not yet signaled.
    pub fn pending_fences(&self) -> usize {
        self.lock()
            .objects
            .values()
            .filter(|o| matches!(o, Object::Fence(FenceState::Pending { .. })))
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic inside a call leaves the maps consistent; keep going.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Device for HeadlessDevice {
    fn capabilities(&self) -> Capabilities {
        self.lock().capabilities.clone()
    }

    fn create_object(&self, desc: &ObjectDesc) -> Result<Handle, DeviceError> {
        self.lock().create(desc)
    }

    fn destroy_object(&self, handle: Handle) -> Result<(), DeviceError> {
        self.lock().destroy(handle)
    }

    fn memory_requirement(&self, session: Handle) -> Result<u64, DeviceError> {
        self.lock().session_requirement(session)
    }

    fn bind_memory(&self, target: Handle, memory: MemoryBinding) -> Result<(), DeviceError> {
        self.lock().bind_memory(target, memory)
    }

    fn allocate_descriptor_set(&self, pool: Handle, layout: Handle) -> Result<Handle, DeviceError> {
        self.lock().allocate_set(pool, layout)
    }

    fn write_descriptor_set(&self, set: Handle, writes: &[DescriptorWrite]) -> Result<(), DeviceError> {
        self.lock().write_set(set, writes)
    }

    fn free_descriptor_sets(&self, pool: Handle, sets: &[Handle]) -> Result<(), DeviceError> {
        self.lock().free_sets(pool, sets)
    }

    fn record(&self, command: Command) -> Result<(), DeviceError> {
        self.lock().record(command)
    }

    fn write_fence(&self, fence: Handle) -> Result<(), DeviceError> {
        self.lock().write_fence(fence)
    }

    fn is_fence_signaled(&self, fence: Handle) -> Result<bool, DeviceError> {
        match self.lock().get(fence, ObjectKind::Fence)? {
            Object::Fence(state) => Ok(matches!(state, FenceState::Signaled)),
            _ => Err(DeviceError::InvalidHandle(fence)),
        }
    }

    fn flush(&self) -> Result<(), DeviceError> {
        self.lock().flush();
        Ok(())
    }
}
