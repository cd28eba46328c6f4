// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The unshaped model: topology decoded once per container.
//!
//! ```text
//!  resources ──► tensor ids 0..N (input / output / intermediate only)
//!  sequence  ──► model endpoints ──► Input{i} / Output{i} descriptors
//!            └─► segments ──► bindings, constants, kernel code view,
//!                             binding layout + pipeline layout (device)
//! ```
//!
//! The model keeps the container bytes alive; kernel code and constant data
//! are [`ByteView`]s into them. Shaped models are cached by input shapes
//! behind weak references.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use device_context::{DeviceContext, Handle, LayoutBinding, ObjectDesc};
use model_container::{BindingSlot, ByteView, ContainerDecoder, ContainerError, ModuleKind};
use shape_inference::ShapePropagator;
use tensor_core::{SymbolicShape, TensorDesc, TensorFormat, TensorShape};

use crate::metrics::CacheStats;
use crate::objects::DeviceObjects;
use crate::{ModelInstance, RuntimeConfig, RuntimeError, ShapedModel};

/// Shape-independent metadata of one tensor id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorInfo {
    pub model_input: Option<usize>,
    pub model_output: Option<usize>,
    pub format: TensorFormat,
    /// Shape as declared in the container; unknown dimensions are -1.
    pub declared: SymbolicShape,
}

impl TensorInfo {
    pub fn is_intermediate(&self) -> bool {
        self.model_input.is_none() && self.model_output.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Input,
    Output,
}

/// One tensor bound to a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentBinding {
    pub kind: BindingKind,
    /// Binding index within the segment's single descriptor set.
    pub binding: u32,
    pub tensor: u32,
}

/// A constant tensor embedded in a segment.
#[derive(Debug, Clone)]
pub struct SegmentConstant {
    /// Position among the segment's constants.
    pub id: u32,
    pub format: TensorFormat,
    pub dims: Vec<i64>,
    pub data: ByteView,
}

#[derive(Debug)]
pub struct UnshapedSegment {
    pub name: String,
    pub bindings: Vec<SegmentBinding>,
    pub constants: Vec<SegmentConstant>,
    pub code: ByteView,
    pub entry_point: String,
    pub(crate) binding_layout: Handle,
    pub(crate) pipeline_layout: Handle,
}

impl UnshapedSegment {
    pub fn inputs(&self) -> impl Iterator<Item = &SegmentBinding> {
        self.bindings.iter().filter(|b| b.kind == BindingKind::Input)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &SegmentBinding> {
        self.bindings.iter().filter(|b| b.kind == BindingKind::Output)
    }
}

#[derive(Default)]
struct ShapedCache {
    entries: HashMap<Vec<TensorShape>, Weak<ShapedModel>>,
    stats: CacheStats,
}

/// A decoded model, shared by every shaped model and instance built from it.
pub struct UnshapedModel {
    tensors: Vec<TensorInfo>,
    inputs: Vec<TensorDesc>,
    outputs: Vec<TensorDesc>,
    input_tensors: Vec<u32>,
    output_tensors: Vec<u32>,
    segments: Vec<UnshapedSegment>,
    cache: Mutex<ShapedCache>,
    propagator: Arc<dyn ShapePropagator>,
    config: RuntimeConfig,
    // Dropped before `container`, after everything referencing the layouts.
    objects: DeviceObjects,
    container: ByteView,
}

impl UnshapedModel {
    /// Builds a model from raw (unwrapped) container bytes.
    ///
    /// Any failure returns an error and destroys whatever device objects were
    /// already created.
    pub fn from_container(
        ctx: DeviceContext,
        container: ByteView,
        config: &RuntimeConfig,
        propagator: Arc<dyn ShapePropagator>,
    ) -> Result<Arc<Self>, RuntimeError> {
        let decoder = ContainerDecoder::new(container.clone()).map_err(|e| {
            tracing::error!(error = %e, "Container header rejected");
            e
        })?;
        let mut objects = DeviceObjects::new(ctx);

        // ── Tensors ────────────────────────────────────────────
        let mut tensors = Vec::new();
        let mut resource_tensor: Vec<Option<u32>> = Vec::with_capacity(decoder.resources().len());
        for (index, resource) in decoder.resources().iter().enumerate() {
            if !resource.strides.is_empty() {
                return Err(ContainerError::StridesNotSupported {
                    resource: index as u32,
                }
                .into());
            }
            if resource.category.is_tensor() {
                resource_tensor.push(Some(tensors.len() as u32));
                tensors.push(TensorInfo {
                    model_input: None,
                    model_output: None,
                    format: resource.format,
                    declared: resource.shape(),
                });
            } else {
                resource_tensor.push(None);
            }
        }

        let tensor_of = |context: &str, slot: &BindingSlot| -> Result<u32, RuntimeError> {
            decoder.resource(slot.resource)?;
            resource_tensor[slot.resource as usize].ok_or_else(|| {
                ContainerError::NotATensor {
                    context: context.to_string(),
                    binding: slot.binding,
                    resource: slot.resource,
                }
                .into()
            })
        };

        // ── Model endpoints ────────────────────────────────────
        // Binding position is the model input/output index.
        let sequence = decoder.sequence();
        let mut inputs = Vec::with_capacity(sequence.model_inputs.len());
        let mut input_tensors = Vec::with_capacity(sequence.model_inputs.len());
        for (index, slot) in sequence.model_inputs.iter().enumerate() {
            let tensor = tensor_of("model input", slot)?;
            let resource = decoder.resource(slot.resource)?;
            inputs.push(TensorDesc::new(format!("Input{index}"), resource.shape(), resource.format));
            tensors[tensor as usize].model_input = Some(index);
            input_tensors.push(tensor);
        }
        let mut outputs = Vec::with_capacity(sequence.model_outputs.len());
        let mut output_tensors = Vec::with_capacity(sequence.model_outputs.len());
        for (index, slot) in sequence.model_outputs.iter().enumerate() {
            let tensor = tensor_of("model output", slot)?;
            let resource = decoder.resource(slot.resource)?;
            outputs.push(TensorDesc::new(format!("Output{index}"), resource.shape(), resource.format));
            tensors[tensor as usize].model_output = Some(index);
            output_tensors.push(tensor);
        }

        // ── Segments ───────────────────────────────────────────
        let mut segments = Vec::with_capacity(sequence.segments.len());
        for entry in &sequence.segments {
            tracing::debug!(segment = %entry.name, "Parsing segment");
            if entry.kind != ModuleKind::Graph {
                return Err(ContainerError::NonGraphSegment {
                    segment: entry.name.clone(),
                }
                .into());
            }

            let mut bindings = Vec::with_capacity(entry.inputs.len() + entry.outputs.len());
            let mut layout = Vec::with_capacity(bindings.capacity());
            for (kind, slots, context) in [
                (BindingKind::Input, &entry.inputs, "segment input"),
                (BindingKind::Output, &entry.outputs, "segment output"),
            ] {
                for slot in slots {
                    let tensor = tensor_of(&format!("{context} of '{}'", entry.name), slot)?;
                    layout.push(LayoutBinding {
                        binding: slot.binding,
                        descriptor_count: 1,
                    });
                    bindings.push(SegmentBinding {
                        kind,
                        binding: slot.binding,
                        tensor,
                    });
                }
            }

            if entry.descriptor_sets.len() != 1 {
                return Err(ContainerError::DescriptorSetCount {
                    segment: entry.name.clone(),
                    count: entry.descriptor_sets.len(),
                }
                .into());
            }
            if !entry.push_constants.is_empty() {
                return Err(ContainerError::PushConstantsNotSupported {
                    segment: entry.name.clone(),
                    count: entry.push_constants.len(),
                }
                .into());
            }

            let mut constants = Vec::with_capacity(entry.constants.len());
            for (id, &index) in entry.constants.iter().enumerate() {
                let constant = decoder.constant(index)?;
                let resource = decoder.resource(constant.resource_index)?;
                constants.push(SegmentConstant {
                    id: id as u32,
                    format: resource.format,
                    dims: resource.shape().dims().to_vec(),
                    data: constant.data.clone(),
                });
            }

            let module = decoder.module(entry.module_index)?;
            if module.kind != ModuleKind::Graph {
                return Err(ContainerError::NonGraphModule {
                    segment: entry.name.clone(),
                    module: entry.module_index,
                }
                .into());
            }
            if module.code.is_empty() || module.code.len() % 4 != 0 {
                return Err(ContainerError::MissingKernelCode {
                    module: entry.module_index,
                    detail: format!("{} bytes is not a whole number of words", module.code.len()),
                }
                .into());
            }

            let binding_layout = objects.create(ObjectDesc::BindingLayout { bindings: layout })?;
            let pipeline_layout = objects.create(ObjectDesc::PipelineLayout { binding_layout })?;

            segments.push(UnshapedSegment {
                name: entry.name.clone(),
                bindings,
                constants,
                code: module.code.clone(),
                entry_point: module.entry_point.clone(),
                binding_layout,
                pipeline_layout,
            });
        }

        tracing::info!(
            tensors = tensors.len(),
            inputs = inputs.len(),
            outputs = outputs.len(),
            segments = segments.len(),
            "Model created"
        );

        Ok(Arc::new(Self {
            tensors,
            inputs,
            outputs,
            input_tensors,
            output_tensors,
            segments,
            cache: Mutex::new(ShapedCache::default()),
            propagator,
            config: config.clone(),
            objects,
            container,
        }))
    }

    /// Returns the shaped model for `shapes`, building it on a cache miss.
    ///
    /// The cache lock is held across the build, so concurrent requests for
    /// the same shapes share one shaped model.
    pub fn find_or_create_shaped(
        self: &Arc<Self>,
        shapes: &[TensorShape],
    ) -> Result<Arc<ShapedModel>, RuntimeError> {
        let mut cache = self.lock_cache();
        let mut expired = false;
        if let Some(entry) = cache.entries.get(shapes) {
            match entry.upgrade() {
                Some(model) => {
                    if self.config.enable_metrics {
                        cache.stats.hits += 1;
                    }
                    tracing::debug!(shapes = %ShapeList(shapes), "Shaped model cache hit");
                    return Ok(model);
                }
                None => expired = true,
            }
        }

        if self.config.enable_metrics {
            cache.stats.misses += 1;
        }
        let model = Arc::new(ShapedModel::build(Arc::clone(self), shapes)?);
        if expired && self.config.enable_metrics {
            cache.stats.expired_replacements += 1;
        }
        cache.entries.insert(shapes.to_vec(), Arc::downgrade(&model));
        Ok(model)
    }

    /// Creates an unbound instance with its own descriptor pool.
    pub fn create_instance(self: &Arc<Self>) -> Result<ModelInstance, RuntimeError> {
        ModelInstance::new(Arc::clone(self))
    }

    pub fn input_descs(&self) -> &[TensorDesc] {
        &self.inputs
    }

    pub fn output_descs(&self) -> &[TensorDesc] {
        &self.outputs
    }

    pub fn tensors(&self) -> &[TensorInfo] {
        &self.tensors
    }

    pub fn segments(&self) -> &[UnshapedSegment] {
        &self.segments
    }

    /// Tensor id of each model input, by input index.
    pub fn input_tensors(&self) -> &[u32] {
        &self.input_tensors
    }

    /// Tensor id of each model output, by output index.
    pub fn output_tensors(&self) -> &[u32] {
        &self.output_tensors
    }

    pub fn container(&self) -> &ByteView {
        &self.container
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.lock_cache().stats.clone()
    }

    /// Number of cache entries whose shaped model is still alive.
    pub fn live_shaped_models(&self) -> usize {
        self.lock_cache()
            .entries
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    pub(crate) fn context(&self) -> &DeviceContext {
        self.objects.context()
    }

    pub(crate) fn propagator(&self) -> &dyn ShapePropagator {
        self.propagator.as_ref()
    }

    fn lock_cache(&self) -> MutexGuard<'_, ShapedCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for UnshapedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnshapedModel")
            .field("tensors", &self.tensors.len())
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("segments", &self.segments.len())
            .finish()
    }
}

/// Displays a shape tuple as `[1, 4] [2]`.
pub(crate) struct ShapeList<'a>(pub &'a [TensorShape]);

impl std::fmt::Display for ShapeList<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, shape) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{shape}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{pass_through_kernel, sample_container};
    use device_context::{HeadlessDevice, ObjectKind};
    use model_container::{ContainerBuilder, ResourceCategory, SegmentEntry};
    use shape_inference::InputShapeSeeder;
    use tensor_core::DType;

    fn load(device: &HeadlessDevice, bytes: Vec<u8>) -> Result<Arc<UnshapedModel>, RuntimeError> {
        let ctx = DeviceContext::spawn(device.clone(), "unshaped-test").unwrap();
        UnshapedModel::from_container(
            ctx,
            ByteView::from(bytes),
            &RuntimeConfig::default(),
            Arc::new(InputShapeSeeder),
        )
    }

    /// One segment `input → output` with a configurable entry.
    fn single_segment(edit: impl FnOnce(&mut ContainerBuilder, u32, u32, u32) -> SegmentEntry) -> Vec<u8> {
        let mut c = ContainerBuilder::new();
        let f32 = TensorFormat::R32_SFLOAT;
        let module = c.add_module(ModuleKind::Graph, "main", pass_through_kernel(DType::F32, &[-1]));
        let input = c.add_resource(ResourceCategory::Input, f32, vec![-1]);
        let output = c.add_resource(ResourceCategory::Output, f32, vec![-1]);
        c.add_model_input(BindingSlot::new(0, input));
        c.add_model_output(BindingSlot::new(0, output));
        let segment = edit(&mut c, module, input, output);
        c.add_segment(segment);
        c.build()
    }

    fn plain(_: &mut ContainerBuilder, module: u32, input: u32, output: u32) -> SegmentEntry {
        SegmentEntry::graph(
            "seg",
            module,
            vec![BindingSlot::new(0, input)],
            vec![BindingSlot::new(1, output)],
        )
    }

    #[test]
    fn test_sample_topology() {
        let device = HeadlessDevice::new();
        let model = load(&device, sample_container()).unwrap();

        // Input, intermediate and output get ids; the constant does not.
        assert_eq!(model.tensors().len(), 3);
        assert_eq!(model.tensors()[0].model_input, Some(0));
        assert!(model.tensors()[1].is_intermediate());
        assert_eq!(model.tensors()[2].model_output, Some(0));
        assert_eq!(model.input_descs()[0].name, "Input0");
        assert_eq!(model.output_descs()[0].name, "Output0");
        assert_eq!(model.input_descs()[0].shape.dims(), &[-1, 4]);

        let segments = model.segments();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].name, "scale");
        assert_eq!(segments[1].constants.len(), 1);
        assert_eq!(segments[1].constants[0].dims, vec![4]);
        assert!(segments[0].code.shares_owner(model.container()));
        assert!(segments[1].constants[0].data.shares_owner(model.container()));

        assert_eq!(device.live_objects(ObjectKind::BindingLayout), 2);
        assert_eq!(device.live_objects(ObjectKind::PipelineLayout), 2);
        drop(model);
        assert_eq!(device.stats().live_total(), 0);
    }

    #[test]
    fn test_descriptor_set_count_rejected() {
        let device = HeadlessDevice::new();
        let bytes = single_segment(|c, m, i, o| {
            let mut seg = plain(c, m, i, o);
            seg.descriptor_sets.push(Vec::new());
            seg
        });
        let err = load(&device, bytes).unwrap_err();
        assert!(err.to_string().contains("descriptor sets count unexpected"));
        assert_eq!(device.stats().live_total(), 0);
    }

    #[test]
    fn test_push_constants_rejected() {
        let device = HeadlessDevice::new();
        let bytes = single_segment(|c, m, i, o| {
            let mut seg = plain(c, m, i, o);
            seg.push_constants.push(model_container::PushConstantRange {
                stages: 1,
                offset: 0,
                size: 4,
            });
            seg
        });
        assert!(matches!(
            load(&device, bytes),
            Err(RuntimeError::Container(ContainerError::PushConstantsNotSupported { count: 1, .. }))
        ));
    }

    #[test]
    fn test_compute_segment_rejected() {
        let device = HeadlessDevice::new();
        let bytes = single_segment(|c, m, i, o| {
            let mut seg = plain(c, m, i, o);
            seg.kind = ModuleKind::Compute;
            seg
        });
        assert!(matches!(
            load(&device, bytes),
            Err(RuntimeError::Container(ContainerError::NonGraphSegment { .. }))
        ));
    }

    #[test]
    fn test_compute_module_rejected() {
        let device = HeadlessDevice::new();
        let bytes = single_segment(|c, _, i, o| {
            let compute = c.add_module(ModuleKind::Compute, "main", vec![0; 8]);
            plain(c, compute, i, o)
        });
        assert!(matches!(
            load(&device, bytes),
            Err(RuntimeError::Container(ContainerError::NonGraphModule { module: 1, .. }))
        ));
    }

    #[test]
    fn test_strided_resource_rejected() {
        let device = HeadlessDevice::new();
        let bytes = single_segment(|c, m, i, o| {
            c.add_strided_resource(ResourceCategory::Intermediate, TensorFormat::R32_SFLOAT, vec![2], vec![4]);
            plain(c, m, i, o)
        });
        assert!(matches!(
            load(&device, bytes),
            Err(RuntimeError::Container(ContainerError::StridesNotSupported { resource: 2 }))
        ));
    }

    #[test]
    fn test_missing_kernel_code_rejected() {
        let device = HeadlessDevice::new();
        let bytes = single_segment(|c, _, i, o| {
            let odd = c.add_module(ModuleKind::Graph, "main", vec![1, 2, 3]);
            plain(c, odd, i, o)
        });
        assert!(matches!(
            load(&device, bytes),
            Err(RuntimeError::Container(ContainerError::MissingKernelCode { .. }))
        ));
    }

    #[test]
    fn test_bad_cross_references_rejected() {
        let device = HeadlessDevice::new();

        let out_of_range = single_segment(|_, m, i, _| {
            SegmentEntry::graph("seg", m, vec![BindingSlot::new(0, i)], vec![BindingSlot::new(1, 99)])
        });
        assert!(matches!(
            load(&device, out_of_range),
            Err(RuntimeError::Container(ContainerError::ResourceIndexOutOfBounds { index: 99, .. }))
        ));

        let to_constant = single_segment(|c, m, i, _| {
            let k = c.add_resource(ResourceCategory::Constant, TensorFormat::R32_SFLOAT, vec![1]);
            SegmentEntry::graph("seg", m, vec![BindingSlot::new(0, i)], vec![BindingSlot::new(1, k)])
        });
        assert!(matches!(
            load(&device, to_constant),
            Err(RuntimeError::Container(ContainerError::NotATensor { resource: 2, .. }))
        ));

        let bad_constant = single_segment(|c, m, i, o| plain(c, m, i, o).with_constants(vec![5]));
        assert!(matches!(
            load(&device, bad_constant),
            Err(RuntimeError::Container(ContainerError::ConstantIndexOutOfBounds { index: 5, .. }))
        ));
        assert_eq!(device.stats().live_total(), 0);
    }

    #[test]
    fn test_failure_after_first_segment_cleans_up() {
        let device = HeadlessDevice::new();
        let mut c = ContainerBuilder::new();
        let f32 = TensorFormat::R32_SFLOAT;
        let module = c.add_module(ModuleKind::Graph, "main", pass_through_kernel(DType::F32, &[-1]));
        let a = c.add_resource(ResourceCategory::Input, f32, vec![-1]);
        let b = c.add_resource(ResourceCategory::Output, f32, vec![-1]);
        c.add_segment(SegmentEntry::graph("ok", module, vec![BindingSlot::new(0, a)], vec![BindingSlot::new(1, b)]));
        let mut bad = SegmentEntry::graph("bad", module, vec![BindingSlot::new(0, a)], vec![BindingSlot::new(1, b)]);
        bad.descriptor_sets.clear();
        c.add_segment(bad);

        assert!(load(&device, c.build()).is_err());
        let stats = device.stats();
        assert_eq!(stats.objects_created, 2);
        assert_eq!(stats.live_total(), 0);
    }

    #[test]
    fn test_header_errors_surface() {
        let device = HeadlessDevice::new();
        let mut bytes = sample_container();
        // Push the module section past the end of the buffer.
        bytes[8..16].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(
            load(&device, bytes),
            Err(RuntimeError::Container(ContainerError::SectionOutOfBounds { .. }))
        ));
        assert!(matches!(
            load(&device, vec![0; 10]),
            Err(RuntimeError::Container(ContainerError::InvalidHeader(_)))
        ));
    }
}
