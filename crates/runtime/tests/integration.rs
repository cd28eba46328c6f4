// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: wrapped model data → model → shaped model → instance
//! → executions on a headless device.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use device_context::{DeviceContext, HeadlessDevice, ObjectKind};
use model_container::{
    BindingSlot, ContainerBuilder, ContainerError, ModuleKind, ResourceCategory, SegmentEntry,
};
use runtime::sample::{pass_through_kernel, sample_container};
use runtime::{
    create_model_data, ExternalBuffer, GraphBuilder, LocalGraph, ModelInstance, Runtime,
    RuntimeConfig, RuntimeError, UnshapedModel,
};
use shape_inference::{InputShapeMap, InputShapeSeeder, ModuleBuilder, ShapeInferenceError, ShapePropagator};
use tensor_core::{DType, TensorFormat, TensorShape};

// ── Helpers ────────────────────────────────────────────────────

fn headless(config: RuntimeConfig) -> (Runtime, HeadlessDevice) {
    Runtime::headless(config).unwrap()
}

fn wrapped(container: Vec<u8>) -> Vec<u8> {
    create_model_data("vgf", &container).unwrap()
}

fn load(rt: &Runtime, container: Vec<u8>) -> Arc<UnshapedModel> {
    rt.create_model(wrapped(container)).unwrap()
}

fn shape(dims: &[u32]) -> TensorShape {
    TensorShape::from(dims)
}

/// Caller-owned input and output buffers for a `[rows, 4]` f32 tensor.
struct Io {
    input: ExternalBuffer,
    output: ExternalBuffer,
}

impl Io {
    fn new(rt: &Runtime, bytes: u64) -> Self {
        Self {
            input: ExternalBuffer::allocate(rt.context(), bytes, "input").unwrap(),
            output: ExternalBuffer::allocate(rt.context(), bytes, "output").unwrap(),
        }
    }

    fn release(self, ctx: &DeviceContext) {
        self.input.release(ctx).unwrap();
        self.output.release(ctx).unwrap();
    }
}

/// Enqueues one inference on a fresh graph and executes it.
fn run_once(ctx: &DeviceContext, instance: &mut ModelInstance, io: &Io) -> Result<(), RuntimeError> {
    let mut graph = LocalGraph::new(ctx.clone());
    let input = graph.register_external(io.input.clone());
    let output = graph.register_external(io.output.clone());
    instance.enqueue(&mut graph, &[input], &[output])?;
    graph.execute()
}

/// Two model inputs feeding one segment.
fn two_input_container() -> Vec<u8> {
    let mut b = ModuleBuilder::new();
    let lhs = b.tensor_type(DType::F32, &[-1]);
    let rhs = b.tensor_type(DType::F32, &[-1]);
    b.variable(lhs, 0, 0);
    b.variable(rhs, 0, 1);
    b.variable(lhs, 0, 2);

    let f32 = TensorFormat::R32_SFLOAT;
    let mut c = ContainerBuilder::new();
    let module = c.add_module(ModuleKind::Graph, "main", b.build_bytes());
    let a = c.add_resource(ResourceCategory::Input, f32, vec![-1]);
    let b = c.add_resource(ResourceCategory::Input, f32, vec![-1]);
    let out = c.add_resource(ResourceCategory::Output, f32, vec![-1]);
    c.add_model_input(BindingSlot::new(0, a));
    c.add_model_input(BindingSlot::new(1, b));
    c.add_model_output(BindingSlot::new(0, out));
    c.add_segment(SegmentEntry::graph(
        "add",
        module,
        vec![BindingSlot::new(0, a), BindingSlot::new(1, b)],
        vec![BindingSlot::new(2, out)],
    ));
    c.build()
}

/// Wraps the seeder and records the input map of every call.
#[derive(Default)]
struct Recording {
    calls: Mutex<Vec<InputShapeMap>>,
}

impl ShapePropagator for Recording {
    fn name(&self) -> &str {
        "recording"
    }

    fn propagate(&self, code: &[u32], inputs: &InputShapeMap) -> Result<Vec<u32>, ShapeInferenceError> {
        self.calls.lock().unwrap().push(inputs.clone());
        InputShapeSeeder.propagate(code, inputs)
    }
}

// ── Model construction ─────────────────────────────────────────

#[test]
fn test_tensor_ids_are_dense() {
    let (rt, _device) = headless(RuntimeConfig::default());
    let f32 = TensorFormat::R32_SFLOAT;
    let mut c = ContainerBuilder::new();
    let module = c.add_module(ModuleKind::Graph, "main", pass_through_kernel(DType::F32, &[-1]));
    c.add_resource(ResourceCategory::Constant, f32, vec![2]);
    let input = c.add_resource(ResourceCategory::Input, f32, vec![-1]);
    c.add_resource(ResourceCategory::Other(7), f32, vec![1]);
    let hidden = c.add_resource(ResourceCategory::Intermediate, f32, vec![-1]);
    let output = c.add_resource(ResourceCategory::Output, f32, vec![-1]);
    c.add_model_input(BindingSlot::new(0, input));
    c.add_model_output(BindingSlot::new(0, output));
    c.add_segment(SegmentEntry::graph("a", module, vec![BindingSlot::new(0, input)], vec![BindingSlot::new(1, hidden)]));
    c.add_segment(SegmentEntry::graph("b", module, vec![BindingSlot::new(0, hidden)], vec![BindingSlot::new(1, output)]));

    let model = load(&rt, c.build());
    let tensors = model.tensors();
    assert_eq!(tensors.len(), 3);
    assert_eq!(model.input_tensors(), &[0]);
    assert_eq!(model.output_tensors(), &[2]);

    let mut seen = vec![false; tensors.len()];
    for segment in model.segments() {
        for binding in &segment.bindings {
            assert!((binding.tensor as usize) < tensors.len());
            seen[binding.tensor as usize] = true;
        }
    }
    assert!(seen.iter().all(|&s| s));
}

#[test]
fn test_descriptor_set_count_rejected() {
    let (rt, device) = headless(RuntimeConfig::default());
    let mut c = ContainerBuilder::new();
    let f32 = TensorFormat::R32_SFLOAT;
    let module = c.add_module(ModuleKind::Graph, "main", pass_through_kernel(DType::F32, &[-1]));
    let input = c.add_resource(ResourceCategory::Input, f32, vec![-1]);
    let output = c.add_resource(ResourceCategory::Output, f32, vec![-1]);
    c.add_model_input(BindingSlot::new(0, input));
    c.add_model_output(BindingSlot::new(0, output));
    let mut segment = SegmentEntry::graph("seg", module, vec![BindingSlot::new(0, input)], vec![BindingSlot::new(1, output)]);
    segment.descriptor_sets.push(vec![BindingSlot::new(1, output)]);
    c.add_segment(segment);

    let err = rt.create_model(wrapped(c.build())).unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Container(ContainerError::DescriptorSetCount { count: 2, .. })
    ));
    assert!(err.to_string().contains("descriptor sets count unexpected"));
    assert_eq!(device.stats().live_total(), 0);
}

#[test]
fn test_section_out_of_bounds_rejected() {
    let (rt, _device) = headless(RuntimeConfig::default());
    let mut container = sample_container();
    let len = container.len() as u64;
    // Constants section: offset at 56, size at 64.
    container[64..72].copy_from_slice(&len.to_le_bytes());
    assert!(matches!(
        rt.create_model(wrapped(container)),
        Err(RuntimeError::Container(ContainerError::SectionOutOfBounds { .. }))
    ));
}

// ── Shaped-model cache ─────────────────────────────────────────

#[test]
fn test_cache_returns_same_shaped_model() {
    let (rt, _device) = headless(RuntimeConfig::default());
    let model = load(&rt, sample_container());
    let a = [shape(&[1, 4])];
    let b = [shape(&[2, 4])];

    let mut first = model.create_instance().unwrap();
    let mut second = model.create_instance().unwrap();
    let mut third = model.create_instance().unwrap();
    first.set_input_shapes(&a).unwrap();
    second.set_input_shapes(&b).unwrap();
    third.set_input_shapes(&a).unwrap();

    let shaped_a = first.shaped_model().unwrap();
    assert!(Arc::ptr_eq(shaped_a, third.shaped_model().unwrap()));
    assert!(!Arc::ptr_eq(shaped_a, second.shaped_model().unwrap()));
    assert_eq!(second.output_shapes(), Some(&b[..]));

    // Rebinding to the same tuple while another instance keeps it alive.
    third.set_input_shapes(&a).unwrap();
    assert!(Arc::ptr_eq(first.shaped_model().unwrap(), third.shaped_model().unwrap()));
    assert_eq!(first.output_shapes(), third.output_shapes());

    let stats = model.cache_stats();
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits, 2);
    assert_eq!(model.live_shaped_models(), 2);
}

#[test]
fn test_dead_shaped_model_is_rebuilt() {
    let (rt, device) = headless(RuntimeConfig::default());
    let model = load(&rt, sample_container());
    let a = [shape(&[1, 4])];

    let mut instance = model.create_instance().unwrap();
    instance.set_input_shapes(&a).unwrap();
    let weak = Arc::downgrade(instance.shaped_model().unwrap());
    drop(instance);
    assert!(weak.upgrade().is_none());
    assert_eq!(device.live_objects(ObjectKind::Pipeline), 0);
    assert_eq!(model.live_shaped_models(), 0);

    let mut again = model.create_instance().unwrap();
    again.set_input_shapes(&a).unwrap();
    assert_eq!(device.live_objects(ObjectKind::Pipeline), 2);
    let stats = model.cache_stats();
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.expired_replacements, 1);
}

#[test]
fn test_concurrent_binds_share_one_shaped_model() {
    let (rt, _device) = headless(RuntimeConfig::default());
    let model = load(&rt, sample_container());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let model = Arc::clone(&model);
            thread::spawn(move || {
                let mut instance = model.create_instance().unwrap();
                instance.set_input_shapes(&[shape(&[3, 4])]).unwrap();
                instance
            })
        })
        .collect();
    let instances: Vec<ModelInstance> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let first = instances[0].shaped_model().unwrap();
    assert!(instances
        .iter()
        .all(|i| Arc::ptr_eq(first, i.shaped_model().unwrap())));
    assert_eq!(model.cache_stats().misses, 1);
}

// ── Shape flow ─────────────────────────────────────────────────

#[test]
fn test_intermediate_shape_reaches_next_segment() {
    let (rt, _device) = headless(RuntimeConfig::default());
    let recording = Arc::new(Recording::default());
    let rt = rt.with_propagator(recording.clone());
    let model = load(&rt, sample_container());

    let mut instance = model.create_instance().unwrap();
    instance.set_input_shapes(&[shape(&[1, 4])]).unwrap();

    let calls = recording.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    let seeded: Vec<&TensorShape> = calls[1].values().collect();
    assert_eq!(seeded, vec![&shape(&[1, 4])]);

    // Tensor 1 is the intermediate produced by "scale".
    let shaped = instance.shaped_model().unwrap();
    assert_eq!(shaped.tensors()[1].shape, shape(&[1, 4]));
    assert_eq!(shaped.tensors()[1].num_bytes, 16);
    assert_eq!(instance.output_shapes(), Some(&[shape(&[1, 4])][..]));
}

#[test]
fn test_incompatible_shapes_leave_instance_unbound() {
    let (rt, _device) = headless(RuntimeConfig::default());
    let model = load(&rt, sample_container());
    let mut instance = model.create_instance().unwrap();

    assert!(matches!(
        instance.set_input_shapes(&[shape(&[4])]),
        Err(RuntimeError::Usage(_))
    ));
    assert!(matches!(
        instance.set_input_shapes(&[shape(&[1, 5])]),
        Err(RuntimeError::Usage(_))
    ));
    assert!(matches!(
        instance.set_input_shapes(&[shape(&[1, 4]), shape(&[1, 4])]),
        Err(RuntimeError::Usage(_))
    ));
    assert!(!instance.is_bound());
    assert!(instance.input_shapes().is_none());
    assert_eq!(model.cache_stats().misses, 0);
}

#[test]
fn test_oversized_shape_rejected() {
    let (rt, device) = headless(RuntimeConfig::default());
    let f32 = TensorFormat::R32_SFLOAT;
    let mut c = ContainerBuilder::new();
    let module = c.add_module(ModuleKind::Graph, "main", pass_through_kernel(DType::F32, &[-1, -1, -1, -1]));
    let input = c.add_resource(ResourceCategory::Input, f32, vec![-1, -1, -1, -1]);
    let output = c.add_resource(ResourceCategory::Output, f32, vec![-1, -1, -1, -1]);
    c.add_model_input(BindingSlot::new(0, input));
    c.add_model_output(BindingSlot::new(0, output));
    c.add_segment(SegmentEntry::graph(
        "seg",
        module,
        vec![BindingSlot::new(0, input)],
        vec![BindingSlot::new(1, output)],
    ));
    let model = load(&rt, c.build());
    let pipelines_before = device.live_objects(ObjectKind::Pipeline);

    let mut instance = model.create_instance().unwrap();
    assert!(matches!(
        instance.set_input_shapes(&[shape(&[65536, 65536, 65536, 65536])]),
        Err(RuntimeError::ShapeTooLarge { tensor: 0, .. })
    ));
    assert!(!instance.is_bound());
    assert_eq!(device.live_objects(ObjectKind::Pipeline), pipelines_before);

    // The cache is still usable after the failed build.
    instance.set_input_shapes(&[shape(&[1, 2, 3, 4])]).unwrap();
    let shaped = instance.shaped_model().unwrap();
    assert_eq!(shaped.tensors()[1].num_bytes, 96);
}

// ── Enqueue ────────────────────────────────────────────────────

#[test]
fn test_enqueue_runs_every_segment() {
    let (rt, device) = headless(RuntimeConfig::default());
    let model = load(&rt, sample_container());
    let mut instance = model.create_instance().unwrap();
    instance.set_input_shapes(&[shape(&[2, 4])]).unwrap();
    let io = Io::new(&rt, 32);

    let mut graph = LocalGraph::new(rt.context().clone());
    let input = graph.register_external(io.input.clone());
    let output = graph.register_external(io.output.clone());
    instance.enqueue(&mut graph, &[input], &[output]).unwrap();
    // Two externals, one intermediate, two session buffers.
    assert_eq!(graph.num_buffers(), 5);
    assert_eq!(graph.num_transient_buffers(), 1);
    assert_eq!(graph.num_passes(), 1);
    graph.execute().unwrap();

    let stats = device.stats();
    assert_eq!(stats.dispatches, 2);
    assert_eq!(stats.fences_written, 1);
    assert_eq!(instance.in_flight(), 1);
    assert_eq!(device.live_objects(ObjectKind::DescriptorSet), 2);
    assert_eq!(device.live_objects(ObjectKind::TensorView), 3);

    instance.unbind_shapes().unwrap();
    assert_eq!(instance.in_flight(), 0);
    assert_eq!(device.live_objects(ObjectKind::DescriptorSet), 0);
    assert_eq!(device.live_objects(ObjectKind::Tensor), 0);
    assert_eq!(device.live_objects(ObjectKind::PipelineSession), 0);
    io.release(rt.context());
}

#[test]
fn test_count_mismatch_declares_nothing() {
    let (rt, device) = headless(RuntimeConfig::default());
    let model = load(&rt, two_input_container());
    assert_eq!(model.input_descs().len(), 2);
    let mut instance = model.create_instance().unwrap();
    instance.set_input_shapes(&[shape(&[4]), shape(&[4])]).unwrap();

    let mut graph = LocalGraph::new(rt.context().clone());
    let inputs: Vec<_> = (0..3).map(|i| graph.create_buffer(16, &format!("in{i}"))).collect();
    let output = graph.create_buffer(16, "out");
    let created = device.stats().objects_created;

    let err = instance.enqueue(&mut graph, &inputs, &[output]).unwrap_err();
    assert!(matches!(err, RuntimeError::Usage(_)));
    assert!(err.to_string().contains("2 inputs, 3 given"));
    assert_eq!(graph.num_buffers(), 4);
    assert_eq!(graph.num_passes(), 0);
    assert_eq!(device.stats().objects_created, created);
}

#[test]
fn test_undersized_buffer_rejected() {
    let (rt, _device) = headless(RuntimeConfig::default());
    let model = load(&rt, sample_container());
    let mut instance = model.create_instance().unwrap();
    instance.set_input_shapes(&[shape(&[1, 4])]).unwrap();

    let mut graph = LocalGraph::new(rt.context().clone());
    let input = graph.create_buffer(16, "in");
    let output = graph.create_buffer(8, "out");
    let err = instance.enqueue(&mut graph, &[input], &[output]).unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::BufferTooSmall { ref name, required: 16, actual: 8 } if name == "Output0"
    ));
    assert_eq!(graph.num_buffers(), 2);
    assert_eq!(graph.num_passes(), 0);
}

#[test]
fn test_enqueue_requires_bound_shapes() {
    let (rt, _device) = headless(RuntimeConfig::default());
    let model = load(&rt, sample_container());
    let mut instance = model.create_instance().unwrap();
    let mut graph = LocalGraph::new(rt.context().clone());
    let input = graph.create_buffer(16, "in");
    let output = graph.create_buffer(16, "out");
    assert!(matches!(
        instance.enqueue(&mut graph, &[input], &[output]),
        Err(RuntimeError::Usage(_))
    ));
    assert_eq!(graph.num_passes(), 0);
}

#[test]
fn test_rebind_invalidates_pending_pass() {
    let (rt, device) = headless(RuntimeConfig::default());
    let model = load(&rt, sample_container());
    let mut instance = model.create_instance().unwrap();
    instance.set_input_shapes(&[shape(&[1, 4])]).unwrap();
    let io = Io::new(&rt, 16);

    let mut graph = LocalGraph::new(rt.context().clone());
    let input = graph.register_external(io.input.clone());
    let output = graph.register_external(io.output.clone());
    instance.enqueue(&mut graph, &[input], &[output]).unwrap();
    instance.set_input_shapes(&[shape(&[1, 4])]).unwrap();

    assert!(matches!(graph.execute(), Err(RuntimeError::Usage(_))));
    assert_eq!(device.stats().dispatches, 0);
    io.release(rt.context());
}

// ── In-flight bound ────────────────────────────────────────────

#[test]
fn test_eleventh_execution_waits_for_a_fence() {
    let (rt, device) = headless(RuntimeConfig::default());
    let model = load(&rt, sample_container());
    let mut instance = model.create_instance().unwrap();
    instance.set_input_shapes(&[shape(&[1, 4])]).unwrap();
    let io = Io::new(&rt, 16);
    let ctx = rt.context().clone();

    device.hold_fences();
    for _ in 0..runtime::MAX_CONCURRENT_EXECUTIONS_PER_INSTANCE {
        run_once(&ctx, &mut instance, &io).unwrap();
    }
    assert_eq!(instance.in_flight(), 10);
    assert_eq!(device.pending_fences(), 10);

    let worker = {
        let ctx = ctx.clone();
        let input = io.input.clone();
        let output = io.output.clone();
        thread::spawn(move || {
            let io = Io { input, output };
            run_once(&ctx, &mut instance, &io).unwrap();
            instance
        })
    };
    thread::sleep(Duration::from_millis(100));
    assert!(!worker.is_finished());
    assert_eq!(device.pending_fences(), 10);
    assert_eq!(device.live_objects(ObjectKind::Fence), 10);

    device.release_fences();
    let instance = worker.join().unwrap();
    let stats = instance.stats();
    assert_eq!(stats.executions_enqueued, 11);
    assert_eq!(stats.executions_reclaimed, 10);
    assert_eq!(stats.slot_waits, 1);
    assert!(stats.poll_iterations >= 1);
    assert_eq!(stats.peak_in_flight, 10);
    assert_eq!(instance.in_flight(), 1);

    drop(instance);
    io.release(&ctx);
}

#[test]
fn test_configured_concurrency_limit() {
    let config = RuntimeConfig {
        max_concurrent_executions: 2,
        ..RuntimeConfig::default()
    };
    let (rt, device) = headless(config);
    let model = load(&rt, sample_container());
    let mut instance = model.create_instance().unwrap();
    instance.set_input_shapes(&[shape(&[1, 4])]).unwrap();
    let io = Io::new(&rt, 16);

    for _ in 0..5 {
        run_once(rt.context(), &mut instance, &io).unwrap();
        assert!(instance.in_flight() <= 2);
    }
    assert_eq!(device.stats().dispatches, 10);
    assert!(instance.stats().slot_waits >= 1);
    drop(instance);
    io.release(rt.context());
}

#[test]
fn test_unbind_waits_for_slow_fences() {
    let mut config = RuntimeConfig::default();
    config.headless.fence_latency_flushes = 3;
    let (rt, device) = headless(config);
    let model = load(&rt, sample_container());
    let mut instance = model.create_instance().unwrap();
    instance.set_input_shapes(&[shape(&[1, 4])]).unwrap();
    let io = Io::new(&rt, 16);

    for _ in 0..3 {
        run_once(rt.context(), &mut instance, &io).unwrap();
    }
    assert_eq!(instance.in_flight(), 3);

    instance.unbind_shapes().unwrap();
    assert_eq!(instance.in_flight(), 0);
    assert_eq!(device.pending_fences(), 0);
    assert!(instance.stats().poll_iterations >= 2);
    for kind in [
        ObjectKind::Fence,
        ObjectKind::Tensor,
        ObjectKind::TensorView,
        ObjectKind::DescriptorSet,
        ObjectKind::PipelineSession,
    ] {
        assert_eq!(device.live_objects(kind), 0, "{kind:?} left alive");
    }
    io.release(rt.context());
}

#[test]
fn test_everything_released_on_drop() {
    let (rt, device) = headless(RuntimeConfig::default());
    let model = load(&rt, sample_container());
    let mut instance = model.create_instance().unwrap();
    instance.set_input_shapes(&[shape(&[1, 4])]).unwrap();
    let io = Io::new(&rt, 16);
    for _ in 0..4 {
        run_once(rt.context(), &mut instance, &io).unwrap();
    }
    drop(instance);
    drop(model);
    io.release(rt.context());

    let stats = device.stats();
    assert_eq!(stats.live_total(), 0);
    assert_eq!(stats.objects_created, stats.objects_destroyed);
    assert_eq!(stats.allocated_bytes, 0);
}

// ── Entry point ────────────────────────────────────────────────

#[test]
fn test_model_data_is_validated() {
    let (rt, _device) = headless(RuntimeConfig::default());
    assert_eq!(rt.name(), "dgraph-rt");

    let raw = sample_container();
    let err = rt.create_model(raw.clone()).unwrap_err();
    assert!(err.to_string().contains("tag"));

    let mut stale = wrapped(raw);
    stale[16..20].copy_from_slice(&2i32.to_le_bytes());
    let err = rt.create_model(stale).unwrap_err();
    assert!(err.to_string().contains("version 2"));

    let err = rt.create_model(wrapped(Vec::new())).unwrap_err();
    assert!(err.to_string().contains("too small"));

    assert!(rt.model_data_identifier("model").starts_with("model-0000004E"));
}

#[test]
fn test_device_without_data_graph() {
    let device = HeadlessDevice::new().without_data_graph();
    let ctx = DeviceContext::spawn(device, "no-graph").unwrap();
    let rt = Runtime::new(ctx, RuntimeConfig::default()).unwrap();
    assert!(!rt.supports_inference());

    let data = rt.create_model_data("vgf", &sample_container()).unwrap();
    assert!(matches!(rt.create_model(data), Err(RuntimeError::Unsupported(_))));
}

#[tokio::test]
async fn test_pipeline_from_async_context() {
    let stats = tokio::task::spawn_blocking(|| {
        let (rt, _device) = headless(RuntimeConfig::default());
        let model = load(&rt, sample_container());
        let mut instance = model.create_instance().unwrap();
        instance.set_input_shapes(&[shape(&[2, 4])]).unwrap();
        let io = Io::new(&rt, 32);
        for _ in 0..3 {
            run_once(rt.context(), &mut instance, &io).unwrap();
        }
        instance.unbind_shapes().unwrap();
        let stats = instance.stats();
        drop(instance);
        io.release(rt.context());
        stats
    })
    .await
    .unwrap();

    assert_eq!(stats.executions_enqueued, 3);
    assert_eq!(stats.executions_reclaimed, 3);
}
