// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for model loading, shape binding and enqueue on the headless
//! device.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use model_container::{ByteView, ContainerDecoder};
use runtime::sample::sample_container;
use runtime::{create_model_data, ExternalBuffer, GraphBuilder, LocalGraph, Runtime, RuntimeConfig};
use tensor_core::TensorShape;

fn bench_container_decode(c: &mut Criterion) {
    let bytes = ByteView::from(sample_container());
    c.bench_function("container_decode", |b| {
        b.iter(|| ContainerDecoder::new(bytes.clone()).unwrap())
    });
}

fn bench_create_model(c: &mut Criterion) {
    let (rt, _device) = Runtime::headless(RuntimeConfig::default()).unwrap();
    let data = ByteView::from(create_model_data("vgf", &sample_container()).unwrap());
    c.bench_function("create_model", |b| {
        b.iter(|| rt.create_model(data.clone()).unwrap())
    });
}

fn bench_bind_shapes(c: &mut Criterion) {
    let (rt, _device) = Runtime::headless(RuntimeConfig::default()).unwrap();
    let model = rt
        .create_model(create_model_data("vgf", &sample_container()).unwrap())
        .unwrap();
    let shapes = [TensorShape::new(vec![8, 4])];

    let mut group = c.benchmark_group("bind_shapes");
    // A fresh instance each time: the shaped model dies with it, so every
    // bind rebuilds pipelines.
    group.bench_function("cold", |b| {
        b.iter_batched(
            || model.create_instance().unwrap(),
            |mut instance| instance.set_input_shapes(&shapes).unwrap(),
            BatchSize::SmallInput,
        )
    });
    // A second instance keeps the shaped model cached.
    let mut keeper = model.create_instance().unwrap();
    keeper.set_input_shapes(&shapes).unwrap();
    group.bench_function("cached", |b| {
        b.iter_batched(
            || model.create_instance().unwrap(),
            |mut instance| instance.set_input_shapes(&shapes).unwrap(),
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_enqueue_execute(c: &mut Criterion) {
    let (rt, _device) = Runtime::headless(RuntimeConfig::default()).unwrap();
    let model = rt
        .create_model(create_model_data("vgf", &sample_container()).unwrap())
        .unwrap();
    let mut instance = model.create_instance().unwrap();
    instance.set_input_shapes(&[TensorShape::new(vec![8, 4])]).unwrap();
    let input = ExternalBuffer::allocate(rt.context(), 128, "input").unwrap();
    let output = ExternalBuffer::allocate(rt.context(), 128, "output").unwrap();

    c.bench_function("enqueue_execute", |b| {
        b.iter(|| {
            let mut graph = LocalGraph::new(rt.context().clone());
            let i = graph.register_external(input.clone());
            let o = graph.register_external(output.clone());
            instance.enqueue(&mut graph, &[i], &[o]).unwrap();
            graph.execute().unwrap();
        })
    });

    instance.unbind_shapes().unwrap();
    input.release(rt.context()).unwrap();
    output.release(rt.context()).unwrap();
}

criterion_group!(
    benches,
    bench_container_decode,
    bench_create_model,
    bench_bind_shapes,
    bench_enqueue_execute
);
criterion_main!(benches);
