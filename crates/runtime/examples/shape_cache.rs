// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Example: share shaped models between instances and watch the in-flight
//! limit at work.
//!
//! Four instances bind the sample model to two batch sizes. Instances with
//! equal shapes share one shaped model; each then pipelines inferences on a
//! headless device whose fences signal only after several flushes.
//!
//! ```bash
//! cargo run -p runtime --example shape_cache
//! ```

use runtime::{ExternalBuffer, GraphBuilder, HeadlessConfig, LocalGraph, Runtime, RuntimeConfig};
use tensor_core::TensorShape;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config = RuntimeConfig {
        max_concurrent_executions: 4,
        headless: HeadlessConfig {
            fence_latency_flushes: 3,
            ..HeadlessConfig::default()
        },
        ..RuntimeConfig::default()
    };

    let (rt, device) = Runtime::headless(config)?;
    let ctx = rt.context().clone();
    let model = rt.create_model(runtime::create_model_data(
        runtime::SUPPORTED_FILE_TYPE,
        &runtime::sample::sample_container(),
    )?)?;

    let batches = [1u32, 8, 1, 8];
    let mut instances = Vec::new();
    for &rows in &batches {
        let mut instance = model.create_instance()?;
        instance.set_input_shapes(&[TensorShape::new(vec![rows, 4])])?;
        instances.push(instance);
    }
    println!("Instances: {}, shaped models alive: {}", instances.len(), model.live_shaped_models());
    println!("Cache: {}\n", model.cache_stats().summary());

    println!(
        "{:<10} {:>8} {:>10} {:>12} {:>12}",
        "Instance", "Rows", "Enqueued", "Slot waits", "Peak flight",
    );
    println!("{}", "-".repeat(56));

    for (i, instance) in instances.iter_mut().enumerate() {
        let rows = batches[i];
        let bytes = u64::from(rows) * 4 * 4;
        let input = ExternalBuffer::allocate(&ctx, bytes, "input")?;
        let output = ExternalBuffer::allocate(&ctx, bytes, "output")?;

        for _ in 0..12 {
            let mut graph = LocalGraph::new(ctx.clone());
            let inputs = [graph.register_external(input.clone())];
            let outputs = [graph.register_external(output.clone())];
            instance.enqueue(&mut graph, &inputs, &outputs)?;
            graph.execute()?;
        }
        while instance.in_flight() > 0 {
            ctx.flush()?;
            instance.reclaim()?;
        }

        let stats = instance.stats();
        println!(
            "{:<10} {:>8} {:>10} {:>12} {:>12}",
            i, rows, stats.executions_enqueued, stats.slot_waits, stats.peak_in_flight,
        );
        input.release(&ctx)?;
        output.release(&ctx)?;
    }

    drop(instances);
    println!("\nShaped models alive after drop: {}", model.live_shaped_models());
    println!("Device: {}", device.stats().summary());
    Ok(())
}
