// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `dgrt run` command: pipeline inferences on the headless device.
//!
//! ```text
//! create_model → create_instance → set_input_shapes → enqueue × N → drain
//! ```
//!
//! Each iteration builds a one-pass [`LocalGraph`] over caller-owned input
//! and output buffers and executes it, so up to the configured concurrency
//! limit of executions are in flight at once.

use std::path::PathBuf;
use std::time::Instant;

use runtime::{ExternalBuffer, GraphBuilder, LocalGraph, Runtime};

use super::ModelFile;

pub async fn execute(
    file: PathBuf,
    shapes: Vec<String>,
    iterations: usize,
    json: bool,
    config: Option<PathBuf>,
) -> anyhow::Result<()> {
    if !json {
        super::banner("dgraph-rt · Inference Runner");
    }

    let config = super::load_config(config.as_deref())?;
    let shapes = super::parse_shapes(&shapes)?;
    let model = ModelFile::open(&file)?;

    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let (rt, device) = Runtime::headless(config)?;
        let ctx = rt.context().clone();

        if !json {
            println!("  Config:");
            println!("   Model:        {}", file.display());
            println!("   Shapes:       {}", shapes.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", "));
            println!("   Iterations:   {iterations}");
            println!("   Concurrency:  {}", rt.config().max_concurrent_executions);
            println!();
        }

        // Step 1: model and instance.
        let start = Instant::now();
        let unshaped = rt.create_model(model.model_data()?)?;
        let mut instance = unshaped.create_instance()?;
        instance.set_input_shapes(&shapes)?;
        let bind_time = start.elapsed();

        let shaped = instance
            .shaped_model()
            .ok_or_else(|| anyhow::anyhow!("instance lost its shapes after binding"))?
            .clone();
        let size_of = |tensor: u32| shaped.tensors()[tensor as usize].num_bytes;

        // Step 2: caller-owned buffers.
        let mut externals = Vec::new();
        for (i, &tensor) in unshaped.input_tensors().iter().enumerate() {
            externals.push(ExternalBuffer::allocate(&ctx, size_of(tensor), &format!("input{i}"))?);
        }
        let num_inputs = externals.len();
        for (i, &tensor) in unshaped.output_tensors().iter().enumerate() {
            externals.push(ExternalBuffer::allocate(&ctx, size_of(tensor), &format!("output{i}"))?);
        }

        // Step 3: enqueue and execute.
        let start = Instant::now();
        let mut outcome = Ok(());
        for i in 0..iterations {
            let mut graph = LocalGraph::new(ctx.clone());
            let buffers: Vec<_> = externals
                .iter()
                .map(|buffer| graph.register_external(buffer.clone()))
                .collect();
            let (inputs, outputs) = buffers.split_at(num_inputs);
            let step = instance
                .enqueue(&mut graph, inputs, outputs)
                .and_then(|()| graph.execute());
            if let Err(e) = step {
                tracing::error!(iteration = i, error = %e, "Inference failed");
                outcome = Err(e);
                break;
            }
        }
        while outcome.is_ok() && instance.in_flight() > 0 {
            outcome = ctx
                .flush()
                .map_err(Into::into)
                .and_then(|()| instance.reclaim().map(|_| ()));
        }
        let run_time = start.elapsed();

        let instance_stats = instance.stats();
        drop(instance);
        for buffer in externals {
            buffer.release(&ctx)?;
        }
        outcome?;

        let device_stats = device.stats();
        let cache_stats = unshaped.cache_stats();
        let per_iteration_us = if iterations == 0 {
            0.0
        } else {
            run_time.as_secs_f64() * 1e6 / iterations as f64
        };

        if json {
            let report = serde_json::json!({
                "model": file.display().to_string(),
                "input_shapes": shaped.input_shapes().iter().map(|s| s.dims().to_vec()).collect::<Vec<_>>(),
                "output_shapes": shaped.output_shapes().iter().map(|s| s.dims().to_vec()).collect::<Vec<_>>(),
                "iterations": iterations,
                "bind_ms": bind_time.as_secs_f64() * 1e3,
                "run_ms": run_time.as_secs_f64() * 1e3,
                "per_iteration_us": per_iteration_us,
                "instance": instance_stats,
                "cache": cache_stats,
                "device": device_stats,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        println!("  Results:");
        println!(
            "   Outputs:      {}",
            shaped.output_shapes().iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", ")
        );
        println!("   Bind:         {:.2} ms", bind_time.as_secs_f64() * 1e3);
        println!("   Run:          {:.2} ms ({per_iteration_us:.1} µs/inference)", run_time.as_secs_f64() * 1e3);
        println!();
        println!("  Metrics:");
        println!("   Instance:     {}", instance_stats.summary());
        println!("   Cache:        {}", cache_stats.summary());
        println!("   Device:       {}", device_stats.summary());
        println!();
        Ok(())
    })
    .await?
}
