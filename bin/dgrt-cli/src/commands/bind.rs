// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `dgrt bind` command: resolve every tensor shape for concrete inputs.

use std::path::PathBuf;

use runtime::Runtime;

use super::ModelFile;

pub async fn execute(file: PathBuf, shapes: Vec<String>, config: Option<PathBuf>) -> anyhow::Result<()> {
    super::banner("dgraph-rt · Shape Binding");

    let config = super::load_config(config.as_deref())?;
    let shapes = super::parse_shapes(&shapes)?;
    let model = ModelFile::open(&file)?;

    // Device calls block on the device thread's reply.
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let (rt, device) = Runtime::headless(config)?;
        let unshaped = rt.create_model(model.model_data()?)?;

        println!("  Runtime:  {}", rt.name());
        println!("  Model:    {}", file.display());
        println!();
        println!("  Declared:");
        for desc in unshaped.input_descs().iter().chain(unshaped.output_descs()) {
            println!("   {:<10} {:<20} {}", desc.name, desc.shape.to_string(), desc.format);
        }
        println!();

        let shaped = unshaped.find_or_create_shaped(&shapes)?;

        println!("  Resolved tensors:");
        println!("  {:<4} {:<14} {:<20} {:>12}", "Id", "Role", "Shape", "Bytes");
        println!("  {}", "-".repeat(54));
        for (id, (info, tensor)) in unshaped.tensors().iter().zip(shaped.tensors()).enumerate() {
            let role = match (info.model_input, info.model_output) {
                (Some(i), _) => format!("input {i}"),
                (_, Some(o)) => format!("output {o}"),
                _ => "intermediate".to_string(),
            };
            println!(
                "  {:<4} {:<14} {:<20} {:>12}",
                id,
                role,
                tensor.shape.to_string(),
                tensor.num_bytes
            );
        }
        println!();
        println!("  Segments:        {}", unshaped.segments().len());
        println!("  Device objects:  {}", shaped.num_device_objects());
        println!("  Device:          {}", device.stats().summary());
        println!();
        Ok(())
    })
    .await?
}
