// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `dgrt demo` command: write the built-in sample model.

use std::path::PathBuf;

pub async fn execute(output: PathBuf, wrap: bool) -> anyhow::Result<()> {
    let container = runtime::sample::sample_container();
    let bytes = if wrap {
        runtime::create_model_data(runtime::SUPPORTED_FILE_TYPE, &container)?
    } else {
        container
    };
    std::fs::write(&output, &bytes)
        .map_err(|e| anyhow::anyhow!("failed to write '{}': {e}", output.display()))?;

    println!("  Wrote {} ({} bytes)", output.display(), bytes.len());
    println!();
    println!("  Try:");
    println!("   dgrt inspect {}", output.display());
    println!("   dgrt run {} --shape 8x4 --iterations 32", output.display());
    Ok(())
}
