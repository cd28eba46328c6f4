// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `dgrt wrap` command: turn a raw container into model data.

use std::path::PathBuf;

use model_container::ContainerDecoder;
use runtime::{ModelDataSupport, SUPPORTED_FILE_TYPE};

use super::ModelFile;

pub async fn execute(input: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let model = ModelFile::open(&input)?;
    if model.is_wrapped() {
        anyhow::bail!("'{}' is already wrapped model data", input.display());
    }

    let file_type = input
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or(SUPPORTED_FILE_TYPE);
    if runtime::can_create_model_data(file_type) != ModelDataSupport::Supported {
        anyhow::bail!("file type '{file_type}' is not supported, expected '{SUPPORTED_FILE_TYPE}'");
    }

    // Refuse to wrap something that will never decode.
    let container = model.container()?;
    ContainerDecoder::new(container.clone())
        .map_err(|e| anyhow::anyhow!("'{}' is not a valid container: {e}", input.display()))?;

    let data = runtime::create_model_data(file_type, container.as_slice())?;
    std::fs::write(&output, &data)
        .map_err(|e| anyhow::anyhow!("failed to write '{}': {e}", output.display()))?;

    tracing::info!(input = %input.display(), output = %output.display(), bytes = data.len(), "Wrapped model data");
    println!(
        "  Wrapped {} → {} ({} bytes, id {})",
        input.display(),
        output.display(),
        data.len(),
        runtime::model_data_identifier(&input.display().to_string())
    );
    Ok(())
}
