// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommands and the helpers they share.

pub mod bind;
pub mod demo;
pub mod inspect;
pub mod run;
pub mod wrap;

use std::path::Path;

use model_container::{ByteView, SharedBytes};
use runtime::{RuntimeConfig, MODEL_DATA_PREFIX_LEN};
use tensor_core::TensorShape;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber; `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Loads the runtime configuration, or the defaults without a file.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::from_file(path)
            .map_err(|e| anyhow::anyhow!("failed to load config '{}': {e}", path.display())),
        None => Ok(RuntimeConfig::default()),
    }
}

/// A model file on disk, either raw or wrapped.
pub struct ModelFile {
    bytes: ByteView,
    wrapped: bool,
}

impl ModelFile {
    /// Maps `path` and detects the model-data prefix.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let bytes = SharedBytes::map_file(path)
            .map_err(|e| anyhow::anyhow!("failed to open '{}': {e}", path.display()))?
            .view();
        let wrapped = runtime::validate_model_data(bytes.as_slice()).is_ok();
        tracing::debug!(path = %path.display(), len = bytes.len(), wrapped, "Opened model file");
        Ok(Self { bytes, wrapped })
    }

    pub fn is_wrapped(&self) -> bool {
        self.wrapped
    }

    /// The raw container bytes.
    pub fn container(&self) -> anyhow::Result<ByteView> {
        if self.wrapped {
            Ok(self.bytes.slice_from(MODEL_DATA_PREFIX_LEN)?)
        } else {
            Ok(self.bytes.clone())
        }
    }

    /// The bytes as model data, wrapping a raw container in memory.
    pub fn model_data(&self) -> anyhow::Result<ByteView> {
        if self.wrapped {
            Ok(self.bytes.clone())
        } else {
            let data = runtime::create_model_data(runtime::SUPPORTED_FILE_TYPE, self.bytes.as_slice())?;
            Ok(ByteView::from(data))
        }
    }
}

/// Parses `--shape` arguments such as `1x4`.
pub fn parse_shapes(shapes: &[String]) -> anyhow::Result<Vec<TensorShape>> {
    shapes
        .iter()
        .map(|s| TensorShape::parse(s).map_err(|e| anyhow::anyhow!("bad shape '{s}': {e}")))
        .collect()
}

pub fn banner(title: &str) {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║ {:^52} ║", title);
    println!("╚══════════════════════════════════════════════════════╝");
    println!();
}
