// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Wrapped model data.
//!
//! Cooked model data is the raw container with a tag and a version in
//! front, so stale or foreign data is caught before decoding.
//!
//! ```text
//! ┌──────────────────┬─────────────┬──────────────────────┐
//! │ tag (16 bytes)   │ version i32 │ container bytes ...  │
//! └──────────────────┴─────────────┴──────────────────────┘
//! ```

use std::fmt::Write as _;

use crate::RuntimeError;

/// Identifies data produced by [`create_model_data`]: four little-endian
/// `u32` words `'N'`, `'A'`, `'M'`, `'V'`.
pub const MODEL_DATA_TAG: [u8; 16] = [
    b'N', 0, 0, 0, b'A', 0, 0, 0, b'M', 0, 0, 0, b'V', 0, 0, 0,
];

pub const MODEL_DATA_VERSION: i32 = 1;

/// Bytes in front of the container.
pub const MODEL_DATA_PREFIX_LEN: usize = MODEL_DATA_TAG.len() + std::mem::size_of::<i32>();

/// The only source file type that can be wrapped.
pub const SUPPORTED_FILE_TYPE: &str = "vgf";

/// Whether a file type can be turned into model data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelDataSupport {
    Supported,
    FileTypeNotSupported,
}

pub fn can_create_model_data(file_type: &str) -> ModelDataSupport {
    if file_type.eq_ignore_ascii_case(SUPPORTED_FILE_TYPE) {
        ModelDataSupport::Supported
    } else {
        ModelDataSupport::FileTypeNotSupported
    }
}

/// Prepends the tag and version to `container`.
pub fn create_model_data(file_type: &str, container: &[u8]) -> Result<Vec<u8>, RuntimeError> {
    if can_create_model_data(file_type) != ModelDataSupport::Supported {
        tracing::debug!(file_type, "File type not supported");
        return Err(RuntimeError::ModelData(format!(
            "file type '{file_type}' not supported"
        )));
    }
    let mut out = Vec::with_capacity(MODEL_DATA_PREFIX_LEN + container.len());
    out.extend_from_slice(&MODEL_DATA_TAG);
    out.extend_from_slice(&MODEL_DATA_VERSION.to_le_bytes());
    out.extend_from_slice(container);
    Ok(out)
}

/// Cache key for cooked data derived from `file_id`.
pub fn model_data_identifier(file_id: &str) -> String {
    let mut tag = String::with_capacity(MODEL_DATA_TAG.len() * 2);
    for word in MODEL_DATA_TAG.chunks_exact(4) {
        let value = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        let _ = write!(tag, "{value:08X}");
    }
    format!("{file_id}-{tag}-{MODEL_DATA_VERSION}")
}

/// Checks the prefix of wrapped model data.
pub fn validate_model_data(data: &[u8]) -> Result<(), RuntimeError> {
    if data.len() <= MODEL_DATA_PREFIX_LEN {
        return Err(RuntimeError::ModelData(format!(
            "model data too small ({} bytes)",
            data.len()
        )));
    }
    if data[..MODEL_DATA_TAG.len()] != MODEL_DATA_TAG {
        return Err(RuntimeError::ModelData(
            "model data has incorrect tag".into(),
        ));
    }
    let version = i32::from_le_bytes([data[16], data[17], data[18], data[19]]);
    if version != MODEL_DATA_VERSION {
        return Err(RuntimeError::ModelData(format!(
            "model data version {version} does not match {MODEL_DATA_VERSION}"
        )));
    }
    Ok(())
}
