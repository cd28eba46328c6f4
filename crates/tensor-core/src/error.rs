// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor metadata handling.

/// Errors that can occur while building or parsing tensor metadata.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// A textual shape could not be parsed.
    #[error("invalid shape '{0}': expected dimensions such as 1x4x8")]
    InvalidShape(String),
}
