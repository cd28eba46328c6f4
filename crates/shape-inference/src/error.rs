// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for kernel-code parsing and shape inference.

use crate::BindingKey;

/// Errors that can occur while reading kernel code or inferring shapes.
#[derive(Debug, thiserror::Error)]
pub enum ShapeInferenceError {
    /// The code is not a well-formed word stream.
    #[error("malformed kernel code: {0}")]
    MalformedCode(String),

    /// An instruction refers to an id that is never declared.
    #[error("undeclared id %{0}")]
    UndeclaredId(u32),

    /// The propagation pass rejected the input shapes.
    #[error("shape propagation rejected: {0}")]
    Rejected(String),

    /// A tensor variable lacks a `DescriptorSet` or `Binding` decoration.
    #[error("tensor variable %{variable} is missing its {decoration} decoration")]
    MissingDecoration {
        variable: u32,
        decoration: &'static str,
    },

    /// A shape dimension is not a plain integer constant.
    #[error("dimension %{dim} of the tensor at {key} is not a constant")]
    NonConstantDimension { key: BindingKey, dim: u32 },
}
