// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor descriptors handed out to inference consumers.

use std::fmt;

use crate::{DType, SymbolicShape, TensorFormat};

/// Describes one model input or output: a diagnostic name, the declared
/// (possibly partially unknown) shape, and its element type.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TensorDesc {
    pub name: String,
    pub shape: SymbolicShape,
    /// Raw container format code.
    pub format: TensorFormat,
}

impl TensorDesc {
    pub fn new(name: impl Into<String>, shape: SymbolicShape, format: TensorFormat) -> Self {
        Self {
            name: name.into(),
            shape,
            format,
        }
    }

    /// Element data type, or `None` when the format is unsupported.
    pub fn dtype(&self) -> Option<DType> {
        self.format.dtype()
    }
}

impl fmt::Display for TensorDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dtype() {
            Some(dtype) => write!(f, "{}: {} {}", self.name, dtype, self.shape),
            None => write!(f, "{}: <format {}> {}", self.name, self.format.code(), self.shape),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desc_display() {
        let d = TensorDesc::new("Input0", SymbolicShape::new(vec![-1, 4]), TensorFormat::R32_SFLOAT);
        assert_eq!(d.dtype(), Some(DType::F32));
        assert_eq!(format!("{d}"), "Input0: f32 [?, 4]");

        let odd = TensorDesc::new("Output0", SymbolicShape::new(vec![2]), TensorFormat(9));
        assert_eq!(odd.dtype(), None);
        assert_eq!(format!("{odd}"), "Output0: <format 9> [2]");
    }
}
