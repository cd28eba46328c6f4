// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Element data types and the container format codes they map from.

use std::fmt;

/// Enumerates the element types a model input, output or intermediate
/// tensor can hold.
///
/// Only the types the data-graph dispatch path understands are listed;
/// every other container format maps to `None` via [`TensorFormat::dtype`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DType {
    /// 32-bit IEEE 754 floating point.
    F32,
    /// 8-bit signed integer (quantised activations).
    I8,
}

impl DType {
    /// Returns the size of a single element in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            DType::F32 => 4,
            DType::I8 => 1,
        }
    }

    /// Returns a human-readable label for this data type.
    pub fn as_str(self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::I8 => "i8",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw element format code as stored in the model container.
///
/// The numbering is Vulkan's `VkFormat`, so codes can be handed to the
/// device unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TensorFormat(pub u32);

impl TensorFormat {
    /// `VK_FORMAT_R8_SINT`.
    pub const R8_SINT: TensorFormat = TensorFormat(14);
    /// `VK_FORMAT_R32_SFLOAT`.
    pub const R32_SFLOAT: TensorFormat = TensorFormat(100);

    /// Maps the format to an element data type, or `None` if unsupported.
    pub fn dtype(self) -> Option<DType> {
        match self {
            TensorFormat::R32_SFLOAT => Some(DType::F32),
            TensorFormat::R8_SINT => Some(DType::I8),
            _ => None,
        }
    }

    /// Bytes per element, or `0` for formats with no supported data type.
    pub fn element_size(self) -> usize {
        self.dtype().map(DType::size_bytes).unwrap_or(0)
    }

    /// Returns the raw format code.
    pub fn code(self) -> u32 {
        self.0
    }
}

impl From<DType> for TensorFormat {
    fn from(dtype: DType) -> Self {
        match dtype {
            DType::F32 => TensorFormat::R32_SFLOAT,
            DType::I8 => TensorFormat::R8_SINT,
        }
    }
}

impl fmt::Display for TensorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dtype() {
            Some(dtype) => write!(f, "{dtype} (format {})", self.0),
            None => write!(f, "unsupported (format {})", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_formats() {
        assert_eq!(TensorFormat::R32_SFLOAT.dtype(), Some(DType::F32));
        assert_eq!(TensorFormat::R8_SINT.dtype(), Some(DType::I8));
        assert_eq!(TensorFormat::R32_SFLOAT.element_size(), 4);
        assert_eq!(TensorFormat::R8_SINT.element_size(), 1);
    }

    #[test]
    fn test_unsupported_format_has_zero_size() {
        let f16 = TensorFormat(76); // VK_FORMAT_R16_SFLOAT
        assert_eq!(f16.dtype(), None);
        assert_eq!(f16.element_size(), 0);
    }

    #[test]
    fn test_dtype_to_format() {
        assert_eq!(TensorFormat::from(DType::F32), TensorFormat::R32_SFLOAT);
        assert_eq!(TensorFormat::from(DType::I8), TensorFormat::R8_SINT);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", DType::F32), "f32");
        assert_eq!(format!("{}", TensorFormat::R8_SINT), "i8 (format 14)");
        assert!(format!("{}", TensorFormat(3)).starts_with("unsupported"));
    }
}
