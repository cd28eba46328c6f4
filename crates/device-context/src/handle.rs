// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Typed device object handles.

use std::fmt;
use std::num::NonZeroU64;

/// The kinds of object a device can create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum ObjectKind {
    BindingLayout,
    PipelineLayout,
    ShaderModule,
    Pipeline,
    PipelineSession,
    DescriptorPool,
    DescriptorSet,
    Buffer,
    Tensor,
    TensorView,
    Fence,
}

/// An opaque, typed, non-zero 64-bit object id.
///
/// The kind travels with the id so that a device can reject, say, a
/// tensor handle passed where a pipeline is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    kind: ObjectKind,
    raw: NonZeroU64,
}

impl Handle {
    pub fn new(kind: ObjectKind, raw: NonZeroU64) -> Self {
        Self { kind, raw }
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn raw(&self) -> u64 {
        self.raw.get()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.kind, self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_display() {
        let h = Handle::new(ObjectKind::Fence, NonZeroU64::new(12).unwrap());
        assert_eq!(format!("{h}"), "Fence#12");
        assert_eq!(h.raw(), 12);
        assert_eq!(h.kind(), ObjectKind::Fence);
    }

    #[test]
    fn test_handle_size() {
        // The niche in NonZeroU64 keeps Option<Handle> the same size.
        assert_eq!(
            std::mem::size_of::<Option<Handle>>(),
            std::mem::size_of::<Handle>()
        );
    }
}
