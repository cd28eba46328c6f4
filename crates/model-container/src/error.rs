// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for container decoding and model graph construction.

use crate::Section;

/// Errors raised while decoding a container or while building a model
/// graph from its tables.
///
/// Format errors mean the bytes are corrupt. Unsupported-feature errors mean
/// the container is well formed but uses something this runtime does not
/// implement.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// The container file could not be read or mapped.
    #[error("failed to read container: {0}")]
    Io(#[from] std::io::Error),

    // ── Format errors ──────────────────────────────────────────────
    /// The buffer is too short for a header or the magic does not match.
    #[error("invalid container header: {0}")]
    InvalidHeader(String),

    /// The header magic is correct but the major version is unsupported.
    #[error("incompatible container header: version {major}.{minor} (supported major version {supported})")]
    IncompatibleVersion { major: u16, minor: u16, supported: u16 },

    /// A section's declared byte range does not lie within the buffer.
    #[error("{section} section out of bounds: offset {offset} + size {size} exceeds container length {len}")]
    SectionOutOfBounds {
        section: Section,
        offset: u64,
        size: u64,
        len: usize,
    },

    /// A section ended before an entry was fully read.
    #[error("{section} section truncated: needed {needed} bytes at offset {offset}")]
    Truncated {
        section: Section,
        offset: usize,
        needed: usize,
    },

    /// A string field is not valid UTF-8.
    #[error("{section} section contains an invalid UTF-8 string at offset {offset}")]
    InvalidString { section: Section, offset: usize },

    /// A module or segment kind code is not recognised.
    #[error("unknown module kind code {0}")]
    UnknownModuleKind(u32),

    /// A sub-view was requested outside its parent view.
    #[error("byte view out of bounds: offset {offset} + len {len} exceeds {available}")]
    ViewOutOfBounds {
        offset: usize,
        len: usize,
        available: usize,
    },

    /// A resource index points past the end of the resource table.
    #[error("resource index {index} out of bounds ({count} resources)")]
    ResourceIndexOutOfBounds { index: u32, count: usize },

    /// A module index points past the end of the module table.
    #[error("module index {index} out of bounds ({count} modules)")]
    ModuleIndexOutOfBounds { index: u32, count: usize },

    /// A constant index points past the end of the constant table.
    #[error("constant index {index} out of bounds ({count} constants)")]
    ConstantIndexOutOfBounds { index: u32, count: usize },

    /// A binding refers to a resource that is not an input, output or
    /// intermediate tensor.
    #[error("{context} binding {binding} refers to resource {resource}, which is not a tensor")]
    NotATensor {
        context: String,
        binding: u32,
        resource: u32,
    },

    /// A graph module carries no (or malformed) kernel code.
    #[error("missing kernel code for module {module}: {detail}")]
    MissingKernelCode { module: u32, detail: String },

    // ── Unsupported features ───────────────────────────────────────
    /// A resource declares explicit strides.
    #[error("strides not supported (resource {resource})")]
    StridesNotSupported { resource: u32 },

    /// A segment is not a data-graph segment.
    #[error("non-graph segments not supported (segment '{segment}')")]
    NonGraphSegment { segment: String },

    /// A segment references a module that is not a data-graph module.
    #[error("non-graph modules not supported (module {module} used by segment '{segment}')")]
    NonGraphModule { segment: String, module: u32 },

    /// A segment does not have exactly one descriptor set.
    #[error("descriptor sets count unexpected: segment '{segment}' declares {count}, expected 1")]
    DescriptorSetCount { segment: String, count: usize },

    /// A segment declares push-constant ranges.
    #[error("push constants not supported (segment '{segment}' declares {count})")]
    PushConstantsNotSupported { segment: String, count: usize },
}
