// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # model-container
//!
//! Decoder for the binary model container consumed by the data-graph
//! runtime.
//!
//! A container is a fixed header followed by four tables:
//!
//! ```text
//! ┌──────────┬─────────┬───────────┬──────────┬───────────┐
//! │  header  │ modules │ resources │ sequence │ constants │
//! └──────────┴─────────┴───────────┴──────────┴───────────┘
//!   magic,     kernel    tensor      segments,   constant
//!   version,   code +    formats,    bindings    payloads
//!   ranges     entry pt  shapes
//! ```
//!
//! This crate provides:
//! - [`ContainerDecoder`]: fail-closed header validation and table indexing.
//! - [`SharedBytes`] / [`ByteView`]: shared ownership of the container bytes,
//!   so kernel code and constants can be borrowed without copying.
//! - [`ContainerBuilder`]: writes containers (fixtures, demos, benchmarks).

mod bytes;
mod decoder;
mod error;
pub mod header;
mod reader;
mod tables;
mod writer;

pub use bytes::{ByteView, SharedBytes};
pub use decoder::ContainerDecoder;
pub use error::ContainerError;
pub use header::Section;
pub use tables::{
    BindingSlot, ConstantEntry, ModuleEntry, ModuleKind, PushConstantRange, ResourceCategory,
    ResourceEntry, SegmentEntry, SequenceTable,
};
pub use writer::ContainerBuilder;
