// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # device-context
//!
//! The device seam the runtime is written against.
//!
//! - [`Device`]: create and destroy typed objects, bind memory, record
//!   dispatches and submit them behind fences.
//! - [`DeviceContext`]: owns a device on a dedicated thread and offers
//!   blocking request/response calls into it.
//! - [`HeadlessDevice`]: a validating in-process device for tests, the CLI
//!   and benchmarks.

mod budget;
mod context;
mod desc;
mod device;
mod error;
mod handle;
mod headless;
mod stats;

pub use budget::MemoryBudget;
pub use context::DeviceContext;
pub use desc::{
    LayoutBinding, ObjectDesc, PipelineConstant, PipelineDesc, PipelineResource, TensorObjectDesc,
};
pub use device::{Capabilities, Command, DescriptorWrite, Device, MemoryBinding};
pub use error::DeviceError;
pub use handle::{Handle, ObjectKind};
pub use headless::HeadlessDevice;
pub use stats::DeviceStats;
