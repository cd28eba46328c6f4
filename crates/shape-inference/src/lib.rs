// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # shape-inference
//!
//! Resolves the tensor shapes of a data-graph kernel given concrete input
//! shapes.
//!
//! This crate provides:
//! - [`infer`]: run a shape pass, then read back `(set, binding) → shape`
//!   for every tensor variable in the rewritten code.
//! - [`ShapePropagator`]: the seam for the code-rewriting pass, with the
//!   built-in [`InputShapeSeeder`].
//! - [`ModuleBuilder`]: assembles small kernel modules for fixtures.
//! - [`spirv`]: the word-level reader the above are built on.

mod builder;
mod error;
mod infer;
mod propagate;
pub mod spirv;

pub use builder::ModuleBuilder;
pub use error::ShapeInferenceError;
pub use infer::{extract_shapes, infer, BindingShapeMap, InferenceOutput};
pub use propagate::{BindingKey, InputShapeMap, InputShapeSeeder, ShapePropagator};
