// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Tensor metadata shared by every tier of the data-graph runtime.
//!
//! This crate provides:
//! - [`DType`] and [`TensorFormat`]: element types and the container format
//!   codes that map to them.
//! - [`TensorShape`]: concrete shapes, used as shaped-model cache keys.
//! - [`SymbolicShape`]: declared shapes where some dimensions are unknown.
//! - [`TensorDesc`]: the descriptor returned for model inputs and outputs.

mod desc;
mod dtype;
mod error;
mod shape;

pub use desc::TensorDesc;
pub use dtype::{DType, TensorFormat};
pub use error::TensorError;
pub use shape::{SymbolicShape, TensorShape, UNKNOWN_DIM};
