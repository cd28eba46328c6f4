// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! A small two-segment model for demos, tests and benchmarks.
//!
//! ```text
//!  Input0 [?, 4] ──► "scale" ──► T [?, 4] ──► "bias" (+ constant [4]) ──► Output0 [?, 4]
//! ```

use model_container::{BindingSlot, ContainerBuilder, ModuleKind, ResourceCategory, SegmentEntry};
use shape_inference::ModuleBuilder;
use tensor_core::{DType, TensorFormat};

/// Kernel code whose input (binding 0) and output (binding 1) share one
/// tensor type, so the output takes whatever shape the input is given.
pub fn pass_through_kernel(dtype: DType, dims: &[i64]) -> Vec<u8> {
    let mut b = ModuleBuilder::new();
    let t = b.tensor_type(dtype, dims);
    b.variable(t, 0, 0);
    b.variable(t, 0, 1);
    b.build_bytes()
}

/// Builds the sample container described in the module docs.
pub fn sample_container() -> Vec<u8> {
    let mut c = ContainerBuilder::new();
    let f32 = TensorFormat::from(DType::F32);
    let code = pass_through_kernel(DType::F32, &[-1, 4]);

    let scale = c.add_module(ModuleKind::Graph, "main", code.clone());
    let bias = c.add_module(ModuleKind::Graph, "main", code);

    let input = c.add_resource(ResourceCategory::Input, f32, vec![-1, 4]);
    let hidden = c.add_resource(ResourceCategory::Intermediate, f32, vec![-1, 4]);
    let output = c.add_resource(ResourceCategory::Output, f32, vec![-1, 4]);
    let weights = c.add_resource(ResourceCategory::Constant, f32, vec![4]);
    let constant = c.add_constant(
        weights,
        [0.5f32, 1.0, 1.5, 2.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect(),
    );

    c.add_model_input(BindingSlot::new(0, input));
    c.add_model_output(BindingSlot::new(0, output));
    c.add_segment(SegmentEntry::graph(
        "scale",
        scale,
        vec![BindingSlot::new(0, input)],
        vec![BindingSlot::new(1, hidden)],
    ));
    c.add_segment(
        SegmentEntry::graph(
            "bias",
            bias,
            vec![BindingSlot::new(0, hidden)],
            vec![BindingSlot::new(1, output)],
        )
        .with_constants(vec![constant]),
    );
    c.build()
}
