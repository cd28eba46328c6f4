// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for device operations.

use crate::{Handle, ObjectKind};

/// Errors surfaced by a [`Device`](crate::Device) or the
/// [`DeviceContext`](crate::DeviceContext) that owns it.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// A buffer allocation would exceed the device memory budget.
    #[error("out of device memory: requested {requested_bytes} bytes, but only {available_bytes} available (budget: {budget_bytes})")]
    OutOfMemory {
        requested_bytes: u64,
        available_bytes: u64,
        budget_bytes: u64,
    },

    /// The handle does not name a live object.
    #[error("invalid or destroyed handle {0}")]
    InvalidHandle(Handle),

    /// The handle names an object of the wrong kind.
    #[error("handle {handle} has kind {actual:?}, expected {expected:?}")]
    WrongKind {
        handle: Handle,
        expected: ObjectKind,
        actual: ObjectKind,
    },

    /// The object description is not acceptable.
    #[error("invalid {kind:?} description: {detail}")]
    InvalidDescription { kind: ObjectKind, detail: String },

    /// Bound memory is smaller than the object requires.
    #[error("memory binding for {target} too small: need {required} bytes at offset {offset}, buffer has {available}")]
    MemoryTooSmall {
        target: Handle,
        required: u64,
        offset: u64,
        available: u64,
    },

    /// A descriptor pool has no room for another set.
    #[error("descriptor pool {pool} exhausted: {detail}")]
    PoolExhausted { pool: Handle, detail: String },

    /// The object is referenced by submitted work whose fence has not
    /// signaled.
    #[error("{0} is still in use by pending device work")]
    InUse(Handle),

    /// A command was recorded in an invalid state.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// The device does not support the requested operation.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A memory budget string could not be parsed.
    #[error("invalid memory budget '{0}': expected a number followed by an optional suffix (K, M, G)")]
    InvalidBudget(String),

    /// The device thread could not be started.
    #[error("failed to spawn device thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The device thread has shut down or a job was dropped before replying.
    #[error("device context closed")]
    ContextClosed,
}
