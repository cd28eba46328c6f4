// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RAII ownership of device objects.
//!
//! Every tier keeps the device objects it created in a [`DeviceObjects`].
//! Dropping it destroys them newest-first in one device call, so a
//! half-built model or instance cleans up after itself on any `?`.

use device_context::{DeviceContext, Handle, ObjectDesc};

use crate::RuntimeError;

pub(crate) struct DeviceObjects {
    ctx: DeviceContext,
    handles: Vec<Handle>,
}

impl DeviceObjects {
    pub(crate) fn new(ctx: DeviceContext) -> Self {
        Self {
            ctx,
            handles: Vec::new(),
        }
    }

    /// Creates an object and takes ownership of it.
    pub(crate) fn create(&mut self, desc: ObjectDesc) -> Result<Handle, RuntimeError> {
        let handle = self.ctx.create(desc)?;
        self.handles.push(handle);
        Ok(handle)
    }

    pub(crate) fn context(&self) -> &DeviceContext {
        &self.ctx
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for DeviceObjects {
    fn drop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        let handles: Vec<Handle> = self.handles.drain(..).rev().collect();
        let result = self.ctx.call(move |device| {
            let mut failed = 0usize;
            for handle in handles {
                if let Err(e) = device.destroy_object(handle) {
                    tracing::error!(%handle, error = %e, "Failed to destroy device object");
                    failed += 1;
                }
            }
            Ok(failed)
        });
        match result {
            Ok(0) => {}
            Ok(failed) => tracing::warn!(failed, "Some device objects were not destroyed"),
            Err(e) => tracing::error!(error = %e, "Device objects leaked"),
        }
    }
}
