// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Blocking device execution context.
//!
//! The device is owned by one dedicated thread. Every other thread reaches
//! it through [`DeviceContext::call`], which ships a closure over a channel
//! and blocks until the device thread replies.
//!
//! ```text
//!  caller thread                         device thread
//!  ─────────────                         ─────────────
//!  call(f) ──► mpsc::send(job) ───────►  job(&dyn Device)
//!     │                                      │
//!     └── oneshot::blocking_recv ◄─────────  reply.send(result)
//! ```
//!
//! `call` blocks the current thread, so it must not be used from inside an
//! async task. Wrap it in `tokio::task::spawn_blocking` there.

use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use tokio::sync::{mpsc, oneshot};

use crate::{Capabilities, Device, DeviceError, Handle, ObjectDesc};

type Job = Box<dyn FnOnce(&dyn Device) + Send>;

struct ContextInner {
    sender: Option<mpsc::UnboundedSender<Job>>,
    worker: Option<JoinHandle<()>>,
    thread_id: ThreadId,
    thread_name: String,
    device: Arc<dyn Device>,
    capabilities: Capabilities,
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if thread::current().id() == self.thread_id {
                return;
            }
            if worker.join().is_err() {
                tracing::warn!(thread = %self.thread_name, "Device thread panicked");
            }
        }
    }
}

/// A cloneable handle to a device running on its own thread.
#[derive(Clone)]
pub struct DeviceContext {
    inner: Arc<ContextInner>,
}

impl DeviceContext {
    /// Moves `device` onto a new thread named `thread_name`.
    pub fn spawn<D: Device + 'static>(device: D, thread_name: &str) -> Result<Self, DeviceError> {
        let device: Arc<dyn Device> = Arc::new(device);
        let capabilities = device.capabilities();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

        let worker_device = Arc::clone(&device);
        let worker = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || {
                tracing::debug!("Device thread started");
                while let Some(job) = receiver.blocking_recv() {
                    job(worker_device.as_ref());
                }
                tracing::debug!("Device thread stopped");
            })?;

        tracing::info!(
            thread = thread_name,
            device = %capabilities.device_name,
            data_graph = capabilities.data_graph,
            "Device context started"
        );

        Ok(Self {
            inner: Arc::new(ContextInner {
                sender: Some(sender),
                thread_id: worker.thread().id(),
                worker: Some(worker),
                thread_name: thread_name.to_string(),
                device,
                capabilities,
            }),
        })
    }

    /// Runs `f` on the device thread and blocks for its result.
    ///
    /// Called from the device thread itself, `f` runs inline.
    pub fn call<R, F>(&self, f: F) -> Result<R, DeviceError>
    where
        R: Send + 'static,
        F: FnOnce(&dyn Device) -> Result<R, DeviceError> + Send + 'static,
    {
        if self.is_device_thread() {
            return f(self.inner.device.as_ref());
        }

        let (reply, response) = oneshot::channel();
        let job: Job = Box::new(move |device| {
            // The caller may have given up; nothing to do then.
            let _ = reply.send(f(device));
        });
        self.inner
            .sender
            .as_ref()
            .ok_or(DeviceError::ContextClosed)?
            .send(job)
            .map_err(|_| DeviceError::ContextClosed)?;
        response.blocking_recv().map_err(|_| DeviceError::ContextClosed)?
    }

    pub fn create(&self, desc: ObjectDesc) -> Result<Handle, DeviceError> {
        self.call(move |device| device.create_object(&desc))
    }

    pub fn destroy(&self, handle: Handle) -> Result<(), DeviceError> {
        self.call(move |device| device.destroy_object(handle))
    }

    pub fn flush(&self) -> Result<(), DeviceError> {
        self.call(|device| device.flush())
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.inner.capabilities
    }

    pub fn thread_name(&self) -> &str {
        &self.inner.thread_name
    }

    pub fn is_device_thread(&self) -> bool {
        thread::current().id() == self.inner.thread_id
    }
}

impl std::fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContext")
            .field("thread", &self.inner.thread_name)
            .field("device", &self.inner.capabilities.device_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HeadlessDevice, ObjectKind};

    fn context() -> DeviceContext {
        DeviceContext::spawn(HeadlessDevice::new(), "test-device").unwrap()
    }

    #[test]
    fn test_call_runs_on_device_thread() {
        let ctx = context();
        let name = ctx
            .call(|_| Ok(thread::current().name().map(str::to_string)))
            .unwrap();
        assert_eq!(name.as_deref(), Some("test-device"));
        assert!(!ctx.is_device_thread());
    }

    #[test]
    fn test_nested_call_runs_inline() {
        let ctx = context();
        let nested = ctx.clone();
        let handle = ctx
            .call(move |_| {
                assert!(nested.is_device_thread());
                nested.create(ObjectDesc::Fence)
            })
            .unwrap();
        assert_eq!(handle.kind(), ObjectKind::Fence);
    }

    #[test]
    fn test_errors_propagate() {
        let ctx = context();
        let err = ctx
            .call::<(), _>(|_| Err(DeviceError::Unsupported("x".into())))
            .unwrap_err();
        assert!(matches!(err, DeviceError::Unsupported(_)));
    }

    #[test]
    fn test_concurrent_callers() {
        let device = HeadlessDevice::new();
        let ctx = DeviceContext::spawn(device.clone(), "test-device").unwrap();
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let ctx = ctx.clone();
                thread::spawn(move || {
                    for _ in 0..16 {
                        let fence = ctx.create(ObjectDesc::Fence).unwrap();
                        ctx.destroy(fence).unwrap();
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        let stats = device.stats();
        assert_eq!(stats.objects_created, 128);
        assert_eq!(stats.live_total(), 0);
    }

    #[test]
    fn test_drop_joins_thread() {
        let ctx = context();
        let clone = ctx.clone();
        drop(ctx);
        // Still usable through the remaining handle.
        clone.flush().unwrap();
        drop(clone);
    }
}
