// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # runtime
//!
//! Loads data-graph model containers and runs them on a [`Device`] through
//! a host graph builder.
//!
//! # Three tiers
//! ```text
//! UnshapedModel ──(input shapes)──► ShapedModel ──► ModelInstance
//!   topology,                        inferred shapes,   sessions, descriptor pool,
//!   layouts,                         pipelines          in-flight executions
//!   weak shaped cache ─ ─ ─ ─ ─ ─ ─►
//! ```
//! Children hold strong references to their parents; the shaped-model
//! cache is the only weak edge.
//!
//! # Threading
//! All device work runs on the [`DeviceContext`] thread. Model and instance
//! operations block on it, so async callers should wrap them in
//! `spawn_blocking`.
//!
//! [`Device`]: device_context::Device

mod asset;
mod config;
mod error;
mod graph;
mod instance;
mod metrics;
mod objects;
mod queue;
pub mod sample;
mod shaped;
mod unshaped;

use std::sync::Arc;

use device_context::{Capabilities, DeviceContext, HeadlessDevice};
use model_container::ByteView;
use shape_inference::{InputShapeSeeder, ShapePropagator};

pub use asset::{
    can_create_model_data, create_model_data, model_data_identifier, validate_model_data,
    ModelDataSupport, MODEL_DATA_PREFIX_LEN, MODEL_DATA_TAG, MODEL_DATA_VERSION,
    SUPPORTED_FILE_TYPE,
};
pub use config::{HeadlessConfig, RuntimeConfig};
pub use error::RuntimeError;
pub use graph::{
    Access, BufferAccess, ExternalBuffer, GraphBuffer, GraphBuilder, LocalGraph, PassFn,
    PassResources,
};
pub use instance::{ModelInstance, ENQUEUE_PASS_NAME};
pub use metrics::{CacheStats, InstanceStats};
pub use shaped::{ShapedModel, ShapedTensor};
pub use unshaped::{
    BindingKind, SegmentBinding, SegmentConstant, TensorInfo, UnshapedModel, UnshapedSegment,
};

/// Executions one instance may have in flight by default.
pub const MAX_CONCURRENT_EXECUTIONS_PER_INSTANCE: usize = 10;

/// Name the runtime reports to its host.
pub const RUNTIME_NAME: &str = "dgraph-rt";

/// Entry point: turns wrapped model data into models on one device.
pub struct Runtime {
    ctx: DeviceContext,
    config: RuntimeConfig,
    propagator: Arc<dyn ShapePropagator>,
}

impl Runtime {
    /// Creates a runtime on an existing device context.
    pub fn new(ctx: DeviceContext, config: RuntimeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        let caps = ctx.capabilities();
        tracing::info!(
            device = %caps.device_name,
            tensors = caps.tensors,
            data_graph = caps.data_graph,
            max_concurrent = config.max_concurrent_executions,
            "Runtime created"
        );
        if !(caps.tensors && caps.data_graph) {
            tracing::warn!(device = %caps.device_name, "Device cannot run data-graph models");
        }
        Ok(Self {
            ctx,
            config,
            propagator: Arc::new(InputShapeSeeder),
        })
    }

    /// Creates a runtime on a fresh [`HeadlessDevice`] built from
    /// `config.headless`. The returned device clone shares state with the
    /// one the runtime drives.
    pub fn headless(config: RuntimeConfig) -> Result<(Self, HeadlessDevice), RuntimeError> {
        config.validate()?;
        let device = config.headless.build_device()?;
        let ctx = DeviceContext::spawn(device.clone(), &config.device_thread_name)?;
        Ok((Self::new(ctx, config)?, device))
    }

    /// Replaces the shape-propagation pass used by models created afterwards.
    pub fn with_propagator(mut self, propagator: Arc<dyn ShapePropagator>) -> Self {
        self.propagator = propagator;
        self
    }

    pub fn name(&self) -> &'static str {
        RUNTIME_NAME
    }

    pub fn capabilities(&self) -> &Capabilities {
        self.ctx.capabilities()
    }

    pub fn supports_inference(&self) -> bool {
        let caps = self.capabilities();
        caps.tensors && caps.data_graph
    }

    pub fn context(&self) -> &DeviceContext {
        &self.ctx
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn can_create_model_data(&self, file_type: &str) -> ModelDataSupport {
        can_create_model_data(file_type)
    }

    pub fn create_model_data(&self, file_type: &str, container: &[u8]) -> Result<Vec<u8>, RuntimeError> {
        create_model_data(file_type, container)
    }

    pub fn model_data_identifier(&self, file_id: &str) -> String {
        model_data_identifier(file_id)
    }

    /// Validates wrapped model data, strips its prefix and builds the
    /// unshaped model.
    pub fn create_model(&self, data: impl Into<ByteView>) -> Result<Arc<UnshapedModel>, RuntimeError> {
        if !self.supports_inference() {
            return Err(RuntimeError::Unsupported(format!(
                "device '{}' has no data-graph support",
                self.capabilities().device_name
            )));
        }
        let data = data.into();
        validate_model_data(data.as_slice())?;
        let container = data.slice_from(MODEL_DATA_PREFIX_LEN)?;
        UnshapedModel::from_container(
            self.ctx.clone(),
            container,
            &self.config,
            Arc::clone(&self.propagator),
        )
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("device", &self.capabilities().device_name)
            .field("config", &self.config)
            .finish()
    }
}
