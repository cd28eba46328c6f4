// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runtime configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! max_concurrent_executions = 10
//! device_thread_name = "dgrt-device"
//! enable_metrics = true
//!
//! [headless]
//! memory_budget = "1G"
//! fence_latency_flushes = 1
//! ```

use std::path::Path;

use device_context::{HeadlessDevice, MemoryBudget};

use crate::{RuntimeError, MAX_CONCURRENT_EXECUTIONS_PER_INSTANCE};

/// Configuration for the runtime.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RuntimeConfig {
    /// Executions an instance may have in flight before enqueue blocks.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_executions: usize,
    /// Name of the thread that owns the device.
    #[serde(default = "default_thread_name")]
    pub device_thread_name: String,
    /// Whether instances and models keep statistics.
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
    /// Settings for the headless reference device.
    #[serde(default)]
    pub headless: HeadlessConfig,
}

/// Settings for [`HeadlessDevice`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HeadlessConfig {
    /// Device memory budget (human-readable, e.g. `"512M"`).
    #[serde(default = "default_budget")]
    pub memory_budget: String,
    /// Flushes after which a submitted fence signals.
    #[serde(default = "default_fence_latency")]
    pub fence_latency_flushes: u32,
}

fn default_max_concurrent() -> usize {
    MAX_CONCURRENT_EXECUTIONS_PER_INSTANCE
}

fn default_thread_name() -> String {
    "dgrt-device".to_string()
}

fn default_true() -> bool {
    true
}

fn default_budget() -> String {
    "1G".to_string()
}

fn default_fence_latency() -> u32 {
    1
}

impl RuntimeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, RuntimeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, RuntimeError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| RuntimeError::Config(format!("TOML parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| RuntimeError::Config(format!("TOML serialise error: {e}")))
    }

    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.max_concurrent_executions == 0 {
            return Err(RuntimeError::Config(
                "max_concurrent_executions must be at least 1".into(),
            ));
        }
        if self.device_thread_name.trim().is_empty() {
            return Err(RuntimeError::Config("device_thread_name is empty".into()));
        }
        self.headless.parse_budget()?;
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_executions: default_max_concurrent(),
            device_thread_name: default_thread_name(),
            enable_metrics: true,
            headless: HeadlessConfig::default(),
        }
    }
}

impl HeadlessConfig {
    /// Parses the memory budget string into a [`MemoryBudget`].
    pub fn parse_budget(&self) -> Result<MemoryBudget, RuntimeError> {
        MemoryBudget::parse(&self.memory_budget)
            .map_err(|e| RuntimeError::Config(format!("invalid budget: {e}")))
    }

    /// Builds a headless device with these settings.
    pub fn build_device(&self) -> Result<HeadlessDevice, RuntimeError> {
        Ok(HeadlessDevice::new()
            .with_memory_budget(self.parse_budget()?)
            .with_fence_latency(self.fence_latency_flushes))
    }
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            memory_budget: default_budget(),
            fence_latency_flushes: default_fence_latency(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let c = RuntimeConfig::default();
        assert_eq!(c.max_concurrent_executions, 10);
        assert_eq!(c.device_thread_name, "dgrt-device");
        assert!(c.enable_metrics);
        assert_eq!(c.headless.parse_budget().unwrap().as_mb(), 1024);
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
max_concurrent_executions = 3
enable_metrics = false

[headless]
memory_budget = "64M"
fence_latency_flushes = 2
"#;
        let c = RuntimeConfig::from_toml(toml).unwrap();
        assert_eq!(c.max_concurrent_executions, 3);
        assert_eq!(c.device_thread_name, "dgrt-device");
        assert!(!c.enable_metrics);
        assert_eq!(c.headless.parse_budget().unwrap().as_mb(), 64);
        assert_eq!(c.headless.fence_latency_flushes, 2);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        assert_eq!(RuntimeConfig::from_toml("").unwrap(), RuntimeConfig::default());
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = RuntimeConfig::default();
        let back = RuntimeConfig::from_toml(&c.to_toml().unwrap()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            RuntimeConfig::from_toml("max_concurrent_executions = 0"),
            Err(RuntimeError::Config(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_toml("[headless]\nmemory_budget = \"lots\""),
            Err(RuntimeError::Config(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_toml("device_thread_name = \"  \""),
            Err(RuntimeError::Config(_))
        ));
    }

    #[test]
    fn test_build_device() {
        let c = HeadlessConfig {
            memory_budget: "1M".into(),
            fence_latency_flushes: 0,
        };
        assert!(c.build_device().is_ok());
    }
}
