// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Execution and cache statistics.
//!
//! [`InstanceStats`] shows how hard an instance leans on its in-flight
//! queue; [`CacheStats`] shows how often shaped models are reused.

/// Counters for one [`ModelInstance`](crate::ModelInstance).
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct InstanceStats {
    pub executions_enqueued: u64,
    pub executions_reclaimed: u64,
    /// Enqueues that found the queue full and had to wait.
    pub slot_waits: u64,
    /// Flush-and-poll rounds spent waiting for fences.
    pub poll_iterations: u64,
    pub peak_in_flight: usize,
}

impl InstanceStats {
    pub(crate) fn record_enqueue(&mut self, in_flight: usize) {
        self.executions_enqueued += 1;
        if in_flight > self.peak_in_flight {
            self.peak_in_flight = in_flight;
        }
    }

    pub(crate) fn record_reclaimed(&mut self, count: usize) {
        self.executions_reclaimed += count as u64;
    }

    pub(crate) fn record_slot_wait(&mut self) {
        self.slot_waits += 1;
    }

    pub(crate) fn record_poll(&mut self) {
        self.poll_iterations += 1;
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        format!(
            "Executions: {} enqueued, {} reclaimed, peak {} in flight, \
             {} slot waits ({} polls)",
            self.executions_enqueued,
            self.executions_reclaimed,
            self.peak_in_flight,
            self.slot_waits,
            self.poll_iterations,
        )
    }
}

/// Shaped-model cache counters for one [`UnshapedModel`](crate::UnshapedModel).
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Misses that found a dead entry for the same shapes.
    pub expired_replacements: u64,
}

impl CacheStats {
    /// Returns the hit ratio as a fraction in `[0.0, 1.0]`.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }

    pub fn summary(&self) -> String {
        format!(
            "Shaped cache: {} hits, {} misses ({:.0}% hit rate), {} expired",
            self.hits,
            self.misses,
            self.hit_ratio() * 100.0,
            self.expired_replacements,
        )
    }
}
