// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Object and submission statistics for the headless device.

use std::collections::BTreeMap;

use crate::ObjectKind;

/// Cumulative counters kept by [`HeadlessDevice`](crate::HeadlessDevice).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DeviceStats {
    pub objects_created: u64,
    pub objects_destroyed: u64,
    /// Objects currently alive, per kind. Kinds with none alive are absent.
    pub live_by_kind: BTreeMap<ObjectKind, u64>,
    pub descriptor_sets_allocated: u64,
    pub descriptor_sets_freed: u64,
    pub dispatches: u64,
    pub flushes: u64,
    pub fences_written: u64,
    pub fences_signaled: u64,
    /// Bytes held by live buffers.
    pub allocated_bytes: u64,
    pub peak_allocated_bytes: u64,
    /// Buffer creations refused by the memory budget.
    pub oom_count: u64,
}

impl DeviceStats {
    pub fn live(&self, kind: ObjectKind) -> u64 {
        self.live_by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub fn live_total(&self) -> u64 {
        self.live_by_kind.values().sum()
    }

    pub(crate) fn record_create(&mut self, kind: ObjectKind) {
        self.objects_created += 1;
        *self.live_by_kind.entry(kind).or_insert(0) += 1;
    }

    pub(crate) fn record_destroy(&mut self, kind: ObjectKind) {
        self.objects_destroyed += 1;
        if let Some(count) = self.live_by_kind.get_mut(&kind) {
            *count -= 1;
            if *count == 0 {
                self.live_by_kind.remove(&kind);
            }
        }
    }

    pub(crate) fn record_alloc(&mut self, bytes: u64) {
        self.allocated_bytes += bytes;
        self.update_peak();
    }

    pub(crate) fn record_free(&mut self, bytes: u64) {
        self.allocated_bytes = self.allocated_bytes.saturating_sub(bytes);
    }

    pub(crate) fn record_oom(&mut self) {
        self.oom_count += 1;
    }

    fn update_peak(&mut self) {
        if self.allocated_bytes > self.peak_allocated_bytes {
            self.peak_allocated_bytes = self.allocated_bytes;
        }
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        let peak_mb = self.peak_allocated_bytes as f64 / (1024.0 * 1024.0);
        format!(
            "Objects: {} created, {} destroyed, {} live; {} dispatches, {} flushes, \
             fences {}/{} signaled; peak {:.2} MB, {} OOMs",
            self.objects_created,
            self.objects_destroyed,
            self.live_total(),
            self.dispatches,
            self.flushes,
            self.fences_signaled,
            self.fences_written,
            peak_mb,
            self.oom_count,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_tracking() {
        let mut s = DeviceStats::default();
        s.record_create(ObjectKind::Tensor);
        s.record_create(ObjectKind::Tensor);
        s.record_create(ObjectKind::Fence);
        assert_eq!(s.live(ObjectKind::Tensor), 2);
        assert_eq!(s.live_total(), 3);
        s.record_destroy(ObjectKind::Fence);
        assert_eq!(s.live(ObjectKind::Fence), 0);
        assert!(!s.live_by_kind.contains_key(&ObjectKind::Fence));
        assert_eq!(s.objects_destroyed, 1);
    }

    #[test]
    fn test_peak_tracking() {
        let mut s = DeviceStats::default();
        s.record_alloc(100);
        s.record_alloc(50);
        s.record_free(120);
        assert_eq!(s.allocated_bytes, 30);
        assert_eq!(s.peak_allocated_bytes, 150);
    }

    #[test]
    fn test_summary() {
        let mut s = DeviceStats::default();
        s.record_create(ObjectKind::Buffer);
        s.dispatches = 4;
        let summary = s.summary();
        assert!(summary.contains("1 created"));
        assert!(summary.contains("4 dispatches"));
    }
}
