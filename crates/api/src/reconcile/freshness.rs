/*
 * SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: LicenseRef-NvidiaProprietary
 *
 * NVIDIA CORPORATION, its affiliates and licensors retain all intellectual
 * property and proprietary rights in and to this material, related
 * documentation and any modifications thereto. Any use, reproduction,
 * disclosure or distribution of this material and related documentation
 * without an express license agreement from NVIDIA CORPORATION or
 * its affiliates is strictly prohibited.
 */

//! The freshness (race) window.
//!
//! Inventories are produced asynchronously and may arrive out of order with
//! respect to recent user actions. Acting on a row that changed inside the
//! window risks reverting an authoritative local mutation, so every
//! destructive or state-downgrade decision consults this predicate against
//! the target's `updated` (or `created`) timestamp and defers while it
//! returns true.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// How often Sites push inventories.
pub const DEFAULT_INVENTORY_RECEIPT_INTERVAL: Duration = Duration::from_secs(3 * 60);

/// Slack on top of the receipt interval for delivery jitter.
const STALE_INVENTORY_BUFFER: Duration = Duration::from_secs(10);

/// Row-level slack against the inventory's snapshot timestamp.
const ROW_UPDATE_BUFFER: Duration = Duration::from_secs(5);

/// The process-wide freshness window, `inventory_receipt_interval + 10s`.
#[derive(Debug, Copy, Clone)]
pub struct FreshnessWindow {
    receipt_interval: Duration,
}

impl Default for FreshnessWindow {
    fn default() -> Self {
        Self::new(DEFAULT_INVENTORY_RECEIPT_INTERVAL)
    }
}

impl FreshnessWindow {
    pub fn new(receipt_interval: Duration) -> Self {
        Self { receipt_interval }
    }

    /// True iff `now − t < receipt_interval + 10s`.
    pub fn is_within_stale_inventory_threshold(&self, t: DateTime<Utc>) -> bool {
        self.is_within_stale_inventory_threshold_at(t, Utc::now())
    }

    /// [`Self::is_within_stale_inventory_threshold`] with an explicit "now".
    pub fn is_within_stale_inventory_threshold_at(
        &self,
        t: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        let threshold = self.receipt_interval + STALE_INVENTORY_BUFFER;
        now.signed_duration_since(t)
            < chrono::Duration::from_std(threshold).unwrap_or(chrono::Duration::MAX)
    }
}

/// Row-level staleness guard: the cloud row was updated after the inventory
/// snapshot was taken (plus buffer), so the snapshot must not clobber it.
pub fn row_updated_after_snapshot(
    row_updated: DateTime<Utc>,
    snapshot_timestamp: DateTime<Utc>,
) -> bool {
    let buffer = chrono::Duration::from_std(ROW_UPDATE_BUFFER).unwrap_or(chrono::Duration::MAX);
    row_updated > snapshot_timestamp + buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_mutation_is_inside_the_window() {
        let window = FreshnessWindow::default();
        let now = Utc::now();
        assert!(window.is_within_stale_inventory_threshold_at(
            now - chrono::Duration::seconds(2),
            now
        ));
        // 3min + 10s is the boundary
        assert!(window.is_within_stale_inventory_threshold_at(
            now - chrono::Duration::seconds(3 * 60 + 9),
            now
        ));
    }

    #[test]
    fn old_mutation_is_outside_the_window() {
        let window = FreshnessWindow::default();
        let now = Utc::now();
        assert!(!window.is_within_stale_inventory_threshold_at(
            now - chrono::Duration::minutes(6),
            now
        ));
        assert!(!window.is_within_stale_inventory_threshold_at(
            now - chrono::Duration::seconds(3 * 60 + 10),
            now
        ));
    }

    #[test]
    fn row_guard_uses_snapshot_plus_buffer() {
        let snapshot = Utc::now();
        assert!(!row_updated_after_snapshot(snapshot, snapshot));
        assert!(!row_updated_after_snapshot(
            snapshot + chrono::Duration::seconds(4),
            snapshot
        ));
        assert!(row_updated_after_snapshot(
            snapshot + chrono::Duration::seconds(6),
            snapshot
        ));
    }
}
