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

//! Multi-page inventory assembly.
//!
//! Mutation happens per page, but the page's `item_ids` list spans all items
//! across all pages, so the reported-id set is complete on every page.
//! Absence handling still only runs on the terminal page: a missing entity
//! on pages 1..N−1 is never deleted or marked missing.

use std::collections::HashSet;

use model::inventory::InventoryEnvelope;

/// The union of IDs the Site reported: the page's `item_ids` plus the ids of
/// the entries on the current page.
pub fn reported_ids<I, F>(inventory: &I, entry_id: F) -> HashSet<String>
where
    I: InventoryEnvelope,
    F: Fn(&I::Item) -> Option<String>,
{
    let mut ids: HashSet<String> = inventory
        .page()
        .map(|page| page.item_ids.iter().cloned().collect())
        .unwrap_or_default();

    for item in inventory.items() {
        if let Some(id) = entry_id(item) {
            ids.insert(id);
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use model::inventory::{
        InventoryPage, InventoryStatus, SshKeyGroupInventory, SshKeyGroupObservation,
    };
    use uuid::Uuid;

    use super::*;

    fn observation(id: Uuid) -> SshKeyGroupObservation {
        SshKeyGroupObservation {
            id: Some(id),
            version: None,
            object_status: None,
            error: None,
        }
    }

    #[test]
    fn union_of_page_list_and_entries() {
        let on_page = Uuid::new_v4();
        let elsewhere = Uuid::new_v4();
        let inventory = SshKeyGroupInventory {
            ssh_key_groups: vec![observation(on_page)],
            timestamp: Utc::now(),
            inventory_status: InventoryStatus::Success,
            inventory_page: Some(InventoryPage {
                current_page: 1,
                total_pages: 2,
                page_size: 1,
                total_items: 2,
                item_ids: vec![elsewhere.to_string()],
            }),
        };

        let ids = reported_ids(&inventory, |entry| entry.id.map(|id| id.to_string()));
        assert!(ids.contains(&on_page.to_string()));
        assert!(ids.contains(&elsewhere.to_string()));
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn empty_snapshot_reports_nothing() {
        let inventory = SshKeyGroupInventory {
            ssh_key_groups: vec![],
            timestamp: Utc::now(),
            inventory_status: InventoryStatus::Success,
            inventory_page: None,
        };
        assert!(reported_ids(&inventory, |entry| entry.id.map(|id| id.to_string())).is_empty());
    }
}
