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

use anvil_uuid::SiteId;
use chrono::{DateTime, Utc};
use db::association::AssociationTable;
use model::association::SiteAssociation;
use model::inventory::{OsImageInventory, OsImageObservation, OsImageState};
use model::messages;
use model::site::Site;
use model::status::SyncStatus;
use sqlx::PgConnection;

use crate::activity::ActivityContext;
use crate::reconcile::engine::{
    self, AbsencePlan, EntryIds, ReconcilePolicy, RowIds, reconcile_inventory,
};
use crate::reconcile::rollup;
use crate::ActivityResult;

/// Reconciles one OS image inventory page for one Site.
pub async fn update_os_images_in_db(
    ctx: &ActivityContext,
    site_id: SiteId,
    inventory: Option<OsImageInventory>,
) -> ActivityResult<()> {
    reconcile_inventory(&OsImagePolicy, ctx, site_id, inventory).await
}

/// Maps the Site's image state to the per-Site sync status and journal
/// message. `None` for states this version does not know; those are logged
/// but never written.
fn map_image_state(state: OsImageState) -> Option<(SyncStatus, &'static str)> {
    match state {
        OsImageState::ImageInProgress
        | OsImageState::ImageUninitialized
        | OsImageState::ImageDisabled => Some((SyncStatus::Syncing, messages::STILL_SYNCING)),
        OsImageState::ImageReady => Some((SyncStatus::Synced, messages::READY_TO_USE)),
        OsImageState::ImageFailed => Some((SyncStatus::Error, "image failed")),
    }
}

struct OsImagePolicy;

#[async_trait::async_trait]
impl ReconcilePolicy for OsImagePolicy {
    type Entry = OsImageObservation;
    type Inventory = OsImageInventory;
    type Row = SiteAssociation;
    type Prepared = ();

    const RESOURCE: &'static str = "os-image";

    fn prepare(&self, _inventory: &Self::Inventory) {}

    fn entry_ids(entry: &Self::Entry) -> EntryIds {
        EntryIds {
            cloud_id: entry.id.map(|id| id.to_string()),
            controller_id: None,
        }
    }

    async fn load_rows(
        &self,
        txn: &mut PgConnection,
        site_id: SiteId,
    ) -> db::DatabaseResult<Vec<Self::Row>> {
        db::association::find_by_site(txn, AssociationTable::OsImage, site_id).await
    }

    fn row_ids(row: &Self::Row) -> RowIds {
        RowIds {
            cloud_id: row.resource_id.to_string(),
            controller_id: None,
        }
    }

    fn row_created(row: &Self::Row) -> DateTime<Utc> {
        row.created
    }

    fn row_updated(row: &Self::Row) -> DateTime<Utc> {
        row.updated
    }

    async fn handle_entry(
        &self,
        ctx: &ActivityContext,
        site: &Site,
        association: &Self::Row,
        entry: &Self::Entry,
        _prepared: &Self::Prepared,
    ) -> ActivityResult<()> {
        let Some(state) = entry.state else {
            tracing::warn!(
                site = %site.id,
                image = %association.resource_id,
                "image entry without state, skipping"
            );
            return Ok(());
        };

        let Some((status, message)) = map_image_state(state) else {
            tracing::warn!(
                site = %site.id,
                image = %association.resource_id,
                ?state,
                "unknown image state, not written"
            );
            return Ok(());
        };

        let message = match (status, entry.error.as_deref()) {
            (SyncStatus::Error, Some(error)) => error,
            _ => message,
        };

        let changed = engine::write_association_status(
            ctx,
            AssociationTable::OsImage,
            association,
            status,
            message,
        )
        .await?;
        if changed {
            rollup::rollup_parent(ctx, AssociationTable::OsImage, association.resource_id).await?;
        }
        Ok(())
    }

    fn plan_absent(&self, row: &Self::Row, within_freshness_window: bool) -> AbsencePlan {
        engine::association_absence_plan(row, within_freshness_window)
    }

    async fn handle_absent(
        &self,
        ctx: &ActivityContext,
        _site: &Site,
        row: &Self::Row,
        plan: AbsencePlan,
    ) -> ActivityResult<()> {
        match plan {
            AbsencePlan::Delete => {
                engine::delete_absent_association(ctx, AssociationTable::OsImage, row).await
            }
            AbsencePlan::MarkMissing => {
                engine::mark_association_missing(ctx, AssociationTable::OsImage, row).await
            }
            AbsencePlan::Skip | AbsencePlan::Retain => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_states_map_to_syncing() {
        for state in [
            OsImageState::ImageInProgress,
            OsImageState::ImageUninitialized,
            OsImageState::ImageDisabled,
        ] {
            assert_eq!(
                map_image_state(state),
                Some((SyncStatus::Syncing, messages::STILL_SYNCING))
            );
        }
    }

    #[test]
    fn ready_maps_to_synced() {
        assert_eq!(
            map_image_state(OsImageState::ImageReady),
            Some((SyncStatus::Synced, messages::READY_TO_USE))
        );
    }

    #[test]
    fn failed_maps_to_error() {
        let (status, _) = map_image_state(OsImageState::ImageFailed).unwrap();
        assert_eq!(status, SyncStatus::Error);
    }
}
