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

use anvil_uuid::{NvlLogicalPartitionId, SiteId};
use chrono::{DateTime, Utc};
use db::association::AssociationTable;
use model::association::SiteAssociation;
use model::inventory::{
    NvlLogicalPartitionInventory, NvlLogicalPartitionObservation, ObjectStatus,
};
use model::site::Site;
use model::status::SyncStatus;
use sqlx::PgConnection;

use crate::activity::ActivityContext;
use crate::dispatch::{self, ResourceKind};
use crate::reconcile::engine::{
    self, AbsencePlan, EntryIds, ReconcilePolicy, RowIds, reconcile_inventory,
};
use crate::reconcile::rollup;
use crate::{ActivityError, ActivityResult};

/// Reconciles one NVLink logical partition inventory page for one Site.
pub async fn update_nvl_logical_partitions_in_db(
    ctx: &ActivityContext,
    site_id: SiteId,
    inventory: Option<NvlLogicalPartitionInventory>,
) -> ActivityResult<()> {
    reconcile_inventory(&NvlLogicalPartitionPolicy, ctx, site_id, inventory).await
}

struct NvlLogicalPartitionPolicy;

#[async_trait::async_trait]
impl ReconcilePolicy for NvlLogicalPartitionPolicy {
    type Entry = NvlLogicalPartitionObservation;
    type Inventory = NvlLogicalPartitionInventory;
    type Row = SiteAssociation;
    type Prepared = ();

    const RESOURCE: &'static str = "nvl-logical-partition";

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
        db::association::find_by_site(txn, AssociationTable::NvlLogicalPartition, site_id).await
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
        if association.status == SyncStatus::Deleting {
            return Ok(());
        }

        if entry.object_status == Some(ObjectStatus::Error) || entry.error.is_some() {
            let message = entry.error.clone().unwrap_or_else(|| "reported error".to_string());
            let changed = engine::write_association_status(
                ctx,
                AssociationTable::NvlLogicalPartition,
                association,
                SyncStatus::Error,
                &message,
            )
            .await?;
            if changed {
                rollup::rollup_parent(
                    ctx,
                    AssociationTable::NvlLogicalPartition,
                    association.resource_id,
                )
                .await?;
            }
            return Ok(());
        }

        let partition_id = NvlLogicalPartitionId::from_uuid(association.resource_id);
        let partition = {
            let mut conn = ctx
                .pool
                .acquire()
                .await
                .map_err(|err| db::DatabaseError::new("acquire connection", err))?;
            db::nvl_logical_partition::find_by_id(&mut conn, partition_id).await?
        };
        let Some(partition) = partition else {
            return Err(ActivityError::Database(db::DatabaseError::NotFoundError {
                kind: "NvLinkLogicalPartition",
                id: partition_id.to_string(),
            }));
        };

        if entry.version.as_deref() != Some(partition.version.as_str()) {
            dispatch::dispatch_resource_sync(
                ctx,
                site,
                ResourceKind::NvlLogicalPartition,
                AssociationTable::NvlLogicalPartition,
                association,
                &partition.version,
                serde_json::json!({ "metadata": partition.metadata }),
            )
            .await?;
            rollup::rollup_parent(
                ctx,
                AssociationTable::NvlLogicalPartition,
                association.resource_id,
            )
            .await?;
            return Ok(());
        }

        let changed = engine::write_association_status(
            ctx,
            AssociationTable::NvlLogicalPartition,
            association,
            SyncStatus::Synced,
            "",
        )
        .await?;
        if changed {
            rollup::rollup_parent(
                ctx,
                AssociationTable::NvlLogicalPartition,
                association.resource_id,
            )
            .await?;
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
                engine::delete_absent_association(ctx, AssociationTable::NvlLogicalPartition, row)
                    .await
            }
            AbsencePlan::MarkMissing => {
                engine::mark_association_missing(ctx, AssociationTable::NvlLogicalPartition, row)
                    .await
            }
            AbsencePlan::Skip | AbsencePlan::Retain => Ok(()),
        }
    }
}
