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

use anvil_uuid::{NetworkSecurityGroupId, SiteId};
use chrono::{DateTime, Utc};
use db::association::AssociationTable;
use model::association::SiteAssociation;
use model::inventory::{
    NetworkSecurityGroupInventory, NetworkSecurityGroupObservation, ObjectStatus,
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

/// Reconciles one network security group inventory page for one Site.
pub async fn update_network_security_groups_in_db(
    ctx: &ActivityContext,
    site_id: SiteId,
    inventory: Option<NetworkSecurityGroupInventory>,
) -> ActivityResult<()> {
    reconcile_inventory(&NetworkSecurityGroupPolicy, ctx, site_id, inventory).await
}

struct NetworkSecurityGroupPolicy;

#[async_trait::async_trait]
impl ReconcilePolicy for NetworkSecurityGroupPolicy {
    type Entry = NetworkSecurityGroupObservation;
    type Inventory = NetworkSecurityGroupInventory;
    type Row = SiteAssociation;
    type Prepared = ();

    const RESOURCE: &'static str = "network-security-group";

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
        db::association::find_by_site(txn, AssociationTable::NetworkSecurityGroup, site_id).await
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
            // Removal is driven by the absence path once the Site stops
            // reporting the group.
            return Ok(());
        }

        if entry.object_status == Some(ObjectStatus::Error) || entry.error.is_some() {
            let message = entry.error.clone().unwrap_or_else(|| "reported error".to_string());
            let changed = engine::write_association_status(
                ctx,
                AssociationTable::NetworkSecurityGroup,
                association,
                SyncStatus::Error,
                &message,
            )
            .await?;
            if changed {
                rollup::rollup_parent(
                    ctx,
                    AssociationTable::NetworkSecurityGroup,
                    association.resource_id,
                )
                .await?;
            }
            return Ok(());
        }

        let nsg_id = NetworkSecurityGroupId::from_uuid(association.resource_id);
        let nsg = {
            let mut conn = ctx
                .pool
                .acquire()
                .await
                .map_err(|err| db::DatabaseError::new("acquire connection", err))?;
            db::network_security_group::find_by_id(&mut conn, nsg_id).await?
        };
        let Some(nsg) = nsg else {
            return Err(ActivityError::Database(db::DatabaseError::NotFoundError {
                kind: "NetworkSecurityGroup",
                id: nsg_id.to_string(),
            }));
        };

        if entry.version.as_deref() != Some(nsg.version.as_str()) {
            // Site runs an older rule generation; push the current one.
            dispatch::dispatch_resource_sync(
                ctx,
                site,
                ResourceKind::NetworkSecurityGroup,
                AssociationTable::NetworkSecurityGroup,
                association,
                &nsg.version,
                nsg.rules.clone(),
            )
            .await?;
            rollup::rollup_parent(
                ctx,
                AssociationTable::NetworkSecurityGroup,
                association.resource_id,
            )
            .await?;
            return Ok(());
        }

        let changed = engine::write_association_status(
            ctx,
            AssociationTable::NetworkSecurityGroup,
            association,
            SyncStatus::Synced,
            "",
        )
        .await?;
        if changed {
            rollup::rollup_parent(
                ctx,
                AssociationTable::NetworkSecurityGroup,
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
                engine::delete_absent_association(
                    ctx,
                    AssociationTable::NetworkSecurityGroup,
                    row,
                )
                .await
            }
            AbsencePlan::MarkMissing => {
                engine::mark_association_missing(ctx, AssociationTable::NetworkSecurityGroup, row)
                    .await
            }
            AbsencePlan::Skip | AbsencePlan::Retain => Ok(()),
        }
    }
}
