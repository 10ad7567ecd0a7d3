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

use anvil_uuid::{SiteId, SshKeyGroupId};
use chrono::{DateTime, Utc};
use db::association::AssociationTable;
use model::association::SiteAssociation;
use model::inventory::{ObjectStatus, SshKeyGroupInventory, SshKeyGroupObservation};
use model::site::Site;
use model::status::SyncStatus;
use sqlx::PgConnection;

use crate::activity::ActivityContext;
use crate::dispatch;
use crate::reconcile::engine::{
    self, AbsencePlan, EntryIds, ReconcilePolicy, RowIds, reconcile_inventory,
};
use crate::reconcile::rollup;
use crate::{ActivityError, ActivityResult};

/// Reconciles one SSH key group inventory page for one Site.
pub async fn update_ssh_key_groups_in_db(
    ctx: &ActivityContext,
    site_id: SiteId,
    inventory: Option<SshKeyGroupInventory>,
) -> ActivityResult<()> {
    reconcile_inventory(&SshKeyGroupPolicy, ctx, site_id, inventory).await
}

struct SshKeyGroupPolicy;

#[async_trait::async_trait]
impl ReconcilePolicy for SshKeyGroupPolicy {
    type Entry = SshKeyGroupObservation;
    type Inventory = SshKeyGroupInventory;
    type Row = SiteAssociation;
    type Prepared = ();

    const RESOURCE: &'static str = "ssh-key-group";

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
        db::association::find_by_site(txn, AssociationTable::SshKeyGroup, site_id).await
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
        // A group awaiting deletion gets a delete workflow while the Site
        // still reports it; the absence path removes the association once
        // the Site confirms.
        if association.status == SyncStatus::Deleting {
            return dispatch::dispatch_ssh_key_group_delete(ctx, site, association).await;
        }

        if entry.object_status == Some(ObjectStatus::Error) || entry.error.is_some() {
            let message = entry.error.clone().unwrap_or_else(|| "reported error".to_string());
            let changed = engine::write_association_status(
                ctx,
                AssociationTable::SshKeyGroup,
                association,
                SyncStatus::Error,
                &message,
            )
            .await?;
            if changed {
                rollup::rollup_parent(ctx, AssociationTable::SshKeyGroup, association.resource_id)
                    .await?;
            }
            return Ok(());
        }

        let group_id = SshKeyGroupId::from_uuid(association.resource_id);
        let group = {
            let mut conn = ctx
                .pool
                .acquire()
                .await
                .map_err(|err| db::DatabaseError::new("acquire connection", err))?;
            db::ssh_key_group::find_by_id(&mut conn, group_id).await?
        };
        let Some(group) = group else {
            return Err(ActivityError::Database(db::DatabaseError::NotFoundError {
                kind: "SshKeyGroup",
                id: group_id.to_string(),
            }));
        };

        let site_is_current = entry.version.as_deref() == Some(group.version.as_str());
        if !site_is_current {
            // The Site runs an older generation; push the current one. The
            // dispatcher consults the journal for create vs update and
            // records the initiation status itself.
            dispatch::sync_ssh_key_group(ctx, site, association).await?;
            rollup::rollup_parent(ctx, AssociationTable::SshKeyGroup, association.resource_id)
                .await?;
            return Ok(());
        }

        let changed = engine::write_association_status(
            ctx,
            AssociationTable::SshKeyGroup,
            association,
            SyncStatus::Synced,
            "",
        )
        .await?;
        if changed {
            rollup::rollup_parent(ctx, AssociationTable::SshKeyGroup, association.resource_id)
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
                engine::delete_absent_association(ctx, AssociationTable::SshKeyGroup, row).await
            }
            AbsencePlan::MarkMissing => {
                engine::mark_association_missing(ctx, AssociationTable::SshKeyGroup, row).await
            }
            AbsencePlan::Skip | AbsencePlan::Retain => Ok(()),
        }
    }
}
