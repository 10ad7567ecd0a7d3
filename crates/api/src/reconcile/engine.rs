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

//! The shared reconciliation template.
//!
//! Every per-resource reconciler walks one inventory page for one Site
//! through the same steps; the type-specific merge rules live in a
//! [`ReconcilePolicy`]. The template:
//!
//! 1. load the Site row (missing Site fails the activity)
//! 2. short-circuit `FAILED` snapshots
//! 3. load all cloud-side rows for the Site
//! 4. index rows by cloud id and controller id, collect reported ids
//! 5. resolve and apply each entry on the page (per-entry errors are
//!    non-fatal to the page)
//! 6. guard each row against mutations newer than the snapshot
//! 7. on the terminal page only, handle rows the Site did not report

use std::collections::HashMap;

use anvil_uuid::SiteId;
use chrono::{DateTime, Utc};
use db::association::AssociationTable;
use model::association::SiteAssociation;
use model::inventory::{InventoryEnvelope, InventoryStatus};
use model::messages;
use model::site::Site;
use model::status::SyncStatus;
use sqlx::PgConnection;

use crate::activity::ActivityContext;
use crate::reconcile::freshness::row_updated_after_snapshot;
use crate::reconcile::{pages, rollup};
use crate::{ActivityError, ActivityResult};

/// The identifiers an inventory entry carries.
#[derive(Debug, Default, Clone)]
pub struct EntryIds {
    /// The cloud's UUID for the entity, echoed back by the Site.
    pub cloud_id: Option<String>,
    /// The Site's native identifier, when the two differ.
    pub controller_id: Option<String>,
}

/// The identifiers a cloud row can be resolved by.
#[derive(Debug, Default, Clone)]
pub struct RowIds {
    pub cloud_id: String,
    pub controller_id: Option<String>,
}

/// What to do with a cloud row the Site did not report.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AbsencePlan {
    /// The row was awaiting deletion; remove it (and roll up the parent).
    Delete,
    /// The row is younger than the freshness window; a newer row may simply
    /// not be inventoried yet.
    Skip,
    /// Flag the row as missing on the Site and surface an error status.
    MarkMissing,
    /// Keep the row and log; used where deletion is deliberately withheld.
    Retain,
}

/// Per-resource-type merge rules plugged into [`reconcile_inventory`].
#[async_trait::async_trait]
pub trait ReconcilePolicy: Send + Sync {
    type Entry: Send + Sync;
    type Inventory: InventoryEnvelope<Item = Self::Entry> + Send + Sync;
    type Row: Send + Sync;
    /// Data computed once per activity call from the envelope (top-level
    /// link maps and similar).
    type Prepared: Send + Sync;

    /// Resource name used in logs and error messages.
    const RESOURCE: &'static str;

    fn prepare(&self, inventory: &Self::Inventory) -> Self::Prepared;

    fn entry_ids(entry: &Self::Entry) -> EntryIds;

    async fn load_rows(
        &self,
        txn: &mut PgConnection,
        site_id: SiteId,
    ) -> db::DatabaseResult<Vec<Self::Row>>;

    fn row_ids(row: &Self::Row) -> RowIds;
    fn row_created(row: &Self::Row) -> DateTime<Utc>;
    fn row_updated(row: &Self::Row) -> DateTime<Utc>;

    /// Applies one resolved entry. The policy owns its transaction
    /// boundaries; one DB transaction per entity.
    async fn handle_entry(
        &self,
        ctx: &ActivityContext,
        site: &Site,
        row: &Self::Row,
        entry: &Self::Entry,
        prepared: &Self::Prepared,
    ) -> ActivityResult<()>;

    /// Called for an entry that resolves to no cloud row. The Site cannot
    /// invent cloud entities, so the default logs and skips.
    async fn handle_unknown_entry(
        &self,
        _ctx: &ActivityContext,
        site: &Site,
        entry: &Self::Entry,
    ) -> ActivityResult<()> {
        let ids = Self::entry_ids(entry);
        tracing::warn!(
            resource = Self::RESOURCE,
            site = %site.id,
            ?ids,
            "inventory entry does not match any cloud row, skipping"
        );
        Ok(())
    }

    /// Decides what to do with an unreported row. The default follows the
    /// shared association semantics.
    fn plan_absent(&self, row: &Self::Row, within_freshness_window: bool) -> AbsencePlan;

    /// Executes the absence plan for one row.
    async fn handle_absent(
        &self,
        ctx: &ActivityContext,
        site: &Site,
        row: &Self::Row,
        plan: AbsencePlan,
    ) -> ActivityResult<()>;
}

/// Runs one inventory page for one Site through the template.
pub async fn reconcile_inventory<P: ReconcilePolicy>(
    policy: &P,
    ctx: &ActivityContext,
    site_id: SiteId,
    inventory: Option<P::Inventory>,
) -> ActivityResult<()> {
    let inventory = inventory.ok_or_else(|| {
        ActivityError::InvalidInput(format!("nil {} inventory for {site_id}", P::RESOURCE))
    })?;

    let mut conn = ctx
        .pool
        .acquire()
        .await
        .map_err(|err| db::DatabaseError::new("acquire connection", err))?;

    let site = db::site::must_find_by_id(&mut conn, site_id)
        .await
        .map_err(|err| {
            if err.is_not_found() {
                ActivityError::SiteNotFound(site_id)
            } else {
                err.into()
            }
        })?;

    if inventory.status() == InventoryStatus::Failed {
        tracing::info!(
            resource = P::RESOURCE,
            site = %site_id,
            "snapshot reported FAILED, skipping reconciliation"
        );
        return Ok(());
    }

    let rows = policy.load_rows(&mut conn, site_id).await?;
    drop(conn);

    let prepared = policy.prepare(&inventory);
    let snapshot = inventory.timestamp();

    let mut by_cloud_id: HashMap<String, usize> = HashMap::new();
    let mut by_controller_id: HashMap<String, usize> = HashMap::new();
    for (index, row) in rows.iter().enumerate() {
        let ids = P::row_ids(row);
        by_cloud_id.insert(ids.cloud_id, index);
        if let Some(controller_id) = ids.controller_id {
            by_controller_id.insert(controller_id, index);
        }
    }

    let reported = pages::reported_ids(&inventory, |entry| {
        let ids = P::entry_ids(entry);
        ids.cloud_id.or(ids.controller_id)
    });

    for entry in inventory.items() {
        ctx.check_cancelled()?;

        let ids = P::entry_ids(entry);
        // Controller ID first: it is the Site's authoritative handle.
        let row = ids
            .controller_id
            .as_ref()
            .and_then(|id| by_controller_id.get(id))
            .or_else(|| ids.cloud_id.as_ref().and_then(|id| by_cloud_id.get(id)))
            .map(|&index| &rows[index]);

        let Some(row) = row else {
            if let Err(err) = policy.handle_unknown_entry(ctx, &site, entry).await {
                if matches!(err, ActivityError::Cancelled) {
                    return Err(err);
                }
                tracing::warn!(
                    resource = P::RESOURCE,
                    site = %site_id,
                    %err,
                    "failed to handle unknown inventory entry"
                );
            }
            continue;
        };

        if row_updated_after_snapshot(P::row_updated(row), snapshot) {
            tracing::debug!(
                resource = P::RESOURCE,
                site = %site_id,
                row = %P::row_ids(row).cloud_id,
                "cloud row is newer than the snapshot, skipping entry"
            );
            continue;
        }

        if let Err(err) = policy.handle_entry(ctx, &site, row, entry, &prepared).await {
            if matches!(err, ActivityError::Cancelled) {
                return Err(err);
            }
            tracing::warn!(
                resource = P::RESOURCE,
                site = %site_id,
                row = %P::row_ids(row).cloud_id,
                %err,
                "failed to apply inventory entry"
            );
        }
    }

    if inventory.is_terminal_page() {
        handle_absent_rows(policy, ctx, &site, &rows, &reported).await?;
    }

    Ok(())
}

async fn handle_absent_rows<P: ReconcilePolicy>(
    policy: &P,
    ctx: &ActivityContext,
    site: &Site,
    rows: &[P::Row],
    reported: &std::collections::HashSet<String>,
) -> ActivityResult<()> {
    for row in rows {
        let ids = P::row_ids(row);
        let is_reported = reported.contains(&ids.cloud_id)
            || ids
                .controller_id
                .as_ref()
                .is_some_and(|id| reported.contains(id));
        if is_reported {
            continue;
        }

        ctx.check_cancelled()?;

        let fresh = ctx
            .freshness
            .is_within_stale_inventory_threshold(P::row_created(row));
        let plan = policy.plan_absent(row, fresh);

        match plan {
            AbsencePlan::Skip => {
                tracing::debug!(
                    resource = P::RESOURCE,
                    site = %site.id,
                    row = %ids.cloud_id,
                    "unreported row is inside the freshness window, deferring"
                );
            }
            AbsencePlan::Retain => {
                tracing::info!(
                    resource = P::RESOURCE,
                    site = %site.id,
                    row = %ids.cloud_id,
                    "row not reported by Site, retained"
                );
            }
            AbsencePlan::Delete | AbsencePlan::MarkMissing => {
                if let Err(err) = policy.handle_absent(ctx, site, row, plan).await {
                    if matches!(err, ActivityError::Cancelled) {
                        return Err(err);
                    }
                    tracing::warn!(
                        resource = P::RESOURCE,
                        site = %site.id,
                        row = %ids.cloud_id,
                        %err,
                        "failed to handle unreported row"
                    );
                }
            }
        }
    }
    Ok(())
}

// MARK: - Shared association handling

/// The default absence plan for association-backed resources.
pub fn association_absence_plan(
    association: &SiteAssociation,
    within_freshness_window: bool,
) -> AbsencePlan {
    if association.status == SyncStatus::Deleting {
        return AbsencePlan::Delete;
    }
    if within_freshness_window {
        return AbsencePlan::Skip;
    }
    AbsencePlan::MarkMissing
}

/// Deletes an association whose Site-side object is confirmed gone, then
/// rolls the parent up (which deletes a `deleting` parent once the last
/// association is cleared).
pub async fn delete_absent_association(
    ctx: &ActivityContext,
    table: AssociationTable,
    association: &SiteAssociation,
) -> ActivityResult<()> {
    let mut txn = db::Transaction::begin(&ctx.pool).await?;
    db::association::delete(txn.as_pgconn(), table, association.id).await?;
    txn.commit().await?;

    rollup::rollup_parent(ctx, table, association.resource_id).await
}

/// Marks an association missing-on-Site with an error status, then rolls the
/// parent up.
pub async fn mark_association_missing(
    ctx: &ActivityContext,
    table: AssociationTable,
    association: &SiteAssociation,
) -> ActivityResult<()> {
    let mut txn = db::Transaction::begin(&ctx.pool).await?;
    db::association::set_missing_on_site(txn.as_pgconn(), table, association.id, true).await?;
    db::association::update_status(txn.as_pgconn(), table, association.id, SyncStatus::Error)
        .await?;
    db::status_detail::append_if_changed(
        txn.as_pgconn(),
        association.id.as_uuid(),
        SyncStatus::Error.as_ref(),
        messages::MISSING_ON_SITE,
    )
    .await?;
    txn.commit().await?;

    rollup::rollup_parent(ctx, table, association.resource_id).await
}

/// Writes an observed per-Site status (with an optional journal message) and
/// clears the missing flag. Returns whether the stored status changed, which
/// is the parent-rollup trigger.
pub async fn write_association_status(
    ctx: &ActivityContext,
    table: AssociationTable,
    association: &SiteAssociation,
    status: SyncStatus,
    message: &str,
) -> ActivityResult<bool> {
    let changed = association.status != status;

    let mut txn = db::Transaction::begin(&ctx.pool).await?;
    if changed {
        db::association::update_status(txn.as_pgconn(), table, association.id, status).await?;
    }
    if association.is_missing_on_site {
        db::association::set_missing_on_site(txn.as_pgconn(), table, association.id, false).await?;
    }
    db::status_detail::append_if_changed(
        txn.as_pgconn(),
        association.id.as_uuid(),
        status.as_ref(),
        message,
    )
    .await?;
    txn.commit().await?;

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use anvil_uuid::SiteAssociationId;
    use chrono::Utc;

    use super::*;

    fn association(status: SyncStatus) -> SiteAssociation {
        SiteAssociation {
            id: SiteAssociationId::new_v4(),
            resource_id: uuid::Uuid::new_v4(),
            site_id: SiteId::new_v4(),
            status,
            version: "v1".to_string(),
            is_missing_on_site: false,
            created: Utc::now(),
            updated: Utc::now(),
        }
    }

    #[test]
    fn deleting_association_is_deleted_even_when_fresh() {
        let assoc = association(SyncStatus::Deleting);
        assert_eq!(association_absence_plan(&assoc, true), AbsencePlan::Delete);
        assert_eq!(association_absence_plan(&assoc, false), AbsencePlan::Delete);
    }

    #[test]
    fn fresh_association_is_skipped() {
        let assoc = association(SyncStatus::Syncing);
        assert_eq!(association_absence_plan(&assoc, true), AbsencePlan::Skip);
    }

    #[test]
    fn stale_association_is_marked_missing() {
        let assoc = association(SyncStatus::Synced);
        assert_eq!(
            association_absence_plan(&assoc, false),
            AbsencePlan::MarkMissing
        );
    }
}
