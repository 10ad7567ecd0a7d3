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

//! Parent-status rollup.
//!
//! The parent resource's user-visible status is a pure function of its
//! per-Site association statuses. Triggered whenever an association's status
//! changes.

use anvil_uuid::{
    IbPartitionId, InstanceTypeId, NetworkSecurityGroupId, NvlLogicalPartitionId, OsImageId,
    SshKeyGroupId,
};
use db::association::AssociationTable;
use model::messages;
use model::status::SyncStatus;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::activity::ActivityContext;
use crate::ActivityResult;

/// Computes the parent status from its association statuses.
///
/// Returns `None` for an empty association set; the caller decides whether
/// that means "delete the parent" (status `deleting`) or "leave it alone".
pub fn compute_parent_status(statuses: &[SyncStatus]) -> Option<SyncStatus> {
    if statuses.is_empty() {
        return None;
    }
    if statuses.contains(&SyncStatus::Error) {
        return Some(SyncStatus::Error);
    }
    if statuses.contains(&SyncStatus::Syncing) {
        return Some(SyncStatus::Syncing);
    }
    Some(SyncStatus::Synced)
}

/// Re-derives and persists the parent status for `resource_id`.
///
/// Runs in its own transaction. Writes only when the computed status differs
/// from the stored one, so replayed activities don't churn the journal.
pub async fn rollup_parent(
    ctx: &ActivityContext,
    table: AssociationTable,
    resource_id: Uuid,
) -> ActivityResult<()> {
    let mut txn = db::Transaction::begin(&ctx.pool).await?;

    let associations =
        db::association::find_by_resource(txn.as_pgconn(), table, resource_id).await?;
    let statuses: Vec<SyncStatus> = associations.iter().map(|assoc| assoc.status).collect();

    let Some(current) = load_parent_status(txn.as_pgconn(), table, resource_id).await? else {
        // Parent already gone; associations must not outlive it, so there is
        // nothing left to aggregate.
        tracing::debug!(%resource_id, kind = table.parent_kind(), "rollup for missing parent");
        txn.rollback().await?;
        return Ok(());
    };

    if current == SyncStatus::Deleting && associations.is_empty() {
        delete_parent(txn.as_pgconn(), table, resource_id).await?;
        txn.commit().await?;
        tracing::info!(%resource_id, kind = table.parent_kind(), "deleted parent after last Site association cleared");
        return Ok(());
    }

    let computed = match compute_parent_status(&statuses) {
        Some(computed) if current != SyncStatus::Deleting => computed,
        // A deleting parent never leaves `deleting` via rollup, and an empty
        // association set on a live parent is not a status change.
        _ => {
            txn.rollback().await?;
            return Ok(());
        }
    };

    if computed == current {
        txn.rollback().await?;
        return Ok(());
    }

    update_parent_status(txn.as_pgconn(), table, resource_id, computed).await?;
    if computed == SyncStatus::Error {
        db::status_detail::append_if_changed(
            txn.as_pgconn(),
            resource_id,
            computed.as_ref(),
            messages::ROLLUP_SITE_SYNC_FAILED,
        )
        .await?;
    }
    txn.commit().await?;
    Ok(())
}

async fn load_parent_status(
    txn: &mut PgConnection,
    table: AssociationTable,
    resource_id: Uuid,
) -> db::DatabaseResult<Option<SyncStatus>> {
    Ok(match table {
        AssociationTable::SshKeyGroup => {
            db::ssh_key_group::find_by_id(txn, SshKeyGroupId::from_uuid(resource_id))
                .await?
                .map(|group| group.status)
        }
        AssociationTable::OsImage => {
            db::os_image::find_by_id(txn, OsImageId::from_uuid(resource_id))
                .await?
                .map(|image| image.status)
        }
        AssociationTable::NetworkSecurityGroup => {
            db::network_security_group::find_by_id(
                txn,
                NetworkSecurityGroupId::from_uuid(resource_id),
            )
            .await?
            .map(|nsg| nsg.status)
        }
        AssociationTable::InstanceType => {
            db::instance_type::find_by_id(txn, InstanceTypeId::from_uuid(resource_id))
                .await?
                .map(|instance_type| instance_type.status)
        }
        AssociationTable::IbPartition => {
            db::ib_partition::find_by_id(txn, IbPartitionId::from_uuid(resource_id))
                .await?
                .map(|partition| partition.status)
        }
        AssociationTable::NvlLogicalPartition => {
            db::nvl_logical_partition::find_by_id(
                txn,
                NvlLogicalPartitionId::from_uuid(resource_id),
            )
            .await?
            .map(|partition| partition.status)
        }
    })
}

async fn update_parent_status(
    txn: &mut PgConnection,
    table: AssociationTable,
    resource_id: Uuid,
    status: SyncStatus,
) -> db::DatabaseResult<()> {
    match table {
        AssociationTable::SshKeyGroup => {
            db::ssh_key_group::update_status(txn, SshKeyGroupId::from_uuid(resource_id), status)
                .await
        }
        AssociationTable::OsImage => {
            db::os_image::update_status(txn, OsImageId::from_uuid(resource_id), status).await
        }
        AssociationTable::NetworkSecurityGroup => {
            db::network_security_group::update_status(
                txn,
                NetworkSecurityGroupId::from_uuid(resource_id),
                status,
            )
            .await
        }
        AssociationTable::InstanceType => {
            db::instance_type::update_status(txn, InstanceTypeId::from_uuid(resource_id), status)
                .await
        }
        AssociationTable::IbPartition => {
            db::ib_partition::update_status(txn, IbPartitionId::from_uuid(resource_id), status)
                .await
        }
        AssociationTable::NvlLogicalPartition => {
            db::nvl_logical_partition::update_status(
                txn,
                NvlLogicalPartitionId::from_uuid(resource_id),
                status,
            )
            .await
        }
    }
}

/// Physically removes a parent whose last association was cleared.
///
/// SSH key groups own their key list and instance attachments, which must go
/// in the same transaction.
async fn delete_parent(
    txn: &mut PgConnection,
    table: AssociationTable,
    resource_id: Uuid,
) -> db::DatabaseResult<()> {
    match table {
        AssociationTable::SshKeyGroup => {
            let group_id = SshKeyGroupId::from_uuid(resource_id);
            db::ssh_key_group::delete_keys_by_group(txn, group_id).await?;
            db::ssh_key_group::delete_instance_associations_by_group(txn, group_id).await?;
            db::ssh_key_group::delete(txn, group_id).await
        }
        AssociationTable::OsImage => {
            db::os_image::delete(txn, OsImageId::from_uuid(resource_id)).await
        }
        AssociationTable::NetworkSecurityGroup => {
            db::network_security_group::delete(txn, NetworkSecurityGroupId::from_uuid(resource_id))
                .await
        }
        AssociationTable::InstanceType => {
            let instance_type_id = InstanceTypeId::from_uuid(resource_id);
            db::instance_type::delete_capabilities(txn, instance_type_id).await?;
            db::instance_type::delete(txn, instance_type_id).await
        }
        AssociationTable::IbPartition => {
            db::ib_partition::delete(txn, IbPartitionId::from_uuid(resource_id)).await
        }
        AssociationTable::NvlLogicalPartition => {
            db::nvl_logical_partition::delete(txn, NvlLogicalPartitionId::from_uuid(resource_id))
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_error_wins() {
        assert_eq!(
            compute_parent_status(&[SyncStatus::Synced, SyncStatus::Error, SyncStatus::Syncing]),
            Some(SyncStatus::Error)
        );
    }

    #[test]
    fn syncing_beats_synced() {
        assert_eq!(
            compute_parent_status(&[SyncStatus::Synced, SyncStatus::Syncing]),
            Some(SyncStatus::Syncing)
        );
    }

    #[test]
    fn all_synced_rolls_up_synced() {
        assert_eq!(
            compute_parent_status(&[SyncStatus::Synced, SyncStatus::Synced]),
            Some(SyncStatus::Synced)
        );
    }

    #[test]
    fn empty_set_computes_nothing() {
        assert_eq!(compute_parent_status(&[]), None);
    }
}
