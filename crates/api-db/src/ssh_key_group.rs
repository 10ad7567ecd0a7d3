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

use anvil_uuid::{InstanceId, SshKeyGroupId};
use model::ssh_key_group::{SshKey, SshKeyGroup, SshKeyGroupInstanceAssociation};
use model::status::SyncStatus;
use sqlx::PgConnection;

use crate::{DatabaseError, DatabaseResult};

pub async fn find_by_id(
    txn: &mut PgConnection,
    id: SshKeyGroupId,
) -> DatabaseResult<Option<SshKeyGroup>> {
    let sql = "SELECT * FROM ssh_key_groups WHERE id=$1";
    sqlx::query_as(sql)
        .bind(id)
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))
}

/// The full key list of a group in one shot (no paginator), ordered by
/// creation so the outbound payload is stable.
///
/// Callers that assemble a sync payload take the group's advisory lock
/// first, so the list reflects a consistent snapshot.
pub async fn find_keys(
    txn: &mut PgConnection,
    group_id: SshKeyGroupId,
) -> DatabaseResult<Vec<SshKey>> {
    let sql = "SELECT * FROM ssh_keys WHERE ssh_key_group_id=$1 ORDER BY created, id";
    sqlx::query_as(sql)
        .bind(group_id)
        .fetch_all(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))
}

pub async fn find_instance_associations_by_instance(
    txn: &mut PgConnection,
    instance_id: InstanceId,
) -> DatabaseResult<Vec<SshKeyGroupInstanceAssociation>> {
    let sql = "SELECT * FROM ssh_key_group_instance_associations WHERE instance_id=$1";
    sqlx::query_as(sql)
        .bind(instance_id)
        .fetch_all(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))
}

pub async fn update_status(
    txn: &mut PgConnection,
    id: SshKeyGroupId,
    status: SyncStatus,
) -> DatabaseResult<()> {
    let sql = "UPDATE ssh_key_groups SET status=$1, updated=now() WHERE id=$2";
    sqlx::query(sql)
        .bind(status.as_ref())
        .bind(id)
        .execute(txn)
        .await
        .map(|_| ())
        .map_err(|err| DatabaseError::query(sql, err))
}

pub async fn delete_instance_associations_by_instance(
    txn: &mut PgConnection,
    instance_id: InstanceId,
) -> DatabaseResult<u64> {
    let sql = "DELETE FROM ssh_key_group_instance_associations WHERE instance_id=$1";
    sqlx::query(sql)
        .bind(instance_id)
        .execute(txn)
        .await
        .map(|result| result.rows_affected())
        .map_err(|err| DatabaseError::query(sql, err))
}

pub async fn delete_instance_associations_by_group(
    txn: &mut PgConnection,
    group_id: SshKeyGroupId,
) -> DatabaseResult<u64> {
    let sql = "DELETE FROM ssh_key_group_instance_associations WHERE ssh_key_group_id=$1";
    sqlx::query(sql)
        .bind(group_id)
        .execute(txn)
        .await
        .map(|result| result.rows_affected())
        .map_err(|err| DatabaseError::query(sql, err))
}

pub async fn delete_keys_by_group(
    txn: &mut PgConnection,
    group_id: SshKeyGroupId,
) -> DatabaseResult<u64> {
    let sql = "DELETE FROM ssh_keys WHERE ssh_key_group_id=$1";
    sqlx::query(sql)
        .bind(group_id)
        .execute(txn)
        .await
        .map(|result| result.rows_affected())
        .map_err(|err| DatabaseError::query(sql, err))
}

/// Deletes the group row itself. The caller must have cleared keys, key
/// associations and Site associations first.
pub async fn delete(txn: &mut PgConnection, id: SshKeyGroupId) -> DatabaseResult<()> {
    let sql = "DELETE FROM ssh_key_groups WHERE id=$1";
    let result = sqlx::query(sql)
        .bind(id)
        .execute(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFoundError {
            kind: "SshKeyGroup",
            id: id.to_string(),
        });
    }
    Ok(())
}
