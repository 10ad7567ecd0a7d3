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

use std::collections::HashMap;

use anvil_uuid::InstanceTypeId;
use model::instance_type::{InstanceType, MachineCapability};
use model::status::SyncStatus;
use sqlx::PgConnection;

use crate::{DatabaseError, DatabaseResult};

pub async fn find_by_id(
    txn: &mut PgConnection,
    id: InstanceTypeId,
) -> DatabaseResult<Option<InstanceType>> {
    let sql = "SELECT * FROM instance_types WHERE id=$1";
    sqlx::query_as(sql)
        .bind(id)
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))
}

pub async fn find_all(txn: &mut PgConnection) -> DatabaseResult<Vec<InstanceType>> {
    let sql = "SELECT * FROM instance_types";
    sqlx::query_as(sql)
        .fetch_all(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))
}

/// Registers an instance type learned from a Site inventory.
pub async fn create(
    txn: &mut PgConnection,
    name: &str,
    infrastructure_provider_id: &str,
    created_by: &str,
) -> DatabaseResult<InstanceType> {
    let sql = "INSERT INTO instance_types
               (metadata_name, metadata_description, metadata_labels, status,
                infrastructure_provider_id, created_by)
               VALUES ($1, '', '{}'::jsonb, $2, $3, $4) RETURNING *";
    sqlx::query_as(sql)
        .bind(name)
        .bind(SyncStatus::Synced.as_ref())
        .bind(infrastructure_provider_id)
        .bind(created_by)
        .fetch_one(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))
}

pub async fn update_status(
    txn: &mut PgConnection,
    id: InstanceTypeId,
    status: SyncStatus,
) -> DatabaseResult<()> {
    let sql = "UPDATE instance_types SET status=$1, updated=now() WHERE id=$2";
    sqlx::query(sql)
        .bind(status.as_ref())
        .bind(id)
        .execute(txn)
        .await
        .map(|_| ())
        .map_err(|err| DatabaseError::query(sql, err))
}

pub async fn delete(txn: &mut PgConnection, id: InstanceTypeId) -> DatabaseResult<()> {
    let sql = "DELETE FROM instance_types WHERE id=$1";
    let result = sqlx::query(sql)
        .bind(id)
        .execute(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFoundError {
            kind: "InstanceType",
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Capabilities for a set of instance types, grouped by type.
pub async fn find_capabilities(
    txn: &mut PgConnection,
    instance_type_ids: &[InstanceTypeId],
) -> DatabaseResult<HashMap<InstanceTypeId, Vec<MachineCapability>>> {
    let sql = "SELECT * FROM machine_capabilities WHERE instance_type_id=ANY($1) ORDER BY index";
    let rows: Vec<MachineCapability> = sqlx::query_as(sql)
        .bind(instance_type_ids)
        .fetch_all(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))?;

    let mut by_type: HashMap<InstanceTypeId, Vec<MachineCapability>> = HashMap::new();
    for row in rows {
        by_type.entry(row.instance_type_id).or_default().push(row);
    }
    Ok(by_type)
}

pub async fn create_capability(
    txn: &mut PgConnection,
    instance_type_id: InstanceTypeId,
    index: i32,
    name: &str,
    value: &str,
) -> DatabaseResult<()> {
    let sql = "INSERT INTO machine_capabilities (instance_type_id, index, name, value)
               VALUES ($1, $2, $3, $4)";
    sqlx::query(sql)
        .bind(instance_type_id)
        .bind(index)
        .bind(name)
        .bind(value)
        .execute(txn)
        .await
        .map(|_| ())
        .map_err(|err| DatabaseError::query(sql, err))
}

pub async fn delete_capabilities(
    txn: &mut PgConnection,
    instance_type_id: InstanceTypeId,
) -> DatabaseResult<u64> {
    let sql = "DELETE FROM machine_capabilities WHERE instance_type_id=$1";
    sqlx::query(sql)
        .bind(instance_type_id)
        .execute(txn)
        .await
        .map(|result| result.rows_affected())
        .map_err(|err| DatabaseError::query(sql, err))
}

pub async fn delete_capability(
    txn: &mut PgConnection,
    instance_type_id: InstanceTypeId,
    index: i32,
) -> DatabaseResult<()> {
    let sql = "DELETE FROM machine_capabilities WHERE instance_type_id=$1 AND index=$2";
    sqlx::query(sql)
        .bind(instance_type_id)
        .bind(index)
        .execute(txn)
        .await
        .map(|_| ())
        .map_err(|err| DatabaseError::query(sql, err))
}

/// Capabilities are not independently mutable; any change drops and
/// re-creates the row within the caller's transaction.
pub async fn replace_capability(
    txn: &mut PgConnection,
    instance_type_id: InstanceTypeId,
    index: i32,
    name: &str,
    value: &str,
) -> DatabaseResult<()> {
    delete_capability(txn, instance_type_id, index).await?;
    create_capability(txn, instance_type_id, index, name, value).await
}
