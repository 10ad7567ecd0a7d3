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

use anvil_uuid::NvlLogicalPartitionId;
use model::nvl_logical_partition::NvlLogicalPartition;
use model::status::SyncStatus;
use sqlx::PgConnection;

use crate::{DatabaseError, DatabaseResult};

pub async fn find_by_id(
    txn: &mut PgConnection,
    id: NvlLogicalPartitionId,
) -> DatabaseResult<Option<NvlLogicalPartition>> {
    let sql = "SELECT * FROM nvl_logical_partitions WHERE id=$1";
    sqlx::query_as(sql)
        .bind(id)
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))
}

pub async fn update_status(
    txn: &mut PgConnection,
    id: NvlLogicalPartitionId,
    status: SyncStatus,
) -> DatabaseResult<()> {
    let sql = "UPDATE nvl_logical_partitions SET status=$1, updated=now() WHERE id=$2";
    sqlx::query(sql)
        .bind(status.as_ref())
        .bind(id)
        .execute(txn)
        .await
        .map(|_| ())
        .map_err(|err| DatabaseError::query(sql, err))
}

pub async fn delete(txn: &mut PgConnection, id: NvlLogicalPartitionId) -> DatabaseResult<()> {
    let sql = "DELETE FROM nvl_logical_partitions WHERE id=$1";
    let result = sqlx::query(sql)
        .bind(id)
        .execute(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFoundError {
            kind: "NvLinkLogicalPartition",
            id: id.to_string(),
        });
    }
    Ok(())
}
