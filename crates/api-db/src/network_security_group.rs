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

use anvil_uuid::NetworkSecurityGroupId;
use model::network_security_group::NetworkSecurityGroup;
use model::status::SyncStatus;
use sqlx::PgConnection;

use crate::{DatabaseError, DatabaseResult};

pub async fn find_by_id(
    txn: &mut PgConnection,
    id: NetworkSecurityGroupId,
) -> DatabaseResult<Option<NetworkSecurityGroup>> {
    let sql = "SELECT * FROM network_security_groups WHERE id=$1";
    sqlx::query_as(sql)
        .bind(id)
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))
}

pub async fn update_status(
    txn: &mut PgConnection,
    id: NetworkSecurityGroupId,
    status: SyncStatus,
) -> DatabaseResult<()> {
    let sql = "UPDATE network_security_groups SET status=$1, updated=now() WHERE id=$2";
    sqlx::query(sql)
        .bind(status.as_ref())
        .bind(id)
        .execute(txn)
        .await
        .map(|_| ())
        .map_err(|err| DatabaseError::query(sql, err))
}

pub async fn delete(txn: &mut PgConnection, id: NetworkSecurityGroupId) -> DatabaseResult<()> {
    let sql = "DELETE FROM network_security_groups WHERE id=$1";
    let result = sqlx::query(sql)
        .bind(id)
        .execute(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFoundError {
            kind: "NetworkSecurityGroup",
            id: id.to_string(),
        });
    }
    Ok(())
}
