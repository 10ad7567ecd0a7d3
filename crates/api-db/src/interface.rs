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

use anvil_uuid::{InstanceId, InterfaceId};
use model::instance::Interface;
use model::status::ChildStatus;
use sqlx::PgConnection;

use crate::{DatabaseError, DatabaseResult};

pub async fn find_by_instance(
    txn: &mut PgConnection,
    instance_id: InstanceId,
) -> DatabaseResult<Vec<Interface>> {
    let sql = "SELECT * FROM interfaces WHERE instance_id=$1";
    sqlx::query_as(sql)
        .bind(instance_id)
        .fetch_all(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))
}

pub async fn update_status(
    txn: &mut PgConnection,
    id: InterfaceId,
    status: ChildStatus,
) -> DatabaseResult<()> {
    let sql = "UPDATE interfaces SET status=$1, updated=now() WHERE id=$2";
    sqlx::query(sql)
        .bind(status.as_ref())
        .bind(id)
        .execute(txn)
        .await
        .map(|_| ())
        .map_err(|err| DatabaseError::query(sql, err))
}

pub async fn delete(txn: &mut PgConnection, id: InterfaceId) -> DatabaseResult<()> {
    let sql = "DELETE FROM interfaces WHERE id=$1";
    sqlx::query(sql)
        .bind(id)
        .execute(txn)
        .await
        .map(|_| ())
        .map_err(|err| DatabaseError::query(sql, err))
}

pub async fn delete_by_instance(
    txn: &mut PgConnection,
    instance_id: InstanceId,
) -> DatabaseResult<u64> {
    let sql = "DELETE FROM interfaces WHERE instance_id=$1";
    sqlx::query(sql)
        .bind(instance_id)
        .execute(txn)
        .await
        .map(|result| result.rows_affected())
        .map_err(|err| DatabaseError::query(sql, err))
}
