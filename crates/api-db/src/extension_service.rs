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

use anvil_uuid::{ExtensionServiceDeploymentId, InstanceId};
use model::instance::ExtensionServiceDeployment;
use model::status::ChildStatus;
use sqlx::PgConnection;

use crate::{DatabaseError, DatabaseResult};

pub async fn find_deployments_by_instance(
    txn: &mut PgConnection,
    instance_id: InstanceId,
) -> DatabaseResult<Vec<ExtensionServiceDeployment>> {
    let sql = "SELECT * FROM dpu_extension_service_deployments WHERE instance_id=$1";
    sqlx::query_as(sql)
        .bind(instance_id)
        .fetch_all(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))
}

pub async fn update_deployment_status(
    txn: &mut PgConnection,
    id: ExtensionServiceDeploymentId,
    status: ChildStatus,
) -> DatabaseResult<()> {
    let sql = "UPDATE dpu_extension_service_deployments SET status=$1, updated=now() WHERE id=$2";
    sqlx::query(sql)
        .bind(status.as_ref())
        .bind(id)
        .execute(txn)
        .await
        .map(|_| ())
        .map_err(|err| DatabaseError::query(sql, err))
}

pub async fn delete_deployment(
    txn: &mut PgConnection,
    id: ExtensionServiceDeploymentId,
) -> DatabaseResult<()> {
    let sql = "DELETE FROM dpu_extension_service_deployments WHERE id=$1";
    sqlx::query(sql)
        .bind(id)
        .execute(txn)
        .await
        .map(|_| ())
        .map_err(|err| DatabaseError::query(sql, err))
}
