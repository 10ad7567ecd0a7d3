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

use anvil_uuid::MachineId;
use model::machine::Machine;
use sqlx::PgConnection;

use crate::{DatabaseError, DatabaseResult};

pub async fn find_by_id(txn: &mut PgConnection, id: MachineId) -> DatabaseResult<Option<Machine>> {
    let sql = "SELECT * FROM machines WHERE id=$1";
    sqlx::query_as(sql)
        .bind(id)
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))
}

/// Flips the assignment flag. Callers transferring ownership must hold the
/// advisory lock for the machine id in the same transaction.
pub async fn set_assigned(
    txn: &mut PgConnection,
    id: MachineId,
    is_assigned: bool,
) -> DatabaseResult<()> {
    let sql = "UPDATE machines SET is_assigned=$1, updated=now() WHERE id=$2";
    let result = sqlx::query(sql)
        .bind(is_assigned)
        .bind(id)
        .execute(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFoundError {
            kind: "Machine",
            id: id.to_string(),
        });
    }
    Ok(())
}
