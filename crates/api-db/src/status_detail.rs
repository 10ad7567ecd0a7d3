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

//! The append-only per-entity status journal.
//!
//! Entries are never mutated or deleted. Appends happen inside the same
//! transaction as the primary state change they describe.

use model::status_detail::StatusDetail;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{DatabaseError, DatabaseResult};

pub async fn append(
    txn: &mut PgConnection,
    object_id: Uuid,
    status: &str,
    message: &str,
) -> DatabaseResult<()> {
    let sql = "INSERT INTO status_details (object_id, status, message) VALUES ($1, $2, $3)";
    sqlx::query(sql)
        .bind(object_id)
        .bind(status)
        .bind(message)
        .execute(txn)
        .await
        .map(|_| ())
        .map_err(|err| DatabaseError::query(sql, err))
}

pub async fn latest(
    txn: &mut PgConnection,
    object_id: Uuid,
) -> DatabaseResult<Option<StatusDetail>> {
    let sql =
        "SELECT * FROM status_details WHERE object_id=$1 ORDER BY created DESC, id DESC LIMIT 1";
    sqlx::query_as(sql)
        .bind(object_id)
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))
}

/// Full journal for an entity, newest first.
pub async fn history(txn: &mut PgConnection, object_id: Uuid) -> DatabaseResult<Vec<StatusDetail>> {
    let sql = "SELECT * FROM status_details WHERE object_id=$1 ORDER BY created DESC, id DESC";
    sqlx::query_as(sql)
        .bind(object_id)
        .fetch_all(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))
}

/// Appends `(status, message)` unless it duplicates the most recent entry.
///
/// This is what keeps the journal compact under at-least-once activity
/// delivery; re-delivering the same inventory page produces no new entries.
pub async fn append_if_changed(
    txn: &mut PgConnection,
    object_id: Uuid,
    status: &str,
    message: &str,
) -> DatabaseResult<bool> {
    if let Some(last) = latest(txn, object_id).await?
        && last.is_duplicate_of(status, message)
    {
        return Ok(false);
    }
    append(txn, object_id, status, message).await?;
    Ok(true)
}
