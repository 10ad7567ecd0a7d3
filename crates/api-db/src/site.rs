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

use anvil_uuid::SiteId;
use model::site::Site;
use sqlx::PgConnection;

use crate::{DatabaseError, DatabaseResult};

pub async fn find_by_id(txn: &mut PgConnection, id: SiteId) -> DatabaseResult<Option<Site>> {
    let sql = "SELECT * FROM sites WHERE id=$1";
    sqlx::query_as(sql)
        .bind(id)
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))
}

/// Like [`find_by_id`], but a missing Site is an error.
///
/// Reconcile activities use this: the inventory names the Site, so a missing
/// row means either a deleted Site that is still pushing, or corruption.
/// Either way the activity fails and the outer retry policy decides.
pub async fn must_find_by_id(txn: &mut PgConnection, id: SiteId) -> DatabaseResult<Site> {
    find_by_id(txn, id)
        .await?
        .ok_or_else(|| DatabaseError::NotFoundError {
            kind: "Site",
            id: id.to_string(),
        })
}

pub async fn find_all(txn: &mut PgConnection) -> DatabaseResult<Vec<Site>> {
    let sql = "SELECT * FROM sites";
    sqlx::query_as(sql)
        .fetch_all(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))
}

pub async fn find_name_by_id(
    txn: &mut PgConnection,
    id: SiteId,
) -> DatabaseResult<Option<String>> {
    let sql = "SELECT name FROM sites WHERE id=$1";
    sqlx::query_scalar(sql)
        .bind(id)
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))
}
