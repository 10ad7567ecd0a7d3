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

use std::str::FromStr;

use anvil_uuid::{SiteAssociationId, SiteId};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

use crate::status::SyncStatus;

/// One row per (resource, Site).
///
/// Every association table (SSH key groups, OS images, security groups,
/// instance types, IB partitions, NVLink logical partitions) shares this
/// shape; the parent resource kind is implied by the table the row came from.
///
/// Invariant: no association may exist without its parent; parent deletion
/// requires all associations cleared first.
#[derive(Debug, Clone)]
pub struct SiteAssociation {
    pub id: SiteAssociationId,
    pub resource_id: Uuid,
    pub site_id: SiteId,
    /// Site-local synchronization status for the parent resource.
    pub status: SyncStatus,
    /// Snapshot of the parent's version last pushed to this Site.
    pub version: String,
    /// True iff the last processed inventory for this Site did not contain
    /// the resource.
    pub is_missing_on_site: bool,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for SiteAssociation {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        Ok(SiteAssociation {
            id: row.try_get("id")?,
            resource_id: row.try_get("resource_id")?,
            site_id: row.try_get("site_id")?,
            status: SyncStatus::from_str(&status).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            version: row.try_get("version")?,
            is_missing_on_site: row.try_get("is_missing_on_site")?,
            created: row.try_get("created")?,
            updated: row.try_get("updated")?,
        })
    }
}
