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
use std::str::FromStr;

use anvil_uuid::NvlLogicalPartitionId;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

use crate::metadata::Metadata;
use crate::status::SyncStatus;

/// An NVLink logical partition managed across Sites.
#[derive(Debug, Clone)]
pub struct NvlLogicalPartition {
    pub id: NvlLogicalPartitionId,
    pub metadata: Metadata,
    pub version: String,
    pub status: SyncStatus,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for NvlLogicalPartition {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let labels: sqlx::types::Json<HashMap<String, String>> = row.try_get("metadata_labels")?;
        let status: String = row.try_get("status")?;
        Ok(NvlLogicalPartition {
            id: row.try_get("id")?,
            metadata: Metadata {
                name: row.try_get("metadata_name")?,
                description: row.try_get("metadata_description")?,
                labels: labels.0,
            },
            version: row.try_get("version")?,
            status: SyncStatus::from_str(&status).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            created: row.try_get("created")?,
            updated: row.try_get("updated")?,
        })
    }
}
