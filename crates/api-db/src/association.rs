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

//! Per-(resource, Site) association rows.
//!
//! Every association table shares one shape, so the queries here are
//! composed dynamically from the table name. Only the tables enumerated in
//! [`AssociationTable`] can be named, which keeps the composition safe.

use anvil_uuid::{SiteAssociationId, SiteId};
use model::association::SiteAssociation;
use model::status::SyncStatus;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{DatabaseError, DatabaseResult};

/// The association tables that exist in the schema.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AssociationTable {
    SshKeyGroup,
    OsImage,
    NetworkSecurityGroup,
    InstanceType,
    IbPartition,
    NvlLogicalPartition,
}

impl AssociationTable {
    pub const fn table_name(self) -> &'static str {
        match self {
            AssociationTable::SshKeyGroup => "ssh_key_group_site_associations",
            AssociationTable::OsImage => "os_image_site_associations",
            AssociationTable::NetworkSecurityGroup => "network_security_group_site_associations",
            AssociationTable::InstanceType => "instance_type_site_associations",
            AssociationTable::IbPartition => "ib_partition_site_associations",
            AssociationTable::NvlLogicalPartition => "nvl_logical_partition_site_associations",
        }
    }

    pub const fn parent_kind(self) -> &'static str {
        match self {
            AssociationTable::SshKeyGroup => "SshKeyGroup",
            AssociationTable::OsImage => "OsImage",
            AssociationTable::NetworkSecurityGroup => "NetworkSecurityGroup",
            AssociationTable::InstanceType => "InstanceType",
            AssociationTable::IbPartition => "InfiniBandPartition",
            AssociationTable::NvlLogicalPartition => "NvLinkLogicalPartition",
        }
    }
}

/// All associations for one Site. Unbounded: the set is limited by Site
/// capacity, not by user count.
pub async fn find_by_site(
    txn: &mut PgConnection,
    table: AssociationTable,
    site_id: SiteId,
) -> DatabaseResult<Vec<SiteAssociation>> {
    let sql = format!("SELECT * FROM {} WHERE site_id=$1", table.table_name());
    sqlx::query_as(&sql)
        .bind(site_id)
        .fetch_all(txn)
        .await
        .map_err(|err| DatabaseError::query(&sql, err))
}

pub async fn find_by_resource(
    txn: &mut PgConnection,
    table: AssociationTable,
    resource_id: Uuid,
) -> DatabaseResult<Vec<SiteAssociation>> {
    let sql = format!("SELECT * FROM {} WHERE resource_id=$1", table.table_name());
    sqlx::query_as(&sql)
        .bind(resource_id)
        .fetch_all(txn)
        .await
        .map_err(|err| DatabaseError::query(&sql, err))
}

pub async fn find_by_resource_and_site(
    txn: &mut PgConnection,
    table: AssociationTable,
    resource_id: Uuid,
    site_id: SiteId,
) -> DatabaseResult<Option<SiteAssociation>> {
    let sql = format!(
        "SELECT * FROM {} WHERE resource_id=$1 AND site_id=$2",
        table.table_name()
    );
    sqlx::query_as(&sql)
        .bind(resource_id)
        .bind(site_id)
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(&sql, err))
}

pub async fn create(
    txn: &mut PgConnection,
    table: AssociationTable,
    resource_id: Uuid,
    site_id: SiteId,
    version: &str,
) -> DatabaseResult<SiteAssociation> {
    let sql = format!(
        "INSERT INTO {} (resource_id, site_id, status, version, is_missing_on_site)
         VALUES ($1, $2, $3, $4, false) RETURNING *",
        table.table_name()
    );
    sqlx::query_as(&sql)
        .bind(resource_id)
        .bind(site_id)
        .bind(SyncStatus::Pending.as_ref())
        .bind(version)
        .fetch_one(txn)
        .await
        .map_err(|err| DatabaseError::query(&sql, err))
}

/// Writes a new per-Site status, touching `updated`.
pub async fn update_status(
    txn: &mut PgConnection,
    table: AssociationTable,
    id: SiteAssociationId,
    status: SyncStatus,
) -> DatabaseResult<()> {
    let sql = format!(
        "UPDATE {} SET status=$1, updated=now() WHERE id=$2",
        table.table_name()
    );
    let result = sqlx::query(&sql)
        .bind(status.as_ref())
        .bind(id)
        .execute(txn)
        .await
        .map_err(|err| DatabaseError::query(&sql, err))?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFoundError {
            kind: table.parent_kind(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub async fn update_version(
    txn: &mut PgConnection,
    table: AssociationTable,
    id: SiteAssociationId,
    version: &str,
) -> DatabaseResult<()> {
    let sql = format!(
        "UPDATE {} SET version=$1, updated=now() WHERE id=$2",
        table.table_name()
    );
    sqlx::query(&sql)
        .bind(version)
        .bind(id)
        .execute(txn)
        .await
        .map(|_| ())
        .map_err(|err| DatabaseError::query(&sql, err))
}

pub async fn set_missing_on_site(
    txn: &mut PgConnection,
    table: AssociationTable,
    id: SiteAssociationId,
    is_missing: bool,
) -> DatabaseResult<()> {
    let sql = format!(
        "UPDATE {} SET is_missing_on_site=$1, updated=now() WHERE id=$2",
        table.table_name()
    );
    sqlx::query(&sql)
        .bind(is_missing)
        .bind(id)
        .execute(txn)
        .await
        .map(|_| ())
        .map_err(|err| DatabaseError::query(&sql, err))
}

pub async fn delete(
    txn: &mut PgConnection,
    table: AssociationTable,
    id: SiteAssociationId,
) -> DatabaseResult<()> {
    let sql = format!("DELETE FROM {} WHERE id=$1", table.table_name());
    sqlx::query(&sql)
        .bind(id)
        .execute(txn)
        .await
        .map(|_| ())
        .map_err(|err| DatabaseError::query(&sql, err))
}

/// Associations remaining on the parent, in any status. Any non-zero count
/// blocks parent deletion.
pub async fn count_for_resource(
    txn: &mut PgConnection,
    table: AssociationTable,
    resource_id: Uuid,
) -> DatabaseResult<i64> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE resource_id=$1",
        table.table_name()
    );
    sqlx::query_scalar(&sql)
        .bind(resource_id)
        .fetch_one(txn)
        .await
        .map_err(|err| DatabaseError::query(&sql, err))
}
