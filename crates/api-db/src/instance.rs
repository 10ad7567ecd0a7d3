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

use anvil_uuid::{InstanceId, SiteId};
use model::instance::Instance;
use model::network_security_group::NsgPropagationDetails;
use model::status::{InstanceStatus, PowerStatus};
use sqlx::{PgConnection, Postgres, QueryBuilder};

use crate::{ColumnUpdate, DatabaseError, DatabaseResult};

/// All live (not soft-deleted) instances at a Site.
pub async fn find_by_site(txn: &mut PgConnection, site_id: SiteId) -> DatabaseResult<Vec<Instance>> {
    let sql = "SELECT * FROM instances WHERE site_id=$1 AND deleted IS NULL";
    sqlx::query_as(sql)
        .bind(site_id)
        .fetch_all(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))
}

pub async fn find_by_id(txn: &mut PgConnection, id: InstanceId) -> DatabaseResult<Option<Instance>> {
    let sql = "SELECT * FROM instances WHERE id=$1 AND deleted IS NULL";
    sqlx::query_as(sql)
        .bind(id)
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))
}

/// The batched per-entry update a reconcile activity applies to one
/// instance. Absent fields leave the column alone; clearable columns go
/// through [`ColumnUpdate`].
#[derive(Debug, Default)]
pub struct InstanceInventoryUpdate {
    pub status: Option<InstanceStatus>,
    pub power_status: Option<PowerStatus>,
    pub is_missing_on_site: Option<bool>,
    pub is_update_pending: Option<bool>,
    pub tpm_ek_certificate: ColumnUpdate<String>,
    pub nsg_propagation: ColumnUpdate<NsgPropagationDetails>,
}

impl InstanceInventoryUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.power_status.is_none()
            && self.is_missing_on_site.is_none()
            && self.is_update_pending.is_none()
            && self.tpm_ek_certificate.is_unchanged()
            && self.nsg_propagation.is_unchanged()
    }
}

/// Applies a field-diff in one statement. A no-op update is skipped without
/// touching `updated`, so re-delivered pages don't refresh the freshness
/// guard timestamp.
pub async fn update_from_inventory(
    txn: &mut PgConnection,
    id: InstanceId,
    update: InstanceInventoryUpdate,
) -> DatabaseResult<()> {
    if update.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE instances SET ");
    let mut fields = builder.separated(", ");

    if let Some(status) = update.status {
        fields.push("status=");
        fields.push_bind_unseparated(status.as_ref().to_string());
    }
    if let Some(power_status) = update.power_status {
        fields.push("power_status=");
        fields.push_bind_unseparated(power_status.as_ref().to_string());
    }
    if let Some(missing) = update.is_missing_on_site {
        fields.push("is_missing_on_site=");
        fields.push_bind_unseparated(missing);
    }
    if let Some(pending) = update.is_update_pending {
        fields.push("is_update_pending=");
        fields.push_bind_unseparated(pending);
    }
    if let Some(cert) = update.tpm_ek_certificate.to_bind() {
        fields.push("tpm_ek_certificate=");
        fields.push_bind_unseparated(cert);
    }
    if let Some(propagation) = update.nsg_propagation.to_bind() {
        fields.push("nsg_propagation=");
        fields.push_bind_unseparated(propagation.map(sqlx::types::Json));
    }
    fields.push("updated=now()");

    builder.push(" WHERE id=");
    builder.push_bind(id);

    let query = builder.build();
    query
        .execute(txn)
        .await
        .map(|_| ())
        .map_err(|err| DatabaseError::new("update instances from inventory", err))
}

/// Records the Site's native identifier for an instance.
///
/// The controller ID is set exactly once and is immutable afterwards;
/// re-delivery of the same value is accepted, a conflicting value is a
/// precondition failure.
pub async fn set_controller_instance_id(
    txn: &mut PgConnection,
    id: InstanceId,
    controller_instance_id: &str,
) -> DatabaseResult<()> {
    let sql = "UPDATE instances SET controller_instance_id=$1, updated=now()
               WHERE id=$2 AND controller_instance_id IS NULL";
    let result = sqlx::query(sql)
        .bind(controller_instance_id)
        .bind(id)
        .execute(&mut *txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))?;

    if result.rows_affected() > 0 {
        return Ok(());
    }

    let existing = find_by_id(txn, id)
        .await?
        .ok_or_else(|| DatabaseError::NotFoundError {
            kind: "Instance",
            id: id.to_string(),
        })?;
    match existing.controller_instance_id.as_deref() {
        Some(current) if current == controller_instance_id => Ok(()),
        Some(current) => Err(DatabaseError::FailedPrecondition(format!(
            "instance {id} already has controller id {current}, refusing {controller_instance_id}"
        ))),
        None => Err(DatabaseError::internal(format!(
            "controller id write for instance {id} affected no rows"
        ))),
    }
}

pub async fn update_status(
    txn: &mut PgConnection,
    id: InstanceId,
    status: InstanceStatus,
) -> DatabaseResult<()> {
    let sql = "UPDATE instances SET status=$1, updated=now() WHERE id=$2";
    sqlx::query(sql)
        .bind(status.as_ref())
        .bind(id)
        .execute(txn)
        .await
        .map(|_| ())
        .map_err(|err| DatabaseError::query(sql, err))
}

pub async fn clear_machine(txn: &mut PgConnection, id: InstanceId) -> DatabaseResult<()> {
    let sql = "UPDATE instances SET machine_id=NULL, updated=now() WHERE id=$1";
    sqlx::query(sql)
        .bind(id)
        .execute(txn)
        .await
        .map(|_| ())
        .map_err(|err| DatabaseError::query(sql, err))
}

/// Soft-deletes the row; it stays queryable for history but leaves the
/// user's view and every `deleted IS NULL` query.
pub async fn soft_delete(txn: &mut PgConnection, id: InstanceId) -> DatabaseResult<()> {
    let sql = "UPDATE instances SET deleted=now(), updated=now() WHERE id=$1 AND deleted IS NULL";
    let result = sqlx::query(sql)
        .bind(id)
        .execute(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFoundError {
            kind: "Instance",
            id: id.to_string(),
        });
    }
    Ok(())
}
