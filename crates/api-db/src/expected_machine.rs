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

use anvil_uuid::{ExpectedMachineId, MachineId, SiteId};
use mac_address::MacAddress;
use model::expected_machine::ExpectedMachine;
use sqlx::{PgConnection, Postgres, QueryBuilder};

use crate::{ColumnUpdate, DatabaseError, DatabaseResult};

pub async fn find_by_site(
    txn: &mut PgConnection,
    site_id: SiteId,
) -> DatabaseResult<Vec<ExpectedMachine>> {
    let sql = "SELECT * FROM expected_machines WHERE site_id=$1";
    sqlx::query_as(sql)
        .bind(site_id)
        .fetch_all(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))
}

pub async fn find_by_id(
    txn: &mut PgConnection,
    id: ExpectedMachineId,
) -> DatabaseResult<Option<ExpectedMachine>> {
    let sql = "SELECT * FROM expected_machines WHERE id=$1";
    sqlx::query_as(sql)
        .bind(id)
        .fetch_optional(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))
}

/// The field-diff an inventory applies to one expected machine.
///
/// Labels use [`ColumnUpdate`] because the reconciler must be able to force
/// an explicit clear when the Site stops reporting labels.
#[derive(Debug, Default)]
pub struct ExpectedMachineUpdate {
    pub bmc_mac_address: Option<MacAddress>,
    pub chassis_serial_number: Option<String>,
    pub fallback_dpu_serial_numbers: Option<Vec<String>>,
    pub sku_id: ColumnUpdate<String>,
    pub labels: Option<HashMap<String, String>>,
    pub machine_id: ColumnUpdate<MachineId>,
}

impl ExpectedMachineUpdate {
    pub fn is_empty(&self) -> bool {
        self.bmc_mac_address.is_none()
            && self.chassis_serial_number.is_none()
            && self.fallback_dpu_serial_numbers.is_none()
            && self.sku_id.is_unchanged()
            && self.labels.is_none()
            && self.machine_id.is_unchanged()
    }
}

pub async fn update_from_inventory(
    txn: &mut PgConnection,
    id: ExpectedMachineId,
    update: ExpectedMachineUpdate,
) -> DatabaseResult<()> {
    if update.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE expected_machines SET ");
    let mut fields = builder.separated(", ");

    if let Some(mac) = update.bmc_mac_address {
        fields.push("bmc_mac_address=");
        fields.push_bind_unseparated(mac);
    }
    if let Some(serial) = update.chassis_serial_number {
        fields.push("chassis_serial_number=");
        fields.push_bind_unseparated(serial);
    }
    if let Some(serials) = update.fallback_dpu_serial_numbers {
        fields.push("fallback_dpu_serial_numbers=");
        fields.push_bind_unseparated(serials);
    }
    if let Some(sku) = update.sku_id.to_bind() {
        fields.push("sku_id=");
        fields.push_bind_unseparated(sku);
    }
    if let Some(labels) = update.labels {
        fields.push("metadata_labels=");
        fields.push_bind_unseparated(sqlx::types::Json(labels));
    }
    if let Some(machine_id) = update.machine_id.to_bind() {
        fields.push("machine_id=");
        fields.push_bind_unseparated(machine_id);
    }
    fields.push("updated=now()");

    builder.push(" WHERE id=");
    builder.push_bind(id);

    builder
        .build()
        .execute(txn)
        .await
        .map(|_| ())
        .map_err(|err| DatabaseError::new("update expected_machines from inventory", err))
}

pub async fn delete(txn: &mut PgConnection, id: ExpectedMachineId) -> DatabaseResult<()> {
    let sql = "DELETE FROM expected_machines WHERE id=$1";
    let result = sqlx::query(sql)
        .bind(id)
        .execute(txn)
        .await
        .map_err(|err| DatabaseError::query(sql, err))?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFoundError {
            kind: "ExpectedMachine",
            id: id.to_string(),
        });
    }
    Ok(())
}
