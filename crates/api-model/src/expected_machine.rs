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
use chrono::{DateTime, Utc};
use mac_address::MacAddress;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

use crate::metadata::Metadata;

/// A machine the cloud expects to exist at a Site, registered ahead of
/// discovery.
///
/// The cloud is the source of truth for these; the Site's view is only used
/// to learn the link to a discovered [`crate::machine::Machine`].
#[derive(Debug, Clone)]
pub struct ExpectedMachine {
    /// Cloud-generated identifier. The Site has no authority to invent
    /// expected machines; unknown IDs from a Site are ignored with a warning.
    pub id: ExpectedMachineId,
    pub site_id: SiteId,
    pub bmc_mac_address: MacAddress,
    pub chassis_serial_number: String,
    /// Order-sensitive; the Site reports these in registration order.
    pub fallback_dpu_serial_numbers: Vec<String>,
    pub sku_id: Option<String>,
    pub metadata: Metadata,
    /// Link to the discovered machine, learned from the Site's
    /// `linked_machines` report by BMC MAC.
    pub machine_id: Option<MachineId>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for ExpectedMachine {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let labels: sqlx::types::Json<HashMap<String, String>> = row.try_get("metadata_labels")?;
        Ok(ExpectedMachine {
            id: row.try_get("id")?,
            site_id: row.try_get("site_id")?,
            bmc_mac_address: row.try_get("bmc_mac_address")?,
            chassis_serial_number: row.try_get("chassis_serial_number")?,
            fallback_dpu_serial_numbers: row.try_get("fallback_dpu_serial_numbers")?,
            sku_id: row.try_get("sku_id")?,
            metadata: Metadata {
                name: row.try_get("metadata_name")?,
                description: row.try_get("metadata_description")?,
                labels: labels.0,
            },
            machine_id: row.try_get("machine_id")?,
            created: row.try_get("created")?,
            updated: row.try_get("updated")?,
        })
    }
}
