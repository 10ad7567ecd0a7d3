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

use anvil_uuid::InstanceTypeId;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

use crate::inventory::CapabilityObservation;
use crate::metadata::Metadata;
use crate::status::SyncStatus;

/// A hardware instance type offered by one or more Sites.
#[derive(Debug, Clone)]
pub struct InstanceType {
    pub id: InstanceTypeId,
    pub metadata: Metadata,
    pub status: SyncStatus,
    /// Provider namespace the type was registered under.
    pub infrastructure_provider_id: Option<String>,
    /// For types auto-created from a Site inventory this is the Site id.
    pub created_by: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for InstanceType {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let labels: sqlx::types::Json<HashMap<String, String>> = row.try_get("metadata_labels")?;
        let status: String = row.try_get("status")?;
        Ok(InstanceType {
            id: row.try_get("id")?,
            metadata: Metadata {
                name: row.try_get("metadata_name")?,
                description: row.try_get("metadata_description")?,
                labels: labels.0,
            },
            status: SyncStatus::from_str(&status).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            infrastructure_provider_id: row.try_get("infrastructure_provider_id")?,
            created_by: row.try_get("created_by")?,
            created: row.try_get("created")?,
            updated: row.try_get("updated")?,
        })
    }
}

/// One capability record of an instance type, ordered by `index`.
///
/// Capabilities are not independently mutable: any change re-creates the row.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct MachineCapability {
    pub instance_type_id: InstanceTypeId,
    pub index: i32,
    pub name: String,
    pub value: String,
}

impl MachineCapability {
    /// Whether a reported capability matches this record.
    pub fn matches(&self, observed: &CapabilityObservation) -> bool {
        self.index == observed.index && self.name == observed.name && self.value == observed.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_match_is_field_exact() {
        let capability = MachineCapability {
            instance_type_id: InstanceTypeId::new_v4(),
            index: 0,
            name: "gpu.count".to_string(),
            value: "8".to_string(),
        };
        let mut observed = CapabilityObservation {
            index: 0,
            name: "gpu.count".to_string(),
            value: "8".to_string(),
        };
        assert!(capability.matches(&observed));
        observed.value = "4".to_string();
        assert!(!capability.matches(&observed));
    }
}
