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

use anvil_uuid::NetworkSecurityGroupId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

use crate::metadata::Metadata;
use crate::status::SyncStatus;

/// A network security group as intended by the cloud.
#[derive(Debug, Clone)]
pub struct NetworkSecurityGroup {
    pub id: NetworkSecurityGroupId,
    pub metadata: Metadata,
    /// User-visible generation of the rule set.
    pub version: String,
    pub status: SyncStatus,
    pub rules: serde_json::Value,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for NetworkSecurityGroup {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let labels: sqlx::types::Json<HashMap<String, String>> = row.try_get("metadata_labels")?;
        let status: String = row.try_get("status")?;

        Ok(NetworkSecurityGroup {
            id: row.try_get("id")?,
            metadata: Metadata {
                name: row.try_get("metadata_name")?,
                description: row.try_get("metadata_description")?,
                labels: labels.0,
            },
            version: row.try_get("version")?,
            status: SyncStatus::from_str(&status)
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            rules: row.try_get("rules")?,
            created: row.try_get("created")?,
            updated: row.try_get("updated")?,
        })
    }
}

/// How far a security group's rules have been distributed on a Site.
///
/// The discriminants are part of the wire contract with the Site agent.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i32)]
pub enum PropagationStatus {
    Unknown = 0,
    Pending = 1,
    InProgress = 2,
    Propagated = 3,
    Failed = 4,
}

/// Site-reported status of a security group's distribution to instances.
///
/// This is the largest single update hotspot, so the comparator below is
/// consulted before every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsgPropagationDetails {
    pub status: PropagationStatus,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub unpropagated_instance_ids: Vec<String>,
    #[serde(default)]
    pub related_instance_ids: Vec<String>,
}

/// Deep equality on propagation payloads.
///
/// The ID sequences are compared order-sensitively; the Site returns them in
/// a stable order.
pub fn propagation_details_equal(
    a: Option<&NsgPropagationDetails>,
    b: Option<&NsgPropagationDetails>,
) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            a.status == b.status
                && a.details == b.details
                && a.unpropagated_instance_ids == b.unpropagated_instance_ids
                && a.related_instance_ids == b.related_instance_ids
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details() -> NsgPropagationDetails {
        NsgPropagationDetails {
            status: PropagationStatus::InProgress,
            details: Some("2 of 4 instances".to_string()),
            unpropagated_instance_ids: vec!["i-1".into(), "i-2".into()],
            related_instance_ids: vec!["i-1".into(), "i-2".into(), "i-3".into(), "i-4".into()],
        }
    }

    #[test]
    fn equal_payloads_compare_equal() {
        assert!(propagation_details_equal(Some(&details()), Some(&details())));
        assert!(propagation_details_equal(None, None));
    }

    #[test]
    fn nil_mismatch_is_unequal() {
        assert!(!propagation_details_equal(Some(&details()), None));
        assert!(!propagation_details_equal(None, Some(&details())));
    }

    #[test]
    fn id_order_is_significant() {
        let mut reordered = details();
        reordered.unpropagated_instance_ids.reverse();
        assert!(!propagation_details_equal(Some(&details()), Some(&reordered)));
    }

    #[test]
    fn details_string_is_nil_sensitive() {
        let mut cleared = details();
        cleared.details = None;
        assert!(!propagation_details_equal(Some(&details()), Some(&cleared)));
    }

    #[test]
    fn status_discriminants_are_stable() {
        assert_eq!(PropagationStatus::Propagated as i32, 3);
        assert_eq!(PropagationStatus::Failed as i32, 4);
    }
}
