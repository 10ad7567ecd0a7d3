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

use anvil_uuid::{
    ExtensionServiceDeploymentId, ExtensionServiceId, IbInterfaceId, IbPartitionId, InstanceId,
    InterfaceId, MachineId, NetworkSecurityGroupId, NetworkSegmentId, NvlLogicalPartitionId,
    NvlinkInterfaceId, SiteId, VpcPrefixId,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

use crate::inventory::InterfaceObservation;
use crate::metadata::Metadata;
use crate::network_security_group::NsgPropagationDetails;
use crate::status::{ChildStatus, InstanceStatus, PowerStatus};

/// A tenant instance as intended by the cloud and observed via inventories.
#[derive(Debug, Clone)]
pub struct Instance {
    pub id: InstanceId,
    pub site_id: SiteId,
    pub metadata: Metadata,
    pub status: InstanceStatus,
    /// User-visible generation of the instance config.
    pub version: String,
    /// The Site's native identifier. Set exactly once, when the Site first
    /// acknowledges creation, and immutable afterwards.
    pub controller_instance_id: Option<String>,
    pub is_missing_on_site: bool,
    /// Set while the Site holds an update awaiting user approval.
    pub is_update_pending: bool,
    pub tpm_ek_certificate: Option<String>,
    pub network_security_group_id: Option<NetworkSecurityGroupId>,
    pub nsg_propagation: Option<NsgPropagationDetails>,
    pub power_status: PowerStatus,
    pub machine_id: Option<MachineId>,
    /// Soft-delete marker; set when the instance row is removed from the
    /// user's view.
    pub deleted: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for Instance {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let labels: sqlx::types::Json<HashMap<String, String>> = row.try_get("metadata_labels")?;
        let status: String = row.try_get("status")?;
        let power_status: String = row.try_get("power_status")?;
        let nsg_propagation: Option<sqlx::types::Json<NsgPropagationDetails>> =
            row.try_get("nsg_propagation")?;

        Ok(Instance {
            id: row.try_get("id")?,
            site_id: row.try_get("site_id")?,
            metadata: Metadata {
                name: row.try_get("metadata_name")?,
                description: row.try_get("metadata_description")?,
                labels: labels.0,
            },
            status: InstanceStatus::from_str(&status)
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            version: row.try_get("version")?,
            controller_instance_id: row.try_get("controller_instance_id")?,
            is_missing_on_site: row.try_get("is_missing_on_site")?,
            is_update_pending: row.try_get("is_update_pending")?,
            tpm_ek_certificate: row.try_get("tpm_ek_certificate")?,
            network_security_group_id: row.try_get("network_security_group_id")?,
            nsg_propagation: nsg_propagation.map(|json| json.0),
            power_status: PowerStatus::from_str(&power_status)
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            machine_id: row.try_get("machine_id")?,
            deleted: row.try_get("deleted")?,
            created: row.try_get("created")?,
            updated: row.try_get("updated")?,
        })
    }
}

/// An ethernet interface attached to an Instance.
///
/// Deletion is two-phase: a user action marks the row `deleting`, and the
/// row is physically removed only after inventory confirms the parent
/// instance has reached `ready`.
#[derive(Debug, Clone)]
pub struct Interface {
    pub id: InterfaceId,
    pub instance_id: InstanceId,
    pub status: ChildStatus,
    pub device: Option<String>,
    pub device_instance: Option<i32>,
    /// Virtual-function index; absent for physical functions.
    pub vf_id: Option<i32>,
    pub vpc_prefix_id: Option<VpcPrefixId>,
    pub network_segment_id: Option<NetworkSegmentId>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for Interface {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        Ok(Interface {
            id: row.try_get("id")?,
            instance_id: row.try_get("instance_id")?,
            status: ChildStatus::from_str(&status).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            device: row.try_get("device")?,
            device_instance: row.try_get("device_instance")?,
            vf_id: row.try_get("vf_id")?,
            vpc_prefix_id: row.try_get("vpc_prefix_id")?,
            network_segment_id: row.try_get("network_segment_id")?,
            created: row.try_get("created")?,
            updated: row.try_get("updated")?,
        })
    }
}

/// Identity of an ethernet interface within one instance.
///
/// Mixed FNN + multi-DPU interfaces key on the composite
/// `device-deviceInstance-physical|virtual-vfID`; a pure FNN interface keys
/// on its VpcPrefix; a segment-backed interface keys on its NetworkSegment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InterfaceKey {
    Composite(String),
    VpcPrefix(VpcPrefixId),
    NetworkSegment(NetworkSegmentId),
}

fn composite_key(device: &str, device_instance: i64, vf_id: Option<i64>) -> String {
    match vf_id {
        Some(vf_id) => format!("{device}-{device_instance}-virtual-{vf_id}"),
        None => format!("{device}-{device_instance}-physical-0"),
    }
}

impl Interface {
    pub fn key(&self) -> Option<InterfaceKey> {
        if let Some(segment) = self.network_segment_id {
            return Some(InterfaceKey::NetworkSegment(segment));
        }
        if let Some(device) = self.device.as_deref() {
            return Some(InterfaceKey::Composite(composite_key(
                device,
                self.device_instance.unwrap_or(0) as i64,
                self.vf_id.map(|vf| vf as i64),
            )));
        }
        self.vpc_prefix_id.map(InterfaceKey::VpcPrefix)
    }
}

impl InterfaceKey {
    pub fn from_observation(observation: &InterfaceObservation) -> Option<Self> {
        if let Some(segment) = observation.network_segment_id {
            return Some(InterfaceKey::NetworkSegment(segment.into()));
        }
        if let Some(device) = observation.device.as_deref() {
            return Some(InterfaceKey::Composite(composite_key(
                device,
                observation.device_instance.unwrap_or(0) as i64,
                observation.vf_id.map(|vf| vf as i64),
            )));
        }
        observation
            .vpc_prefix_id
            .map(|prefix| InterfaceKey::VpcPrefix(prefix.into()))
    }
}

/// An InfiniBand interface attached to an Instance.
#[derive(Debug, Clone)]
pub struct IbInterface {
    pub id: IbInterfaceId,
    pub instance_id: InstanceId,
    pub ib_partition_id: IbPartitionId,
    pub status: ChildStatus,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for IbInterface {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        Ok(IbInterface {
            id: row.try_get("id")?,
            instance_id: row.try_get("instance_id")?,
            ib_partition_id: row.try_get("ib_partition_id")?,
            status: ChildStatus::from_str(&status).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            created: row.try_get("created")?,
            updated: row.try_get("updated")?,
        })
    }
}

/// An NVLink interface attached to an Instance.
#[derive(Debug, Clone)]
pub struct NvlinkInterface {
    pub id: NvlinkInterfaceId,
    pub instance_id: InstanceId,
    pub nvl_logical_partition_id: NvlLogicalPartitionId,
    pub status: ChildStatus,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for NvlinkInterface {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        Ok(NvlinkInterface {
            id: row.try_get("id")?,
            instance_id: row.try_get("instance_id")?,
            nvl_logical_partition_id: row.try_get("nvl_logical_partition_id")?,
            status: ChildStatus::from_str(&status).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            created: row.try_get("created")?,
            updated: row.try_get("updated")?,
        })
    }
}

/// A DPU extension service deployment on an Instance.
#[derive(Debug, Clone)]
pub struct ExtensionServiceDeployment {
    pub id: ExtensionServiceDeploymentId,
    pub instance_id: InstanceId,
    pub extension_service_id: ExtensionServiceId,
    pub status: ChildStatus,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for ExtensionServiceDeployment {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        Ok(ExtensionServiceDeployment {
            id: row.try_get("id")?,
            instance_id: row.try_get("instance_id")?,
            extension_service_id: row.try_get("extension_service_id")?,
            status: ChildStatus::from_str(&status).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            created: row.try_get("created")?,
            updated: row.try_get("updated")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation() -> InterfaceObservation {
        InterfaceObservation {
            device: None,
            device_instance: None,
            vf_id: None,
            vpc_prefix_id: None,
            network_segment_id: None,
            status: None,
        }
    }

    #[test]
    fn composite_key_for_multi_dpu_interfaces() {
        let mut obs = observation();
        obs.device = Some("mlx5_0".to_string());
        obs.device_instance = Some(1);
        obs.vf_id = Some(3);
        assert_eq!(
            InterfaceKey::from_observation(&obs),
            Some(InterfaceKey::Composite("mlx5_0-1-virtual-3".to_string()))
        );

        obs.vf_id = None;
        assert_eq!(
            InterfaceKey::from_observation(&obs),
            Some(InterfaceKey::Composite("mlx5_0-1-physical-0".to_string()))
        );
    }

    #[test]
    fn pure_fnn_interface_keys_on_vpc_prefix() {
        let prefix = uuid::Uuid::new_v4();
        let mut obs = observation();
        obs.vpc_prefix_id = Some(prefix);
        assert_eq!(
            InterfaceKey::from_observation(&obs),
            Some(InterfaceKey::VpcPrefix(prefix.into()))
        );
    }

    #[test]
    fn segment_backed_interface_keys_on_segment() {
        let segment = uuid::Uuid::new_v4();
        let mut obs = observation();
        // Segment wins even when device information is present.
        obs.device = Some("mlx5_0".to_string());
        obs.network_segment_id = Some(segment);
        assert_eq!(
            InterfaceKey::from_observation(&obs),
            Some(InterfaceKey::NetworkSegment(segment.into()))
        );
    }

    #[test]
    fn unkeyable_observation_yields_none() {
        assert_eq!(InterfaceKey::from_observation(&observation()), None);
    }

    #[test]
    fn cloud_row_and_observation_keys_align() {
        let row = Interface {
            id: InterfaceId::new_v4(),
            instance_id: InstanceId::new_v4(),
            status: ChildStatus::Ready,
            device: Some("mlx5_1".to_string()),
            device_instance: Some(0),
            vf_id: Some(7),
            vpc_prefix_id: None,
            network_segment_id: None,
            created: Utc::now(),
            updated: Utc::now(),
        };
        let mut obs = observation();
        obs.device = Some("mlx5_1".to_string());
        obs.device_instance = Some(0);
        obs.vf_id = Some(7);
        assert_eq!(row.key(), InterfaceKey::from_observation(&obs));
    }
}
