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

//! Inventory snapshot payloads that Site agents push to the cloud.
//!
//! The envelope shape is identical across resource types: a type-specific
//! item list, the snapshot timestamp, an overall status, and (for large
//! snapshots) pagination with the union item-id list across all pages.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use mac_address::MacAddress;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::network_security_group::NsgPropagationDetails;

/// Whether the Site agent considers the snapshot complete and trustworthy.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InventoryStatus {
    Success,
    Failed,
}

/// Pagination info for multi-page snapshots.
///
/// `item_ids` spans *all* items across all pages, so absence detection is
/// valid from page 1 even though per-item mutation happens per page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryPage {
    pub current_page: u32,
    pub total_pages: u32,
    pub page_size: u32,
    pub total_items: u32,
    pub item_ids: Vec<String>,
}

/// Lifecycle status the Site reports for an object it manages on our behalf.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectStatus {
    #[serde(rename = "OBJECT_STATUS_PENDING")]
    Pending,
    #[serde(rename = "OBJECT_STATUS_CREATED")]
    Created,
    #[serde(rename = "OBJECT_STATUS_UPDATED")]
    Updated,
    #[serde(rename = "OBJECT_STATUS_DELETING")]
    Deleting,
    #[serde(rename = "OBJECT_STATUS_ERROR")]
    Error,
}

/// The state of an Instance's tenant as the Site observes it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantState {
    Provisioning,
    Ready,
    Configuring,
    Terminating,
    Terminated,
    Failed,
    Updating,
    DpuReprovisioning,
    HostReprovisioning,
}

/// OS image state as reported by the Site's image service.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OsImageState {
    ImageUninitialized,
    ImageInProgress,
    ImageReady,
    ImageDisabled,
    ImageFailed,
}

/// Accessors shared by every inventory envelope. The reconcile engine only
/// needs these; the typed item lists stay on the concrete envelopes.
pub trait InventoryEnvelope {
    type Item;

    fn items(&self) -> &[Self::Item];
    fn timestamp(&self) -> DateTime<Utc>;
    fn status(&self) -> InventoryStatus;
    fn page(&self) -> Option<&InventoryPage>;

    /// An absent page means a single-installment snapshot; otherwise only
    /// the final page closes out the snapshot.
    fn is_terminal_page(&self) -> bool {
        self.page()
            .map(|p| p.current_page >= p.total_pages)
            .unwrap_or(true)
    }
}

macro_rules! impl_envelope {
    ($ty:ident, $item:ty, $field:ident) => {
        impl InventoryEnvelope for $ty {
            type Item = $item;

            fn items(&self) -> &[Self::Item] {
                &self.$field
            }
            fn timestamp(&self) -> DateTime<Utc> {
                self.timestamp
            }
            fn status(&self) -> InventoryStatus {
                self.inventory_status
            }
            fn page(&self) -> Option<&InventoryPage> {
                self.inventory_page.as_ref()
            }
        }
    };
}

// MARK: - Instances

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceInventory {
    #[serde(default)]
    pub instances: Vec<InstanceObservation>,
    pub timestamp: DateTime<Utc>,
    pub inventory_status: InventoryStatus,
    #[serde(default)]
    pub inventory_page: Option<InventoryPage>,
    /// Per-NSG propagation payloads, reported once per snapshot rather than
    /// per instance.
    #[serde(default)]
    pub network_security_group_propagations: Option<Vec<NsgPropagationReport>>,
}

impl_envelope!(InstanceInventory, InstanceObservation, instances);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NsgPropagationReport {
    pub network_security_group_id: Uuid,
    pub details: NsgPropagationDetails,
}

impl InstanceInventory {
    /// Builds the NSG-id → propagation map once per activity call.
    pub fn propagation_by_nsg(&self) -> HashMap<Uuid, &NsgPropagationDetails> {
        self.network_security_group_propagations
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|report| (report.network_security_group_id, &report.details))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceObservation {
    /// The cloud's id for the instance, echoed back by the Site.
    pub id: Option<Uuid>,
    /// The Site's native identifier, assigned when the Site creates the
    /// instance.
    #[serde(default)]
    pub controller_instance_id: Option<String>,
    #[serde(default)]
    pub object_status: Option<ObjectStatus>,
    #[serde(default)]
    pub tenant_state: Option<TenantState>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Option<HashMap<String, String>>,
    #[serde(default)]
    pub tpm_ek_certificate: Option<String>,
    /// Present while the Site has a pending update awaiting user approval.
    #[serde(default)]
    pub update: Option<UpdateObservation>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceObservation>,
    #[serde(default)]
    pub ib_interfaces: Vec<IbInterfaceObservation>,
    #[serde(default)]
    pub nvlink_interfaces: Vec<NvlinkInterfaceObservation>,
    #[serde(default)]
    pub extension_services: Vec<ExtensionServiceObservation>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateObservation {
    pub user_approval_received: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceObservation {
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub device_instance: Option<u32>,
    /// Virtual-function index; absent for physical functions.
    #[serde(default)]
    pub vf_id: Option<u32>,
    #[serde(default)]
    pub vpc_prefix_id: Option<Uuid>,
    #[serde(default)]
    pub network_segment_id: Option<Uuid>,
    #[serde(default)]
    pub status: Option<ObjectStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IbInterfaceObservation {
    pub ib_partition_id: Uuid,
    #[serde(default)]
    pub status: Option<ObjectStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NvlinkInterfaceObservation {
    pub nvl_logical_partition_id: Uuid,
    #[serde(default)]
    pub status: Option<ObjectStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionServiceObservation {
    pub extension_service_id: Uuid,
    #[serde(default)]
    pub status: Option<ObjectStatus>,
}

// MARK: - SSH key groups

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshKeyGroupInventory {
    #[serde(default)]
    pub ssh_key_groups: Vec<SshKeyGroupObservation>,
    pub timestamp: DateTime<Utc>,
    pub inventory_status: InventoryStatus,
    #[serde(default)]
    pub inventory_page: Option<InventoryPage>,
}

impl_envelope!(SshKeyGroupInventory, SshKeyGroupObservation, ssh_key_groups);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshKeyGroupObservation {
    pub id: Option<Uuid>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub object_status: Option<ObjectStatus>,
    #[serde(default)]
    pub error: Option<String>,
}

// MARK: - OS images

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsImageInventory {
    #[serde(default)]
    pub os_images: Vec<OsImageObservation>,
    pub timestamp: DateTime<Utc>,
    pub inventory_status: InventoryStatus,
    #[serde(default)]
    pub inventory_page: Option<InventoryPage>,
}

impl_envelope!(OsImageInventory, OsImageObservation, os_images);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsImageObservation {
    pub id: Option<Uuid>,
    #[serde(default)]
    pub state: Option<OsImageState>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// MARK: - Network security groups

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSecurityGroupInventory {
    #[serde(default)]
    pub network_security_groups: Vec<NetworkSecurityGroupObservation>,
    pub timestamp: DateTime<Utc>,
    pub inventory_status: InventoryStatus,
    #[serde(default)]
    pub inventory_page: Option<InventoryPage>,
}

impl_envelope!(
    NetworkSecurityGroupInventory,
    NetworkSecurityGroupObservation,
    network_security_groups
);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSecurityGroupObservation {
    pub id: Option<Uuid>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub object_status: Option<ObjectStatus>,
    #[serde(default)]
    pub propagation: Option<NsgPropagationDetails>,
    #[serde(default)]
    pub error: Option<String>,
}

// MARK: - Instance types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceTypeInventory {
    #[serde(default)]
    pub instance_types: Vec<InstanceTypeObservation>,
    pub timestamp: DateTime<Utc>,
    pub inventory_status: InventoryStatus,
    #[serde(default)]
    pub inventory_page: Option<InventoryPage>,
}

impl_envelope!(InstanceTypeInventory, InstanceTypeObservation, instance_types);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceTypeObservation {
    pub id: Option<Uuid>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub capabilities: Vec<CapabilityObservation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityObservation {
    pub index: i32,
    pub name: String,
    pub value: String,
}

// MARK: - InfiniBand partitions

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IbPartitionInventory {
    #[serde(default)]
    pub ib_partitions: Vec<IbPartitionObservation>,
    pub timestamp: DateTime<Utc>,
    pub inventory_status: InventoryStatus,
    #[serde(default)]
    pub inventory_page: Option<InventoryPage>,
}

impl_envelope!(IbPartitionInventory, IbPartitionObservation, ib_partitions);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IbPartitionObservation {
    pub id: Option<Uuid>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub object_status: Option<ObjectStatus>,
    #[serde(default)]
    pub error: Option<String>,
}

// MARK: - NVLink logical partitions

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NvlLogicalPartitionInventory {
    #[serde(default)]
    pub nvl_logical_partitions: Vec<NvlLogicalPartitionObservation>,
    pub timestamp: DateTime<Utc>,
    pub inventory_status: InventoryStatus,
    #[serde(default)]
    pub inventory_page: Option<InventoryPage>,
}

impl_envelope!(
    NvlLogicalPartitionInventory,
    NvlLogicalPartitionObservation,
    nvl_logical_partitions
);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NvlLogicalPartitionObservation {
    pub id: Option<Uuid>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub object_status: Option<ObjectStatus>,
    #[serde(default)]
    pub error: Option<String>,
}

// MARK: - Expected machines

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedMachineInventory {
    #[serde(default)]
    pub expected_machines: Vec<ExpectedMachineObservation>,
    pub timestamp: DateTime<Utc>,
    pub inventory_status: InventoryStatus,
    #[serde(default)]
    pub inventory_page: Option<InventoryPage>,
    /// BMC-MAC → discovered-machine links, reported once per snapshot.
    #[serde(default)]
    pub linked_machines: Option<Vec<LinkedMachineReport>>,
}

impl_envelope!(
    ExpectedMachineInventory,
    ExpectedMachineObservation,
    expected_machines
);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedMachineObservation {
    /// Cloud-generated identifier; the Site has no authority to invent these.
    pub id: Option<Uuid>,
    #[serde(default)]
    pub bmc_mac_address: Option<MacAddress>,
    #[serde(default)]
    pub chassis_serial_number: Option<String>,
    #[serde(default)]
    pub fallback_dpu_serial_numbers: Vec<String>,
    #[serde(default)]
    pub sku_id: Option<String>,
    #[serde(default)]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedMachineReport {
    pub bmc_mac_address: MacAddress,
    pub machine_id: Uuid,
}

impl ExpectedMachineInventory {
    /// Builds the BMC-MAC → machine-id link map once per activity call.
    pub fn links_by_bmc_mac(&self) -> HashMap<MacAddress, Uuid> {
        self.linked_machines
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|link| (link.bmc_mac_address, link.machine_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_page_is_terminal() {
        let inventory = SshKeyGroupInventory {
            ssh_key_groups: vec![],
            timestamp: Utc::now(),
            inventory_status: InventoryStatus::Success,
            inventory_page: None,
        };
        assert!(inventory.is_terminal_page());
    }

    #[test]
    fn only_last_page_is_terminal() {
        let mut inventory = SshKeyGroupInventory {
            ssh_key_groups: vec![],
            timestamp: Utc::now(),
            inventory_status: InventoryStatus::Success,
            inventory_page: Some(InventoryPage {
                current_page: 1,
                total_pages: 2,
                page_size: 20,
                total_items: 34,
                item_ids: vec![],
            }),
        };
        assert!(!inventory.is_terminal_page());
        inventory.inventory_page.as_mut().unwrap().current_page = 2;
        assert!(inventory.is_terminal_page());
    }

    #[test]
    fn object_status_wire_names() {
        let status: ObjectStatus = serde_json::from_str("\"OBJECT_STATUS_CREATED\"").unwrap();
        assert_eq!(status, ObjectStatus::Created);
        let state: TenantState = serde_json::from_str("\"DPU_REPROVISIONING\"").unwrap();
        assert_eq!(state, TenantState::DpuReprovisioning);
    }
}
