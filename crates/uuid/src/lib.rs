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

//! Strongly typed UUIDs for all entities managed by the Anvil control plane.
//!
//! Every entity kind gets its own `...Id` alias over [`typed_uuids::TypedUuid`]
//! so that IDs of different kinds can never be mixed up at compile time.

pub mod typed_uuids;

use typed_uuids::{TypedUuid, UuidSubtype};

#[derive(thiserror::Error, Debug)]
pub enum UuidConversionError {
    #[error("Invalid UUID for {ty}: {value}")]
    InvalidUuid { ty: &'static str, value: String },
    #[error("Missing ID for {0}")]
    MissingId(&'static str),
    #[error("UUID parse error: {0}")]
    UuidError(#[from] uuid::Error),
}

macro_rules! entity_id {
    ($(#[$doc:meta])* $marker:ident, $alias:ident, $name:literal) => {
        $(#[$doc])*
        pub struct $marker;

        impl UuidSubtype for $marker {
            const TYPE_NAME: &'static str = $name;
        }

        $(#[$doc])*
        pub type $alias = TypedUuid<$marker>;
    };
}

entity_id!(
    /// Identifies a remote Site that inventories are received from.
    SiteIdMarker, SiteId, "Site"
);
entity_id!(
    /// Identifies a tenant Instance.
    InstanceIdMarker, InstanceId, "Instance"
);
entity_id!(
    /// Identifies an ethernet interface attached to an Instance.
    InterfaceIdMarker, InterfaceId, "Interface"
);
entity_id!(
    /// Identifies an InfiniBand interface attached to an Instance.
    IbInterfaceIdMarker, IbInterfaceId, "InfiniBandInterface"
);
entity_id!(
    /// Identifies an NVLink interface attached to an Instance.
    NvlinkInterfaceIdMarker, NvlinkInterfaceId, "NvLinkInterface"
);
entity_id!(
    /// Identifies a DPU extension service deployment on an Instance.
    ExtensionServiceDeploymentIdMarker,
    ExtensionServiceDeploymentId,
    "DpuExtensionServiceDeployment"
);
entity_id!(
    /// Identifies an SSH key group.
    SshKeyGroupIdMarker, SshKeyGroupId, "SshKeyGroup"
);
entity_id!(
    /// Identifies a single SSH key within a key group.
    SshKeyIdMarker, SshKeyId, "SshKey"
);
entity_id!(
    /// Identifies an operating system image.
    OsImageIdMarker, OsImageId, "OsImage"
);
entity_id!(
    /// Identifies a network security group.
    NetworkSecurityGroupIdMarker, NetworkSecurityGroupId, "NetworkSecurityGroup"
);
entity_id!(
    /// Identifies an instance type.
    InstanceTypeIdMarker, InstanceTypeId, "InstanceType"
);
entity_id!(
    /// Identifies an InfiniBand partition.
    IbPartitionIdMarker, IbPartitionId, "InfiniBandPartition"
);
entity_id!(
    /// Identifies an NVLink logical partition.
    NvlLogicalPartitionIdMarker, NvlLogicalPartitionId, "NvLinkLogicalPartition"
);
entity_id!(
    /// Identifies a physical machine discovered at a Site.
    MachineIdMarker, MachineId, "Machine"
);
entity_id!(
    /// Identifies an expected (pre-registered) machine.
    ExpectedMachineIdMarker, ExpectedMachineId, "ExpectedMachine"
);
entity_id!(
    /// Identifies a per-(resource, Site) association row.
    SiteAssociationIdMarker, SiteAssociationId, "SiteAssociation"
);
entity_id!(
    /// Identifies a DPU extension service definition.
    ExtensionServiceIdMarker, ExtensionServiceId, "DpuExtensionService"
);
entity_id!(
    /// Identifies a VPC prefix used by pure-FNN interfaces.
    VpcPrefixIdMarker, VpcPrefixId, "VpcPrefix"
);
entity_id!(
    /// Identifies a network segment backing a segment-attached interface.
    NetworkSegmentIdMarker, NetworkSegmentId, "NetworkSegment"
);
entity_id!(
    /// Identifies a subnet referenced by instance interfaces.
    SubnetIdMarker, SubnetId, "Subnet"
);
