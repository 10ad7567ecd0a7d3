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

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::inventory::TenantState;

/// The aggregated synchronization status of a cloud-intent resource, and of
/// its per-Site associations.
///
/// Parent resources aggregate their association statuses via the rollup
/// (`synced` on the parent is surfaced to users as "ready").
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Syncing,
    Synced,
    Error,
    Deleting,
}

impl SyncStatus {
    /// Whether a resource in this status may still receive outbound pushes
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Deleting)
    }
}

/// The lifecycle status of an Instance as tracked by the cloud.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Pending,
    Provisioning,
    Configuring,
    Ready,
    Updating,
    Terminating,
    Terminated,
    Error,
}

impl InstanceStatus {
    /// Maps the tenant state a Site reports to the cloud-side status.
    pub fn from_tenant_state(state: TenantState) -> Self {
        match state {
            TenantState::Provisioning => InstanceStatus::Provisioning,
            TenantState::Ready => InstanceStatus::Ready,
            TenantState::Configuring => InstanceStatus::Configuring,
            TenantState::Terminating => InstanceStatus::Terminating,
            TenantState::Terminated => InstanceStatus::Terminated,
            TenantState::Failed => InstanceStatus::Error,
            TenantState::Updating
            | TenantState::DpuReprovisioning
            | TenantState::HostReprovisioning => InstanceStatus::Updating,
        }
    }
}

/// Power status of an Instance's underlying host.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PowerStatus {
    Unknown,
    PoweredOff,
    PoweredOn,
    BootCompleted,
}

/// Status of a child object of an Instance (interface, extension service).
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChildStatus {
    Pending,
    Ready,
    Error,
    Deleting,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_state_mapping() {
        assert_eq!(
            InstanceStatus::from_tenant_state(TenantState::Provisioning),
            InstanceStatus::Provisioning
        );
        assert_eq!(
            InstanceStatus::from_tenant_state(TenantState::Ready),
            InstanceStatus::Ready
        );
        assert_eq!(
            InstanceStatus::from_tenant_state(TenantState::Failed),
            InstanceStatus::Error
        );
        for state in [
            TenantState::Updating,
            TenantState::DpuReprovisioning,
            TenantState::HostReprovisioning,
        ] {
            assert_eq!(
                InstanceStatus::from_tenant_state(state),
                InstanceStatus::Updating
            );
        }
    }

    #[test]
    fn status_strings_are_stable() {
        // These strings are persisted in the database and in the
        // status-detail journal. Changing them breaks journal dedupe.
        assert_eq!(SyncStatus::Synced.to_string(), "synced");
        assert_eq!(InstanceStatus::Terminating.to_string(), "terminating");
        assert_eq!("deleting".parse::<SyncStatus>().unwrap(), SyncStatus::Deleting);
    }
}
