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

//! Reconciliation of an instance's child objects: ethernet interfaces,
//! InfiniBand interfaces, NVLink interfaces and DPU extension service
//! deployments.
//!
//! Child updates are deliberately non-transactional with each other: a
//! failed child write is logged and the loop continues, so one bad row
//! cannot hold back the rest of the page.

use std::collections::HashMap;

use model::instance::{Instance, InterfaceKey};
use model::inventory::{InstanceObservation, ObjectStatus};
use model::status::ChildStatus;

use crate::activity::ActivityContext;
use crate::ActivityResult;

/// Maps the Site's object status to a child row status.
fn child_status(status: ObjectStatus) -> ChildStatus {
    match status {
        ObjectStatus::Pending => ChildStatus::Pending,
        ObjectStatus::Created | ObjectStatus::Updated => ChildStatus::Ready,
        ObjectStatus::Deleting => ChildStatus::Deleting,
        ObjectStatus::Error => ChildStatus::Error,
    }
}

pub(super) async fn reconcile_children(
    ctx: &ActivityContext,
    instance: &Instance,
    entry: &InstanceObservation,
    instance_ready: bool,
) -> ActivityResult<()> {
    let mut conn = ctx
        .pool
        .acquire()
        .await
        .map_err(|err| db::DatabaseError::new("acquire connection", err))?;

    // MARK: ethernet
    let interfaces = db::interface::find_by_instance(&mut conn, instance.id).await?;
    let mut observed_eth: HashMap<InterfaceKey, ObjectStatus> = HashMap::new();
    for obs in &entry.interfaces {
        match InterfaceKey::from_observation(obs) {
            Some(key) => {
                if let Some(status) = obs.status {
                    observed_eth.insert(key, status);
                }
            }
            None => {
                tracing::warn!(instance = %instance.id, "unkeyable interface observation, skipping");
            }
        }
    }

    for interface in &interfaces {
        let Some(key) = interface.key() else {
            tracing::warn!(interface = %interface.id, "unkeyable interface row, skipping");
            continue;
        };

        if interface.status == ChildStatus::Deleting {
            // Two-phase delete: keep the row visible until the parent has
            // settled back to ready after the removal.
            if instance_ready {
                if let Err(err) = db::interface::delete(&mut conn, interface.id).await {
                    tracing::warn!(interface = %interface.id, %err, "failed to delete interface");
                }
            }
            continue;
        }

        if let Some(&status) = observed_eth.get(&key) {
            let new_status = child_status(status);
            if new_status != interface.status
                && let Err(err) =
                    db::interface::update_status(&mut conn, interface.id, new_status).await
            {
                tracing::warn!(interface = %interface.id, %err, "failed to update interface status");
            }
        }
    }

    // MARK: infiniband
    let ib_interfaces = db::ib_interface::find_by_instance(&mut conn, instance.id).await?;
    let observed_ib: HashMap<uuid::Uuid, ObjectStatus> = entry
        .ib_interfaces
        .iter()
        .filter_map(|obs| obs.status.map(|status| (obs.ib_partition_id, status)))
        .collect();

    for interface in &ib_interfaces {
        if interface.status == ChildStatus::Deleting {
            if instance_ready
                && let Err(err) = db::ib_interface::delete(&mut conn, interface.id).await
            {
                tracing::warn!(interface = %interface.id, %err, "failed to delete IB interface");
            }
            continue;
        }

        if let Some(&status) = observed_ib.get(&interface.ib_partition_id.as_uuid()) {
            let new_status = child_status(status);
            if new_status != interface.status
                && let Err(err) =
                    db::ib_interface::update_status(&mut conn, interface.id, new_status).await
            {
                tracing::warn!(interface = %interface.id, %err, "failed to update IB interface status");
            }
        }
    }

    // MARK: nvlink
    let nvlink_interfaces = db::nvlink_interface::find_by_instance(&mut conn, instance.id).await?;
    let observed_nvl: HashMap<uuid::Uuid, ObjectStatus> = entry
        .nvlink_interfaces
        .iter()
        .filter_map(|obs| {
            obs.status
                .map(|status| (obs.nvl_logical_partition_id, status))
        })
        .collect();

    for interface in &nvlink_interfaces {
        if interface.status == ChildStatus::Deleting {
            // NVLink deletes carry an extra stale-inventory guard: a freshly
            // marked row may not be visible in this snapshot yet.
            let fresh = ctx
                .freshness
                .is_within_stale_inventory_threshold(interface.updated);
            if instance_ready
                && !fresh
                && let Err(err) = db::nvlink_interface::delete(&mut conn, interface.id).await
            {
                tracing::warn!(interface = %interface.id, %err, "failed to delete NVLink interface");
            }
            continue;
        }

        if let Some(&status) = observed_nvl.get(&interface.nvl_logical_partition_id.as_uuid()) {
            let new_status = child_status(status);
            if new_status != interface.status
                && let Err(err) =
                    db::nvlink_interface::update_status(&mut conn, interface.id, new_status).await
            {
                tracing::warn!(interface = %interface.id, %err, "failed to update NVLink interface status");
            }
        }
    }

    // MARK: extension services
    let deployments =
        db::extension_service::find_deployments_by_instance(&mut conn, instance.id).await?;
    let observed_ext: HashMap<uuid::Uuid, ObjectStatus> = entry
        .extension_services
        .iter()
        .filter_map(|obs| obs.status.map(|status| (obs.extension_service_id, status)))
        .collect();

    for deployment in &deployments {
        if deployment.status == ChildStatus::Deleting {
            // Same stale-inventory guard as NVLink deletes.
            let fresh = ctx
                .freshness
                .is_within_stale_inventory_threshold(deployment.updated);
            if instance_ready
                && !fresh
                && let Err(err) =
                    db::extension_service::delete_deployment(&mut conn, deployment.id).await
            {
                tracing::warn!(deployment = %deployment.id, %err, "failed to delete extension service deployment");
            }
            continue;
        }

        if let Some(&status) = observed_ext.get(&deployment.extension_service_id.as_uuid()) {
            let new_status = child_status(status);
            if new_status != deployment.status
                && let Err(err) = db::extension_service::update_deployment_status(
                    &mut conn,
                    deployment.id,
                    new_status,
                )
                .await
            {
                tracing::warn!(deployment = %deployment.id, %err, "failed to update extension service status");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_status_maps_to_child_status() {
        assert_eq!(child_status(ObjectStatus::Created), ChildStatus::Ready);
        assert_eq!(child_status(ObjectStatus::Updated), ChildStatus::Ready);
        assert_eq!(child_status(ObjectStatus::Pending), ChildStatus::Pending);
        assert_eq!(child_status(ObjectStatus::Deleting), ChildStatus::Deleting);
        assert_eq!(child_status(ObjectStatus::Error), ChildStatus::Error);
    }
}
