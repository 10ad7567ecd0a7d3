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

//! The instance reconciler.
//!
//! The largest of the reconcile activities. Shares the freshness and paging
//! rules with the template but adds controller-ID assignment, NSG
//! propagation attach/clear, interface reconciliation, metadata sync-out,
//! the update-pending flag, power status, lifecycle events and the cascading
//! delete of orphaned terminating instances.

mod interfaces;
pub mod terminate;

use std::collections::{HashMap, HashSet};

use anvil_uuid::SiteId;
use db::instance::InstanceInventoryUpdate;
use db::ColumnUpdate;
use model::instance::Instance;
use model::inventory::{
    InstanceInventory, InstanceObservation, InventoryEnvelope, InventoryStatus, ObjectStatus,
};
use model::lifecycle::{LifecycleEvent, LifecycleEventKind};
use model::messages;
use model::network_security_group::{NsgPropagationDetails, propagation_details_equal};
use model::site::Site;
use model::status::{InstanceStatus, PowerStatus};
use uuid::Uuid;

use crate::activity::ActivityContext;
use crate::dispatch;
use crate::reconcile::freshness::row_updated_after_snapshot;
use crate::{ActivityError, ActivityResult};

/// Reconciles one instance inventory page for one Site.
///
/// Returns the lifecycle events observed in this call; the workflow feeds
/// them to the metrics recorder as a separate activity.
pub async fn update_instances_in_db(
    ctx: &ActivityContext,
    site_id: SiteId,
    inventory: Option<InstanceInventory>,
) -> ActivityResult<Vec<LifecycleEvent>> {
    let inventory = inventory.ok_or_else(|| {
        ActivityError::InvalidInput(format!("nil instance inventory for {site_id}"))
    })?;

    let mut conn = ctx
        .pool
        .acquire()
        .await
        .map_err(|err| db::DatabaseError::new("acquire connection", err))?;

    let site = db::site::must_find_by_id(&mut conn, site_id)
        .await
        .map_err(|err| {
            if err.is_not_found() {
                ActivityError::SiteNotFound(site_id)
            } else {
                err.into()
            }
        })?;

    if inventory.status() == InventoryStatus::Failed {
        tracing::info!(site = %site_id, "instance snapshot reported FAILED, skipping reconciliation");
        return Ok(Vec::new());
    }

    let instances = db::instance::find_by_site(&mut conn, site_id).await?;
    drop(conn);

    let propagation_by_nsg: HashMap<Uuid, NsgPropagationDetails> = inventory
        .propagation_by_nsg()
        .into_iter()
        .map(|(id, details)| (id, details.clone()))
        .collect();

    let mut by_cloud_id: HashMap<String, usize> = HashMap::new();
    let mut by_controller_id: HashMap<String, usize> = HashMap::new();
    for (index, instance) in instances.iter().enumerate() {
        by_cloud_id.insert(instance.id.to_string(), index);
        if let Some(controller_id) = instance.controller_instance_id.as_deref() {
            by_controller_id.insert(controller_id.to_string(), index);
        }
    }

    let mut reported: HashSet<String> = inventory
        .page()
        .map(|page| page.item_ids.iter().cloned().collect())
        .unwrap_or_default();
    for entry in &inventory.instances {
        if let Some(id) = entry.id {
            reported.insert(id.to_string());
        }
        if let Some(controller_id) = entry.controller_instance_id.as_deref() {
            reported.insert(controller_id.to_string());
        }
    }

    let mut events = Vec::new();

    for entry in &inventory.instances {
        ctx.check_cancelled()?;

        let index = entry
            .controller_instance_id
            .as_deref()
            .and_then(|id| by_controller_id.get(id).copied())
            .or_else(|| {
                entry
                    .id
                    .and_then(|id| by_cloud_id.get(&id.to_string()).copied())
            });

        let Some(instance) = index.map(|index| &instances[index]) else {
            tracing::warn!(
                site = %site_id,
                cloud_id = ?entry.id,
                controller_id = ?entry.controller_instance_id,
                "instance entry does not match any cloud row, skipping"
            );
            continue;
        };

        // Whole-entry freshness guard, not just for deletes: a user write
        // newer than the snapshot wins over everything in this entry.
        if row_updated_after_snapshot(instance.updated, inventory.timestamp) {
            tracing::debug!(site = %site_id, instance = %instance.id, "row newer than snapshot, skipping entry");
            continue;
        }

        match apply_entry(ctx, &site, instance, entry, &propagation_by_nsg).await {
            Ok(Some(event)) => events.push(event),
            Ok(None) => {}
            // Deterministic input defects and cancellation fail the whole
            // activity; everything else is per-entry.
            Err(err @ (ActivityError::InvalidInput(_) | ActivityError::Cancelled)) => {
                return Err(err);
            }
            Err(err) => {
                tracing::warn!(site = %site_id, instance = %instance.id, %err, "failed to apply instance entry");
            }
        }
    }

    if inventory.is_terminal_page() {
        for instance in &instances {
            let is_reported = reported.contains(&instance.id.to_string())
                || instance
                    .controller_instance_id
                    .as_deref()
                    .is_some_and(|id| reported.contains(id));
            if is_reported {
                continue;
            }

            ctx.check_cancelled()?;
            match handle_absent_instance(ctx, &site, instance).await {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(err @ ActivityError::Cancelled) => return Err(err),
                Err(err) => {
                    tracing::warn!(site = %site_id, instance = %instance.id, %err, "failed to handle unreported instance");
                }
            }
        }
    }

    Ok(events)
}

/// What one inventory entry does to one instance row.
#[derive(Debug, Default)]
struct EntryPlan {
    update: InstanceInventoryUpdate,
    /// `(status, message)` journal entries, deduped against the latest on
    /// write.
    journal: Vec<(String, String)>,
    /// Set when the Site first acknowledged creation.
    assign_controller_id: Option<String>,
    transitioned_to_ready: bool,
    metadata_divergent: bool,
}

/// Computes the full per-entry diff. Pure; the transaction applies it.
fn plan_entry(
    instance: &Instance,
    entry: &InstanceObservation,
    propagation_by_nsg: &HashMap<Uuid, NsgPropagationDetails>,
) -> ActivityResult<EntryPlan> {
    let mut plan = EntryPlan::default();

    // Controller ID assignment: populated the first time the Site reports
    // the object as created. A created response without the ID is malformed
    // and must fail the activity.
    if entry.object_status == Some(ObjectStatus::Created) {
        match entry.controller_instance_id.as_deref() {
            Some(controller_id) => {
                if instance.controller_instance_id.is_none() {
                    plan.assign_controller_id = Some(controller_id.to_string());
                }
            }
            None => {
                return Err(ActivityError::InvalidInput(format!(
                    "created instance {} reported without a controller instance id",
                    instance.id
                )));
            }
        }
    }

    let mut current_status = instance.status;
    if let Some(tenant_state) = entry.tenant_state {
        let new_status = InstanceStatus::from_tenant_state(tenant_state);
        if new_status != instance.status {
            plan.update.status = Some(new_status);
            plan.transitioned_to_ready = new_status == InstanceStatus::Ready;
            let message = match (new_status, entry.error.as_deref()) {
                (InstanceStatus::Error, Some(error)) => error.to_string(),
                _ => String::new(),
            };
            plan.journal.push((new_status.as_ref().to_string(), message));
            current_status = new_status;
        }
    }

    // An instance that has come up gets its power status settled.
    if current_status == InstanceStatus::Ready && instance.power_status != PowerStatus::BootCompleted
    {
        plan.update.power_status = Some(PowerStatus::BootCompleted);
    }

    let update_pending = entry
        .update
        .as_ref()
        .is_some_and(|update| !update.user_approval_received);
    if update_pending != instance.is_update_pending {
        plan.update.is_update_pending = Some(update_pending);
        if !update_pending {
            plan.journal.push((
                current_status.as_ref().to_string(),
                messages::UPDATES_APPLIED.to_string(),
            ));
        }
    }

    if let Some(certificate) = entry.tpm_ek_certificate.as_deref()
        && Some(certificate) != instance.tpm_ek_certificate.as_deref()
    {
        plan.update.tpm_ek_certificate = ColumnUpdate::Set(certificate.to_string());
    }

    if instance.is_missing_on_site {
        plan.update.is_missing_on_site = Some(false);
    }

    if let Some(nsg_id) = instance.network_security_group_id {
        match propagation_by_nsg.get(&nsg_id.as_uuid()) {
            Some(details) => {
                if !propagation_details_equal(instance.nsg_propagation.as_ref(), Some(details)) {
                    plan.update.nsg_propagation = ColumnUpdate::Set(details.clone());
                }
            }
            None => {
                // A nil write is "no update" to the DAO; clearing needs to
                // be explicit.
                if instance.nsg_propagation.is_some() {
                    plan.update.nsg_propagation = ColumnUpdate::Clear;
                }
            }
        }
    }

    plan.metadata_divergent = metadata_diverges(instance, entry);

    Ok(plan)
}

/// Whether the Site's reported metadata differs from cloud intent. The
/// cloud is authoritative for metadata; divergence triggers a sync-out.
fn metadata_diverges(instance: &Instance, entry: &InstanceObservation) -> bool {
    if let Some(name) = entry.name.as_deref()
        && name != instance.metadata.name
    {
        return true;
    }
    if let Some(description) = entry.description.as_deref()
        && description != instance.metadata.description
    {
        return true;
    }
    if let Some(labels) = entry.labels.as_ref()
        && *labels != instance.metadata.labels
    {
        return true;
    }
    false
}

async fn apply_entry(
    ctx: &ActivityContext,
    site: &Site,
    instance: &Instance,
    entry: &InstanceObservation,
    propagation_by_nsg: &HashMap<Uuid, NsgPropagationDetails>,
) -> ActivityResult<Option<LifecycleEvent>> {
    let plan = plan_entry(instance, entry, propagation_by_nsg)?;

    let mut txn = db::Transaction::begin(&ctx.pool).await?;
    if let Some(controller_id) = plan.assign_controller_id.as_deref() {
        db::instance::set_controller_instance_id(txn.as_pgconn(), instance.id, controller_id)
            .await?;
    }
    if !plan.update.is_empty() {
        db::instance::update_from_inventory(txn.as_pgconn(), instance.id, plan.update).await?;
    }
    for (status, message) in &plan.journal {
        db::status_detail::append_if_changed(
            txn.as_pgconn(),
            instance.id.as_uuid(),
            status,
            message,
        )
        .await?;
    }
    txn.commit().await?;

    let instance_ready = entry.tenant_state.map(InstanceStatus::from_tenant_state)
        == Some(InstanceStatus::Ready);
    interfaces::reconcile_children(ctx, instance, entry, instance_ready).await?;

    if plan.metadata_divergent {
        // Cloud wins for metadata; push the intended values back out.
        // Best-effort: a lost submission is repaired by the next inventory.
        if let Err(err) = dispatch::dispatch_instance_metadata_update(ctx, site, instance).await {
            tracing::warn!(instance = %instance.id, %err, "failed to dispatch metadata sync-out");
        }
    }

    if plan.transitioned_to_ready {
        return Ok(Some(LifecycleEvent {
            kind: LifecycleEventKind::Created,
            instance_id: instance.id,
            site_id: site.id,
            occurred_at: chrono::Utc::now(),
        }));
    }
    Ok(None)
}

async fn handle_absent_instance(
    ctx: &ActivityContext,
    site: &Site,
    instance: &Instance,
) -> ActivityResult<Option<LifecycleEvent>> {
    if instance.status == InstanceStatus::Terminating {
        if ctx
            .freshness
            .is_within_stale_inventory_threshold(instance.updated)
        {
            tracing::debug!(instance = %instance.id, "terminating instance inside freshness window, deferring delete");
            return Ok(None);
        }

        let mut txn = db::Transaction::begin(&ctx.pool).await?;
        terminate::cascade_delete_instance(&mut txn, instance).await?;
        txn.commit().await?;
        tracing::info!(instance = %instance.id, site = %site.id, "deleted terminating instance no longer reported by Site");

        return Ok(Some(LifecycleEvent {
            kind: LifecycleEventKind::Deleted,
            instance_id: instance.id,
            site_id: site.id,
            occurred_at: chrono::Utc::now(),
        }));
    }

    if ctx
        .freshness
        .is_within_stale_inventory_threshold(instance.created)
    {
        tracing::debug!(instance = %instance.id, "unreported instance inside freshness window, deferring");
        return Ok(None);
    }

    let mut txn = db::Transaction::begin(&ctx.pool).await?;
    db::instance::update_from_inventory(
        txn.as_pgconn(),
        instance.id,
        InstanceInventoryUpdate {
            status: Some(InstanceStatus::Error),
            is_missing_on_site: Some(true),
            ..Default::default()
        },
    )
    .await?;
    db::status_detail::append_if_changed(
        txn.as_pgconn(),
        instance.id.as_uuid(),
        InstanceStatus::Error.as_ref(),
        messages::MISSING_ON_SITE,
    )
    .await?;
    txn.commit().await?;

    Ok(None)
}

#[cfg(test)]
mod tests {
    use anvil_uuid::{InstanceId, NetworkSecurityGroupId};
    use chrono::Utc;
    use model::inventory::{TenantState, UpdateObservation};
    use model::metadata::Metadata;
    use model::network_security_group::PropagationStatus;

    use super::*;

    fn cloud_instance() -> Instance {
        Instance {
            id: InstanceId::new_v4(),
            site_id: SiteId::new_v4(),
            metadata: Metadata {
                name: "vm-01".to_string(),
                description: "test".to_string(),
                labels: HashMap::new(),
            },
            status: InstanceStatus::Provisioning,
            version: "v1".to_string(),
            controller_instance_id: Some("ctrl-1".to_string()),
            is_missing_on_site: false,
            is_update_pending: false,
            tpm_ek_certificate: None,
            network_security_group_id: None,
            nsg_propagation: None,
            power_status: PowerStatus::PoweredOn,
            machine_id: None,
            deleted: None,
            created: Utc::now(),
            updated: Utc::now(),
        }
    }

    fn observation(instance: &Instance) -> InstanceObservation {
        InstanceObservation {
            id: Some(instance.id.as_uuid()),
            controller_instance_id: instance.controller_instance_id.clone(),
            object_status: None,
            tenant_state: None,
            name: None,
            description: None,
            labels: None,
            tpm_ek_certificate: None,
            update: None,
            interfaces: vec![],
            ib_interfaces: vec![],
            nvlink_interfaces: vec![],
            extension_services: vec![],
            error: None,
        }
    }

    #[test]
    fn ready_transition_sets_power_and_journal() {
        let instance = cloud_instance();
        let mut obs = observation(&instance);
        obs.tenant_state = Some(TenantState::Ready);

        let plan = plan_entry(&instance, &obs, &HashMap::new()).unwrap();
        assert_eq!(plan.update.status, Some(InstanceStatus::Ready));
        assert_eq!(plan.update.power_status, Some(PowerStatus::BootCompleted));
        assert!(plan.transitioned_to_ready);
        assert_eq!(plan.journal, vec![("ready".to_string(), String::new())]);
    }

    #[test]
    fn already_ready_instance_does_not_retransition() {
        let mut instance = cloud_instance();
        instance.status = InstanceStatus::Ready;
        instance.power_status = PowerStatus::BootCompleted;
        let mut obs = observation(&instance);
        obs.tenant_state = Some(TenantState::Ready);

        let plan = plan_entry(&instance, &obs, &HashMap::new()).unwrap();
        assert!(!plan.transitioned_to_ready);
        assert!(plan.update.is_empty());
        assert!(plan.journal.is_empty());
    }

    #[test]
    fn created_without_controller_id_fails_the_activity() {
        let mut instance = cloud_instance();
        instance.controller_instance_id = None;
        let mut obs = observation(&instance);
        obs.object_status = Some(ObjectStatus::Created);
        obs.controller_instance_id = None;

        let err = plan_entry(&instance, &obs, &HashMap::new()).unwrap_err();
        assert!(matches!(err, ActivityError::InvalidInput(_)));
    }

    #[test]
    fn controller_id_is_assigned_once() {
        let mut instance = cloud_instance();
        instance.controller_instance_id = None;
        let mut obs = observation(&instance);
        obs.object_status = Some(ObjectStatus::Created);
        obs.controller_instance_id = Some("ctrl-9".to_string());

        let plan = plan_entry(&instance, &obs, &HashMap::new()).unwrap();
        assert_eq!(plan.assign_controller_id.as_deref(), Some("ctrl-9"));

        // Once set, a re-delivered created response assigns nothing.
        instance.controller_instance_id = Some("ctrl-9".to_string());
        let plan = plan_entry(&instance, &obs, &HashMap::new()).unwrap();
        assert!(plan.assign_controller_id.is_none());
    }

    #[test]
    fn pending_update_sets_flag_and_approval_clears_it() {
        let mut instance = cloud_instance();
        let mut obs = observation(&instance);
        obs.update = Some(UpdateObservation {
            user_approval_received: false,
        });
        let plan = plan_entry(&instance, &obs, &HashMap::new()).unwrap();
        assert_eq!(plan.update.is_update_pending, Some(true));

        instance.is_update_pending = true;
        obs.update = Some(UpdateObservation {
            user_approval_received: true,
        });
        let plan = plan_entry(&instance, &obs, &HashMap::new()).unwrap();
        assert_eq!(plan.update.is_update_pending, Some(false));
        assert!(
            plan.journal
                .iter()
                .any(|(_, message)| message == messages::UPDATES_APPLIED)
        );
    }

    #[test]
    fn vanished_propagation_is_cleared_explicitly() {
        let nsg_id = NetworkSecurityGroupId::new_v4();
        let mut instance = cloud_instance();
        instance.network_security_group_id = Some(nsg_id);
        instance.nsg_propagation = Some(NsgPropagationDetails {
            status: PropagationStatus::Propagated,
            details: None,
            unpropagated_instance_ids: vec![],
            related_instance_ids: vec![],
        });
        let obs = observation(&instance);

        let plan = plan_entry(&instance, &obs, &HashMap::new()).unwrap();
        assert_eq!(plan.update.nsg_propagation, ColumnUpdate::Clear);
    }

    #[test]
    fn reported_propagation_is_attached_when_different() {
        let nsg_id = NetworkSecurityGroupId::new_v4();
        let mut instance = cloud_instance();
        instance.network_security_group_id = Some(nsg_id);
        let obs = observation(&instance);

        let details = NsgPropagationDetails {
            status: PropagationStatus::InProgress,
            details: Some("1 of 2".to_string()),
            unpropagated_instance_ids: vec!["i-2".to_string()],
            related_instance_ids: vec!["i-1".to_string(), "i-2".to_string()],
        };
        let propagations = HashMap::from([(nsg_id.as_uuid(), details.clone())]);

        let plan = plan_entry(&instance, &obs, &propagations).unwrap();
        assert_eq!(plan.update.nsg_propagation, ColumnUpdate::Set(details));
    }

    #[test]
    fn metadata_divergence_is_detected() {
        let instance = cloud_instance();
        let mut obs = observation(&instance);
        assert!(!plan_entry(&instance, &obs, &HashMap::new())
            .unwrap()
            .metadata_divergent);

        obs.name = Some("renamed-on-site".to_string());
        assert!(plan_entry(&instance, &obs, &HashMap::new())
            .unwrap()
            .metadata_divergent);
    }
}
