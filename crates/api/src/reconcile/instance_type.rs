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

use anvil_uuid::SiteId;
use chrono::{DateTime, Utc};
use db::association::AssociationTable;
use model::instance_type::{InstanceType, MachineCapability};
use model::inventory::{CapabilityObservation, InstanceTypeInventory, InstanceTypeObservation};
use model::site::Site;
use model::status::SyncStatus;
use sqlx::PgConnection;

use crate::activity::ActivityContext;
use crate::reconcile::engine::{
    self, AbsencePlan, EntryIds, ReconcilePolicy, RowIds, reconcile_inventory,
};
use crate::reconcile::rollup;
use crate::ActivityResult;

/// Reconciles one instance type inventory page for one Site.
///
/// Instance types are the one resource kind the Site may introduce: a type
/// reported by a Site that the cloud does not know is auto-created under the
/// Site's infrastructure provider.
pub async fn update_instance_types_in_db(
    ctx: &ActivityContext,
    site_id: SiteId,
    inventory: Option<InstanceTypeInventory>,
) -> ActivityResult<()> {
    reconcile_inventory(&InstanceTypePolicy, ctx, site_id, inventory).await
}

/// One step of a capability diff. Capabilities are keyed by `index` and are
/// not independently mutable, so a changed record is dropped and re-created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityAction {
    Create(CapabilityObservation),
    Replace(CapabilityObservation),
    Delete(i32),
}

/// Computes the actions that make the cloud capability set match the Site's.
pub fn diff_capabilities(
    cloud: &[MachineCapability],
    observed: &[CapabilityObservation],
) -> Vec<CapabilityAction> {
    let mut actions = Vec::new();

    for obs in observed {
        match cloud.iter().find(|capability| capability.index == obs.index) {
            None => actions.push(CapabilityAction::Create(obs.clone())),
            Some(capability) if !capability.matches(obs) => {
                actions.push(CapabilityAction::Replace(obs.clone()))
            }
            Some(_) => {}
        }
    }

    for capability in cloud {
        if !observed.iter().any(|obs| obs.index == capability.index) {
            actions.push(CapabilityAction::Delete(capability.index));
        }
    }

    actions
}

struct InstanceTypePolicy;

#[async_trait::async_trait]
impl ReconcilePolicy for InstanceTypePolicy {
    type Entry = InstanceTypeObservation;
    type Inventory = InstanceTypeInventory;
    type Row = InstanceType;
    type Prepared = ();

    const RESOURCE: &'static str = "instance-type";

    fn prepare(&self, _inventory: &Self::Inventory) {}

    fn entry_ids(entry: &Self::Entry) -> EntryIds {
        EntryIds {
            cloud_id: entry.id.map(|id| id.to_string()),
            controller_id: None,
        }
    }

    async fn load_rows(
        &self,
        txn: &mut PgConnection,
        _site_id: SiteId,
    ) -> db::DatabaseResult<Vec<Self::Row>> {
        // Instance types are global; the per-Site view is the association.
        db::instance_type::find_all(txn).await
    }

    fn row_ids(row: &Self::Row) -> RowIds {
        RowIds {
            cloud_id: row.id.to_string(),
            controller_id: None,
        }
    }

    fn row_created(row: &Self::Row) -> DateTime<Utc> {
        row.created
    }

    fn row_updated(row: &Self::Row) -> DateTime<Utc> {
        row.updated
    }

    async fn handle_entry(
        &self,
        ctx: &ActivityContext,
        site: &Site,
        instance_type: &Self::Row,
        entry: &Self::Entry,
        _prepared: &Self::Prepared,
    ) -> ActivityResult<()> {
        let mut txn = db::Transaction::begin(&ctx.pool).await?;

        let capabilities =
            db::instance_type::find_capabilities(txn.as_pgconn(), &[instance_type.id])
                .await?
                .remove(&instance_type.id)
                .unwrap_or_default();

        for action in diff_capabilities(&capabilities, &entry.capabilities) {
            match action {
                CapabilityAction::Create(obs) => {
                    db::instance_type::create_capability(
                        txn.as_pgconn(),
                        instance_type.id,
                        obs.index,
                        &obs.name,
                        &obs.value,
                    )
                    .await?
                }
                CapabilityAction::Replace(obs) => {
                    db::instance_type::replace_capability(
                        txn.as_pgconn(),
                        instance_type.id,
                        obs.index,
                        &obs.name,
                        &obs.value,
                    )
                    .await?
                }
                CapabilityAction::Delete(index) => {
                    db::instance_type::delete_capability(txn.as_pgconn(), instance_type.id, index)
                        .await?
                }
            }
        }

        let association = db::association::find_by_resource_and_site(
            txn.as_pgconn(),
            AssociationTable::InstanceType,
            instance_type.id.as_uuid(),
            site.id,
        )
        .await?;
        let association = match association {
            Some(association) => association,
            None => {
                db::association::create(
                    txn.as_pgconn(),
                    AssociationTable::InstanceType,
                    instance_type.id.as_uuid(),
                    site.id,
                    "",
                )
                .await?
            }
        };
        txn.commit().await?;

        let changed = engine::write_association_status(
            ctx,
            AssociationTable::InstanceType,
            &association,
            SyncStatus::Synced,
            "",
        )
        .await?;
        if changed {
            rollup::rollup_parent(
                ctx,
                AssociationTable::InstanceType,
                instance_type.id.as_uuid(),
            )
            .await?;
        }
        Ok(())
    }

    async fn handle_unknown_entry(
        &self,
        ctx: &ActivityContext,
        site: &Site,
        entry: &Self::Entry,
    ) -> ActivityResult<()> {
        if entry.name.is_empty() {
            tracing::warn!(site = %site.id, "instance type entry without name, skipping");
            return Ok(());
        }

        tracing::info!(site = %site.id, name = %entry.name, "auto-creating instance type from Site inventory");

        let mut txn = db::Transaction::begin(&ctx.pool).await?;
        // created_by carries the Site id: auto-created types have no user
        // principal, and the Site id keeps them attributable.
        let instance_type = db::instance_type::create(
            txn.as_pgconn(),
            &entry.name,
            &site.id.to_string(),
            &site.id.to_string(),
        )
        .await?;
        for obs in &entry.capabilities {
            db::instance_type::create_capability(
                txn.as_pgconn(),
                instance_type.id,
                obs.index,
                &obs.name,
                &obs.value,
            )
            .await?;
        }
        let association = db::association::create(
            txn.as_pgconn(),
            AssociationTable::InstanceType,
            instance_type.id.as_uuid(),
            site.id,
            "",
        )
        .await?;
        db::association::update_status(
            txn.as_pgconn(),
            AssociationTable::InstanceType,
            association.id,
            SyncStatus::Synced,
        )
        .await?;
        txn.commit().await?;
        Ok(())
    }

    fn plan_absent(&self, _row: &Self::Row, _within_freshness_window: bool) -> AbsencePlan {
        // Cloud-only instance types are retained and logged; deleting them
        // would strand instances that still reference the type.
        AbsencePlan::Retain
    }

    async fn handle_absent(
        &self,
        _ctx: &ActivityContext,
        _site: &Site,
        _row: &Self::Row,
        _plan: AbsencePlan,
    ) -> ActivityResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anvil_uuid::InstanceTypeId;

    use super::*;

    fn capability(index: i32, name: &str, value: &str) -> MachineCapability {
        MachineCapability {
            instance_type_id: InstanceTypeId::new_v4(),
            index,
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    fn observation(index: i32, name: &str, value: &str) -> CapabilityObservation {
        CapabilityObservation {
            index,
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn identical_sets_produce_no_actions() {
        let cloud = vec![capability(0, "gpu.count", "8")];
        let observed = vec![observation(0, "gpu.count", "8")];
        assert!(diff_capabilities(&cloud, &observed).is_empty());
    }

    #[test]
    fn changed_capability_is_replaced() {
        let cloud = vec![capability(0, "gpu.count", "8")];
        let observed = vec![observation(0, "gpu.count", "4")];
        assert_eq!(
            diff_capabilities(&cloud, &observed),
            vec![CapabilityAction::Replace(observation(0, "gpu.count", "4"))]
        );
    }

    #[test]
    fn site_only_capability_is_created() {
        let observed = vec![observation(1, "nic.count", "2")];
        assert_eq!(
            diff_capabilities(&[], &observed),
            vec![CapabilityAction::Create(observation(1, "nic.count", "2"))]
        );
    }

    #[test]
    fn cloud_only_capability_is_deleted() {
        let cloud = vec![capability(2, "mem.gib", "512")];
        assert_eq!(
            diff_capabilities(&cloud, &[]),
            vec![CapabilityAction::Delete(2)]
        );
    }
}
