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

use anvil_uuid::{MachineId, SiteId};
use chrono::{DateTime, Utc};
use db::ColumnUpdate;
use db::expected_machine::ExpectedMachineUpdate;
use mac_address::MacAddress;
use model::expected_machine::ExpectedMachine;
use model::inventory::{ExpectedMachineInventory, ExpectedMachineObservation};
use model::metadata::labels_update;
use model::site::Site;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::activity::ActivityContext;
use crate::reconcile::engine::{
    AbsencePlan, EntryIds, ReconcilePolicy, RowIds, reconcile_inventory,
};
use crate::ActivityResult;

/// Reconciles one expected machine inventory page for one Site.
///
/// The cloud is the source of truth for expected machines. The Site's view
/// is used to learn hardware identifiers and the BMC-MAC → discovered
/// machine link, and to prune cloud rows the Site no longer reports.
pub async fn update_expected_machines_in_db(
    ctx: &ActivityContext,
    site_id: SiteId,
    inventory: Option<ExpectedMachineInventory>,
) -> ActivityResult<()> {
    reconcile_inventory(&ExpectedMachinePolicy, ctx, site_id, inventory).await
}

/// Computes the field-diff between the cloud row and the Site's report.
///
/// The fallback DPU serial list is order-sensitive. Labels follow the
/// explicit-clear rule: no labels from the Site on a row with labels in the
/// cloud becomes an explicit empty map.
pub fn plan_update(
    machine: &ExpectedMachine,
    observation: &ExpectedMachineObservation,
    links_by_bmc_mac: &HashMap<MacAddress, Uuid>,
) -> ExpectedMachineUpdate {
    let mut update = ExpectedMachineUpdate::default();

    if let Some(mac) = observation.bmc_mac_address
        && mac != machine.bmc_mac_address
    {
        update.bmc_mac_address = Some(mac);
    }

    if let Some(serial) = observation.chassis_serial_number.as_deref()
        && serial != machine.chassis_serial_number
    {
        update.chassis_serial_number = Some(serial.to_string());
    }

    if observation.fallback_dpu_serial_numbers != machine.fallback_dpu_serial_numbers {
        update.fallback_dpu_serial_numbers =
            Some(observation.fallback_dpu_serial_numbers.clone());
    }

    if let Some(sku) = observation.sku_id.as_deref()
        && Some(sku) != machine.sku_id.as_deref()
    {
        update.sku_id = ColumnUpdate::Set(sku.to_string());
    }

    update.labels = labels_update(observation.labels.as_ref(), &machine.metadata.labels);

    let mac = observation
        .bmc_mac_address
        .unwrap_or(machine.bmc_mac_address);
    match links_by_bmc_mac.get(&mac) {
        Some(&linked) => {
            if machine.machine_id.as_ref().map(MachineId::as_uuid) != Some(linked) {
                update.machine_id = ColumnUpdate::Set(MachineId::from_uuid(linked));
            }
        }
        None => {
            if machine.machine_id.is_some() {
                update.machine_id = ColumnUpdate::Clear;
            }
        }
    }

    update
}

struct ExpectedMachinePolicy;

#[async_trait::async_trait]
impl ReconcilePolicy for ExpectedMachinePolicy {
    type Entry = ExpectedMachineObservation;
    type Inventory = ExpectedMachineInventory;
    type Row = ExpectedMachine;
    type Prepared = HashMap<MacAddress, Uuid>;

    const RESOURCE: &'static str = "expected-machine";

    fn prepare(&self, inventory: &Self::Inventory) -> Self::Prepared {
        inventory.links_by_bmc_mac()
    }

    fn entry_ids(entry: &Self::Entry) -> EntryIds {
        EntryIds {
            cloud_id: entry.id.map(|id| id.to_string()),
            controller_id: None,
        }
    }

    async fn load_rows(
        &self,
        txn: &mut PgConnection,
        site_id: SiteId,
    ) -> db::DatabaseResult<Vec<Self::Row>> {
        db::expected_machine::find_by_site(txn, site_id).await
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
        _site: &Site,
        machine: &Self::Row,
        entry: &Self::Entry,
        links_by_bmc_mac: &Self::Prepared,
    ) -> ActivityResult<()> {
        let update = plan_update(machine, entry, links_by_bmc_mac);
        if update.is_empty() {
            return Ok(());
        }

        let mut txn = db::Transaction::begin(&ctx.pool).await?;
        db::expected_machine::update_from_inventory(txn.as_pgconn(), machine.id, update).await?;
        txn.commit().await?;
        Ok(())
    }

    fn plan_absent(&self, _row: &Self::Row, within_freshness_window: bool) -> AbsencePlan {
        // Expected machines have no per-Site association; an unreported row
        // outside the race window is pruned outright.
        if within_freshness_window {
            AbsencePlan::Skip
        } else {
            AbsencePlan::Delete
        }
    }

    async fn handle_absent(
        &self,
        ctx: &ActivityContext,
        site: &Site,
        row: &Self::Row,
        plan: AbsencePlan,
    ) -> ActivityResult<()> {
        if plan != AbsencePlan::Delete {
            return Ok(());
        }

        tracing::info!(site = %site.id, machine = %row.id, "pruning expected machine no longer reported by Site");
        let mut txn = db::Transaction::begin(&ctx.pool).await?;
        db::expected_machine::delete(txn.as_pgconn(), row.id).await?;
        txn.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anvil_uuid::ExpectedMachineId;
    use model::metadata::Metadata;

    use super::*;

    fn cloud_machine() -> ExpectedMachine {
        ExpectedMachine {
            id: ExpectedMachineId::new_v4(),
            site_id: SiteId::new_v4(),
            bmc_mac_address: "0a:0b:0c:0d:0e:0f".parse().unwrap(),
            chassis_serial_number: "CH-001".to_string(),
            fallback_dpu_serial_numbers: vec!["DPU-1".to_string(), "DPU-2".to_string()],
            sku_id: Some("SKU-A".to_string()),
            metadata: Metadata {
                name: "host-001".to_string(),
                description: String::new(),
                labels: HashMap::from([("rack".to_string(), "A1".to_string())]),
            },
            machine_id: None,
            created: Utc::now(),
            updated: Utc::now(),
        }
    }

    fn matching_observation(machine: &ExpectedMachine) -> ExpectedMachineObservation {
        ExpectedMachineObservation {
            id: Some(machine.id.as_uuid()),
            bmc_mac_address: Some(machine.bmc_mac_address),
            chassis_serial_number: Some(machine.chassis_serial_number.clone()),
            fallback_dpu_serial_numbers: machine.fallback_dpu_serial_numbers.clone(),
            sku_id: machine.sku_id.clone(),
            labels: Some(machine.metadata.labels.clone()),
        }
    }

    #[test]
    fn matching_report_is_empty_update() {
        let machine = cloud_machine();
        let update = plan_update(&machine, &matching_observation(&machine), &HashMap::new());
        assert!(update.is_empty());
    }

    #[test]
    fn changed_serial_is_updated() {
        let machine = cloud_machine();
        let mut obs = matching_observation(&machine);
        obs.chassis_serial_number = Some("CH-002".to_string());
        let update = plan_update(&machine, &obs, &HashMap::new());
        assert_eq!(update.chassis_serial_number, Some("CH-002".to_string()));
        assert!(update.bmc_mac_address.is_none());
    }

    #[test]
    fn fallback_serial_order_matters() {
        let machine = cloud_machine();
        let mut obs = matching_observation(&machine);
        obs.fallback_dpu_serial_numbers = vec!["DPU-2".to_string(), "DPU-1".to_string()];
        let update = plan_update(&machine, &obs, &HashMap::new());
        assert_eq!(
            update.fallback_dpu_serial_numbers,
            Some(vec!["DPU-2".to_string(), "DPU-1".to_string()])
        );
    }

    #[test]
    fn nil_labels_force_explicit_clear() {
        let machine = cloud_machine();
        let mut obs = matching_observation(&machine);
        obs.labels = None;
        let update = plan_update(&machine, &obs, &HashMap::new());
        assert_eq!(update.labels, Some(HashMap::new()));
    }

    #[test]
    fn link_is_learned_by_bmc_mac() {
        let machine = cloud_machine();
        let obs = matching_observation(&machine);
        let linked = Uuid::new_v4();
        let links = HashMap::from([(machine.bmc_mac_address, linked)]);
        let update = plan_update(&machine, &obs, &links);
        assert_eq!(update.machine_id, ColumnUpdate::Set(MachineId::from_uuid(linked)));
    }

    #[test]
    fn vanished_link_is_cleared() {
        let mut machine = cloud_machine();
        machine.machine_id = Some(MachineId::new_v4());
        let obs = matching_observation(&machine);
        let update = plan_update(&machine, &obs, &HashMap::new());
        assert_eq!(update.machine_id, ColumnUpdate::Clear);
    }
}
