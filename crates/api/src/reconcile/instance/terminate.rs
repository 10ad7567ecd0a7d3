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

//! Instance teardown: the transactional cascade delete and the
//! create-failure compensation activity.

use anvil_uuid::InstanceId;
use model::instance::Instance;
use model::status::InstanceStatus;

use crate::activity::ActivityContext;
use crate::{ActivityError, ActivityResult};

/// Deletes an instance and everything it owns, inside the caller's
/// transaction.
///
/// Ordered steps: soft-delete the instance row, drop its ethernet
/// interfaces, drop its SSH key group attachments, and release the machine.
/// The advisory lock on the machine id is taken in the same transaction, so
/// it releases on commit or rollback; on any step failure the caller rolls
/// the whole transaction back.
pub async fn cascade_delete_instance(
    txn: &mut db::Transaction<'_>,
    instance: &Instance,
) -> db::DatabaseResult<()> {
    if let Some(machine_id) = instance.machine_id {
        db::work_lock::acquire_xact_lock(txn, &machine_id.to_string()).await?;
    }

    db::instance::soft_delete(txn.as_pgconn(), instance.id).await?;
    db::interface::delete_by_instance(txn.as_pgconn(), instance.id).await?;
    db::ssh_key_group::delete_instance_associations_by_instance(txn.as_pgconn(), instance.id)
        .await?;

    if let Some(machine_id) = instance.machine_id {
        db::machine::set_assigned(txn.as_pgconn(), machine_id, false).await?;
    }

    Ok(())
}

const DEFAULT_CREATE_ERROR: &str = "instance creation failed on Site";

/// Compensating activity for an exhausted create-instance workflow.
///
/// One transaction: the instance goes to `error` with the provided (or
/// default) message, its machine reference is cleared, and the machine's
/// assignment flag is released under the advisory lock.
pub async fn on_create_instance_error(
    ctx: &ActivityContext,
    instance_id: InstanceId,
    message: Option<String>,
) -> ActivityResult<()> {
    let message = message.unwrap_or_else(|| DEFAULT_CREATE_ERROR.to_string());

    let mut txn = db::Transaction::begin(&ctx.pool).await?;

    let instance = db::instance::find_by_id(txn.as_pgconn(), instance_id)
        .await?
        .ok_or_else(|| {
            ActivityError::Database(db::DatabaseError::NotFoundError {
                kind: "Instance",
                id: instance_id.to_string(),
            })
        })?;

    if let Some(machine_id) = instance.machine_id {
        db::work_lock::acquire_xact_lock(&mut txn, &machine_id.to_string()).await?;
    }

    db::instance::update_status(txn.as_pgconn(), instance_id, InstanceStatus::Error).await?;
    db::status_detail::append_if_changed(
        txn.as_pgconn(),
        instance_id.as_uuid(),
        InstanceStatus::Error.as_ref(),
        &message,
    )
    .await?;

    if let Some(machine_id) = instance.machine_id {
        db::machine::set_assigned(txn.as_pgconn(), machine_id, false).await?;
        db::instance::clear_machine(txn.as_pgconn(), instance_id).await?;
    }

    txn.commit().await?;
    Ok(())
}
