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

//! Outbound workflow dispatch toward Site agents.
//!
//! Every create/update/delete the cloud emits gets a deterministic workflow
//! id of the form `site-<resource>-<op>-<resourceID>[-<version>]` and the
//! `allow-duplicate` reuse policy, so retries coalesce in the runtime
//! instead of double-executing on the Site.

use anvil_uuid::SiteAssociationId;
use db::association::AssociationTable;
use model::association::SiteAssociation;
use model::instance::Instance;
use model::messages;
use model::metadata::Metadata;
use model::site::Site;
use model::ssh_key_group::SshKey;
use model::status::SyncStatus;
use model::status_detail::StatusDetail;
use serde::Serialize;
use uuid::Uuid;

use crate::activity::ActivityContext;
use crate::site_client::{WorkflowIdReusePolicy, WorkflowOptions};
use crate::{ActivityError, ActivityResult};

/// Resource kinds that have outbound Site workflows.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    Instance,
    SshKeyGroup,
    OsImage,
    NetworkSecurityGroup,
    InstanceType,
    IbPartition,
    NvlLogicalPartition,
}

impl ResourceKind {
    pub const fn wire_name(self) -> &'static str {
        match self {
            ResourceKind::Instance => "instance",
            ResourceKind::SshKeyGroup => "ssh-key-group",
            ResourceKind::OsImage => "os-image",
            ResourceKind::NetworkSecurityGroup => "network-security-group",
            ResourceKind::InstanceType => "instance-type",
            ResourceKind::IbPartition => "ib-partition",
            ResourceKind::NvlLogicalPartition => "nvl-logical-partition",
        }
    }

    const fn workflow_type_name(self) -> &'static str {
        match self {
            ResourceKind::Instance => "Instance",
            ResourceKind::SshKeyGroup => "SshKeyGroup",
            ResourceKind::OsImage => "OsImage",
            ResourceKind::NetworkSecurityGroup => "NetworkSecurityGroup",
            ResourceKind::InstanceType => "InstanceType",
            ResourceKind::IbPartition => "IbPartition",
            ResourceKind::NvlLogicalPartition => "NvlLogicalPartition",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
    Reboot,
    UpdateMetadata,
}

impl Operation {
    pub const fn wire_name(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Reboot => "reboot",
            Operation::UpdateMetadata => "update-metadata",
        }
    }

    const fn workflow_type_prefix(self) -> &'static str {
        match self {
            Operation::Create => "Create",
            Operation::Update => "Update",
            Operation::Delete => "Delete",
            Operation::Reboot => "Reboot",
            // Metadata changes ride the generic update workflow on the Site.
            Operation::UpdateMetadata => "Update",
        }
    }
}

/// Builds the deterministic workflow id for an outbound submission.
pub fn workflow_id(
    kind: ResourceKind,
    op: Operation,
    resource_id: &str,
    version: Option<&str>,
) -> String {
    match version {
        Some(version) => format!(
            "site-{}-{}-{}-{}",
            kind.wire_name(),
            op.wire_name(),
            resource_id,
            version
        ),
        None => format!(
            "site-{}-{}-{}",
            kind.wire_name(),
            op.wire_name(),
            resource_id
        ),
    }
}

fn workflow_options(
    ctx: &ActivityContext,
    kind: ResourceKind,
    op: Operation,
    resource_id: &str,
    version: Option<&str>,
) -> WorkflowOptions {
    WorkflowOptions {
        workflow_id: workflow_id(kind, op, resource_id, version),
        workflow_type: format!(
            "{}{}",
            op.workflow_type_prefix(),
            kind.workflow_type_name()
        ),
        task_queue: ctx.task_queue.clone(),
        id_reuse_policy: WorkflowIdReusePolicy::AllowDuplicate,
    }
}

/// Submits one workflow to the Site and returns the workflow id.
pub async fn submit_site_workflow(
    ctx: &ActivityContext,
    site: &Site,
    kind: ResourceKind,
    op: Operation,
    resource_id: &str,
    version: Option<&str>,
    input: serde_json::Value,
) -> ActivityResult<String> {
    let client = ctx.clients.get_or_init(site)?;
    let options = workflow_options(ctx, kind, op, resource_id, version);
    let id = options.workflow_id.clone();
    client.execute_workflow(options, input).await?;
    Ok(id)
}

/// Records the initiation outcome on the association.
///
/// Best-effort: the activity contract already guarantees retry on outer
/// failure, so a failed status write is logged and dropped rather than
/// failing the dispatch.
pub async fn record_submission_outcome(
    ctx: &ActivityContext,
    table: AssociationTable,
    association_id: SiteAssociationId,
    outcome: &ActivityResult<String>,
) {
    let (status, message) = match outcome {
        Ok(workflow_id) => (SyncStatus::Syncing, format!("workflow {workflow_id} submitted")),
        Err(err) => (SyncStatus::Error, err.to_string()),
    };

    let result = async {
        let mut txn = db::Transaction::begin(&ctx.pool).await?;
        db::association::update_status(txn.as_pgconn(), table, association_id, status).await?;
        db::status_detail::append_if_changed(
            txn.as_pgconn(),
            association_id.as_uuid(),
            status.as_ref(),
            &message,
        )
        .await?;
        txn.commit().await
    }
    .await;

    if let Err(err) = result {
        tracing::warn!(%association_id, %err, "failed to record workflow submission outcome");
    }
}

// MARK: - SSH key groups

/// Whether an SSH key group sync should go out as a create or an update.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SshSyncOperation {
    Create,
    Update,
}

impl From<SshSyncOperation> for Operation {
    fn from(op: SshSyncOperation) -> Operation {
        match op {
            SshSyncOperation::Create => Operation::Create,
            SshSyncOperation::Update => Operation::Update,
        }
    }
}

/// Selects create vs update from the association's journal.
///
/// `synced` ever reached means the Site has the group, so update. An `error`
/// whose message carries the duplicate-key marker means the Site created the
/// group but the cloud missed the success notification; update as well.
pub fn choose_ssh_sync_operation(journal: &[StatusDetail]) -> SshSyncOperation {
    for entry in journal {
        if entry.status == SyncStatus::Synced.as_ref() {
            return SshSyncOperation::Update;
        }
        if entry.status == SyncStatus::Error.as_ref()
            && entry.message.contains(messages::DUPLICATE_KEY_MARKER)
        {
            return SshSyncOperation::Update;
        }
    }
    SshSyncOperation::Create
}

#[derive(Debug, Serialize)]
struct SshKeyGroupSyncRequest {
    id: Uuid,
    version: String,
    metadata: Metadata,
    keys: Vec<SshKeyEntry>,
}

#[derive(Debug, Serialize)]
struct SshKeyEntry {
    name: String,
    public_key: String,
}

/// Pushes an SSH key group to one Site.
///
/// The payload is assembled under the group's advisory lock so that it
/// reflects a consistent snapshot of the key list, read in one shot.
pub async fn sync_ssh_key_group(
    ctx: &ActivityContext,
    site: &Site,
    association: &SiteAssociation,
) -> ActivityResult<()> {
    let group_id = anvil_uuid::SshKeyGroupId::from_uuid(association.resource_id);

    let (group, keys, journal) = {
        let mut txn = db::Transaction::begin(&ctx.pool).await?;
        db::work_lock::acquire_xact_lock(&mut txn, &group_id.to_string()).await?;
        let group = db::ssh_key_group::find_by_id(txn.as_pgconn(), group_id)
            .await?
            .ok_or(db::DatabaseError::NotFoundError {
                kind: "SshKeyGroup",
                id: group_id.to_string(),
            })?;
        let keys = db::ssh_key_group::find_keys(txn.as_pgconn(), group_id).await?;
        let journal =
            db::status_detail::history(txn.as_pgconn(), association.id.as_uuid()).await?;
        txn.commit().await?;
        (group, keys, journal)
    };

    let op = choose_ssh_sync_operation(&journal);
    let request = SshKeyGroupSyncRequest {
        id: group_id.as_uuid(),
        version: group.version.clone(),
        metadata: group.metadata.clone(),
        keys: keys
            .into_iter()
            .map(|key: SshKey| SshKeyEntry {
                name: key.name,
                public_key: key.public_key,
            })
            .collect(),
    };
    let input = serde_json::to_value(&request)
        .map_err(|err| ActivityError::InvalidInput(err.to_string()))?;

    let outcome = submit_site_workflow(
        ctx,
        site,
        ResourceKind::SshKeyGroup,
        op.into(),
        &group_id.to_string(),
        Some(&group.version),
        input,
    )
    .await;

    if outcome.is_ok() {
        // Track which generation we pushed; also best-effort.
        if let Err(err) = update_association_version(ctx, association, &group.version).await {
            tracing::warn!(%group_id, %err, "failed to record pushed version");
        }
    }
    record_submission_outcome(ctx, AssociationTable::SshKeyGroup, association.id, &outcome).await;
    outcome.map(|_| ())
}

async fn update_association_version(
    ctx: &ActivityContext,
    association: &SiteAssociation,
    version: &str,
) -> db::DatabaseResult<()> {
    let mut txn = db::Transaction::begin(&ctx.pool).await?;
    db::association::update_version(
        txn.as_pgconn(),
        AssociationTable::SshKeyGroup,
        association.id,
        version,
    )
    .await?;
    txn.commit().await
}

/// Deletes an SSH key group on one Site.
pub async fn dispatch_ssh_key_group_delete(
    ctx: &ActivityContext,
    site: &Site,
    association: &SiteAssociation,
) -> ActivityResult<()> {
    let group_id = association.resource_id;
    let outcome = submit_site_workflow(
        ctx,
        site,
        ResourceKind::SshKeyGroup,
        Operation::Delete,
        &group_id.to_string(),
        None,
        serde_json::json!({ "id": group_id }),
    )
    .await;
    record_submission_outcome(ctx, AssociationTable::SshKeyGroup, association.id, &outcome).await;
    outcome.map(|_| ())
}

// MARK: - Instances

#[derive(Debug, Serialize)]
struct InstanceMetadataUpdateRequest {
    id: Uuid,
    controller_instance_id: Option<String>,
    version: String,
    metadata: Metadata,
}

/// Pushes cloud-authoritative metadata back to the Site after an inventory
/// reported a divergence.
pub async fn dispatch_instance_metadata_update(
    ctx: &ActivityContext,
    site: &Site,
    instance: &Instance,
) -> ActivityResult<()> {
    let request = InstanceMetadataUpdateRequest {
        id: instance.id.as_uuid(),
        controller_instance_id: instance.controller_instance_id.clone(),
        version: instance.version.clone(),
        metadata: instance.metadata.clone(),
    };
    let input = serde_json::to_value(&request)
        .map_err(|err| ActivityError::InvalidInput(err.to_string()))?;

    submit_site_workflow(
        ctx,
        site,
        ResourceKind::Instance,
        Operation::UpdateMetadata,
        &instance.id.to_string(),
        None,
        input,
    )
    .await
    .map(|_| ())
}

/// Deletes an instance on its Site.
///
/// The Site needs its own controller ID to address the instance; when the ID
/// is not yet known this fails so the runtime schedules a retry, and the
/// next inventory populates the ID.
pub async fn dispatch_instance_delete(
    ctx: &ActivityContext,
    site: &Site,
    instance: &Instance,
) -> ActivityResult<()> {
    let Some(controller_instance_id) = instance.controller_instance_id.as_deref() else {
        return Err(ActivityError::ControllerIdUnknown {
            kind: "Instance",
            id: instance.id.to_string(),
        });
    };

    submit_site_workflow(
        ctx,
        site,
        ResourceKind::Instance,
        Operation::Delete,
        &instance.id.to_string(),
        None,
        serde_json::json!({
            "id": instance.id,
            "controller_instance_id": controller_instance_id,
        }),
    )
    .await
    .map(|_| ())
}

// MARK: - Shared resources

#[derive(Debug, Serialize)]
struct ResourceSyncRequest {
    id: Uuid,
    version: String,
    content: serde_json::Value,
}

/// Pushes a shared resource (NSG, OS image, IB partition, NVLink logical
/// partition) to one Site.
pub async fn dispatch_resource_sync(
    ctx: &ActivityContext,
    site: &Site,
    kind: ResourceKind,
    table: AssociationTable,
    association: &SiteAssociation,
    version: &str,
    content: serde_json::Value,
) -> ActivityResult<()> {
    let request = ResourceSyncRequest {
        id: association.resource_id,
        version: version.to_string(),
        content,
    };
    let input = serde_json::to_value(&request)
        .map_err(|err| ActivityError::InvalidInput(err.to_string()))?;

    let outcome = submit_site_workflow(
        ctx,
        site,
        kind,
        Operation::Update,
        &association.resource_id.to_string(),
        Some(version),
        input,
    )
    .await;
    record_submission_outcome(ctx, table, association.id, &outcome).await;
    outcome.map(|_| ())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn workflow_ids_are_deterministic() {
        assert_eq!(
            workflow_id(ResourceKind::Instance, Operation::Create, "abc", None),
            "site-instance-create-abc"
        );
        assert_eq!(
            workflow_id(ResourceKind::Instance, Operation::UpdateMetadata, "abc", None),
            "site-instance-update-metadata-abc"
        );
        assert_eq!(
            workflow_id(
                ResourceKind::SshKeyGroup,
                Operation::Update,
                "abc",
                Some("v7")
            ),
            "site-ssh-key-group-update-abc-v7"
        );
    }

    fn journal_entry(status: &str, message: &str) -> StatusDetail {
        StatusDetail {
            id: 1,
            object_id: Uuid::new_v4(),
            status: status.to_string(),
            message: message.to_string(),
            created: Utc::now(),
        }
    }

    #[test]
    fn fresh_group_is_created() {
        assert_eq!(choose_ssh_sync_operation(&[]), SshSyncOperation::Create);
        assert_eq!(
            choose_ssh_sync_operation(&[journal_entry("syncing", "workflow submitted")]),
            SshSyncOperation::Create
        );
    }

    #[test]
    fn previously_synced_group_is_updated() {
        let journal = vec![
            journal_entry("error", "site unreachable"),
            journal_entry("synced", ""),
        ];
        assert_eq!(choose_ssh_sync_operation(&journal), SshSyncOperation::Update);
    }

    #[test]
    fn duplicate_key_error_selects_update() {
        let journal = vec![journal_entry(
            "error",
            "ERROR: duplicate key value violates unique constraint \"ssh_key_groups_pkey\"",
        )];
        assert_eq!(choose_ssh_sync_operation(&journal), SshSyncOperation::Update);
    }

    #[test]
    fn other_errors_select_create() {
        let journal = vec![journal_entry("error", "connection reset by peer")];
        assert_eq!(choose_ssh_sync_operation(&journal), SshSyncOperation::Create);
    }
}
