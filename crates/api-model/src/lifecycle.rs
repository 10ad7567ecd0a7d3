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

use anvil_uuid::{InstanceId, SiteId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of instance lifecycle transition an activity observed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEventKind {
    /// The instance transitioned to `ready` during this activity.
    Created,
    /// An orphaned terminating instance was physically deleted.
    Deleted,
}

/// An instance lifecycle transition, collected in-memory during an activity
/// and returned to the workflow.
///
/// The workflow hands these to the metrics recorder as a separate activity,
/// which keeps Prometheus state out of the main reconciliation path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub kind: LifecycleEventKind,
    pub instance_id: InstanceId,
    pub site_id: SiteId,
    pub occurred_at: DateTime<Utc>,
}
